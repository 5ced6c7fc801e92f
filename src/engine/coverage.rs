use crate::error::AppError;
use crate::models::coverage::CoverageArea;
use crate::models::order::DeliveryAddress;

/// Resolves a destination address to the most specific matching
/// coverage area: exact postal code beats subdistrict beats district
/// beats province-wide. No match means the caller falls back to a
/// third-party provider lookup.
pub struct CoverageResolver {
    areas: Vec<CoverageArea>,
}

impl CoverageResolver {
    pub fn new(areas: Vec<CoverageArea>) -> Result<Self, AppError> {
        for area in &areas {
            area.validate()?;
        }
        Ok(Self { areas })
    }

    pub fn resolve(&self, address: &DeliveryAddress) -> Option<&CoverageArea> {
        self.areas
            .iter()
            .filter(|area| area.active && matches(area, address))
            .max_by_key(|area| specificity(area))
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

/// Every scope field the area pins down must match the address; a
/// field the area leaves open matches anything.
fn matches(area: &CoverageArea, address: &DeliveryAddress) -> bool {
    if !area.province.eq_ignore_ascii_case(&address.province) {
        return false;
    }

    let narrower = [
        (&area.district, &address.district),
        (&area.subdistrict, &address.subdistrict),
        (&area.postal_code, &address.postal_code),
    ];
    narrower.into_iter().all(|(scope, value)| match scope {
        Some(expected) => value
            .as_deref()
            .is_some_and(|v| expected.eq_ignore_ascii_case(v)),
        None => true,
    })
}

fn specificity(area: &CoverageArea) -> u8 {
    if area.postal_code.is_some() {
        3
    } else if area.subdistrict.is_some() {
        2
    } else if area.district.is_some() {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::CoverageResolver;
    use crate::models::coverage::CoverageArea;
    use crate::models::order::DeliveryAddress;

    fn area(province: &str) -> CoverageArea {
        CoverageArea {
            province: province.to_string(),
            district: None,
            subdistrict: None,
            postal_code: None,
            self_delivery: true,
            route_code: Some(format!("{}-01", &province[..3].to_uppercase())),
            base_fee: 50.0,
            per_km_rate: 5.0,
            free_delivery_threshold: Some(1000.0),
            same_day_supported: true,
            daily_capacity: None,
            active: true,
            auto_assign: true,
        }
    }

    fn address(province: &str) -> DeliveryAddress {
        DeliveryAddress {
            province: province.to_string(),
            district: None,
            subdistrict: None,
            postal_code: None,
            coordinates: None,
        }
    }

    #[test]
    fn postal_code_beats_district_beats_province() {
        let mut district_area = area("Bangkok");
        district_area.district = Some("Watthana".to_string());
        district_area.route_code = Some("BKK-02".to_string());

        let mut postal_area = area("Bangkok");
        postal_area.district = Some("Watthana".to_string());
        postal_area.postal_code = Some("10110".to_string());
        postal_area.route_code = Some("BKK-03".to_string());

        let resolver =
            CoverageResolver::new(vec![area("Bangkok"), district_area, postal_area]).unwrap();

        let mut addr = address("Bangkok");
        assert_eq!(
            resolver.resolve(&addr).unwrap().route_code.as_deref(),
            Some("BKK-01")
        );

        addr.district = Some("Watthana".to_string());
        assert_eq!(
            resolver.resolve(&addr).unwrap().route_code.as_deref(),
            Some("BKK-02")
        );

        addr.postal_code = Some("10110".to_string());
        assert_eq!(
            resolver.resolve(&addr).unwrap().route_code.as_deref(),
            Some("BKK-03")
        );
    }

    #[test]
    fn province_match_is_case_insensitive() {
        let resolver = CoverageResolver::new(vec![area("Bangkok")]).unwrap();
        assert!(resolver.resolve(&address("bangkok")).is_some());
    }

    #[test]
    fn uncovered_province_resolves_to_none() {
        let resolver = CoverageResolver::new(vec![area("Bangkok")]).unwrap();
        assert!(resolver.resolve(&address("Chiang Mai")).is_none());
    }

    #[test]
    fn inactive_area_never_matches() {
        let mut inactive = area("Bangkok");
        inactive.active = false;
        inactive.route_code = None;
        let resolver = CoverageResolver::new(vec![inactive]).unwrap();
        assert!(resolver.resolve(&address("Bangkok")).is_none());
    }

    #[test]
    fn district_scoped_area_requires_the_district_in_the_address() {
        let mut district_area = area("Bangkok");
        district_area.district = Some("Watthana".to_string());
        let resolver = CoverageResolver::new(vec![district_area]).unwrap();

        assert!(resolver.resolve(&address("Bangkok")).is_none());
    }
}
