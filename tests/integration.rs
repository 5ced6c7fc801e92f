use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use delivery_orchestrator::api::rest::router;
use delivery_orchestrator::config::{load_coverage, load_providers};
use delivery_orchestrator::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> axum::Router {
    let providers = load_providers(None).expect("embedded provider seed");
    let coverage = load_coverage(None).expect("embedded coverage seed");
    let state = AppState::new(providers, coverage, 1024).expect("valid seed data");
    router(Arc::new(state))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn create_delivery_body(province: &str, weight_kg: f64, cod_amount: f64) -> Value {
    json!({
        "order_id": uuid::Uuid::new_v4(),
        "customer_id": uuid::Uuid::new_v4(),
        "address_id": uuid::Uuid::new_v4(),
        "address": { "province": province },
        "weight_kg": weight_kg,
        "cod_amount": cod_amount,
        "order_value": 500.0,
        "distance_km": 0.0
    })
}

async fn create_delivery(app: &axum::Router, body: Value) -> Value {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/deliveries", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn patch_status(app: &axum::Router, id: &str, status: &str) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/deliveries/{id}/status"),
            json!({ "status": status }),
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["deliveries"], 0);
    assert_eq!(body["tasks"], 0);
    assert_eq!(body["providers"], 4);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("tasks_open"));
}

#[tokio::test]
async fn bangkok_order_is_self_delivery_at_coverage_base_fee() {
    let app = setup();
    let delivery = create_delivery(&app, create_delivery_body("Bangkok", 3.0, 0.0)).await;

    assert_eq!(delivery["method"], "self_delivery");
    assert_eq!(delivery["status"], "pending");
    assert_eq!(delivery["delivery_fee"], 50.0);
    assert_eq!(delivery["requires_manual_coordination"], false);
    assert!(delivery["provider_code"].is_null());
}

#[tokio::test]
async fn order_value_over_threshold_ships_free() {
    let app = setup();
    let mut body = create_delivery_body("Bangkok", 3.0, 0.0);
    body["order_value"] = json!(1500.0);

    let delivery = create_delivery(&app, body).await;
    assert_eq!(delivery["delivery_fee"], 0.0);
}

#[tokio::test]
async fn uncovered_province_routes_to_manual_provider_with_one_pending_task() {
    let app = setup();
    let delivery =
        create_delivery(&app, create_delivery_body("Mae Hong Son", 10.0, 0.0)).await;

    assert_eq!(delivery["method"], "third_party");
    assert_eq!(delivery["provider_code"], "nim");
    assert_eq!(delivery["requires_manual_coordination"], true);

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/tasks?delivery_id={}",
            delivery["id"].as_str().unwrap()
        )))
        .await
        .unwrap();
    let tasks = body_json(response).await;
    let tasks = tasks.as_array().unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["status"], "pending");
    assert_eq!(tasks[0]["task_type"], "phone");
    assert_eq!(tasks[0]["reminder_count"], 0);
    assert!(tasks[0]["next_reminder_due"].is_string());
    assert_eq!(tasks[0]["contact_channels"]["phone"], "+66-2-123-4567");
}

#[tokio::test]
async fn cod_to_province_without_cod_capable_provider_is_rejected() {
    let app = setup();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/deliveries",
            create_delivery_body("Mae Hong Son", 10.0, 350.0),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "no_provider_available");
}

#[tokio::test]
async fn invalid_transition_is_rejected_with_specific_kind() {
    let app = setup();
    let delivery = create_delivery(&app, create_delivery_body("Bangkok", 3.0, 0.0)).await;
    let id = delivery["id"].as_str().unwrap();

    let response = patch_status(&app, id, "delivered").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "invalid_status_transition");
}

#[tokio::test]
async fn full_lifecycle_builds_a_chained_timeline_and_replays_are_noops() {
    let app = setup();
    let delivery = create_delivery(&app, create_delivery_body("Bangkok", 3.0, 0.0)).await;
    let id = delivery["id"].as_str().unwrap();

    for status in ["dispatched", "in_transit", "delivered"] {
        let response = patch_status(&app, id, status).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let delivered = body_json(patch_status(&app, id, "delivered").await).await;
    let first_delivery_time = delivered["actual_delivery_time"].clone();
    assert!(first_delivery_time.is_string());

    let response = app
        .clone()
        .oneshot(get_request(&format!("/deliveries/{id}/timeline")))
        .await
        .unwrap();
    let timeline = body_json(response).await;
    let timeline = timeline.as_array().unwrap().clone();

    // created, picked_up, in_transit, delivered; the replay added nothing.
    assert_eq!(timeline.len(), 4);
    assert_eq!(timeline[0]["event"]["type"], "created");
    assert_eq!(timeline[3]["event"]["type"], "delivered");
    assert!(timeline[0]["previous_snapshot_id"].is_null());
    for pair in timeline.windows(2) {
        assert_eq!(pair[1]["previous_snapshot_id"], pair[0]["id"]);
    }

    let response = app
        .clone()
        .oneshot(get_request(&format!("/deliveries/{id}/changes")))
        .await
        .unwrap();
    let changes = body_json(response).await;
    assert_eq!(changes.as_array().unwrap().len(), 3);
    assert_eq!(changes[0]["changes"][0]["field"], "status");
}

#[tokio::test]
async fn cancellation_is_rejected_once_terminal() {
    let app = setup();
    let delivery = create_delivery(&app, create_delivery_body("Bangkok", 3.0, 0.0)).await;
    let id = delivery["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{id}/cancel"),
            json!({ "reason": "customer changed mind" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{id}/cancel"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "invalid_delivery_state");
}

#[tokio::test]
async fn stale_expected_version_conflicts() {
    let app = setup();
    let delivery = create_delivery(&app, create_delivery_body("Bangkok", 3.0, 0.0)).await;
    let id = delivery["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/deliveries/{id}/status"),
            json!({ "status": "dispatched", "expected_version": 99 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "version_conflict");
}

#[tokio::test]
async fn task_completion_requires_notes_and_clears_the_reminder() {
    let app = setup();
    let delivery =
        create_delivery(&app, create_delivery_body("Mae Hong Son", 10.0, 0.0)).await;

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/tasks?delivery_id={}",
            delivery["id"].as_str().unwrap()
        )))
        .await
        .unwrap();
    let tasks = body_json(response).await;
    let task_id = tasks[0]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/tasks/{task_id}/complete"),
            json!({ "notes": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/tasks/{task_id}/complete"),
            json!({ "notes": "Booked by phone", "external_reference": "NIM-99013" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let task = body_json(response).await;
    assert_eq!(task["status"], "completed");
    assert!(task["next_reminder_due"].is_null());
    assert_eq!(task["external_reference"], "NIM-99013");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/tasks/{task_id}/complete"),
            json!({ "notes": "again" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn fresh_tasks_are_not_overdue() {
    let app = setup();
    create_delivery(&app, create_delivery_body("Mae Hong Son", 10.0, 0.0)).await;

    let response = app
        .clone()
        .oneshot(get_request("/tasks/overdue"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let overdue = body_json(response).await;
    assert_eq!(overdue.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn route_lifecycle_reports_efficiency_and_releases_the_vehicle() {
    let app = setup();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/vehicles",
            json!({
                "plate": "1กข-2345",
                "vehicle_type": "van",
                "brand": "Toyota",
                "model": "Hiace",
                "max_weight_kg": 1000.0,
                "max_volume_m3": 8.0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let vehicle = body_json(response).await;
    let vehicle_id = vehicle["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/routes",
            json!({ "vehicle_id": vehicle_id, "route_date": "2025-06-02" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let route = body_json(response).await;
    let route_id = route["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/routes/{route_id}/planning"),
            json!({
                "planned_start": "2025-06-02T01:00:00Z",
                "planned_end": "2025-06-02T09:00:00Z",
                "distance_km": 45.0,
                "order_count": 10
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let delivery = create_delivery(&app, create_delivery_body("Bangkok", 3.0, 0.0)).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/routes/{route_id}/assign-orders"),
            json!({ "delivery_ids": [delivery_id] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/deliveries/{delivery_id}")))
        .await
        .unwrap();
    let assigned = body_json(response).await;
    assert_eq!(assigned["status"], "planned");
    assert_eq!(assigned["vehicle_id"], vehicle["id"]);
    assert_eq!(assigned["route_id"].as_str().unwrap(), route_id);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/routes/{route_id}/start"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/vehicles/{}", vehicle["id"].as_str().unwrap())))
        .await
        .unwrap();
    let on_route = body_json(response).await;
    assert_eq!(on_route["status"], "on_route");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/routes/{route_id}/complete"),
            json!({ "actual_distance_km": 38.0, "actual_delivered": 8 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let completed = body_json(response).await;
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["efficiency"], 80.0);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/vehicles/{}", vehicle["id"].as_str().unwrap())))
        .await
        .unwrap();
    let released = body_json(response).await;
    assert_eq!(released["status"], "active");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/routes/{route_id}/cancel"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn carrier_webhook_is_idempotent_per_external_reference() {
    let app = setup();
    let delivery = create_delivery(&app, create_delivery_body("Khon Kaen", 3.0, 0.0)).await;
    assert_eq!(delivery["provider_code"], "flash");
    let id = delivery["id"].as_str().unwrap().to_string();

    let webhook = json!({
        "provider_code": "flash",
        "external_reference": "FL-20250602-001",
        "delivery_id": id,
        "tracking_number": "TH0099887766",
        "status": "dispatched"
    });

    let response = app
        .clone()
        .oneshot(json_request("POST", "/webhooks/carrier", webhook.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["status"], "dispatched");
    assert_eq!(updated["tracking_number"], "TH0099887766");

    // Replay: same reference, same status; nothing moves.
    let response = app
        .clone()
        .oneshot(json_request("POST", "/webhooks/carrier", webhook))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/deliveries/{id}/timeline")))
        .await
        .unwrap();
    let timeline = body_json(response).await;
    assert_eq!(timeline.as_array().unwrap().len(), 2);

    // A later update may omit our id and resolve by reference alone.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/webhooks/carrier",
            json!({
                "provider_code": "flash",
                "external_reference": "FL-20250602-001",
                "status": "in_transit"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["status"], "in_transit");
}

#[tokio::test]
async fn misconfigured_provider_registration_is_rejected() {
    let app = setup();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/providers",
            json!({
                "code": "bestexpress",
                "name": "Best Express",
                "integration": "manual_coordination",
                "max_weight_kg": 50.0,
                "pricing": {
                    "base_rate": 50.0,
                    "per_km_rate": 1.0,
                    "weight_surcharge": 10.0,
                    "same_day_surcharge": 0.0,
                    "cod_surcharge": 0.0
                },
                "service": { "standard_hours": 48 },
                "contact_channels": {},
                "active": true
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "provider_config");
}

#[tokio::test]
async fn coverage_info_distinguishes_self_delivery_from_uncovered() {
    let app = setup();

    let response = app
        .clone()
        .oneshot(get_request("/coverage/Bangkok"))
        .await
        .unwrap();
    let info = body_json(response).await;
    assert_eq!(info["covered"], true);
    assert_eq!(info["self_delivery"], true);
    assert_eq!(info["route_code"], "BKK-01");
    assert_eq!(info["base_fee"], 50.0);

    let response = app
        .clone()
        .oneshot(get_request("/coverage/Mae%20Hong%20Son"))
        .await
        .unwrap();
    let info = body_json(response).await;
    assert_eq!(info["covered"], false);
    assert_eq!(info["self_delivery"], false);
}

#[tokio::test]
async fn unknown_delivery_is_not_found() {
    let app = setup();
    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/deliveries/{}/timeline",
            uuid::Uuid::new_v4()
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "not_found");
}
