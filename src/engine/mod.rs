pub mod coverage;
pub mod dispatch;
pub mod lifecycle;
pub mod registry;
pub mod reminders;
pub mod routes;
