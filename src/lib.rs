pub mod auth;
pub mod config;
pub mod cooldown;
pub mod database;
pub mod judge;
pub mod language;
pub mod problem;
pub mod routes;
pub mod submission;
pub mod web_server;

pub fn create_timestamp() -> String {
    use chrono::{SecondsFormat, Utc};
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
