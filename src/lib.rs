//! Anonymous report intake service.
mod access_code;
mod auth;
mod config;
mod endpoints;
pub mod error;
mod metrics;
mod reports;
mod serve;
mod store;

pub use error::Error;
pub use serve::run;
use serve::{AppState, Result};

/// The index (/) route.
async fn index() -> impl axum::response::IntoResponse {
    r"
Anonymous report service

Submit a report with POST /api/reports and keep the access code you get back.
Check on it later with GET /api/reports/{access_code}.
    "
}
