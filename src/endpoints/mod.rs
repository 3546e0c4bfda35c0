use axum::Router;
use serde::Serialize;

use crate::AppState;

mod admin;
mod reports;

/// A plain acknowledgement body.
#[derive(Serialize, Debug)]
struct Message {
    message: &'static str,
}

pub fn routes() -> Router<AppState> {
    Router::new().nest("/api", reports::routes().merge(admin::routes()))
}
