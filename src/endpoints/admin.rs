//! Admin routes. Only `login` checks credentials; see [`crate::auth`].

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::Message;
use crate::{
    auth::PlaceholderAdminAuth,
    reports::{ReportService, UpdateReport},
    store::Report,
    AppState, Error, Result,
};

#[derive(Deserialize, Debug)]
struct LoginInput {
    username: Option<String>,
    password: Option<String>,
}

async fn login(
    State(auth): State<PlaceholderAdminAuth>,
    body: std::result::Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<Message>> {
    let Json(input) = body.map_err(|_rej| Error::bad_request("invalid login request"))?;
    let (Some(username), Some(password)) = (input.username, input.password) else {
        return Err(Error::bad_request("invalid login request"));
    };

    auth.login(&username, &password)?;
    Ok(Json(Message {
        message: "Login successful",
    }))
}

async fn list_reports(State(reports): State<ReportService>) -> Result<Json<Vec<Report>>> {
    Ok(Json(reports.list().await?))
}

async fn update_report(
    State(reports): State<ReportService>,
    path: std::result::Result<Path<String>, PathRejection>,
    body: std::result::Result<Json<UpdateReport>, JsonRejection>,
) -> Result<Json<Message>> {
    let Path(report_id) = path.map_err(|_rej| Error::bad_request("invalid report id"))?;
    let Json(input) = body.map_err(|_rej| Error::bad_request("invalid update request body"))?;
    let update = reports.update(&report_id, input).await?;
    info!("admin recorded update {} on report {report_id}", update.id);

    Ok(Json(Message {
        message: "Update successful",
    }))
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    // AP /api/admin/login
    // UG /api/admin/reports
    // AP /api/admin/reports/{id}/update
    Router::new()
        .route("/admin/login",               post(login))
        .route("/admin/reports",             get(list_reports))
        .route("/admin/reports/{id}/update", post(update_report))
}
