use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{
    reports::{ReportService, SubmitReport},
    store::ReportWithUpdates,
    AppState, Error, Result,
};

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SubmitReportOutput {
    /// Shown to the submitter once and never retrievable again.
    access_code: String,
}

async fn submit_report(
    State(reports): State<ReportService>,
    body: std::result::Result<Json<SubmitReport>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitReportOutput>)> {
    let Json(input) = body.map_err(|_rej| Error::bad_request("invalid request body"))?;
    let created = reports.submit(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitReportOutput {
            access_code: created.access_code,
        }),
    ))
}

async fn get_report_status(
    State(reports): State<ReportService>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<ReportWithUpdates>> {
    let Path(access_code) = path.map_err(|_rej| Error::bad_request("invalid access code"))?;
    Ok(Json(reports.lookup(&access_code).await?))
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    // AP /api/reports
    // UG /api/reports/{access_code}
    Router::new()
        .route("/reports",               post(submit_report))
        .route("/reports/{access_code}", get(get_report_status))
}
