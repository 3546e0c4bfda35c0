//! Row types for the report tables.

use serde::{Deserialize, Serialize};

/// Status assigned to every freshly submitted report.
pub const INITIAL_STATUS: &str = "new";

#[derive(Serialize, Deserialize, sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
/// A submitted report.
pub struct Report {
    pub id: String,
    pub category: String,
    pub location: Option<String>,
    pub description: String,
    /// Mirrors the `new_status` of the latest update, or [`INITIAL_STATUS`].
    pub status: String,
    /// RFC 3339, UTC, microsecond precision.
    pub created_at: String,
}

#[derive(Serialize, Deserialize, sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
/// An entry in a report's append-only status history.
pub struct StatusUpdate {
    pub id: String,
    pub report_id: String,
    pub message: String,
    pub new_status: String,
    pub created_at: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
/// Maps an access code digest to the report it unlocks.
pub struct AccessGrant {
    pub id: String,
    pub report_id: String,
    pub code_hash: String,
}

#[derive(Debug, Clone)]
/// The submitter-provided fields of a new report.
pub struct NewReport {
    pub category: String,
    pub location: Option<String>,
    pub description: String,
}

#[derive(Serialize, Debug, Clone)]
/// A report together with its history, oldest update first.
pub struct ReportWithUpdates {
    pub report: Report,
    pub updates: Vec<StatusUpdate>,
}
