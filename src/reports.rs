//! Report submission, lookup and status management.

use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    error::ReportError,
    metrics,
    store::{
        CreatedReport, NewReport, Report, ReportStore, ReportWithUpdates, StatusUpdate,
        StoreError,
    },
};

pub const MAX_CATEGORY_LEN: usize = 100;
pub const MAX_LOCATION_LEN: usize = 255;
pub const MAX_STATUS_LEN: usize = 50;

#[derive(Deserialize, Debug, Default, Clone)]
/// A report as submitted by an anonymous user.
pub struct SubmitReport {
    pub category: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
/// An admin's status change for one report.
pub struct UpdateReport {
    pub new_status: Option<String>,
    pub message: Option<String>,
}

/// Require a present, non-blank value.
fn required(field: &str, value: Option<String>) -> Result<String, ReportError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ReportError::Validation(format!("{field} is required")))
}

fn max_len(field: &str, value: &str, max: usize) -> Result<(), ReportError> {
    if value.chars().count() > max {
        return Err(ReportError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Orchestrates report operations on top of a [`ReportStore`].
#[derive(Clone, Debug)]
pub struct ReportService {
    store: ReportStore,
    code_attempts: u32,
}

impl ReportService {
    pub fn new(store: ReportStore, code_attempts: u32) -> Self {
        Self {
            store,
            code_attempts,
        }
    }

    /// Validate and store a new report.
    ///
    /// The returned access code is the only copy of the plaintext; the store keeps its digest.
    pub async fn submit(&self, input: SubmitReport) -> Result<CreatedReport, ReportError> {
        let category = required("category", input.category)?;
        let description = required("description", input.description)?;
        let location = input.location.filter(|l| !l.trim().is_empty());

        max_len("category", &category, MAX_CATEGORY_LEN)?;
        if let Some(location) = &location {
            max_len("location", location, MAX_LOCATION_LEN)?;
        }

        let report = NewReport {
            category,
            location,
            description,
        };
        let created = self
            .store
            .create_report(&report, self.code_attempts)
            .await
            .map_err(|e| ReportError::from_store("failed to create report", e))?;

        ::metrics::counter!(metrics::REPORTS_CREATED).increment(1);
        info!("accepted submission as report {}", created.report_id);
        Ok(created)
    }

    /// Resolve an access code to its report and history.
    pub async fn lookup(&self, access_code: &str) -> Result<ReportWithUpdates, ReportError> {
        if access_code.trim().is_empty() {
            return Err(ReportError::Validation(
                "access code cannot be empty".to_owned(),
            ));
        }

        ::metrics::counter!(metrics::REPORT_LOOKUPS).increment(1);
        match self.store.find_report_by_code(access_code).await {
            Ok(found) => {
                debug!("access code resolved to report {}", found.report.id);
                Ok(found)
            }
            Err(StoreError::NotFound) => {
                ::metrics::counter!(metrics::REPORT_LOOKUP_MISSES).increment(1);
                Err(ReportError::NotFound)
            }
            Err(e) => Err(ReportError::from_store("error querying database", e)),
        }
    }

    /// All reports, newest first.
    pub async fn list(&self) -> Result<Vec<Report>, ReportError> {
        self.store
            .list_all_reports()
            .await
            .map_err(|e| ReportError::from_store("error querying database", e))
    }

    /// Append a status update to `report_id`. Any status may follow any other.
    pub async fn update(
        &self,
        report_id: &str,
        input: UpdateReport,
    ) -> Result<StatusUpdate, ReportError> {
        let new_status = required("new_status", input.new_status)?;
        let new_status = new_status.trim();
        max_len("new_status", new_status, MAX_STATUS_LEN)?;
        let message = input
            .message
            .ok_or_else(|| ReportError::Validation("message is required".to_owned()))?;

        let update = self
            .store
            .append_update(report_id, new_status, &message)
            .await
            .map_err(|e| ReportError::from_store("failed to update report", e))?;

        ::metrics::counter!(metrics::STATUS_UPDATES).increment(1);
        Ok(update)
    }
}
