//! SQLite-backed report storage.
//!
//! Every multi-row write runs inside a single transaction. Unless committed, a
//! transaction is rolled back when dropped, so an early return via `?` never leaves
//! a partial write behind.

mod models;

use std::str::FromStr as _;

use anyhow::Context as _;
use chrono::{SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    access_code::{generate_access_code, hash_access_code},
    metrics,
};

pub use models::{
    AccessGrant, NewReport, Report, ReportWithUpdates, StatusUpdate, INITIAL_STATUS,
};

/// Failures surfaced by [`ReportStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no matching report")]
    NotFound,
    #[error("unique constraint violated")]
    Conflict,
    #[error("database error")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict,
            _ => Self::Database(err),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The outcome of a successful submission. The plaintext code exists only here.
#[derive(Debug, Clone)]
pub struct CreatedReport {
    pub report_id: String,
    pub access_code: String,
}

/// Current time in the fixed-width format stored in `created_at` columns.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Handle to the report database. Cheap to clone; all clones share one pool.
#[derive(Clone, Debug)]
pub struct ReportStore {
    pool: SqlitePool,
}

impl ReportStore {
    /// Connect to the database at `url`, creating it if needed, and apply migrations.
    pub async fn open(url: &str) -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)
            .context("failed to parse database options")?
            .create_if_missing(true)
            .foreign_keys(true);

        // SQLite creates the file but not its directory.
        if let Some(parent) = opts.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to connect to {url}"))?;

        sqlx::migrate!()
            .run(&pool)
            .await
            .context("failed to apply migrations")?;

        info!("connected to the report database");
        Ok(Self { pool })
    }

    /// Close every pooled connection. Outstanding clones become unusable.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert a report with status [`INITIAL_STATUS`] and a freshly generated access code.
    ///
    /// A code whose digest is already taken is discarded and a new one drawn, up to
    /// `attempts` times in total. Each attempt is its own transaction.
    pub async fn create_report(
        &self,
        report: &NewReport,
        attempts: u32,
    ) -> StoreResult<CreatedReport> {
        self.create_report_with(report, attempts, generate_access_code).await
    }

    /// Like [`Self::create_report`], drawing candidate codes from `next_code`.
    pub async fn create_report_with(
        &self,
        report: &NewReport,
        attempts: u32,
        mut next_code: impl FnMut() -> String + Send,
    ) -> StoreResult<CreatedReport> {
        for attempt in 1..=attempts.max(1) {
            let access_code = next_code();
            match self.create_report_with_code(report, &access_code).await {
                Ok(report_id) => {
                    return Ok(CreatedReport {
                        report_id,
                        access_code,
                    })
                }
                Err(StoreError::Conflict) => {
                    ::metrics::counter!(metrics::CODE_COLLISIONS).increment(1);
                    warn!("access code collision on attempt {attempt}, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::Conflict)
    }

    /// Insert a report and the grant for `access_code` atomically.
    ///
    /// Fails with [`StoreError::Conflict`] if the code's digest already maps to a report;
    /// nothing is written in that case.
    pub async fn create_report_with_code(
        &self,
        report: &NewReport,
        access_code: &str,
    ) -> StoreResult<String> {
        let report_id = Uuid::new_v4().to_string();
        let grant_id = Uuid::new_v4().to_string();
        let code_hash = hash_access_code(access_code);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO reports (id, category, location, description, status, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report_id)
        .bind(&report.category)
        .bind(report.location.as_deref())
        .bind(&report.description)
        .bind(INITIAL_STATUS)
        .bind(timestamp())
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO report_access (id, report_id, code_hash) VALUES (?, ?, ?)")
            .bind(&grant_id)
            .bind(&report_id)
            .bind(&code_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("new report created with id {report_id}");
        Ok(report_id)
    }

    /// Look up the grant for a code. The code is trimmed before hashing.
    pub async fn find_grant(&self, access_code: &str) -> StoreResult<AccessGrant> {
        let code_hash = hash_access_code(access_code);
        debug!("looking up grant for digest {code_hash}");

        sqlx::query_as::<_, AccessGrant>(
            "SELECT id, report_id, code_hash FROM report_access WHERE code_hash = ?",
        )
        .bind(&code_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    /// Resolve a code to its report and full history in the order it was appended.
    pub async fn find_report_by_code(&self, access_code: &str) -> StoreResult<ReportWithUpdates> {
        let grant = self.find_grant(access_code).await?;
        debug!("grant {} maps to report {}", grant.id, grant.report_id);

        let mut conn = self.pool.acquire().await?;

        let report = sqlx::query_as::<_, Report>(
            r#"
            SELECT id, category, location, description, status, created_at
                FROM reports
                WHERE id = ?
            "#,
        )
        .bind(&grant.report_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::NotFound)?;

        let updates = sqlx::query_as::<_, StatusUpdate>(
            r#"
            SELECT id, report_id, message, new_status, created_at
                FROM report_updates
                WHERE report_id = ?
                ORDER BY rowid ASC
            "#,
        )
        .bind(&report.id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(ReportWithUpdates { report, updates })
    }

    /// Every report, newest first.
    pub async fn list_all_reports(&self) -> StoreResult<Vec<Report>> {
        let reports = sqlx::query_as::<_, Report>(
            r#"
            SELECT id, category, location, description, status, created_at
                FROM reports
                ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(reports)
    }

    /// Record a status update and move the report to `new_status` in one transaction.
    ///
    /// Fails with [`StoreError::NotFound`] if `report_id` names no report.
    pub async fn append_update(
        &self,
        report_id: &str,
        new_status: &str,
        message: &str,
    ) -> StoreResult<StatusUpdate> {
        let mut tx = self.pool.begin().await?;

        let res = sqlx::query("UPDATE reports SET status = ? WHERE id = ?")
            .bind(new_status)
            .bind(report_id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        let update = StatusUpdate {
            id: Uuid::new_v4().to_string(),
            report_id: report_id.to_owned(),
            message: message.to_owned(),
            new_status: new_status.to_owned(),
            created_at: timestamp(),
        };

        sqlx::query(
            r#"
            INSERT INTO report_updates (id, report_id, message, new_status, created_at)
                VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&update.id)
        .bind(&update.report_id)
        .bind(&update.message)
        .bind(&update.new_status)
        .bind(&update.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("report {report_id} updated to status {new_status}");
        Ok(update)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use rand::{rngs::StdRng, SeedableRng as _};

    use super::*;
    use crate::{access_code::generate_with, tests::TempDir};

    async fn open_store() -> Result<(TempDir, ReportStore)> {
        let dir = TempDir::new()?;
        let store =
            ReportStore::open(&format!("sqlite://{}/test.db", dir.path().display())).await?;
        Ok((dir, store))
    }

    fn theft() -> NewReport {
        NewReport {
            category: "theft".to_owned(),
            location: None,
            description: "bike stolen".to_owned(),
        }
    }

    #[tokio::test]
    async fn created_code_resolves_to_report() -> Result<()> {
        let (_dir, store) = open_store().await?;

        let created = store.create_report(&theft(), 5).await?;
        let found = store.find_report_by_code(&created.access_code).await?;

        assert_eq!(found.report.id, created.report_id);
        assert_eq!(found.report.category, "theft");
        assert_eq!(found.report.location, None);
        assert_eq!(found.report.description, "bike stolen");
        assert_eq!(found.report.status, INITIAL_STATUS);
        assert!(found.updates.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn plaintext_code_is_never_stored() -> Result<()> {
        let (_dir, store) = open_store().await?;
        let created = store.create_report(&theft(), 5).await?;

        let stored: Vec<String> = sqlx::query_scalar("SELECT code_hash FROM report_access")
            .fetch_all(store.pool())
            .await?;
        assert_eq!(stored, vec![hash_access_code(&created.access_code)]);

        let grant = store.find_grant(&created.access_code).await?;
        assert_eq!(grant.report_id, created.report_id);
        assert_eq!(grant.code_hash, stored[0]);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() -> Result<()> {
        let (_dir, store) = open_store().await?;
        store.create_report(&theft(), 5).await?;

        let res = store.find_report_by_code("never-issued-000").await;
        assert!(matches!(res, Err(StoreError::NotFound)));
        Ok(())
    }

    #[tokio::test]
    async fn lookup_trims_but_is_case_sensitive() -> Result<()> {
        let (_dir, store) = open_store().await?;
        let id = store
            .create_report_with_code(&theft(), "ocean-maple-482")
            .await?;

        let found = store.find_report_by_code("  ocean-maple-482 ").await?;
        assert_eq!(found.report.id, id);

        let res = store.find_report_by_code("Ocean-Maple-482").await;
        assert!(matches!(res, Err(StoreError::NotFound)));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected_without_side_effects() -> Result<()> {
        let (_dir, store) = open_store().await?;
        let first = store
            .create_report_with_code(&theft(), "ocean-maple-482")
            .await?;

        let other = NewReport {
            category: "vandalism".to_owned(),
            location: Some("station".to_owned()),
            description: "graffiti".to_owned(),
        };
        let res = store.create_report_with_code(&other, "ocean-maple-482").await;
        assert!(matches!(res, Err(StoreError::Conflict)));

        // The first mapping is intact and the second report was rolled back.
        let found = store.find_report_by_code("ocean-maple-482").await?;
        assert_eq!(found.report.id, first);
        assert_eq!(store.list_all_reports().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn collision_draws_a_new_code() -> Result<()> {
        let (_dir, store) = open_store().await?;

        // Same seed as the generator below, so `taken` is its first candidate.
        let mut preview = StdRng::seed_from_u64(11);
        let taken = generate_with(&mut preview);
        let expected = generate_with(&mut preview);
        let first = store.create_report_with_code(&theft(), &taken).await?;

        let mut rng = StdRng::seed_from_u64(11);
        let created = store
            .create_report_with(&theft(), 5, || generate_with(&mut rng))
            .await?;

        assert_eq!(created.access_code, expected);
        assert_ne!(created.access_code, taken);
        assert_eq!(store.find_report_by_code(&taken).await?.report.id, first);
        assert_eq!(
            store.find_report_by_code(&expected).await?.report.id,
            created.report_id
        );
        assert_eq!(store.list_all_reports().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn exhausted_attempts_are_a_conflict() -> Result<()> {
        let (_dir, store) = open_store().await?;
        store
            .create_report_with_code(&theft(), "ocean-maple-482")
            .await?;

        let mut drawn = 0;
        let res = store
            .create_report_with(&theft(), 3, || {
                drawn += 1;
                "ocean-maple-482".to_owned()
            })
            .await;

        assert!(matches!(res, Err(StoreError::Conflict)));
        assert_eq!(drawn, 3);
        assert_eq!(store.list_all_reports().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn history_keeps_append_order_when_clock_steps_back() -> Result<()> {
        let (_dir, store) = open_store().await?;
        let created = store.create_report(&theft(), 5).await?;

        let first = store
            .append_update(&created.report_id, "triaged", "seen")
            .await?;
        let second = store
            .append_update(&created.report_id, "closed", "done")
            .await?;

        // A later update stamped before the earlier one.
        sqlx::query("UPDATE report_updates SET created_at = ? WHERE id = ?")
            .bind("2000-01-01T00:00:00.000000Z")
            .bind(&second.id)
            .execute(store.pool())
            .await?;

        let found = store.find_report_by_code(&created.access_code).await?;
        let ids: Vec<&str> = found.updates.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
        assert_eq!(found.report.status, second.new_status);
        Ok(())
    }

    #[tokio::test]
    async fn updates_are_ordered_and_drive_status() -> Result<()> {
        let (_dir, store) = open_store().await?;
        let created = store.create_report(&theft(), 5).await?;

        let statuses = ["triaged", "investigating", "investigating", "closed"];
        for (i, status) in statuses.iter().enumerate() {
            store
                .append_update(&created.report_id, status, &format!("step {i}"))
                .await?;
        }

        let found = store.find_report_by_code(&created.access_code).await?;
        assert_eq!(found.updates.len(), statuses.len());
        for (i, (update, status)) in found.updates.iter().zip(statuses).enumerate() {
            assert_eq!(update.new_status, status);
            assert_eq!(update.message, format!("step {i}"));
            assert_eq!(update.report_id, created.report_id);
        }
        assert!(found
            .updates
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at));
        assert_eq!(found.report.status, "closed");
        Ok(())
    }

    #[tokio::test]
    async fn update_for_missing_report_writes_nothing() -> Result<()> {
        let (_dir, store) = open_store().await?;

        let res = store
            .append_update(&Uuid::new_v4().to_string(), "closed", "done")
            .await;
        assert!(matches!(res, Err(StoreError::NotFound)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM report_updates")
            .fetch_one(store.pool())
            .await?;
        assert_eq!(count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn list_is_newest_first() -> Result<()> {
        let (_dir, store) = open_store().await?;
        let r1 = store.create_report(&theft(), 5).await?;
        let r2 = store.create_report(&theft(), 5).await?;

        let ids: Vec<String> = store
            .list_all_reports()
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![r2.report_id, r1.report_id]);
        Ok(())
    }

    #[tokio::test]
    async fn deleting_report_cascades() -> Result<()> {
        let (_dir, store) = open_store().await?;
        let created = store.create_report(&theft(), 5).await?;
        store
            .append_update(&created.report_id, "triaged", "seen")
            .await?;

        sqlx::query("DELETE FROM reports WHERE id = ?")
            .bind(&created.report_id)
            .execute(store.pool())
            .await?;

        let grants: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM report_access")
            .fetch_one(store.pool())
            .await?;
        let updates: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM report_updates")
            .fetch_one(store.pool())
            .await?;
        assert_eq!((grants, updates), (0, 0));
        Ok(())
    }
}
