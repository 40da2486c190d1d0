//! SummarySink - Durable log of finalized attendance
//!
//! ## Responsibilities
//!
//! - Append finalized summaries (append-only, no update/delete path)
//! - Create the `final_attendance` table on startup
//!
//! The aggregator only sees the `SummarySink` trait, so the MySQL store can be
//! swapped for an in-memory one in tests.

use crate::error::{Error, Result};
use crate::session_aggregator::AttendanceStats;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlPool;

/// Finalized attendance record. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedSummary {
    pub user_id: String,
    pub session_id: String,
    /// Finalize capture time (UTC)
    pub timestamp: DateTime<Utc>,
    pub total_frames: u64,
    pub attentive_frames: u64,
    pub attendance_percent: f64,
}

impl FinalizedSummary {
    pub fn new(stats: &AttendanceStats, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id: stats.user_id.clone(),
            session_id: stats.session_id.clone(),
            timestamp,
            total_frames: stats.total_frames,
            attentive_frames: stats.attentive_frames,
            attendance_percent: stats.attendance_percent,
        }
    }
}

/// Append-only store for finalized summaries
pub trait SummarySink: Send + Sync {
    /// Append one summary
    fn append<'a>(&'a self, summary: &'a FinalizedSummary) -> BoxFuture<'a, Result<()>>;

    /// Whether the store is reachable
    fn health_check(&self) -> BoxFuture<'_, bool>;
}

/// MySQL-backed sink (`final_attendance` table)
pub struct MySqlSummarySink {
    pool: MySqlPool,
}

impl MySqlSummarySink {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Create the summary table if it does not exist
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS final_attendance (
                id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
                user_id VARCHAR(255) NOT NULL,
                session_id VARCHAR(255) NOT NULL,
                timestamp DATETIME(6) NOT NULL,
                total_frames BIGINT UNSIGNED NOT NULL,
                attentive_frames BIGINT UNSIGNED NOT NULL,
                attendance_percent DOUBLE NOT NULL,
                INDEX idx_final_attendance_session (session_id, user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::info!("final_attendance table ready");
        Ok(())
    }

    async fn insert(&self, summary: &FinalizedSummary) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO final_attendance
                (user_id, session_id, timestamp, total_frames, attentive_frames, attendance_percent)
            VALUES
                (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&summary.user_id)
        .bind(&summary.session_id)
        .bind(summary.timestamp)
        .bind(summary.total_frames)
        .bind(summary.attentive_frames)
        .bind(summary.attendance_percent)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::info!(
            record_id = result.last_insert_id(),
            user_id = %summary.user_id,
            session_id = %summary.session_id,
            attendance_percent = summary.attendance_percent,
            "Final attendance stored"
        );

        Ok(())
    }
}

impl SummarySink for MySqlSummarySink {
    fn append<'a>(&'a self, summary: &'a FinalizedSummary) -> BoxFuture<'a, Result<()>> {
        self.insert(summary).boxed()
    }

    fn health_check(&self) -> BoxFuture<'_, bool> {
        async move { sqlx::query("SELECT 1").execute(&self.pool).await.is_ok() }.boxed()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory sink that can be told to fail or stall its next appends
    #[derive(Default)]
    pub struct MemorySink {
        written: Mutex<Vec<FinalizedSummary>>,
        failures_left: AtomicUsize,
        stall: Option<Duration>,
    }

    impl MemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next `count` appends with a database error
        pub fn failing(count: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(count),
                ..Self::default()
            }
        }

        /// Every append sleeps for `delay` before succeeding
        pub fn stalling(delay: Duration) -> Self {
            Self {
                stall: Some(delay),
                ..Self::default()
            }
        }

        pub fn written(&self) -> Vec<FinalizedSummary> {
            self.written.lock().unwrap().clone()
        }
    }

    impl SummarySink for MemorySink {
        fn append<'a>(&'a self, summary: &'a FinalizedSummary) -> BoxFuture<'a, Result<()>> {
            async move {
                if let Some(delay) = self.stall {
                    tokio::time::sleep(delay).await;
                }
                let fail = self
                    .failures_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if fail {
                    return Err(Error::Database("connection refused".to_string()));
                }
                self.written.lock().unwrap().push(summary.clone());
                Ok(())
            }
            .boxed()
        }

        fn health_check(&self) -> BoxFuture<'_, bool> {
            async { true }.boxed()
        }
    }
}
