//! Activity and error logs: recording, queries, statistics and retention.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::domain::logs::{
    ActivityFilter, ActivityLog, ActivityStats, ErrorFilter, ErrorLog, ErrorStats,
    NewActivityLog, NewErrorLog,
};
use crate::domain::{Page, PageRequest};
use crate::error::AppError;
use crate::persistence::Store;

/// How often the retention task runs.
pub const RETENTION_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Writes and queries the audit tables.
///
/// Recording never fails the request being recorded: store errors are
/// reported with `warn` and dropped.
#[derive(Debug, Clone)]
pub struct AuditService {
    store: Arc<dyn Store>,
}

impl AuditService {
    /// Creates a new `AuditService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Stores one activity row.
    pub async fn record_activity(&self, log: NewActivityLog) {
        if let Err(e) = self.store.insert_activity_log(log).await {
            tracing::warn!(error = %e, "failed to write activity log");
        }
    }

    /// Stores one error row.
    pub async fn record_error(&self, log: NewErrorLog) {
        if let Err(e) = self.store.insert_error_log(log).await {
            tracing::warn!(error = %e, "failed to write error log");
        }
    }

    /// Activity rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] when `start` is after `end`.
    pub async fn activities(
        &self,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> Result<Page<ActivityLog>, AppError> {
        check_range(filter.start, filter.end)?;
        self.store.activity_logs(filter, page).await
    }

    /// Error rows, newest first.
    ///
    /// # Errors
    ///
    /// As [`Self::activities`].
    pub async fn errors(
        &self,
        filter: &ErrorFilter,
        page: PageRequest,
    ) -> Result<Page<ErrorLog>, AppError> {
        check_range(filter.start, filter.end)?;
        self.store.error_logs(filter, page).await
    }

    /// Aggregates over activity rows.
    ///
    /// # Errors
    ///
    /// As [`Self::activities`].
    pub async fn activity_stats(&self, filter: &ActivityFilter) -> Result<ActivityStats, AppError> {
        check_range(filter.start, filter.end)?;
        self.store.activity_stats(filter).await
    }

    /// Aggregates over error rows.
    ///
    /// # Errors
    ///
    /// As [`Self::activities`].
    pub async fn error_stats(&self, filter: &ErrorFilter) -> Result<ErrorStats, AppError> {
        check_range(filter.start, filter.end)?;
        self.store.error_stats(filter).await
    }

    /// Deletes rows older than `retention_days`. Returns the rows removed.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn purge_older_than(&self, retention_days: u64) -> Result<u64, AppError> {
        let cutoff = i64::try_from(retention_days)
            .ok()
            .and_then(chrono::Duration::try_days)
            .and_then(|age| Utc::now().checked_sub_signed(age));
        // A cutoff before the earliest representable date cannot match a row.
        let Some(cutoff) = cutoff else {
            tracing::debug!(retention_days, "retention window exceeds the calendar, nothing to purge");
            return Ok(0);
        };
        self.store.purge_logs_before(cutoff).await
    }

    /// Spawns the hourly retention task. Returns `None` when retention is
    /// disabled (`retention_days == 0`).
    #[must_use]
    pub fn spawn_retention(&self, retention_days: u64) -> Option<JoinHandle<()>> {
        if retention_days == 0 {
            tracing::info!("log retention disabled");
            return None;
        }
        let audit = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RETENTION_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::info!(retention_days, "log retention task started");
            loop {
                ticker.tick().await;
                match audit.purge_older_than(retention_days).await {
                    Ok(0) => tracing::debug!("log retention: nothing to purge"),
                    Ok(removed) => tracing::info!(removed, "log retention purged old rows"),
                    Err(e) => tracing::warn!(error = %e, "log retention failed"),
                }
            }
        }))
    }
}

fn check_range(
    start: Option<chrono::DateTime<Utc>>,
    end: Option<chrono::DateTime<Utc>>,
) -> Result<(), AppError> {
    if let (Some(start), Some(end)) = (start, end)
        && start > end
    {
        return Err(AppError::invalid("start date must not be after end date"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::domain::logs::ErrorLevel;
    use crate::persistence::MemoryStore;

    fn activity(path: &str, status: i32, user: Option<i64>, age_days: i64) -> NewActivityLog {
        NewActivityLog {
            user_id: user.map(UserId::new),
            method: "GET".into(),
            path: path.into(),
            query: None,
            ip_address: "127.0.0.1".into(),
            user_agent: None,
            status_code: status,
            duration_ms: 10,
            timestamp: Utc::now() - chrono::Duration::days(age_days),
        }
    }

    fn error(kind: &str, level: ErrorLevel) -> NewErrorLog {
        NewErrorLog {
            level,
            message: "boom".into(),
            error_type: Some(kind.into()),
            details: None,
            user_id: None,
            path: Some("/api/v1/jobs".into()),
            method: Some("GET".into()),
            query: None,
            ip_address: None,
            user_agent: None,
            source: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn stats_over_recorded_rows() {
        let audit = AuditService::new(Arc::new(MemoryStore::new()));
        audit.record_activity(activity("/a", 200, Some(1), 0)).await;
        audit.record_activity(activity("/a", 404, None, 0)).await;
        audit.record_activity(activity("/b", 201, Some(2), 0)).await;
        audit.record_error(error("NotFound", ErrorLevel::Warning)).await;
        audit.record_error(error("Internal", ErrorLevel::Critical)).await;

        let Ok(stats) = audit.activity_stats(&ActivityFilter::default()).await else {
            panic!("stats failed");
        };
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.successful_requests, 2);
        assert_eq!(stats.failed_requests, 1);
        assert_eq!(stats.unique_users, 2);
        assert_eq!(stats.anonymous_requests, 1);
        assert_eq!(stats.top_paths.first().map(|e| e.key.as_str()), Some("/a"));

        let Ok(errors) = audit.error_stats(&ErrorFilter::default()).await else {
            panic!("stats failed");
        };
        assert_eq!(errors.total_errors, 2);
        assert_eq!(errors.critical_errors, 1);
        assert_eq!(errors.warnings, 1);
    }

    #[tokio::test]
    async fn inverted_ranges_are_rejected() {
        let audit = AuditService::new(Arc::new(MemoryStore::new()));
        let now = Utc::now();
        let filter = ActivityFilter {
            start: Some(now),
            end: Some(now - chrono::Duration::hours(1)),
            ..ActivityFilter::default()
        };
        assert!(matches!(
            audit.activities(&filter, PageRequest::default()).await,
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn purge_keeps_recent_rows() {
        let audit = AuditService::new(Arc::new(MemoryStore::new()));
        audit.record_activity(activity("/old", 200, None, 120)).await;
        audit.record_activity(activity("/new", 200, None, 1)).await;
        assert!(matches!(audit.purge_older_than(90).await, Ok(1)));
        let Ok(page) = audit
            .activities(&ActivityFilter::default(), PageRequest::default())
            .await
        else {
            panic!("query failed");
        };
        assert_eq!(page.data.len(), 1);
        assert!(audit.spawn_retention(0).is_none());
    }

    #[tokio::test]
    async fn huge_retention_windows_purge_nothing() {
        let audit = AuditService::new(Arc::new(MemoryStore::new()));
        audit.record_activity(activity("/old", 200, None, 3650)).await;
        for days in [1_000_000_000, u64::MAX] {
            let purge = tokio::spawn({
                let audit = audit.clone();
                async move { audit.purge_older_than(days).await }
            });
            let Ok(result) = purge.await else {
                panic!("purge task panicked for {days} days");
            };
            assert!(matches!(result, Ok(0)));
        }
        let Ok(page) = audit
            .activities(&ActivityFilter::default(), PageRequest::default())
            .await
        else {
            panic!("query failed");
        };
        assert_eq!(page.data.len(), 1);
    }
}
