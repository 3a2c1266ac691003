//! Activity and error log rows, their filters and aggregate statistics.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;

/// Query keys whose values are replaced before a query string is stored.
const SENSITIVE_KEY_PARTS: [&str; 7] = [
    "password",
    "token",
    "secret",
    "key",
    "code",
    "signature",
    "authorization",
];

/// Placeholder written in place of redacted values.
pub const REDACTED: &str = "***";

/// Number of entries in the top-N breakdowns.
pub const TOP_N: usize = 10;

/// Severity recorded on an error log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ErrorLevel {
    /// Client mistakes: bad input, missing entity, missing credentials.
    Warning,
    /// Rule violations in otherwise valid requests.
    Error,
    /// Server-side failures.
    Critical,
}

text_enum!(ErrorLevel {
    Warning => "Warning",
    Error => "Error",
    Critical => "Critical",
});

/// One HTTP request as recorded by the audit middleware.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivityLog {
    /// Row id.
    pub id: i64,
    /// Authenticated caller, if any.
    pub user_id: Option<UserId>,
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Sanitized query string.
    pub query: Option<String>,
    /// Client address.
    pub ip_address: String,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// Response status.
    pub status_code: i32,
    /// Handling time.
    pub duration_ms: i64,
    /// Request start.
    pub timestamp: DateTime<Utc>,
}

/// Fields needed to insert an [`ActivityLog`].
#[derive(Debug, Clone)]
pub struct NewActivityLog {
    /// Authenticated caller, if any.
    pub user_id: Option<UserId>,
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Sanitized query string.
    pub query: Option<String>,
    /// Client address.
    pub ip_address: String,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// Response status.
    pub status_code: i32,
    /// Handling time.
    pub duration_ms: i64,
    /// Request start.
    pub timestamp: DateTime<Utc>,
}

/// One failed request as recorded by the audit middleware.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorLog {
    /// Row id.
    pub id: i64,
    /// Severity.
    pub level: ErrorLevel,
    /// Full error message.
    pub message: String,
    /// Error category.
    pub error_type: Option<String>,
    /// Additional detail, e.g. a panic payload.
    pub details: Option<String>,
    /// Authenticated caller, if any.
    pub user_id: Option<UserId>,
    /// Request path.
    pub path: Option<String>,
    /// HTTP method.
    pub method: Option<String>,
    /// Sanitized query string.
    pub query: Option<String>,
    /// Client address.
    pub ip_address: Option<String>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// Component that reported the error.
    pub source: Option<String>,
    /// Time of the failure.
    pub timestamp: DateTime<Utc>,
}

/// Fields needed to insert an [`ErrorLog`].
#[derive(Debug, Clone)]
pub struct NewErrorLog {
    /// Severity.
    pub level: ErrorLevel,
    /// Full error message.
    pub message: String,
    /// Error category.
    pub error_type: Option<String>,
    /// Additional detail.
    pub details: Option<String>,
    /// Authenticated caller, if any.
    pub user_id: Option<UserId>,
    /// Request path.
    pub path: Option<String>,
    /// HTTP method.
    pub method: Option<String>,
    /// Sanitized query string.
    pub query: Option<String>,
    /// Client address.
    pub ip_address: Option<String>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// Component that reported the error.
    pub source: Option<String>,
    /// Time of the failure.
    pub timestamp: DateTime<Utc>,
}

/// Filter over activity logs. Bounds are inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityFilter {
    /// Only this caller.
    #[serde(default, alias = "userId")]
    pub user_id: Option<UserId>,
    /// Not before.
    #[serde(default, alias = "startDate")]
    pub start: Option<DateTime<Utc>>,
    /// Not after.
    #[serde(default, alias = "endDate")]
    pub end: Option<DateTime<Utc>>,
}

impl ActivityFilter {
    /// Whether `log` passes the filter.
    #[must_use]
    pub fn matches(&self, log: &ActivityLog) -> bool {
        self.user_id.is_none_or(|u| log.user_id == Some(u))
            && self.start.is_none_or(|s| log.timestamp >= s)
            && self.end.is_none_or(|e| log.timestamp <= e)
    }
}

/// Filter over error logs. Bounds are inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorFilter {
    /// Only this severity.
    #[serde(default)]
    pub level: Option<ErrorLevel>,
    /// Not before.
    #[serde(default, alias = "startDate")]
    pub start: Option<DateTime<Utc>>,
    /// Not after.
    #[serde(default, alias = "endDate")]
    pub end: Option<DateTime<Utc>>,
}

impl ErrorFilter {
    /// Whether `log` passes the filter.
    #[must_use]
    pub fn matches(&self, log: &ErrorLog) -> bool {
        self.level.is_none_or(|l| log.level == l)
            && self.start.is_none_or(|s| log.timestamp >= s)
            && self.end.is_none_or(|e| log.timestamp <= e)
    }
}

/// A key and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CountEntry {
    /// Grouping key (path or error type).
    pub key: String,
    /// Occurrences.
    pub count: u64,
}

/// Aggregates over activity logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ActivityStats {
    /// All requests.
    pub total_requests: u64,
    /// 2xx responses.
    pub successful_requests: u64,
    /// Responses with status 400 or above.
    pub failed_requests: u64,
    /// Distinct authenticated callers.
    pub unique_users: u64,
    /// Requests without a caller.
    pub anonymous_requests: u64,
    /// Mean handling time.
    pub average_duration_ms: f64,
    /// Most requested paths.
    pub top_paths: Vec<CountEntry>,
}

impl ActivityStats {
    /// Computes the statistics over already filtered rows.
    #[must_use]
    pub fn compute<'a>(logs: impl IntoIterator<Item = &'a ActivityLog>) -> Self {
        let mut stats = Self::default();
        let mut users = HashSet::new();
        let mut paths: HashMap<&str, u64> = HashMap::new();
        let mut duration_sum = 0i64;
        for log in logs {
            stats.total_requests += 1;
            if (200..300).contains(&log.status_code) {
                stats.successful_requests += 1;
            }
            if log.status_code >= 400 {
                stats.failed_requests += 1;
            }
            match log.user_id {
                Some(user) => {
                    users.insert(user);
                }
                None => stats.anonymous_requests += 1,
            }
            duration_sum = duration_sum.saturating_add(log.duration_ms);
            *paths.entry(log.path.as_str()).or_default() += 1;
        }
        stats.unique_users = users.len() as u64;
        if stats.total_requests > 0 {
            stats.average_duration_ms = duration_sum as f64 / stats.total_requests as f64;
        }
        stats.top_paths = top_counts(paths);
        stats
    }
}

/// Aggregates over error logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ErrorStats {
    /// All errors.
    pub total_errors: u64,
    /// Critical rows.
    pub critical_errors: u64,
    /// Error rows.
    pub errors: u64,
    /// Warning rows.
    pub warnings: u64,
    /// Most frequent error types.
    pub errors_by_type: Vec<CountEntry>,
    /// Paths that failed most often.
    pub errors_by_path: Vec<CountEntry>,
}

impl ErrorStats {
    /// Computes the statistics over already filtered rows.
    #[must_use]
    pub fn compute<'a>(logs: impl IntoIterator<Item = &'a ErrorLog>) -> Self {
        let mut stats = Self::default();
        let mut types: HashMap<&str, u64> = HashMap::new();
        let mut paths: HashMap<&str, u64> = HashMap::new();
        for log in logs {
            stats.total_errors += 1;
            match log.level {
                ErrorLevel::Critical => stats.critical_errors += 1,
                ErrorLevel::Error => stats.errors += 1,
                ErrorLevel::Warning => stats.warnings += 1,
            }
            if let Some(kind) = log.error_type.as_deref() {
                *types.entry(kind).or_default() += 1;
            }
            if let Some(path) = log.path.as_deref() {
                *paths.entry(path).or_default() += 1;
            }
        }
        stats.errors_by_type = top_counts(types);
        stats.errors_by_path = top_counts(paths);
        stats
    }
}

/// Sorts by descending count, then key, and keeps the first [`TOP_N`].
fn top_counts(counts: HashMap<&str, u64>) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(key, count)| CountEntry {
            key: key.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    entries.truncate(TOP_N);
    entries
}

/// Redacts the values of credential-like keys in a raw query string.
///
/// Returns `None` for an empty query. Keys are matched case-insensitively
/// on substrings, so `access_token` and `apiKey` are both redacted.
#[must_use]
pub fn sanitize_query(raw: Option<&str>) -> Option<String> {
    let raw = raw.map(|q| q.trim_start_matches('?')).filter(|q| !q.is_empty())?;
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw).unwrap_or_default();
    if pairs.is_empty() {
        return Some(REDACTED.to_string());
    }
    let redacted: Vec<(String, String)> = pairs
        .into_iter()
        .map(|(key, value)| {
            let lower = key.to_ascii_lowercase();
            if SENSITIVE_KEY_PARTS.iter().any(|part| lower.contains(part)) {
                (key, REDACTED.to_string())
            } else {
                (key, value)
            }
        })
        .collect();
    serde_urlencoded::to_string(&redacted).ok()
}
