use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::store::ErrorCategory;

/// Process-wide counters, shared between the store and the web handlers.
#[derive(Debug, Default)]
pub struct Metrics {
    found: AtomicU64,
    not_found: AtomicU64,
    invalid_request: AtomicU64,
    unavailable: AtomicU64,
    timeout: AtomicU64,
    os_error: AtomicU64,

    requests: AtomicU64,
    views: AtomicU64,
    edits: AtomicU64,
    web_not_found: AtomicU64,
}

pub type SharedMetrics = Arc<Metrics>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCounts {
    #[serde(rename = "invalid-request")]
    pub invalid_request: u64,
    pub unavailable: u64,
    pub timeout: u64,
    #[serde(rename = "os-error")]
    pub os_error: u64,
}

/// A point-in-time copy of all counters, in the shape served at `/debug/vars`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Snapshot {
    pub store_found: u64,
    pub store_not_found: u64,
    pub store_errors: ErrorCounts,
    pub num_requests: u64,
    pub num_views: u64,
    pub num_edits: u64,
    pub num_notfounds: u64,
}

impl Metrics {
    pub fn record_found(&self) {
        self.found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, category: ErrorCategory) {
        let counter = match category {
            ErrorCategory::InvalidRequest => &self.invalid_request,
            ErrorCategory::Unavailable => &self.unavailable,
            ErrorCategory::Timeout => &self.timeout,
            ErrorCategory::OsError => &self.os_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_view(&self) {
        self.views.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_edit(&self) {
        self.edits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_web_not_found(&self) {
        self.web_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        Snapshot {
            store_found: load(&self.found),
            store_not_found: load(&self.not_found),
            store_errors: ErrorCounts {
                invalid_request: load(&self.invalid_request),
                unavailable: load(&self.unavailable),
                timeout: load(&self.timeout),
                os_error: load(&self.os_error),
            },
            num_requests: load(&self.requests),
            num_views: load(&self.views),
            num_edits: load(&self.edits),
            num_notfounds: load(&self.web_not_found),
        }
    }
}
