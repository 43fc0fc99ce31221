//! Scripted workflows composed from the gateway and the pipeline state
//! machine. Per-item failures are recorded in the returned batch.

pub mod assignment;
pub mod reports;
pub mod stale;

use crate::resources::{ListQuery, MAX_PAGE_SIZE};

/// Workflows scan a single page of pipelines.
pub(crate) fn scan_query() -> ListQuery {
    ListQuery::with_limit(MAX_PAGE_SIZE).fields("All")
}
