use crate::metrics;
use crate::storage::ActivityStore;
use crate::error::Result;
use crate::types::{RawActivity, RawSource};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of planning a deduplication pass over one source table
#[derive(Debug, Clone, Default)]
pub struct DedupPlan {
    pub keep: Vec<RawActivity>,
    pub remove: Vec<RawActivity>,
    /// Number of (name, provider) groups with more than one row
    pub duplicate_groups: usize,
}

/// Group rows by the exact (activity name, provider name) pair and keep the most
/// recently imported row of each group. Equal timestamps keep the higher id.
pub fn plan_duplicates(rows: Vec<RawActivity>) -> DedupPlan {
    let mut groups: HashMap<(String, String), Vec<RawActivity>> = HashMap::new();
    let mut order: Vec<(String, String)> = Vec::new();

    for row in rows {
        let key = (row.activity_name.clone(), row.provider_name.clone());
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(row);
    }

    let mut plan = DedupPlan::default();
    for key in order {
        let Some(mut group) = groups.remove(&key) else {
            continue;
        };
        if group.len() > 1 {
            plan.duplicate_groups += 1;
            group.sort_by(|a, b| b.imported_at.cmp(&a.imported_at).then_with(|| b.id.cmp(&a.id)));
        }
        let mut members = group.into_iter();
        if let Some(newest) = members.next() {
            plan.keep.push(newest);
        }
        plan.remove.extend(members);
    }
    plan
}

/// Summary of one deduplication run
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupReport {
    pub source: String,
    pub examined: usize,
    pub duplicate_groups: usize,
    pub kept: usize,
    pub removed: usize,
    pub failed_deletions: usize,
}

pub struct Deduplicator {
    store: Arc<dyn ActivityStore>,
}

impl std::fmt::Debug for Deduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("store", &"<Arc<dyn ActivityStore>>")
            .finish()
    }
}

impl Deduplicator {
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self { store }
    }

    /// Delete every raw row superseded by a newer import of the same activity.
    ///
    /// A failed delete is logged and counted; the remaining groups are still processed.
    #[instrument(skip(self))]
    pub async fn run(&self, source: RawSource) -> Result<DedupReport> {
        let rows = self.store.get_raw_activities(source).await?;
        let examined = rows.len();
        info!("Checking {} raw rows in {} for duplicates", examined, source);

        let plan = plan_duplicates(rows);
        let mut report = DedupReport {
            source: source.table_name().to_string(),
            examined,
            duplicate_groups: plan.duplicate_groups,
            kept: plan.keep.len(),
            ..DedupReport::default()
        };

        for duplicate in &plan.remove {
            let Some(id) = duplicate.id else {
                warn!("Skipping duplicate without id: {}", duplicate.activity_name);
                report.failed_deletions += 1;
                continue;
            };

            match self.store.delete_raw_activity(source, id).await {
                Ok(()) => {
                    debug!(
                        "Removed duplicate {} ({} / {}) imported at {}",
                        id, duplicate.activity_name, duplicate.provider_name, duplicate.imported_at
                    );
                    report.removed += 1;
                }
                Err(e) => {
                    warn!("Failed to delete duplicate {} from {}: {}", id, source, e);
                    metrics::record_failure("dedup");
                    report.failed_deletions += 1;
                }
            }
        }

        metrics::record_duplicates_removed(source.table_name(), report.removed as u64);
        info!(
            "Dedup of {} finished: {} groups, {} kept, {} removed, {} failed",
            source, report.duplicate_groups, report.kept, report.removed, report.failed_deletions
        );
        Ok(report)
    }
}
