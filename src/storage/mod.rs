pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

use crate::error::Result;
use crate::types::{CleanedActivity, CleaningRun, Platform, RawActivity, RawSource};
use async_trait::async_trait;
use serde::Deserialize;
use std::cmp::Ordering;
use uuid::Uuid;

/// Storage trait for raw imports, cleaned activities and run bookkeeping
#[async_trait]
pub trait ActivityStore: Send + Sync {
    // Raw activity operations
    async fn create_raw_activity(&self, source: RawSource, activity: &mut RawActivity) -> Result<()>;
    /// All rows of one source table, ascending id
    async fn get_raw_activities(&self, source: RawSource) -> Result<Vec<RawActivity>>;
    async fn delete_raw_activity(&self, source: RawSource, id: i64) -> Result<()>;

    // Cleaned activity operations
    async fn get_cleaned_by_origin(
        &self,
        platform: Platform,
        original_id: i64,
    ) -> Result<Option<CleanedActivity>>;
    async fn create_cleaned_activity(&self, activity: &CleanedActivity) -> Result<()>;
    async fn update_cleaned_activity(&self, activity: &CleanedActivity) -> Result<()>;
    async fn delete_cleaned_activity(&self, id: Uuid) -> Result<()>;
    /// Delete every cleaned row, returning how many were removed
    async fn clear_cleaned_activities(&self) -> Result<usize>;
    async fn query_cleaned_activities(&self, filter: &ActivityFilter) -> Result<Vec<CleanedActivity>>;

    // Import batch operations
    async fn has_import_batch(&self, fingerprint: &str) -> Result<bool>;
    async fn record_import_batch(&self, fingerprint: &str, source: RawSource, row_count: usize) -> Result<()>;

    // Cleaning run operations
    async fn create_cleaning_run(&self, run: &mut CleaningRun) -> Result<()>;
    async fn update_cleaning_run(&self, run: &CleaningRun) -> Result<()>;
}

/// Filter over cleaned activities, shared by the HTTP API and reports.
///
/// `city` and `region` compare case-insensitively, `search` is a case-insensitive
/// substring over activity and provider names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityFilter {
    pub city: Option<String>,
    pub platform: Option<Platform>,
    pub region: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl ActivityFilter {
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform: Some(platform),
            ..Self::default()
        }
    }

    pub fn matches(&self, activity: &CleanedActivity) -> bool {
        if let Some(city) = non_empty(&self.city) {
            if activity.city.to_lowercase() != city.to_lowercase() {
                return false;
            }
        }
        if let Some(platform) = self.platform {
            if activity.platform != platform {
                return false;
            }
        }
        if let Some(region) = non_empty(&self.region) {
            if !activity
                .region
                .as_deref()
                .is_some_and(|r| r.to_lowercase() == region.to_lowercase())
            {
                return false;
            }
        }
        if let Some(search) = non_empty(&self.search) {
            let needle = search.to_lowercase();
            if !activity.activity_name.to_lowercase().contains(&needle)
                && !activity.provider_name.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Result ordering: most reviewed first (unknown counts last), then name.
pub fn compare_for_listing(a: &CleanedActivity, b: &CleanedActivity) -> Ordering {
    let reviews = match (a.review_count_numeric, b.review_count_numeric) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    reviews
        .then_with(|| a.activity_name.cmp(&b.activity_name))
        .then_with(|| a.platform.cmp(&b.platform))
        .then_with(|| a.original_id.cmp(&b.original_id))
}
