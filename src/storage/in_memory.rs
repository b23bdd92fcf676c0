use super::{compare_for_listing, ActivityFilter, ActivityStore};
use crate::error::{PipelineError, Result};
use crate::types::{CleanedActivity, CleaningRun, Platform, RawActivity, RawSource};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    raw: Arc<Mutex<HashMap<RawSource, BTreeMap<i64, RawActivity>>>>,
    next_raw_id: Arc<Mutex<i64>>,
    cleaned: Arc<Mutex<HashMap<Uuid, CleanedActivity>>>,
    import_batches: Arc<Mutex<HashMap<String, (RawSource, usize)>>>,
    cleaning_runs: Arc<Mutex<HashMap<Uuid, CleaningRun>>>,
    /// Raw ids whose deletion should fail, for exercising partial-failure paths
    failing_deletes: Arc<Mutex<Vec<i64>>>,
    /// Raw ids whose cleaned row cannot be created, updated or deleted
    failing_cleaned_writes: Arc<Mutex<Vec<i64>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            raw: Arc::new(Mutex::new(HashMap::new())),
            next_raw_id: Arc::new(Mutex::new(1)),
            cleaned: Arc::new(Mutex::new(HashMap::new())),
            import_batches: Arc::new(Mutex::new(HashMap::new())),
            cleaning_runs: Arc::new(Mutex::new(HashMap::new())),
            failing_deletes: Arc::new(Mutex::new(Vec::new())),
            failing_cleaned_writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make `delete_raw_activity` fail for this raw id
    pub fn fail_delete_of(&self, raw_id: i64) {
        self.failing_deletes.lock().unwrap().push(raw_id);
    }

    /// Make every write to the cleaned row of this raw id fail
    pub fn fail_cleaned_write_of(&self, original_id: i64) {
        self.failing_cleaned_writes.lock().unwrap().push(original_id);
    }

    fn check_cleaned_write(&self, activity: &CleanedActivity) -> Result<()> {
        if self
            .failing_cleaned_writes
            .lock()
            .unwrap()
            .contains(&activity.original_id)
        {
            return Err(PipelineError::Storage {
                message: format!("write of cleaned activity {} rejected", activity.id),
            });
        }
        Ok(())
    }

    pub fn cleaning_runs(&self) -> Vec<CleaningRun> {
        self.cleaning_runs.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl ActivityStore for InMemoryStorage {
    async fn create_raw_activity(&self, source: RawSource, activity: &mut RawActivity) -> Result<()> {
        let id = {
            let mut next = self.next_raw_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        activity.id = Some(id);

        let mut raw = self.raw.lock().unwrap();
        raw.entry(source).or_default().insert(id, activity.clone());

        debug!("Created raw activity: {} with id {} in {}", activity.activity_name, id, source);
        Ok(())
    }

    async fn get_raw_activities(&self, source: RawSource) -> Result<Vec<RawActivity>> {
        let raw = self.raw.lock().unwrap();
        Ok(raw
            .get(&source)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_raw_activity(&self, source: RawSource, id: i64) -> Result<()> {
        if self.failing_deletes.lock().unwrap().contains(&id) {
            return Err(PipelineError::Storage {
                message: format!("delete of raw activity {id} rejected"),
            });
        }

        let mut raw = self.raw.lock().unwrap();
        if let Some(rows) = raw.get_mut(&source) {
            rows.remove(&id);
            debug!("Deleted raw activity {} from {}", id, source);
        }
        Ok(())
    }

    async fn get_cleaned_by_origin(
        &self,
        platform: Platform,
        original_id: i64,
    ) -> Result<Option<CleanedActivity>> {
        let cleaned = self.cleaned.lock().unwrap();
        Ok(cleaned
            .values()
            .find(|a| a.platform == platform && a.original_id == original_id)
            .cloned())
    }

    async fn create_cleaned_activity(&self, activity: &CleanedActivity) -> Result<()> {
        self.check_cleaned_write(activity)?;
        let mut cleaned = self.cleaned.lock().unwrap();
        if cleaned.contains_key(&activity.id) {
            return Err(PipelineError::Storage {
                message: format!("cleaned activity {} already exists", activity.id),
            });
        }
        cleaned.insert(activity.id, activity.clone());

        debug!("Created cleaned activity: {} with id {}", activity.activity_name, activity.id);
        Ok(())
    }

    async fn update_cleaned_activity(&self, activity: &CleanedActivity) -> Result<()> {
        self.check_cleaned_write(activity)?;
        let mut cleaned = self.cleaned.lock().unwrap();
        let Some(existing) = cleaned.get_mut(&activity.id) else {
            return Err(PipelineError::Storage {
                message: format!("cannot update missing cleaned activity {}", activity.id),
            });
        };
        *existing = activity.clone();

        debug!("Updated cleaned activity: {} with id {}", activity.activity_name, activity.id);
        Ok(())
    }

    async fn delete_cleaned_activity(&self, id: Uuid) -> Result<()> {
        let existing = self.cleaned.lock().unwrap().get(&id).cloned();
        if let Some(activity) = existing {
            self.check_cleaned_write(&activity)?;
        }
        self.cleaned.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn clear_cleaned_activities(&self) -> Result<usize> {
        let mut cleaned = self.cleaned.lock().unwrap();
        let count = cleaned.len();
        cleaned.clear();
        Ok(count)
    }

    async fn query_cleaned_activities(&self, filter: &ActivityFilter) -> Result<Vec<CleanedActivity>> {
        let cleaned = self.cleaned.lock().unwrap();
        let mut rows: Vec<CleanedActivity> = cleaned
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        rows.sort_by(compare_for_listing);
        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn has_import_batch(&self, fingerprint: &str) -> Result<bool> {
        Ok(self.import_batches.lock().unwrap().contains_key(fingerprint))
    }

    async fn record_import_batch(&self, fingerprint: &str, source: RawSource, row_count: usize) -> Result<()> {
        self.import_batches
            .lock()
            .unwrap()
            .insert(fingerprint.to_string(), (source, row_count));
        Ok(())
    }

    async fn create_cleaning_run(&self, run: &mut CleaningRun) -> Result<()> {
        let id = Uuid::new_v4();
        run.id = Some(id);

        let mut runs = self.cleaning_runs.lock().unwrap();
        runs.insert(id, run.clone());

        debug!("Created cleaning run with id {}", id);
        Ok(())
    }

    async fn update_cleaning_run(&self, run: &CleaningRun) -> Result<()> {
        let run_id = run.id.ok_or_else(|| PipelineError::Storage {
            message: "Cannot update cleaning run without ID".to_string(),
        })?;

        let mut runs = self.cleaning_runs.lock().unwrap();
        runs.insert(run_id, run.clone());

        debug!("Updated cleaning run with id {}", run_id);
        Ok(())
    }
}
