use crate::city::CityResolver;
use crate::config::Config;
use crate::constants::UNKNOWN_TEXT;
use crate::error::{PipelineError, Result};
use crate::metrics;
use crate::parser::{
    infer_activity_type, parse_duration, parse_price, parse_rating, parse_rating_review_count,
    parse_review_count,
};
use crate::quality::{QualityScorer, WeightedQualityScorer};
use crate::storage::{non_empty, ActivityFilter, ActivityStore};
use crate::types::{ChangeType, CleanedActivity, CleaningMode, CleaningRun, Platform, RawActivity, RawSource};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Build the cleaned form of one raw record.
///
/// Parsing and city resolution never fail; the only error is a raw record that was
/// never persisted and so has no id to key the cleaned row on.
pub fn clean_record(
    raw: &RawActivity,
    platform: Platform,
    resolver: &CityResolver,
    scorer: &dyn QualityScorer,
) -> Result<CleanedActivity> {
    let original_id = raw.id.ok_or_else(|| {
        PipelineError::InvalidInput(format!("raw activity '{}' has no id", raw.activity_name))
    })?;

    let price = parse_price(raw.price_text.as_deref().unwrap_or(""));
    let rating = parse_rating(raw.rating_text.as_deref().unwrap_or(""));
    let mut reviews = parse_review_count(raw.review_count_text.as_deref().unwrap_or(""));
    if reviews.numeric_value.is_none() && reviews.display_text == UNKNOWN_TEXT {
        if let Some(count) = raw.rating_text.as_deref().and_then(parse_rating_review_count) {
            reviews.display_text = count.to_string();
            reviews.numeric_value = Some(count);
        }
    }
    let duration = parse_duration(raw.duration_text.as_deref().unwrap_or(""));

    let location = non_empty(&raw.location)
        .or_else(|| non_empty(&raw.city))
        .map(str::to_string);
    let resolution = resolver.resolve(&raw.activity_name, raw.region.as_deref(), location.as_deref());
    debug!(
        "Resolved '{}' to {} via {:?}",
        raw.activity_name, resolution.city, resolution.rule
    );

    let country = resolution.country_for(raw.country.as_deref());
    let activity_type = non_empty(&raw.activity_type)
        .map(str::to_string)
        .or_else(|| infer_activity_type(&raw.activity_name).map(str::to_string));

    let mut cleaned = CleanedActivity {
        id: CleanedActivity::stable_id(platform, original_id),
        original_id,
        activity_name: raw.activity_name.trim().to_string(),
        provider_name: raw.provider_name.trim().to_string(),
        location,
        city: resolution.city,
        country,
        region: non_empty(&raw.region).map(str::to_string),
        price_text: price.display_text,
        price_numeric: price.numeric_value,
        price_currency: price.currency,
        rating_text: rating.display_text,
        rating_numeric: rating.numeric_value,
        review_count_text: reviews.display_text,
        review_count_numeric: reviews.numeric_value,
        duration_text: duration.display_text,
        duration_hours: duration.hours,
        duration_days: duration.days,
        description: non_empty(&raw.description).map(str::to_string),
        tags: raw.tags.clone(),
        category: non_empty(&raw.category).map(str::to_string),
        activity_type,
        venue: non_empty(&raw.venue).map(str::to_string),
        url: non_empty(&raw.url).map(str::to_string),
        quality_score: 0,
        platform,
        original_source: platform.source().table_name().to_string(),
        cleaned_at: Utc::now(),
    };

    let assessment = scorer.assess(&cleaned);
    if !assessment.issues.is_empty() {
        debug!(
            "Quality issues for {} {}: {}",
            platform,
            original_id,
            assessment
                .issues
                .iter()
                .map(|i| i.description.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        );
    }
    cleaned.quality_score = assessment.score;
    Ok(cleaned)
}

/// Per-platform counters for one cleaning run
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PlatformCleaningStats {
    pub examined: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub pruned: usize,
}

impl PlatformCleaningStats {
    fn count(&mut self, change: ChangeType) {
        match change {
            ChangeType::Created => self.created += 1,
            ChangeType::Updated => self.updated += 1,
            ChangeType::Unchanged => self.unchanged += 1,
            ChangeType::Failed => self.failed += 1,
        }
    }

    /// Records written or confirmed unchanged
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CleaningReport {
    pub run_id: Option<Uuid>,
    pub mode: CleaningMode,
    /// Rows deleted up front in rebuild mode
    pub cleared: usize,
    pub platforms: BTreeMap<Platform, PlatformCleaningStats>,
}

impl CleaningReport {
    pub fn processed(&self) -> usize {
        self.platforms.values().map(PlatformCleaningStats::processed).sum()
    }

    pub fn failed(&self) -> usize {
        self.platforms.values().map(|s| s.failed).sum()
    }
}

/// Turns surviving raw rows into cleaned rows, one per raw record
pub struct Cleaner {
    store: Arc<dyn ActivityStore>,
    resolver: CityResolver,
    scorer: WeightedQualityScorer,
    progress_interval: usize,
}

impl std::fmt::Debug for Cleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cleaner")
            .field("store", &"<Arc<dyn ActivityStore>>")
            .field("resolver", &self.resolver)
            .field("progress_interval", &self.progress_interval)
            .finish()
    }
}

impl Cleaner {
    pub fn new(store: Arc<dyn ActivityStore>, config: &Config) -> Self {
        Self {
            store,
            resolver: CityResolver::new(&config.city),
            scorer: WeightedQualityScorer::new(config.quality),
            progress_interval: config.cleaning.progress_interval.max(1),
        }
    }

    /// Clean every raw row of both sources.
    ///
    /// Per-record failures are logged and counted. Only store errors outside the
    /// per-record loop abort the run.
    #[instrument(skip(self))]
    pub async fn run(&self, mode: CleaningMode) -> Result<CleaningReport> {
        let mut cleaning_run = CleaningRun::new(mode);
        self.store.create_cleaning_run(&mut cleaning_run).await?;
        info!(run_id = ?cleaning_run.id, ?mode, "Starting cleaning run");

        let cleared = match mode {
            CleaningMode::Rebuild => {
                let cleared = self.store.clear_cleaned_activities().await?;
                info!("Rebuild mode: deleted {} existing cleaned activities", cleared);
                cleared
            }
            CleaningMode::Incremental => 0,
        };

        let mut report = CleaningReport {
            run_id: cleaning_run.id,
            mode,
            cleared,
            platforms: BTreeMap::new(),
        };

        for source in RawSource::all() {
            let stats = self.clean_source(source).await?;
            report.platforms.insert(source.platform(), stats);
        }

        cleaning_run.finish(report.processed(), report.failed());
        self.store.update_cleaning_run(&cleaning_run).await?;
        info!(
            run_id = ?cleaning_run.id,
            "Finished cleaning run: {} processed, {} failed",
            cleaning_run.processed,
            cleaning_run.failed
        );

        Ok(report)
    }

    #[instrument(skip(self))]
    async fn clean_source(&self, source: RawSource) -> Result<PlatformCleaningStats> {
        let platform = source.platform();
        let rows = self.store.get_raw_activities(source).await?;
        let total = rows.len();
        info!("Found {} raw records in {}", total, source);

        let mut stats = PlatformCleaningStats {
            examined: total,
            ..PlatformCleaningStats::default()
        };

        for (index, raw) in rows.iter().enumerate() {
            match self.upsert(raw, platform).await {
                Ok((change, score)) => {
                    stats.count(change);
                    metrics::record_cleaned(platform.as_str(), change.as_str(), score);
                }
                Err(e) => {
                    error!(
                        "Failed to clean {} record {:?} ({}): {}",
                        platform, raw.id, raw.activity_name, e
                    );
                    stats.count(ChangeType::Failed);
                    metrics::record_failure("clean");
                }
            }

            let done = index + 1;
            if done % self.progress_interval == 0 || done == total {
                info!("Cleaned {}/{} {} records", done, total, platform);
            }
        }

        let live: HashSet<i64> = rows.iter().filter_map(|r| r.id).collect();
        stats.pruned = self.prune_orphans(platform, &live).await?;

        info!(
            "{}: {} created, {} updated, {} unchanged, {} failed, {} pruned",
            platform, stats.created, stats.updated, stats.unchanged, stats.failed, stats.pruned
        );
        Ok(stats)
    }

    async fn upsert(&self, raw: &RawActivity, platform: Platform) -> Result<(ChangeType, u8)> {
        let mut cleaned = clean_record(raw, platform, &self.resolver, &self.scorer)?;
        let score = cleaned.quality_score;

        match self
            .store
            .get_cleaned_by_origin(platform, cleaned.original_id)
            .await?
        {
            Some(existing) if existing.same_content(&cleaned) => Ok((ChangeType::Unchanged, score)),
            Some(existing) => {
                cleaned.id = existing.id;
                self.store.update_cleaned_activity(&cleaned).await?;
                debug!("Updated cleaned activity: {} ({})", cleaned.activity_name, cleaned.id);
                Ok((ChangeType::Updated, score))
            }
            None => {
                self.store.create_cleaned_activity(&cleaned).await?;
                debug!("Created cleaned activity: {} ({})", cleaned.activity_name, cleaned.id);
                Ok((ChangeType::Created, score))
            }
        }
    }

    /// Delete cleaned rows whose raw record no longer exists
    async fn prune_orphans(&self, platform: Platform, live: &HashSet<i64>) -> Result<usize> {
        let existing = self
            .store
            .query_cleaned_activities(&ActivityFilter::for_platform(platform))
            .await?;

        let mut pruned = 0;
        for orphan in existing.iter().filter(|a| !live.contains(&a.original_id)) {
            match self.store.delete_cleaned_activity(orphan.id).await {
                Ok(()) => {
                    debug!(
                        "Pruned cleaned activity {} for missing raw record {}",
                        orphan.id, orphan.original_id
                    );
                    pruned += 1;
                }
                Err(e) => {
                    warn!("Failed to prune cleaned activity {}: {}", orphan.id, e);
                    metrics::record_failure("prune");
                }
            }
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CityConfig;
    use crate::storage::InMemoryStorage;

    fn resolver() -> CityResolver {
        CityResolver::new(&CityConfig::default())
    }

    fn segovia() -> RawActivity {
        let mut raw = RawActivity::new(
            "Madrid: Hiking & Visit Segovia Day Trip with Transport",
            "Sierra Tours",
        );
        raw.id = Some(1);
        raw.price_text = Some("€45".to_string());
        raw.rating_text = Some("4.6".to_string());
        raw.review_count_text = Some("120 reviews".to_string());
        raw
    }

    #[test]
    fn test_clean_record_parses_and_resolves() {
        let cleaned =
            clean_record(&segovia(), Platform::Gyg, &resolver(), &WeightedQualityScorer::default())
                .unwrap();

        assert_eq!(cleaned.city, "Madrid");
        assert_eq!(cleaned.country.as_deref(), Some("Spain"));
        assert_eq!(cleaned.price_numeric, Some(45.0));
        assert_eq!(cleaned.price_currency.as_deref(), Some("€"));
        assert_eq!(cleaned.rating_numeric, Some(4.6));
        assert_eq!(cleaned.review_count_numeric, Some(120));
        assert_eq!(cleaned.original_source, "ImportedGYGActivity");
        assert_eq!(cleaned.id, CleanedActivity::stable_id(Platform::Gyg, 1));
        // price, rating and reviews only
        assert_eq!(cleaned.quality_score, 65);
    }

    #[test]
    fn test_review_count_falls_back_to_rating_parenthetical() {
        let mut raw = segovia();
        raw.rating_text = Some("4.4 (63,652)".to_string());
        raw.review_count_text = None;

        let cleaned =
            clean_record(&raw, Platform::Viator, &resolver(), &WeightedQualityScorer::default())
                .unwrap();
        assert_eq!(cleaned.rating_numeric, Some(4.4));
        assert_eq!(cleaned.review_count_numeric, Some(63652));
        assert_eq!(parse_review_count(&cleaned.review_count_text).numeric_value, Some(63652));
    }

    #[test]
    fn test_unparseable_fields_still_produce_a_record() {
        let mut raw = RawActivity::new("Mystery Experience", "Nobody");
        raw.id = Some(9);
        raw.price_text = Some("ask the guide".to_string());
        raw.rating_text = Some("7.2".to_string());

        let cleaned =
            clean_record(&raw, Platform::Gyg, &resolver(), &WeightedQualityScorer::default())
                .unwrap();
        assert_eq!(cleaned.city, "Unknown");
        assert_eq!(cleaned.price_text, "ask the guide");
        assert_eq!(cleaned.price_numeric, None);
        assert_eq!(cleaned.rating_text, "7.2");
        assert_eq!(cleaned.rating_numeric, None);
        assert_eq!(cleaned.duration_text, "Unknown");
        assert_eq!(cleaned.quality_score, 0);
    }

    #[test]
    fn test_raw_record_without_id_is_rejected() {
        let mut raw = segovia();
        raw.id = None;
        let result = clean_record(&raw, Platform::Gyg, &resolver(), &WeightedQualityScorer::default());
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_incremental_rerun_is_unchanged() {
        let store = Arc::new(InMemoryStorage::new());
        let mut raw = segovia();
        store.create_raw_activity(RawSource::Gyg, &mut raw).await.unwrap();

        let cleaner = Cleaner::new(store.clone(), &Config::default());
        let first = cleaner.run(CleaningMode::Incremental).await.unwrap();
        assert_eq!(first.platforms[&Platform::Gyg].created, 1);

        let second = cleaner.run(CleaningMode::Incremental).await.unwrap();
        assert_eq!(second.platforms[&Platform::Gyg].created, 0);
        assert_eq!(second.platforms[&Platform::Gyg].unchanged, 1);

        let runs = store.cleaning_runs();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.finished_at.is_some() && r.processed == 1));
    }

    #[tokio::test]
    async fn test_changed_raw_record_updates_in_place() {
        let store = Arc::new(InMemoryStorage::new());
        let mut raw = segovia();
        store.create_raw_activity(RawSource::Gyg, &mut raw).await.unwrap();
        let cleaner = Cleaner::new(store.clone(), &Config::default());
        cleaner.run(CleaningMode::Incremental).await.unwrap();

        // A fresh import replaces the old raw row
        store.delete_raw_activity(RawSource::Gyg, 1).await.unwrap();
        let mut changed = segovia();
        changed.price_text = Some("€50".to_string());
        store.create_raw_activity(RawSource::Gyg, &mut changed).await.unwrap();

        let report = cleaner.run(CleaningMode::Incremental).await.unwrap();
        let stats = &report.platforms[&Platform::Gyg];
        // New raw id, so the old cleaned row is pruned and a new one created
        assert_eq!(stats.created, 1);
        assert_eq!(stats.pruned, 1);

        let rows = store.query_cleaned_activities(&ActivityFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price_numeric, Some(50.0));
    }

    #[tokio::test]
    async fn test_new_weights_update_existing_rows() {
        let store = Arc::new(InMemoryStorage::new());
        let mut raw = segovia();
        store.create_raw_activity(RawSource::Gyg, &mut raw).await.unwrap();
        Cleaner::new(store.clone(), &Config::default())
            .run(CleaningMode::Incremental)
            .await
            .unwrap();

        let mut config = Config::default();
        config.quality.price = 40;
        config.quality.duration = 5;
        config.quality.description = 15;
        let report = Cleaner::new(store.clone(), &config)
            .run(CleaningMode::Incremental)
            .await
            .unwrap();
        assert_eq!(report.platforms[&Platform::Gyg].updated, 1);

        let row = store
            .get_cleaned_by_origin(Platform::Gyg, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.quality_score, 80);
        assert_eq!(row.id, CleanedActivity::stable_id(Platform::Gyg, 1));
    }

    #[tokio::test]
    async fn test_rebuild_clears_first() {
        let store = Arc::new(InMemoryStorage::new());
        let mut raw = segovia();
        store.create_raw_activity(RawSource::Viator, &mut raw).await.unwrap();
        let cleaner = Cleaner::new(store.clone(), &Config::default());
        cleaner.run(CleaningMode::Incremental).await.unwrap();

        let report = cleaner.run(CleaningMode::Rebuild).await.unwrap();
        assert_eq!(report.cleared, 1);
        assert_eq!(report.platforms[&Platform::Viator].created, 1);
        assert_eq!(report.platforms[&Platform::Gyg].examined, 0);
    }

    #[tokio::test]
    async fn test_failed_write_is_counted_and_others_continue() {
        let store = Arc::new(InMemoryStorage::new());
        for name in ["Prado Museum Tour", "Toledo Day Trip", "Flamenco Show in Madrid"] {
            let mut raw = RawActivity::new(name, "Provider");
            raw.price_text = Some("€30".to_string());
            store.create_raw_activity(RawSource::Gyg, &mut raw).await.unwrap();
        }
        store.fail_cleaned_write_of(2);

        let report = Cleaner::new(store.clone(), &Config::default())
            .run(CleaningMode::Incremental)
            .await
            .unwrap();
        let stats = &report.platforms[&Platform::Gyg];
        assert_eq!(stats.created, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(report.failed(), 1);

        let rows = store.query_cleaned_activities(&ActivityFilter::default()).await.unwrap();
        let mut ids: Vec<i64> = rows.iter().map(|r| r.original_id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);

        let runs = store.cleaning_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].processed, 2);
        assert_eq!(runs[0].failed, 1);
        assert!(runs[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_update_is_counted() {
        let store = Arc::new(InMemoryStorage::new());
        for name in ["Prado Museum Tour", "Toledo Day Trip"] {
            let mut raw = RawActivity::new(name, "Provider");
            raw.price_text = Some("€30".to_string());
            store.create_raw_activity(RawSource::Viator, &mut raw).await.unwrap();
        }
        Cleaner::new(store.clone(), &Config::default())
            .run(CleaningMode::Incremental)
            .await
            .unwrap();

        store.fail_cleaned_write_of(1);
        let mut config = Config::default();
        config.quality.price = 40;
        config.quality.duration = 5;
        config.quality.description = 15;
        let report = Cleaner::new(store.clone(), &config)
            .run(CleaningMode::Incremental)
            .await
            .unwrap();
        let stats = &report.platforms[&Platform::Viator];
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processed(), 1);
    }

    #[tokio::test]
    async fn test_failed_prune_keeps_row_and_finishes() {
        let store = Arc::new(InMemoryStorage::new());
        for name in ["Prado Museum Tour", "Toledo Day Trip"] {
            let mut raw = RawActivity::new(name, "Provider");
            store.create_raw_activity(RawSource::Gyg, &mut raw).await.unwrap();
        }
        let cleaner = Cleaner::new(store.clone(), &Config::default());
        cleaner.run(CleaningMode::Incremental).await.unwrap();

        store.delete_raw_activity(RawSource::Gyg, 2).await.unwrap();
        store.fail_cleaned_write_of(2);
        let report = cleaner.run(CleaningMode::Incremental).await.unwrap();
        let stats = &report.platforms[&Platform::Gyg];
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.pruned, 0);

        let rows = store.query_cleaned_activities(&ActivityFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 2);
    }
}
