use crate::city::CityResolver;
use crate::config::CityConfig;
use crate::error::Result;
use crate::metrics;
use crate::storage::{ActivityFilter, ActivityStore};
use crate::types::{Platform, RawSource};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Default)]
pub struct ReclassifyReport {
    pub examined: usize,
    pub changed: usize,
    pub failed: usize,
    /// (from city, to city) -> number of rows moved
    pub transitions: BTreeMap<(String, String), usize>,
}

/// Re-resolves the city of every cleaned activity in place.
///
/// The resolver only reads the name, region and scraped location, never the stored
/// city, so a second pass over the same rows makes no changes. Countries follow the
/// same rule as cleaning, so a later incremental clean leaves moved rows unchanged.
pub struct Reclassifier {
    store: Arc<dyn ActivityStore>,
    resolver: CityResolver,
}

impl std::fmt::Debug for Reclassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reclassifier")
            .field("store", &"<Arc<dyn ActivityStore>>")
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl Reclassifier {
    pub fn new(store: Arc<dyn ActivityStore>, config: &CityConfig) -> Self {
        Self {
            store,
            resolver: CityResolver::new(config),
        }
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<ReclassifyReport> {
        let activities = self
            .store
            .query_cleaned_activities(&ActivityFilter::default())
            .await?;

        let mut report = ReclassifyReport {
            examined: activities.len(),
            ..ReclassifyReport::default()
        };
        info!("Reclassifying {} cleaned activities", report.examined);
        let scraped_countries = self.scraped_countries().await?;

        for activity in activities {
            let resolution = self.resolver.resolve(
                &activity.activity_name,
                activity.region.as_deref(),
                activity.location.as_deref(),
            );
            if resolution.city == activity.city {
                continue;
            }

            let from = activity.city.clone();
            let mut updated = activity;
            updated.city = resolution.city.clone();
            let scraped = scraped_countries
                .get(&(updated.platform, updated.original_id))
                .and_then(|country| country.as_deref());
            updated.country = resolution.country_for(scraped);
            updated.cleaned_at = Utc::now();

            match self.store.update_cleaned_activity(&updated).await {
                Ok(()) => {
                    debug!(
                        "Moved '{}' from {} to {} via {:?}",
                        updated.activity_name, from, updated.city, resolution.rule
                    );
                    metrics::record_reclassified(&from, &updated.city);
                    *report
                        .transitions
                        .entry((from, updated.city.clone()))
                        .or_default() += 1;
                    report.changed += 1;
                }
                Err(e) => {
                    warn!("Failed to reclassify {}: {}", updated.id, e);
                    metrics::record_failure("reclassify");
                    report.failed += 1;
                }
            }
        }

        for ((from, to), count) in &report.transitions {
            info!("{} -> {}: {}", from, to, count);
        }
        info!(
            "Reclassify finished: {} examined, {} changed, {} failed",
            report.examined, report.changed, report.failed
        );
        Ok(report)
    }

    /// Scraped country of every raw row, keyed like the cleaned rows
    async fn scraped_countries(&self) -> Result<HashMap<(Platform, i64), Option<String>>> {
        let mut countries = HashMap::new();
        for source in RawSource::all() {
            for raw in self.store.get_raw_activities(source).await? {
                if let Some(id) = raw.id {
                    countries.insert((source.platform(), id), raw.country);
                }
            }
        }
        Ok(countries)
    }
}
