//! Loads scraped listing files into the raw import tables.

use crate::constants::UNKNOWN_TEXT;
use crate::error::{PipelineError, Result};
use crate::storage::ActivityStore;
use crate::types::{RawActivity, RawSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, instrument, warn};

/// One listing as written by the scrapers. Keys may be camelCase or snake_case.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedActivity {
    #[serde(alias = "activity_name", alias = "name", alias = "title")]
    pub activity_name: String,
    #[serde(default, alias = "provider_name", alias = "provider", alias = "supplier")]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, alias = "price_text", alias = "price", deserialize_with = "text_or_number")]
    pub price_text: Option<String>,
    #[serde(default, alias = "rating_text", alias = "rating", deserialize_with = "text_or_number")]
    pub rating_text: Option<String>,
    #[serde(
        default,
        alias = "review_count_text",
        alias = "reviewCount",
        alias = "review_count",
        alias = "reviews",
        deserialize_with = "text_or_number"
    )]
    pub review_count_text: Option<String>,
    #[serde(default, alias = "duration_text", alias = "duration", deserialize_with = "text_or_number")]
    pub duration_text: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "activity_type")]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default, alias = "link")]
    pub url: Option<String>,
    #[serde(default, alias = "imported_at")]
    pub imported_at: Option<DateTime<Utc>>,
}

/// Scrapers emit numbers for some fields; keep everything as text until cleaning.
fn text_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl ScrapedActivity {
    pub fn into_raw(self, now: DateTime<Utc>) -> RawActivity {
        let provider = self
            .provider_name
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_TEXT.to_string());

        let mut raw = RawActivity::new(self.activity_name, provider);
        raw.location = self.location;
        raw.city = self.city;
        raw.country = self.country;
        raw.region = self.region;
        raw.price_text = self.price_text;
        raw.rating_text = self.rating_text;
        raw.review_count_text = self.review_count_text;
        raw.duration_text = self.duration_text;
        raw.description = self.description;
        raw.tags = self.tags;
        raw.category = self.category;
        raw.activity_type = self.activity_type;
        raw.venue = self.venue;
        raw.url = self.url;
        raw.imported_at = self.imported_at.unwrap_or(now);
        raw
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScrapedFile {
    List(Vec<ScrapedActivity>),
    Wrapped { activities: Vec<ScrapedActivity> },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub source: String,
    pub fingerprint: String,
    /// True when this exact file was already imported into this source
    pub already_imported: bool,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// SHA-256 over the target table name and the file bytes
pub fn compute_fingerprint(source: RawSource, content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.table_name().as_bytes());
    hasher.update(b"|");
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Import a JSON array of scraped listings into the raw table for `source`.
#[instrument(skip(store, path), fields(path = %path.as_ref().display()))]
pub async fn import_file(
    store: &dyn ActivityStore,
    source: RawSource,
    path: impl AsRef<Path>,
) -> Result<ImportReport> {
    let content = tokio::fs::read(path.as_ref()).await?;
    import_bytes(store, source, &content).await
}

pub async fn import_bytes(
    store: &dyn ActivityStore,
    source: RawSource,
    content: &[u8],
) -> Result<ImportReport> {
    let fingerprint = compute_fingerprint(source, content);
    let mut report = ImportReport {
        source: source.table_name().to_string(),
        fingerprint: fingerprint.clone(),
        already_imported: false,
        inserted: 0,
        skipped: 0,
        failed: 0,
    };

    if store.has_import_batch(&fingerprint).await? {
        info!("File {} already imported into {}, skipping", fingerprint, source);
        report.already_imported = true;
        return Ok(report);
    }

    let listings = match serde_json::from_slice::<ScrapedFile>(content) {
        Ok(ScrapedFile::List(listings)) | Ok(ScrapedFile::Wrapped { activities: listings }) => listings,
        Err(e) => {
            return Err(PipelineError::InvalidInput(format!(
                "expected a JSON array of listings: {e}"
            )))
        }
    };

    let now = Utc::now();
    for listing in listings {
        if listing.activity_name.trim().is_empty() {
            warn!("Skipping listing without a name");
            report.skipped += 1;
            continue;
        }

        let mut raw = listing.into_raw(now);
        match store.create_raw_activity(source, &mut raw).await {
            Ok(()) => report.inserted += 1,
            Err(e) => {
                warn!("Failed to import '{}': {}", raw.activity_name, e);
                report.failed += 1;
            }
        }
    }

    store
        .record_import_batch(&fingerprint, source, report.inserted)
        .await?;
    info!(
        "Imported {} listings into {} ({} skipped, {} failed)",
        report.inserted, source, report.skipped, report.failed
    );
    Ok(report)
}
