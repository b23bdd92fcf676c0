use crate::constants::{
    CLEANED_ID_NAMESPACE, GYG_PLATFORM, GYG_SOURCE_TABLE, VIATOR_PLATFORM, VIATOR_SOURCE_TABLE,
};
use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Marketplace a listing was scraped from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Gyg,
    Viator,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Gyg => GYG_PLATFORM,
            Platform::Viator => VIATOR_PLATFORM,
        }
    }

    /// Raw table this platform's listings are imported into
    pub fn source(&self) -> RawSource {
        match self {
            Platform::Gyg => RawSource::Gyg,
            Platform::Viator => RawSource::Viator,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            GYG_PLATFORM | "getyourguide" => Ok(Platform::Gyg),
            VIATOR_PLATFORM => Ok(Platform::Viator),
            other => Err(PipelineError::InvalidInput(format!("unknown platform '{other}'"))),
        }
    }
}

/// Raw import tables
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RawSource {
    Gyg,
    Viator,
}

impl RawSource {
    pub fn table_name(&self) -> &'static str {
        match self {
            RawSource::Gyg => GYG_SOURCE_TABLE,
            RawSource::Viator => VIATOR_SOURCE_TABLE,
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            RawSource::Gyg => Platform::Gyg,
            RawSource::Viator => Platform::Viator,
        }
    }

    pub fn all() -> [RawSource; 2] {
        [RawSource::Gyg, RawSource::Viator]
    }
}

impl fmt::Display for RawSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for RawSource {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<Platform>()?.source())
    }
}

/// One scraped listing as imported, before cleaning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawActivity {
    pub id: Option<i64>,
    pub activity_name: String,
    pub provider_name: String,
    pub location: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub price_text: Option<String>,
    pub rating_text: Option<String>,
    pub review_count_text: Option<String>,
    pub duration_text: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub activity_type: Option<String>,
    pub venue: Option<String>,
    pub url: Option<String>,
    pub imported_at: DateTime<Utc>,
}

impl RawActivity {
    /// A bare record with only the always-present fields set
    pub fn new(activity_name: impl Into<String>, provider_name: impl Into<String>) -> Self {
        Self {
            id: None,
            activity_name: activity_name.into(),
            provider_name: provider_name.into(),
            location: None,
            city: None,
            country: None,
            region: None,
            price_text: None,
            rating_text: None,
            review_count_text: None,
            duration_text: None,
            description: None,
            tags: Vec::new(),
            category: None,
            activity_type: None,
            venue: None,
            url: None,
            imported_at: Utc::now(),
        }
    }
}

/// Canonical, typed record derived from exactly one surviving RawActivity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CleanedActivity {
    pub id: Uuid,
    pub original_id: i64,
    pub activity_name: String,
    pub provider_name: String,
    pub location: Option<String>,
    pub city: String,
    pub country: Option<String>,
    pub region: Option<String>,
    pub price_text: String,
    pub price_numeric: Option<f64>,
    pub price_currency: Option<String>,
    pub rating_text: String,
    pub rating_numeric: Option<f64>,
    pub review_count_text: String,
    pub review_count_numeric: Option<u32>,
    pub duration_text: String,
    pub duration_hours: Option<f64>,
    pub duration_days: Option<f64>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub activity_type: Option<String>,
    pub venue: Option<String>,
    pub url: Option<String>,
    pub quality_score: u8,
    pub platform: Platform,
    pub original_source: String,
    pub cleaned_at: DateTime<Utc>,
}

impl CleanedActivity {
    /// Stable id for the cleaned row of a given raw record
    pub fn stable_id(platform: Platform, original_id: i64) -> Uuid {
        Uuid::new_v5(
            &CLEANED_ID_NAMESPACE,
            format!("{}:{}", platform.as_str(), original_id).as_bytes(),
        )
    }

    /// True when every field except the cleaning timestamp matches
    pub fn same_content(&self, other: &CleanedActivity) -> bool {
        let mut other = other.clone();
        other.cleaned_at = self.cleaned_at;
        *self == other
    }
}

/// Outcome of writing one cleaned record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Created,
    Updated,
    Unchanged,
    Failed,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Created => "created",
            ChangeType::Updated => "updated",
            ChangeType::Unchanged => "unchanged",
            ChangeType::Failed => "failed",
        }
    }
}

/// How a cleaning run treats existing cleaned rows
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CleaningMode {
    /// Upsert keyed on (platform, originalId)
    Incremental,
    /// Delete every cleaned row, then recreate
    Rebuild,
}

/// A cleaning run record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningRun {
    pub id: Option<Uuid>,
    pub mode: CleaningMode,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub processed: usize,
    pub failed: usize,
}

impl CleaningRun {
    pub fn new(mode: CleaningMode) -> Self {
        Self {
            id: None,
            mode,
            created_at: Utc::now(),
            finished_at: None,
            processed: 0,
            failed: 0,
        }
    }

    /// Mark the run as finished
    pub fn finish(&mut self, processed: usize, failed: usize) {
        self.processed = processed;
        self.failed = failed;
        self.finished_at = Some(Utc::now());
    }
}
