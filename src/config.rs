use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "activity_pipeline.toml";

/// Process-wide settings, built once in `main` and passed to each component
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub cleaning: CleaningConfig,
    pub city: CityConfig,
    pub quality: QualityWeights,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/activities.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub file_name: String,
    /// Used when RUST_LOG is not set
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            file_name: "activity_pipeline.log".to_string(),
            default_filter: "activity_pipeline=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Log batch progress every N records
    pub progress_interval: usize,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            progress_interval: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CityConfig {
    /// Treat every listing with region "UK" as London market data
    pub uk_region_as_london: bool,
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            uk_region_as_london: true,
        }
    }
}

/// Points awarded per populated field. Must be non-zero and sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub price: u8,
    pub rating: u8,
    pub reviews: u8,
    pub description: u8,
    pub duration: u8,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            price: 25,
            rating: 20,
            reviews: 20,
            description: 20,
            duration: 15,
        }
    }
}

impl QualityWeights {
    pub fn total(&self) -> u32 {
        [self.price, self.rating, self.reviews, self.description, self.duration]
            .iter()
            .map(|w| u32::from(*w))
            .sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            default_limit: 100,
            max_limit: 1000,
        }
    }
}

impl Config {
    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                PipelineError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_toml(&content)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Config::default()
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = env::var("ACTIVITY_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Ok(dir) = env::var("ACTIVITY_LOG_DIR") {
            self.logging.dir = PathBuf::from(dir);
        }
        if let Ok(port) = env::var("ACTIVITY_SERVER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| PipelineError::Config(format!("Invalid ACTIVITY_SERVER_PORT '{port}'")))?;
        }
        if let Ok(interval) = env::var("ACTIVITY_PROGRESS_INTERVAL") {
            self.cleaning.progress_interval = interval.parse().map_err(|_| {
                PipelineError::Config(format!("Invalid ACTIVITY_PROGRESS_INTERVAL '{interval}'"))
            })?;
        }
        if let Ok(flag) = env::var("ACTIVITY_UK_REGION_AS_LONDON") {
            self.city.uk_region_as_london = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.cleaning.progress_interval == 0 {
            return Err(PipelineError::Config(
                "cleaning.progress_interval must be at least 1".to_string(),
            ));
        }

        let weights = &self.quality;
        let all = [
            ("price", weights.price),
            ("rating", weights.rating),
            ("reviews", weights.reviews),
            ("description", weights.description),
            ("duration", weights.duration),
        ];
        if let Some((name, _)) = all.iter().find(|(_, w)| *w == 0) {
            return Err(PipelineError::Config(format!(
                "quality.{name} weight must be greater than zero"
            )));
        }
        if weights.total() != 100 {
            return Err(PipelineError::Config(format!(
                "quality weights must sum to 100, got {}",
                weights.total()
            )));
        }

        if self.server.default_limit == 0 || self.server.default_limit > self.server.max_limit {
            return Err(PipelineError::Config(
                "server.default_limit must be between 1 and server.max_limit".to_string(),
            ));
        }
        Ok(())
    }
}
