pub mod city;
pub mod cleaner;
pub mod config;
pub mod constants;
pub mod dedup;
pub mod error;
pub mod importer;
pub mod logging;
pub mod metrics;
pub mod parser;
pub mod quality;
pub mod reclassify;
pub mod server;
pub mod storage;
pub mod summary;
pub mod types;

pub use error::{PipelineError, Result};
