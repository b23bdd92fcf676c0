/// Source table and platform tag constants shared across the pipeline

// Raw source tables. The Madrid table holds Viator listings despite its name.
pub const GYG_SOURCE_TABLE: &str = "ImportedGYGActivity";
pub const VIATOR_SOURCE_TABLE: &str = "ImportedMadridActivity";

// Platform tags written to CleanedActivity.platform
pub const GYG_PLATFORM: &str = "gyg";
pub const VIATOR_PLATFORM: &str = "viator";

/// City value used whenever no canonical city can be inferred
pub const UNKNOWN_CITY: &str = "Unknown";

/// Display text used for empty or "unknown" scraped fields
pub const UNKNOWN_TEXT: &str = "Unknown";

/// Region value that maps every listing to the London market
pub const UK_REGION: &str = "UK";

/// Namespace for deterministic CleanedActivity ids
pub const CLEANED_ID_NAMESPACE: uuid::Uuid = uuid::Uuid::from_u128(0x6a0b_4d2e_9c1f_4b7a_8e3d_51c2_f0a9_7e64);
