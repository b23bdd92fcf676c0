use activity_pipeline::cleaner::Cleaner;
use activity_pipeline::config::Config;
use activity_pipeline::dedup::Deduplicator;
use activity_pipeline::parser::{parse_price, parse_rating, parse_review_count};
use activity_pipeline::reclassify::Reclassifier;
use activity_pipeline::storage::{ActivityFilter, ActivityStore, InMemoryStorage};
use activity_pipeline::types::{CleaningMode, Platform, RawActivity, RawSource};
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;

fn raw(name: &str, provider: &str) -> RawActivity {
    RawActivity::new(name, provider)
}

#[tokio::test]
async fn test_segovia_day_trip_is_cleaned_as_madrid() -> Result<()> {
    let store = Arc::new(InMemoryStorage::new());
    let mut listing = raw("Madrid: Hiking & Visit Segovia Day Trip with Transport", "Sierra Tours");
    listing.price_text = Some("€45".to_string());
    listing.rating_text = Some("4.6".to_string());
    listing.review_count_text = Some("120 reviews".to_string());
    store.create_raw_activity(RawSource::Gyg, &mut listing).await?;

    let report = Cleaner::new(store.clone(), &Config::default())
        .run(CleaningMode::Incremental)
        .await?;
    assert_eq!(report.processed(), 1);
    assert_eq!(report.failed(), 0);

    let cleaned = store
        .get_cleaned_by_origin(Platform::Gyg, listing.id.unwrap())
        .await?
        .expect("cleaned row exists");
    assert_eq!(cleaned.city, "Madrid");
    assert_eq!(cleaned.price_numeric, Some(45.0));
    assert_eq!(cleaned.price_currency.as_deref(), Some("€"));
    assert_eq!(cleaned.rating_numeric, Some(4.6));
    assert_eq!(cleaned.review_count_numeric, Some(120));
    assert_eq!(cleaned.platform, Platform::Gyg);
    Ok(())
}

#[tokio::test]
async fn test_only_latest_duplicate_survives_and_is_cleaned() -> Result<()> {
    let store = Arc::new(InMemoryStorage::new());

    let mut older = raw("Toledo Full-Day Tour", "Sol Travel");
    older.imported_at = Utc::now() - Duration::days(3);
    older.price_text = Some("€30".to_string());
    store.create_raw_activity(RawSource::Gyg, &mut older).await?;

    let mut newer = raw("Toledo Full-Day Tour", "Sol Travel");
    newer.imported_at = Utc::now();
    newer.price_text = Some("€35".to_string());
    store.create_raw_activity(RawSource::Gyg, &mut newer).await?;

    let deduplicator = Deduplicator::new(store.clone());
    let first = deduplicator.run(RawSource::Gyg).await?;
    assert_eq!(first.removed, 1);

    let second = deduplicator.run(RawSource::Gyg).await?;
    assert_eq!(second.removed, 0);

    let remaining = store.get_raw_activities(RawSource::Gyg).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, newer.id);

    Cleaner::new(store.clone(), &Config::default())
        .run(CleaningMode::Incremental)
        .await?;
    let cleaned = store.query_cleaned_activities(&ActivityFilter::default()).await?;
    assert_eq!(cleaned.len(), 1);
    assert_eq!(Some(cleaned[0].original_id), newer.id);
    assert_eq!(cleaned[0].price_numeric, Some(35.0));
    Ok(())
}

#[tokio::test]
async fn test_failed_delete_does_not_stop_other_groups() -> Result<()> {
    let store = Arc::new(InMemoryStorage::new());
    for (name, hours_ago) in [("A", 2), ("A", 1), ("B", 2), ("B", 1)] {
        let mut listing = raw(name, "Provider");
        listing.imported_at = Utc::now() - Duration::hours(hours_ago);
        store.create_raw_activity(RawSource::Viator, &mut listing).await?;
    }
    // The older "A" row
    store.fail_delete_of(1);

    let report = Deduplicator::new(store.clone()).run(RawSource::Viator).await?;
    assert_eq!(report.duplicate_groups, 2);
    assert_eq!(report.removed, 1);
    assert_eq!(report.failed_deletions, 1);

    let ids: Vec<i64> = store
        .get_raw_activities(RawSource::Viator)
        .await?
        .into_iter()
        .filter_map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 4]);
    Ok(())
}

#[tokio::test]
async fn test_dedup_removal_prunes_cleaned_row() -> Result<()> {
    let store = Arc::new(InMemoryStorage::new());
    let config = Config::default();

    let mut first = raw("Prado Museum Guided Tour", "Arte");
    first.imported_at = Utc::now() - Duration::hours(5);
    store.create_raw_activity(RawSource::Viator, &mut first).await?;
    Cleaner::new(store.clone(), &config).run(CleaningMode::Incremental).await?;

    let mut second = raw("Prado Museum Guided Tour", "Arte");
    store.create_raw_activity(RawSource::Viator, &mut second).await?;
    Deduplicator::new(store.clone()).run(RawSource::Viator).await?;

    let report = Cleaner::new(store.clone(), &config)
        .run(CleaningMode::Incremental)
        .await?;
    let viator = &report.platforms[&Platform::Viator];
    assert_eq!(viator.created, 1);
    assert_eq!(viator.pruned, 1);

    let cleaned = store.query_cleaned_activities(&ActivityFilter::default()).await?;
    assert_eq!(cleaned.len(), 1);
    assert_eq!(Some(cleaned[0].original_id), second.id);
    Ok(())
}

#[tokio::test]
async fn test_uk_region_is_always_london() -> Result<()> {
    let store = Arc::new(InMemoryStorage::new());
    let mut listing = raw("Segovia and Toledo Day Trip from Madrid", "Mixed");
    listing.region = Some("UK".to_string());
    store.create_raw_activity(RawSource::Gyg, &mut listing).await?;

    Cleaner::new(store.clone(), &Config::default())
        .run(CleaningMode::Incremental)
        .await?;
    let cleaned = store.query_cleaned_activities(&ActivityFilter::default()).await?;
    assert_eq!(cleaned[0].city, "London");
    Ok(())
}

#[tokio::test]
async fn test_stored_display_text_reparses_to_same_values() -> Result<()> {
    let store = Arc::new(InMemoryStorage::new());
    let samples = [
        ("€43", "4.4 (63,652)", None),
        ("From €45", "4.9", Some("1,234 reviews")),
        ("€33-45", "7.2", Some("1.2K reviews")),
        ("120", "Unknown", Some("")),
        ("£1,234.50", "", Some("98")),
        ("ask", "n/a", Some("lots")),
    ];
    for (i, (price, rating, reviews)) in samples.iter().enumerate() {
        let mut listing = raw(&format!("Listing {i}"), "Provider");
        listing.price_text = Some(price.to_string());
        listing.rating_text = Some(rating.to_string());
        listing.review_count_text = reviews.map(str::to_string);
        store.create_raw_activity(RawSource::Gyg, &mut listing).await?;
    }

    Cleaner::new(store.clone(), &Config::default())
        .run(CleaningMode::Incremental)
        .await?;

    let cleaned = store.query_cleaned_activities(&ActivityFilter::default()).await?;
    assert_eq!(cleaned.len(), samples.len());
    for activity in &cleaned {
        assert_eq!(parse_price(&activity.price_text).numeric_value, activity.price_numeric);
        assert_eq!(parse_rating(&activity.rating_text).numeric_value, activity.rating_numeric);
        assert_eq!(
            parse_review_count(&activity.review_count_text).numeric_value,
            activity.review_count_numeric
        );
        assert!(!activity.city.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_clean_then_reclassify_changes_nothing() -> Result<()> {
    let store = Arc::new(InMemoryStorage::new());
    for name in [
        "Stonehenge, Windsor Castle and Bath Day Trip",
        "Madrid: Toledo and Segovia Day Trip",
        "Day Trip to Lisbon",
        "Sunset Kayak Adventure",
    ] {
        let mut listing = raw(name, "Provider");
        store.create_raw_activity(RawSource::Viator, &mut listing).await?;
    }

    let config = Config::default();
    Cleaner::new(store.clone(), &config).run(CleaningMode::Incremental).await?;
    let report = Reclassifier::new(store.clone(), &config.city).run().await?;
    assert_eq!(report.examined, 4);
    assert_eq!(report.changed, 0);

    let unknown = store
        .query_cleaned_activities(&ActivityFilter {
            city: Some("Unknown".to_string()),
            ..ActivityFilter::default()
        })
        .await?;
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0].activity_name, "Sunset Kayak Adventure");
    Ok(())
}

#[tokio::test]
async fn test_reclassified_country_survives_next_clean() -> Result<()> {
    let store = Arc::new(InMemoryStorage::new());
    let mut listing = raw("Prado Museum Guided Tour", "Arte");
    listing.region = Some("UK".to_string());
    listing.country = Some("Spain".to_string());
    store.create_raw_activity(RawSource::Gyg, &mut listing).await?;

    let mut spanish = Config::default();
    spanish.city.uk_region_as_london = false;
    Cleaner::new(store.clone(), &spanish)
        .run(CleaningMode::Incremental)
        .await?;

    let config = Config::default();
    let moved = Reclassifier::new(store.clone(), &config.city).run().await?;
    assert_eq!(moved.changed, 1);
    let row = store
        .get_cleaned_by_origin(Platform::Gyg, listing.id.unwrap())
        .await?
        .expect("cleaned row exists");
    assert_eq!(row.city, "London");
    assert_eq!(row.country.as_deref(), Some("Spain"));

    let report = Cleaner::new(store.clone(), &config)
        .run(CleaningMode::Incremental)
        .await?;
    assert_eq!(report.platforms[&Platform::Gyg].unchanged, 1);
    assert_eq!(report.platforms[&Platform::Gyg].updated, 0);
    Ok(())
}
