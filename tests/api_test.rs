use activity_pipeline::cleaner::Cleaner;
use activity_pipeline::config::{Config, ServerConfig};
use activity_pipeline::server::create_server;
use activity_pipeline::storage::{ActivityStore, InMemoryStorage};
use activity_pipeline::types::{CleaningMode, RawActivity, RawSource};
use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

async fn seeded_store() -> Result<Arc<dyn ActivityStore>> {
    let store = Arc::new(InMemoryStorage::new());
    let listings = [
        (RawSource::Gyg, "Madrid: Toledo Day Trip", "€40", "4.5", "300"),
        (RawSource::Gyg, "Prado Museum Skip-the-Line Ticket", "€25", "4.7", "1,500"),
        (RawSource::Viator, "Segovia Guided Tour from Madrid", "€60", "4.8", "90"),
        (RawSource::Viator, "London Eye River Cruise", "£35", "4.2", "2,000"),
    ];
    for (source, name, price, rating, reviews) in listings {
        let mut raw = RawActivity::new(name, "Provider");
        raw.price_text = Some(price.to_string());
        raw.rating_text = Some(rating.to_string());
        raw.review_count_text = Some(reviews.to_string());
        store.create_raw_activity(source, &mut raw).await?;
    }
    Cleaner::new(store.clone(), &Config::default())
        .run(CleaningMode::Incremental)
        .await?;
    Ok(store)
}

async fn get(store: Arc<dyn ActivityStore>, uri: &str) -> Result<(StatusCode, Option<Value>)> {
    let app = create_server(store, &ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await?;
    Ok((status, serde_json::from_slice(&bytes).ok()))
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let (status, body) = get(seeded_store().await?, "/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_lists_activities_with_summary() -> Result<()> {
    let (status, body) = get(seeded_store().await?, "/api/market/activities?city=madrid").await?;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();

    let activities = body["activities"].as_array().unwrap();
    assert_eq!(activities.len(), 3);
    // Most reviewed first
    assert_eq!(activities[0]["activityName"], "Prado Museum Skip-the-Line Ticket");
    assert_eq!(activities[0]["priceNumeric"], 25.0);
    assert_eq!(activities[0]["platform"], "gyg");

    let summary = &body["summary"];
    assert_eq!(summary["totalActivities"], 3);
    assert_eq!(summary["averagePrice"], 41.67);
    assert_eq!(summary["totalReviews"], 1890);
    assert_eq!(summary["byPlatform"]["viator"], 1);
    Ok(())
}

#[tokio::test]
async fn test_limit_truncates_rows_but_not_summary() -> Result<()> {
    let (status, body) = get(seeded_store().await?, "/api/market/activities?limit=1").await?;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["activities"].as_array().unwrap().len(), 1);
    assert_eq!(body["activities"][0]["city"], "London");
    assert_eq!(body["summary"]["totalActivities"], 4);
    assert_eq!(body["summary"]["byCurrency"]["£"], 1);
    Ok(())
}

#[tokio::test]
async fn test_platform_and_search_filters() -> Result<()> {
    let store = seeded_store().await?;
    let (_, body) = get(store.clone(), "/api/market/activities?platform=viator&search=segovia").await?;
    let body = body.unwrap();
    let activities = body["activities"].as_array().unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0]["originalSource"], "ImportedMadridActivity");
    Ok(())
}

#[tokio::test]
async fn test_unknown_platform_is_rejected() -> Result<()> {
    let (status, _) = get(seeded_store().await?, "/api/market/activities?platform=tripadvisor").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
