use crate::types::CleanedActivity;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate statistics over a set of cleaned activities
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    pub total_activities: usize,
    /// Mean over rows with a numeric price, regardless of currency
    pub average_price: Option<f64>,
    pub average_rating: Option<f64>,
    pub total_reviews: u64,
    pub by_currency: BTreeMap<String, usize>,
    pub by_region: BTreeMap<String, usize>,
    pub by_city: BTreeMap<String, usize>,
    pub by_platform: BTreeMap<String, usize>,
}

/// Per-city figures used by the `report` command
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CityStats {
    pub activities: usize,
    pub average_price: Option<f64>,
    pub average_rating: Option<f64>,
    pub average_quality: f64,
    pub total_reviews: u64,
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| round2(self.sum / self.count as f64))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn label(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

pub fn summarize(activities: &[CleanedActivity]) -> MarketSummary {
    let mut summary = MarketSummary {
        total_activities: activities.len(),
        ..MarketSummary::default()
    };
    let mut price = Mean::default();
    let mut rating = Mean::default();

    for activity in activities {
        price.add(activity.price_numeric);
        rating.add(activity.rating_numeric);
        summary.total_reviews += u64::from(activity.review_count_numeric.unwrap_or(0));

        if let Some(currency) = activity.price_currency.as_deref() {
            *summary.by_currency.entry(currency.to_string()).or_default() += 1;
        }
        *summary
            .by_region
            .entry(label(activity.region.as_deref()))
            .or_default() += 1;
        *summary.by_city.entry(activity.city.clone()).or_default() += 1;
        *summary
            .by_platform
            .entry(activity.platform.as_str().to_string())
            .or_default() += 1;
    }

    summary.average_price = price.value();
    summary.average_rating = rating.value();
    summary
}

pub fn city_breakdown(activities: &[CleanedActivity]) -> BTreeMap<String, CityStats> {
    let mut grouped: BTreeMap<String, Vec<&CleanedActivity>> = BTreeMap::new();
    for activity in activities {
        grouped.entry(activity.city.clone()).or_default().push(activity);
    }

    grouped
        .into_iter()
        .map(|(city, rows)| {
            let mut price = Mean::default();
            let mut rating = Mean::default();
            let mut quality = Mean::default();
            let mut total_reviews = 0u64;
            for row in &rows {
                price.add(row.price_numeric);
                rating.add(row.rating_numeric);
                quality.add(Some(f64::from(row.quality_score)));
                total_reviews += u64::from(row.review_count_numeric.unwrap_or(0));
            }
            let stats = CityStats {
                activities: rows.len(),
                average_price: price.value(),
                average_rating: rating.value(),
                average_quality: quality.value().unwrap_or(0.0),
                total_reviews,
            };
            (city, stats)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use chrono::Utc;

    fn activity(city: &str, price: Option<f64>, rating: Option<f64>, reviews: Option<u32>) -> CleanedActivity {
        CleanedActivity {
            id: CleanedActivity::stable_id(Platform::Viator, 1),
            original_id: 1,
            activity_name: "Tour".to_string(),
            provider_name: "P".to_string(),
            location: None,
            city: city.to_string(),
            country: None,
            region: None,
            price_text: "Unknown".to_string(),
            price_numeric: price,
            price_currency: price.map(|_| "€".to_string()),
            rating_text: "Unknown".to_string(),
            rating_numeric: rating,
            review_count_text: "Unknown".to_string(),
            review_count_numeric: reviews,
            duration_text: "Unknown".to_string(),
            duration_hours: None,
            duration_days: None,
            description: None,
            tags: Vec::new(),
            category: None,
            activity_type: None,
            venue: None,
            url: None,
            quality_score: 40,
            platform: Platform::Viator,
            original_source: "ImportedMadridActivity".to_string(),
            cleaned_at: Utc::now(),
        }
    }

    #[test]
    fn test_averages_skip_missing_values() {
        let rows = vec![
            activity("Madrid", Some(40.0), Some(4.0), Some(10)),
            activity("Madrid", Some(50.0), None, None),
            activity("London", None, Some(5.0), Some(5)),
        ];
        let summary = summarize(&rows);

        assert_eq!(summary.total_activities, 3);
        assert_eq!(summary.average_price, Some(45.0));
        assert_eq!(summary.average_rating, Some(4.5));
        assert_eq!(summary.total_reviews, 15);
        assert_eq!(summary.by_currency["€"], 2);
        assert_eq!(summary.by_region["Unknown"], 3);
        assert_eq!(summary.by_city["Madrid"], 2);
        assert_eq!(summary.by_platform["viator"], 3);
    }

    #[test]
    fn test_empty_input() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_activities, 0);
        assert_eq!(summary.average_price, None);
        assert!(city_breakdown(&[]).is_empty());
    }

    #[test]
    fn test_city_breakdown() {
        let rows = vec![
            activity("Madrid", Some(40.0), Some(4.0), Some(10)),
            activity("Madrid", Some(50.0), None, Some(2)),
            activity("London", None, None, None),
        ];
        let breakdown = city_breakdown(&rows);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown["Madrid"].activities, 2);
        assert_eq!(breakdown["Madrid"].total_reviews, 12);
        assert_eq!(breakdown["London"].average_price, None);
        assert_eq!(breakdown["London"].average_quality, 40.0);
    }
}
