use super::is_unknown;
use crate::constants::UNKNOWN_TEXT;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static DURATION_PART_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\d+(?:[.,]\d+)?)(?:\s*[-–]\s*(\d+(?:[.,]\d+)?))?\s*(days?|d|hours?|hrs?|h|minutes?|mins?|m)\b",
    )
    .expect("valid duration regex")
});

/// Parsed duration field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDuration {
    pub display_text: String,
    /// Total duration in hours
    pub hours: Option<f64>,
    /// Set only when the text used day units
    pub days: Option<f64>,
}

fn number(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok()
}

/// Parse durations like "3 hours", "2.5h", "90 minutes", "1 day", "2-3 hours"
/// or "1 hour 30 minutes". Ranges resolve to their mean.
pub fn parse_duration(text: &str) -> ParsedDuration {
    if is_unknown(text) {
        return ParsedDuration {
            display_text: UNKNOWN_TEXT.to_string(),
            hours: None,
            days: None,
        };
    }
    let trimmed = text.trim();

    let mut total_hours = 0.0;
    let mut matched = false;
    let mut saw_days = false;

    for caps in DURATION_PART_RE.captures_iter(trimmed) {
        let Some(low) = number(&caps[1]) else { continue };
        let value = match caps.get(2).and_then(|m| number(m.as_str())) {
            Some(high) => (low + high) / 2.0,
            None => low,
        };

        let unit = caps[3].to_lowercase();
        let hours = if unit.starts_with('d') {
            saw_days = true;
            value * 24.0
        } else if unit.starts_with('h') {
            value
        } else {
            value / 60.0
        };

        total_hours += hours;
        matched = true;
    }

    let hours = matched.then_some(total_hours).filter(|h| *h > 0.0);
    ParsedDuration {
        display_text: trimmed.to_string(),
        hours,
        days: hours.filter(|_| saw_days).map(|h| h / 24.0),
    }
}
