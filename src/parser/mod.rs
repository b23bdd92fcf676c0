//! Free-text field parsers for scraped listings.
//!
//! Every parser is total: malformed input never returns an error. Unparseable
//! text is preserved as display text with a `None` numeric value.

pub mod activity_type;
pub mod duration;

pub use activity_type::infer_activity_type;
pub use duration::{parse_duration, ParsedDuration};

use crate::constants::UNKNOWN_TEXT;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const CURRENCY_SYMBOLS: &str = "€$£¥₹";

static PRICE_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^(?:from\s+)?([{CURRENCY_SYMBOLS}])\s*(\d[\d.,]*)\s*[-–]\s*[{CURRENCY_SYMBOLS}]?\s*(\d[\d.,]*)"
    ))
    .expect("valid price range regex")
});

static PRICE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^(?:from\s+)?([{CURRENCY_SYMBOLS}])\s*(\d[\d.,]*)"))
        .expect("valid price regex")
});

static PRICE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^(?:from\s+)?(\d[\d.,]*)\s*([{CURRENCY_SYMBOLS}])$"))
        .expect("valid price suffix regex")
});

static BARE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d[\d.,]*$").expect("valid bare number regex"));

static THOUSANDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(?:,\d{3})+(?:\.\d+)?$").expect("valid thousands regex"));

static COMMA_DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+,\d{1,2}$").expect("valid comma decimal regex"));

static PLAIN_DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?$").expect("valid decimal regex"));

static RATING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)").expect("valid rating regex"));

static RATING_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*([\d.,]+\s*[kK]?)\s*\)").expect("valid rating count regex"));

static REVIEW_COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\(?\s*(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*(k)?\b").expect("valid review regex")
});

/// Parsed price field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedPrice {
    pub display_text: String,
    pub numeric_value: Option<f64>,
    pub currency: Option<String>,
}

impl ParsedPrice {
    fn unknown() -> Self {
        Self {
            display_text: UNKNOWN_TEXT.to_string(),
            numeric_value: None,
            currency: None,
        }
    }

    fn verbatim(text: &str) -> Self {
        Self {
            display_text: text.to_string(),
            numeric_value: None,
            currency: None,
        }
    }
}

/// Parsed rating or review-count field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedNumber<T> {
    pub display_text: String,
    pub numeric_value: Option<T>,
}

impl<T> ParsedNumber<T> {
    fn unknown() -> Self {
        Self {
            display_text: UNKNOWN_TEXT.to_string(),
            numeric_value: None,
        }
    }
}

pub type ParsedRating = ParsedNumber<f64>;
pub type ParsedReviewCount = ParsedNumber<u32>;

/// Empty or case-insensitive "unknown"
pub fn is_unknown(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN_TEXT)
}

/// Parse an amount that may use thousands separators or a comma decimal.
fn parse_amount(raw: &str) -> Option<f64> {
    let raw = raw.trim_end_matches(['.', ',']);
    let normalized = if THOUSANDS_RE.is_match(raw) {
        raw.replace(',', "")
    } else if COMMA_DECIMAL_RE.is_match(raw) {
        raw.replace(',', ".")
    } else if PLAIN_DECIMAL_RE.is_match(raw) {
        raw.to_string()
    } else {
        return None;
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Parse a scraped price such as "€43", "From €45", "€33-45" or "120".
///
/// Ranges resolve to the mean of both ends.
pub fn parse_price(text: &str) -> ParsedPrice {
    if is_unknown(text) {
        return ParsedPrice::unknown();
    }
    let trimmed = text.trim();

    if let Some(caps) = PRICE_RANGE_RE.captures(trimmed) {
        if let (Some(min), Some(max)) = (parse_amount(&caps[2]), parse_amount(&caps[3])) {
            return ParsedPrice {
                display_text: trimmed.to_string(),
                numeric_value: Some((min + max) / 2.0),
                currency: Some(caps[1].to_string()),
            };
        }
    }

    if let Some(caps) = PRICE_PREFIX_RE.captures(trimmed) {
        if let Some(value) = parse_amount(&caps[2]) {
            return ParsedPrice {
                display_text: trimmed.to_string(),
                numeric_value: Some(value),
                currency: Some(caps[1].to_string()),
            };
        }
    }

    if let Some(caps) = PRICE_SUFFIX_RE.captures(trimmed) {
        if let Some(value) = parse_amount(&caps[1]) {
            return ParsedPrice {
                display_text: trimmed.to_string(),
                numeric_value: Some(value),
                currency: Some(caps[2].to_string()),
            };
        }
    }

    if BARE_NUMBER_RE.is_match(trimmed) {
        if let Some(value) = parse_amount(trimmed) {
            return ParsedPrice {
                display_text: trimmed.to_string(),
                numeric_value: Some(value),
                currency: None,
            };
        }
    }

    ParsedPrice::verbatim(trimmed)
}

/// Parse a rating such as "4.4" or "4.4 (63,652)".
///
/// Values outside [0, 5] keep their display text but get no numeric value.
pub fn parse_rating(text: &str) -> ParsedRating {
    if is_unknown(text) {
        return ParsedRating::unknown();
    }
    let trimmed = text.trim();

    let Some(caps) = RATING_RE.captures(trimmed) else {
        return ParsedRating {
            display_text: trimmed.to_string(),
            numeric_value: None,
        };
    };

    let number = caps[1].replace(',', ".");
    let numeric_value = number
        .parse::<f64>()
        .ok()
        .filter(|v| (0.0..=5.0).contains(v));

    ParsedRating {
        display_text: number,
        numeric_value,
    }
}

/// Review count carried in a rating's parenthetical, e.g. "4.4 (63,652)".
pub fn parse_rating_review_count(text: &str) -> Option<u32> {
    let caps = RATING_COUNT_RE.captures(text)?;
    parse_review_count(&caps[1]).numeric_value
}

/// Parse a review count such as "1,234 reviews", "1234" or "1.2K reviews".
pub fn parse_review_count(text: &str) -> ParsedReviewCount {
    if is_unknown(text) {
        return ParsedReviewCount::unknown();
    }
    let trimmed = text.trim();

    let numeric_value = REVIEW_COUNT_RE.captures(trimmed).and_then(|caps| {
        let digits = caps[1].replace(',', "");
        if caps.get(2).is_some() {
            let thousands = digits.parse::<f64>().ok()?;
            let value = (thousands * 1000.0).round();
            (value <= f64::from(u32::MAX)).then_some(value as u32)
        } else {
            digits.parse::<u32>().ok()
        }
    });

    ParsedReviewCount {
        display_text: trimmed.to_string(),
        numeric_value,
    }
}

/// Case-insensitive phrase search anchored on word boundaries.
///
/// `haystack` must already be lowercase.
pub(crate) fn find_phrase(haystack: &str, phrase: &str) -> Option<usize> {
    find_anchored(haystack, phrase, true)
}

/// Like `find_phrase`, but only the start is anchored, so "segovian" contains
/// "segovia".
pub(crate) fn find_word_prefix(haystack: &str, phrase: &str) -> Option<usize> {
    find_anchored(haystack, phrase, false)
}

fn find_anchored(haystack: &str, phrase: &str, anchor_end: bool) -> Option<usize> {
    let is_word = |c: char| c.is_alphanumeric();
    let mut start = 0;
    while let Some(offset) = haystack[start..].find(phrase) {
        let at = start + offset;
        let end = at + phrase.len();
        let before_ok = haystack[..at].chars().next_back().map_or(true, |c| !is_word(c));
        let after_ok =
            !anchor_end || haystack[end..].chars().next().map_or(true, |c| !is_word(c));
        if before_ok && after_ok {
            return Some(at);
        }
        // advance by one character to stay on a char boundary
        start = at + haystack[at..].chars().next().map_or(1, |c| c.len_utf8());
    }
    None
}
