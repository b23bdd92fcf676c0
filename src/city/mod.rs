//! Canonical city inference from free-text listing names.
//!
//! Resolution is a pure function of (activity name, region, scraped location), so it can
//! be re-applied to already-cleaned rows without depending on an earlier answer.

pub mod table;

pub use table::{CityPatterns, CITY_TABLE};

use crate::config::CityConfig;
use crate::constants::{UK_REGION, UNKNOWN_CITY};
use crate::parser::{find_phrase, find_word_prefix};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::cmp::Reverse;
use tracing::trace;

static FROM_TO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:from|to)\s+([\p{L}][\p{L}'’.\-]*(?:\s+[\p{L}][\p{L}'’.\-]*)?)")
        .expect("valid from/to regex")
});

/// Which rule produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolutionRule {
    UkRegion,
    Landmark,
    CityName,
    WeakLandmark,
    FromTo,
    Location,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub city: String,
    pub country: Option<&'static str>,
    pub rule: ResolutionRule,
}

impl Resolution {
    /// Country stored on a cleaned row: the scraped value when there is one,
    /// otherwise the resolved city's.
    pub fn country_for(&self, scraped: Option<&str>) -> Option<String> {
        scraped
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or(self.country)
            .map(str::to_string)
    }

    fn from_entry(entry: &CityPatterns, rule: ResolutionRule) -> Self {
        Self {
            city: entry.city.to_string(),
            country: Some(entry.country),
            rule,
        }
    }

    fn unresolved() -> Self {
        Self {
            city: UNKNOWN_CITY.to_string(),
            country: None,
            rule: ResolutionRule::Unresolved,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Tier {
    Landmark,
    CityName,
    WeakLandmark,
}

impl Tier {
    const ORDER: [Tier; 3] = [Tier::Landmark, Tier::CityName, Tier::WeakLandmark];

    fn patterns(self, entry: &CityPatterns) -> &'static [&'static str] {
        match self {
            Tier::Landmark => entry.landmarks,
            Tier::CityName => entry.names,
            Tier::WeakLandmark => entry.weak_landmarks,
        }
    }

    /// Strong landmarks also match as the start of a longer word ("Segovian")
    fn find(self, text: &str, pattern: &str) -> Option<usize> {
        match self {
            Tier::Landmark => find_word_prefix(text, pattern),
            Tier::CityName | Tier::WeakLandmark => find_phrase(text, pattern),
        }
    }

    fn rule(self) -> ResolutionRule {
        match self {
            Tier::Landmark => ResolutionRule::Landmark,
            Tier::CityName => ResolutionRule::CityName,
            Tier::WeakLandmark => ResolutionRule::WeakLandmark,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CityResolver {
    table: &'static [CityPatterns],
    uk_region_as_london: bool,
}

impl CityResolver {
    pub fn new(config: &CityConfig) -> Self {
        Self::with_table(CITY_TABLE, config)
    }

    pub fn with_table(table: &'static [CityPatterns], config: &CityConfig) -> Self {
        Self {
            table,
            uk_region_as_london: config.uk_region_as_london,
        }
    }

    /// Resolve the canonical city for a listing.
    ///
    /// Order: UK region rule, landmarks, city names, weak landmarks, the word after
    /// "from"/"to", the scraped location text, then "Unknown".
    pub fn resolve(&self, activity_name: &str, region: Option<&str>, location: Option<&str>) -> Resolution {
        if self.uk_region_as_london
            && region.is_some_and(|r| r.trim().eq_ignore_ascii_case(UK_REGION))
        {
            let london = self.table.iter().find(|entry| entry.city == "London");
            return Resolution {
                city: "London".to_string(),
                country: london.map(|entry| entry.country),
                rule: ResolutionRule::UkRegion,
            };
        }

        let name = activity_name.to_lowercase();
        if let Some(resolution) = self.scan_tiers(&name) {
            return resolution;
        }

        if let Some(entry) = self.from_to_city(activity_name) {
            return Resolution::from_entry(entry, ResolutionRule::FromTo);
        }

        if let Some(location) = location.filter(|l| !l.trim().is_empty()) {
            if let Some(mut resolution) = self.scan_tiers(&location.to_lowercase()) {
                resolution.rule = ResolutionRule::Location;
                return resolution;
            }
        }

        trace!("No city pattern matched '{}'", activity_name);
        Resolution::unresolved()
    }

    fn scan_tiers(&self, text: &str) -> Option<Resolution> {
        Tier::ORDER.iter().find_map(|tier| {
            self.scan(text, *tier)
                .map(|entry| Resolution::from_entry(entry, tier.rule()))
        })
    }

    /// Within one tier, the earliest match in the text wins; at equal positions the
    /// longer pattern wins, then table order.
    fn scan(&self, text: &str, tier: Tier) -> Option<&'static CityPatterns> {
        let mut best: Option<((usize, Reverse<usize>, usize), &'static CityPatterns)> = None;
        for (index, entry) in self.table.iter().enumerate() {
            for pattern in tier.patterns(entry) {
                if let Some(position) = tier.find(text, pattern) {
                    let key = (position, Reverse(pattern.len()), index);
                    if best.as_ref().map_or(true, |(current, _)| key < *current) {
                        best = Some((key, entry));
                    }
                }
            }
        }
        best.map(|(_, entry)| entry)
    }

    /// Check the one or two words following "from"/"to" against every pattern,
    /// ignoring accents and possessives.
    fn from_to_city(&self, activity_name: &str) -> Option<&'static CityPatterns> {
        for caps in FROM_TO_RE.captures_iter(activity_name) {
            let words: Vec<String> = caps[1].split_whitespace().map(fold_token).collect();
            let mut candidates = vec![words[0].clone()];
            if words.len() > 1 {
                candidates.push(format!("{} {}", words[0], words[1]));
            }

            for candidate in candidates.iter().rev() {
                let found = self.table.iter().find(|entry| {
                    Tier::ORDER
                        .iter()
                        .flat_map(|tier| tier.patterns(entry))
                        .any(|pattern| fold_token(pattern) == *candidate)
                });
                if found.is_some() {
                    return found;
                }
            }
        }
        None
    }
}

/// Lowercase, strip accents, trailing punctuation and possessive "'s".
fn fold_token(token: &str) -> String {
    let folded: String = token
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            '’' => '\'',
            other => other,
        })
        .collect();
    let trimmed = folded.trim_end_matches(|c: char| !c.is_alphanumeric());
    trimmed.strip_suffix("'s").unwrap_or(trimmed).to_string()
}
