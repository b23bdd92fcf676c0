use super::find_phrase;

/// Ordered (activity type, keywords) table; the first type with a keyword in
/// the activity name wins.
const ACTIVITY_TYPES: &[(&str, &[&str])] = &[
    ("Day Trip", &["day trip", "full-day trip", "excursion"]),
    ("Transfer", &["airport transfer", "transfer", "shuttle"]),
    ("Food & Drink", &["food", "tapas", "wine", "tasting", "cooking class", "paella", "pub crawl"]),
    ("Boat Tour", &["boat", "cruise", "sailing", "river thames"]),
    ("Bike Tour", &["bike", "cycling", "e-bike", "segway"]),
    ("Walking Tour", &["walking tour", "walking", "free tour"]),
    ("Show", &["flamenco", "show", "concert", "theatre", "theater", "musical"]),
    ("Outdoor", &["hiking", "hike", "kayak", "climbing", "balloon"]),
    ("Museum & Tickets", &["museum", "gallery", "ticket", "skip-the-line", "entry"]),
    ("Hop-on Hop-off", &["hop-on hop-off", "hop on hop off", "sightseeing bus"]),
    ("Private Tour", &["private"]),
];

/// Infer a coarse activity type from a listing name.
pub fn infer_activity_type(activity_name: &str) -> Option<&'static str> {
    let name = activity_name.to_lowercase();
    ACTIVITY_TYPES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| find_phrase(&name, k).is_some()))
        .map(|(activity_type, _)| *activity_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infers_first_matching_type() {
        assert_eq!(
            infer_activity_type("Madrid: Hiking & Visit Segovia Day Trip with Transport"),
            Some("Day Trip")
        );
        assert_eq!(infer_activity_type("Madrid: Flamenco Show at Tablao"), Some("Show"));
        assert_eq!(infer_activity_type("London: Thames River Boat Cruise"), Some("Boat Tour"));
        assert_eq!(infer_activity_type("Prado Museum Skip-the-Line Ticket"), Some("Museum & Tickets"));
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(infer_activity_type("Something Unusual"), None);
        // "showroom" is not "show"
        assert_eq!(infer_activity_type("Car Showroom Visit"), None);
    }
}
