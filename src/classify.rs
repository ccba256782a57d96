use chrono::{DateTime, Timelike, Utc};
use chrono_tz::America::Toronto;
use serde::{Deserialize, Serialize};

/// Primary category assigned to every ingested event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Music,
    Nightlife,
    Art,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Music => "music",
            Category::Nightlife => "nightlife",
            Category::Art => "art",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "music" => Some(Category::Music),
            "nightlife" => Some(Category::Nightlife),
            "art" => Some(Category::Art),
            _ => None,
        }
    }
}

// Segment markers that short-circuit scoring entirely
const ART_SEGMENT_MARKERS: &[&str] = &["arts", "theatre", "art"];

const NIGHTLIFE_TITLE_KEYWORDS: &[&str] = &[
    "dj",
    "rave",
    "techno",
    "warehouse",
    "afterparty",
    "after-party",
    "after party",
    "club night",
    "dance party",
];

const NIGHTLIFE_VENUE_KEYWORDS: &[&str] = &[
    "club",
    "lounge",
    "bar",
    "rooftop",
    "cabaret",
    "discotheque",
];

const ELECTRONIC_GENRE_KEYWORDS: &[&str] = &[
    "electronic",
    "dance",
    "house",
    "techno",
    "edm",
    "trance",
    "drum and bass",
];

const NIGHTLIFE_SCORE_THRESHOLD: u32 = 5;

const TITLE_KEYWORD_POINTS: u32 = 3;
const VENUE_KEYWORD_POINTS: u32 = 2;
const GENRE_KEYWORD_POINTS: u32 = 2;

/// Assigns a category from the upstream classification plus nightlife signals.
///
/// An art/theatre segment wins unconditionally. Otherwise the event is scored
/// on start hour, title, venue name, and genre text; a score at or above the
/// threshold lands in nightlife and everything else defaults to music.
pub fn classify(
    title: &str,
    venue_name: &str,
    segment: &str,
    genres: &str,
    start_at: Option<DateTime<Utc>>,
) -> Category {
    if contains_any(segment, ART_SEGMENT_MARKERS) {
        return Category::Art;
    }

    if nightlife_score(title, venue_name, genres, start_at) >= NIGHTLIFE_SCORE_THRESHOLD {
        return Category::Nightlife;
    }

    Category::Music
}

fn nightlife_score(
    title: &str,
    venue_name: &str,
    genres: &str,
    start_at: Option<DateTime<Utc>>,
) -> u32 {
    let mut score = start_at.map_or(0, |at| hour_points(local_hour(at)));

    if contains_any(title, NIGHTLIFE_TITLE_KEYWORDS) {
        score += TITLE_KEYWORD_POINTS;
    }
    if contains_any(venue_name, NIGHTLIFE_VENUE_KEYWORDS) {
        score += VENUE_KEYWORD_POINTS;
    }
    if contains_any(genres, ELECTRONIC_GENRE_KEYWORDS) {
        score += GENRE_KEYWORD_POINTS;
    }

    score
}

fn hour_points(hour: u32) -> u32 {
    match hour {
        23.. => 4,
        21 | 22 => 3,
        19 | 20 => 1,
        _ => 0,
    }
}

/// Start hour in the event's local zone, not UTC.
fn local_hour(start_at: DateTime<Utc>) -> u32 {
    start_at.with_timezone(&Toronto).hour()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local_start(hour: u32, minute: u32) -> DateTime<Utc> {
        Toronto
            .with_ymd_and_hms(2025, 6, 20, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_art_segment_wins_over_nightlife_signals() {
        let category = classify(
            "DJ Set in the Gallery",
            "The Underground Club",
            "Arts & Theatre",
            "electronic",
            Some(local_start(23, 0)),
        );
        assert_eq!(category, Category::Art);
    }

    #[test]
    fn test_late_dj_set_at_club_is_nightlife() {
        // 4 points for the hour, 3 for the title, 2 for the venue
        let category = classify(
            "Friday Night DJ Set",
            "The Underground Club",
            "Music",
            "",
            Some(local_start(23, 30)),
        );
        assert_eq!(category, Category::Nightlife);
    }

    #[test]
    fn test_afternoon_symphony_is_music() {
        let category = classify(
            "Symphony No. 5",
            "Maison Symphonique",
            "Music",
            "Classical",
            Some(local_start(14, 0)),
        );
        assert_eq!(category, Category::Music);
    }

    #[test]
    fn test_hour_alone_never_reaches_threshold() {
        let category = classify(
            "An Evening of Song",
            "Maison Symphonique",
            "Music",
            "",
            Some(local_start(23, 0)),
        );
        assert_eq!(category, Category::Music);
    }

    #[test]
    fn test_electronic_genre_pushes_late_club_show_over() {
        // 3 points for a 21h start plus 2 for the genre
        let category = classify(
            "Label Showcase",
            "Paradise Hall",
            "Music",
            "Electronic House",
            Some(local_start(21, 0)),
        );
        assert_eq!(category, Category::Nightlife);
    }

    #[test]
    fn test_no_signals_defaults_to_music() {
        assert_eq!(classify("", "", "", "", None), Category::Music);
    }

    #[test]
    fn test_hour_points_boundaries() {
        assert_eq!(hour_points(18), 0);
        assert_eq!(hour_points(19), 1);
        assert_eq!(hour_points(20), 1);
        assert_eq!(hour_points(21), 3);
        assert_eq!(hour_points(22), 3);
        assert_eq!(hour_points(23), 4);
    }

    #[test]
    fn test_local_hour_resolves_against_eastern_time() {
        // 03:30 UTC on June 21 is 23:30 the previous evening in Montreal
        let utc = Utc.with_ymd_and_hms(2025, 6, 21, 3, 30, 0).unwrap();
        assert_eq!(local_hour(utc), 23);
    }

    #[test]
    fn test_category_round_trips_through_storage_strings() {
        for category in [Category::Music, Category::Nightlife, Category::Art] {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("comedy"), None);
    }
}
