//! Built-in reference tables used when the config file leaves them out.
//! Everything here can be overridden from `config.toml`.

use std::collections::HashMap;

use crate::pipeline::category::CategoryRule;
use crate::pipeline::date_range::VenueDefaults;
use crate::pipeline::venue::KnownVenue;
use crate::types::{Coordinates, Venue};

/// Category added when no keyword matched the event text
pub const DEFAULT_FALLBACK_CATEGORY: &str = "Community";

/// Venue class used for sites that name none, or name one nobody configured
pub const GENERIC_VENUE_CLASS: &str = "generic";

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "EVENT_PIPELINE_CONFIG";

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_VENUE_TIMEOUT_SECS: u64 = 30;

/// Ordered keyword table. Keywords are matched as lower-case substrings.
pub fn default_category_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("Family", &["family-friendly", "family", "children", "kids"]),
        CategoryRule::new("Culture", &["arts", "culture", "art", "heritage", "history", "exhibition"]),
        CategoryRule::new("Outdoors", &["outdoors", "nature", "park", "hiking", "garden"]),
        CategoryRule::new("Sports", &["sports", "recreation", "fitness", "swim", "skating", "hockey"]),
        CategoryRule::new("Community", &["community", "civic", "neighborhood", "neighbourhood", "meeting"]),
        CategoryRule::new("Music", &["music", "concert", "band", "jazz", "orchestra", "symphony"]),
        CategoryRule::new("Workshop", &["workshop", "education", "learning", "class", "seminar"]),
        CategoryRule::new("Festival", &["festival", "celebration", "fair", "carnival"]),
        CategoryRule::new("Seasonal", &["seasonal", "holiday", "christmas", "summer", "winter", "halloween"]),
        CategoryRule::new("Food", &["food", "market", "culinary", "tasting", "brunch", "wine", "beer"]),
        CategoryRule::new("Comedy", &["comedy", "stand-up", "improv"]),
        CategoryRule::new("Theatre", &["theatre", "theater", "musical", "opera", "ballet", "dance"]),
        CategoryRule::new("Nightlife", &["nightlife", "nightclub", "lounge", "dj set", "party"]),
    ]
}

/// Timing defaults per venue class
pub fn builtin_date_defaults() -> HashMap<String, VenueDefaults> {
    HashMap::from([
        ("library".to_string(), VenueDefaults::library()),
        ("gallery".to_string(), VenueDefaults::gallery()),
        ("nightclub".to_string(), VenueDefaults::nightclub()),
        (GENERIC_VENUE_CLASS.to_string(), VenueDefaults::generic()),
    ])
}

/// Built-in defaults for a venue class, matched case-insensitively; unknown classes get generic
pub fn builtin_defaults_for(venue_class: &str) -> VenueDefaults {
    builtin_date_defaults()
        .get(&venue_class.trim().to_lowercase())
        .copied()
        .unwrap_or_else(VenueDefaults::generic)
}

fn mississauga_venue(name: &str, address: &str, postal_code: &str, latitude: f64, longitude: f64) -> Venue {
    Venue {
        name: name.to_string(),
        address: address.to_string(),
        city: "Mississauga".to_string(),
        region: "ON".to_string(),
        country: "Canada".to_string(),
        postal_code: postal_code.to_string(),
        coordinates: Coordinates { latitude, longitude },
    }
}

/// City hall, used when a Mississauga listing names no known venue
pub fn mississauga_default_venue() -> Venue {
    mississauga_venue(
        "City of Mississauga",
        "300 City Centre Drive, Mississauga, ON L5B 3C1",
        "L5B 3C1",
        43.5890,
        -79.6441,
    )
}

pub fn mississauga_known_venues() -> Vec<KnownVenue> {
    vec![
        KnownVenue::new(
            &["celebration square"],
            mississauga_venue(
                "Celebration Square",
                "300 City Centre Drive, Mississauga, ON L5B 3C1",
                "L5B 3C1",
                43.5888,
                -79.6425,
            ),
        ),
        KnownVenue::new(
            &["living arts centre", "living arts center"],
            mississauga_venue(
                "Living Arts Centre",
                "4141 Living Arts Drive, Mississauga, ON L5B 4B8",
                "L5B 4B8",
                43.5878,
                -79.6401,
            ),
        ),
        KnownVenue::new(
            &["meadowvale theatre", "meadowvale theater"],
            mississauga_venue(
                "Meadowvale Theatre",
                "6315 Montevideo Road, Mississauga, ON L5N 4G7",
                "L5N 4G7",
                43.5913,
                -79.7547,
            ),
        ),
        KnownVenue::new(
            &["small arms inspection building", "small arms"],
            mississauga_venue(
                "Small Arms Inspection Building",
                "1352 Lakeshore Road East, Mississauga, ON L5E 1E9",
                "L5E 1E9",
                43.5807,
                -79.5418,
            ),
        ),
        KnownVenue::new(
            &["bradley museum"],
            mississauga_venue(
                "Bradley Museum",
                "1620 Orr Road, Mississauga, ON L5J 4T2",
                "L5J 4T2",
                43.5199,
                -79.6065,
            ),
        ),
    ]
}
