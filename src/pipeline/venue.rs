use serde::{Deserialize, Serialize};

use crate::types::Venue;

/// One row of the known-venue table: any keyword found in the location text selects `venue`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownVenue {
    pub keywords: Vec<String>,
    pub venue: Venue,
}

impl KnownVenue {
    pub fn new(keywords: &[&str], venue: Venue) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            venue,
        }
    }

    fn matches(&self, location_lower: &str) -> bool {
        self.keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && location_lower.contains(&k))
    }
}

/// Maps free-text locations onto canonical venue records
pub struct VenueResolver;

impl VenueResolver {
    /// First table entry with a keyword contained in `location_text`, case-insensitively
    pub fn lookup<'a>(location_text: &str, known_venues: &'a [KnownVenue]) -> Option<&'a Venue> {
        let location_lower = location_text.trim().to_lowercase();
        if location_lower.is_empty() {
            return None;
        }
        known_venues
            .iter()
            .find(|entry| entry.matches(&location_lower))
            .map(|entry| &entry.venue)
    }

    /// Resolve a location, falling back to the site default venue.
    ///
    /// When nothing matches, the default venue keeps its address and coordinates but
    /// takes the scraped location as its name so the listing's wording survives.
    pub fn resolve(location_text: &str, site_default: &Venue, known_venues: &[KnownVenue]) -> Venue {
        if let Some(venue) = Self::lookup(location_text, known_venues) {
            return venue.clone();
        }

        let location = location_text.trim();
        let mut venue = site_default.clone();
        if !location.is_empty() {
            venue.name = location.to_string();
        }
        venue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{mississauga_default_venue, mississauga_known_venues};

    #[test]
    fn test_known_venue_wins_over_default() {
        let venue = VenueResolver::resolve(
            "Celebration Square, Mississauga",
            &mississauga_default_venue(),
            &mississauga_known_venues(),
        );
        assert_eq!(venue.name, "Celebration Square");
        assert_eq!(venue.address, "300 City Centre Drive, Mississauga, ON L5B 3C1");
        assert_eq!(venue.coordinates.latitude, 43.5888);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let venue = VenueResolver::resolve(
            "LIVING ARTS CENTRE - Hammerson Hall",
            &mississauga_default_venue(),
            &mississauga_known_venues(),
        );
        assert_eq!(venue.name, "Living Arts Centre");
    }

    #[test]
    fn test_first_match_wins() {
        let first = Venue {
            name: "First".to_string(),
            ..Default::default()
        };
        let second = Venue {
            name: "Second".to_string(),
            ..Default::default()
        };
        let table = vec![
            KnownVenue::new(&["park"], first),
            KnownVenue::new(&["memorial park"], second),
        ];
        let venue = VenueResolver::resolve("Port Credit Memorial Park", &Venue::default(), &table);
        assert_eq!(venue.name, "First");
    }

    #[test]
    fn test_unmatched_location_keeps_scraped_name() {
        let default = mississauga_default_venue();
        let venue = VenueResolver::resolve("Streetsville Village Square", &default, &mississauga_known_venues());
        assert_eq!(venue.name, "Streetsville Village Square");
        assert_eq!(venue.address, default.address);
        assert_eq!(venue.coordinates, default.coordinates);
    }

    #[test]
    fn test_empty_location_returns_default() {
        let default = mississauga_default_venue();
        let venue = VenueResolver::resolve("   ", &default, &mississauga_known_venues());
        assert_eq!(venue, default);
        assert!(VenueResolver::lookup("", &mississauga_known_venues()).is_none());
    }

    #[test]
    fn test_blank_keywords_never_match() {
        let table = vec![KnownVenue::new(&["", "  "], Venue::default())];
        assert!(VenueResolver::lookup("anywhere", &table).is_none());
    }
}
