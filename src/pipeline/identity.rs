use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};

/// Number of digest bytes kept in an event id (128 bits)
const ID_BYTES: usize = 16;

/// Deterministic event identity over venue name, title and start day
pub struct EventIdentityGenerator;

impl EventIdentityGenerator {
    /// Only the calendar date of `start_date` participates, so runs that resolve a
    /// different time of day for the same listing collapse to one id.
    pub fn generate_id(venue_name: &str, title: &str, start_date: NaiveDateTime) -> String {
        let mut hasher = Sha256::new();
        hasher.update(canonical(venue_name).as_bytes());
        hasher.update([0x1f]);
        hasher.update(canonical(title).as_bytes());
        hasher.update([0x1f]);
        hasher.update(start_date.date().format("%Y-%m-%d").to_string().as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..ID_BYTES])
    }
}

// Case and spacing differences between scraper runs are not identity changes
fn canonical(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
