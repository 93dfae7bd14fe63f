use tracing::debug;

use crate::error::StoreError;
use crate::storage::{EventCriteria, EventStore};
use crate::types::CanonicalEvent;

/// Pre-insert existence check against the store
pub struct DeduplicationGate;

impl DeduplicationGate {
    /// Lookup matching the candidate's digest or its `(title, startDate)` key.
    ///
    /// Both keys are consulted so events stored under an older id scheme still block
    /// a re-insert.
    pub fn criteria_for(candidate: &CanonicalEvent) -> EventCriteria {
        EventCriteria::AnyOf(vec![
            EventCriteria::Id(candidate.id.clone()),
            EventCriteria::TitleAndStart {
                title: candidate.title.clone(),
                start_date: candidate.start_date,
            },
        ])
    }

    /// `false` when the store already holds this event. The check and the following insert
    /// are not atomic; stores that enforce a unique `id` catch the race.
    pub async fn should_insert(candidate: &CanonicalEvent, store: &dyn EventStore) -> Result<bool, StoreError> {
        match store.find_one(&Self::criteria_for(candidate)).await? {
            Some(existing) => {
                debug!(
                    "Skipping duplicate '{}' (candidate id {}, stored id {})",
                    candidate.title, candidate.id, existing.id
                );
                Ok(false)
            }
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryEventStore;
    use crate::types::Venue;
    use chrono::{NaiveDate, Utc};
    use std::collections::BTreeSet;

    fn candidate(id: &str) -> CanonicalEvent {
        let start = NaiveDate::from_ymd_opt(2025, 7, 4)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap();
        CanonicalEvent {
            id: id.to_string(),
            title: "Canada Day".to_string(),
            description: String::new(),
            categories: BTreeSet::from(["Festival".to_string()]),
            start_date: start,
            end_date: start,
            venue: Venue::default(),
            image_url: None,
            official_website: String::new(),
            source_url: String::new(),
            price: None,
            last_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_empty_store_allows_insert() {
        let store = InMemoryEventStore::new();
        assert!(DeduplicationGate::should_insert(&candidate("a"), &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_id_is_duplicate() {
        let store = InMemoryEventStore::new();
        store.insert_one(&candidate("a")).await.unwrap();
        assert!(!DeduplicationGate::should_insert(&candidate("a"), &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_legacy_id_with_same_title_and_start_is_duplicate() {
        let store = InMemoryEventStore::new();
        store.insert_one(&candidate("legacy-id")).await.unwrap();
        assert!(!DeduplicationGate::should_insert(&candidate("new-digest"), &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_title_other_start_is_new() {
        let store = InMemoryEventStore::new();
        store.insert_one(&candidate("a")).await.unwrap();

        let mut later = candidate("b");
        later.start_date += chrono::Duration::days(1);
        assert!(DeduplicationGate::should_insert(&later, &store).await.unwrap());
    }
}
