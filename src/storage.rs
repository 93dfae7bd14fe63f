use crate::config::{StoreConfig, StoreKind};
use crate::error::StoreError;
use crate::types::CanonicalEvent;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Lookup criteria understood by every event store
#[derive(Debug, Clone, PartialEq)]
pub enum EventCriteria {
    Id(String),
    TitleAndStart {
        title: String,
        start_date: NaiveDateTime,
    },
    /// Matches when any of the inner criteria match
    AnyOf(Vec<EventCriteria>),
}

impl EventCriteria {
    pub fn matches(&self, event: &CanonicalEvent) -> bool {
        match self {
            EventCriteria::Id(id) => &event.id == id,
            EventCriteria::TitleAndStart { title, start_date } => {
                &event.title == title && &event.start_date == start_date
            }
            EventCriteria::AnyOf(criteria) => criteria.iter().any(|c| c.matches(event)),
        }
    }
}

/// The two operations the pipeline needs from a backing store
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_one(&self, criteria: &EventCriteria) -> Result<Option<CanonicalEvent>, StoreError>;

    /// Insert a new event. Stores with a uniqueness constraint on `id` answer a repeat with
    /// [`StoreError::DuplicateKey`].
    async fn insert_one(&self, event: &CanonicalEvent) -> Result<(), StoreError>;
}

/// In-memory store for development/testing
pub struct InMemoryEventStore {
    events: Arc<Mutex<HashMap<String, CanonicalEvent>>>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<CanonicalEvent> {
        let mut events: Vec<CanonicalEvent> = self
            .events
            .lock()
            .map(|events| events.values().cloned().collect())
            .unwrap_or_default();
        events.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.id.cmp(&b.id)));
        events
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("store lock poisoned".to_string())
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn find_one(&self, criteria: &EventCriteria) -> Result<Option<CanonicalEvent>, StoreError> {
        let events = self.events.lock().map_err(poisoned)?;
        if let EventCriteria::Id(id) = criteria {
            return Ok(events.get(id).cloned());
        }
        Ok(events.values().find(|e| criteria.matches(e)).cloned())
    }

    async fn insert_one(&self, event: &CanonicalEvent) -> Result<(), StoreError> {
        let mut events = self.events.lock().map_err(poisoned)?;
        if events.contains_key(&event.id) {
            return Err(StoreError::DuplicateKey(event.id.clone()));
        }
        events.insert(event.id.clone(), event.clone());

        debug!("Stored event: {} with id {}", event.title, event.id);
        Ok(())
    }
}

/// SQLite-backed store. `id` is the primary key, which backstops the
/// non-atomic check-then-insert of the dedup gate. Queries run on tokio's
/// blocking pool so a slow disk never stalls the async workers.
pub struct SqliteEventStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEventStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Unavailable(format!("cannot create {}: {}", parent.display(), e)))?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id                TEXT PRIMARY KEY,
                title             TEXT NOT NULL,
                description       TEXT NOT NULL,
                categories        TEXT NOT NULL,
                start_date        TEXT NOT NULL,
                end_date          TEXT NOT NULL,
                venue             TEXT NOT NULL,
                image_url         TEXT,
                official_website  TEXT NOT NULL,
                source_url        TEXT NOT NULL,
                price             TEXT,
                last_updated      TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS events_title_start ON events (title, start_date);
            "#,
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().map_err(poisoned)?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(poisoned)?;
            work(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("sqlite task failed: {}", e)))?
    }

    fn find_locked(conn: &Connection, criteria: &EventCriteria) -> Result<Option<CanonicalEvent>, StoreError> {
        let row = match criteria {
            EventCriteria::Id(id) => conn
                .query_row(
                    "SELECT * FROM events WHERE id = ?1",
                    params![id],
                    StoredRow::from_row,
                )
                .optional()?,
            EventCriteria::TitleAndStart { title, start_date } => conn
                .query_row(
                    "SELECT * FROM events WHERE title = ?1 AND start_date = ?2 LIMIT 1",
                    params![title, start_date.format(DATE_FORMAT).to_string()],
                    StoredRow::from_row,
                )
                .optional()?,
            EventCriteria::AnyOf(criteria) => {
                for inner in criteria {
                    if let Some(event) = Self::find_locked(conn, inner)? {
                        return Ok(Some(event));
                    }
                }
                return Ok(None);
            }
        };
        row.map(StoredRow::into_event).transpose()
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn find_one(&self, criteria: &EventCriteria) -> Result<Option<CanonicalEvent>, StoreError> {
        let criteria = criteria.clone();
        self.blocking(move |conn| Self::find_locked(conn, &criteria)).await
    }

    async fn insert_one(&self, event: &CanonicalEvent) -> Result<(), StoreError> {
        let categories = serde_json::to_string(&event.categories)?;
        let venue = serde_json::to_string(&event.venue)?;
        let event = event.clone();
        self.blocking(move |conn| {
            let result = conn.execute(
                "INSERT INTO events (id, title, description, categories, start_date, end_date, venue,
                                     image_url, official_website, source_url, price, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    event.id,
                    event.title,
                    event.description,
                    categories,
                    event.start_date.format(DATE_FORMAT).to_string(),
                    event.end_date.format(DATE_FORMAT).to_string(),
                    venue,
                    event.image_url,
                    event.official_website,
                    event.source_url,
                    event.price,
                    event.last_updated.to_rfc3339(),
                ],
            );
            match result {
                Ok(_) => {
                    debug!("Stored event: {} with id {}", event.title, event.id);
                    Ok(())
                }
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateKey(event.id.clone()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}

/// Open the store a config file asks for
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn EventStore>, StoreError> {
    match config.kind {
        StoreKind::Memory => {
            info!("Using in-memory event store");
            Ok(Arc::new(InMemoryEventStore::new()))
        }
        StoreKind::Sqlite => {
            info!("Using SQLite event store at {}", config.path.display());
            Ok(Arc::new(SqliteEventStore::open(&config.path)?))
        }
    }
}

struct StoredRow {
    id: String,
    title: String,
    description: String,
    categories: String,
    start_date: String,
    end_date: String,
    venue: String,
    image_url: Option<String>,
    official_website: String,
    source_url: String,
    price: Option<String>,
    last_updated: String,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            categories: row.get("categories")?,
            start_date: row.get("start_date")?,
            end_date: row.get("end_date")?,
            venue: row.get("venue")?,
            image_url: row.get("image_url")?,
            official_website: row.get("official_website")?,
            source_url: row.get("source_url")?,
            price: row.get("price")?,
            last_updated: row.get("last_updated")?,
        })
    }

    fn into_event(self) -> Result<CanonicalEvent, StoreError> {
        let parse_date = |raw: &str| {
            NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
                .map_err(|e| StoreError::Serialization(format!("bad stored date '{}': {}", raw, e)))
        };
        Ok(CanonicalEvent {
            start_date: parse_date(&self.start_date)?,
            end_date: parse_date(&self.end_date)?,
            last_updated: DateTime::parse_from_rfc3339(&self.last_updated)
                .map_err(|e| StoreError::Serialization(format!("bad lastUpdated '{}': {}", self.last_updated, e)))?
                .with_timezone(&Utc),
            categories: serde_json::from_str(&self.categories)?,
            venue: serde_json::from_str(&self.venue)?,
            id: self.id,
            title: self.title,
            description: self.description,
            image_url: self.image_url,
            official_website: self.official_website,
            source_url: self.source_url,
            price: self.price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Venue;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn event(id: &str, title: &str, day: u32) -> CanonicalEvent {
        let start = NaiveDate::from_ymd_opt(2025, 7, day)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap();
        CanonicalEvent {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            categories: BTreeSet::from(["Music".to_string()]),
            start_date: start,
            end_date: start + chrono::Duration::hours(2),
            venue: Venue {
                name: "Test Venue".to_string(),
                ..Default::default()
            },
            image_url: None,
            official_website: "https://example.com".to_string(),
            source_url: "https://example.com/events".to_string(),
            price: Some("$10".to_string()),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_criteria_matching() {
        let e = event("abc", "Jazz Night", 4);
        assert!(EventCriteria::Id("abc".to_string()).matches(&e));
        assert!(!EventCriteria::Id("xyz".to_string()).matches(&e));
        assert!(EventCriteria::TitleAndStart {
            title: "Jazz Night".to_string(),
            start_date: e.start_date,
        }
        .matches(&e));
        assert!(EventCriteria::AnyOf(vec![
            EventCriteria::Id("xyz".to_string()),
            EventCriteria::TitleAndStart {
                title: "Jazz Night".to_string(),
                start_date: e.start_date,
            },
        ])
        .matches(&e));
        assert!(!EventCriteria::AnyOf(vec![]).matches(&e));
    }

    #[tokio::test]
    async fn test_in_memory_store_rejects_duplicate_ids() {
        let store = InMemoryEventStore::new();
        store.insert_one(&event("abc", "Jazz Night", 4)).await.unwrap();

        let err = store.insert_one(&event("abc", "Other", 5)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(id) if id == "abc"));
        assert_eq!(store.len(), 1);

        let found = store
            .find_one(&EventCriteria::Id("abc".to_string()))
            .await
            .unwrap();
        assert_eq!(found.unwrap().title, "Jazz Night");
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trips_events() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        let original = event("abc", "Jazz Night", 4);
        store.insert_one(&original).await.unwrap();

        let by_key = store
            .find_one(&EventCriteria::TitleAndStart {
                title: "Jazz Night".to_string(),
                start_date: original.start_date,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_key.id, original.id);
        assert_eq!(by_key.categories, original.categories);
        assert_eq!(by_key.venue, original.venue);
        assert_eq!(by_key.end_date, original.end_date);
        assert_eq!(by_key.price, original.price);

        let missing = store
            .find_one(&EventCriteria::AnyOf(vec![
                EventCriteria::Id("nope".to_string()),
                EventCriteria::TitleAndStart {
                    title: "Jazz Night".to_string(),
                    start_date: original.end_date,
                },
            ]))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_sqlite_primary_key_backstop() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        store.insert_one(&event("abc", "Jazz Night", 4)).await.unwrap();
        let err = store.insert_one(&event("abc", "Jazz Night", 4)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sqlite_store_shared_across_tasks() {
        let store = Arc::new(SqliteEventStore::open_in_memory().unwrap());
        let mut handles = Vec::new();
        for day in 1..=8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let e = event(&format!("id-{day}"), "Jazz Night", day);
                store.insert_one(&e).await?;
                store.find_one(&EventCriteria::Id(e.id.clone())).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_some());
        }
        assert_eq!(store.count().unwrap(), 8);
    }
}
