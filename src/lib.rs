// Event normalization and deduplication pipeline library

pub mod batch;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod sources;
pub mod storage;
pub mod types;

pub use batch::{BatchReport, BatchRunner, VenueJob, VenueRunReport};
pub use config::Config;
pub use error::{ParseFailure, Rejection, Result, ScraperError, StoreError};
pub use pipeline::{NormalizationPipeline, PipelineSettings, ProcessOutcome, RunContext};
pub use storage::{EventCriteria, EventStore, InMemoryEventStore, SqliteEventStore};
pub use types::{CanonicalEvent, RawEventFragment, Venue};
