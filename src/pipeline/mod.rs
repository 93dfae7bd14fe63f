//! Fragment-to-event normalization
//!
//! Each stage is a small unit struct with associated functions; [`NormalizationPipeline`]
//! strings them together for one site and hands the result to the dedup gate.

pub mod category;
pub mod date_range;
pub mod dedup;
pub mod identity;
pub mod text;
pub mod venue;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use tracing::{debug, error, info};

use crate::error::{Rejection, StoreError};
use crate::observability::metrics;
use crate::storage::EventStore;
use crate::types::{CanonicalEvent, RawEventFragment, Venue};

use category::CategoryClassifier;
use date_range::{DateRangeParser, VenueDefaults};
use dedup::DeduplicationGate;
use identity::EventIdentityGenerator;
use venue::{KnownVenue, VenueResolver};

/// Clock readings for one run, captured once so every fragment sees the same "now"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    /// Venue-local wall clock used to fill in missing years
    pub reference_now: NaiveDateTime,
    /// Stamped on every event as `lastUpdated`
    pub observed_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(reference_now: NaiveDateTime, observed_at: DateTime<Utc>) -> Self {
        Self {
            reference_now,
            observed_at,
        }
    }

    pub fn now() -> Self {
        Self::new(Local::now().naive_local(), Utc::now())
    }
}

/// Everything the pipeline needs to know about one site
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub site_id: String,
    pub listing_url: String,
    /// Base for relative links, `listing_url` when absent
    pub base_url: Option<String>,
    pub context_tags: Vec<String>,
    pub title_prefix: Option<String>,
    pub default_venue: Venue,
    /// Site entries first, then the global table
    pub known_venues: Vec<KnownVenue>,
    pub date_defaults: VenueDefaults,
    pub classifier: CategoryClassifier,
}

/// What happened to one fragment
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Inserted(CanonicalEvent),
    Duplicate { id: String },
    Rejected(Rejection),
}

pub struct NormalizationPipeline {
    settings: PipelineSettings,
}

impl NormalizationPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn site_id(&self) -> &str {
        &self.settings.site_id
    }

    /// Turn a fragment into a canonical event. Pure apart from logging and metrics.
    pub fn normalize(&self, fragment: &RawEventFragment, ctx: &RunContext) -> Result<CanonicalEvent, Rejection> {
        let settings = &self.settings;

        let raw_title = text::clean_text(&fragment.title);
        if raw_title.is_empty() {
            return Err(Rejection::MissingTitle);
        }

        let range = DateRangeParser::parse(
            &text::clean_text(&fragment.date_text),
            &text::clean_text(&fragment.time_text),
            ctx.reference_now,
            &settings.date_defaults,
        )
        .map_err(|mut failure| {
            failure.text = fragment.date_text.clone();
            failure
        })?;

        let title = text::apply_title_prefix(&raw_title, settings.title_prefix.as_deref());
        let description = text::clean_text(&fragment.description);

        let location = text::clean_text(&fragment.location_text);
        if VenueResolver::lookup(&location, &settings.known_venues).is_none() {
            debug!(
                "No known venue for location '{}' on {}, using site default",
                location, settings.site_id
            );
            metrics::normalize::venue_fallback(&settings.site_id);
        }
        let venue = VenueResolver::resolve(&location, &settings.default_venue, &settings.known_venues);

        let (categories, used_fallback) =
            settings
                .classifier
                .classify_with_fallback(&title, &description, &settings.context_tags);
        if used_fallback {
            debug!("No category keyword matched '{}', added {}", title, settings.classifier.fallback());
            metrics::normalize::category_fallback(&settings.site_id);
        }

        let id = EventIdentityGenerator::generate_id(&venue.name, &title, range.start_date);

        let base = settings.base_url.as_deref().unwrap_or(&settings.listing_url);
        let image_url = text::absolute_url(&fragment.image_url, Some(base));
        let official_website =
            text::absolute_url(&fragment.source_url, Some(base)).unwrap_or_else(|| settings.listing_url.clone());
        let price = Some(text::clean_text(&fragment.price_text)).filter(|p| !p.is_empty());

        Ok(CanonicalEvent {
            id,
            title,
            description,
            categories,
            start_date: range.start_date,
            end_date: range.end_date,
            venue,
            image_url,
            official_website,
            source_url: settings.listing_url.clone(),
            price,
            last_updated: ctx.observed_at,
        })
    }

    /// Normalize, dedup and persist one fragment.
    ///
    /// Rejections and duplicates are outcomes. Only store failures are errors.
    pub async fn process(
        &self,
        fragment: &RawEventFragment,
        ctx: &RunContext,
        store: &dyn EventStore,
    ) -> Result<ProcessOutcome, StoreError> {
        let site_id = self.site_id();
        metrics::normalize::fragment_processed(site_id);

        let event = match self.normalize(fragment, ctx) {
            Ok(event) => event,
            Err(rejection) => {
                match &rejection {
                    Rejection::UnparseableDate(failure) => {
                        info!(
                            "Rejected '{}' from {}: unparseable date '{}' ({})",
                            fragment.title,
                            site_id,
                            failure.text,
                            failure.reason.as_str()
                        );
                        metrics::normalize::date_rejected(site_id, failure.reason.as_str());
                    }
                    other => {
                        info!("Rejected fragment from {}: {}", site_id, other);
                        metrics::normalize::other_rejected(site_id);
                    }
                }
                return Ok(ProcessOutcome::Rejected(rejection));
            }
        };

        let should_insert = DeduplicationGate::should_insert(&event, store)
            .await
            .map_err(|e| self.store_failure(e))?;
        if !should_insert {
            metrics::dedup::duplicate(site_id);
            return Ok(ProcessOutcome::Duplicate { id: event.id });
        }

        match store.insert_one(&event).await {
            Ok(()) => {
                debug!("Inserted '{}' ({}) starting {}", event.title, event.id, event.start_date);
                metrics::dedup::inserted(site_id);
                Ok(ProcessOutcome::Inserted(event))
            }
            Err(StoreError::DuplicateKey(id)) => {
                debug!("Insert of {} lost a race with a concurrent writer", id);
                metrics::dedup::duplicate(site_id);
                Ok(ProcessOutcome::Duplicate { id })
            }
            Err(e) => Err(self.store_failure(e)),
        }
    }

    fn store_failure(&self, err: StoreError) -> StoreError {
        error!("Store failure while processing {}: {}", self.site_id(), err);
        metrics::dedup::store_error(self.site_id());
        err
    }
}
