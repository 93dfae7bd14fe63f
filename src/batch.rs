use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{Config, SiteConfig};
use crate::error::{Result, ScraperError};
use crate::observability::metrics;
use crate::pipeline::{NormalizationPipeline, ProcessOutcome, RunContext};
use crate::sources::{source_for, FragmentSource};
use crate::storage::EventStore;

/// Per-venue counts for one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VenueRunReport {
    pub site_id: String,
    pub fetched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub date_rejected: usize,
    pub other_rejected: usize,
    /// Why the job stopped early; counts made before that are kept
    pub failure: Option<String>,
}

impl VenueRunReport {
    pub fn new(site_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    fn record(&mut self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::Inserted(_) => self.inserted += 1,
            ProcessOutcome::Duplicate { .. } => self.duplicates += 1,
            ProcessOutcome::Rejected(r) if r.is_date_rejection() => self.date_rejected += 1,
            ProcessOutcome::Rejected(_) => self.other_rejected += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub venues: Vec<VenueRunReport>,
}

impl BatchReport {
    pub fn total_fetched(&self) -> usize {
        self.venues.iter().map(|v| v.fetched).sum()
    }

    pub fn total_inserted(&self) -> usize {
        self.venues.iter().map(|v| v.inserted).sum()
    }

    pub fn total_duplicates(&self) -> usize {
        self.venues.iter().map(|v| v.duplicates).sum()
    }

    pub fn total_date_rejected(&self) -> usize {
        self.venues.iter().map(|v| v.date_rejected).sum()
    }

    pub fn failed_venues(&self) -> impl Iterator<Item = &VenueRunReport> {
        self.venues.iter().filter(|v| !v.succeeded())
    }

    pub fn venue(&self, site_id: &str) -> Option<&VenueRunReport> {
        self.venues.iter().find(|v| v.site_id == site_id)
    }
}

/// One site's work: where fragments come from and how to normalize them
pub struct VenueJob {
    pub pipeline: NormalizationPipeline,
    pub source: Box<dyn FragmentSource>,
}

impl VenueJob {
    pub fn new(pipeline: NormalizationPipeline, source: Box<dyn FragmentSource>) -> Self {
        Self { pipeline, source }
    }

    pub fn from_site(config: &Config, site: &SiteConfig) -> Result<Self> {
        let pipeline = NormalizationPipeline::new(config.pipeline_settings(site));
        let source = source_for(&site.source, config.batch.venue_timeout())?;
        Ok(Self::new(pipeline, source))
    }

    pub fn site_id(&self) -> &str {
        self.pipeline.site_id()
    }
}

/// Build jobs for the configured sites, optionally restricted to `only`
pub fn jobs_from_config(config: &Config, only: Option<&[String]>) -> Result<Vec<VenueJob>> {
    let sites: Vec<&SiteConfig> = match only {
        Some(ids) => ids
            .iter()
            .map(|id| {
                config
                    .site(id)
                    .ok_or_else(|| ScraperError::Config(format!("unknown site '{}'", id)))
            })
            .collect::<Result<_>>()?,
        None => config.sites.iter().collect(),
    };
    sites.into_iter().map(|site| VenueJob::from_site(config, site)).collect()
}

/// Runs venue jobs with bounded concurrency and a per-venue timeout.
/// A failing venue never stops the others.
pub struct BatchRunner {
    store: Arc<dyn EventStore>,
    max_concurrency: usize,
    venue_timeout: Duration,
}

impl BatchRunner {
    pub fn new(store: Arc<dyn EventStore>, max_concurrency: usize, venue_timeout: Duration) -> Self {
        Self {
            store,
            max_concurrency: max_concurrency.max(1),
            venue_timeout,
        }
    }

    pub fn from_config(store: Arc<dyn EventStore>, config: &Config) -> Self {
        Self::new(store, config.batch.max_concurrency, config.batch.venue_timeout())
    }

    pub async fn run(&self, jobs: Vec<VenueJob>, ctx: RunContext) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("🚀 Starting batch run {} over {} venues", run_id, jobs.len());

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(jobs.len());

        for job in jobs {
            let site_id = job.site_id().to_string();
            let report = Arc::new(Mutex::new(VenueRunReport::new(site_id.clone())));
            let span = info_span!("venue_job", site_id = %site_id, run_id = %run_id);

            let handle = tokio::spawn(
                run_venue(
                    job,
                    self.store.clone(),
                    semaphore.clone(),
                    self.venue_timeout,
                    ctx,
                    report.clone(),
                )
                .instrument(span),
            );
            handles.push((site_id, report, handle));
        }

        let mut venues = Vec::with_capacity(handles.len());
        for (site_id, report, handle) in handles {
            if let Err(e) = handle.await {
                error!("Venue job for {} aborted: {}", site_id, e);
                metrics::batch::job_failed(&site_id, "panic");
                if let Ok(mut report) = report.lock() {
                    report.failure = Some(format!("job aborted: {}", e));
                }
            }
            let snapshot = match report.lock() {
                Ok(report) => report.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            };
            venues.push(snapshot);
        }

        let report = BatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            venues,
        };
        info!(
            "✅ Batch run {} finished: {} inserted, {} duplicates, {} date-rejected, {} venues failed",
            run_id,
            report.total_inserted(),
            report.total_duplicates(),
            report.total_date_rejected(),
            report.failed_venues().count()
        );
        report
    }
}

async fn run_venue(
    job: VenueJob,
    store: Arc<dyn EventStore>,
    semaphore: Arc<Semaphore>,
    venue_timeout: Duration,
    ctx: RunContext,
    report: Arc<Mutex<VenueRunReport>>,
) {
    let site_id = job.site_id().to_string();
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            set_failure(&report, format!("worker pool closed: {}", e));
            return;
        }
    };

    let started = Instant::now();
    let outcome = tokio::time::timeout(venue_timeout, process_venue(&job, store.as_ref(), &ctx, &report)).await;
    metrics::batch::job_duration(&site_id, started.elapsed().as_secs_f64());

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("Venue {} failed: {}", site_id, e);
            metrics::batch::job_failed(&site_id, error_type(&e));
            set_failure(&report, e.to_string());
        }
        Err(_) => {
            let err = ScraperError::Timeout {
                seconds: venue_timeout.as_secs(),
            };
            warn!("Venue {} did not finish: {}", site_id, err);
            metrics::batch::job_timed_out(&site_id);
            set_failure(&report, err.to_string());
        }
    }

    if let Ok(report) = report.lock() {
        info!(
            "📊 {}: fetched {}, inserted {}, duplicates {}, date-rejected {}, other rejected {}",
            site_id, report.fetched, report.inserted, report.duplicates, report.date_rejected, report.other_rejected
        );
    }
}

async fn process_venue(
    job: &VenueJob,
    store: &dyn EventStore,
    ctx: &RunContext,
    report: &Mutex<VenueRunReport>,
) -> Result<()> {
    let site_id = job.site_id();
    info!("📡 Fetching fragments for {}", site_id);
    let fragments = job.source.fetch_fragments().await?;
    metrics::batch::fragments_fetched(site_id, fragments.len());
    update(report, |r| r.fetched = fragments.len());

    for fragment in &fragments {
        let outcome = job.pipeline.process(fragment, ctx, store).await?;
        update(report, |r| r.record(&outcome));
    }
    Ok(())
}

fn update(report: &Mutex<VenueRunReport>, f: impl FnOnce(&mut VenueRunReport)) {
    match report.lock() {
        Ok(mut report) => f(&mut report),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}

fn set_failure(report: &Mutex<VenueRunReport>, message: String) {
    update(report, |r| r.failure = Some(message));
}

fn error_type(err: &ScraperError) -> &'static str {
    match err {
        ScraperError::Http(_) | ScraperError::Source { .. } | ScraperError::Io(_) => "fetch",
        ScraperError::Json(_) => "payload",
        ScraperError::Store(_) => "store",
        ScraperError::Timeout { .. } => "timeout",
        ScraperError::Toml(_) | ScraperError::Config(_) => "config",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Rejection;
    use crate::types::{CanonicalEvent, Venue};
    use std::collections::BTreeSet;

    fn event() -> CanonicalEvent {
        let start = chrono::NaiveDate::from_ymd_opt(2025, 7, 4)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap();
        CanonicalEvent {
            id: "x".to_string(),
            title: "X".to_string(),
            description: String::new(),
            categories: BTreeSet::from(["Music".to_string()]),
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

    #[test]
    fn test_report_counts_outcomes() {
        let mut report = VenueRunReport::new("site");
        report.record(&ProcessOutcome::Inserted(event()));
        report.record(&ProcessOutcome::Duplicate { id: "x".to_string() });
        report.record(&ProcessOutcome::Rejected(Rejection::MissingTitle));
        report.record(&ProcessOutcome::Rejected(Rejection::UnparseableDate(
            crate::error::ParseFailure::new("TBA", crate::error::ParseFailureReason::NoRecognizedDate),
        )));

        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.date_rejected, 1);
        assert_eq!(report.other_rejected, 1);
        assert!(report.succeeded());
    }

    #[test]
    fn test_batch_totals() {
        let mut a = VenueRunReport::new("a");
        a.inserted = 3;
        a.date_rejected = 1;
        let mut b = VenueRunReport::new("b");
        b.inserted = 2;
        b.duplicates = 4;
        b.failure = Some("boom".to_string());

        let report = BatchReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            venues: vec![a, b],
        };
        assert_eq!(report.total_inserted(), 5);
        assert_eq!(report.total_duplicates(), 4);
        assert_eq!(report.total_date_rejected(), 1);
        assert_eq!(report.failed_venues().count(), 1);
        assert_eq!(report.venue("b").unwrap().failure.as_deref(), Some("boom"));
    }
}
