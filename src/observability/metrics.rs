//! Metrics for the normalization pipeline and the batch runner
//!
//! Recording goes through the `metrics` facade; without an installed recorder
//! every call is a no-op, so library users and tests pay nothing.

use std::fmt;
use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// All metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalize
    FragmentsProcessed,
    DateRejections,
    OtherRejections,
    VenueFallbacks,
    CategoryFallbacks,

    // Dedup / store
    EventsInserted,
    EventsDuplicate,
    StoreErrors,

    // Batch
    FragmentsFetched,
    VenueJobFailures,
    VenueJobTimeouts,
    VenueJobDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::FragmentsProcessed => "events_fragments_processed_total",
            MetricName::DateRejections => "events_date_rejections_total",
            MetricName::OtherRejections => "events_other_rejections_total",
            MetricName::VenueFallbacks => "events_venue_fallbacks_total",
            MetricName::CategoryFallbacks => "events_category_fallbacks_total",

            MetricName::EventsInserted => "events_inserted_total",
            MetricName::EventsDuplicate => "events_duplicates_total",
            MetricName::StoreErrors => "events_store_errors_total",

            MetricName::FragmentsFetched => "events_fragments_fetched_total",
            MetricName::VenueJobFailures => "events_venue_job_failures_total",
            MetricName::VenueJobTimeouts => "events_venue_job_timeouts_total",
            MetricName::VenueJobDuration => "events_venue_job_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            FragmentsProcessed,
            DateRejections,
            OtherRejections,
            VenueFallbacks,
            CategoryFallbacks,
            EventsInserted,
            EventsDuplicate,
            StoreErrors,
            FragmentsFetched,
            VenueJobFailures,
            VenueJobTimeouts,
            VenueJobDuration,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Install the Prometheus recorder and serve `/metrics` on `listen`
pub fn init(listen: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))?;

    info!("Metrics exporter listening on http://{}/metrics", listen);
    Ok(())
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    pub fn fragment_processed(site_id: &str) {
        ::metrics::counter!(MetricName::FragmentsProcessed.as_str(), "site_id" => site_id.to_string()).increment(1);
    }

    /// Record a date rejection, labelled with the parse failure reason
    pub fn date_rejected(site_id: &str, reason: &'static str) {
        ::metrics::counter!(MetricName::DateRejections.as_str(),
            "site_id" => site_id.to_string(),
            "reason" => reason
        )
        .increment(1);
    }

    pub fn other_rejected(site_id: &str) {
        ::metrics::counter!(MetricName::OtherRejections.as_str(), "site_id" => site_id.to_string()).increment(1);
    }

    pub fn venue_fallback(site_id: &str) {
        ::metrics::counter!(MetricName::VenueFallbacks.as_str(), "site_id" => site_id.to_string()).increment(1);
    }

    pub fn category_fallback(site_id: &str) {
        ::metrics::counter!(MetricName::CategoryFallbacks.as_str(), "site_id" => site_id.to_string()).increment(1);
    }
}

// ============================================================================
// Dedup Metrics
// ============================================================================

pub mod dedup {
    use super::MetricName;

    pub fn inserted(site_id: &str) {
        ::metrics::counter!(MetricName::EventsInserted.as_str(), "site_id" => site_id.to_string()).increment(1);
    }

    pub fn duplicate(site_id: &str) {
        ::metrics::counter!(MetricName::EventsDuplicate.as_str(), "site_id" => site_id.to_string()).increment(1);
    }

    pub fn store_error(site_id: &str) {
        ::metrics::counter!(MetricName::StoreErrors.as_str(), "site_id" => site_id.to_string()).increment(1);
    }
}

// ============================================================================
// Batch Metrics
// ============================================================================

pub mod batch {
    use super::MetricName;

    pub fn fragments_fetched(site_id: &str, count: usize) {
        ::metrics::counter!(MetricName::FragmentsFetched.as_str(), "site_id" => site_id.to_string())
            .increment(count as u64);
    }

    pub fn job_failed(site_id: &str, error_type: &'static str) {
        ::metrics::counter!(MetricName::VenueJobFailures.as_str(),
            "site_id" => site_id.to_string(),
            "error_type" => error_type
        )
        .increment(1);
    }

    pub fn job_timed_out(site_id: &str) {
        ::metrics::counter!(MetricName::VenueJobTimeouts.as_str(), "site_id" => site_id.to_string()).increment(1);
    }

    pub fn job_duration(site_id: &str, secs: f64) {
        ::metrics::histogram!(MetricName::VenueJobDuration.as_str(), "site_id" => site_id.to_string()).record(secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_unique_and_prefixed() {
        let names: Vec<&str> = MetricName::all_metrics().map(|m| m.as_str()).collect();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(names.len(), unique.len());
        assert!(names.iter().all(|n| n.starts_with("events_")));
        assert_eq!(MetricName::EventsInserted.to_string(), "events_inserted_total");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        normalize::fragment_processed("test");
        dedup::duplicate("test");
        batch::job_duration("test", 0.5);
    }
}
