use thiserror::Error;

/// Why a date string could not be turned into a date range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailureReason {
    /// No supported date grammar matched the text
    NoRecognizedDate,
    /// A grammar matched but produced a day that does not exist (e.g. February 30)
    InvalidCalendarDate,
    /// A time-of-day was out of range (e.g. 13pm, 9:75)
    InvalidTimeOfDay,
}

impl ParseFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseFailureReason::NoRecognizedDate => "no_recognized_date",
            ParseFailureReason::InvalidCalendarDate => "invalid_calendar_date",
            ParseFailureReason::InvalidTimeOfDay => "invalid_time_of_day",
        }
    }
}

/// Explicit date parse failure. Carries the text exactly as the scraper supplied it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("could not parse date '{text}' ({})", .reason.as_str())]
pub struct ParseFailure {
    pub text: String,
    pub reason: ParseFailureReason,
}

impl ParseFailure {
    pub fn new(text: impl Into<String>, reason: ParseFailureReason) -> Self {
        Self {
            text: text.into(),
            reason,
        }
    }
}

/// A fragment the pipeline refuses to turn into an event. The caller logs and drops it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("unparseable date: {0}")]
    UnparseableDate(#[from] ParseFailure),

    #[error("fragment has no title")]
    MissingTitle,
}

impl Rejection {
    pub fn is_date_rejection(&self) -> bool {
        matches!(self, Rejection::UnparseableDate(_))
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store's own uniqueness constraint refused the insert
    #[error("event id already stored: {0}")]
    DuplicateKey(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored record could not be (de)serialized: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Source error: {message}")]
    Source { message: String },

    #[error("Timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

pub type Result<T> = std::result::Result<T, ScraperError>;
