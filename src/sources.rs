use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::config::SourceConfig;
use crate::error::{Result, ScraperError};
use crate::types::RawEventFragment;

/// Supplier of one site's scraped fragments
#[async_trait]
pub trait FragmentSource: Send + Sync {
    async fn fetch_fragments(&self) -> Result<Vec<RawEventFragment>>;
}

/// Accepted payload shapes: a bare array, or `{ "events": [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum FragmentPayload {
    List(Vec<RawEventFragment>),
    Wrapped { events: Vec<RawEventFragment> },
}

impl FragmentPayload {
    fn into_fragments(self) -> Vec<RawEventFragment> {
        match self {
            FragmentPayload::List(fragments) => fragments,
            FragmentPayload::Wrapped { events } => events,
        }
    }
}

pub fn parse_fragments(body: &str) -> Result<Vec<RawEventFragment>> {
    let payload: FragmentPayload = serde_json::from_str(body)?;
    Ok(payload.into_fragments())
}

pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FragmentSource for JsonFileSource {
    async fn fetch_fragments(&self) -> Result<Vec<RawEventFragment>> {
        let body = tokio::fs::read_to_string(&self.path).await.map_err(|e| ScraperError::Source {
            message: format!("cannot read {}: {}", self.path.display(), e),
        })?;
        let fragments = parse_fragments(&body)?;
        debug!("Read {} fragments from {}", fragments.len(), self.path.display());
        Ok(fragments)
    }
}

pub struct HttpJsonSource {
    client: reqwest::Client,
    url: String,
}

impl HttpJsonSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl FragmentSource for HttpJsonSource {
    async fn fetch_fragments(&self) -> Result<Vec<RawEventFragment>> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::Source {
                message: format!("GET {} returned {}", self.url, status),
            });
        }
        let body = response.text().await?;
        let fragments = parse_fragments(&body)?;
        debug!("Fetched {} fragments from {}", fragments.len(), self.url);
        Ok(fragments)
    }
}

/// Build the source a site is configured with. HTTP requests share the venue timeout.
pub fn source_for(config: &SourceConfig, timeout: Duration) -> Result<Box<dyn FragmentSource>> {
    Ok(match config {
        SourceConfig::File { path } => Box::new(JsonFileSource::new(path.clone())),
        SourceConfig::Http { url } => Box::new(HttpJsonSource::new(url.clone(), timeout)?),
    })
}
