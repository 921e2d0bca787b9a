use std::{
    convert::Infallible,
    fmt, fs,
    path::PathBuf,
    str::FromStr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::publication::Publication;

pub mod local;
pub mod pubmed;

const USER_AGENT: &str = concat!("folio/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unexpected response: {0}")]
    Shape(String),

    #[error("not configured: {0}")]
    NotConfigured(&'static str),
}

/// Anything that can produce a list of publications, typically over the network.
pub trait PublicationSource {
    /// Short human-readable name used in status lines.
    fn name(&self) -> &str;
    fn fetch(&self) -> Result<Vec<Publication>, SourceError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Where a static JSON file lives, which can either be
///
/// - an `http(s)` URL, fetched with a cache-busting query parameter, or
/// - a path on disk.
pub enum DataSource {
    Url(Url),
    File(PathBuf),
}

impl FromStr for DataSource {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Only web URLs count as URLs; anything else (including Windows drive letters, which
        // parse as a URL scheme) is a path.
        match Url::parse(s) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(DataSource::Url(url)),
            _ => Ok(DataSource::File(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Url(url) => write!(f, "{url}"),
            DataSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl DataSource {
    /// Read the whole source as text.
    pub fn read_to_string(&self, timeout: Duration) -> Result<String, SourceError> {
        match self {
            DataSource::File(path) => Ok(fs::read_to_string(path)?),
            DataSource::Url(url) => {
                let mut url = url.clone();
                let stamp = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis())
                    .unwrap_or_default();
                url.query_pairs_mut().append_pair("_", &stamp.to_string());
                debug!(%url, "fetching static file");
                get_text(&agent(timeout), &url)
            }
        }
    }
}

/// HTTP agent with a connect timeout and an overall deadline per request.
pub(crate) fn agent(timeout: Duration) -> ureq::Agent {
    let cfg = ureq::Agent::config_builder()
        .timeout_connect(Some(CONNECT_TIMEOUT.min(timeout)))
        .timeout_global(Some(timeout))
        .build();
    ureq::Agent::new_with_config(cfg)
}

pub(crate) fn get_text(agent: &ureq::Agent, url: &Url) -> Result<String, SourceError> {
    let body = agent
        .get(url.as_str())
        .header("User-Agent", USER_AGENT)
        .header("Accept", "application/json")
        .call()?
        .into_body()
        .read_to_string()?;
    Ok(body)
}
