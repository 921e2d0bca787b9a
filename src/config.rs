use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::source::DataSource;

/// Root configuration, loaded from `~/.config/folio/config.toml` unless told otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub publications: PublicationsConfig,
    pub pubmed: PubMedConfig,
    pub blog: BlogConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicationsConfig {
    /// Path or URL of the curated publications file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    /// Timeout for fetching `local` when it is a URL.
    pub timeout_secs: u64,
}

/// NCBI eUtils settings for the author search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PubMedConfig {
    pub base_url: String,
    /// Sent as the `tool` parameter, per NCBI etiquette.
    pub tool: String,
    /// Sent as the `email` parameter when non-empty.
    pub email: String,
    /// Author alternatives clause, e.g. `"Doe J"[Author] OR "Doe Jane"[Author]`.
    pub author_query: String,
    /// Title/abstract phrases to exclude.
    pub exclude: Vec<String>,
    pub retmax: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    /// Path or URL of the published posts file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<String>,
    pub default_author: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for PublicationsConfig {
    fn default() -> Self {
        Self {
            local: Some("data/publications.json".to_string()),
            timeout_secs: 15,
        }
    }
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/".to_string(),
            tool: "folio".to_string(),
            email: String::new(),
            author_query: String::new(),
            exclude: Vec::new(),
            retmax: 200,
            timeout_secs: 15,
        }
    }
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            public: Some("data/blog.json".to_string()),
            default_author: String::new(),
        }
    }
}

impl PublicationsConfig {
    pub fn source(&self) -> Option<DataSource> {
        self.local.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl PubMedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl BlogConfig {
    pub fn source(&self) -> Option<DataSource> {
        self.public.as_deref().and_then(|s| s.parse().ok())
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("folio").join("config.toml"))
    }

    /// Load from `path` when given (it must exist), else from the default location when present,
    /// else defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => {
                    debug!("no config file, using defaults");
                    return Ok(Config::default());
                }
            },
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Where persisted state lives: the override, the configured directory, or the user's data
    /// directory.
    pub fn state_dir(&self, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
        override_dir
            .map(Path::to_path_buf)
            .or_else(|| self.storage.dir.clone())
            .or_else(|| dirs::data_dir().map(|d| d.join("folio")))
            .ok_or_else(|| anyhow!("no state directory available; pass --state-dir"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_file_keeps_defaults() {
        let tmp = NamedTempFile::new().expect("tmp file");
        fs::write(
            tmp.path(),
            r#"
[pubmed]
author_query = '"Doe J"[Author]'
exclude = ["mouse model"]
"#,
        )
        .unwrap();
        let config = Config::load(Some(tmp.path())).unwrap();
        assert_eq!(config.pubmed.author_query, r#""Doe J"[Author]"#);
        assert_eq!(config.pubmed.exclude, vec!["mouse model".to_string()]);
        assert_eq!(config.pubmed.retmax, 200);
        assert_eq!(config.pubmed.timeout(), Duration::from_secs(15));
        assert_eq!(
            config.publications.local.as_deref(),
            Some("data/publications.json")
        );
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/no/such/folio.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let tmp = NamedTempFile::new().expect("tmp file");
        fs::write(tmp.path(), "[pubmed\nretmax = ").unwrap();
        let err = Config::load(Some(tmp.path())).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn state_dir_prefers_override() {
        let mut config = Config::default();
        config.storage.dir = Some(PathBuf::from("/from/config"));
        assert_eq!(
            config.state_dir(Some(Path::new("/from/flag"))).unwrap(),
            PathBuf::from("/from/flag")
        );
        assert_eq!(config.state_dir(None).unwrap(), PathBuf::from("/from/config"));
    }
}
