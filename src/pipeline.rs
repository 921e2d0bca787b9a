use std::{fmt, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    identity, merge,
    publication::Publication,
    review::{ReviewLedger, ReviewState},
    source::{DataSource, PublicationSource, local},
    view::{self, View, ViewQuery},
};

/// How the current publication list came about; rendered as the status line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    /// Remote and local data were merged.
    Merged {
        source: String,
        total: usize,
        remote: usize,
        local: usize,
    },
    /// The remote source was not consulted.
    LocalOnly { total: usize },
    /// The remote source failed; only local data is shown.
    Fallback { source: String, total: usize },
}

impl LoadStatus {
    pub fn is_fallback(&self) -> bool {
        matches!(self, LoadStatus::Fallback { .. })
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStatus::Merged {
                source,
                total,
                remote,
                local,
            } => write!(
                f,
                "Loaded {total} publications ({remote} from {source}, {local} local)."
            ),
            LoadStatus::LocalOnly { total } => {
                write!(f, "Loaded {total} local publications.")
            }
            LoadStatus::Fallback { source, total } => write!(
                f,
                "{source} unavailable; fell back to {total} local publications."
            ),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoadOutcome {
    pub publications: Vec<Publication>,
    pub status: LoadStatus,
}

/// Load local data, then the remote source (when given), and merge them.
///
/// The local file is always read before the remote call starts. A remote failure never fails
/// the load: the outcome falls back to the deduplicated local list and says so in its status.
pub fn load_publications(
    local_file: Option<&DataSource>,
    local_timeout: Duration,
    remote: Option<&dyn PublicationSource>,
) -> LoadOutcome {
    let local_pubs: Vec<Publication> = local_file
        .map(|src| local::load_array(src, local_timeout))
        .unwrap_or_default();
    debug!(count = local_pubs.len(), "local publications");

    let Some(remote) = remote else {
        let publications = merge::dedupe(local_pubs);
        let status = LoadStatus::LocalOnly {
            total: publications.len(),
        };
        return LoadOutcome {
            publications,
            status,
        };
    };

    match remote.fetch() {
        Ok(remote_pubs) => {
            let remote_count = remote_pubs.len();
            let local_count = local_pubs.len();
            let publications = merge::dedupe(merge::merge(&remote_pubs, &local_pubs));
            info!(
                remote = remote_count,
                local = local_count,
                merged = publications.len(),
                "merged publications"
            );
            let status = LoadStatus::Merged {
                source: remote.name().to_string(),
                total: publications.len(),
                remote: remote_count,
                local: local_count,
            };
            LoadOutcome {
                publications,
                status,
            }
        }
        Err(e) => {
            warn!(source = remote.name(), error = %e, "remote fetch failed, using local data");
            let publications = merge::dedupe(local_pubs);
            let status = LoadStatus::Fallback {
                source: remote.name().to_string(),
                total: publications.len(),
            };
            LoadOutcome {
                publications,
                status,
            }
        }
    }
}

/// Identifies one load; later loads get larger tickets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

/// Owns the publication list, its status and the review ledger.
pub struct Controller<'s> {
    ledger: ReviewLedger<'s>,
    publications: Vec<Publication>,
    status: Option<LoadStatus>,
    issued: u64,
    installed: Option<LoadTicket>,
}

impl<'s> Controller<'s> {
    pub fn new(ledger: ReviewLedger<'s>) -> Self {
        Controller {
            ledger,
            publications: Vec::new(),
            status: None,
            issued: 0,
            installed: None,
        }
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.issued += 1;
        LoadTicket(self.issued)
    }

    /// Install a finished load unless a newer one is already installed. Returns whether the
    /// outcome was installed.
    pub fn complete_load(&mut self, ticket: LoadTicket, outcome: LoadOutcome) -> bool {
        if self.installed.is_some_and(|current| current > ticket) {
            debug!(?ticket, "discarding stale load");
            return false;
        }
        self.publications = outcome.publications;
        self.status = Some(outcome.status);
        self.installed = Some(ticket);
        true
    }

    pub fn publications(&self) -> &[Publication] {
        &self.publications
    }

    pub fn status(&self) -> Option<&LoadStatus> {
        self.status.as_ref()
    }

    pub fn ledger(&self) -> &ReviewLedger<'s> {
        &self.ledger
    }

    pub fn view(&self, query: &ViewQuery) -> View<'_> {
        view::project(&self.publications, &self.ledger, query)
    }

    pub fn find(&self, key: &str) -> Option<&Publication> {
        let key = key.trim();
        self.publications.iter().find(|p| identity::key(p) == key)
    }

    /// Record a decision for the publication with identity `key`.
    ///
    /// Undoing also works for keys whose publication has disappeared from the list.
    pub fn review(&mut self, key: &str, state: ReviewState) -> anyhow::Result<()> {
        let key = key.trim();
        let known = self.publications.iter().any(|p| identity::key(p) == key);
        let orphan_undo = state == ReviewState::Unreviewed && self.ledger.contains_key(key);
        if !known && !orphan_undo {
            anyhow::bail!("no publication with key: {key}");
        }
        self.ledger.set_key(key, state)
    }

    pub fn clear_reviews(&mut self) -> anyhow::Result<()> {
        self.ledger.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::PubMedConfig,
        source::{SourceError, pubmed::PubMed},
        store::MemoryStore,
    };
    use std::{fs, net::TcpListener, path::PathBuf, thread, time::Instant};
    use tempfile::NamedTempFile;

    struct Fixed(Vec<Publication>);
    struct Failing;

    impl PublicationSource for Fixed {
        fn name(&self) -> &str {
            "Fixed"
        }
        fn fetch(&self) -> Result<Vec<Publication>, SourceError> {
            Ok(self.0.clone())
        }
    }

    impl PublicationSource for Failing {
        fn name(&self) -> &str {
            "PubMed"
        }
        fn fetch(&self) -> Result<Vec<Publication>, SourceError> {
            Err(SourceError::Shape("timed out".into()))
        }
    }

    fn local_file(json: &str) -> (NamedTempFile, DataSource) {
        let tmp = NamedTempFile::new().expect("tmp file");
        fs::write(tmp.path(), json).unwrap();
        let src = DataSource::File(tmp.path().to_path_buf());
        (tmp, src)
    }

    const T: Duration = Duration::from_secs(1);

    #[test]
    fn remote_failure_falls_back_to_local() {
        let (_tmp, src) = local_file(r#"[{"title":"X","doi":"10.1/y"}]"#);
        let out = load_publications(Some(&src), T, Some(&Failing));
        assert_eq!(
            out.publications,
            vec![Publication {
                title: Some("X".into()),
                doi: Some("10.1/y".into()),
                ..Default::default()
            }]
        );
        assert!(out.status.is_fallback());
        let line = out.status.to_string();
        assert!(line.contains("fell back"), "{line}");
        assert!(!line.contains("timed out"), "raw error leaked: {line}");
    }

    #[test]
    fn remote_only_pmid_record_is_kept() {
        let (_tmp, src) = local_file("[]");
        let remote = Fixed(vec![Publication {
            title: Some("R".into()),
            pmid: Some("123".into()),
            ..Default::default()
        }]);
        let out = load_publications(Some(&src), T, Some(&remote));
        assert_eq!(out.publications.len(), 1);
        assert_eq!(identity::key(&out.publications[0]), "pmid:123");
        assert_eq!(
            out.status,
            LoadStatus::Merged {
                source: "Fixed".into(),
                total: 1,
                remote: 1,
                local: 0
            }
        );
    }

    #[test]
    fn missing_local_file_still_merges_remote() {
        let src = DataSource::File(PathBuf::from("/no/such/publications.json"));
        let remote = Fixed(vec![Publication {
            pmid: Some("9".into()),
            ..Default::default()
        }]);
        let out = load_publications(Some(&src), T, Some(&remote));
        assert_eq!(out.publications.len(), 1);
    }

    #[test]
    fn offline_load_dedupes_local() {
        let (_tmp, src) = local_file(r#"[{"title":"X","doi":"10.1/Y"},{"title":"dup","doi":"10.1/y"}]"#);
        let out = load_publications(Some(&src), T, None);
        assert_eq!(out.publications.len(), 1);
        assert_eq!(out.status, LoadStatus::LocalOnly { total: 1 });
    }

    #[test]
    fn hanging_remote_times_out_and_falls_back() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().unwrap();
        // Accept the connection and never answer.
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                thread::sleep(Duration::from_secs(10));
                drop(stream);
            }
        });

        let (_tmp, src) = local_file(r#"[{"title":"Local","doi":"10.1/l"}]"#);
        let config = PubMedConfig {
            base_url: format!("http://{addr}/"),
            author_query: "Doe J[Author]".into(),
            timeout_secs: 1,
            ..Default::default()
        };
        let pubmed = PubMed::new(&config);

        let started = Instant::now();
        let out = load_publications(Some(&src), T, Some(&pubmed));
        let elapsed = started.elapsed();

        assert!(out.status.is_fallback(), "{}", out.status);
        assert_eq!(out.publications.len(), 1);
        assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    }

    #[test]
    fn odd_local_field_values_keep_the_record() {
        let (_tmp, src) = local_file(r#"[{"title":"X","year":2020.0},{"title":"Y","pmid":true}]"#);
        let out = load_publications(Some(&src), T, None);
        assert_eq!(out.publications.len(), 2);
        assert_eq!(out.publications[0].year, Some(2020));
        assert_eq!(out.publications[1].pmid, None);
    }

    fn outcome(title: &str) -> LoadOutcome {
        LoadOutcome {
            publications: vec![Publication {
                title: Some(title.into()),
                ..Default::default()
            }],
            status: LoadStatus::LocalOnly { total: 1 },
        }
    }

    #[test]
    fn stale_load_is_discarded() {
        let store = MemoryStore::default();
        let mut c = Controller::new(ReviewLedger::load(&store).unwrap());
        let first = c.begin_load();
        let second = c.begin_load();
        assert!(c.complete_load(second, outcome("new")));
        assert!(!c.complete_load(first, outcome("old")));
        assert_eq!(c.publications()[0].display_title(), "new");
    }

    #[test]
    fn older_load_installs_when_it_finishes_first() {
        let store = MemoryStore::default();
        let mut c = Controller::new(ReviewLedger::load(&store).unwrap());
        let first = c.begin_load();
        let second = c.begin_load();
        assert!(c.complete_load(first, outcome("old")));
        assert!(c.complete_load(second, outcome("new")));
        assert_eq!(c.publications()[0].display_title(), "new");
    }

    #[test]
    fn review_by_key() {
        let store = MemoryStore::default();
        let mut c = Controller::new(ReviewLedger::load(&store).unwrap());
        let t = c.begin_load();
        c.complete_load(t, outcome("Paper"));

        c.review("t:paper", ReviewState::Accepted).unwrap();
        assert_eq!(c.ledger().get_key("t:paper"), ReviewState::Accepted);
        let err = c.review("t:nothing", ReviewState::Rejected).unwrap_err();
        assert!(err.to_string().contains("no publication with key"));

        // Orphaned decisions can still be undone.
        let t = c.begin_load();
        c.complete_load(t, outcome("Else"));
        c.review("t:paper", ReviewState::Unreviewed).unwrap();
        assert!(c.ledger().is_empty());
    }
}
