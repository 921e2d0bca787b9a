//! NCBI eUtils client: an author search (`esearch`) followed by one batch summary call
//! (`esummary`), both JSON.
//!
//! API docs: https://www.ncbi.nlm.nih.gov/books/NBK25501/

use once_cell::sync::Lazy;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::PubMedConfig,
    publication::Publication,
    source::{PublicationSource, SourceError, agent, get_text},
};

const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub struct PubMed<'a> {
    config: &'a PubMedConfig,
}

impl<'a> PubMed<'a> {
    pub fn new(config: &'a PubMedConfig) -> Self {
        PubMed { config }
    }

    fn endpoint(&self, name: &str) -> Result<Url, SourceError> {
        let mut base = self.config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let mut url = Url::parse(&base)?.join(name)?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("db", "pubmed").append_pair("retmode", "json");
            if !self.config.tool.trim().is_empty() {
                q.append_pair("tool", self.config.tool.trim());
            }
            if !self.config.email.trim().is_empty() {
                q.append_pair("email", self.config.email.trim());
            }
        }
        Ok(url)
    }

    fn search(&self, agent: &ureq::Agent, term: &str) -> Result<Vec<String>, SourceError> {
        let mut url = self.endpoint("esearch.fcgi")?;
        url.query_pairs_mut()
            .append_pair("sort", "pub_date")
            .append_pair("retmax", &self.config.retmax.to_string())
            .append_pair("term", term);
        debug!(%url, "PubMed search");
        let body: Value = serde_json::from_str(&get_text(agent, &url)?)?;
        parse_search(&body)
    }

    fn summaries(
        &self,
        agent: &ureq::Agent,
        ids: &[String],
    ) -> Result<Vec<Publication>, SourceError> {
        let mut url = self.endpoint("esummary.fcgi")?;
        url.query_pairs_mut().append_pair("id", &ids.join(","));
        debug!(count = ids.len(), "PubMed summary");
        let body: Value = serde_json::from_str(&get_text(agent, &url)?)?;
        parse_summaries(&body)
    }
}

impl PublicationSource for PubMed<'_> {
    fn name(&self) -> &str {
        "PubMed"
    }

    fn fetch(&self) -> Result<Vec<Publication>, SourceError> {
        if self.config.author_query.trim().is_empty() {
            return Err(SourceError::NotConfigured("pubmed.author_query is empty"));
        }
        let term = build_term(&self.config.author_query, &self.config.exclude);
        let agent = agent(self.config.timeout());

        let ids = self.search(&agent, &term)?;
        if ids.is_empty() {
            info!("PubMed search matched nothing");
            return Ok(Vec::new());
        }
        let pubs = self.summaries(&agent, &ids)?;
        info!(found = ids.len(), normalized = pubs.len(), "fetched PubMed records");
        Ok(pubs)
    }
}

/// Search term: the author clause, then a `NOT (...)` clause over quoted title/abstract phrases.
pub fn build_term(author_query: &str, exclude: &[String]) -> String {
    let mut term = author_query.trim().to_string();
    let phrases: Vec<String> = exclude
        .iter()
        .map(|p| p.trim().replace('"', ""))
        .filter(|p| !p.is_empty())
        .map(|p| format!("\"{p}\"[tiab]"))
        .collect();
    if !phrases.is_empty() {
        term = format!("{term} NOT ({})", phrases.join(" OR "));
    }
    term
}

fn parse_search(body: &Value) -> Result<Vec<String>, SourceError> {
    let list = body
        .get("esearchresult")
        .and_then(|r| r.get("idlist"))
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Shape(describe_error(body, "missing esearchresult.idlist")))?;
    Ok(list
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect())
}

fn parse_summaries(body: &Value) -> Result<Vec<Publication>, SourceError> {
    let result = body
        .get("result")
        .and_then(Value::as_object)
        .ok_or_else(|| SourceError::Shape(describe_error(body, "missing result")))?;
    let uids = result
        .get("uids")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Shape("missing result.uids".to_string()))?;

    Ok(uids
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|uid| match result.get(uid).and_then(normalize) {
            Some(p) => Some(p),
            None => {
                warn!(uid, "skipping malformed PubMed summary");
                None
            }
        })
        .collect())
}

fn describe_error(body: &Value, fallback: &str) -> String {
    body.get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// Map one eSummary record onto a publication. Records that are not objects or lack a `uid`
/// yield `None`.
pub fn normalize(record: &Value) -> Option<Publication> {
    let record = record.as_object()?;
    let uid = record.get("uid").and_then(Value::as_str)?.trim();
    if uid.is_empty() {
        return None;
    }
    let text = |k: &str| {
        record
            .get(k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let title = text("title").map(|t| collapse_ws(&t));
    let authors = record
        .get("authors")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    let journal = text("fulljournalname").or_else(|| text("source"));
    let year = text("pubdate").and_then(|d| extract_year(&d));
    let doi = record
        .get("articleids")
        .and_then(Value::as_array)
        .and_then(|ids| {
            ids.iter().find(|id| {
                id.get("idtype")
                    .and_then(Value::as_str)
                    .is_some_and(|t| t.eq_ignore_ascii_case("doi"))
            })
        })
        .and_then(|id| id.get("value").and_then(Value::as_str))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let url = match &doi {
        Some(d) => doi_url(d),
        None => format!("https://pubmed.ncbi.nlm.nih.gov/{uid}/"),
    };

    Some(Publication {
        title,
        authors: Some(authors),
        journal,
        year,
        doi,
        pmid: Some(uid.to_string()),
        url: Some(url),
        citation: None,
    })
}

/// First 4-digit token starting with 19 or 20. No guessing beyond that.
pub fn extract_year(date: &str) -> Option<i32> {
    static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());
    YEAR_RE.find(date).and_then(|m| m.as_str().parse().ok())
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn doi_url(doi: &str) -> String {
    format!(
        "https://doi.org/{}",
        utf8_percent_encode(doi, PATH_SEGMENT_ENCODE_SET)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn term_without_exclusions_is_the_author_clause() {
        assert_eq!(build_term(" Doe J[Author] ", &[]), "Doe J[Author]");
    }

    #[test]
    fn term_excludes_quoted_phrases() {
        let term = build_term(
            "(Doe J[Author] OR Doe Jane[Author])",
            &["mouse model".into(), "  ".into(), "say \"hi\"".into()],
        );
        assert_eq!(
            term,
            r#"(Doe J[Author] OR Doe Jane[Author]) NOT ("mouse model"[tiab] OR "say hi"[tiab])"#
        );
    }

    #[test]
    fn year_is_first_plausible_token() {
        assert_eq!(extract_year("2021 Jan 5"), Some(2021));
        assert_eq!(extract_year("Spring 1999"), Some(1999));
        assert_eq!(extract_year("Vol 1850, 2003"), Some(2003));
        assert_eq!(extract_year("12021"), None);
        assert_eq!(extract_year("n.d."), None);
    }

    #[test]
    fn normalizes_full_record() {
        let record = json!({
            "uid": "123",
            "title": "  A   study\nof things. ",
            "authors": [{"name": "Doe J"}, {"name": "Roe R"}],
            "fulljournalname": "Journal of Things",
            "source": "J Things",
            "pubdate": "2021 Mar",
            "articleids": [
                {"idtype": "pubmed", "value": "123"},
                {"idtype": "doi", "value": "10.1000/xyz 1"}
            ]
        });
        let p = normalize(&record).unwrap();
        assert_eq!(p.title.as_deref(), Some("A study of things."));
        assert_eq!(p.authors.as_deref(), Some("Doe J, Roe R"));
        assert_eq!(p.journal.as_deref(), Some("Journal of Things"));
        assert_eq!(p.year, Some(2021));
        assert_eq!(p.doi.as_deref(), Some("10.1000/xyz 1"));
        assert_eq!(p.pmid.as_deref(), Some("123"));
        assert_eq!(p.url.as_deref(), Some("https://doi.org/10.1000/xyz%201"));
        assert_eq!(p.citation, None);
    }

    #[test]
    fn normalizes_sparse_record() {
        let p = normalize(&json!({"uid": "42", "source": "J X", "pubdate": "in press"})).unwrap();
        assert_eq!(p.title, None);
        assert_eq!(p.authors.as_deref(), Some(""));
        assert_eq!(p.journal.as_deref(), Some("J X"));
        assert_eq!(p.year, None);
        assert_eq!(p.doi, None);
        assert_eq!(p.url.as_deref(), Some("https://pubmed.ncbi.nlm.nih.gov/42/"));
    }

    #[test]
    fn rejects_records_without_uid() {
        assert!(normalize(&json!({"title": "x"})).is_none());
        assert!(normalize(&json!("123")).is_none());
        assert!(normalize(&json!({"uid": " "})).is_none());
    }

    #[test]
    fn summaries_skip_malformed_records() {
        let body = json!({
            "result": {
                "uids": ["1", "2", "3"],
                "1": {"uid": "1", "title": "One"},
                "2": "garbage",
                "3": {"uid": "3", "title": "Three"}
            }
        });
        let pubs = parse_summaries(&body).unwrap();
        let titles: Vec<_> = pubs.iter().map(|p| p.display_title()).collect();
        assert_eq!(titles, ["One", "Three"]);
    }

    #[test]
    fn search_reports_api_errors() {
        let err = parse_search(&json!({"error": "API rate limit exceeded"})).unwrap_err();
        assert!(err.to_string().contains("API rate limit exceeded"));
    }

    #[test]
    fn unconfigured_query_fails_without_network() {
        let config = PubMedConfig::default();
        let err = PubMed::new(&config).fetch().unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured(_)));
    }

    #[test]
    fn fetches_search_then_summary() {
        let mut server = mockito::Server::new();
        let search = server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("db".into(), "pubmed".into()),
                Matcher::UrlEncoded("retmode".into(), "json".into()),
                Matcher::UrlEncoded("tool".into(), "folio-test".into()),
                Matcher::UrlEncoded("email".into(), "me@example.org".into()),
                Matcher::UrlEncoded(
                    "term".into(),
                    r#"Doe J[Author] NOT ("rat"[tiab])"#.into(),
                ),
            ]))
            .with_body(r#"{"esearchresult":{"count":"2","idlist":["11","22"]}}"#)
            .create();
        let summary = server
            .mock("GET", "/esummary.fcgi")
            .match_query(Matcher::UrlEncoded("id".into(), "11,22".into()))
            .with_body(
                json!({
                    "result": {
                        "uids": ["11", "22"],
                        "11": {"uid": "11", "title": "Eleven", "pubdate": "2020"},
                        "22": {"uid": "22", "title": "Twenty-two", "pubdate": "2019 Dec",
                               "articleids": [{"idtype": "doi", "value": "10.1/22"}]}
                    }
                })
                .to_string(),
            )
            .create();

        let config = PubMedConfig {
            base_url: server.url(),
            tool: "folio-test".into(),
            email: "me@example.org".into(),
            author_query: "Doe J[Author]".into(),
            exclude: vec!["rat".into()],
            ..Default::default()
        };
        let pubs = PubMed::new(&config).fetch().unwrap();
        search.assert();
        summary.assert();
        assert_eq!(pubs.len(), 2);
        assert_eq!(pubs[0].pmid.as_deref(), Some("11"));
        assert_eq!(pubs[1].url.as_deref(), Some("https://doi.org/10.1/22"));
    }

    #[test]
    fn empty_search_skips_summary() {
        let mut server = mockito::Server::new();
        let search = server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::Any)
            .with_body(r#"{"esearchresult":{"count":"0","idlist":[]}}"#)
            .create();
        let summary = server
            .mock("GET", "/esummary.fcgi")
            .match_query(Matcher::Any)
            .expect(0)
            .create();
        let config = PubMedConfig {
            base_url: server.url(),
            author_query: "Nobody[Author]".into(),
            ..Default::default()
        };
        assert!(PubMed::new(&config).fetch().unwrap().is_empty());
        search.assert();
        summary.assert();
    }

    #[test]
    fn server_errors_surface_as_http_errors() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::Any)
            .with_status(500)
            .create();
        let config = PubMedConfig {
            base_url: server.url(),
            author_query: "Doe J[Author]".into(),
            ..Default::default()
        };
        let err = PubMed::new(&config).fetch().unwrap_err();
        assert!(matches!(err, SourceError::Http(_)));
    }
}
