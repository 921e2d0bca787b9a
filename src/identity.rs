use once_cell::sync::Lazy;
use regex::Regex;

use crate::publication::{Publication, non_blank};

/// Longest title prefix, in characters, that takes part in a title key.
pub const TITLE_KEY_LEN: usize = 160;

type KeyFn = fn(&Publication) -> Option<String>;

/// Key derivations to try, in order.
///
/// NOTE: Ordering is important here, as it signifies priority. The first derivation that yields
/// a key wins, so a DOI always beats a PMID, which always beats the title.
static KEYERS: &[KeyFn] = &[doi_key, pmid_key, title_key];

/// Stable identity of a publication across sources: `doi:`, `pmid:` or `t:` prefixed.
///
/// Title keys are lossy; two works sharing the same truncated, lowercased title collide.
pub fn key(publication: &Publication) -> String {
    KEYERS
        .iter()
        .find_map(|f| f(publication))
        // `title_key` always answers, but keep the fallback total.
        .unwrap_or_else(|| "t:".to_string())
}

/// Lowercased DOI without a resolver prefix, or `None` when nothing is left.
pub fn normalize_doi(doi: &str) -> Option<String> {
    static RESOLVER_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^https?://(?:dx\.)?doi\.org/").unwrap());

    let lower = doi.trim().to_lowercase();
    let bare = RESOLVER_RE.replace(&lower, "");
    let bare = bare.trim();
    (!bare.is_empty()).then(|| bare.to_string())
}

/// Lowercase, collapse whitespace runs, trim.
pub fn fold_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn doi_key(p: &Publication) -> Option<String> {
    non_blank(&p.doi)
        .and_then(normalize_doi)
        .map(|d| format!("doi:{d}"))
}

fn pmid_key(p: &Publication) -> Option<String> {
    non_blank(&p.pmid).map(|id| format!("pmid:{id}"))
}

fn title_key(p: &Publication) -> Option<String> {
    let text = non_blank(&p.title)
        .or_else(|| non_blank(&p.citation))
        .unwrap_or("");
    let folded: String = fold_text(text).chars().take(TITLE_KEY_LEN).collect();
    Some(format!("t:{folded}"))
}
