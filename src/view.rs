use std::cmp::Ordering;

use clap::ValueEnum;

use crate::{
    identity,
    publication::Publication,
    review::{ReviewLedger, ReviewState, Tally},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SortMode {
    /// Newest first, then title
    #[default]
    YearDesc,
    /// Oldest first, then title
    YearAsc,
    /// Title only
    TitleAsc,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ReviewFilter {
    /// Everything except rejected
    #[default]
    All,
    Accepted,
    Rejected,
    Unreviewed,
}

impl ReviewFilter {
    pub fn admits(self, state: ReviewState) -> bool {
        match self {
            // Rejected items are noise unless asked for explicitly.
            ReviewFilter::All => state != ReviewState::Rejected,
            ReviewFilter::Accepted => state == ReviewState::Accepted,
            ReviewFilter::Rejected => state == ReviewState::Rejected,
            ReviewFilter::Unreviewed => state == ReviewState::Unreviewed,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ViewQuery {
    pub search: String,
    pub year: Option<i32>,
    pub sort: SortMode,
    pub filter: ReviewFilter,
}

#[derive(Debug)]
pub struct ViewItem<'a> {
    pub publication: &'a Publication,
    pub key: String,
    pub state: ReviewState,
}

#[derive(Debug)]
pub struct View<'a> {
    pub items: Vec<ViewItem<'a>>,
    /// Totals over the searched set, before the review filter.
    pub tally: Tally,
}

/// Search, sort and review-filter `publications` into what should be shown.
pub fn project<'a>(
    publications: &'a [Publication],
    ledger: &ReviewLedger<'_>,
    query: &ViewQuery,
) -> View<'a> {
    let needle = query.search.trim().to_lowercase();

    let mut items: Vec<ViewItem<'a>> = publications
        .iter()
        .filter(|p| needle.is_empty() || haystack(p).contains(&needle))
        .filter(|p| query.year.is_none_or(|y| p.year == Some(y)))
        .map(|p| {
            let key = identity::key(p);
            let state = ledger.get_key(&key);
            ViewItem {
                publication: p,
                key,
                state,
            }
        })
        .collect();

    items.sort_by(|a, b| compare(query.sort, a.publication, b.publication));

    let tally = ledger.tally(items.iter().map(|item| item.publication));

    items.retain(|item| query.filter.admits(item.state));
    View { items, tally }
}

fn haystack(p: &Publication) -> String {
    let year = p.year.map(|y| y.to_string());
    [
        p.title.as_deref(),
        p.journal.as_deref(),
        p.citation.as_deref(),
        p.authors.as_deref(),
        year.as_deref(),
        p.doi.as_deref(),
        p.pmid.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

fn compare(mode: SortMode, a: &Publication, b: &Publication) -> Ordering {
    let year = |p: &Publication| p.year.unwrap_or(0);
    let title = || {
        a.title
            .as_deref()
            .unwrap_or("")
            .cmp(b.title.as_deref().unwrap_or(""))
    };
    match mode {
        SortMode::YearDesc => year(b).cmp(&year(a)).then_with(title),
        SortMode::YearAsc => year(a).cmp(&year(b)).then_with(title),
        SortMode::TitleAsc => title(),
    }
}
