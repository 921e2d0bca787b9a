use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    identity,
    publication::Publication,
    store::{self, KvStore, REVIEW_KEY},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    Accepted,
    Rejected,
    #[default]
    Unreviewed,
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReviewState::Accepted => "accepted",
            ReviewState::Rejected => "rejected",
            ReviewState::Unreviewed => "unreviewed",
        })
    }
}

/// Per-state totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub accepted: usize,
    pub rejected: usize,
    pub unreviewed: usize,
}

impl Tally {
    pub fn add(&mut self, state: ReviewState) {
        match state {
            ReviewState::Accepted => self.accepted += 1,
            ReviewState::Rejected => self.rejected += 1,
            ReviewState::Unreviewed => self.unreviewed += 1,
        }
    }
}

/// Review decisions keyed by publication identity, persisted on every change.
///
/// Keys of publications that no longer exist are kept; they are simply never looked up.
pub struct ReviewLedger<'s> {
    store: &'s dyn KvStore,
    decisions: BTreeMap<String, ReviewState>,
}

impl<'s> ReviewLedger<'s> {
    /// Load the ledger. A corrupt stored ledger starts out empty.
    pub fn load(store: &'s dyn KvStore) -> anyhow::Result<Self> {
        let mut decisions: BTreeMap<String, ReviewState> = store::load_json(store, REVIEW_KEY)?;
        decisions.retain(|_, s| *s != ReviewState::Unreviewed);
        Ok(ReviewLedger { store, decisions })
    }

    pub fn get(&self, publication: &Publication) -> ReviewState {
        self.get_key(&identity::key(publication))
    }

    pub fn get_key(&self, key: &str) -> ReviewState {
        self.decisions.get(key).copied().unwrap_or_default()
    }

    pub fn set(&mut self, publication: &Publication, state: ReviewState) -> anyhow::Result<()> {
        self.set_key(&identity::key(publication), state)
    }

    /// Record `state` for `key`. `Unreviewed` removes the entry.
    pub fn set_key(&mut self, key: &str, state: ReviewState) -> anyhow::Result<()> {
        match state {
            ReviewState::Unreviewed => {
                self.decisions.remove(key);
            }
            s => {
                self.decisions.insert(key.to_string(), s);
            }
        }
        debug!(key, %state, "review decision");
        self.persist()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.decisions.contains_key(key)
    }

    /// Forget every decision.
    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.decisions.clear();
        self.store.remove(REVIEW_KEY)
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn tally<'p>(&self, publications: impl IntoIterator<Item = &'p Publication>) -> Tally {
        let mut tally = Tally::default();
        for p in publications {
            tally.add(self.get(p));
        }
        tally
    }

    fn persist(&self) -> anyhow::Result<()> {
        store::save_json(self.store, REVIEW_KEY, &self.decisions)
    }
}
