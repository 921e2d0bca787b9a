use std::collections::{HashMap, HashSet};

use crate::{identity, publication::Publication};

/// Combine remote and local publications.
///
/// Remote records form the base, in their own order. A local record whose identity key is
/// already present overlays its fields onto that record; otherwise it is appended. Only the
/// first remote record per key is used as a base.
pub fn merge(remote: &[Publication], local: &[Publication]) -> Vec<Publication> {
    let mut out: Vec<Publication> = Vec::with_capacity(remote.len() + local.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for p in remote {
        let key = identity::key(p);
        if !index.contains_key(&key) {
            index.insert(key, out.len());
            out.push(p.clone());
        }
    }

    for p in local {
        let key = identity::key(p);
        match index.get(&key) {
            Some(&i) => out[i].overlay(p),
            None => {
                index.insert(key, out.len());
                out.push(p.clone());
            }
        }
    }

    out
}

/// Keep only the first publication per identity key, recomputing keys from current contents.
pub fn dedupe(publications: Vec<Publication>) -> Vec<Publication> {
    let mut seen = HashSet::new();
    publications
        .into_iter()
        .filter(|p| seen.insert(identity::key(p)))
        .collect()
}
