use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::source::DataSource;

/// Load a JSON array of `T` from a static file.
///
/// A missing or unreadable source, or content that is not a JSON array, degrades to an empty
/// list. Array items that do not fit `T` are skipped one by one.
pub fn load_array<T: DeserializeOwned>(source: &DataSource, timeout: Duration) -> Vec<T> {
    let raw = match source.read_to_string(timeout) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(%source, error = %e, "could not read local data, using an empty list");
            return Vec::new();
        }
    };

    let items: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            warn!(%source, error = %e, "local data is not a JSON array, using an empty list");
            return Vec::new();
        }
    };

    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| match serde_json::from_value(v) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(%source, index = i, error = %e, "skipping malformed entry");
                None
            }
        })
        .collect();
    debug!(%source, total, kept = parsed.len(), "loaded local data");
    parsed
}
