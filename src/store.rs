use std::{
    cell::RefCell,
    collections::HashMap,
    fs, io,
    path::PathBuf,
};

use anyhow::Context;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

/// Storage key for the theme preference.
pub const THEME_KEY: &str = "theme";
/// Storage key for the publication review ledger.
pub const REVIEW_KEY: &str = "pubReview";
/// Storage key for locally authored blog posts.
pub const BLOG_POSTS_KEY: &str = "blogPosts";
/// Storage key for the latched admin session flag.
pub const BLOG_ADMIN_KEY: &str = "blogAdmin";

/// Flat string key-value storage. Every namespace is an independent value; nothing here
/// knows about the shape of what is stored.
pub trait KvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Keeps one file per key inside a state directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create state directory {}", dir.display()))?;
        Ok(FileStore { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are fixed constants, but keep anything path-like out of the file name anyway.
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        debug!(key, path = %path.display(), "stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
        }
    }
}

/// In-memory store, handy for embedding and tests.
#[derive(Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

/// Read a JSON namespace. A missing or corrupt value yields the namespace default; corruption
/// only affects the namespace it occurs in.
pub fn load_json<T>(store: &dyn KvStore, key: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = store.get(key)? else {
        return Ok(T::default());
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Ok(v),
        Err(e) => {
            warn!(key, error = %e, "discarding corrupt stored value");
            Ok(T::default())
        }
    }
}

pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(value).context("failed to serialise stored value")?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trips_and_removes() {
        let dir = TempDir::new().expect("tmp dir");
        let store = FileStore::open(dir.path().join("state")).expect("open");
        assert_eq!(store.get(THEME_KEY).unwrap(), None);
        store.set(THEME_KEY, "dark").unwrap();
        assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("dark"));
        store.remove(THEME_KEY).unwrap();
        assert_eq!(store.get(THEME_KEY).unwrap(), None);
        // Removing twice is fine.
        store.remove(THEME_KEY).unwrap();
    }

    #[test]
    fn file_store_sanitises_key_into_file_name() {
        let dir = TempDir::new().expect("tmp dir");
        let store = FileStore::open(dir.path()).expect("open");
        store.set("../escape", "x").unwrap();
        assert!(dir.path().join("___escape.json").exists());
    }

    #[test]
    fn corrupt_namespace_resets_without_touching_others() {
        let store = MemoryStore::default();
        store.set(REVIEW_KEY, "{not json").unwrap();
        save_json(&store, BLOG_POSTS_KEY, &vec!["a".to_string()]).unwrap();

        let ledger: BTreeMap<String, String> = load_json(&store, REVIEW_KEY).unwrap();
        assert!(ledger.is_empty());
        let posts: Vec<String> = load_json(&store, BLOG_POSTS_KEY).unwrap();
        assert_eq!(posts, vec!["a".to_string()]);
    }

    #[test]
    fn wrong_shape_counts_as_corrupt() {
        let store = MemoryStore::default();
        store.set(BLOG_POSTS_KEY, r#"{"an":"object"}"#).unwrap();
        let posts: Vec<String> = load_json(&store, BLOG_POSTS_KEY).unwrap();
        assert!(posts.is_empty());
    }
}
