use std::fmt;

use crate::store::{KvStore, THEME_KEY};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Theme {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current theme. Anything other than a stored `"dark"` is light.
pub fn current(store: &dyn KvStore) -> anyhow::Result<Theme> {
    Ok(match store.get(THEME_KEY)?.as_deref().map(str::trim) {
        Some("dark") => Theme::Dark,
        _ => Theme::Light,
    })
}

/// Flip the theme and persist the result.
pub fn toggle(store: &dyn KvStore) -> anyhow::Result<Theme> {
    let next = current(store)?.toggled();
    store.set(THEME_KEY, next.as_str())?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn defaults_to_light() {
        let store = MemoryStore::default();
        assert_eq!(current(&store).unwrap(), Theme::Light);
    }

    #[test]
    fn toggle_flips_and_persists() {
        let store = MemoryStore::default();
        assert_eq!(toggle(&store).unwrap(), Theme::Dark);
        assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("dark"));
        assert_eq!(toggle(&store).unwrap(), Theme::Light);
        assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("light"));
    }

    #[test]
    fn unknown_value_is_treated_as_light() {
        let store = MemoryStore::default();
        store.set(THEME_KEY, "solarized").unwrap();
        assert_eq!(current(&store).unwrap(), Theme::Light);
        assert_eq!(toggle(&store).unwrap(), Theme::Dark);
    }
}
