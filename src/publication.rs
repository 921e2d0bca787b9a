use serde::{Deserialize, Deserializer, Serialize, de::IgnoredAny};

/// A publication as shown on the site, whichever source it came from. Every field is optional;
/// identity is derived (see `identity::key`), never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub authors: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub journal: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_year",
        skip_serializing_if = "Option::is_none"
    )]
    pub year: Option<i32>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub doi: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub pmid: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub citation: Option<String>,
}

impl Publication {
    /// Title for display: the title, else the citation, else "Untitled".
    pub fn display_title(&self) -> &str {
        non_blank(&self.title)
            .or_else(|| non_blank(&self.citation))
            .unwrap_or("Untitled")
    }

    /// Overlay every field `other` carries onto `self`.
    pub fn overlay(&mut self, other: &Publication) {
        fn take<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if let Some(v) = src {
                *dst = Some(v.clone());
            }
        }
        take(&mut self.title, &other.title);
        take(&mut self.authors, &other.authors);
        take(&mut self.journal, &other.journal);
        take(&mut self.year, &other.year);
        take(&mut self.doi, &other.doi);
        take(&mut self.pmid, &other.pmid);
        take(&mut self.url, &other.url);
        take(&mut self.citation, &other.citation);
    }
}

/// `Some(trimmed)` when the field holds something other than whitespace.
pub fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(i64),
    Float(f64),
    Str(String),
    Other(IgnoredAny),
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn lenient_year<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
    Ok(match Option::<NumOrStr>::deserialize(d)? {
        Some(NumOrStr::Num(n)) => i32::try_from(n).ok(),
        Some(NumOrStr::Float(f)) => integral(f).and_then(|n| i32::try_from(n).ok()),
        Some(NumOrStr::Str(s)) => s.trim().parse().ok(),
        Some(NumOrStr::Other(_)) | None => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<NumOrStr>::deserialize(d)? {
        Some(NumOrStr::Num(n)) => Some(n.to_string()),
        Some(NumOrStr::Float(f)) => integral(f).map(|n| n.to_string()),
        Some(NumOrStr::Str(s)) => Some(s),
        Some(NumOrStr::Other(_)) | None => None,
    })
}
