//! Structured tab locations.
//!
//! A tab path is persisted and exchanged in its string form (`games/42`,
//! `url/https://example.com`, `toast/games/42`) but every consumer inside the
//! crate works on the parsed [`TabPath`] so that dispatch is exhaustive.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const TOAST_PREFIX: &str = "toast/";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TabPath {
    Game(u64),
    User(u64),
    Collection(u64),
    Location(String),
    Search(String),
    /// An empty tab; the suffix is the tab's own id.
    New(String),
    /// Error display wrapping the path that failed to resolve.
    Toast(Box<TabPath>),
    Url(String),
    /// Host-defined page (library, dashboard, ...) identified by its own name.
    Static(String),
}

impl TabPath {
    pub fn parse(raw: &str) -> TabPath {
        let (prefix, rest) = match raw.split_once('/') {
            Some(parts) => parts,
            None => return TabPath::Static(raw.to_string()),
        };

        match prefix {
            "games" => Self::numeric(raw, rest, TabPath::Game),
            "users" => Self::numeric(raw, rest, TabPath::User),
            "collections" => Self::numeric(raw, rest, TabPath::Collection),
            "locations" => TabPath::Location(rest.to_string()),
            "search" => TabPath::Search(rest.to_string()),
            "new" => TabPath::New(rest.to_string()),
            "toast" => TabPath::Toast(Box::new(TabPath::parse(rest))),
            "url" => TabPath::Url(rest.to_string()),
            _ => TabPath::Static(raw.to_string()),
        }
    }

    fn numeric(raw: &str, rest: &str, make: fn(u64) -> TabPath) -> TabPath {
        // `games/42/some-slug` is accepted; only the leading segment is the id
        let id = rest.split('/').next().unwrap_or_default();
        match id.parse::<u64>() {
            Ok(id) => make(id),
            Err(_) => TabPath::Static(raw.to_string()),
        }
    }

    pub fn url(url: impl Into<String>) -> TabPath {
        TabPath::Url(url.into())
    }

    pub fn is_toast(&self) -> bool {
        matches!(self, TabPath::Toast(_))
    }

    /// Wraps this path into an error path. Toasting a toast is a no-op.
    pub fn toast(self) -> TabPath {
        match self {
            TabPath::Toast(_) => self,
            other => TabPath::Toast(Box::new(other)),
        }
    }

    /// The path with every error wrapper removed.
    pub fn untoasted(&self) -> &TabPath {
        match self {
            TabPath::Toast(inner) => inner.untoasted(),
            other => other,
        }
    }

    /// The identifying part after the kind prefix (`42` for `games/42`).
    pub fn id_segment(&self) -> String {
        match self {
            TabPath::Game(id) | TabPath::User(id) | TabPath::Collection(id) => id.to_string(),
            TabPath::Location(s)
            | TabPath::Search(s)
            | TabPath::New(s)
            | TabPath::Url(s)
            | TabPath::Static(s) => s.clone(),
            TabPath::Toast(inner) => inner.to_string(),
        }
    }
}

impl fmt::Display for TabPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabPath::Game(id) => write!(f, "games/{}", id),
            TabPath::User(id) => write!(f, "users/{}", id),
            TabPath::Collection(id) => write!(f, "collections/{}", id),
            TabPath::Location(name) => write!(f, "locations/{}", name),
            TabPath::Search(q) => write!(f, "search/{}", q),
            TabPath::New(id) => write!(f, "new/{}", id),
            TabPath::Toast(inner) => write!(f, "{}{}", TOAST_PREFIX, inner),
            TabPath::Url(url) => write!(f, "url/{}", url),
            TabPath::Static(name) => f.write_str(name),
        }
    }
}

impl From<&str> for TabPath {
    fn from(raw: &str) -> Self {
        TabPath::parse(raw)
    }
}

impl Serialize for TabPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TabPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TabPath::parse(&raw))
    }
}
