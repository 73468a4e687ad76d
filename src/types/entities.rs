use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
}

impl User {
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub games_count: u32,
    /// Member game ids, filled in by a secondary fetch.
    #[serde(default)]
    pub game_ids: Vec<u64>,
}

/// A directory where games are installed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallLocation {
    pub path: String,
}
