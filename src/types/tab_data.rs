use serde::{Deserialize, Serialize};

use super::entities::{Collection, Game, InstallLocation, User};
use super::path::TabPath;

/// What a tab shows as its label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TabLabel {
    /// Literal text (page title, game title, search query).
    Text(String),
    /// Localization key resolved by the chrome (e.g. `sidebar.empty`).
    Key(String),
}

/// Path-specific data attached to a tab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TabPayload {
    Game { game: Game },
    User { user: User },
    Collection { collection: Collection, games: Vec<Game> },
    Location { name: String, location: InstallLocation },
    Search { query: String },
}

/// Error details carried by a toasted tab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToastExtras {
    pub error: String,
    pub stack: String,
}

/// Resolved display metadata for a tab's current path.
///
/// Every field is optional so that partial updates (a title change, a
/// favicon change) can be merged over previously resolved data.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TabDataRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<TabPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<TabLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<TabPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toast: Option<ToastExtras>,
}

impl TabDataRecord {
    pub fn labeled(label: TabLabel) -> Self {
        Self {
            label: Some(label),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: TabPath) -> Self {
        self.path = Some(path);
        self
    }

    /// Overlays every field set in `newer` onto `self`.
    pub fn merge(&mut self, newer: TabDataRecord) {
        if newer.path.is_some() {
            self.path = newer.path;
        }
        if newer.label.is_some() {
            self.label = newer.label;
        }
        if newer.icon_image.is_some() {
            self.icon_image = newer.icon_image;
        }
        if newer.web_title.is_some() {
            self.web_title = newer.web_title;
        }
        if newer.web_favicon.is_some() {
            self.web_favicon = newer.web_favicon;
        }
        if newer.payload.is_some() {
            self.payload = newer.payload;
        }
        if newer.toast.is_some() {
            self.toast = newer.toast;
        }
    }

    pub fn from_game(game: Game) -> Self {
        Self {
            label: Some(TabLabel::Text(game.title.clone())),
            icon_image: game.cover_url.clone(),
            payload: Some(TabPayload::Game { game }),
            ..Self::default()
        }
    }

    pub fn from_user(user: User) -> Self {
        Self {
            label: Some(TabLabel::Text(user.label().to_string())),
            icon_image: user.cover_url.clone(),
            payload: Some(TabPayload::User { user }),
            ..Self::default()
        }
    }

    pub fn from_collection(collection: Collection, games: Vec<Game>) -> Self {
        Self {
            label: Some(TabLabel::Text(collection.title.clone())),
            payload: Some(TabPayload::Collection { collection, games }),
            ..Self::default()
        }
    }

    pub fn from_location(name: &str, location: InstallLocation) -> Self {
        Self {
            label: Some(TabLabel::Text(location.path.clone())),
            payload: Some(TabPayload::Location {
                name: name.to_string(),
                location,
            }),
            ..Self::default()
        }
    }
}
