use serde::{Deserialize, Serialize};

use super::path::TabPath;
use super::tab_data::{TabDataRecord, TabPayload};

/// A tab in the host's tab strip.
///
/// Frozen tabs host canonical content (library, dashboard, ...) and may not
/// navigate away from `path`; navigation attempts are re-routed instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tab {
    pub id: String,
    pub path: TabPath,
    pub frozen: bool,
    pub data: TabDataRecord,
}

impl Tab {
    /// The url the tab's view should display, if its path maps to one.
    pub fn url(&self) -> Option<&str> {
        match (self.path.untoasted(), &self.data.payload) {
            (TabPath::Url(url), _) => Some(url.as_str()),
            (TabPath::Game(_), Some(TabPayload::Game { game })) => game.url.as_deref(),
            _ => None,
        }
    }
}
