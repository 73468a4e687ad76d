use serde::{Deserialize, Serialize};

/// Last known vertical scroll offset of a page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrollEntry {
    pub url: String,
    pub scroll_top: f64,
}
