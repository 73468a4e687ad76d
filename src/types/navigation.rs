use serde::{Deserialize, Serialize};

/// Per-view navigation record exposed to the chrome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NavigationState {
    pub can_go_back: bool,
    pub can_go_forward: bool,
    /// True until the first non-blank `did-stop-loading`.
    pub first_load: bool,
    pub loading: bool,
    pub url: String,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            can_go_back: false,
            can_go_forward: false,
            first_load: true,
            loading: true,
            url: String::new(),
        }
    }
}

/// Options accompanying a host-level navigation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigateOptions {
    /// Tab that originated the request.
    pub source_tab: Option<String>,
    /// Retarget `source_tab` instead of opening or focusing another tab.
    pub in_place: bool,
}
