use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level engine settings container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub navigation: NavigationSettings,
    pub scroll: ScrollSettings,
    pub view: ViewSettings,
    pub api: ApiSettings,
    /// Named install locations (`locations/<name>` tabs).
    pub install_locations: HashMap<String, String>,
    /// Tab ids hosting canonical content; these tabs are frozen.
    pub static_tabs: Vec<String>,
    pub user_data_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            navigation: NavigationSettings::default(),
            scroll: ScrollSettings::default(),
            view: ViewSettings::default(),
            api: ApiSettings::default(),
            install_locations: HashMap::new(),
            static_tabs: Self::default_static_tabs(),
            user_data_dir: None,
            log_level: "tabhost=info".to_string(),
        }
    }
}

impl EngineSettings {
    pub fn default_static_tabs() -> Vec<String> {
        ["featured", "dashboard", "library", "collections", "downloads", "history", "preferences"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Directory holding application data; `locations/appdata` lives below it.
    pub fn user_data_dir(&self) -> PathBuf {
        self.user_data_dir
            .clone()
            .unwrap_or_else(|| dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("tabhost"))
    }
}

/// Navigation interception and url handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NavigationSettings {
    /// Repeated will-navigate events to the same url within this window are echoes.
    pub will_navigate_grace_ms: u64,
    /// Hosts whose pages the app renders natively instead of in a web view.
    pub native_hosts: Vec<String>,
    /// `{}` is replaced by the url-encoded query.
    pub search_url: String,
    /// Reserved pseudo-origin used by hosted content to call into the host.
    pub internal_origin: String,
    /// `<meta name=...>` carrying the app path of a web page.
    pub path_meta_name: String,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            will_navigate_grace_ms: 3000,
            native_hosts: vec!["itch.io".to_string()],
            search_url: "https://itch.io/search?q={}".to_string(),
            internal_origin: "https://itch-internal".to_string(),
            path_meta_name: "itch:path".to_string(),
        }
    }
}

/// Scroll history and restoration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScrollSettings {
    pub history_capacity: usize,
    pub poll_interval_ms: u64,
    pub restore_initial_delay_ms: u64,
    pub restore_retry_ms: u64,
    pub restore_max_attempts: u32,
    pub restore_tolerance: f64,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            poll_interval_ms: 700,
            restore_initial_delay_ms: 400,
            restore_retry_ms: 250,
            restore_max_attempts: 40,
            restore_tolerance: 20.0,
        }
    }
}

/// Embedded view setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewSettings {
    /// Partition names are `<prefix><account id>`.
    pub partition_prefix: String,
    pub plugins: bool,
    pub preload_script: Option<PathBuf>,
    pub open_devtools_on_ready: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            partition_prefix: "persist:itchio-".to_string(),
            plugins: true,
            preload_script: None,
            open_devtools_on_ready: false,
        }
    }
}

/// Remote entity API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.itch.io".to_string(),
            timeout_secs: 30,
        }
    }
}
