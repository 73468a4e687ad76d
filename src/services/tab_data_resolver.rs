//! Resolves display metadata (label, icon, typed payload) for a tab path.
//!
//! Resolution failures never reach the view layer: network failures are
//! skipped and left for the next trigger (tab focus, window focus), every
//! other failure turns the tab into a toast tab that keeps the original path
//! so a retry can re-derive it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use url::Url;

use crate::managers::tab_manager::{SharedTabs, TabManager, TabManagerTrait};
use crate::services::entity_fetcher::EntitySource;
use crate::types::entities::InstallLocation;
use crate::types::errors::ResolveError;
use crate::types::path::TabPath;
use crate::types::settings::EngineSettings;
use crate::types::tab_data::{TabDataRecord, TabLabel, TabPayload, ToastExtras};

pub const LABEL_EMPTY: &str = "sidebar.empty";
pub const LABEL_AW_SNAP: &str = "sidebar.aw_snap";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOptions {
    /// Resolve this path instead of the tab's current one.
    pub path: Option<TabPath>,
    /// Bypass cached entities.
    pub fresh: bool,
}

impl ResolveOptions {
    pub fn fresh() -> Self {
        Self {
            path: None,
            fresh: true,
        }
    }

    pub fn for_path(path: TabPath) -> Self {
        Self {
            path: Some(path),
            fresh: false,
        }
    }
}

/// What [`TabDataResolver::fetch_tab_data`] did with a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A later resolution for the same tab was issued meanwhile.
    Stale,
    /// Nothing to show (closed tab, deleted entity, refused path).
    Absent,
    /// Network failure, left for a later retry.
    Deferred,
    Toasted,
    /// Failure on a tab that is already showing an error.
    AlreadyToasted,
}

pub struct TabDataResolver {
    tabs: SharedTabs,
    source: Arc<dyn EntitySource>,
    install_locations: HashMap<String, String>,
    user_data_dir: PathBuf,
}

impl TabDataResolver {
    pub fn new(tabs: SharedTabs, source: Arc<dyn EntitySource>, settings: &EngineSettings) -> Self {
        Self {
            tabs,
            source,
            install_locations: settings.install_locations.clone(),
            user_data_dir: settings.user_data_dir(),
        }
    }

    fn tabs(&self) -> MutexGuard<'_, TabManager> {
        self.tabs.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Resolves data for `tab_id`. `Ok(None)` is a valid answer: the tab is
    /// gone, the entity does not exist, or the path was refused; callers
    /// must leave existing data untouched.
    pub async fn resolve(&self, tab_id: &str, opts: &ResolveOptions) -> Result<Option<TabDataRecord>, ResolveError> {
        if tab_id.is_empty() {
            return Ok(None);
        }

        let (current_path, frozen, existing) = {
            let tabs = self.tabs();
            match tabs.get_tab(tab_id) {
                Some(tab) => (tab.path.clone(), tab.frozen, tab.data.clone()),
                // closed since
                None => return Ok(None),
            }
        };

        let path = opts.path.clone().unwrap_or(current_path);
        if frozen && path != TabPath::Static(tab_id.to_string()) {
            info!(tab_id = %tab_id, path = %path, "refusing to resolve foreign path for frozen tab");
            return Ok(None);
        }

        let fresh = opts.fresh;
        let data = match path {
            TabPath::Game(id) => match self.source.game(id, fresh).await? {
                Some(game) if game.id != id => {
                    return Err(ResolveError::InvalidData(format!("asked for game {}, got {}", id, game.id)))
                }
                game => game.map(TabDataRecord::from_game),
            },
            TabPath::User(id) => self.source.user(id, fresh).await?.map(TabDataRecord::from_user),
            TabPath::Collection(id) => self.resolve_collection(id, fresh, &existing).await?,
            TabPath::Location(name) => self.location(&name).map(|loc| TabDataRecord::from_location(&name, loc)),
            TabPath::Search(query) => Some(TabDataRecord {
                label: Some(TabLabel::Text(query.clone())),
                payload: Some(TabPayload::Search { query }),
                ..TabDataRecord::default()
            }),
            TabPath::New(_) => Some(TabDataRecord::labeled(TabLabel::Key(LABEL_EMPTY.to_string()))),
            TabPath::Toast(_) => Some(TabDataRecord::labeled(TabLabel::Key(LABEL_AW_SNAP.to_string()))),
            TabPath::Url(url) => Some(url_tab_data(&url, &existing)),
            TabPath::Static(name) if frozen => {
                Some(TabDataRecord::labeled(TabLabel::Key(format!("sidebar.{}", name))))
            }
            TabPath::Static(_) => None,
        };
        Ok(data)
    }

    async fn resolve_collection(
        &self,
        id: u64,
        fresh: bool,
        existing: &TabDataRecord,
    ) -> Result<Option<TabDataRecord>, ResolveError> {
        let Some(mut collection) = self.source.collection(id, fresh).await? else {
            return Ok(None);
        };
        debug!(collection_id = id, "fetched collection");

        // keep what we knew about the members until the secondary fetch lands
        if let Some(TabPayload::Collection { collection: old, .. }) = &existing.payload {
            if old.id == id && collection.game_ids.is_empty() {
                collection.game_ids = old.game_ids.clone();
            }
        }

        let games = self.source.collection_games(id).await?;
        if !games.is_empty() {
            collection.game_ids = games.iter().map(|g| g.id).collect();
        }
        Ok(Some(TabDataRecord::from_collection(collection, games)))
    }

    fn location(&self, name: &str) -> Option<InstallLocation> {
        if let Some(path) = self.install_locations.get(name) {
            return Some(InstallLocation { path: path.clone() });
        }
        if name == "appdata" {
            let path = self.user_data_dir.join("apps");
            return Some(InstallLocation {
                path: path.to_string_lossy().into_owned(),
            });
        }
        None
    }

    /// Resolves and stores data for a tab, converting failures into either
    /// silence (network) or a toast transition.
    pub async fn fetch_tab_data(&self, tab_id: &str, opts: ResolveOptions) -> FetchOutcome {
        let Some(ticket) = self.tabs().begin_resolution(tab_id) else {
            return FetchOutcome::Absent;
        };

        match self.resolve(tab_id, &opts).await {
            Ok(Some(data)) => match self.tabs().apply_fetched(tab_id, data, Some(ticket)) {
                Ok(true) => {
                    debug!(tab_id = %tab_id, timestamp = now_millis(), "tab data fetched");
                    FetchOutcome::Applied
                }
                Ok(false) => FetchOutcome::Stale,
                Err(_) => FetchOutcome::Absent,
            },
            Ok(None) => FetchOutcome::Absent,
            Err(e) if e.is_network() => {
                info!(tab_id = %tab_id, error = %e, "skipping tab data fetching because of network");
                FetchOutcome::Deferred
            }
            Err(e) => {
                warn!(tab_id = %tab_id, error = %e.chain(), "tab data fetching error");
                self.toast(tab_id, &e, opts.path.as_ref())
            }
        }
    }

    /// Moves a tab to the error path derived from `path` (or its current
    /// path). A tab already showing an error is left alone.
    pub fn toast(&self, tab_id: &str, error: &ResolveError, path: Option<&TabPath>) -> FetchOutcome {
        let mut tabs = self.tabs();
        let Some(tab) = tabs.get_tab(tab_id) else {
            warn!(tab_id = %tab_id, "can't retrieve path for toasted tab, not found");
            return FetchOutcome::Absent;
        };

        let old_path = path.cloned().unwrap_or_else(|| tab.path.clone());
        if old_path.is_toast() || tab.path.is_toast() {
            return FetchOutcome::AlreadyToasted;
        }

        let data = TabDataRecord {
            path: Some(old_path.toast()),
            label: Some(TabLabel::Key(LABEL_AW_SNAP.to_string())),
            toast: Some(ToastExtras {
                error: error.to_string(),
                stack: error.chain(),
            }),
            ..TabDataRecord::default()
        };
        match tabs.apply_evolved(tab_id, data) {
            Ok(()) => FetchOutcome::Toasted,
            Err(e) => {
                warn!(tab_id = %tab_id, error = %e, "could not toast tab");
                FetchOutcome::Absent
            }
        }
    }
}

/// Web tabs are labelled by the last page title seen, else their hostname.
fn url_tab_data(url: &str, existing: &TabDataRecord) -> TabDataRecord {
    let label = existing
        .web_title
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)))
        .unwrap_or_else(|| url.to_string());
    TabDataRecord {
        label: Some(TabLabel::Text(label)),
        icon_image: existing.web_favicon.clone(),
        ..TabDataRecord::default()
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
