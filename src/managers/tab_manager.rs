use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;
use uuid::Uuid;

use crate::types::errors::TabError;
use crate::types::navigation::NavigateOptions;
use crate::types::path::TabPath;
use crate::types::session::{Snapshot, SnapshotItem};
use crate::types::tab::Tab;
use crate::types::tab_data::TabDataRecord;

/// Tab-state storage shared between the host, the resolver and the views.
pub type SharedTabs = Arc<Mutex<TabManager>>;

/// What host routing did with a navigation request.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigateOutcome {
    Opened(String),
    Focused(String),
    Retargeted(String),
}

impl NavigateOutcome {
    pub fn tab_id(&self) -> &str {
        match self {
            NavigateOutcome::Opened(id)
            | NavigateOutcome::Focused(id)
            | NavigateOutcome::Retargeted(id) => id,
        }
    }
}

/// Trait defining the tab-state storage interface.
pub trait TabManagerTrait {
    fn open_tab(&mut self, path: TabPath, background: bool) -> String;
    fn close_tab(&mut self, tab_id: &str) -> Result<(), TabError>;
    fn focus_tab(&mut self, tab_id: &str) -> Result<(), TabError>;
    fn navigate(&mut self, path: TabPath, opts: &NavigateOptions, background: bool) -> NavigateOutcome;
    fn get_tab(&self, tab_id: &str) -> Option<&Tab>;
    fn get_all_tabs(&self) -> Vec<&Tab>;
    fn current_tab(&self) -> Option<&Tab>;
    fn current_id(&self) -> Option<&str>;
    fn is_frozen(&self, tab_id: &str) -> bool;
    fn tab_count(&self) -> usize;
    fn begin_resolution(&mut self, tab_id: &str) -> Option<u64>;
    fn is_current_resolution(&self, tab_id: &str, ticket: u64) -> bool;
    fn begin_evolution(&mut self, tab_id: &str) -> Option<u64>;
    fn is_current_evolution(&self, tab_id: &str, ticket: u64) -> bool;
    fn apply_fetched(&mut self, tab_id: &str, data: TabDataRecord, ticket: Option<u64>) -> Result<bool, TabError>;
    fn apply_evolved(&mut self, tab_id: &str, data: TabDataRecord) -> Result<(), TabError>;
    fn snapshot(&self) -> Snapshot;
    fn restore(&mut self, snapshot: &Snapshot);
}

/// In-memory tab store.
///
/// Static tabs are created up front, are frozen to their own id as path and
/// are never persisted. Transient tabs are user-opened and keep their order.
pub struct TabManager {
    tabs: Vec<Tab>,
    transient: Vec<String>,
    current_id: Option<String>,
    /// Latest resolution ticket issued per tab.
    resolutions: HashMap<String, u64>,
    /// Latest path-change ticket issued per tab. Data fetches never bump it.
    evolutions: HashMap<String, u64>,
}

impl TabManager {
    pub fn new(static_tabs: &[String]) -> Self {
        let tabs = static_tabs
            .iter()
            .map(|id| Tab {
                id: id.clone(),
                path: TabPath::Static(id.clone()),
                frozen: true,
                data: TabDataRecord::default(),
            })
            .collect::<Vec<_>>();
        let current_id = tabs.first().map(|t| t.id.clone());

        Self {
            tabs,
            transient: Vec::new(),
            current_id,
            resolutions: HashMap::new(),
            evolutions: HashMap::new(),
        }
    }

    pub fn shared(static_tabs: &[String]) -> SharedTabs {
        Arc::new(Mutex::new(Self::new(static_tabs)))
    }

    fn find_tab_index(&self, tab_id: &str) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == tab_id)
    }

    fn find_transient(&self, path: &TabPath) -> Option<&str> {
        self.transient
            .iter()
            .find(|id| self.get_tab(id).is_some_and(|t| &t.path == path))
            .map(|id| id.as_str())
    }

    fn invalidate_resolutions(&mut self, tab_id: &str) {
        *self.resolutions.entry(tab_id.to_string()).or_insert(0) += 1;
    }

    fn invalidate_evolutions(&mut self, tab_id: &str) {
        *self.evolutions.entry(tab_id.to_string()).or_insert(0) += 1;
    }

    fn insert_transient(&mut self, id: String, path: TabPath) {
        self.tabs.push(Tab {
            id: id.clone(),
            path,
            frozen: false,
            data: TabDataRecord::default(),
        });
        self.transient.push(id);
    }
}

impl TabManagerTrait for TabManager {
    /// Opens a transient tab on `path` and returns its id.
    fn open_tab(&mut self, path: TabPath, background: bool) -> String {
        let id = Uuid::new_v4().to_string();
        self.insert_transient(id.clone(), path);
        if !background || self.current_id.is_none() {
            self.current_id = Some(id.clone());
        }
        id
    }

    /// Closes a transient tab; focus moves to the nearest neighbour.
    fn close_tab(&mut self, tab_id: &str) -> Result<(), TabError> {
        let order_idx = self
            .transient
            .iter()
            .position(|id| id == tab_id)
            .ok_or_else(|| TabError::NotFound(tab_id.to_string()))?;

        self.transient.remove(order_idx);
        self.tabs.retain(|t| t.id != tab_id);
        self.resolutions.remove(tab_id);
        self.evolutions.remove(tab_id);

        if self.current_id.as_deref() == Some(tab_id) {
            let neighbour = self
                .transient
                .get(order_idx)
                .or_else(|| self.transient.last())
                .cloned()
                .or_else(|| self.tabs.first().map(|t| t.id.clone()));
            self.current_id = neighbour;
        }
        Ok(())
    }

    fn focus_tab(&mut self, tab_id: &str) -> Result<(), TabError> {
        if self.find_tab_index(tab_id).is_none() {
            return Err(TabError::NotFound(tab_id.to_string()));
        }
        self.current_id = Some(tab_id.to_string());
        Ok(())
    }

    /// Host-level routing: retarget the source tab, focus a tab already
    /// showing `path`, or open a new one.
    fn navigate(&mut self, path: TabPath, opts: &NavigateOptions, background: bool) -> NavigateOutcome {
        if opts.in_place {
            if let Some(source) = opts.source_tab.as_deref() {
                if let Some(idx) = self.find_tab_index(source) {
                    if !self.tabs[idx].frozen {
                        if self.tabs[idx].path == path {
                            let id = source.to_string();
                            if !background {
                                self.current_id = Some(id.clone());
                            }
                            return NavigateOutcome::Focused(id);
                        }
                        let tab = &mut self.tabs[idx];
                        tab.path = path.clone();
                        tab.data = TabDataRecord::default().with_path(path);
                        let id = tab.id.clone();
                        self.invalidate_resolutions(&id);
                        self.invalidate_evolutions(&id);
                        debug!(tab_id = %id, "tab retargeted in place");
                        return NavigateOutcome::Retargeted(id);
                    }
                }
            }
        }

        if let TabPath::Static(name) = &path {
            if self.find_tab_index(name).is_some() {
                let id = name.clone();
                if !background {
                    self.current_id = Some(id.clone());
                }
                return NavigateOutcome::Focused(id);
            }
        }

        if let Some(existing) = self.find_transient(&path).map(str::to_string) {
            if !background {
                self.current_id = Some(existing.clone());
            }
            return NavigateOutcome::Focused(existing);
        }

        let id = self.open_tab(path, background);
        debug!(tab_id = %id, background, "tab opened");
        NavigateOutcome::Opened(id)
    }

    fn get_tab(&self, tab_id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == tab_id)
    }

    /// Static tabs first, then transient tabs in strip order.
    fn get_all_tabs(&self) -> Vec<&Tab> {
        let statics = self.tabs.iter().filter(|t| t.frozen);
        let transients = self.transient.iter().filter_map(|id| self.get_tab(id));
        statics.chain(transients).collect()
    }

    fn current_tab(&self) -> Option<&Tab> {
        self.current_id.as_deref().and_then(|id| self.get_tab(id))
    }

    fn current_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    fn is_frozen(&self, tab_id: &str) -> bool {
        tab_id.is_empty() || self.get_tab(tab_id).is_some_and(|t| t.frozen)
    }

    fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    /// Issues a new resolution ticket; only the latest ticket may write.
    fn begin_resolution(&mut self, tab_id: &str) -> Option<u64> {
        self.find_tab_index(tab_id)?;
        let ticket = self.resolutions.entry(tab_id.to_string()).or_insert(0);
        *ticket += 1;
        Some(*ticket)
    }

    fn is_current_resolution(&self, tab_id: &str, ticket: u64) -> bool {
        self.resolutions.get(tab_id) == Some(&ticket)
    }

    /// Issues a path-change ticket. Only a later path change (evolve or
    /// in-place retarget) supersedes it; data fetches for the old path do not.
    fn begin_evolution(&mut self, tab_id: &str) -> Option<u64> {
        self.find_tab_index(tab_id)?;
        let ticket = self.evolutions.entry(tab_id.to_string()).or_insert(0);
        *ticket += 1;
        Some(*ticket)
    }

    fn is_current_evolution(&self, tab_id: &str, ticket: u64) -> bool {
        self.evolutions.get(tab_id) == Some(&ticket)
    }

    /// Merges resolved data. Returns `Ok(false)` when `ticket` has been
    /// superseded by a later resolution and the data was dropped.
    fn apply_fetched(&mut self, tab_id: &str, data: TabDataRecord, ticket: Option<u64>) -> Result<bool, TabError> {
        let idx = self
            .find_tab_index(tab_id)
            .ok_or_else(|| TabError::NotFound(tab_id.to_string()))?;

        if let Some(ticket) = ticket {
            if !self.is_current_resolution(tab_id, ticket) {
                debug!(tab_id = %tab_id, ticket, "stale tab data dropped");
                return Ok(false);
            }
        }

        self.tabs[idx].data.merge(data);
        Ok(true)
    }

    /// Moves a tab to the path carried by `data` (if any) and stores `data`.
    ///
    /// A frozen tab may only move between its canonical path and toasted
    /// forms of it.
    fn apply_evolved(&mut self, tab_id: &str, data: TabDataRecord) -> Result<(), TabError> {
        let idx = self
            .find_tab_index(tab_id)
            .ok_or_else(|| TabError::NotFound(tab_id.to_string()))?;

        let new_path = match data.path.clone() {
            Some(path) if path != self.tabs[idx].path => path,
            _ => {
                self.tabs[idx].data.merge(data);
                return Ok(());
            }
        };

        let tab = &self.tabs[idx];
        if tab.frozen && new_path.untoasted() != tab.path.untoasted() {
            return Err(TabError::Frozen(tab_id.to_string()));
        }

        let tab = &mut self.tabs[idx];
        tab.path = new_path;
        tab.data = data;
        self.invalidate_resolutions(tab_id);
        Ok(())
    }

    /// Transient tabs with their toast prefix stripped, ready to persist.
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            current: self.current_id.clone(),
            items: self
                .transient
                .iter()
                .filter_map(|id| self.get_tab(id))
                .map(|t| SnapshotItem {
                    id: t.id.clone(),
                    path: t.path.untoasted().to_string(),
                })
                .collect(),
        }
    }

    /// Re-opens snapshot tabs that are not already open.
    fn restore(&mut self, snapshot: &Snapshot) {
        for item in &snapshot.items {
            if self.find_tab_index(&item.id).is_some() {
                continue;
            }
            self.insert_transient(item.id.clone(), TabPath::parse(&item.path));
        }

        if let Some(current) = &snapshot.current {
            if self.find_tab_index(current).is_some() {
                self.current_id = Some(current.clone());
            }
        }
    }
}
