//! Host-level reactions that keep tab data and the persisted tab set in sync
//! with what the user does: switching tabs, reloading, refocusing the
//! window, evolving a tab to a new path, signing in and out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard};

use tracing::{debug, info, warn};

use crate::managers::session_manager::{SessionManager, SessionManagerTrait};
use crate::managers::tab_manager::{SharedTabs, TabManager, TabManagerTrait};
use crate::services::tab_data_resolver::{FetchOutcome, ResolveOptions, TabDataResolver};
use crate::types::errors::SessionError;
use crate::types::path::TabPath;
use crate::types::tab_data::{TabDataRecord, ToastExtras};

pub struct NavigationReactor {
    tabs: SharedTabs,
    resolver: Arc<TabDataResolver>,
    sessions: SessionManager,
    /// Set once a session's tabs have been restored; cleared on logout.
    save_tabs: AtomicBool,
}

impl NavigationReactor {
    pub fn new(tabs: SharedTabs, resolver: Arc<TabDataResolver>, sessions: SessionManager) -> Self {
        Self {
            tabs,
            resolver,
            sessions,
            save_tabs: AtomicBool::new(false),
        }
    }

    fn tabs(&self) -> MutexGuard<'_, TabManager> {
        self.tabs.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn resolver(&self) -> &Arc<TabDataResolver> {
        &self.resolver
    }

    pub fn is_saving(&self) -> bool {
        self.save_tabs.load(Ordering::SeqCst)
    }

    pub async fn tab_changed(&self, tab_id: &str) -> FetchOutcome {
        self.resolver.fetch_tab_data(tab_id, ResolveOptions::default()).await
    }

    pub async fn tab_reloaded(&self, tab_id: &str) -> FetchOutcome {
        self.resolver.fetch_tab_data(tab_id, ResolveOptions::fresh()).await
    }

    /// Refreshes the current tab when the window regains focus.
    pub async fn window_focus_changed(&self, focused: bool) -> Option<FetchOutcome> {
        if !focused {
            return None;
        }
        let current = self.tabs().current_id().map(str::to_string)?;
        Some(self.resolver.fetch_tab_data(&current, ResolveOptions::fresh()).await)
    }

    /// Persists the open tabs. Returns `false` when saving is currently off
    /// (signed out, or the previous session has not been restored yet).
    pub fn tabs_changed(&self) -> Result<bool, SessionError> {
        if !self.is_saving() {
            return Ok(false);
        }
        let snapshot = self.tabs().snapshot();
        self.sessions.save_snapshot(&snapshot)?;
        Ok(true)
    }

    /// Restores the persisted tab set and turns saving on. Data for the
    /// restored tabs is fetched in the background. Returns how many tabs the
    /// snapshot held.
    pub async fn session_ready(&self) -> Result<usize, SessionError> {
        let Some(snapshot) = self.sessions.load_snapshot()? else {
            self.save_tabs.store(true, Ordering::SeqCst);
            return Ok(0);
        };

        self.tabs().restore(&snapshot);
        info!(items = snapshot.items.len(), "restored tabs");
        self.save_tabs.store(true, Ordering::SeqCst);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                for item in &snapshot.items {
                    let resolver = Arc::clone(&self.resolver);
                    let id = item.id.clone();
                    let opts = ResolveOptions::for_path(TabPath::parse(&item.path));
                    runtime.spawn(async move {
                        resolver.fetch_tab_data(&id, opts).await;
                    });
                }
            }
            Err(_) => warn!("no runtime, restored tabs left unresolved"),
        }
        Ok(snapshot.items.len())
    }

    pub fn logout(&self) {
        debug!("tab saving disabled");
        self.save_tabs.store(false, Ordering::SeqCst);
    }

    /// Moves a tab to `path` with freshly resolved data.
    ///
    /// `quick` is written first so the strip can show the destination while
    /// resolution is in flight. `extras` travel with the evolved data (toast
    /// details). A resolution failure toasts the tab.
    pub async fn evolve_tab(
        &self,
        tab_id: &str,
        path: TabPath,
        extras: Option<ToastExtras>,
        quick: Option<TabPath>,
    ) -> FetchOutcome {
        if let Some(quick) = quick {
            let data = TabDataRecord::default().with_path(quick);
            if let Err(e) = self.tabs().apply_evolved(tab_id, data) {
                warn!(tab_id = %tab_id, error = %e, "quick evolve refused");
            }
        }

        let Some(ticket) = self.tabs().begin_evolution(tab_id) else {
            return FetchOutcome::Absent;
        };

        match self.resolver.resolve(tab_id, &ResolveOptions::for_path(path.clone())).await {
            Ok(data) => {
                let mut data = data.unwrap_or_default().with_path(path);
                data.toast = extras;

                let mut tabs = self.tabs();
                if !tabs.is_current_evolution(tab_id, ticket) {
                    debug!(tab_id = %tab_id, "evolve superseded");
                    return FetchOutcome::Stale;
                }
                match tabs.apply_evolved(tab_id, data) {
                    Ok(()) => FetchOutcome::Applied,
                    Err(e) => {
                        warn!(tab_id = %tab_id, error = %e, "evolve refused");
                        FetchOutcome::Absent
                    }
                }
            }
            Err(e) => {
                warn!(tab_id = %tab_id, error = %e.chain(), "evolve tab error");
                self.resolver.toast(tab_id, &e, Some(&path))
            }
        }
    }
}
