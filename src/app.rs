//! Application core: wires settings, storage, the shared tab store, data
//! resolution and the per-view collaborators together.

use std::error::Error;
use std::sync::{Arc, MutexGuard};

use tracing::{debug, info, warn};

use crate::database::connection::Database;
use crate::managers::session_manager::SessionManager;
use crate::managers::tab_manager::{NavigateOutcome, SharedTabs, TabManager, TabManagerTrait};
use crate::managers::view_controller::{ViewContext, ViewLifecycleController};
use crate::services::entity_fetcher::{ApiEntitySource, EntitySource};
use crate::services::internal_channel::{InternalChannelRouter, SessionContext};
use crate::services::navigation_reactor::NavigationReactor;
use crate::services::page_analyzer::{HttpPageAnalyzer, PageAnalyzer};
use crate::services::tab_data_resolver::TabDataResolver;
use crate::types::host::HostActions;
use crate::types::navigation::NavigateOptions;
use crate::types::path::TabPath;
use crate::types::settings::EngineSettings;
use crate::types::tab_data::{TabDataRecord, ToastExtras};

pub const DB_FILE: &str = "tabhost.db";

/// Central application struct.
pub struct App {
    pub settings: EngineSettings,
    pub db: Arc<Database>,
    pub tabs: SharedTabs,
    pub reactor: Arc<NavigationReactor>,
    pub navigator: Arc<Navigator>,
    session: Arc<SessionContext>,
    channel: Arc<InternalChannelRouter>,
    analyzer: Arc<dyn PageAnalyzer>,
}

impl App {
    /// Opens the on-disk database under the user data directory and talks to
    /// the configured API.
    pub fn open(settings: EngineSettings) -> Result<Self, Box<dyn Error>> {
        let dir = settings.user_data_dir();
        std::fs::create_dir_all(&dir)?;
        let db_path = dir.join(DB_FILE);
        let db = Arc::new(Database::open(&db_path)?);

        let source = Arc::new(ApiEntitySource::new(&settings.api, Arc::clone(&db))?);
        let analyzer = Arc::new(HttpPageAnalyzer::new(
            &settings.navigation.path_meta_name,
            std::time::Duration::from_secs(settings.api.timeout_secs),
        )?);
        info!(db = %db_path.display(), "app storage opened");
        Self::with_parts(settings, db, source, analyzer)
    }

    /// Assembles the app around caller-provided entity and page sources.
    pub fn with_parts(
        settings: EngineSettings,
        db: Arc<Database>,
        source: Arc<dyn EntitySource>,
        analyzer: Arc<dyn PageAnalyzer>,
    ) -> Result<Self, Box<dyn Error>> {
        let tabs = TabManager::shared(&settings.static_tabs);
        let resolver = Arc::new(TabDataResolver::new(Arc::clone(&tabs), source, &settings));
        let sessions = SessionManager::new(Arc::clone(&db));
        let reactor = Arc::new(NavigationReactor::new(Arc::clone(&tabs), resolver, sessions));
        let navigator = Arc::new(Navigator::new(Arc::clone(&tabs), Arc::clone(&reactor)));
        let channel = Arc::new(InternalChannelRouter::new(&settings.navigation.internal_origin)?);

        Ok(Self {
            settings,
            db,
            tabs,
            reactor,
            navigator,
            session: Arc::new(SessionContext::new()),
            channel,
            analyzer,
        })
    }

    fn tabs(&self) -> MutexGuard<'_, TabManager> {
        self.tabs.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn view_context(&self) -> ViewContext {
        ViewContext {
            host: Arc::clone(&self.navigator) as Arc<dyn HostActions>,
            session: Arc::clone(&self.session),
            channel: Arc::clone(&self.channel),
            analyzer: Arc::clone(&self.analyzer),
        }
    }

    /// Builds the view controller for an open tab.
    pub fn controller_for(&self, tab_id: &str, account_id: &str) -> Option<ViewLifecycleController> {
        let (frozen, url) = {
            let tabs = self.tabs();
            let tab = tabs.get_tab(tab_id)?;
            (tab.frozen, tab.url().map(str::to_string))
        };
        Some(ViewLifecycleController::new(
            tab_id,
            frozen,
            url,
            account_id,
            &self.settings,
            self.view_context(),
        ))
    }

    /// Focuses a tab and refreshes its data.
    pub async fn focus_tab(&self, tab_id: &str) -> Result<(), Box<dyn Error>> {
        self.tabs().focus_tab(tab_id)?;
        self.reactor.tab_changed(tab_id).await;
        self.reactor.tabs_changed()?;
        Ok(())
    }

    pub fn close_tab(&self, tab_id: &str) -> Result<(), Box<dyn Error>> {
        self.tabs().close_tab(tab_id)?;
        self.reactor.tabs_changed()?;
        Ok(())
    }

    pub async fn session_ready(&self) -> Result<usize, Box<dyn Error>> {
        Ok(self.reactor.session_ready().await?)
    }

    pub fn logout(&self) {
        self.reactor.logout();
    }
}

/// Host action surface over the shared tab store. Asynchronous follow-ups
/// (data fetches, evolutions) are scheduled on the current runtime.
pub struct Navigator {
    tabs: SharedTabs,
    reactor: Arc<NavigationReactor>,
}

impl Navigator {
    pub fn new(tabs: SharedTabs, reactor: Arc<NavigationReactor>) -> Self {
        Self { tabs, reactor }
    }

    fn tabs(&self) -> MutexGuard<'_, TabManager> {
        self.tabs.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn persist(&self) {
        if let Err(e) = self.reactor.tabs_changed() {
            warn!(error = %e, "could not save tabs");
        }
    }

    fn schedule<F>(&self, what: &'static str, job: impl FnOnce(Arc<NavigationReactor>) -> F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(job(Arc::clone(&self.reactor)));
            }
            Err(_) => warn!(what, "no runtime, follow-up dropped"),
        }
    }
}

impl HostActions for Navigator {
    fn navigate(&self, path: TabPath, opts: NavigateOptions, background: bool) {
        let outcome = self.tabs().navigate(path.clone(), &opts, background);
        debug!(path = %path, ?outcome, background, "navigate");

        let id = outcome.tab_id().to_string();
        if matches!(outcome, NavigateOutcome::Opened(_) | NavigateOutcome::Retargeted(_)) || !background {
            self.schedule("tab_changed", move |reactor| async move {
                reactor.tab_changed(&id).await;
            });
        }
        self.persist();
    }

    fn tab_data_fetched(&self, id: &str, data: TabDataRecord, timestamp: i64) {
        match self.tabs().apply_fetched(id, data, None) {
            Ok(_) => debug!(tab_id = %id, timestamp, "tab data merged"),
            Err(e) => debug!(tab_id = %id, error = %e, "tab data dropped"),
        }
    }

    fn tab_reloaded(&self, id: &str) {
        let id = id.to_string();
        self.schedule("tab_reloaded", move |reactor| async move {
            reactor.tab_reloaded(&id).await;
        });
    }

    fn tab_evolved(&self, id: &str, data: TabDataRecord) {
        if let Err(e) = self.tabs().apply_evolved(id, data) {
            warn!(tab_id = %id, error = %e, "tab evolution refused");
            return;
        }
        self.persist();
    }

    fn evolve_tab(&self, id: &str, path: TabPath, extras: Option<ToastExtras>) {
        let id = id.to_string();
        self.schedule("evolve_tab", move |reactor| async move {
            reactor.evolve_tab(&id, path, extras, None).await;
            if let Err(e) = reactor.tabs_changed() {
                warn!(error = %e, "could not save tabs");
            }
        });
    }
}
