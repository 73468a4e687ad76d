//! Owns one embedded view per tab and bridges its native events into
//! navigation interception, scroll tracking, the internal channel and the
//! host's tab state.
//!
//! Every operation that touches the view is a no-op once the view is gone
//! (never mounted, unmounted, or its content host destroyed).

use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::managers::navigation_interceptor::{Interception, NavigationInterceptor};
use crate::services::internal_channel::{ChannelHandler, InternalChannelRouter, SessionContext};
use crate::services::page_analyzer::PageAnalyzer;
use crate::services::scroll_restorer::ScrollRestorer;
use crate::services::url_resolver::UrlResolver;
use crate::types::host::HostActions;
use crate::types::navigation::{NavigateOptions, NavigationState};
use crate::types::path::TabPath;
use crate::types::settings::{EngineSettings, ViewSettings};
use crate::types::tab_data::TabDataRecord;
use crate::types::view::{EmbeddedView, Subscription, ViewConfig, ViewEvent};

pub const BLANK_URL: &str = "about:blank";

/// Collaborators shared by every view of a window.
#[derive(Clone)]
pub struct ViewContext {
    pub host: Arc<dyn HostActions>,
    pub session: Arc<SessionContext>,
    pub channel: Arc<InternalChannelRouter>,
    pub analyzer: Arc<dyn PageAnalyzer>,
}

pub struct ViewLifecycleController {
    tab_id: String,
    frozen: bool,
    /// Url the owning tab wants displayed.
    url: Option<String>,
    partition: String,
    settings: ViewSettings,
    ctx: ViewContext,
    urls: UrlResolver,

    view: Option<Arc<dyn EmbeddedView>>,
    subscription: Option<Subscription>,
    initialized: bool,
    state: NavigationState,
    interceptor: NavigationInterceptor,
    scroll: ScrollRestorer,
    went_back_or_forward: bool,
}

impl ViewLifecycleController {
    pub fn new(
        tab_id: &str,
        frozen: bool,
        url: Option<String>,
        account_id: &str,
        settings: &EngineSettings,
        ctx: ViewContext,
    ) -> Self {
        Self {
            tab_id: tab_id.to_string(),
            // a view without a tab can't be retargeted either
            frozen: frozen || tab_id.is_empty(),
            url,
            partition: format!("{}{}", settings.view.partition_prefix, account_id),
            settings: settings.view.clone(),
            ctx,
            urls: UrlResolver::new(&settings.navigation),
            view: None,
            subscription: None,
            initialized: false,
            state: NavigationState::default(),
            interceptor: NavigationInterceptor::new(settings.navigation.will_navigate_grace_ms),
            scroll: ScrollRestorer::new(settings.scroll.clone()),
            went_back_or_forward: false,
        }
    }

    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn scroll(&self) -> &ScrollRestorer {
        &self.scroll
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The mounted view, unless its content host has been torn down.
    fn live_view(&self) -> Option<Arc<dyn EmbeddedView>> {
        self.view.as_ref().filter(|v| !v.is_destroyed()).cloned()
    }

    /// Configures `view` for this tab and starts it on a blank page. Real
    /// setup happens on its first `dom-ready`; feed the returned events to
    /// [`handle_event`](Self::handle_event).
    pub fn mount(&mut self, view: Arc<dyn EmbeddedView>) -> UnboundedReceiver<ViewEvent> {
        self.unmount();

        view.configure(&ViewConfig {
            partition: self.partition.clone(),
            plugins: self.settings.plugins,
            preload: self.settings.preload_script.clone(),
        });
        if view.partition().is_empty() {
            warn!(tab_id = %self.tab_id, "view has empty partition");
        }

        let (sink, events) = mpsc::unbounded_channel();
        self.subscription = Some(view.subscribe(sink));
        view.load_url(BLANK_URL);

        self.state = NavigationState::default();
        self.view = Some(view);
        debug!(tab_id = %self.tab_id, partition = %self.partition, "view mounted");
        events
    }

    /// Drops listeners and the scroll task. The view itself is released.
    pub fn unmount(&mut self) {
        self.scroll.cancel();
        self.subscription = None;
        self.initialized = false;
        if self.view.take().is_some() {
            debug!(tab_id = %self.tab_id, "view unmounted");
        }
    }

    /// Processes events until the view's event stream closes.
    pub async fn run(&mut self, mut events: UnboundedReceiver<ViewEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: ViewEvent) {
        if self.live_view().is_none() {
            return;
        }

        match event {
            ViewEvent::DomReady => self.dom_ready(),
            ViewEvent::DidStartLoading => self.update_state(|s| s.loading = true),
            ViewEvent::DidStopLoading => self.did_stop_loading(),
            ViewEvent::WillNavigate { url, timestamp } => self.will_navigate(&url, timestamp),
            ViewEvent::DidNavigate { url } => self.did_navigate(url),
            ViewEvent::PageTitleUpdated { title } => {
                let data = TabDataRecord {
                    web_title: Some(title),
                    ..TabDataRecord::default()
                };
                self.ctx.host.tab_data_fetched(&self.tab_id, data, now_millis());
            }
            ViewEvent::PageFaviconUpdated { favicons } => {
                if let Some(favicon) = favicons.into_iter().next() {
                    let data = TabDataRecord {
                        web_favicon: Some(favicon),
                        ..TabDataRecord::default()
                    };
                    self.ctx.host.tab_data_fetched(&self.tab_id, data, now_millis());
                }
            }
            ViewEvent::NewWindow { url } => {
                let path = self.interceptor.on_new_window(&url);
                self.ctx.host.navigate(path, self.source_opts(false), true);
            }
        }
    }

    fn update_state(&mut self, apply: impl FnOnce(&mut NavigationState)) {
        let Some(view) = self.live_view() else {
            return;
        };
        self.state.can_go_back = view.can_go_back();
        self.state.can_go_forward = view.can_go_forward();
        apply(&mut self.state);
    }

    fn source_opts(&self, in_place: bool) -> NavigateOptions {
        NavigateOptions {
            source_tab: Some(self.tab_id.clone()).filter(|id| !id.is_empty()),
            in_place,
        }
    }

    fn dom_ready(&mut self) {
        if !self.initialized {
            self.initialize();
        }

        let Some(view) = self.live_view() else {
            return;
        };
        let tab_id = serde_json::Value::String(self.tab_id.clone());
        let code = format!("window.__itchInit && window.__itchInit({})", tab_id);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(tab_id = %self.tab_id, "no runtime, init hook skipped");
            return;
        };
        runtime.spawn(async move {
            if let Err(e) = view.execute_javascript(&code).await {
                debug!(error = %e, "init hook failed");
            }
        });
    }

    /// First `dom-ready`: the view is interactive, finish setting it up.
    fn initialize(&mut self) {
        let Some(view) = self.live_view() else {
            return;
        };
        self.initialized = true;

        if self.settings.open_devtools_on_ready {
            view.open_dev_tools();
        }

        self.update_state(|s| s.loading = false);

        if self.ctx.session.activate(&self.partition) {
            info!(partition = %self.partition, "wiring internal channel for new session");
            let handler: Arc<dyn ChannelHandler> = Arc::new(ViewChannelHandler {
                view: Arc::downgrade(&view),
                host: Arc::clone(&self.ctx.host),
                analyzer: Arc::clone(&self.ctx.analyzer),
            });
            let filter = self.ctx.channel.request_filter(handler);
            view.install_request_filter(&self.ctx.channel.filter_pattern(), filter);
        }

        if let Some(url) = self.url.clone().filter(|u| !is_blank(u)) {
            self.load_url(&url);
        }

        // the initial blank page would otherwise be reachable with go_back
        view.clear_history();
    }

    fn did_stop_loading(&mut self) {
        let blank = self.live_view().map_or(true, |v| is_blank(&v.src()));
        self.update_state(|s| {
            s.loading = false;
            if !blank {
                s.first_load = false;
            }
        });
    }

    fn will_navigate(&mut self, url: &str, timestamp: u64) {
        let interception = self.interceptor.on_will_navigate(self.frozen, url, timestamp);
        debug!(tab_id = %self.tab_id, url = %url, ?interception, "will-navigate");

        match &interception {
            Interception::Redirect { path } => {
                self.ctx.host.navigate(path.clone(), self.source_opts(false), false);
            }
            Interception::Track { path } => {
                self.ctx.host.navigate(path.clone(), self.source_opts(true), false);
            }
            Interception::SuppressEcho | Interception::Ignore => {}
        }

        if interception.cancels_native() {
            self.cancel_native_navigation();
        }
    }

    /// Stops the view and puts it back on the tab's own url.
    fn cancel_native_navigation(&self) {
        let Some(view) = self.live_view() else {
            return;
        };
        view.stop();
        let current = self
            .url
            .clone()
            .filter(|u| !is_blank(u))
            .unwrap_or_else(|| self.state.url.clone());
        if !current.is_empty() {
            view.load_url(&current);
        }
    }

    fn did_navigate(&mut self, url: String) {
        let Some(view) = self.live_view() else {
            return;
        };
        self.update_state(|s| s.url = url.clone());

        if !self.frozen && !self.tab_id.is_empty() {
            spawn_analysis(
                Arc::clone(&self.ctx.analyzer),
                Arc::clone(&self.ctx.host),
                self.tab_id.clone(),
                url.clone(),
            );
        }

        let restore = std::mem::take(&mut self.went_back_or_forward);
        self.scroll.start(view, &url, restore);
    }

    pub fn go_back(&mut self) {
        let Some(view) = self.live_view() else {
            return;
        };
        if !view.can_go_back() {
            return;
        }
        self.went_back_or_forward = true;
        view.go_back();
    }

    pub fn go_forward(&mut self) {
        let Some(view) = self.live_view() else {
            return;
        };
        if !view.can_go_forward() {
            return;
        }
        self.went_back_or_forward = true;
        view.go_forward();
    }

    pub fn stop(&self) {
        if let Some(view) = self.live_view() {
            view.stop();
        }
    }

    /// Reloads the page and lets the host re-fetch the tab's data.
    pub fn reload(&self) {
        if let Some(view) = self.live_view() {
            view.reload();
        }
        self.ctx.host.tab_reloaded(&self.tab_id);
    }

    pub fn open_dev_tools(&self) {
        if let Some(view) = self.live_view() {
            view.open_dev_tools();
        }
    }

    /// Loads `url` in the view, or routes it through the host when this is a
    /// frozen tab and the host can render the destination natively.
    pub fn load_url(&mut self, url: &str) {
        if self.frozen && self.urls.is_app_supported(url) {
            self.ctx.host.navigate(TabPath::url(url), NavigateOptions::default(), false);
            return;
        }

        self.state.url = url.to_string();
        if let Some(view) = self.live_view() {
            view.load_url(url);
        }
    }

    /// Address-bar entry point: normalizes raw input first.
    pub fn load_user_url(&mut self, input: &str) {
        let url = self.urls.resolve_input(input);
        self.load_url(&url);
    }

    /// The owning tab's url changed. A view still sitting on its blank page
    /// picks up the new url right away.
    pub fn props_changed(&mut self, url: Option<String>) {
        self.url = url.clone();
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            return;
        };
        let Some(view) = self.live_view() else {
            return;
        };
        if is_blank(&view.src()) {
            self.load_url(&url);
        }
    }
}

impl Drop for ViewLifecycleController {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Serves internal-channel commands for the session the view belongs to.
struct ViewChannelHandler {
    view: Weak<dyn EmbeddedView>,
    host: Arc<dyn HostActions>,
    analyzer: Arc<dyn PageAnalyzer>,
}

impl ChannelHandler for ViewChannelHandler {
    fn open_dev_tools(&self, _tab_id: Option<&str>) {
        if let Some(view) = self.view.upgrade().filter(|v| !v.is_destroyed()) {
            view.open_dev_tools();
        }
    }

    fn analyze_page(&self, tab_id: &str, url: &str) {
        spawn_analysis(
            Arc::clone(&self.analyzer),
            Arc::clone(&self.host),
            tab_id.to_string(),
            url.to_string(),
        );
    }

    fn evolve_tab(&self, tab_id: &str, path: TabPath) {
        self.host.evolve_tab(tab_id, path, None);
    }
}

/// Fetches `url` out of band and evolves the tab to the path it declares.
fn spawn_analysis(analyzer: Arc<dyn PageAnalyzer>, host: Arc<dyn HostActions>, tab_id: String, url: String) {
    if tokio::runtime::Handle::try_current().is_err() {
        warn!(url = %url, "no runtime, page analysis skipped");
        return;
    }
    tokio::spawn(async move {
        match analyzer.analyze(&url).await {
            Ok(Some(path)) => host.evolve_tab(&tab_id, path, None),
            Ok(None) => {}
            Err(e) => debug!(url = %url, error = %e, "page analysis failed"),
        }
    });
}

fn is_blank(url: &str) -> bool {
    url.is_empty() || url == BLANK_URL
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
