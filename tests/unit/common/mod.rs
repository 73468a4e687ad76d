#![allow(dead_code)]
//! In-memory fakes shared by the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use tabhost::services::entity_fetcher::EntitySource;
use tabhost::services::page_analyzer::PageAnalyzer;
use tabhost::types::entities::{Collection, Game, User};
use tabhost::types::errors::{FetchError, ViewError};
use tabhost::types::host::HostActions;
use tabhost::types::navigation::NavigateOptions;
use tabhost::types::path::TabPath;
use tabhost::types::tab_data::{TabDataRecord, ToastExtras};
use tabhost::types::view::{
    EmbeddedView, EventSink, RequestFilter, RequestVerdict, Subscription, ViewConfig, ViewEvent,
};

const SCROLL_WRITE_PREFIX: &str = "(function () { document.body.scrollTop = ";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Configure(ViewConfig),
    Stop,
    Reload,
    GoBack,
    GoForward,
    Load(String),
    ClearHistory,
    OpenDevTools,
    Script(String),
    InstallFilter(String),
}

/// Scriptable stand-in for a platform webview.
pub struct MockView {
    calls: Mutex<Vec<Call>>,
    src: Mutex<String>,
    partition: Mutex<String>,
    destroyed: AtomicBool,
    can_go_back: AtomicBool,
    can_go_forward: AtomicBool,
    scroll_top: Mutex<f64>,
    /// Writes beyond this offset are clamped, like a page that is too short.
    max_scroll: Mutex<f64>,
    scroll_writes: AtomicUsize,
    sink: Arc<Mutex<Option<EventSink>>>,
    filter: Mutex<Option<RequestFilter>>,
}

impl MockView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            src: Mutex::new(String::new()),
            partition: Mutex::new(String::new()),
            destroyed: AtomicBool::new(false),
            can_go_back: AtomicBool::new(false),
            can_go_forward: AtomicBool::new(false),
            scroll_top: Mutex::new(0.0),
            max_scroll: Mutex::new(f64::MAX),
            scroll_writes: AtomicUsize::new(0),
            sink: Arc::new(Mutex::new(None)),
            filter: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Load(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn set_src(&self, url: &str) {
        *self.src.lock().unwrap() = url.to_string();
    }

    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    pub fn set_history(&self, back: bool, forward: bool) {
        self.can_go_back.store(back, Ordering::SeqCst);
        self.can_go_forward.store(forward, Ordering::SeqCst);
    }

    pub fn set_scroll_top(&self, value: f64) {
        *self.scroll_top.lock().unwrap() = value;
    }

    pub fn set_max_scroll(&self, value: f64) {
        *self.max_scroll.lock().unwrap() = value;
    }

    pub fn scroll_writes(&self) -> usize {
        self.scroll_writes.load(Ordering::SeqCst)
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    /// Drops the event sender, ending the controller's event stream.
    pub fn close_events(&self) {
        *self.sink.lock().unwrap() = None;
    }

    pub fn emit(&self, event: ViewEvent) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            let _ = sink.send(event);
        }
    }

    /// Runs `url` through the installed request filter, as the session would.
    pub fn request(&self, url: &str) -> Option<RequestVerdict> {
        let filter = self.filter.lock().unwrap().clone();
        filter.map(|f| f(url))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EmbeddedView for MockView {
    fn configure(&self, config: &ViewConfig) {
        *self.partition.lock().unwrap() = config.partition.clone();
        self.record(Call::Configure(config.clone()));
    }

    fn partition(&self) -> String {
        self.partition.lock().unwrap().clone()
    }

    fn src(&self) -> String {
        self.src.lock().unwrap().clone()
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn can_go_back(&self) -> bool {
        self.can_go_back.load(Ordering::SeqCst)
    }

    fn can_go_forward(&self) -> bool {
        self.can_go_forward.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.record(Call::Stop);
    }

    fn reload(&self) {
        self.record(Call::Reload);
    }

    fn go_back(&self) {
        self.record(Call::GoBack);
    }

    fn go_forward(&self) {
        self.record(Call::GoForward);
    }

    fn load_url(&self, url: &str) {
        self.set_src(url);
        self.record(Call::Load(url.to_string()));
    }

    fn clear_history(&self) {
        self.record(Call::ClearHistory);
    }

    fn open_dev_tools(&self) {
        self.record(Call::OpenDevTools);
    }

    async fn execute_javascript(&self, code: &str) -> Result<serde_json::Value, ViewError> {
        if self.is_destroyed() {
            return Err(ViewError::Destroyed);
        }
        if let Some(rest) = code.strip_prefix(SCROLL_WRITE_PREFIX) {
            let requested: f64 = rest
                .split(';')
                .next()
                .and_then(|v| v.trim().parse().ok())
                .ok_or_else(|| ViewError::Script(code.to_string()))?;
            self.scroll_writes.fetch_add(1, Ordering::SeqCst);
            let applied = requested.min(*self.max_scroll.lock().unwrap());
            *self.scroll_top.lock().unwrap() = applied;
            return Ok(serde_json::json!(applied));
        }
        if code == "document.body.scrollTop" {
            return Ok(serde_json::json!(*self.scroll_top.lock().unwrap()));
        }
        self.record(Call::Script(code.to_string()));
        Ok(serde_json::Value::Null)
    }

    fn subscribe(&self, sink: EventSink) -> Subscription {
        *self.sink.lock().unwrap() = Some(sink);
        let slot = Arc::clone(&self.sink);
        Subscription::new(move || *slot.lock().unwrap() = None)
    }

    fn install_request_filter(&self, origin: &str, filter: RequestFilter) {
        *self.filter.lock().unwrap() = Some(filter);
        self.record(Call::InstallFilter(origin.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Navigate {
        path: TabPath,
        opts: NavigateOptions,
        background: bool,
    },
    DataFetched {
        id: String,
        data: TabDataRecord,
    },
    Reloaded(String),
    Evolved {
        id: String,
        data: TabDataRecord,
    },
    EvolveTab {
        id: String,
        path: TabPath,
        extras: Option<ToastExtras>,
    },
}

/// Host that only records what it was asked to do.
#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<(TabPath, NavigateOptions, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Navigate {
                    path,
                    opts,
                    background,
                } => Some((path, opts, background)),
                _ => None,
            })
            .collect()
    }
}

impl HostActions for RecordingHost {
    fn navigate(&self, path: TabPath, opts: NavigateOptions, background: bool) {
        self.calls.lock().unwrap().push(HostCall::Navigate {
            path,
            opts,
            background,
        });
    }

    fn tab_data_fetched(&self, id: &str, data: TabDataRecord, _timestamp: i64) {
        self.calls.lock().unwrap().push(HostCall::DataFetched {
            id: id.to_string(),
            data,
        });
    }

    fn tab_reloaded(&self, id: &str) {
        self.calls.lock().unwrap().push(HostCall::Reloaded(id.to_string()));
    }

    fn tab_evolved(&self, id: &str, data: TabDataRecord) {
        self.calls.lock().unwrap().push(HostCall::Evolved {
            id: id.to_string(),
            data,
        });
    }

    fn evolve_tab(&self, id: &str, path: TabPath, extras: Option<ToastExtras>) {
        self.calls.lock().unwrap().push(HostCall::EvolveTab {
            id: id.to_string(),
            path,
            extras,
        });
    }
}

/// Entity source backed by maps; ids listed in `failing` answer with an
/// API error, ids in `offline` with a network error.
#[derive(Default)]
pub struct FakeSource {
    pub games: HashMap<u64, Game>,
    pub users: HashMap<u64, User>,
    pub collections: HashMap<u64, Collection>,
    pub collection_games: HashMap<u64, Vec<Game>>,
    pub failing: Vec<u64>,
    pub offline: Vec<u64>,
    pub fresh_requests: AtomicUsize,
}

impl FakeSource {
    fn check(&self, id: u64, fresh: bool) -> Result<(), FetchError> {
        if fresh {
            self.fresh_requests.fetch_add(1, Ordering::SeqCst);
        }
        if self.offline.contains(&id) {
            return Err(FetchError::Network("connection refused".to_string()));
        }
        if self.failing.contains(&id) {
            return Err(FetchError::Api {
                status: 500,
                message: "internal server error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EntitySource for FakeSource {
    async fn game(&self, id: u64, fresh: bool) -> Result<Option<Game>, FetchError> {
        self.check(id, fresh)?;
        Ok(self.games.get(&id).cloned())
    }

    async fn user(&self, id: u64, fresh: bool) -> Result<Option<User>, FetchError> {
        self.check(id, fresh)?;
        Ok(self.users.get(&id).cloned())
    }

    async fn collection(&self, id: u64, fresh: bool) -> Result<Option<Collection>, FetchError> {
        self.check(id, fresh)?;
        Ok(self.collections.get(&id).cloned())
    }

    async fn collection_games(&self, id: u64) -> Result<Vec<Game>, FetchError> {
        Ok(self.collection_games.get(&id).cloned().unwrap_or_default())
    }
}

pub fn game(id: u64, title: &str) -> Game {
    Game {
        id,
        title: title.to_string(),
        cover_url: Some(format!("https://img.example/{}.png", id)),
        url: Some(format!("https://example.itch.io/game-{}", id)),
    }
}

/// Game lookups wait on `gate` before answering with a "Late" game.
pub struct GatedSource {
    pub gate: Arc<Notify>,
}

#[async_trait]
impl EntitySource for GatedSource {
    async fn game(&self, id: u64, _fresh: bool) -> Result<Option<Game>, FetchError> {
        self.gate.notified().await;
        Ok(Some(game(id, "Late")))
    }

    async fn user(&self, _id: u64, _fresh: bool) -> Result<Option<User>, FetchError> {
        Ok(None)
    }

    async fn collection(&self, _id: u64, _fresh: bool) -> Result<Option<Collection>, FetchError> {
        Ok(None)
    }

    async fn collection_games(&self, _id: u64) -> Result<Vec<Game>, FetchError> {
        Ok(Vec::new())
    }
}

/// Page analyzer answering from a fixed table.
#[derive(Default)]
pub struct StaticAnalyzer {
    pub pages: HashMap<String, TabPath>,
}

#[async_trait]
impl PageAnalyzer for StaticAnalyzer {
    async fn analyze(&self, url: &str) -> Result<Option<TabPath>, FetchError> {
        Ok(self.pages.get(url).cloned())
    }
}
