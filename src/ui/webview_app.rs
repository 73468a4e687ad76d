//! `wry` + `tao` host for a single tab view.
//!
//! The platform webview lives on the event-loop thread. [`WryView`] is the
//! thread-safe handle the engine sees: commands are forwarded through the
//! event-loop proxy, native callbacks are turned into [`ViewEvent`]s.
//!
//! Top-level navigations to the internal origin are caught in the navigation
//! handler; subresource requests to it are not visible to wry. The handler
//! also fires for loads the engine issues itself; those are not reported as
//! page-initiated navigations.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tao::event::{Event, WindowEvent};
use tao::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use tao::window::WindowBuilder;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use wry::{PageLoadEvent, WebContext, WebViewBuilder};

use crate::app::App;
use crate::managers::tab_manager::TabManagerTrait;
use crate::managers::view_controller::BLANK_URL;
use crate::types::errors::ViewError;
use crate::types::settings::EngineSettings;
use crate::types::view::{
    EmbeddedView, EventSink, RequestFilter, RequestVerdict, Subscription, ViewConfig, ViewEvent,
};

#[derive(Debug)]
enum UserEvent {
    Load(String),
    Eval(String, Option<oneshot::Sender<String>>),
    Reload,
    OpenDevTools,
}

#[derive(Default)]
struct Shared {
    src: String,
    history: Vec<String>,
    index: usize,
    /// Set while a back/forward move is in flight so the load is not pushed.
    traversing: bool,
    partition: String,
    destroyed: bool,
    sink: Option<EventSink>,
    filter: Option<(String, RequestFilter)>,
    /// Loads sent by the engine whose navigation callback has not fired yet.
    issued: Vec<String>,
}

const MAX_ISSUED: usize = 8;

fn same_document(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

fn record_issued(shared: &Mutex<Shared>, url: &str) {
    let mut s = lock(shared);
    if s.issued.len() >= MAX_ISSUED {
        s.issued.remove(0);
    }
    s.issued.push(url.to_string());
}

fn take_issued(shared: &Mutex<Shared>, url: &str) -> bool {
    let mut s = lock(shared);
    match s.issued.iter().position(|u| same_document(u, url)) {
        Some(idx) => {
            s.issued.remove(idx);
            true
        }
        None => false,
    }
}

/// Thread-safe handle over the webview owned by the event loop.
pub struct WryView {
    shared: Arc<Mutex<Shared>>,
    proxy: Mutex<EventLoopProxy<UserEvent>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|p| p.into_inner())
}

fn emit(shared: &Mutex<Shared>, event: ViewEvent) {
    if let Some(sink) = &lock(shared).sink {
        let _ = sink.send(event);
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl WryView {
    fn send(&self, event: UserEvent) {
        if self.is_destroyed() {
            return;
        }
        let proxy = self.proxy.lock().unwrap_or_else(|p| p.into_inner());
        if proxy.send_event(event).is_err() {
            lock(&self.shared).destroyed = true;
        }
    }

    fn issue_load(&self, url: String) {
        if self.is_destroyed() {
            return;
        }
        record_issued(&self.shared, &url);
        self.send(UserEvent::Load(url));
    }

    fn eval(&self, code: &str) {
        self.send(UserEvent::Eval(code.to_string(), None));
    }

    fn traverse(&self, delta: isize) {
        let target = {
            let mut shared = lock(&self.shared);
            let next = shared.index as isize + delta;
            if next < 0 || next as usize >= shared.history.len() {
                return;
            }
            shared.index = next as usize;
            shared.traversing = true;
            shared.history[shared.index].clone()
        };
        self.issue_load(target);
    }
}

#[async_trait]
impl EmbeddedView for WryView {
    fn configure(&self, config: &ViewConfig) {
        let mut shared = lock(&self.shared);
        if !shared.partition.is_empty() && shared.partition != config.partition {
            warn!(
                current = %shared.partition,
                requested = %config.partition,
                "partition is fixed once the webview is built"
            );
            return;
        }
        shared.partition = config.partition.clone();
    }

    fn partition(&self) -> String {
        lock(&self.shared).partition.clone()
    }

    fn src(&self) -> String {
        lock(&self.shared).src.clone()
    }

    fn is_destroyed(&self) -> bool {
        lock(&self.shared).destroyed
    }

    fn can_go_back(&self) -> bool {
        lock(&self.shared).index > 0
    }

    fn can_go_forward(&self) -> bool {
        let shared = lock(&self.shared);
        shared.index + 1 < shared.history.len()
    }

    fn stop(&self) {
        self.eval("window.stop()");
    }

    fn reload(&self) {
        let src = self.src();
        if !src.is_empty() {
            record_issued(&self.shared, &src);
        }
        self.send(UserEvent::Reload);
    }

    fn go_back(&self) {
        self.traverse(-1);
    }

    fn go_forward(&self) {
        self.traverse(1);
    }

    fn load_url(&self, url: &str) {
        self.issue_load(url.to_string());
    }

    fn clear_history(&self) {
        let mut shared = lock(&self.shared);
        let current = shared.history.get(shared.index).cloned();
        shared.history = current.into_iter().collect();
        shared.index = 0;
    }

    fn open_dev_tools(&self) {
        self.send(UserEvent::OpenDevTools);
    }

    async fn execute_javascript(&self, code: &str) -> Result<serde_json::Value, ViewError> {
        if self.is_destroyed() {
            return Err(ViewError::Destroyed);
        }
        let (reply, result) = oneshot::channel();
        self.send(UserEvent::Eval(code.to_string(), Some(reply)));
        let raw = result.await.map_err(|_| ViewError::Destroyed)?;
        if raw.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&raw).map_err(|e| ViewError::Script(e.to_string()))
    }

    fn subscribe(&self, sink: EventSink) -> Subscription {
        lock(&self.shared).sink = Some(sink);
        let shared = Arc::clone(&self.shared);
        Subscription::new(move || lock(&shared).sink = None)
    }

    fn install_request_filter(&self, origin: &str, filter: RequestFilter) {
        let prefix = origin.trim_end_matches('*').to_string();
        lock(&self.shared).filter = Some((prefix, filter));
    }
}

/// Called by wry before every top-level navigation. Returning `false`
/// cancels it.
fn on_navigation(shared: &Mutex<Shared>, url: &str) -> bool {
    let filter = lock(shared)
        .filter
        .as_ref()
        .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
        .map(|(_, f)| Arc::clone(f));
    if let Some(filter) = filter {
        return filter(url) == RequestVerdict::Proceed;
    }

    if take_issued(shared, url) {
        debug!(url = %url, "engine-issued load");
        return true;
    }

    if url != BLANK_URL {
        emit(
            shared,
            ViewEvent::WillNavigate {
                url: url.to_string(),
                timestamp: now_millis(),
            },
        );
    }
    true
}

fn on_page_load(shared: &Mutex<Shared>, event: PageLoadEvent, url: String) {
    match event {
        PageLoadEvent::Started => {
            {
                let mut s = lock(shared);
                s.src = url.clone();
                if std::mem::take(&mut s.traversing) {
                    // index already moved
                } else if s.history.get(s.index) != Some(&url) {
                    let keep = if s.history.is_empty() { 0 } else { s.index + 1 };
                    s.history.truncate(keep);
                    s.history.push(url.clone());
                    s.index = s.history.len() - 1;
                }
            }
            emit(shared, ViewEvent::DidStartLoading);
            emit(shared, ViewEvent::DidNavigate { url });
        }
        PageLoadEvent::Finished => {
            emit(shared, ViewEvent::DomReady);
            emit(shared, ViewEvent::DidStopLoading);
        }
    }
}

fn partition_dir(base: PathBuf, partition: &str) -> PathBuf {
    let name: String = partition
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    base.join("partitions").join(name)
}

/// Runs the window until it is closed.
pub fn run(settings: EngineSettings, account_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    let app = App::open(settings.clone())?;
    runtime.block_on(app.session_ready())?;

    let tab_id = app
        .tabs
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .current_id()
        .map(str::to_string)
        .unwrap_or_default();
    let mut controller = app
        .controller_for(&tab_id, account_id)
        .ok_or("no tab to display")?;

    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
    let shared = Arc::new(Mutex::new(Shared::default()));
    let view = Arc::new(WryView {
        shared: Arc::clone(&shared),
        proxy: Mutex::new(event_loop.create_proxy()),
    });

    let window = WindowBuilder::new()
        .with_title("tabhost")
        .with_inner_size(tao::dpi::LogicalSize::new(1280.0, 800.0))
        .build(&event_loop)?;

    let mut web_context = WebContext::new(Some(partition_dir(
        settings.user_data_dir(),
        controller.partition(),
    )));

    let nav_shared = Arc::clone(&shared);
    let load_shared = Arc::clone(&shared);
    let title_shared = Arc::clone(&shared);
    let window_shared = Arc::clone(&shared);

    let mut builder = WebViewBuilder::new_with_web_context(&mut web_context)
        .with_url(BLANK_URL)
        .with_navigation_handler(move |url| on_navigation(&nav_shared, &url))
        .with_on_page_load_handler(move |event, url| on_page_load(&load_shared, event, url))
        .with_document_title_changed_handler(move |title| {
            emit(&title_shared, ViewEvent::PageTitleUpdated { title })
        })
        .with_new_window_req_handler(move |url, _features| {
            emit(&window_shared, ViewEvent::NewWindow { url });
            wry::NewWindowResponse::Deny
        })
        .with_devtools(cfg!(debug_assertions));

    if let Some(preload) = &settings.view.preload_script {
        match std::fs::read_to_string(preload) {
            Ok(script) => builder = builder.with_initialization_script(&script),
            Err(e) => warn!(path = %preload.display(), error = %e, "preload script unreadable"),
        }
    }

    #[cfg(target_os = "linux")]
    let webview = {
        use tao::platform::unix::WindowExtUnix;
        use wry::WebViewBuilderExtUnix;
        let vbox = window.default_vbox().ok_or("no GTK container")?;
        builder.build_gtk(vbox)?
    };

    #[cfg(not(target_os = "linux"))]
    let webview = builder.build(&window)?;

    let events = controller.mount(view.clone());
    runtime.spawn(async move {
        controller.run(events).await;
    });
    info!(tab_id = %tab_id, "window ready");

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;
        // keeps the webview data directory alive with the view
        let _ = &web_context;

        match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                lock(&shared).destroyed = true;
                lock(&shared).sink = None;
                if let Err(e) = app.reactor.tabs_changed() {
                    error!(error = %e, "could not save tabs on exit");
                }
                *control_flow = ControlFlow::Exit;
            }
            Event::UserEvent(UserEvent::Load(url)) => {
                debug!(url = %url, "load");
                if let Err(e) = webview.load_url(&url) {
                    warn!(url = %url, error = %e, "load failed");
                }
            }
            Event::UserEvent(UserEvent::Eval(code, reply)) => {
                let result = match reply {
                    Some(reply) => {
                        let reply = Mutex::new(Some(reply));
                        webview.evaluate_script_with_callback(&code, move |value| {
                            if let Some(tx) = reply.lock().ok().and_then(|mut r| r.take()) {
                                let _ = tx.send(value);
                            }
                        })
                    }
                    None => webview.evaluate_script(&code),
                };
                if let Err(e) = result {
                    debug!(error = %e, "script failed");
                }
            }
            Event::UserEvent(UserEvent::Reload) => {
                if let Err(e) = webview.reload() {
                    warn!(error = %e, "reload failed");
                }
            }
            Event::UserEvent(UserEvent::OpenDevTools) => {
                #[cfg(debug_assertions)]
                webview.open_devtools();
            }
            _ => {}
        }
    });
}
