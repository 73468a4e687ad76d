//! Contract between the engine and an embedded web view.
//!
//! The engine never talks to a platform webview directly; the `gui` build
//! adapts `wry` to [`EmbeddedView`], tests use in-memory fakes.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use super::errors::ViewError;

/// Native events emitted by an embedded view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    DidStartLoading,
    DidStopLoading,
    /// `timestamp` is in milliseconds on the view's own clock.
    WillNavigate { url: String, timestamp: u64 },
    DidNavigate { url: String },
    PageTitleUpdated { title: String },
    PageFaviconUpdated { favicons: Vec<String> },
    NewWindow { url: String },
    /// Fired once per document load.
    DomReady,
}

/// Settings applied to a view before its first load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewConfig {
    /// Storage partition; cookies and local storage are isolated per partition.
    pub partition: String,
    pub plugins: bool,
    pub preload: Option<PathBuf>,
}

/// Decision for a request intercepted by a session-level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestVerdict {
    Cancel,
    Proceed,
}

pub type RequestFilter = Arc<dyn Fn(&str) -> RequestVerdict + Send + Sync>;

pub type EventSink = UnboundedSender<ViewEvent>;

/// Listener registration; dropping it unregisters the listener.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[async_trait]
pub trait EmbeddedView: Send + Sync {
    fn configure(&self, config: &ViewConfig);
    fn partition(&self) -> String;
    /// Url currently displayed by the view.
    fn src(&self) -> String;
    /// Whether the content host behind the view has been torn down.
    fn is_destroyed(&self) -> bool;
    fn can_go_back(&self) -> bool;
    fn can_go_forward(&self) -> bool;

    fn stop(&self);
    fn reload(&self);
    fn go_back(&self);
    fn go_forward(&self);
    fn load_url(&self, url: &str);
    fn clear_history(&self);
    fn open_dev_tools(&self);

    async fn execute_javascript(&self, code: &str) -> Result<serde_json::Value, ViewError>;

    fn subscribe(&self, sink: EventSink) -> Subscription;

    /// Installs a filter for every request whose url starts with `origin`
    /// on the view's session. Applies to all views sharing the partition.
    fn install_request_filter(&self, origin: &str, filter: RequestFilter);
}
