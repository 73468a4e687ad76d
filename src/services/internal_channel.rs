//! Private command channel from hosted web content to the host.
//!
//! Hosted pages call into the host by requesting urls under a reserved
//! pseudo-origin (`https://itch-internal/evolve-tab?tabId=..&path=..`).
//! Every such request is cancelled before it reaches the network; its path
//! and query are parsed as a command instead.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use url::Url;

use crate::types::errors::ChannelError;
use crate::types::path::TabPath;
use crate::types::view::{RequestFilter, RequestVerdict};

#[derive(Debug, Clone, PartialEq)]
pub enum InternalCommand {
    OpenDevTools,
    /// Fetch `url` out of band and re-route the tab to the path it declares.
    AnalyzePage { url: String },
    EvolveTab { path: TabPath },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InternalRequest {
    pub tab_id: Option<String>,
    pub command: InternalCommand,
}

/// Receiver of commands arriving over the internal channel.
pub trait ChannelHandler: Send + Sync {
    fn open_dev_tools(&self, tab_id: Option<&str>);
    fn analyze_page(&self, tab_id: &str, url: &str);
    fn evolve_tab(&self, tab_id: &str, path: TabPath);
}

pub struct InternalChannelRouter {
    origin: Url,
}

impl InternalChannelRouter {
    pub fn new(origin: &str) -> Result<Self, ChannelError> {
        let origin = Url::parse(origin).map_err(|e| ChannelError::Malformed(e.to_string()))?;
        if origin.host_str().is_none() {
            return Err(ChannelError::Malformed(format!("origin without host: {}", origin)));
        }
        Ok(Self { origin })
    }

    /// Pattern to register with the view session (`https://itch-internal/*`).
    pub fn filter_pattern(&self) -> String {
        format!("{}*", self.origin)
    }

    pub fn matches(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(url) => {
                url.scheme() == self.origin.scheme()
                    && url.host_str() == self.origin.host_str()
                    && url.port_or_known_default() == self.origin.port_or_known_default()
            }
            Err(_) => false,
        }
    }

    /// Parses a channel url. `Ok(None)` means a well-formed request for a
    /// command the host does not know.
    pub fn parse(&self, raw: &str) -> Result<Option<InternalRequest>, ChannelError> {
        let url = Url::parse(raw).map_err(|e| ChannelError::Malformed(e.to_string()))?;
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };
        let tab_id = param("tabId");

        let command = match url.path() {
            "/open-devtools" => InternalCommand::OpenDevTools,
            "/analyze-page" => InternalCommand::AnalyzePage {
                url: param("url").ok_or(ChannelError::MissingParam("url"))?,
            },
            "/evolve-tab" => InternalCommand::EvolveTab {
                path: TabPath::parse(&param("path").ok_or(ChannelError::MissingParam("path"))?),
            },
            _ => return Ok(None),
        };

        Ok(Some(InternalRequest { tab_id, command }))
    }

    /// Session-level request hook. Channel urls are always cancelled; other
    /// urls proceed untouched.
    pub fn on_before_request(&self, url: &str, handler: &dyn ChannelHandler) -> RequestVerdict {
        if !self.matches(url) {
            return RequestVerdict::Proceed;
        }

        match self.parse(url) {
            Ok(Some(request)) => Self::dispatch(request, handler),
            Ok(None) => debug!(url = %url, "unknown internal command ignored"),
            Err(e) => warn!(url = %url, error = %e, "malformed internal request ignored"),
        }
        RequestVerdict::Cancel
    }

    fn dispatch(request: InternalRequest, handler: &dyn ChannelHandler) {
        info!(tab_id = ?request.tab_id, command = ?request.command, "internal command");
        let tab_id = request.tab_id.as_deref();
        match request.command {
            InternalCommand::OpenDevTools => handler.open_dev_tools(tab_id),
            InternalCommand::AnalyzePage { url } => match tab_id {
                Some(id) => handler.analyze_page(id, &url),
                None => warn!("analyze-page without tabId ignored"),
            },
            InternalCommand::EvolveTab { path } => match tab_id {
                Some(id) => handler.evolve_tab(id, path),
                None => warn!("evolve-tab without tabId ignored"),
            },
        }
    }

    /// Wraps the router into a filter suitable for
    /// [`EmbeddedView::install_request_filter`](crate::types::view::EmbeddedView::install_request_filter).
    pub fn request_filter(self: &Arc<Self>, handler: Arc<dyn ChannelHandler>) -> RequestFilter {
        let router = Arc::clone(self);
        Arc::new(move |url: &str| router.on_before_request(url, handler.as_ref()))
    }
}

/// Tracks which storage partition currently has the channel installed.
///
/// The partition is shared by every tab of an account; the filter is set up
/// once per session, when the first view of a new partition becomes ready.
#[derive(Debug, Default)]
pub struct SessionContext {
    current: Mutex<Option<String>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `partition` active. Returns `true` when it differs from the
    /// previously active partition and the channel must be wired for it.
    pub fn activate(&self, partition: &str) -> bool {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        if current.as_deref() == Some(partition) {
            return false;
        }
        *current = Some(partition.to_string());
        true
    }

    pub fn current(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}
