//! Decides what happens to a navigation attempt inside an embedded view.
//!
//! The hosting runtime may report `will-navigate` twice for a single user
//! action; repeats of the previous destination inside the grace period are
//! treated as echoes.

use tracing::debug;

use crate::types::path::TabPath;

pub const DEFAULT_GRACE_MS: u64 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub enum InterceptorState {
    Idle,
    /// A destination was routed to the host at `timestamp`.
    Pending { url: String, timestamp: u64 },
}

/// Outcome of a `will-navigate` signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    /// Frozen tab: open `path` through host routing and cancel the native
    /// navigation by reloading the tab's current url.
    Redirect { path: TabPath },
    /// Frozen tab, echoed event: cancel natively without routing again.
    SuppressEcho,
    /// Non-frozen tab: let the view navigate and tell the host in place.
    Track { path: TabPath },
    /// Non-frozen tab, echoed event: nothing to do.
    Ignore,
}

impl Interception {
    /// Whether the native navigation must be cancelled (stop + reload of
    /// the current url).
    pub fn cancels_native(&self) -> bool {
        matches!(self, Interception::Redirect { .. } | Interception::SuppressEcho)
    }
}

#[derive(Debug, Clone)]
pub struct NavigationInterceptor {
    state: InterceptorState,
    grace_ms: u64,
}

impl NavigationInterceptor {
    pub fn new(grace_ms: u64) -> Self {
        Self {
            state: InterceptorState::Idle,
            grace_ms,
        }
    }

    pub fn state(&self) -> &InterceptorState {
        &self.state
    }

    pub fn on_will_navigate(&mut self, frozen: bool, url: &str, timestamp: u64) -> Interception {
        if self.is_echo(url, timestamp) {
            debug!(url = %url, timestamp, "duplicate will-navigate absorbed");
            return if frozen {
                Interception::SuppressEcho
            } else {
                Interception::Ignore
            };
        }

        self.state = InterceptorState::Pending {
            url: url.to_string(),
            timestamp,
        };

        let path = TabPath::url(url);
        if frozen {
            Interception::Redirect { path }
        } else {
            Interception::Track { path }
        }
    }

    /// New-window requests always become background tabs.
    pub fn on_new_window(&self, url: &str) -> TabPath {
        TabPath::url(url)
    }

    fn is_echo(&self, url: &str, timestamp: u64) -> bool {
        match &self.state {
            InterceptorState::Idle => false,
            InterceptorState::Pending {
                url: last_url,
                timestamp: last_ts,
            } => last_url == url && timestamp.saturating_sub(*last_ts) < self.grace_ms,
        }
    }
}

impl Default for NavigationInterceptor {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_MS)
    }
}
