use super::navigation::NavigateOptions;
use super::path::TabPath;
use super::tab_data::{TabDataRecord, ToastExtras};

/// Host-level actions the engine dispatches. Implementations must not block:
/// anything asynchronous is scheduled, not awaited.
pub trait HostActions: Send + Sync {
    /// Opens `path` in a new or existing tab (or retargets the source tab
    /// when `opts.in_place` is set).
    fn navigate(&self, path: TabPath, opts: NavigateOptions, background: bool);
    /// Merges freshly observed data into a tab.
    fn tab_data_fetched(&self, id: &str, data: TabDataRecord, timestamp: i64);
    /// The tab was explicitly reloaded by the user.
    fn tab_reloaded(&self, id: &str);
    fn tab_evolved(&self, id: &str, data: TabDataRecord);
    /// Moves a tab to a new path, resolving its data.
    fn evolve_tab(&self, id: &str, path: TabPath, extras: Option<ToastExtras>);
}
