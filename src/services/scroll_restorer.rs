//! Re-applies a remembered scroll offset after back/forward navigation and
//! samples the live offset afterwards.
//!
//! Each view owns at most one scroll task. Starting a new one (or dropping
//! the restorer) aborts the previous task, so a restore loop and a polling
//! loop never run side by side.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tracing::{debug, warn};

use crate::managers::scroll_history::ScrollHistoryCache;
use crate::types::settings::ScrollSettings;
use crate::types::view::EmbeddedView;

const READ_SCROLL_TOP: &str = "document.body.scrollTop";

pub type SharedScrollHistory = Arc<Mutex<ScrollHistoryCache>>;

/// How the active-restoration phase ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RestoreOutcome {
    /// Read-back offset came within tolerance.
    Converged { attempts: u32 },
    /// Every attempt missed; polling took over anyway.
    GaveUp { attempts: u32 },
    /// Nothing to restore, polling started directly.
    Skipped,
}

pub struct ScrollRestorer {
    settings: ScrollSettings,
    cache: SharedScrollHistory,
    task: Option<JoinHandle<()>>,
    outcome: Arc<Mutex<Option<RestoreOutcome>>>,
}

impl ScrollRestorer {
    pub fn new(settings: ScrollSettings) -> Self {
        let cache = ScrollHistoryCache::new(settings.history_capacity);
        Self {
            settings,
            cache: Arc::new(Mutex::new(cache)),
            task: None,
            outcome: Arc::new(Mutex::new(None)),
        }
    }

    pub fn cache(&self) -> SharedScrollHistory {
        Arc::clone(&self.cache)
    }

    /// Outcome of the most recent restoration phase, once it has finished.
    pub fn last_outcome(&self) -> Option<RestoreOutcome> {
        *lock(&self.outcome)
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Starts tracking `url`, cancelling whatever ran for the previous url.
    ///
    /// With `restore` set and a nonzero cached offset, the offset is written
    /// back first; otherwise the passive watcher starts immediately.
    pub fn start(&mut self, view: Arc<dyn EmbeddedView>, url: &str, restore: bool) {
        self.cancel();
        *lock(&self.outcome) = None;

        let target = if restore {
            lock(&self.cache).get(url).filter(|offset| *offset > 0.0)
        } else {
            None
        };

        let job = ScrollJob {
            view,
            cache: Arc::clone(&self.cache),
            settings: self.settings.clone(),
            url: url.to_string(),
            outcome: Arc::clone(&self.outcome),
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => self.task = Some(runtime.spawn(job.run(target))),
            Err(_) => warn!(url = %url, "no runtime, scroll tracking skipped"),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ScrollRestorer {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct ScrollJob {
    view: Arc<dyn EmbeddedView>,
    cache: SharedScrollHistory,
    settings: ScrollSettings,
    url: String,
    outcome: Arc<Mutex<Option<RestoreOutcome>>>,
}

impl ScrollJob {
    async fn run(self, target: Option<f64>) {
        let outcome = match target {
            Some(target) => self.restore(target).await,
            None => RestoreOutcome::Skipped,
        };
        debug!(url = %self.url, ?outcome, "scroll restoration finished");
        *lock(&self.outcome) = Some(outcome);

        self.watch().await;
    }

    async fn restore(&self, target: f64) -> RestoreOutcome {
        // commands issued from within did-navigate are silently dropped
        sleep(Duration::from_millis(self.settings.restore_initial_delay_ms)).await;

        let code = format!(
            "(function () {{ document.body.scrollTop = {}; return document.body.scrollTop }})()",
            target
        );
        let mut attempts = 0;
        loop {
            attempts += 1;
            let actual = self.read(&code).await;
            let converged = actual.is_some_and(|v| (v - target).abs() <= self.settings.restore_tolerance);
            if converged {
                return RestoreOutcome::Converged { attempts };
            }
            if attempts >= self.settings.restore_max_attempts {
                return RestoreOutcome::GaveUp { attempts };
            }
            sleep(Duration::from_millis(self.settings.restore_retry_ms)).await;
        }
    }

    async fn watch(&self) {
        let period = Duration::from_millis(self.settings.poll_interval_ms);
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let Some(scroll_top) = self.read(READ_SCROLL_TOP).await else {
                continue;
            };
            if self.view.src() != self.url {
                // the view navigated while we were waiting for the answer
                continue;
            }
            lock(&self.cache).record(&self.url, scroll_top);
        }
    }

    async fn read(&self, code: &str) -> Option<f64> {
        if self.view.is_destroyed() {
            return None;
        }
        match self.view.execute_javascript(code).await {
            Ok(value) => value.as_f64(),
            Err(e) => {
                warn!(url = %self.url, error = %e, "scroll query failed");
                None
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
