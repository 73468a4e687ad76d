mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Call, HostCall, MockView, RecordingHost, StaticAnalyzer};
use tabhost::managers::view_controller::{ViewContext, ViewLifecycleController, BLANK_URL};
use tabhost::services::internal_channel::{InternalChannelRouter, SessionContext};
use tabhost::services::scroll_restorer::RestoreOutcome;
use tabhost::types::navigation::NavigateOptions;
use tabhost::types::path::TabPath;
use tabhost::types::settings::EngineSettings;
use tabhost::types::tab_data::TabDataRecord;
use tabhost::types::view::{RequestVerdict, ViewConfig, ViewEvent};

const GAME_PAGE: &str = "https://adamgryu.itch.io/a-short-hike";

struct Harness {
    host: Arc<RecordingHost>,
    session: Arc<SessionContext>,
    analyzer: Arc<StaticAnalyzer>,
}

impl Harness {
    fn new() -> Self {
        let mut analyzer = StaticAnalyzer::default();
        analyzer.pages.insert(GAME_PAGE.to_string(), TabPath::Game(42));
        Self {
            host: RecordingHost::new(),
            session: Arc::new(SessionContext::new()),
            analyzer: Arc::new(analyzer),
        }
    }

    fn context(&self) -> ViewContext {
        ViewContext {
            host: self.host.clone(),
            session: Arc::clone(&self.session),
            channel: Arc::new(InternalChannelRouter::new("https://itch-internal").unwrap()),
            analyzer: self.analyzer.clone(),
        }
    }

    fn controller(&self, tab_id: &str, frozen: bool, url: Option<&str>) -> ViewLifecycleController {
        self.controller_for_account(tab_id, frozen, url, "1")
    }

    fn controller_for_account(
        &self,
        tab_id: &str,
        frozen: bool,
        url: Option<&str>,
        account: &str,
    ) -> ViewLifecycleController {
        ViewLifecycleController::new(
            tab_id,
            frozen,
            url.map(str::to_string),
            account,
            &EngineSettings::default(),
            self.context(),
        )
    }
}

/// Mounts a fresh mock view and runs the first dom-ready.
fn ready(controller: &mut ViewLifecycleController) -> Arc<MockView> {
    let view = MockView::new();
    let _events = controller.mount(view.clone());
    controller.handle_event(ViewEvent::DomReady);
    view
}

async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

fn will_navigate(url: &str, timestamp: u64) -> ViewEvent {
    ViewEvent::WillNavigate {
        url: url.to_string(),
        timestamp,
    }
}

fn from(source: &str, in_place: bool) -> NavigateOptions {
    NavigateOptions {
        source_tab: Some(source.to_string()),
        in_place,
    }
}

#[tokio::test]
async fn mount_configures_partition_and_starts_blank() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = MockView::new();
    let _events = controller.mount(view.clone());

    assert_eq!(
        view.calls(),
        vec![
            Call::Configure(ViewConfig {
                partition: "persist:itchio-1".to_string(),
                plugins: true,
                preload: None,
            }),
            Call::Load(BLANK_URL.to_string()),
        ]
    );
    assert!(view.is_subscribed());
    assert!(controller.state().loading);
    assert!(controller.state().first_load);
    assert!(!controller.is_initialized());
}

#[test]
fn empty_tab_id_is_frozen() {
    let harness = Harness::new();
    assert!(harness.controller("", false, None).is_frozen());
    assert!(!harness.controller("t1", false, None).is_frozen());
}

#[tokio::test]
async fn first_dom_ready_wires_view_once() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, Some("https://example.com/page"));
    let view = ready(&mut controller);

    assert!(controller.is_initialized());
    assert!(!controller.state().loading);
    assert_eq!(
        &view.calls()[2..],
        &[
            Call::InstallFilter("https://itch-internal/*".to_string()),
            Call::Load("https://example.com/page".to_string()),
            Call::ClearHistory,
        ]
    );

    view.clear_calls();
    controller.handle_event(ViewEvent::DomReady);
    settle().await;

    let init = Call::Script(r#"window.__itchInit && window.__itchInit("t1")"#.to_string());
    assert_eq!(view.calls(), vec![init.clone(), init]);
}

#[tokio::test]
async fn blank_tab_url_is_not_loaded() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, Some(BLANK_URL));
    let view = ready(&mut controller);
    assert_eq!(view.loads(), vec![BLANK_URL.to_string()]);
}

#[tokio::test]
async fn channel_is_wired_once_per_partition() {
    let harness = Harness::new();
    let mut first = harness.controller("t1", false, None);
    let mut second = harness.controller("t2", false, None);
    let mut other_account = harness.controller_for_account("t3", false, None, "2");

    let installs = |view: &MockView| {
        view.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::InstallFilter(_)))
            .count()
    };
    assert_eq!(installs(&ready(&mut first)), 1);
    assert_eq!(installs(&ready(&mut second)), 0);
    assert_eq!(installs(&ready(&mut other_account)), 1);
    assert_eq!(harness.session.current().as_deref(), Some("persist:itchio-2"));
}

#[tokio::test]
async fn frozen_tab_redirects_and_returns_to_its_page() {
    let harness = Harness::new();
    let mut controller = harness.controller("library", true, Some("https://static.example/library"));
    let view = ready(&mut controller);
    view.clear_calls();

    controller.handle_event(will_navigate("https://example.com/login", 1000));

    assert_eq!(
        harness.host.navigations(),
        vec![(TabPath::url("https://example.com/login"), from("library", false), false)]
    );
    assert_eq!(
        view.calls(),
        vec![Call::Stop, Call::Load("https://static.example/library".to_string())]
    );
}

#[tokio::test]
async fn frozen_tab_echo_is_cancelled_without_rerouting() {
    let harness = Harness::new();
    let mut controller = harness.controller("library", true, Some("https://static.example/library"));
    let view = ready(&mut controller);

    controller.handle_event(will_navigate("https://example.com/login", 1000));
    view.clear_calls();
    controller.handle_event(will_navigate("https://example.com/login", 1500));

    assert_eq!(harness.host.navigations().len(), 1);
    assert_eq!(
        view.calls(),
        vec![Call::Stop, Call::Load("https://static.example/library".to_string())]
    );

    controller.handle_event(will_navigate("https://example.com/login", 5000));
    assert_eq!(harness.host.navigations().len(), 2);
}

#[tokio::test]
async fn regular_tab_navigates_natively_and_retargets_in_place() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);
    view.clear_calls();

    controller.handle_event(will_navigate("https://example.com/login", 1000));
    controller.handle_event(will_navigate("https://example.com/login", 1200));

    assert_eq!(
        harness.host.navigations(),
        vec![(TabPath::url("https://example.com/login"), from("t1", true), false)]
    );
    assert!(view.calls().is_empty());
}

#[tokio::test]
async fn new_window_opens_background_tab() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    ready(&mut controller);

    controller.handle_event(ViewEvent::NewWindow {
        url: "https://example.com/popup".to_string(),
    });

    assert_eq!(
        harness.host.navigations(),
        vec![(TabPath::url("https://example.com/popup"), from("t1", false), true)]
    );
}

#[tokio::test]
async fn title_and_favicon_update_tab_data() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    ready(&mut controller);

    controller.handle_event(ViewEvent::PageTitleUpdated {
        title: "Example".to_string(),
    });
    controller.handle_event(ViewEvent::PageFaviconUpdated { favicons: Vec::new() });
    controller.handle_event(ViewEvent::PageFaviconUpdated {
        favicons: vec!["https://example.com/a.ico".to_string(), "https://example.com/b.ico".to_string()],
    });

    assert_eq!(
        harness.host.calls(),
        vec![
            HostCall::DataFetched {
                id: "t1".to_string(),
                data: TabDataRecord {
                    web_title: Some("Example".to_string()),
                    ..TabDataRecord::default()
                },
            },
            HostCall::DataFetched {
                id: "t1".to_string(),
                data: TabDataRecord {
                    web_favicon: Some("https://example.com/a.ico".to_string()),
                    ..TabDataRecord::default()
                },
            },
        ]
    );
}

#[tokio::test]
async fn loading_flags_follow_view_events() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);

    view.set_history(true, false);
    controller.handle_event(ViewEvent::DidStartLoading);
    assert!(controller.state().loading);
    assert!(controller.state().can_go_back);
    assert!(!controller.state().can_go_forward);

    // blank page does not count as a first load
    controller.handle_event(ViewEvent::DidStopLoading);
    assert!(!controller.state().loading);
    assert!(controller.state().first_load);

    view.set_src("https://example.com/");
    controller.handle_event(ViewEvent::DidStopLoading);
    assert!(!controller.state().first_load);
}

#[tokio::test(start_paused = true)]
async fn back_navigation_restores_scroll() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);
    controller.scroll().cache().lock().unwrap().record("https://example.com/list", 640.0);

    view.set_history(false, false);
    controller.go_back();
    assert!(!view.calls().contains(&Call::GoBack));

    view.set_history(true, false);
    controller.go_back();
    assert!(view.calls().contains(&Call::GoBack));

    view.set_src("https://example.com/list");
    controller.handle_event(ViewEvent::DidNavigate {
        url: "https://example.com/list".to_string(),
    });
    assert_eq!(controller.state().url, "https://example.com/list");

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(
        controller.scroll().last_outcome(),
        Some(RestoreOutcome::Converged { attempts: 1 })
    );
    assert_eq!(view.scroll_writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn plain_navigation_does_not_restore_scroll() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);
    controller.scroll().cache().lock().unwrap().record("https://example.com/list", 640.0);

    view.set_src("https://example.com/list");
    controller.handle_event(ViewEvent::DidNavigate {
        url: "https://example.com/list".to_string(),
    });

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(controller.scroll().last_outcome(), Some(RestoreOutcome::Skipped));
    assert_eq!(view.scroll_writes(), 0);
}

#[test]
fn did_navigate_outside_a_runtime_does_not_panic() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);

    view.set_src("https://example.com/list");
    controller.handle_event(ViewEvent::DidNavigate {
        url: "https://example.com/list".to_string(),
    });
    assert!(!controller.scroll().is_active());
}

#[tokio::test]
async fn did_navigate_analyzes_page_for_regular_tabs() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    ready(&mut controller);

    controller.handle_event(ViewEvent::DidNavigate {
        url: GAME_PAGE.to_string(),
    });
    settle().await;

    assert_eq!(
        harness.host.calls(),
        vec![HostCall::EvolveTab {
            id: "t1".to_string(),
            path: TabPath::Game(42),
            extras: None,
        }]
    );
}

#[tokio::test]
async fn frozen_tabs_skip_page_analysis() {
    let harness = Harness::new();
    let mut controller = harness.controller("library", true, None);
    ready(&mut controller);

    controller.handle_event(ViewEvent::DidNavigate {
        url: GAME_PAGE.to_string(),
    });
    settle().await;

    assert!(harness.host.calls().is_empty());
}

#[tokio::test]
async fn internal_channel_requests_reach_the_host() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);
    view.clear_calls();

    assert_eq!(
        view.request("https://itch-internal/evolve-tab?tabId=t1&path=users/3"),
        Some(RequestVerdict::Cancel)
    );
    assert_eq!(view.request("https://itch-internal/open-devtools"), Some(RequestVerdict::Cancel));
    assert_eq!(view.request("https://itch.io/"), Some(RequestVerdict::Proceed));

    assert_eq!(
        harness.host.calls(),
        vec![HostCall::EvolveTab {
            id: "t1".to_string(),
            path: TabPath::User(3),
            extras: None,
        }]
    );
    assert_eq!(view.calls(), vec![Call::OpenDevTools]);
}

#[tokio::test]
async fn analyze_page_command_evolves_tab() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);

    let url = format!(
        "https://itch-internal/analyze-page?tabId=t1&url={}",
        url::form_urlencoded::byte_serialize(GAME_PAGE.as_bytes()).collect::<String>()
    );
    assert_eq!(view.request(&url), Some(RequestVerdict::Cancel));
    settle().await;

    assert_eq!(
        harness.host.calls(),
        vec![HostCall::EvolveTab {
            id: "t1".to_string(),
            path: TabPath::Game(42),
            extras: None,
        }]
    );
}

#[tokio::test]
async fn reload_refreshes_tab_data() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);

    controller.reload();
    assert!(view.calls().contains(&Call::Reload));
    assert_eq!(harness.host.calls(), vec![HostCall::Reloaded("t1".to_string())]);
}

#[tokio::test]
async fn stop_forward_and_devtools_reach_the_view() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);
    view.clear_calls();

    view.set_history(false, true);
    controller.stop();
    controller.go_forward();
    controller.open_dev_tools();

    assert_eq!(view.calls(), vec![Call::Stop, Call::GoForward, Call::OpenDevTools]);
}

#[tokio::test]
async fn frozen_tab_routes_native_urls_through_host() {
    let harness = Harness::new();
    let mut controller = harness.controller("library", true, None);
    let view = ready(&mut controller);
    view.clear_calls();

    controller.load_url("https://itch.io/games");
    assert_eq!(
        harness.host.navigations(),
        vec![(TabPath::url("https://itch.io/games"), NavigateOptions::default(), false)]
    );
    assert!(view.loads().is_empty());

    controller.load_url("https://example.com/");
    assert_eq!(view.loads(), vec!["https://example.com/".to_string()]);
    assert_eq!(controller.state().url, "https://example.com/");
}

#[tokio::test]
async fn user_input_is_normalized_before_loading() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);
    view.clear_calls();

    controller.load_user_url("example.com/about");
    controller.load_user_url("cozy games");

    assert_eq!(
        view.loads(),
        vec![
            "https://example.com/about".to_string(),
            "https://itch.io/search?q=cozy+games".to_string(),
        ]
    );
}

#[tokio::test]
async fn props_change_loads_only_over_blank_page() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);
    view.clear_calls();

    controller.props_changed(Some("https://example.com/one".to_string()));
    controller.props_changed(Some("https://example.com/two".to_string()));
    controller.props_changed(None);

    assert_eq!(view.loads(), vec!["https://example.com/one".to_string()]);
}

#[tokio::test]
async fn destroyed_view_ignores_everything() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, Some("https://example.com/"));
    let view = MockView::new();
    let _events = controller.mount(view.clone());
    view.destroy();
    view.clear_calls();

    controller.handle_event(ViewEvent::DomReady);
    controller.handle_event(will_navigate("https://example.com/x", 1));
    view.set_history(true, true);
    controller.go_back();
    controller.load_url("https://example.com/y");

    assert!(!controller.is_initialized());
    assert!(view.calls().is_empty());
    assert!(harness.host.calls().is_empty());
}

#[tokio::test]
async fn unmount_releases_listeners() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);
    assert!(view.is_subscribed());

    controller.unmount();
    assert!(!view.is_subscribed());
    assert!(!controller.is_initialized());

    view.clear_calls();
    controller.handle_event(ViewEvent::DomReady);
    assert!(view.calls().is_empty());
}

#[tokio::test]
async fn dropping_controller_unsubscribes() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = ready(&mut controller);

    drop(controller);
    assert!(!view.is_subscribed());
}

#[tokio::test]
async fn run_drains_events_until_stream_closes() {
    let harness = Harness::new();
    let mut controller = harness.controller("t1", false, None);
    let view = MockView::new();
    let events = controller.mount(view.clone());

    view.emit(ViewEvent::DomReady);
    view.emit(ViewEvent::DidStartLoading);
    view.close_events();
    controller.run(events).await;

    assert!(controller.is_initialized());
    assert!(controller.state().loading);
}
