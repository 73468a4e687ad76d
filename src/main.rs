//! tabhost: tab navigation and view lifecycle engine.
//!
//! With the `gui` feature the binary opens a window hosting the current tab.
//! Without it, it walks through the engine against an offline catalog.

use tracing_subscriber::EnvFilter;

fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[cfg(feature = "gui")]
fn main() {
    use tabhost::services::settings_engine::{SettingsEngine, SettingsEngineTrait};

    let mut engine = SettingsEngine::new(None);
    let (settings, load_error) = match engine.load() {
        Ok(settings) => (settings, None),
        Err(e) => (tabhost::types::settings::EngineSettings::default(), Some(e)),
    };
    init_tracing(&settings.log_level);
    if let Some(e) = load_error {
        tracing::warn!(path = %engine.get_config_path().display(), error = %e, "settings unreadable, using defaults");
    }

    let account = std::env::args().nth(1).unwrap_or_else(|| "anonymous".to_string());
    if let Err(e) = tabhost::ui::webview_app::run(settings, &account) {
        tracing::error!(error = %e, "tabhost failed");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "gui"))]
#[tokio::main]
async fn main() {
    init_tracing("tabhost=debug");
    if let Err(e) = demo::run().await {
        tracing::error!(error = %e, "demo failed");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "gui"))]
mod demo {
    use std::collections::HashMap;
    use std::error::Error;
    use std::sync::Arc;

    use async_trait::async_trait;

    use tabhost::app::App;
    use tabhost::database::Database;
    use tabhost::managers::tab_manager::TabManagerTrait;
    use tabhost::services::entity_fetcher::EntitySource;
    use tabhost::services::internal_channel::InternalChannelRouter;
    use tabhost::services::page_analyzer::PageAnalyzer;
    use tabhost::services::tab_data_resolver::ResolveOptions;
    use tabhost::services::url_resolver::UrlResolver;
    use tabhost::types::entities::{Collection, Game, User};
    use tabhost::types::errors::FetchError;
    use tabhost::types::host::HostActions;
    use tabhost::types::navigation::NavigateOptions;
    use tabhost::types::path::TabPath;
    use tabhost::types::settings::EngineSettings;

    /// In-memory stand-in for the remote API.
    struct Catalog {
        games: HashMap<u64, Game>,
    }

    #[async_trait]
    impl EntitySource for Catalog {
        async fn game(&self, id: u64, _fresh: bool) -> Result<Option<Game>, FetchError> {
            if id == 500 {
                return Err(FetchError::Api {
                    status: 500,
                    message: "internal server error".to_string(),
                });
            }
            Ok(self.games.get(&id).cloned())
        }

        async fn user(&self, id: u64, _fresh: bool) -> Result<Option<User>, FetchError> {
            Ok(Some(User {
                id,
                username: format!("user{}", id),
                display_name: None,
                cover_url: None,
            }))
        }

        async fn collection(&self, _id: u64, _fresh: bool) -> Result<Option<Collection>, FetchError> {
            Ok(None)
        }

        async fn collection_games(&self, _id: u64) -> Result<Vec<Game>, FetchError> {
            Ok(Vec::new())
        }
    }

    struct NoAnalysis;

    #[async_trait]
    impl PageAnalyzer for NoAnalysis {
        async fn analyze(&self, _url: &str) -> Result<Option<TabPath>, FetchError> {
            Ok(None)
        }
    }

    fn section(name: &str) {
        println!();
        println!("== {} ==", name);
    }

    fn print_tabs(app: &App) {
        let tabs = app.tabs.lock().unwrap_or_else(|p| p.into_inner());
        for tab in tabs.get_all_tabs() {
            let marker = if tabs.current_id() == Some(tab.id.as_str()) { "*" } else { " " };
            println!("  {} {:<38} {:<28} {:?}", marker, tab.id, tab.path.to_string(), tab.data.label);
        }
    }

    pub async fn run() -> Result<(), Box<dyn Error>> {
        let settings = EngineSettings::default();
        let db = Arc::new(Database::open_in_memory()?);
        let mut games = HashMap::new();
        games.insert(
            42,
            Game {
                id: 42,
                title: "A Short Hike".to_string(),
                cover_url: Some("https://img.itch.zone/42.png".to_string()),
                url: Some("https://adamgryu.itch.io/a-short-hike".to_string()),
            },
        );
        let app = App::with_parts(settings.clone(), db, Arc::new(Catalog { games }), Arc::new(NoAnalysis))?;

        section("Session");
        let restored = app.session_ready().await?;
        println!("  restored {} tabs, saving: {}", restored, app.reactor.is_saving());

        section("Routing");
        let navigator = Arc::clone(&app.navigator);
        navigator.navigate(TabPath::Game(42), NavigateOptions::default(), false);
        navigator.navigate(TabPath::url("https://example.com/"), NavigateOptions::default(), true);
        navigator.navigate(TabPath::Game(500), NavigateOptions::default(), false);
        tokio::task::yield_now().await;

        let ids: Vec<String> = {
            let tabs = app.tabs.lock().unwrap_or_else(|p| p.into_inner());
            tabs.get_all_tabs().iter().filter(|t| !t.frozen).map(|t| t.id.clone()).collect()
        };
        let resolver = app.reactor.resolver();
        for id in &ids {
            let outcome = resolver.fetch_tab_data(id, ResolveOptions::default()).await;
            println!("  {} -> {:?}", id, outcome);
        }
        print_tabs(&app);

        section("Frozen tabs");
        let outcome = resolver
            .fetch_tab_data("library", ResolveOptions::for_path(TabPath::Game(42)))
            .await;
        println!("  library asked for games/42 -> {:?}", outcome);

        section("Address bar");
        let urls = UrlResolver::new(&settings.navigation);
        for input in ["itch.io/games", "https://example.com", "cozy puzzle games", ""] {
            println!("  {:<22} -> {}", format!("{:?}", input), urls.resolve_input(input));
        }

        section("Internal channel");
        let router = InternalChannelRouter::new(&settings.navigation.internal_origin)?;
        for url in [
            "https://itch-internal/evolve-tab?tabId=t1&path=games/42",
            "https://itch-internal/analyze-page?tabId=t1&url=https%3A%2F%2Fitch.io%2F",
            "https://itch-internal/unknown",
        ] {
            println!("  {} -> {:?}", url, router.parse(url)?);
        }

        section("Snapshot");
        let saved = app.reactor.tabs_changed()?;
        let snapshot = app.tabs.lock().unwrap_or_else(|p| p.into_inner()).snapshot();
        println!("  saved: {}, items: {:?}", saved, snapshot.items);
        app.logout();
        println!("  after logout, saved: {}", app.reactor.tabs_changed()?);

        Ok(())
    }
}
