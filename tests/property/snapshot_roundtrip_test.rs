//! Property-based tests for tab snapshot persistence.
//!
//! Any set of open tabs survives a save/load/restore cycle with the same
//! ids, order, focus and paths, minus error wrappers.

use std::sync::Arc;

use proptest::prelude::*;
use tabhost::database::Database;
use tabhost::managers::session_manager::{SessionManager, SessionManagerTrait};
use tabhost::managers::tab_manager::{TabManager, TabManagerTrait};
use tabhost::types::path::TabPath;
use tabhost::types::tab_data::TabDataRecord;

fn arb_path() -> impl Strategy<Value = TabPath> {
    prop_oneof![
        (1u64..100_000).prop_map(TabPath::Game),
        (1u64..100_000).prop_map(TabPath::User),
        (1u64..100_000).prop_map(TabPath::Collection),
        "[a-z]{1,10}".prop_map(TabPath::Search),
        ("[a-z]{3,10}", "[a-z0-9/]{0,12}")
            .prop_map(|(host, rest)| TabPath::url(format!("https://{}.com/{}", host, rest))),
    ]
}

/// Paths paired with whether the tab ends up toasted.
fn arb_tabs() -> impl Strategy<Value = Vec<(TabPath, bool)>> {
    proptest::collection::vec((arb_path(), any::<bool>()), 0..12)
}

fn static_tabs() -> Vec<String> {
    vec!["featured".to_string(), "library".to_string()]
}

fn open_all(tabs: &[(TabPath, bool)]) -> TabManager {
    let mut mgr = TabManager::new(&static_tabs());
    for (path, toasted) in tabs {
        let id = mgr.open_tab(path.clone(), false);
        if *toasted {
            mgr.apply_evolved(&id, TabDataRecord::default().with_path(path.clone().toast()))
                .unwrap();
        }
    }
    mgr
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn snapshot_survives_storage(tabs in arb_tabs()) {
        let db = Arc::new(Database::open_in_memory().expect("in-memory database"));
        let sessions = SessionManager::new(db);
        let snapshot = open_all(&tabs).snapshot();

        sessions.save_snapshot(&snapshot).unwrap();
        prop_assert_eq!(sessions.load_snapshot().unwrap(), Some(snapshot));
    }

    #[test]
    fn restore_reopens_untoasted_tabs(tabs in arb_tabs()) {
        let original = open_all(&tabs);
        let snapshot = original.snapshot();

        prop_assert_eq!(snapshot.items.len(), tabs.len());
        for item in &snapshot.items {
            prop_assert!(!item.path.starts_with("toast/"));
        }

        let mut restored = TabManager::new(&static_tabs());
        restored.restore(&snapshot);

        prop_assert_eq!(restored.current_id(), original.current_id());
        let before: Vec<(String, TabPath)> = original
            .get_all_tabs()
            .iter()
            .map(|t| (t.id.clone(), t.path.untoasted().clone()))
            .collect();
        let after: Vec<(String, TabPath)> = restored
            .get_all_tabs()
            .iter()
            .map(|t| (t.id.clone(), t.path.clone()))
            .collect();
        prop_assert_eq!(after, before);
    }

    #[test]
    fn restore_is_idempotent(tabs in arb_tabs()) {
        let snapshot = open_all(&tabs).snapshot();
        let mut mgr = TabManager::new(&static_tabs());
        mgr.restore(&snapshot);
        mgr.restore(&snapshot);
        prop_assert_eq!(mgr.tab_count(), static_tabs().len() + tabs.len());
    }
}
