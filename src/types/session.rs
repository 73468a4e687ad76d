use serde::{Deserialize, Serialize};

/// Persisted set of open tabs, restored once per authenticated session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub current: Option<String>,
    pub items: Vec<SnapshotItem>,
}

/// A tab as stored in a snapshot. `path` never carries a toast prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotItem {
    pub id: String,
    pub path: String,
}
