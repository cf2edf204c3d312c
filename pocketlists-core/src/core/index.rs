//! Secondary indexes declared on the list-item collection.
//!
//! Every query names its index through [`IndexName`]; there is no lookup by
//! string. [`build_indexes`] creates the indexes in the background after the
//! database is opened, and the [`IndexCatalog`] tracks which of them are usable.

use crate::core::storage::{CollectionName, Database};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use tokio::sync::watch;

/// Declared secondary indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexName {
    /// Items of one list.
    ListId,
    /// Items of one list filtered by done-state.
    ListIdIsDone,
    /// Items of one list looked up by name, sorted by name.
    ListIdName,
}

impl IndexName {
    pub const ALL: [IndexName; 3] = [
        IndexName::ListId,
        IndexName::ListIdIsDone,
        IndexName::ListIdName,
    ];

    pub fn sql_name(self) -> &'static str {
        match self {
            IndexName::ListId => "idx_list_items_list_id",
            IndexName::ListIdIsDone => "idx_list_items_list_id_is_done",
            IndexName::ListIdName => "idx_list_items_list_id_name",
        }
    }

    pub fn collection(self) -> CollectionName {
        CollectionName::ListItems
    }

    /// Indexed document fields, leading field first.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            IndexName::ListId => &["listId"],
            IndexName::ListIdIsDone => &["listId", "isDone"],
            IndexName::ListIdName => &["listId", "name"],
        }
    }

    /// Field that query results through this index are ordered by, if any.
    pub fn sort_field(self) -> Option<&'static str> {
        match self {
            IndexName::ListIdName => Some("name"),
            _ => None,
        }
    }

    fn create_sql(self) -> String {
        let columns: Vec<String> = self.fields().iter().map(|f| field_expr(f)).collect();
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            self.sql_name(),
            self.collection().table(),
            columns.join(", ")
        )
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// SQL expression for a document field. Index definitions and queries must use
/// the exact same expression for SQLite to match them.
pub(crate) fn field_expr(field: &str) -> String {
    format!("json_extract(body, '$.{field}')")
}

/// Build state of one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexState {
    Pending,
    Ready,
    Failed(String),
}

/// Tracks the build state of every [`IndexName`] and signals when the build pass
/// has finished.
pub struct IndexCatalog {
    states: RwLock<HashMap<IndexName, IndexState>>,
    settled_tx: watch::Sender<bool>,
    settled_rx: watch::Receiver<bool>,
}

impl IndexCatalog {
    pub fn new() -> Self {
        let states = IndexName::ALL
            .iter()
            .map(|index| (*index, IndexState::Pending))
            .collect();
        let (settled_tx, settled_rx) = watch::channel(false);
        Self {
            states: RwLock::new(states),
            settled_tx,
            settled_rx,
        }
    }

    pub fn state(&self, index: IndexName) -> IndexState {
        self.states
            .read()
            .ok()
            .and_then(|states| states.get(&index).cloned())
            .unwrap_or(IndexState::Pending)
    }

    pub fn is_ready(&self, index: IndexName) -> bool {
        self.state(index) == IndexState::Ready
    }

    /// Whether the build pass has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        *self.settled_rx.borrow()
    }

    /// Resolves once the build pass has finished. Queries never need to call this;
    /// it exists for hosts that prefer to start with indexed reads.
    pub async fn wait_ready(&self) {
        let mut rx = self.settled_rx.clone();
        // The sender lives as long as `self`, so this only ends when settled.
        let _ = rx.wait_for(|settled| *settled).await;
    }

    fn mark(&self, index: IndexName, state: IndexState) {
        if let Ok(mut states) = self.states.write() {
            states.insert(index, state);
        }
    }

    fn settle(&self) {
        self.settled_tx.send_replace(true);
    }
}

impl Default for IndexCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates every declared index on `db`.
///
/// Creation is idempotent. A failing index is logged and marked
/// [`IndexState::Failed`]; queries through it fall back to table scans. Returns
/// the final state of each index.
pub async fn build_indexes(db: &Database) -> Vec<(IndexName, IndexState)> {
    let mut report = Vec::with_capacity(IndexName::ALL.len());
    for index in IndexName::ALL {
        let sql = index.create_sql();
        let state = match db.with_connection(move |conn| conn.execute_batch(&sql)).await {
            Ok(()) => IndexState::Ready,
            Err(e) => {
                log::warn!("Error creating index {index} on list items [{e}]");
                IndexState::Failed(e.to_string())
            }
        };
        db.catalog().mark(index, state.clone());
        report.push((index, state));
    }
    db.catalog().settle();
    log::info!("index build finished: {report:?}");
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sql_uses_field_expressions() {
        let sql = IndexName::ListIdIsDone.create_sql();
        assert_eq!(
            sql,
            "CREATE INDEX IF NOT EXISTS idx_list_items_list_id_is_done ON list_items \
             (json_extract(body, '$.listId'), json_extract(body, '$.isDone'))"
        );
    }

    #[test]
    fn test_new_catalog_is_pending() {
        let catalog = IndexCatalog::new();
        for index in IndexName::ALL {
            assert_eq!(catalog.state(index), IndexState::Pending);
        }
        assert!(!catalog.is_settled());
    }

    #[tokio::test]
    async fn test_build_marks_every_index_ready() {
        let db = Database::open_in_memory().unwrap();

        let report = build_indexes(&db).await;

        assert_eq!(report.len(), 3);
        assert!(report.iter().all(|(_, state)| *state == IndexState::Ready));
        assert!(db.catalog().is_settled());
        db.catalog().wait_ready().await;
    }

    #[tokio::test]
    async fn test_build_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        build_indexes(&db).await;

        let report = build_indexes(&db).await;

        assert!(report.iter().all(|(_, state)| *state == IndexState::Ready));
    }

    #[tokio::test]
    async fn test_failed_build_is_logged_and_settles() {
        let db = Database::open_in_memory().unwrap();
        db.with_connection(|conn| conn.execute_batch("DROP TABLE list_items"))
            .await
            .unwrap();

        let report = build_indexes(&db).await;

        assert!(report
            .iter()
            .all(|(_, state)| matches!(state, IndexState::Failed(_))));
        assert!(db.catalog().is_settled());
        assert!(!db.catalog().is_ready(IndexName::ListId));
    }
}
