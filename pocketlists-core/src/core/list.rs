//! Named checklists and their repository.
//!
//! A list document carries no fields: its id is the name the user typed. Deleting
//! a list erases its items first and only then removes the list, so a failure
//! never leaves items behind a deleted list.

use crate::core::index::IndexName;
use crate::core::list_item::{ListItemFields, ListItemsRepository};
use crate::core::preferences::PreferencesStore;
use crate::core::storage::{Collection, CollectionName, Document, DocumentFields, Query};
use crate::{PocketListsError, Result, Revision};
use serde::{Deserialize, Serialize};

/// A list as handed to the UI. The id is the list's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: String,
    pub rev: Revision,
}

/// Stored fields of a list document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListFields {}

impl DocumentFields for ListFields {
    const COLLECTION: CollectionName = CollectionName::Lists;
}

impl From<Document<ListFields>> for List {
    fn from(doc: Document<ListFields>) -> Self {
        Self {
            id: doc.id,
            rev: doc.rev,
        }
    }
}

/// Result of [`ListsRepository::import_from_text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub list: List,
    /// Number of rows stored as items.
    pub imported: usize,
    /// Rows that could not be stored, as `"{id}: {reason}"`.
    pub rejected: Vec<String>,
}

/// CRUD over list documents, with cascading delete of their items.
#[derive(Clone)]
pub struct ListsRepository {
    lists: Collection<ListFields>,
    items: ListItemsRepository,
    preferences: PreferencesStore,
}

impl ListsRepository {
    pub fn new(
        lists: Collection<ListFields>,
        items: ListItemsRepository,
        preferences: PreferencesStore,
    ) -> Self {
        Self {
            lists,
            items,
            preferences,
        }
    }

    pub async fn find_all(&self) -> Result<Vec<List>> {
        let docs = self.lists.all_docs().await.map_err(|e| {
            log::warn!("find lists failed: {e}");
            e
        })?;
        Ok(docs.into_iter().map(List::from).collect())
    }

    /// Whether a list called `name` exists.
    ///
    /// A lookup failure other than "not found" answers `true`, so a broken store
    /// can never let a duplicate name through.
    pub async fn name_exists(&self, name: &str) -> bool {
        match self.lists.get(name).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                log::warn!("list name check for {name} failed, assuming it exists: {e}");
                true
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`PocketListsError::DuplicateName`] if a list with this name exists.
    pub async fn create(&self, name: &str) -> Result<List> {
        match self.lists.put(name, None, &ListFields {}).await {
            Ok(rev) => Ok(List {
                id: name.to_string(),
                rev,
            }),
            Err(e) if e.is_conflict() => Err(PocketListsError::DuplicateName(name.to_string())),
            Err(e) => {
                log::warn!("create list {name} failed: {e}");
                Err(e)
            }
        }
    }

    /// Creates list `name` and then all `(is_done, item_name)` rows as its items in
    /// one batch.
    ///
    /// Import is best effort: rows the store rejects are logged and reported in the
    /// summary, and neither the list nor the stored rows are rolled back.
    pub async fn import_from_text(&self, name: &str, rows: &[(bool, String)]) -> Result<ImportSummary> {
        let list = self.create(name).await?;
        let outcomes = self.items.bulk_create(&list.id, rows).await.map_err(|e| {
            log::warn!("import into {name} failed: {e}");
            e
        })?;

        let mut imported = 0;
        let mut rejected = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(_) => imported += 1,
                Err(e) => rejected.push(format!("{}: {e}", outcome.id)),
            }
        }
        if !rejected.is_empty() {
            log::warn!("Could not import the following items into {name}: {rejected:?}");
        }
        Ok(ImportSummary {
            list,
            imported,
            rejected,
        })
    }

    /// Deletes every item of the list, then the list itself and its hide-done flag.
    ///
    /// The list revision is checked before any item is touched. If the items cannot
    /// all be erased the list is left as it was and the call can be retried. The
    /// list is removed in the same transaction that erases items created while the
    /// first pass ran.
    ///
    /// # Errors
    ///
    /// Returns [`PocketListsError::NotFound`] / [`PocketListsError::Conflict`] for a
    /// missing list or stale revision, and [`PocketListsError::CascadeDelete`] when
    /// the items could not be erased.
    pub async fn delete(&self, id: &str, rev: &Revision) -> Result<Revision> {
        let current = self.lists.get(id).await.map_err(|e| {
            log::warn!("delete list {id} failed: {e}");
            e
        })?;
        if &current.rev != rev {
            return Err(PocketListsError::Conflict(format!(
                "{id}: revision {rev} is stale, current is {}",
                current.rev
            )));
        }

        let erased = self.items.purge_list(id).await.map_err(|e| {
            log::warn!("Failed to delete all items of list {id}: {e}");
            PocketListsError::CascadeDelete {
                list_id: id.to_string(),
                reason: e.to_string(),
            }
        })?;
        log::debug!("erased {erased} items before deleting list {id}");

        let children = Query::on(IndexName::ListId).eq("listId", id);
        let (tombstone, late) = self
            .lists
            .remove_with_children::<ListItemFields>(id, rev, children)
            .await
            .map_err(|e| {
                log::warn!("delete list {id} failed after erasing its items: {e}");
                match e {
                    PocketListsError::StoreWrite(reason) => PocketListsError::CascadeDelete {
                        list_id: id.to_string(),
                        reason,
                    },
                    other => other,
                }
            })?;
        if late > 0 {
            log::debug!("erased {late} items added to {id} during delete");
        }

        if let Err(e) = self.preferences.clear_hide_done(id).await {
            log::warn!("list {id} deleted but its hide done flag was kept: {e}");
        }
        Ok(tombstone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::IdGenerator;
    use crate::{build_indexes, Database};
    use std::sync::Arc;

    async fn setup() -> (Database, ListsRepository, ListItemsRepository) {
        let db = Database::open_in_memory().unwrap();
        build_indexes(&db).await;
        let items = ListItemsRepository::new(db.collection(), Arc::new(IdGenerator::new()));
        let preferences = PreferencesStore::new(db.collection());
        let lists = ListsRepository::new(db.collection(), items.clone(), preferences);
        (db, lists, items)
    }

    #[tokio::test]
    async fn test_create_twice_is_duplicate_name() {
        let (_db, lists, _) = setup().await;
        lists.create("Groceries").await.unwrap();

        let err = lists.create("Groceries").await.unwrap_err();
        assert!(matches!(err, PocketListsError::DuplicateName(name) if name == "Groceries"));
    }

    #[tokio::test]
    async fn test_name_exists_after_create_only() {
        let (_db, lists, _) = setup().await;
        lists.create("Groceries").await.unwrap();

        assert!(lists.name_exists("Groceries").await);
        assert!(!lists.name_exists("Hardware").await);
    }

    #[tokio::test]
    async fn test_name_exists_fails_safe_when_store_breaks() {
        let (db, lists, _) = setup().await;
        db.with_connection(|conn| conn.execute_batch("DROP TABLE lists"))
            .await
            .unwrap();

        assert!(lists.name_exists("Anything").await);
    }

    #[tokio::test]
    async fn test_find_all_returns_ids_and_revisions() {
        let (_db, lists, _) = setup().await;
        let a = lists.create("A").await.unwrap();
        let b = lists.create("B").await.unwrap();

        assert_eq!(lists.find_all().await.unwrap(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_import_creates_list_and_items() {
        let (_db, lists, items) = setup().await;
        let rows = vec![(false, "Milk".to_string()), (true, "Eggs".to_string())];

        let summary = lists.import_from_text("Groceries", &rows).await.unwrap();

        assert_eq!(summary.list.id, "Groceries");
        assert_eq!(summary.imported, 2);
        assert!(summary.rejected.is_empty());
        let stored = items.list_by_list("Groceries", false).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().any(|i| i.name == "Eggs" && i.is_done));
    }

    #[tokio::test]
    async fn test_import_into_taken_name_is_duplicate() {
        let (_db, lists, _) = setup().await;
        lists.create("Groceries").await.unwrap();

        let err = lists
            .import_from_text("Groceries", &[(false, "Milk".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, PocketListsError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn test_delete_erases_items_then_list() {
        let (_db, lists, items) = setup().await;
        let list = lists.create("Groceries").await.unwrap();
        for name in ["Milk", "Eggs", "Bread"] {
            items.create("Groceries", name).await.unwrap();
        }
        let bread = items.list_by_list("Groceries", false).await.unwrap().remove(2);
        items.delete(&bread).await.unwrap();

        lists.delete(&list.id, &list.rev).await.unwrap();

        assert!(items.list_by_list("Groceries", false).await.unwrap().is_empty());
        assert!(items.find_removed(&bread.id).await.unwrap_err().is_not_found());
        assert!(!lists.name_exists("Groceries").await);
    }

    #[tokio::test]
    async fn test_delete_with_stale_revision_touches_nothing() {
        let (_db, lists, items) = setup().await;
        lists.create("Groceries").await.unwrap();
        items.create("Groceries", "Milk").await.unwrap();

        let err = lists
            .delete("Groceries", &Revision::from("1-stale"))
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(items.list_by_list("Groceries", false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_cascade_keeps_list() {
        let (db, lists, _) = setup().await;
        let list = lists.create("Groceries").await.unwrap();
        db.with_connection(|conn| conn.execute_batch("DROP TABLE list_items"))
            .await
            .unwrap();

        let err = lists.delete(&list.id, &list.rev).await.unwrap_err();

        assert!(matches!(err, PocketListsError::CascadeDelete { .. }));
        assert_eq!(lists.find_all().await.unwrap(), vec![list]);
    }

    #[tokio::test]
    async fn test_recreated_list_does_not_inherit_hide_done() {
        let (db, lists, _) = setup().await;
        let preferences = PreferencesStore::new(db.collection());
        let list = lists.create("Groceries").await.unwrap();
        preferences.set_hide_done("Groceries", true).await.unwrap();

        lists.delete(&list.id, &list.rev).await.unwrap();
        lists.create("Groceries").await.unwrap();

        assert!(!preferences.get_hide_done("Groceries").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_item_created_during_delete_never_outlives_list() {
        let (_db, lists, items) = setup().await;
        for round in 0..100 {
            let name = format!("List {round}");
            let list = lists.create(&name).await.unwrap();

            let creator = {
                let items = items.clone();
                let name = name.clone();
                tokio::spawn(async move { items.create(&name, "x").await })
            };
            lists.delete(&list.id, &list.rev).await.unwrap();
            let created = creator.await.unwrap();

            assert!(items.list_by_list(&name, false).await.unwrap().is_empty());
            if let Ok(item) = created {
                assert!(items.find(&item.id).await.unwrap_err().is_not_found());
                assert!(items.find_removed(&item.id).await.unwrap_err().is_not_found());
            }
        }
    }

    #[tokio::test]
    async fn test_deleted_name_can_be_reused() {
        let (_db, lists, _) = setup().await;
        let list = lists.create("Groceries").await.unwrap();
        lists.delete(&list.id, &list.rev).await.unwrap();

        let again = lists.create("Groceries").await.unwrap();
        assert!(again.rev.generation() > list.rev.generation());
    }
}
