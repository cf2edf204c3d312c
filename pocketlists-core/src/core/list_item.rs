//! Checklist items and their repository.
//!
//! Items belong to exactly one list. Deleting an item from the UI only writes a
//! tombstone so the item can be brought back; items are physically erased only
//! when their list is deleted ([`ListItemsRepository::purge_list`]).

use crate::core::ids::IdGenerator;
use crate::core::index::IndexName;
use crate::core::list::ListFields;
use crate::core::storage::{
    BulkOutcome, Collection, CollectionName, Document, DocumentFields, DocumentWrite, Query,
};
use crate::{PocketListsError, Result, Revision};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A checklist item as handed to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub id: String,
    pub rev: Revision,
    pub list_id: String,
    pub name: String,
    pub is_done: bool,
}

/// Stored fields of a list-item document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemFields {
    pub list_id: String,
    pub name: String,
    pub is_done: bool,
}

impl DocumentFields for ListItemFields {
    const COLLECTION: CollectionName = CollectionName::ListItems;
}

impl From<Document<ListItemFields>> for ListItem {
    fn from(doc: Document<ListItemFields>) -> Self {
        Self {
            id: doc.id,
            rev: doc.rev,
            list_id: doc.fields.list_id,
            name: doc.fields.name,
            is_done: doc.fields.is_done,
        }
    }
}

impl ListItem {
    fn fields(&self) -> ListItemFields {
        ListItemFields {
            list_id: self.list_id.clone(),
            name: self.name.clone(),
            is_done: self.is_done,
        }
    }
}

/// Access to the items of every list.
#[derive(Clone)]
pub struct ListItemsRepository {
    items: Collection<ListItemFields>,
    ids: Arc<IdGenerator>,
}

impl ListItemsRepository {
    pub fn new(items: Collection<ListItemFields>, ids: Arc<IdGenerator>) -> Self {
        Self { items, ids }
    }

    /// Items of `list_id` in creation order.
    ///
    /// With `hide_done` set, completed items are left out.
    pub async fn list_by_list(&self, list_id: &str, hide_done: bool) -> Result<Vec<ListItem>> {
        let query = if hide_done {
            Query::on(IndexName::ListIdIsDone)
                .eq("listId", list_id)
                .eq("isDone", false)
        } else {
            Query::on(IndexName::ListId).eq("listId", list_id)
        };
        let docs = self.items.find(query).await.map_err(|e| {
            log::warn!("get items of {list_id} failed: {e}");
            e
        })?;
        Ok(docs.into_iter().map(ListItem::from).collect())
    }

    /// Items of `list_id` sorted by name.
    pub async fn list_by_name(&self, list_id: &str) -> Result<Vec<ListItem>> {
        let docs = self
            .items
            .find(Query::on(IndexName::ListIdName).eq("listId", list_id))
            .await?;
        Ok(docs.into_iter().map(ListItem::from).collect())
    }

    /// Whether `list_id` already has a live item called `name`.
    ///
    /// Uniqueness is not enforced by the store; the UI calls this before creating.
    pub async fn exists(&self, list_id: &str, name: &str) -> Result<bool> {
        let docs = self
            .items
            .find(
                Query::on(IndexName::ListIdName)
                    .eq("listId", list_id)
                    .eq("name", name),
            )
            .await
            .map_err(|e| {
                log::warn!("item exists check for {list_id}/{name} failed: {e}");
                e
            })?;
        Ok(!docs.is_empty())
    }

    /// Adds an unfinished item called `name` to `list_id`.
    ///
    /// The list check and the insert happen in one store transaction, so an item
    /// is never added to a list that is being deleted. The document is read back
    /// after the write so the returned item carries exactly what was stored.
    ///
    /// # Errors
    ///
    /// Returns [`PocketListsError::NotFound`] if the list does not exist.
    pub async fn create(&self, list_id: &str, name: &str) -> Result<ListItem> {
        let id = self.ids.list_item_id(list_id);
        let fields = ListItemFields {
            list_id: list_id.to_string(),
            name: name.to_string(),
            is_done: false,
        };
        self.items
            .write_under::<ListFields>(list_id, DocumentWrite::new(id.clone(), fields))
            .await
            .map_err(|e| {
                log::warn!("create item {id} in {list_id} failed: {e}");
                e
            })?;
        self.items.get(&id).await.map(ListItem::from)
    }

    /// A live item.
    pub async fn find(&self, id: &str) -> Result<ListItem> {
        self.items.get(id).await.map(ListItem::from)
    }

    /// An item that was soft-deleted and can still be restored.
    ///
    /// # Errors
    ///
    /// Returns [`PocketListsError::NotFound`] if the item is absent or still live.
    pub async fn find_removed(&self, id: &str) -> Result<ListItem> {
        let doc = self.items.get_with_deleted(id).await?;
        if !doc.deleted {
            return Err(PocketListsError::NotFound(format!("{id} is not deleted")));
        }
        Ok(ListItem::from(doc))
    }

    /// Overwrites the stored item with `item`.
    ///
    /// Passing a soft-deleted item with its tombstone revision brings it back.
    /// Items never move between lists.
    ///
    /// # Errors
    ///
    /// Returns [`PocketListsError::NotFound`] if the item or its list does not
    /// exist, and [`PocketListsError::Conflict`] if `item.rev` is stale or
    /// `item.list_id` differs from the stored list.
    pub async fn update(&self, item: &ListItem) -> Result<ListItem> {
        let result = self.update_in_place(item).await;
        let rev = result.map_err(|e| {
            log::warn!("update item {} failed: {e}", item.id);
            e
        })?;
        Ok(ListItem {
            rev,
            ..item.clone()
        })
    }

    async fn update_in_place(&self, item: &ListItem) -> Result<Revision> {
        let stored = self.items.get_with_deleted(&item.id).await?;
        if stored.fields.list_id != item.list_id {
            return Err(PocketListsError::Conflict(format!(
                "{} belongs to list {}, not {}",
                item.id, stored.fields.list_id, item.list_id
            )));
        }
        let write = DocumentWrite::new(item.id.clone(), item.fields()).at(item.rev.clone());
        self.items
            .write_under::<ListFields>(&item.list_id, write)
            .await
    }

    /// Soft-deletes `item` and returns it with its tombstone revision, ready to be
    /// handed to [`restore`](Self::restore) for undo. The tombstone keeps the
    /// stored fields.
    pub async fn delete(&self, item: &ListItem) -> Result<ListItem> {
        let rev = self.items.remove(&item.id, &item.rev).await.map_err(|e| {
            log::warn!("delete item {} failed: {e}", item.id);
            e
        })?;
        Ok(ListItem {
            rev,
            ..item.clone()
        })
    }

    /// Undoes [`delete`](Self::delete) by saving the item again.
    pub async fn restore(&self, item: &ListItem) -> Result<ListItem> {
        self.update(item).await
    }

    /// Physically erases every item of `list_id`, soft-deleted ones included, in one
    /// batch. Returns the number of erased items.
    ///
    /// # Errors
    ///
    /// Fails if the items cannot be read or any of them could not be erased; the
    /// message lists the failing ids.
    pub async fn purge_list(&self, list_id: &str) -> Result<usize> {
        let docs = self
            .items
            .find_with_deleted(Query::on(IndexName::ListId).eq("listId", list_id))
            .await?;
        if docs.is_empty() {
            return Ok(0);
        }

        let targets = docs.into_iter().map(|doc| (doc.id, doc.rev)).collect();
        let outcomes = self.items.bulk_purge(targets).await?;
        let (erased, failed): (Vec<BulkOutcome>, Vec<BulkOutcome>) =
            outcomes.into_iter().partition(BulkOutcome::is_ok);
        if !failed.is_empty() {
            let reasons: Vec<String> = failed
                .iter()
                .filter_map(|o| o.result.as_ref().err().map(|e| format!("{}: {e}", o.id)))
                .collect();
            return Err(PocketListsError::StoreWrite(reasons.join("; ")));
        }
        log::debug!("purged {} items of {list_id}", erased.len());
        Ok(erased.len())
    }

    /// Creates one item per `(is_done, name)` row in a single batch. Rows are
    /// independent: the outcome of each is reported separately.
    pub(crate) async fn bulk_create(
        &self,
        list_id: &str,
        rows: &[(bool, String)],
    ) -> Result<Vec<BulkOutcome>> {
        let writes = rows
            .iter()
            .enumerate()
            .map(|(row, (is_done, name))| {
                DocumentWrite::new(
                    self.ids.imported_item_id(list_id, row),
                    ListItemFields {
                        list_id: list_id.to_string(),
                        name: name.clone(),
                        is_done: *is_done,
                    },
                )
            })
            .collect();
        self.items.bulk_docs_under::<ListFields>(list_id, writes).await
    }
}
