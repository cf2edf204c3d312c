//! Per-list display preferences.

use crate::core::storage::{Collection, CollectionName, DocumentFields};
use crate::{Result, Revision};
use serde::{Deserialize, Serialize};

/// Stored fields of a hide-done preference, keyed by list id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HideDoneFields {
    pub hide_done: bool,
}

impl DocumentFields for HideDoneFields {
    const COLLECTION: CollectionName = CollectionName::HideDone;
}

/// Whether each list hides its completed items.
#[derive(Clone)]
pub struct PreferencesStore {
    hide_done: Collection<HideDoneFields>,
}

impl PreferencesStore {
    pub fn new(hide_done: Collection<HideDoneFields>) -> Self {
        Self { hide_done }
    }

    /// The saved flag for `list_id`, or `false` when none was ever saved.
    pub async fn get_hide_done(&self, list_id: &str) -> Result<bool> {
        match self.hide_done.get(list_id).await {
            Ok(doc) => Ok(doc.fields.hide_done),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => {
                log::warn!("get hide done for {list_id} failed: {e}");
                Err(e)
            }
        }
    }

    /// Saves the flag for `list_id`, creating the preference on first use.
    pub async fn set_hide_done(&self, list_id: &str, hide_done: bool) -> Result<Revision> {
        let current = match self.hide_done.get(list_id).await {
            Ok(doc) => Some(doc.rev),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                log::warn!("save hide done for {list_id} failed: {e}");
                return Err(e);
            }
        };
        self.hide_done
            .put(list_id, current.as_ref(), &HideDoneFields { hide_done })
            .await
            .map_err(|e| {
                log::warn!("save hide done for {list_id} failed: {e}");
                e
            })
    }

    /// Forgets the flag for `list_id`. Does nothing when none was saved.
    pub async fn clear_hide_done(&self, list_id: &str) -> Result<()> {
        let current = match self.hide_done.get(list_id).await {
            Ok(doc) => doc.rev,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        self.hide_done.remove(list_id, &current).await?;
        Ok(())
    }
}
