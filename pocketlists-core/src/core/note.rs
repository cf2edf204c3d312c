//! Free-text notes and their repository.

use crate::core::ids::IdGenerator;
use crate::core::storage::{Collection, CollectionName, Document, DocumentFields};
use crate::{PocketListsError, Result, Revision};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A note as handed to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: String,
    pub rev: Revision,
}

/// Stored fields of a note document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteFields {
    pub content: String,
}

impl DocumentFields for NoteFields {
    const COLLECTION: CollectionName = CollectionName::Notes;
}

impl From<Document<NoteFields>> for Note {
    fn from(doc: Document<NoteFields>) -> Self {
        Self {
            id: doc.id,
            content: doc.fields.content,
            rev: doc.rev,
        }
    }
}

/// Identity and revision left behind by a delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    pub id: String,
    pub rev: Revision,
}

/// CRUD over note documents.
#[derive(Clone)]
pub struct NotesRepository {
    notes: Collection<NoteFields>,
    ids: Arc<IdGenerator>,
}

impl NotesRepository {
    pub fn new(notes: Collection<NoteFields>, ids: Arc<IdGenerator>) -> Self {
        Self { notes, ids }
    }

    /// All notes in store order (ascending id, which follows creation time).
    pub async fn find_all(&self) -> Result<Vec<Note>> {
        let docs = self.notes.all_docs().await.map_err(|e| {
            log::warn!("find notes failed: {e}");
            e
        })?;
        log::debug!("found {} notes", docs.len());
        Ok(docs.into_iter().map(Note::from).collect())
    }

    /// Stores a new note and returns it with its assigned id and revision.
    ///
    /// # Errors
    ///
    /// Any store failure is reported as [`PocketListsError::StoreWrite`].
    pub async fn create(&self, content: &str) -> Result<Note> {
        let id = self.ids.note_id();
        let fields = NoteFields {
            content: content.to_string(),
        };
        let rev = self.notes.put(&id, None, &fields).await.map_err(|e| {
            log::warn!("create note {id} failed: {e}");
            match e {
                PocketListsError::StoreWrite(_) => e,
                other => PocketListsError::StoreWrite(other.to_string()),
            }
        })?;
        Ok(Note {
            id,
            content: fields.content,
            rev,
        })
    }

    /// # Errors
    ///
    /// Returns [`PocketListsError::NotFound`] if no live note has this id.
    pub async fn find(&self, id: &str) -> Result<Note> {
        self.notes.get(id).await.map(Note::from)
    }

    /// Saves `note.content` over the revision `note.rev` and returns the note with
    /// its new revision.
    ///
    /// # Errors
    ///
    /// Returns [`PocketListsError::Conflict`] if `note.rev` is stale.
    pub async fn update(&self, note: &Note) -> Result<Note> {
        let fields = NoteFields {
            content: note.content.clone(),
        };
        let rev = self
            .notes
            .put(&note.id, Some(&note.rev), &fields)
            .await
            .map_err(|e| {
                log::warn!("update note {} failed: {e}", note.id);
                e
            })?;
        Ok(Note {
            rev,
            ..note.clone()
        })
    }

    /// Removes a note and returns the tombstone revision.
    ///
    /// # Errors
    ///
    /// Returns [`PocketListsError::NotFound`] or [`PocketListsError::Conflict`].
    pub async fn delete(&self, id: &str, rev: &Revision) -> Result<Tombstone> {
        let rev = self.notes.remove(id, rev).await.map_err(|e| {
            log::warn!("delete note {id} failed: {e}");
            e
        })?;
        Ok(Tombstone {
            id: id.to_string(),
            rev,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn repository() -> NotesRepository {
        let db = Database::open_in_memory().unwrap();
        NotesRepository::new(db.collection(), Arc::new(IdGenerator::new()))
    }

    #[tokio::test]
    async fn test_create_then_find_returns_same_content() {
        let notes = repository();

        let created = notes.create("buy stamps").await.unwrap();
        let found = notes.find(&created.id).await.unwrap();

        assert_eq!(found.content, "buy stamps");
        assert!(!found.rev.is_empty());
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_update_with_latest_revision_yields_new_revision() {
        let notes = repository();
        let created = notes.create("draft").await.unwrap();

        let updated = notes
            .update(&Note {
                content: "final".to_string(),
                ..created.clone()
            })
            .await
            .unwrap();

        assert_ne!(updated.rev, created.rev);
        assert_eq!(notes.find(&created.id).await.unwrap().content, "final");
    }

    #[tokio::test]
    async fn test_update_with_stale_revision_conflicts() {
        let notes = repository();
        let created = notes.create("draft").await.unwrap();
        notes
            .update(&Note {
                content: "second".to_string(),
                ..created.clone()
            })
            .await
            .unwrap();

        let err = notes
            .update(&Note {
                content: "lost".to_string(),
                ..created
            })
            .await
            .unwrap_err();

        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_find_missing_note_is_not_found() {
        let notes = repository();
        assert!(notes.find("0").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_returns_tombstone_and_hides_note() {
        let notes = repository();
        let created = notes.create("temp").await.unwrap();

        let tombstone = notes.delete(&created.id, &created.rev).await.unwrap();

        assert_eq!(tombstone.id, created.id);
        assert_ne!(tombstone.rev, created.rev);
        assert!(notes.find(&created.id).await.unwrap_err().is_not_found());
        assert!(notes.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_with_stale_revision_conflicts() {
        let notes = repository();
        let created = notes.create("temp").await.unwrap();
        notes
            .update(&Note {
                content: "changed".to_string(),
                ..created.clone()
            })
            .await
            .unwrap();

        let err = notes.delete(&created.id, &created.rev).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_find_all_follows_creation_order() {
        let notes = repository();
        let first = notes.create("one").await.unwrap();
        let second = notes.create("two").await.unwrap();

        let all = notes.find_all().await.unwrap();

        assert_eq!(all, vec![first, second]);
    }
}
