//! Core library for PocketLists: local-first notes and checklists.
//!
//! The primary entry point is [`AppContext`], which opens the document store,
//! starts the background index build and owns one handle per repository.
//! Every mutation goes through a repository and is guarded by the document's
//! [`Revision`].
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    clipboard::{Clipboard, MemoryClipboard, SystemClipboard, UnavailableClipboard},
    context::AppContext,
    error::{PocketListsError, Result},
    ids::IdGenerator,
    index::{build_indexes, IndexCatalog, IndexName, IndexState},
    list::{ImportSummary, List, ListFields, ListsRepository},
    list_item::{ListItem, ListItemFields, ListItemsRepository},
    note::{Note, NoteFields, NotesRepository, Tombstone},
    preferences::{HideDoneFields, PreferencesStore},
    revision::Revision,
    settings::{load_settings, save_settings, AppSettings},
    share::{
        format_checklist, parse_checklist, ShareChannel, ShareInbox, ShareMessage, SharePayload,
        ShareSheet, SharedData, UnavailableShareSheet,
    },
    storage::{
        BulkOutcome, Collection, CollectionName, Database, Document, DocumentFields,
        DocumentWrite, Query,
    },
    theme::{HeadlessSurface, Theme, ThemeFields, ThemeStore, ThemeSurface},
};
