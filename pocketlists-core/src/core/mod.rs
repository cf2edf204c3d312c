//! Internal domain modules for the PocketLists core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod clipboard;
pub mod context;
pub mod error;
pub mod ids;
pub mod index;
pub mod list;
pub mod list_item;
pub mod note;
pub mod preferences;
pub mod revision;
pub mod settings;
pub mod share;
pub mod storage;
pub mod theme;

#[doc(inline)]
pub use clipboard::{Clipboard, MemoryClipboard, SystemClipboard, UnavailableClipboard};
#[doc(inline)]
pub use context::AppContext;
#[doc(inline)]
pub use error::{PocketListsError, Result};
#[doc(inline)]
pub use ids::IdGenerator;
#[doc(inline)]
pub use index::{build_indexes, IndexCatalog, IndexName, IndexState};
#[doc(inline)]
pub use list::{ImportSummary, List, ListFields, ListsRepository};
#[doc(inline)]
pub use list_item::{ListItem, ListItemFields, ListItemsRepository};
#[doc(inline)]
pub use note::{Note, NoteFields, NotesRepository, Tombstone};
#[doc(inline)]
pub use preferences::{HideDoneFields, PreferencesStore};
#[doc(inline)]
pub use revision::Revision;
#[doc(inline)]
pub use settings::{load_settings, save_settings, AppSettings};
#[doc(inline)]
pub use share::{
    format_checklist, parse_checklist, ShareChannel, ShareInbox, ShareMessage, SharePayload,
    ShareSheet, SharedData, UnavailableShareSheet,
};
#[doc(inline)]
pub use storage::{
    BulkOutcome, Collection, CollectionName, Database, Document, DocumentFields, DocumentWrite,
    Query,
};
#[doc(inline)]
pub use theme::{HeadlessSurface, Theme, ThemeFields, ThemeStore, ThemeSurface};
