//! Process-wide owner of the store handles.
//!
//! An [`AppContext`] is created once at startup. It opens the database, starts the
//! background index build and hands out the repositories, all sharing the same
//! connection and id generator.

use crate::core::ids::IdGenerator;
use crate::core::index::{build_indexes, IndexName, IndexState};
use crate::core::list::ListsRepository;
use crate::core::list_item::ListItemsRepository;
use crate::core::note::NotesRepository;
use crate::core::preferences::PreferencesStore;
use crate::core::settings::AppSettings;
use crate::core::share::{ShareChannel, ShareInbox};
use crate::core::storage::Database;
use crate::core::theme::{ThemeStore, ThemeSurface};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct AppContext {
    db: Database,
    notes: NotesRepository,
    lists: ListsRepository,
    list_items: ListItemsRepository,
    preferences: PreferencesStore,
    themes: ThemeStore,
    share_channel: ShareChannel,
    share_inbox: ShareInbox,
    index_build: JoinHandle<Vec<(IndexName, IndexState)>>,
}

impl AppContext {
    /// Opens the database named in `settings` and wires every repository to it.
    ///
    /// Must be called inside a Tokio runtime: index creation is spawned in the
    /// background and does not delay the first query.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PocketListsError::Io`] if the database directory cannot be
    /// created, or [`crate::PocketListsError::StoreUnavailable`] if the database
    /// cannot be opened.
    pub fn start(settings: &AppSettings, surface: Arc<dyn ThemeSurface>) -> Result<Self> {
        let path = Path::new(&settings.database_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open(path)?;
        log::info!("opened document store at {}", path.display());
        Ok(Self::with_database(db, settings, surface))
    }

    /// Wires every repository to an already opened database.
    pub fn with_database(
        db: Database,
        settings: &AppSettings,
        surface: Arc<dyn ThemeSurface>,
    ) -> Self {
        let ids = Arc::new(IdGenerator::new());
        let list_items = ListItemsRepository::new(db.collection(), Arc::clone(&ids));
        let preferences = PreferencesStore::new(db.collection());
        let lists =
            ListsRepository::new(db.collection(), list_items.clone(), preferences.clone());
        let notes = NotesRepository::new(db.collection(), ids);
        let themes = ThemeStore::new(db.collection(), surface);
        let share_channel = ShareChannel::new();
        let share_inbox = ShareInbox::listen(share_channel.clone(), settings.share_import_wait());

        let build_db = db.clone();
        let index_build = tokio::spawn(async move { build_indexes(&build_db).await });

        Self {
            db,
            notes,
            lists,
            list_items,
            preferences,
            themes,
            share_channel,
            share_inbox,
            index_build,
        }
    }

    /// Resolves once the background index build has finished.
    pub async fn ready(&self) {
        self.db.catalog().wait_ready().await;
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn notes(&self) -> &NotesRepository {
        &self.notes
    }

    pub fn lists(&self) -> &ListsRepository {
        &self.lists
    }

    pub fn list_items(&self) -> &ListItemsRepository {
        &self.list_items
    }

    pub fn preferences(&self) -> &PreferencesStore {
        &self.preferences
    }

    pub fn themes(&self) -> &ThemeStore {
        &self.themes
    }

    /// Channel other contexts use to hand shared content to this one.
    pub fn share_channel(&self) -> &ShareChannel {
        &self.share_channel
    }

    pub fn share_inbox(&self) -> &ShareInbox {
        &self.share_inbox
    }

    /// Waits for the index build and releases the store.
    pub async fn shutdown(self) {
        match self.index_build.await {
            Ok(report) => log::debug!("index build at shutdown: {report:?}"),
            Err(e) => log::warn!("index build task failed: {e}"),
        }
        log::info!("document store closed");
    }
}
