//! Light/dark theme persistence and switching.
//!
//! The chosen theme is kept in a single document. The surface that actually
//! renders the theme (an HTML root element, a window) is abstracted behind
//! [`ThemeSurface`].

use crate::core::storage::{Collection, CollectionName, DocumentFields};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

const THEME_DOC_ID: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    Light,
    Dark,
}

/// Stored fields of the theme document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeFields {
    pub theme: Theme,
}

impl DocumentFields for ThemeFields {
    const COLLECTION: CollectionName = CollectionName::Theme;
}

/// Where the theme is rendered.
pub trait ThemeSurface: Send + Sync {
    /// The theme currently shown.
    fn applied(&self) -> Theme;

    /// Shows `theme`.
    fn apply(&self, theme: Theme);

    /// The platform's light/dark preference, if it has one.
    fn system_preference(&self) -> Option<Theme>;
}

/// A [`ThemeSurface`] for hosts without a rendering surface.
#[derive(Debug)]
pub struct HeadlessSurface {
    applied: Mutex<Theme>,
    system: Option<Theme>,
}

impl HeadlessSurface {
    pub fn new(applied: Theme, system: Option<Theme>) -> Self {
        Self {
            applied: Mutex::new(applied),
            system,
        }
    }
}

impl ThemeSurface for HeadlessSurface {
    fn applied(&self) -> Theme {
        self.applied
            .lock()
            .map(|theme| *theme)
            .unwrap_or(Theme::Light)
    }

    fn apply(&self, theme: Theme) {
        if let Ok(mut applied) = self.applied.lock() {
            *applied = theme;
        }
    }

    fn system_preference(&self) -> Option<Theme> {
        self.system
    }
}

/// Persists the user's theme and keeps the surface in sync with it.
#[derive(Clone)]
pub struct ThemeStore {
    themes: Collection<ThemeFields>,
    surface: Arc<dyn ThemeSurface>,
}

impl ThemeStore {
    pub fn new(themes: Collection<ThemeFields>, surface: Arc<dyn ThemeSurface>) -> Self {
        Self { themes, surface }
    }

    /// The theme to show.
    ///
    /// A saved theme wins and is applied if the surface shows something else.
    /// Without one, the system preference is saved and returned; without either,
    /// [`Theme::Dark`].
    pub async fn get_theme(&self) -> Result<Theme> {
        match self.themes.get(THEME_DOC_ID).await {
            Ok(doc) => {
                let saved = doc.fields.theme;
                if saved != self.surface.applied() {
                    self.surface.apply(saved);
                }
                Ok(saved)
            }
            Err(e) => {
                if !e.is_not_found() {
                    log::warn!("get theme failed, falling back to system preference: {e}");
                }
                match self.surface.system_preference() {
                    Some(theme) => {
                        self.save_theme(theme).await?;
                        Ok(theme)
                    }
                    None => Ok(Theme::Dark),
                }
            }
        }
    }

    /// Applies and saves `theme`. Returns `false` when it was already applied.
    pub async fn switch_theme(&self, theme: Theme) -> Result<bool> {
        if self.surface.applied() == theme {
            return Ok(false);
        }
        self.surface.apply(theme);
        self.save_theme(theme).await?;
        Ok(true)
    }

    /// Called by the host when the operating system switches between light and
    /// dark. The app follows the new preference the same way a user switch would.
    pub async fn system_preference_changed(&self, theme: Theme) -> Result<bool> {
        log::debug!("system theme preference changed to {theme:?}");
        self.switch_theme(theme).await
    }

    async fn save_theme(&self, theme: Theme) -> Result<()> {
        let current = match self.themes.get_with_deleted(THEME_DOC_ID).await {
            Ok(doc) => Some(doc.rev),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                log::warn!("save theme failed: {e}");
                return Err(e);
            }
        };
        self.themes
            .put(THEME_DOC_ID, current.as_ref(), &ThemeFields { theme })
            .await?;
        Ok(())
    }
}
