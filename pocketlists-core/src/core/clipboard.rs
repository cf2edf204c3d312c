//! Clipboard access.
//!
//! The UI calls these directly; nothing in the repositories depends on them.

use crate::{PocketListsError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn copy_text(&self, text: &str) -> Result<()>;

    async fn read_text(&self) -> Result<String>;
}

/// A clipboard that lives only inside this process.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn copy_text(&self, text: &str) -> Result<()> {
        let mut stored = self
            .text
            .lock()
            .map_err(|_| PocketListsError::CapabilityUnavailable("Clipboard".to_string()))?;
        *stored = text.to_string();
        Ok(())
    }

    async fn read_text(&self) -> Result<String> {
        self.text
            .lock()
            .map(|text| text.clone())
            .map_err(|_| PocketListsError::CapabilityUnavailable("Clipboard".to_string()))
    }
}

/// Stand-in for platforms without a clipboard.
#[derive(Debug, Default)]
pub struct UnavailableClipboard;

#[async_trait]
impl Clipboard for UnavailableClipboard {
    async fn copy_text(&self, _text: &str) -> Result<()> {
        Err(unavailable())
    }

    async fn read_text(&self) -> Result<String> {
        Err(unavailable())
    }
}

fn unavailable() -> PocketListsError {
    PocketListsError::CapabilityUnavailable("Clipboard".to_string())
}

#[cfg(target_os = "macos")]
const COPY_COMMANDS: &[(&str, &[&str])] = &[("pbcopy", &[])];
#[cfg(target_os = "macos")]
const PASTE_COMMANDS: &[(&str, &[&str])] = &[("pbpaste", &[])];

#[cfg(target_os = "linux")]
const COPY_COMMANDS: &[(&str, &[&str])] = &[
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];
#[cfg(target_os = "linux")]
const PASTE_COMMANDS: &[(&str, &[&str])] = &[
    ("xclip", &["-selection", "clipboard", "-o"]),
    ("xsel", &["--clipboard", "--output"]),
];

#[cfg(target_os = "windows")]
const COPY_COMMANDS: &[(&str, &[&str])] = &[("clip", &[])];
#[cfg(target_os = "windows")]
const PASTE_COMMANDS: &[(&str, &[&str])] = &[("powershell", &["-command", "Get-Clipboard"])];

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
const COPY_COMMANDS: &[(&str, &[&str])] = &[];
#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
const PASTE_COMMANDS: &[(&str, &[&str])] = &[];

/// The desktop clipboard, reached through the platform's clipboard commands
/// (pbcopy/pbpaste, xclip or xsel, clip/powershell).
#[derive(Debug, Default)]
pub struct SystemClipboard;

#[async_trait]
impl Clipboard for SystemClipboard {
    async fn copy_text(&self, text: &str) -> Result<()> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || copy_with_commands(&text))
            .await
            .map_err(|e| PocketListsError::CapabilityUnavailable(format!("Clipboard: {e}")))?
    }

    async fn read_text(&self) -> Result<String> {
        tokio::task::spawn_blocking(paste_with_commands)
            .await
            .map_err(|e| PocketListsError::CapabilityUnavailable(format!("Clipboard: {e}")))?
    }
}

fn copy_with_commands(text: &str) -> Result<()> {
    for (program, args) in COPY_COMMANDS {
        let mut child = match Command::new(program).args(*args).stdin(Stdio::piped()).spawn() {
            Ok(child) => child,
            Err(e) => {
                log::debug!("clipboard command {program} unavailable: {e}");
                continue;
            }
        };
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }
        let status = child.wait()?;
        if status.success() {
            return Ok(());
        }
        log::warn!("clipboard command {program} exited with {status}");
    }
    Err(unavailable())
}

fn paste_with_commands() -> Result<String> {
    for (program, args) in PASTE_COMMANDS {
        match Command::new(program).args(*args).output() {
            Ok(output) if output.status.success() => {
                return String::from_utf8(output.stdout).map_err(|e| {
                    PocketListsError::CapabilityUnavailable(format!(
                        "Clipboard holds non UTF-8 data: {e}"
                    ))
                });
            }
            Ok(output) => log::warn!("clipboard command {program} exited with {}", output.status),
            Err(e) => log::debug!("clipboard command {program} unavailable: {e}"),
        }
    }
    Err(unavailable())
}
