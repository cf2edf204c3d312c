//! Sharing content out, and receiving content shared into the app.
//!
//! Inbound shares arrive out of band: another context holding the shared payload
//! answers a [`ShareMessage::GetImportData`] request on the [`ShareChannel`] with
//! [`ShareMessage::SendImportData`]. [`ShareInbox`] remembers the last payload and
//! hands it out after a short bounded wait.

use crate::{PocketListsError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Default time [`ShareInbox::import_shared_data`] waits for an answer.
pub const DEFAULT_IMPORT_WAIT: Duration = Duration::from_millis(500);

/// Content shared into or out of the app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedData {
    pub title: String,
    pub text: String,
    pub url: String,
}

/// Outgoing share request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub url: Option<String>,
}

/// The platform share sheet.
#[async_trait]
pub trait ShareSheet: Send + Sync {
    async fn can_share(&self) -> bool;

    /// Returns `false` when the user dismissed the sheet.
    async fn share_content(&self, payload: &SharePayload) -> Result<bool>;
}

/// Stand-in for platforms without a share sheet.
#[derive(Debug, Default)]
pub struct UnavailableShareSheet;

#[async_trait]
impl ShareSheet for UnavailableShareSheet {
    async fn can_share(&self) -> bool {
        false
    }

    async fn share_content(&self, _payload: &SharePayload) -> Result<bool> {
        Err(PocketListsError::CapabilityUnavailable("Share API".to_string()))
    }
}

/// Messages exchanged with the context that received a share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareMessage {
    GetImportData,
    SendImportData(SharedData),
}

/// Broadcast channel shared by every context of the app.
#[derive(Debug, Clone)]
pub struct ShareChannel {
    tx: broadcast::Sender<ShareMessage>,
}

impl ShareChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Posts `message` to every subscriber. Posting with nobody listening is not an error.
    pub fn post(&self, message: ShareMessage) {
        if self.tx.send(message).is_err() {
            log::debug!("share channel has no listeners");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShareMessage> {
        self.tx.subscribe()
    }
}

impl Default for ShareChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects payloads sent to the app over a [`ShareChannel`].
pub struct ShareInbox {
    channel: ShareChannel,
    received: Arc<Mutex<Option<SharedData>>>,
    wait: Duration,
    listener: JoinHandle<()>,
}

impl ShareInbox {
    /// Starts listening on `channel`. Must be called inside a Tokio runtime.
    pub fn listen(channel: ShareChannel, wait: Duration) -> Self {
        let received = Arc::new(Mutex::new(None));
        let mut rx = channel.subscribe();
        let store = Arc::clone(&received);
        let listener = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ShareMessage::SendImportData(data)) if !data.text.is_empty() => {
                        if let Ok(mut slot) = store.lock() {
                            *slot = Some(SharedData {
                                url: String::new(),
                                ..data
                            });
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("share inbox skipped {skipped} messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Self {
            channel,
            received,
            wait,
            listener,
        }
    }

    /// Asks the other contexts for shared content and returns what arrived within
    /// the wait, or empty values.
    pub async fn import_shared_data(&self) -> SharedData {
        self.channel.post(ShareMessage::GetImportData);
        tokio::time::sleep(self.wait).await;
        match self.received.lock() {
            Ok(slot) => slot.clone().unwrap_or_default(),
            Err(e) => {
                log::error!("share inbox state poisoned: {e}");
                SharedData::default()
            }
        }
    }
}

impl Drop for ShareInbox {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Parses checklist-shaped text into `(is_done, name)` rows.
///
/// Accepts `[x] name`, `[ ] name`, their `- ` / `* ` bulleted forms, and plain
/// lines (not done). Blank lines are skipped.
pub fn parse_checklist(text: &str) -> Vec<(bool, String)> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let line = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .unwrap_or(line)
                .trim_start();
            let (done, name) = if let Some(rest) = line
                .strip_prefix("[x]")
                .or_else(|| line.strip_prefix("[X]"))
            {
                (true, rest)
            } else if let Some(rest) = line.strip_prefix("[ ]") {
                (false, rest)
            } else {
                (false, line)
            };
            let name = name.trim();
            (!name.is_empty()).then(|| (done, name.to_string()))
        })
        .collect()
}

/// Renders rows in the format [`parse_checklist`] reads, for sharing a list out.
pub fn format_checklist<'a>(rows: impl IntoIterator<Item = (bool, &'a str)>) -> String {
    rows.into_iter()
        .map(|(done, name)| format!("[{}] {name}", if done { "x" } else { " " }))
        .collect::<Vec<_>>()
        .join("\n")
}
