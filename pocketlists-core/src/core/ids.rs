//! Time-based document identifiers.

use std::sync::atomic::{AtomicI64, Ordering};

/// Hands out millisecond timestamps that never repeat within one process.
///
/// Two calls within the same millisecond get consecutive values, so ids derived
/// from the stamp stay unique without a stored counter.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next stamp: the current Unix time in milliseconds, bumped past the previous stamp.
    pub fn next_stamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    /// Identifier for a new note.
    pub fn note_id(&self) -> String {
        self.next_stamp().to_string()
    }

    /// Identifier for a new item of `list_id`.
    pub fn list_item_id(&self, list_id: &str) -> String {
        format!("{list_id}:{}", self.next_stamp())
    }

    /// Identifier for row `row` of a bulk import into `list_id`.
    pub fn imported_item_id(&self, list_id: &str, row: usize) -> String {
        format!("{list_id}:{row}:{}", self.next_stamp())
    }
}
