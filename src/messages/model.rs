use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat message waiting to be embedded in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender: String,
    /// Per-sender sequence number, starting at 1.
    pub seq: u64,
    pub text: String,
    pub sent_at: i64, // ms since epoch (UTC)
}

impl Message {
    pub fn new(sender: impl Into<String>, seq: u64, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            seq,
            text: text.into(),
            sent_at: Utc::now().timestamp_millis(),
        }
    }
}
