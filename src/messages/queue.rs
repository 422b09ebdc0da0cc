use std::collections::VecDeque;

use super::model::Message;

/// Insertion-ordered buffer of messages pending inclusion in the next block.
///
/// Not synchronized by itself: the chain keeps it under the same lock as
/// its blocks so a drain happens atomically with a commit.
#[derive(Debug, Default)]
pub struct MessageQueue {
    pending: VecDeque<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.pending.push_back(message);
    }

    /// Take every pending message in arrival order, leaving the queue empty.
    pub fn drain_all(&mut self) -> Vec<Message> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.pending.iter()
    }
}
