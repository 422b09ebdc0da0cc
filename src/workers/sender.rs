use log::{debug, warn};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

use crate::blockchain::Chain;
use crate::error::Result;
use crate::messages::Message;

const CHATTER: &[&str] = &[
    "Hey, I'm first!",
    "It's not fair!",
    "You always will be first because it is your blockchain!",
    "Anyway, thank you for this amazing chat.",
    "You're welcome :)",
    "Hey Kelly, do you want to go to the movies?",
];

/// What a sender managed to get into the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    pub name: String,
    /// Ids of messages the chain accepted, in send order.
    pub delivered: Vec<Uuid>,
    pub dropped: usize,
}

/// Submit messages with a random 1..=`max_delay_ms` pause between them
/// until the chain is complete or `stop` is raised.
pub fn run(
    name: String,
    chain: Arc<Chain>,
    max_delay_ms: u64,
    stop: Arc<AtomicBool>,
) -> Result<SenderStats> {
    let mut rng = rand::thread_rng();
    let mut stats = SenderStats {
        name: name.clone(),
        ..SenderStats::default()
    };
    let mut seq = 0u64;

    while !chain.is_complete() && !stop.load(Ordering::Relaxed) {
        seq += 1;
        let text = CHATTER[rng.gen_range(0..CHATTER.len())];
        let message = Message::new(name.clone(), seq, text);
        let id = message.id;

        if chain.submit_message(message)? {
            debug!("{name} - queued message {seq} ({id})");
            stats.delivered.push(id);
        } else {
            warn!("{name} - message {seq} dropped: chain complete");
            stats.dropped += 1;
        }

        let delay = rng.gen_range(1..=max_delay_ms.max(1));
        thread::sleep(Duration::from_millis(delay));
    }

    Ok(stats)
}
