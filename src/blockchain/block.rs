use chrono::Utc;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::DifficultyPolicy;
use crate::hashing::{meets_difficulty, sha256_hex};
use crate::messages::Message;

use super::{GENESIS_DIFFICULTY, GENESIS_PREV_HASH};

/// How a block's recommended difficulty compares to its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyChange {
    Increased,
    Decreased,
    Unchanged,
}

/// A single mined block. Everything except `payload` is fixed once the
/// proof-of-work search succeeds; the payload is filled in by the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: u64,
    pub hash_prev: String,
    pub timestamp: i64, // ms since epoch (UTC)
    pub difficulty_target: u32,
    pub nonce: u64, // "magic number"
    pub hash: String,
    pub elapsed_secs: u64,
    pub next_difficulty_target: u32,
    pub miner_id: u32,
    pub payload: Vec<Message>,
}

impl Block {
    /// Create the genesis block (id 1, difficulty 0).
    pub fn genesis(policy: &DifficultyPolicy) -> Self {
        Self::mine(
            1,
            GENESIS_PREV_HASH.to_string(),
            GENESIS_DIFFICULTY,
            0,
            policy,
        )
    }

    /// Search for a nonce whose hash has `difficulty_target` leading zero
    /// hex digits. Nonces are drawn at random from
    /// `[1, 10^(difficulty_target + extra_digits))`. After
    /// `policy.max_attempts` misses the search restarts with a new timestamp.
    pub fn mine(
        id: u64,
        hash_prev: String,
        difficulty_target: u32,
        miner_id: u32,
        policy: &DifficultyPolicy,
    ) -> Self {
        let upper = policy.nonce_upper_bound(difficulty_target);
        let mut rng = rand::thread_rng();
        let started = Instant::now();

        loop {
            let mut block = Self {
                id,
                hash_prev: hash_prev.clone(),
                timestamp: Utc::now().timestamp_millis(),
                difficulty_target,
                nonce: 0,
                hash: String::new(),
                elapsed_secs: 0,
                next_difficulty_target: difficulty_target,
                miner_id,
                payload: Vec::new(),
            };

            for _ in 0..policy.max_attempts {
                block.nonce = rng.gen_range(1..upper);
                block.hash = block.compute_hash();
                if meets_difficulty(&block.hash, difficulty_target) {
                    block.elapsed_secs = started.elapsed().as_secs();
                    block.next_difficulty_target =
                        policy.next_difficulty(difficulty_target, block.elapsed_secs);
                    return block;
                }
            }

            debug!(
                "miner {} gave up on block #{} after {} attempts, restarting",
                miner_id, id, policy.max_attempts
            );
        }
    }

    /// SHA-256 over `id ‖ timestamp ‖ hash_prev ‖ nonce`. The payload is
    /// not part of the preimage.
    pub fn compute_hash(&self) -> String {
        let preimage = format!(
            "{}{}{}{}",
            self.id, self.timestamp, self.hash_prev, self.nonce
        );
        sha256_hex(preimage.as_bytes())
    }

    /// The cached hash matches the header fields and satisfies the block's
    /// own difficulty. Does NOT validate chain linkage.
    pub fn is_valid(&self) -> bool {
        self.hash == self.compute_hash() && meets_difficulty(&self.hash, self.difficulty_target)
    }

    pub fn difficulty_change(&self) -> DifficultyChange {
        use std::cmp::Ordering::*;
        match self.next_difficulty_target.cmp(&self.difficulty_target) {
            Greater => DifficultyChange::Increased,
            Less => DifficultyChange::Decreased,
            Equal => DifficultyChange::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Block, DifficultyChange};
    use crate::config::DifficultyPolicy;
    use crate::messages::Message;

    #[test]
    fn genesis_shape() {
        let b = Block::genesis(&DifficultyPolicy::default());
        assert_eq!(b.id, 1);
        assert_eq!(b.hash_prev, "0");
        assert_eq!(b.difficulty_target, 0);
        assert!(b.nonce >= 1 && b.nonce < 100);
        assert_eq!(b.hash, b.compute_hash());
        assert!(b.payload.is_empty());
    }

    #[test]
    fn mining_produces_leading_zeros() {
        let b = Block::mine(2, "prev".into(), 2, 7, &DifficultyPolicy::default());
        assert!(b.hash.starts_with("00"));
        assert!(b.is_valid());
        assert_eq!(b.miner_id, 7);
        assert!(b.nonce >= 1 && b.nonce < 10_000);
    }

    #[test]
    fn fast_block_recommends_higher_difficulty() {
        let b = Block::mine(2, "prev".into(), 1, 1, &DifficultyPolicy::default());
        // a difficulty-1 search finishes far below the 15 s threshold
        assert!(b.elapsed_secs < 15);
        assert_eq!(b.next_difficulty_target, 2);
        assert_eq!(b.difficulty_change(), DifficultyChange::Increased);
    }

    #[test]
    fn soft_cap_restart_is_transparent() {
        let policy = DifficultyPolicy {
            max_attempts: 1,
            ..DifficultyPolicy::default()
        };
        let b = Block::mine(3, "prev".into(), 1, 1, &policy);
        assert!(b.hash.starts_with('0'));
        assert!(b.is_valid());
    }

    #[test]
    fn invalid_when_mutated() {
        let mut b = Block::mine(2, "prev".into(), 1, 1, &DifficultyPolicy::frozen());
        assert!(b.is_valid());
        b.nonce += 1;
        assert!(!b.is_valid());
    }

    #[test]
    fn payload_does_not_affect_hash() {
        let mut b = Block::mine(2, "prev".into(), 1, 1, &DifficultyPolicy::frozen());
        b.payload.push(Message::new("Tom", 1, "late"));
        assert!(b.is_valid());
        assert_eq!(b.difficulty_change(), DifficultyChange::Unchanged);
    }
}
