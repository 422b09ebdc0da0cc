use log::{debug, info};
use std::sync::{Mutex, MutexGuard};

use super::{Block, GENESIS_DIFFICULTY, GENESIS_PREV_HASH};
use crate::config::DifficultyPolicy;
use crate::error::{ChainError, Result};
use crate::messages::{Message, MessageQueue};

/// Fields of the current last block a miner needs to start a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tip {
    pub id: u64,
    pub hash: String,
    pub difficulty: u32,
}

#[derive(Debug, Default)]
struct ChainState {
    blocks: Vec<Block>,
    difficulty: u32,
    pending: MessageQueue,
}

impl ChainState {
    fn is_complete(&self, target_length: usize) -> bool {
        self.blocks.len() >= target_length
    }
}

/// Shared, append-only chain with proof-of-work difficulty adjustment.
///
/// Blocks, current difficulty and pending messages sit behind a single
/// lock that is only held for short reads and the commit itself.
#[derive(Debug)]
pub struct Chain {
    state: Mutex<ChainState>,
    target_length: usize,
    policy: DifficultyPolicy,
}

impl Chain {
    pub fn new(target_length: usize, policy: DifficultyPolicy) -> Self {
        Self {
            state: Mutex::new(ChainState::default()),
            target_length,
            policy,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChainState>> {
        self.state.lock().map_err(|_| ChainError::LockPoisoned)
    }

    /// Mine and commit the genesis block. Must run once, before any worker
    /// is started.
    pub fn initialize(&self) -> Result<()> {
        if !self.lock()?.blocks.is_empty() {
            return Err(ChainError::AlreadyInitialized);
        }

        let genesis = Block::genesis(&self.policy);

        let mut state = self.lock()?;
        if !state.blocks.is_empty() {
            return Err(ChainError::AlreadyInitialized);
        }
        state.difficulty = genesis.next_difficulty_target;
        info!(
            "GENESIS hash={} next_diff={}",
            genesis.hash, state.difficulty
        );
        state.blocks.push(genesis);
        Ok(())
    }

    pub fn snapshot_tip(&self) -> Result<Tip> {
        let state = self.lock()?;
        let last = state.blocks.last().ok_or(ChainError::EmptyChain)?;
        Ok(Tip {
            id: last.id,
            hash: last.hash.clone(),
            difficulty: state.difficulty,
        })
    }

    /// Append `candidate` if it still extends the current tip and the chain
    /// has room. Pending messages become its payload. `Ok(false)` means
    /// another miner got there first or the chain is already complete.
    pub fn try_commit(&self, mut candidate: Block) -> Result<bool> {
        let mut state = self.lock()?;

        if state.is_complete(self.target_length) {
            debug!(
                "miner {} late with block #{}: chain complete",
                candidate.miner_id, candidate.id
            );
            return Ok(false);
        }
        let extends_tip = state
            .blocks
            .last()
            .is_some_and(|last| last.hash == candidate.hash_prev);
        if !extends_tip {
            debug!(
                "stale candidate #{} from miner {}: head moved",
                candidate.id, candidate.miner_id
            );
            return Ok(false);
        }

        if !state.pending.is_empty() {
            candidate.payload = state.pending.drain_all();
        }
        state.difficulty = candidate.next_difficulty_target;
        info!(
            "ACCEPTED block #{} from miner {} (hash={}, nonce={}, {}s, msgs={}, next_diff={})",
            candidate.id,
            candidate.miner_id,
            candidate.hash,
            candidate.nonce,
            candidate.elapsed_secs,
            candidate.payload.len(),
            state.difficulty
        );
        state.blocks.push(candidate);
        Ok(true)
    }

    /// Queue a message for the next committed block. Returns `false` (and
    /// drops the message) once the chain is complete.
    pub fn submit_message(&self, message: Message) -> Result<bool> {
        let mut state = self.lock()?;
        if state.is_complete(self.target_length) {
            return Ok(false);
        }
        state.pending.push(message);
        debug!("pending messages: {}", state.pending.len());
        Ok(true)
    }

    pub fn is_complete(&self) -> bool {
        // a poisoned lock means a worker died mid-commit; stop everyone
        self.lock()
            .map(|s| s.is_complete(self.target_length))
            .unwrap_or(true)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.blocks.len())
    }

    pub fn difficulty(&self) -> Result<u32> {
        Ok(self.lock()?.difficulty)
    }

    pub fn target_length(&self) -> usize {
        self.target_length
    }

    pub fn policy(&self) -> &DifficultyPolicy {
        &self.policy
    }

    /// Cloned snapshot of the committed blocks.
    pub fn blocks(&self) -> Result<Vec<Block>> {
        Ok(self.lock()?.blocks.clone())
    }

    /// Messages accepted but not yet embedded in a block.
    pub fn pending_messages(&self) -> Result<Vec<Message>> {
        Ok(self.lock()?.pending.iter().cloned().collect())
    }

    /// Validate the entire chain: genesis shape, linkage, ids, hashes and PoW.
    pub fn is_valid_chain(&self) -> Result<bool> {
        let state = self.lock()?;
        Ok(validate_blocks(&state.blocks))
    }
}

/// Structural validation of a committed block sequence.
pub fn validate_blocks(blocks: &[Block]) -> bool {
    let Some(genesis) = blocks.first() else {
        return false;
    };
    if genesis.id != 1
        || genesis.hash_prev != GENESIS_PREV_HASH
        || genesis.difficulty_target != GENESIS_DIFFICULTY
        || !genesis.is_valid()
    {
        return false;
    }

    blocks.windows(2).all(|pair| {
        let (prev, current) = (&pair[0], &pair[1]);
        current.hash_prev == prev.hash
            && current.id == prev.id + 1
            && current.difficulty_target == prev.next_difficulty_target
            && current.is_valid()
    })
}
