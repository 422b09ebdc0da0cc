use log::{debug, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::blockchain::{Block, Chain};
use crate::error::Result;

/// Per-miner tally returned when a miner thread exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinerStats {
    pub miner_id: u32,
    pub blocks_won: usize,
    pub stale_candidates: usize,
}

/// Mine on the current tip until the chain is complete or `stop` is raised.
/// A search that has started always runs to the end; completion and the
/// stop signal are re-checked between searches.
pub fn run(miner_id: u32, chain: Arc<Chain>, stop: Arc<AtomicBool>) -> Result<MinerStats> {
    let mut stats = MinerStats {
        miner_id,
        ..MinerStats::default()
    };

    while !chain.is_complete() && !stop.load(Ordering::Relaxed) {
        let tip = chain.snapshot_tip()?;
        let candidate = Block::mine(
            tip.id + 1,
            tip.hash,
            tip.difficulty,
            miner_id,
            chain.policy(),
        );

        if stop.load(Ordering::Relaxed) {
            break;
        }
        if chain.try_commit(candidate)? {
            stats.blocks_won += 1;
        } else {
            stats.stale_candidates += 1;
            debug!("miner {miner_id} - candidate for #{} discarded", tip.id + 1);
        }
    }

    info!(
        "miner {} done: won={} stale={}",
        miner_id, stats.blocks_won, stats.stale_candidates
    );
    Ok(stats)
}
