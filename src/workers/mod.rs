pub mod miner;
pub mod sender;

use log::{error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub use miner::MinerStats;
pub use sender::SenderStats;

use crate::blockchain::{Block, Chain};
use crate::config::SimConfig;
use crate::error::{ChainError, Result};

const SENDER_NAMES: &[&str] = &["Tom", "Sarah", "Nick", "Kelly", "Alice", "Bob"];

/// How often the watchdog looks at the chain while a timeout is armed.
const WATCHDOG_TICK: Duration = Duration::from_millis(20);

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub blocks: Vec<Block>,
    pub miners: Vec<MinerStats>,
    pub senders: Vec<SenderStats>,
}

fn sender_name(index: usize) -> String {
    let base = SENDER_NAMES[index % SENDER_NAMES.len()];
    match index / SENDER_NAMES.len() {
        0 => base.to_string(),
        round => format!("{base}{}", round + 1),
    }
}

fn spawn_named<T, F>(name: String, f: F) -> Result<JoinHandle<Result<T>>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(f)
        .map_err(|e| ChainError::WorkerPanicked(format!("{name}: spawn failed: {e}")))
}

fn join_worker<T>(handle: JoinHandle<Result<T>>) -> Result<T> {
    let name = handle.thread().name().unwrap_or("worker").to_string();
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(ChainError::WorkerPanicked(name)),
    }
}

/// Raise `stop` if the chain is still incomplete at `deadline`. Returns
/// whether the signal was raised.
fn watch(chain: &Chain, stop: &AtomicBool, deadline: Instant) -> bool {
    while !chain.is_complete() && !stop.load(Ordering::Relaxed) {
        if Instant::now() >= deadline {
            warn!(
                "run deadline reached at {}/{} blocks, stopping workers",
                chain.len().unwrap_or(0),
                chain.target_length()
            );
            stop.store(true, Ordering::Relaxed);
            return true;
        }
        thread::sleep(WATCHDOG_TICK);
    }
    false
}

/// Seed the chain with genesis, run miners and senders until the chain
/// reaches `config.chain_length` blocks, then collect the results.
pub fn run_simulation(config: &SimConfig) -> Result<SimulationOutcome> {
    config.validate()?;

    let chain = Arc::new(Chain::new(config.chain_length, config.policy));
    chain.initialize()?;

    let stop = Arc::new(AtomicBool::new(false));
    let started = Instant::now();
    info!(
        "starting {} miners and {} senders for a {}-block chain",
        config.miners, config.senders, config.chain_length
    );

    let mut miner_handles = Vec::with_capacity(config.miners);
    for i in 0..config.miners {
        let miner_id = (i + 1) as u32;
        let chain = Arc::clone(&chain);
        let stop = Arc::clone(&stop);
        miner_handles.push(spawn_named(format!("miner-{miner_id}"), move || {
            miner::run(miner_id, chain, stop)
        })?);
    }

    let mut sender_handles = Vec::with_capacity(config.senders);
    for i in 0..config.senders {
        let name = sender_name(i);
        let chain = Arc::clone(&chain);
        let stop = Arc::clone(&stop);
        let max_delay_ms = config.max_message_delay_ms;
        sender_handles.push(spawn_named(format!("sender-{name}"), move || {
            sender::run(name, chain, max_delay_ms, stop)
        })?);
    }

    let watchdog = match config.run_timeout {
        Some(timeout) => {
            let chain = Arc::clone(&chain);
            let stop = Arc::clone(&stop);
            Some(spawn_named("watchdog".to_string(), move || {
                watch(&chain, &stop, started + timeout);
                Ok(())
            })?)
        }
        None => None,
    };

    let mut first_err = None;
    let mut miners = Vec::with_capacity(miner_handles.len());
    for handle in miner_handles {
        match join_worker(handle) {
            Ok(stats) => miners.push(stats),
            Err(e) => {
                error!("{e}");
                stop.store(true, Ordering::Relaxed);
                first_err.get_or_insert(e);
            }
        }
    }
    // senders only exit on completion or stop
    if !chain.is_complete() {
        stop.store(true, Ordering::Relaxed);
    }
    let mut senders = Vec::with_capacity(sender_handles.len());
    for handle in sender_handles {
        match join_worker(handle) {
            Ok(stats) => senders.push(stats),
            Err(e) => {
                error!("{e}");
                first_err.get_or_insert(e);
            }
        }
    }
    if let Some(handle) = watchdog {
        if let Err(e) = join_worker(handle) {
            first_err.get_or_insert(e);
        }
    }
    if let Some(e) = first_err {
        return Err(e);
    }

    let blocks = chain.blocks()?;
    if blocks.len() < config.chain_length {
        return Err(ChainError::TimedOut {
            length: blocks.len(),
            target: config.chain_length,
        });
    }

    if !chain.is_valid_chain()? {
        return Err(ChainError::InvalidChain);
    }
    let stale = chain.pending_messages()?.len();
    if stale > 0 {
        warn!("{stale} messages left pending at shutdown");
    }

    info!(
        "chain complete: {} blocks in {:.2?}, final difficulty {}",
        blocks.len(),
        started.elapsed(),
        chain.difficulty()?
    );
    Ok(SimulationOutcome {
        blocks,
        miners,
        senders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::model::validate_blocks;
    use crate::config::DifficultyPolicy;
    use crate::hashing::meets_difficulty;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn config(chain_length: usize, miners: usize, senders: usize) -> SimConfig {
        SimConfig {
            chain_length,
            miners,
            senders,
            max_message_delay_ms: 3,
            policy: DifficultyPolicy::frozen(),
            ..SimConfig::default()
        }
    }

    fn assert_chain_invariants(blocks: &[Block]) {
        assert_eq!(blocks[0].hash_prev, "0");
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].hash_prev, pair[0].hash);
            assert_eq!(pair[1].id, pair[0].id + 1);
        }
        for b in blocks {
            assert!(meets_difficulty(&b.hash, b.difficulty_target));
        }
        assert!(validate_blocks(blocks));
    }

    #[test]
    fn exact_length_regardless_of_miner_count() {
        for miners in [1, 10, 50] {
            let outcome = run_simulation(&config(6, miners, 0)).unwrap();
            assert_eq!(outcome.blocks.len(), 6, "miners={miners}");
            assert_eq!(outcome.miners.len(), miners);
            let won: usize = outcome.miners.iter().map(|m| m.blocks_won).sum();
            assert_eq!(won, 5);
            assert_chain_invariants(&outcome.blocks);
        }
    }

    #[test]
    fn one_miner_difficulty_zero_three_blocks() {
        let outcome = run_simulation(&config(3, 1, 0)).unwrap();
        let b = &outcome.blocks;
        assert_eq!(b.len(), 3);
        assert_eq!(b[0].hash_prev, "0");
        assert_eq!(b[1].hash_prev, b[0].hash);
        assert_eq!(b[2].hash_prev, b[1].hash);
        assert!(b.iter().all(|blk| blk.difficulty_target == 0));
    }

    #[test]
    fn adjusting_difficulty_follows_elapsed_time() {
        let cfg = SimConfig {
            policy: DifficultyPolicy::default(),
            ..config(5, 8, 0)
        };
        let outcome = run_simulation(&cfg).unwrap();
        assert_chain_invariants(&outcome.blocks);
        let policy = DifficultyPolicy::default();
        for b in &outcome.blocks {
            let expected = if b.elapsed_secs < policy.increase_below_secs {
                b.difficulty_target + 1
            } else if b.elapsed_secs >= policy.decrease_at_secs {
                b.difficulty_target.saturating_sub(1)
            } else {
                b.difficulty_target
            };
            assert_eq!(b.next_difficulty_target, expected);
        }
    }

    #[test]
    fn every_delivered_message_lands_in_exactly_one_block() {
        let cfg = SimConfig {
            policy: DifficultyPolicy::default(),
            ..config(5, 4, 3)
        };
        let outcome = run_simulation(&cfg).unwrap();

        let mut seen: HashMap<Uuid, usize> = HashMap::new();
        for b in &outcome.blocks {
            for m in &b.payload {
                *seen.entry(m.id).or_default() += 1;
            }
        }
        assert!(seen.values().all(|&n| n == 1));

        let delivered: Vec<Uuid> = outcome
            .senders
            .iter()
            .flat_map(|s| s.delivered.iter().copied())
            .collect();
        assert_eq!(delivered.len(), seen.len());
        assert!(delivered.iter().all(|id| seen.contains_key(id)));
        assert!(outcome.blocks[0].payload.is_empty());
    }

    #[test]
    fn per_sender_order_is_kept_across_blocks() {
        let cfg = SimConfig {
            policy: DifficultyPolicy::default(),
            ..config(4, 2, 2)
        };
        let outcome = run_simulation(&cfg).unwrap();
        let mut last_seq: HashMap<String, u64> = HashMap::new();
        for m in outcome.blocks.iter().flat_map(|b| b.payload.iter()) {
            let prev = last_seq.insert(m.sender.clone(), m.seq).unwrap_or(0);
            assert!(m.seq > prev, "{} out of order", m.sender);
        }
    }

    #[test]
    fn genesis_only_chain_needs_no_mining() {
        let outcome = run_simulation(&config(1, 3, 1)).unwrap();
        assert_eq!(outcome.blocks.len(), 1);
        assert!(outcome.miners.iter().all(|m| m.blocks_won == 0));
    }

    #[test]
    fn watchdog_raises_stop_on_stalled_chain() {
        let chain = Chain::new(3, DifficultyPolicy::frozen());
        chain.initialize().unwrap();
        let stop = AtomicBool::new(false);
        let deadline = Instant::now() + Duration::from_millis(60);
        assert!(watch(&chain, &stop, deadline));
        assert!(stop.load(Ordering::Relaxed));
    }

    #[test]
    fn watchdog_idle_on_complete_chain() {
        let chain = Chain::new(1, DifficultyPolicy::frozen());
        chain.initialize().unwrap();
        let stop = AtomicBool::new(false);
        assert!(!watch(&chain, &stop, Instant::now()));
        assert!(!stop.load(Ordering::Relaxed));
    }

    #[test]
    fn generous_timeout_does_not_disturb_a_run() {
        let cfg = SimConfig {
            run_timeout: Some(Duration::from_secs(120)),
            ..config(4, 3, 1)
        };
        let outcome = run_simulation(&cfg).unwrap();
        assert_eq!(outcome.blocks.len(), 4);
    }

    #[test]
    fn invalid_config_is_rejected_before_any_work() {
        assert!(matches!(
            run_simulation(&config(0, 1, 0)),
            Err(ChainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn sender_names_stay_unique() {
        let names: Vec<String> = (0..13).map(sender_name).collect();
        let mut dedup = names.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), names.len());
        assert_eq!(names[0], "Tom");
        assert_eq!(names[6], "Tom2");
    }
}
