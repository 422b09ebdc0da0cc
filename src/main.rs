mod blockchain;
mod config;
mod error;
mod hashing;
mod messages;
mod report;
mod workers;

use dotenvy::dotenv;
use log::{error, info};
use std::process::ExitCode;

use config::SimConfig;

fn main() -> ExitCode {
    let _ = dotenv();
    env_logger::init();

    let config = match SimConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "⛏️ Mining a {}-block chain with {} miners and {} senders",
        config.chain_length, config.miners, config.senders
    );

    let outcome = match workers::run_simulation(&config) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("simulation aborted: {e}");
            return ExitCode::FAILURE;
        }
    };

    for m in &outcome.miners {
        info!(
            "miner {}: won={} stale={}",
            m.miner_id, m.blocks_won, m.stale_candidates
        );
    }
    for s in &outcome.senders {
        info!(
            "sender {}: delivered={} dropped={}",
            s.name,
            s.delivered.len(),
            s.dropped
        );
    }

    match report::render(&outcome, config.report_format) {
        Ok(rendered) => {
            println!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("failed to render chain: {e}");
            ExitCode::FAILURE
        }
    }
}
