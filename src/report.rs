use serde::Serialize;
use std::fmt::Write;

use crate::blockchain::{Block, DifficultyChange};
use crate::config::ReportFormat;
use crate::workers::SimulationOutcome;

#[derive(Serialize)]
struct ChainReport<'a> {
    length: usize,
    chain: &'a [Block],
}

pub fn render(outcome: &SimulationOutcome, format: ReportFormat) -> serde_json::Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(&outcome.blocks)),
        ReportFormat::Json => render_json(&outcome.blocks),
    }
}

pub fn render_json(blocks: &[Block]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ChainReport {
        length: blocks.len(),
        chain: blocks,
    })
}

/// One human-readable section per block, separated by blank lines.
pub fn render_text(blocks: &[Block]) -> String {
    let mut out = String::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        // writing into a String cannot fail
        let _ = write_block(&mut out, block);
    }
    out
}

fn write_block(out: &mut String, b: &Block) -> std::fmt::Result {
    writeln!(out, "Block:")?;
    if b.miner_id == 0 {
        writeln!(out, "Created by: genesis")?;
    } else {
        writeln!(out, "Created by miner # {}", b.miner_id)?;
    }
    writeln!(out, "Id: {}", b.id)?;
    writeln!(out, "Timestamp: {}", b.timestamp)?;
    writeln!(out, "Magic number: {}", b.nonce)?;
    writeln!(out, "Hash of the previous block:\n{}", b.hash_prev)?;
    writeln!(out, "Hash of the block:\n{}", b.hash)?;
    if b.payload.is_empty() {
        writeln!(out, "Block data: no messages")?;
    } else {
        writeln!(out, "Block data:")?;
        for m in &b.payload {
            writeln!(out, "{}: {}", m.sender, m.text)?;
        }
    }
    writeln!(out, "Block was generating for {} seconds", b.elapsed_secs)?;
    match b.difficulty_change() {
        DifficultyChange::Increased => {
            writeln!(out, "N was increased to {}", b.next_difficulty_target)
        }
        DifficultyChange::Decreased => {
            writeln!(out, "N was decreased to {}", b.next_difficulty_target)
        }
        DifficultyChange::Unchanged => writeln!(out, "N stays the same"),
    }
}
