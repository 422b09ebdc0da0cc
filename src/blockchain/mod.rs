pub mod block;
pub mod model;

pub use block::{Block, DifficultyChange};
pub use model::{Chain, Tip};

/// `hash_prev` of the genesis block.
pub const GENESIS_PREV_HASH: &str = "0";

/// Difficulty the genesis block is mined at.
pub const GENESIS_DIFFICULTY: u32 = 0;
