use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Chain already initialized")]
    AlreadyInitialized,

    #[error("Chain has no genesis block")]
    EmptyChain,

    #[error("Committed chain failed validation")]
    InvalidChain,

    #[error("Chain state lock poisoned")]
    LockPoisoned,

    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("Run stopped before completion ({length}/{target} blocks)")]
    TimedOut { length: usize, target: usize },
}

pub type Result<T> = std::result::Result<T, ChainError>;
