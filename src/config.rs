use log::warn;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ChainError, Result};

pub const DEFAULT_CHAIN_LENGTH: usize = 5;
pub const DEFAULT_MINERS: usize = 10;
pub const DEFAULT_SENDERS: usize = 3;
pub const DEFAULT_MAX_MESSAGE_DELAY_MS: u64 = 100;

/// Blocks mined faster than this raise the next difficulty by one.
pub const DIFFICULTY_INCREASE_BELOW_SECS: u64 = 15;

/// Blocks mined this slowly (or slower) lower the next difficulty by one.
pub const DIFFICULTY_DECREASE_AT_SECS: u64 = 60;

/// Extra decimal digits added to the nonce range beyond the difficulty.
pub const SEARCH_EXTRA_DIGITS: u32 = 2;

/// Failed draws before a search restarts with a fresh timestamp.
pub const MAX_NONCE_ATTEMPTS: u64 = 50_000_000;

/// Difficulty adjustment and nonce search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyPolicy {
    pub increase_below_secs: u64,
    pub decrease_at_secs: u64,
    pub extra_digits: u32,
    pub max_attempts: u64,
}

impl Default for DifficultyPolicy {
    fn default() -> Self {
        Self {
            increase_below_secs: DIFFICULTY_INCREASE_BELOW_SECS,
            decrease_at_secs: DIFFICULTY_DECREASE_AT_SECS,
            extra_digits: SEARCH_EXTRA_DIGITS,
            max_attempts: MAX_NONCE_ATTEMPTS,
        }
    }
}

impl DifficultyPolicy {
    /// A policy that never moves the difficulty.
    pub fn frozen() -> Self {
        Self {
            increase_below_secs: 0,
            decrease_at_secs: u64::MAX,
            ..Self::default()
        }
    }

    /// Difficulty for the block after one that took `elapsed_secs` at `current`.
    pub fn next_difficulty(&self, current: u32, elapsed_secs: u64) -> u32 {
        if elapsed_secs < self.increase_below_secs {
            current.saturating_add(1)
        } else if elapsed_secs >= self.decrease_at_secs {
            current.saturating_sub(1)
        } else {
            current
        }
    }

    /// Exclusive upper bound of the nonce range for `difficulty`.
    pub fn nonce_upper_bound(&self, difficulty: u32) -> u64 {
        10u64
            .checked_pow(difficulty.saturating_add(self.extra_digits))
            .unwrap_or(u64::MAX)
            .max(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ChainError::InvalidConfig(format!(
                "unknown report format {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub chain_length: usize,
    pub miners: usize,
    pub senders: usize,
    pub max_message_delay_ms: u64,
    pub policy: DifficultyPolicy,
    pub run_timeout: Option<Duration>,
    pub report_format: ReportFormat,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            chain_length: DEFAULT_CHAIN_LENGTH,
            miners: DEFAULT_MINERS,
            senders: DEFAULT_SENDERS,
            max_message_delay_ms: DEFAULT_MAX_MESSAGE_DELAY_MS,
            policy: DifficultyPolicy::default(),
            run_timeout: None,
            report_format: ReportFormat::Text,
        }
    }
}

impl SimConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Missing or
    /// unparseable numbers fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DifficultyPolicy::default();
        let policy = DifficultyPolicy {
            increase_below_secs: parse_or(
                &lookup,
                "DIFFICULTY_INCREASE_BELOW_SECS",
                defaults.increase_below_secs,
            ),
            decrease_at_secs: parse_or(
                &lookup,
                "DIFFICULTY_DECREASE_AT_SECS",
                defaults.decrease_at_secs,
            ),
            extra_digits: parse_or(&lookup, "SEARCH_EXTRA_DIGITS", defaults.extra_digits),
            max_attempts: parse_or(&lookup, "MAX_NONCE_ATTEMPTS", defaults.max_attempts),
        };

        let report_format = match lookup("REPORT_FORMAT") {
            Some(v) => v.parse()?,
            None => ReportFormat::Text,
        };

        let cfg = Self {
            chain_length: parse_or(&lookup, "CHAIN_LENGTH", DEFAULT_CHAIN_LENGTH),
            miners: parse_or(&lookup, "MINERS", DEFAULT_MINERS),
            senders: parse_or(&lookup, "SENDERS", DEFAULT_SENDERS),
            max_message_delay_ms: parse_or(
                &lookup,
                "MAX_MESSAGE_DELAY_MS",
                DEFAULT_MAX_MESSAGE_DELAY_MS,
            ),
            policy,
            run_timeout: lookup("RUN_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
            report_format,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain_length == 0 {
            return Err(ChainError::InvalidConfig(
                "chain length must be at least 1".into(),
            ));
        }
        if self.miners == 0 {
            return Err(ChainError::InvalidConfig(
                "at least one miner is required".into(),
            ));
        }
        if self.senders > 0 && self.max_message_delay_ms == 0 {
            return Err(ChainError::InvalidConfig(
                "max message delay must be > 0 ms".into(),
            ));
        }
        if self.policy.max_attempts == 0 {
            return Err(ChainError::InvalidConfig(
                "max nonce attempts must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("{key}={raw:?} is not a valid number, using default");
                default
            }
        },
    }
}
