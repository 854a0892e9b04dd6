//! Acquisition tuning knobs.
//!
//! Every field has a default, a config file only needs to mention the values it
//! overrides:
//!
//! ```toml
//! chunk_size = 4194304
//! concurrency = 4
//! eval_timeout_ms = 5000
//! ```

use crate::error::Error;
use crate::muted_error;
use log::{error, warn};
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

/// Largest single `readMemory` request. Debug adapters reject (or stall on)
/// messages much bigger than this.
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;
/// Size of each of the three windows read by the change sampler.
pub const DEFAULT_SAMPLE_WINDOW: u64 = 512;
pub const DEFAULT_EVAL_TIMEOUT: Duration = Duration::from_millis(3000);
/// Largest range a single acquisition may read.
pub const DEFAULT_MAX_READ_BYTES: u64 = 1024 * 1024 * 1024;

const MIN_CONCURRENCY: usize = 2;
const MAX_CONCURRENCY: usize = 8;
const CONCURRENCY_HARD_LIMIT: usize = 64;

/// Default number of chunk readers: host CPU count bounded to `[2, 8]`.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(MIN_CONCURRENCY)
        .clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

/// Number of base64 characters needed to encode `bytes` bytes.
pub const fn base64_len(bytes: u64) -> usize {
    (bytes.div_ceil(3) * 4) as usize
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcquireConfig {
    pub chunk_size: u64,
    pub concurrency: usize,
    pub sample_window: u64,
    /// Characters taken from each sample reply when building a fingerprint.
    /// Never less than the encoding of a whole window, see [`Self::fingerprint_prefix`].
    pub fingerprint_prefix: Option<usize>,
    pub eval_timeout_ms: u64,
    /// Ranges longer than this are refused instead of read.
    pub max_read_bytes: u64,
    /// Child-list expansion limit for nested containers.
    pub max_resolve_depth: usize,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: default_concurrency(),
            sample_window: DEFAULT_SAMPLE_WINDOW,
            fingerprint_prefix: None,
            eval_timeout_ms: DEFAULT_EVAL_TIMEOUT.as_millis() as u64,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            max_resolve_depth: 3,
        }
    }
}

impl AcquireConfig {
    const DEFAULT_PATH: &'static str = ".config/memviz/acquire.toml";

    /// Parse configuration from TOML text.
    pub fn from_toml(data: &str) -> Result<Self, Error> {
        let config: AcquireConfig = toml::de::from_str(data)?;
        Ok(config.normalized())
    }

    /// Load configuration from file, fall back to defaults on any error.
    pub fn load(path: Option<&Path>) -> Self {
        let data = match path {
            None => {
                let Some(home) = home::home_dir() else {
                    return Self::default();
                };
                match muted_error!("config", read_to_string(home.join(Self::DEFAULT_PATH))) {
                    Some(data) => data,
                    None => return Self::default(),
                }
            }
            Some(path) => match read_to_string(path) {
                Ok(data) => data,
                Err(err) => {
                    error!(target: "config", "Error while load config file {path:?}: {err}");
                    return Self::default();
                }
            },
        };

        match Self::from_toml(&data) {
            Ok(config) => config,
            Err(err) => {
                error!(target: "config", "Invalid acquisition config: {err}");
                Self::default()
            }
        }
    }

    /// Number of base64 characters of each sample window that go into a fingerprint.
    pub fn fingerprint_prefix(&self) -> usize {
        let whole_window = base64_len(self.sample_window);
        self.fingerprint_prefix
            .map_or(whole_window, |prefix| prefix.max(whole_window))
    }

    pub fn eval_timeout(&self) -> Duration {
        Duration::from_millis(self.eval_timeout_ms)
    }

    fn normalized(mut self) -> Self {
        self.chunk_size = self.chunk_size.max(1);
        self.concurrency = self.concurrency.clamp(1, CONCURRENCY_HARD_LIMIT);
        self.sample_window = self.sample_window.max(1);
        self.max_resolve_depth = self.max_resolve_depth.max(1);
        self.max_read_bytes = self.max_read_bytes.max(1);
        if let Some(prefix) = self.fingerprint_prefix {
            let whole_window = base64_len(self.sample_window);
            if prefix < whole_window {
                warn!(
                    target: "config",
                    "fingerprint_prefix {prefix} does not cover a {} bytes window, use {whole_window}",
                    self.sample_window
                );
                self.fingerprint_prefix = Some(whole_window);
            }
        }
        self
    }
}
