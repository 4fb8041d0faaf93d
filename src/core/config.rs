/*!
 * Kernel Configuration
 *
 * Tunables for pipes, output capture, locking and process limits.
 *
 * Environment overrides (all optional):
 * - KERNEL_PIPE_CAPACITY: pipe buffer size in bytes
 * - KERNEL_DRAIN_CHUNK_SIZE: bytes requested per output drain read
 * - KERNEL_DRAIN_GRACE_MS: wait for captured streams after child exit
 * - KERNEL_LOCK_WAIT_MS: upper bound for blocking flock
 * - KERNEL_MAX_PROCESSES: live process limit
 * - KERNEL_MAX_DESCRIPTORS: descriptors per table
 * - KERNEL_INIT_DIR: working directory of the init process
 */

use super::errors::KernelError;
use super::limits::*;
use super::types::KernelResult;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::str::FromStr;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct KernelConfig {
    pub pipe_capacity: usize,
    pub drain_chunk_size: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "drain_grace_ms")]
    pub drain_grace: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "lock_wait_ms")]
    pub lock_wait_timeout: Duration,
    pub max_processes: usize,
    pub max_descriptors: usize,
    pub init_dir: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            drain_chunk_size: DEFAULT_DRAIN_CHUNK_SIZE,
            drain_grace: DEFAULT_DRAIN_GRACE,
            lock_wait_timeout: DEFAULT_LOCK_WAIT_TIMEOUT,
            max_processes: MAX_LIVE_PROCESSES,
            max_descriptors: STANDARD_MAX_FILE_DESCRIPTORS,
            init_dir: "/".to_string(),
        }
    }
}

impl KernelConfig {
    /// Defaults overlaid with `KERNEL_*` environment variables
    pub fn from_env() -> KernelResult<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse::<usize>("KERNEL_PIPE_CAPACITY")? {
            config.pipe_capacity = v;
        }
        if let Some(v) = env_parse::<usize>("KERNEL_DRAIN_CHUNK_SIZE")? {
            config.drain_chunk_size = v;
        }
        if let Some(v) = env_parse::<u64>("KERNEL_DRAIN_GRACE_MS")? {
            config.drain_grace = Duration::from_millis(v);
        }
        if let Some(v) = env_parse::<u64>("KERNEL_LOCK_WAIT_MS")? {
            config.lock_wait_timeout = Duration::from_millis(v);
        }
        if let Some(v) = env_parse::<usize>("KERNEL_MAX_PROCESSES")? {
            config.max_processes = v;
        }
        if let Some(v) = env_parse::<usize>("KERNEL_MAX_DESCRIPTORS")? {
            config.max_descriptors = v;
        }
        if let Ok(dir) = std::env::var("KERNEL_INIT_DIR") {
            config.init_dir = dir;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> KernelResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| KernelError::Configuration(format!("invalid config: {}", e).into()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> KernelResult<()> {
        if self.pipe_capacity == 0 || self.pipe_capacity > MAX_PIPE_CAPACITY {
            return Err(KernelError::Configuration(
                format!(
                    "pipe_capacity must be in 1..={}, got {}",
                    MAX_PIPE_CAPACITY, self.pipe_capacity
                )
                .into(),
            ));
        }
        if self.drain_chunk_size == 0 {
            return Err(KernelError::Configuration(
                "drain_chunk_size must be non-zero".into(),
            ));
        }
        // 0, 1 and 2 must fit for the init process
        if self.max_descriptors < 3 {
            return Err(KernelError::Configuration(
                format!("max_descriptors must be at least 3, got {}", self.max_descriptors).into(),
            ));
        }
        if self.max_processes == 0 {
            return Err(KernelError::Configuration(
                "max_processes must be non-zero".into(),
            ));
        }
        if !self.init_dir.starts_with('/') {
            return Err(KernelError::Configuration(
                format!("init_dir must be absolute, got {:?}", self.init_dir).into(),
            ));
        }
        Ok(())
    }

    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    pub fn with_lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait_timeout = timeout;
        self
    }

    pub fn with_pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity;
        self
    }

    pub fn with_max_processes(mut self, max: usize) -> Self {
        self.max_processes = max;
        self
    }

    pub fn with_max_descriptors(mut self, max: usize) -> Self {
        self.max_descriptors = max;
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> KernelResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| KernelError::Configuration(format!("{}={:?}: {}", key, raw, e).into())),
        Err(_) => Ok(None),
    }
}
