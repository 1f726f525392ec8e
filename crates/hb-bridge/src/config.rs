//! Bridge configuration: storage locations and polling policy.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hb_types::{HbError, HbResult};

/// How a result wait polls for its record.
///
/// The default polls once per second with no timeout, so a silent evaluator
/// blocks the run indefinitely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Sleep between existence checks, in milliseconds. Zero is treated
    /// as one.
    pub interval_ms: u64,
    /// Give up after this many milliseconds. `None` waits forever.
    pub timeout_ms: Option<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            timeout_ms: None,
        }
    }
}

/// Whole milliseconds, rounded up so a short duration never becomes zero.
fn ceil_millis(d: Duration) -> u64 {
    let ms = d.as_millis() + u128::from(d.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(ms).unwrap_or(u64::MAX)
}

impl PollConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = ceil_millis(interval).max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(ceil_millis(timeout));
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout_ms = None;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Where parameter and result records live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Directory holding both storage areas.
    pub work_dir: PathBuf,
    /// Storage area for parameter records, relative to `work_dir`.
    pub params_dir: String,
    /// Storage area for result records, relative to `work_dir`.
    pub results_dir: String,
    pub poll: PollConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            params_dir: "vars".to_string(),
            results_dir: "eval".to_string(),
            poll: PollConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_dirs(mut self, params_dir: &str, results_dir: &str) -> Self {
        self.params_dir = params_dir.to_string();
        self.results_dir = results_dir.to_string();
        self
    }

    pub fn params_path(&self) -> PathBuf {
        self.work_dir.join(&self.params_dir)
    }

    pub fn results_path(&self) -> PathBuf {
        self.work_dir.join(&self.results_dir)
    }

    /// The two storage areas must be distinct and non-empty.
    pub fn validate(&self) -> HbResult<()> {
        if self.params_dir.trim().is_empty() || self.results_dir.trim().is_empty() {
            return Err(HbError::Config("storage area names must not be empty".into()));
        }
        if self.params_path() == self.results_path() {
            return Err(HbError::Config(format!(
                "parameter and result records share the storage area '{}'",
                self.params_dir
            )));
        }
        Ok(())
    }
}
