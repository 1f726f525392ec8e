//! Run configuration: the inputs the optimization driver needs before the
//! bridge can run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use hb_bridge::BridgeConfig;
use hb_types::{HbError, HbResult, SearchSpace};
use tracing::info;

use crate::search::{GridSearch, RandomSearch, SearchStrategy, StrategyKind};
use crate::trial::ObjectiveDirection;

/// Overrides the bridge work directory.
pub const ENV_WORK_DIR: &str = "HB_WORK_DIR";
/// Overrides the result polling interval, in milliseconds.
pub const ENV_POLL_INTERVAL_MS: &str = "HB_POLL_INTERVAL_MS";

/// Top-level configuration for an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Seed for every random choice the driver makes.
    pub seed: u64,

    /// Maximum number of objective evaluations.
    pub max_iters: usize,

    /// Parameter name to constraint.
    pub constraints: SearchSpace,

    #[serde(default)]
    pub strategy: StrategyKind,

    #[serde(default)]
    pub direction: ObjectiveDirection,

    /// Points per continuous dimension for grid search.
    #[serde(default = "default_grid_steps")]
    pub grid_steps: usize,

    #[serde(default)]
    pub bridge: BridgeConfig,
}

fn default_name() -> String {
    "hopt".to_string()
}

fn default_grid_steps() -> usize {
    5
}

impl RunConfig {
    pub fn new(constraints: SearchSpace, seed: u64, max_iters: usize) -> Self {
        Self {
            name: default_name(),
            seed,
            max_iters,
            constraints,
            strategy: StrategyKind::default(),
            direction: ObjectiveDirection::default(),
            grid_steps: default_grid_steps(),
            bridge: BridgeConfig::default(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_bridge(mut self, bridge: BridgeConfig) -> Self {
        self.bridge = bridge;
        self
    }

    /// Load a JSON run configuration. Relative work directories are resolved
    /// against the directory containing the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> HbResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HbError::Config(format!("cannot read run config {}: {e}", path.display()))
        })?;
        let mut config: RunConfig = serde_json::from_str(&raw)?;

        if config.bridge.work_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.bridge.work_dir = parent.join(&config.bridge.work_dir);
            }
        }
        info!(path = %path.display(), name = %config.name, "loaded run config");
        Ok(config)
    }

    /// Apply `HB_WORK_DIR` and `HB_POLL_INTERVAL_MS` from the environment.
    pub fn apply_env_overrides(&mut self) -> HbResult<()> {
        self.apply_overrides(
            std::env::var(ENV_WORK_DIR).ok(),
            std::env::var(ENV_POLL_INTERVAL_MS).ok(),
        )
    }

    fn apply_overrides(
        &mut self,
        work_dir: Option<String>,
        poll_interval_ms: Option<String>,
    ) -> HbResult<()> {
        if let Some(dir) = work_dir {
            self.bridge.work_dir = PathBuf::from(dir);
        }
        if let Some(raw) = poll_interval_ms {
            self.bridge.poll.interval_ms = raw.trim().parse().map_err(|_| {
                HbError::Config(format!("{ENV_POLL_INTERVAL_MS} is not an integer: {raw:?}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> HbResult<()> {
        if self.max_iters == 0 {
            return Err(HbError::Config("max_iters must be at least 1".into()));
        }
        if self.strategy == StrategyKind::Grid && self.grid_steps < 2 {
            return Err(HbError::Config("grid_steps must be at least 2".into()));
        }
        self.constraints.validate()?;
        self.bridge.validate()
    }

    pub fn build_strategy(&self) -> HbResult<Box<dyn SearchStrategy>> {
        Ok(match self.strategy {
            StrategyKind::Grid => Box::new(GridSearch::new(&self.constraints, self.grid_steps)),
            StrategyKind::Random => Box::new(RandomSearch::new(self.constraints.clone(), self.seed)?),
        })
    }
}
