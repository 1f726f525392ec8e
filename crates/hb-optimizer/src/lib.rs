//! # hb-optimizer
//!
//! Sequential optimization driven through the hopt file bridge.
//!
//! Provides run configuration, parameter sweep strategies (grid and seeded
//! random), trial tracking, the optimization loop, and a command-backed
//! evaluator for the worker side.

mod command;
mod config;
mod driver;
mod search;
mod trial;

pub use command::{CommandObjective, ENV_JOB_ID, ENV_PARAMS_FILE};
pub use config::{RunConfig, ENV_POLL_INTERVAL_MS, ENV_WORK_DIR};
pub use driver::OptimizationDriver;
pub use search::{GridSearch, RandomSearch, SearchStrategy, StrategyKind};
pub use trial::{
    ObjectiveDirection, OptimizationId, OptimizationState, OptimizationStatus, Trial,
    TrialResult, TrialStatus,
};
