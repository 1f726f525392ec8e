//! # hb-bridge
//!
//! File-based rendezvous between a sequential black-box optimizer and an
//! out-of-process evaluator.
//!
//! For each objective evaluation the optimizer side allocates a job id,
//! writes the proposed parameters to `<work_dir>/vars/<id>` and blocks until
//! the evaluator side writes a single floating-point literal to
//! `<work_dir>/eval/<id>`.

mod bridge;
mod config;
mod evaluator;
mod sequencer;
mod store;
mod waiter;

pub use bridge::{Objective, ObjectiveBridge};
pub use config::{BridgeConfig, PollConfig};
pub use evaluator::{EvaluatorWorker, ObjectiveFunction, ResultWriter};
pub use sequencer::{AtomicJobSequencer, JobId, JobSequencer};
pub use store::ParameterStore;
pub use waiter::{parse_result, ResultWaiter};
