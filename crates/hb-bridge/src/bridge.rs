//! The objective handed to the optimization driver.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use hb_types::{HbResult, ParameterSet};
use tracing::{error, info};

use crate::config::BridgeConfig;
use crate::sequencer::{JobId, JobSequencer};
use crate::store::ParameterStore;
use crate::waiter::ResultWaiter;

/// A black-box objective: named parameter assignment in, scalar out.
pub trait Objective {
    fn evaluate(&mut self, params: &ParameterSet) -> HbResult<f64>;
}

impl<F> Objective for F
where
    F: FnMut(&ParameterSet) -> HbResult<f64>,
{
    fn evaluate(&mut self, params: &ParameterSet) -> HbResult<f64> {
        self(params)
    }
}

/// Evaluates the objective out of process through the filesystem.
///
/// Each call allocates the next job id, writes the parameter record, then
/// blocks on the result record for that id. Calls take `&mut self`, so one
/// bridge cannot have two jobs in flight.
#[derive(Debug)]
pub struct ObjectiveBridge {
    sequencer: JobSequencer,
    store: ParameterStore,
    waiter: ResultWaiter,
    cancel: Option<Arc<AtomicBool>>,
}

impl ObjectiveBridge {
    pub fn new(config: &BridgeConfig) -> HbResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(
            ParameterStore::new(config.params_path()),
            ResultWaiter::new(config.results_path(), config.poll.clone()),
        ))
    }

    pub fn from_parts(store: ParameterStore, waiter: ResultWaiter) -> Self {
        Self {
            sequencer: JobSequencer::new(),
            store,
            waiter,
            cancel: None,
        }
    }

    /// Abort a pending wait once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn waiter(&self) -> &ResultWaiter {
        &self.waiter
    }

    /// Id of the most recent job, 0 before the first evaluation.
    pub fn last_job_id(&self) -> JobId {
        self.sequencer.last_id()
    }

    pub fn evaluate(&mut self, params: &ParameterSet) -> HbResult<f64> {
        let job_id = self.sequencer.next_id();
        info!(job_id, ?params, "job allocated");

        let outcome = self
            .store
            .write(job_id, params)
            .and_then(|_| self.waiter.read_with_cancel(job_id, self.cancel.as_deref()));

        match outcome {
            Ok(value) => {
                info!(job_id, value, "job completed");
                Ok(value)
            }
            Err(e) => {
                error!(job_id, error = %e, "job failed");
                Err(e)
            }
        }
    }
}

impl Objective for ObjectiveBridge {
    fn evaluate(&mut self, params: &ParameterSet) -> HbResult<f64> {
        ObjectiveBridge::evaluate(self, params)
    }
}
