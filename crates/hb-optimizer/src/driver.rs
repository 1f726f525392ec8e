//! The sequential optimization loop.

use hb_bridge::Objective;
use hb_types::{HbResult, SearchSpace};
use tracing::{error, info, warn};

use crate::config::RunConfig;
use crate::search::SearchStrategy;
use crate::trial::{ObjectiveDirection, OptimizationStatus, Trial};

/// Asks a strategy for one assignment at a time and evaluates it.
///
/// Each iteration calls the objective exactly once and waits for it to
/// return before asking for the next assignment.
pub struct OptimizationDriver {
    space: SearchSpace,
    strategy: Box<dyn SearchStrategy>,
    max_iters: usize,
    status: OptimizationStatus,
}

impl OptimizationDriver {
    pub fn new(
        name: &str,
        space: SearchSpace,
        strategy: Box<dyn SearchStrategy>,
        max_iters: usize,
        direction: ObjectiveDirection,
    ) -> Self {
        let status = OptimizationStatus::new(name, strategy.name(), direction);
        Self {
            space,
            strategy,
            max_iters,
            status,
        }
    }

    pub fn from_config(config: &RunConfig) -> HbResult<Self> {
        config.validate()?;
        Ok(Self::new(
            &config.name,
            config.constraints.clone(),
            config.build_strategy()?,
            config.max_iters,
            config.direction,
        ))
    }

    pub fn status(&self) -> &OptimizationStatus {
        &self.status
    }

    pub fn into_status(self) -> OptimizationStatus {
        self.status
    }

    /// Run until `max_iters` evaluations are done or the strategy runs dry.
    ///
    /// The first failure marks the run failed and is returned; the status
    /// keeps every trial up to and including the failed one.
    pub fn run<O: Objective>(&mut self, objective: &mut O) -> HbResult<&OptimizationStatus> {
        info!(
            run = %self.status.name,
            strategy = %self.status.strategy,
            max_iters = self.max_iters,
            "optimization started"
        );
        self.status.mark_running();

        for iteration in 1..=self.max_iters {
            let Some(params) = self.strategy.suggest(1).pop() else {
                warn!(iteration, "strategy exhausted before max_iters");
                break;
            };

            let mut trial = Trial::new(iteration as u64, params);
            let outcome = self
                .space
                .check(&trial.parameters)
                .and_then(|_| {
                    trial.mark_running();
                    objective.evaluate(&trial.parameters)
                });

            match outcome {
                Ok(value) => {
                    self.strategy.report(&trial.parameters, value);
                    trial.mark_completed(value);
                    self.status.record(trial);
                    if let Some(best) = &self.status.best_trial {
                        info!(
                            iteration,
                            value,
                            best = best.objective,
                            best_trial = best.trial_number,
                            "iteration finished"
                        );
                    }
                }
                Err(e) => {
                    error!(iteration, error = %e, "optimization aborted");
                    trial.mark_failed(e.to_string());
                    self.status.record(trial);
                    self.status.mark_failed(e.to_string());
                    return Err(e);
                }
            }
        }

        self.status.mark_completed();
        info!(
            completed = self.status.trials_completed,
            best = ?self.status.best_trial.as_ref().map(|b| b.objective),
            "optimization finished"
        );
        Ok(&self.status)
    }
}
