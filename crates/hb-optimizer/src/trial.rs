//! Trial tracking and optimization run state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hb_types::ParameterSet;

/// Unique optimization run identifier.
pub type OptimizationId = Uuid;

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveDirection {
    #[default]
    Maximize,
    Minimize,
}

impl ObjectiveDirection {
    /// Whether `candidate` beats `incumbent` in this direction.
    ///
    /// NaN ranks below every number in either direction.
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        if candidate.is_nan() {
            return false;
        }
        if incumbent.is_nan() {
            return true;
        }
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }
}

/// Lifecycle state for an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Aggregate status of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStatus {
    pub id: OptimizationId,
    pub name: String,
    pub strategy: String,
    pub direction: ObjectiveDirection,
    pub state: OptimizationState,
    pub trials_completed: usize,
    pub trials_failed: usize,
    pub best_trial: Option<TrialResult>,
    pub trials: Vec<Trial>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl OptimizationStatus {
    pub fn new(name: impl Into<String>, strategy: &str, direction: ObjectiveDirection) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            strategy: strategy.to_string(),
            direction,
            state: OptimizationState::Pending,
            trials_completed: 0,
            trials_failed: 0,
            best_trial: None,
            trials: Vec::new(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = OptimizationState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = OptimizationState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = OptimizationState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Record a finished trial and update counters and the incumbent.
    pub fn record(&mut self, trial: Trial) {
        match trial.status {
            TrialStatus::Completed => self.trials_completed += 1,
            TrialStatus::Failed => self.trials_failed += 1,
            TrialStatus::Pending | TrialStatus::Running => {}
        }
        if let Some(result) = &trial.result {
            self.update_best(result);
        }
        self.trials.push(trial);
    }

    /// Update the best trial if `result` improves on the current best.
    pub fn update_best(&mut self, result: &TrialResult) {
        let better = match &self.best_trial {
            None => true,
            Some(current_best) => self
                .direction
                .improves(result.objective, current_best.objective),
        };
        if better {
            self.best_trial = Some(result.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Individual trial
// ---------------------------------------------------------------------------

/// One objective evaluation. `trial_number` equals the job id the bridge
/// allocates for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub trial_number: u64,
    pub parameters: ParameterSet,
    pub status: TrialStatus,
    pub result: Option<TrialResult>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Trial {
    pub fn new(trial_number: u64, parameters: ParameterSet) -> Self {
        Self {
            trial_number,
            parameters,
            status: TrialStatus::Pending,
            result: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = TrialStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, objective: f64) {
        let finished = Utc::now();
        let duration_ms = self
            .started_at
            .map(|s| (finished - s).num_milliseconds().max(0) as u64);
        self.status = TrialStatus::Completed;
        self.finished_at = Some(finished);
        self.result = Some(TrialResult {
            trial_number: self.trial_number,
            objective,
            parameters: self.parameters.clone(),
            duration_ms,
        });
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = TrialStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Result of a single trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_number: u64,
    pub objective: f64,
    pub parameters: ParameterSet,
    pub duration_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::parameter_set;

    fn completed(number: u64, objective: f64) -> Trial {
        let mut trial = Trial::new(number, parameter_set([("x", number as f64)]));
        trial.mark_running();
        trial.mark_completed(objective);
        trial
    }

    #[test]
    fn optimization_status_lifecycle() {
        let mut status = OptimizationStatus::new("test_opt", "random", ObjectiveDirection::Minimize);

        assert_eq!(status.state, OptimizationState::Pending);
        assert!(status.started_at.is_none());

        status.mark_running();
        assert_eq!(status.state, OptimizationState::Running);
        assert!(status.started_at.is_some());

        status.mark_completed();
        assert_eq!(status.state, OptimizationState::Completed);
        assert!(status.finished_at.is_some());
    }

    #[test]
    fn nan_results_never_hold_the_best_slot() {
        let mut status = OptimizationStatus::new("nan", "random", ObjectiveDirection::Maximize);
        status.record(completed(1, f64::NAN));
        status.record(completed(2, 5.0));
        status.record(completed(3, 7.0));
        status.record(completed(4, f64::NAN));
        assert_eq!(status.best_trial.as_ref().unwrap().trial_number, 3);

        let mut status = OptimizationStatus::new("nan", "random", ObjectiveDirection::Minimize);
        status.record(completed(1, f64::NAN));
        status.record(completed(2, f64::INFINITY));
        status.record(completed(3, f64::NAN));
        assert_eq!(status.best_trial.as_ref().unwrap().trial_number, 2);
    }

    #[test]
    fn nan_is_kept_only_when_nothing_else_was_seen() {
        let mut status = OptimizationStatus::new("nan", "grid", ObjectiveDirection::Minimize);
        status.record(completed(1, f64::NAN));
        let best = status.best_trial.as_ref().unwrap();
        assert_eq!(best.trial_number, 1);
        assert!(best.objective.is_nan());
        assert!(!ObjectiveDirection::Maximize.improves(f64::NAN, f64::NAN));
    }

    #[test]
    fn best_trial_tracking_maximize() {
        let mut status = OptimizationStatus::new("max", "grid", ObjectiveDirection::Maximize);

        status.record(completed(1, 1.5));
        status.record(completed(2, 2.0));
        // Worse result should not replace
        status.record(completed(3, 1.0));

        let best = status.best_trial.as_ref().unwrap();
        assert_eq!(best.objective, 2.0);
        assert_eq!(best.trial_number, 2);
        assert_eq!(status.trials_completed, 3);
        assert_eq!(status.trials.len(), 3);
    }

    #[test]
    fn best_trial_tracking_minimize() {
        let mut status = OptimizationStatus::new("min", "random", ObjectiveDirection::Minimize);

        status.record(completed(1, 0.15));
        status.record(completed(2, 0.05));
        status.record(completed(3, 0.10));

        assert_eq!(status.best_trial.as_ref().unwrap().objective, 0.05);
    }

    #[test]
    fn trial_lifecycle() {
        let params = parameter_set([("depth", 10)]);
        let mut trial = Trial::new(1, params.clone());
        assert_eq!(trial.status, TrialStatus::Pending);

        trial.mark_running();
        assert_eq!(trial.status, TrialStatus::Running);

        trial.mark_completed(1.8);
        assert_eq!(trial.status, TrialStatus::Completed);
        assert!(trial.finished_at.is_some());
        let result = trial.result.as_ref().unwrap();
        assert_eq!(result.objective, 1.8);
        assert_eq!(result.parameters, params);
        assert!(result.duration_ms.is_some());
    }

    #[test]
    fn trial_failure_is_counted() {
        let mut trial = Trial::new(1, parameter_set([("x", 1)]));
        trial.mark_running();
        trial.mark_failed("malformed result".into());
        assert_eq!(trial.status, TrialStatus::Failed);
        assert_eq!(trial.error.as_deref(), Some("malformed result"));

        let mut status = OptimizationStatus::new("f", "random", ObjectiveDirection::Minimize);
        status.record(trial);
        assert_eq!(status.trials_failed, 1);
        assert!(status.best_trial.is_none());
    }

    #[test]
    fn status_serializes_to_json() {
        let mut status = OptimizationStatus::new("json", "grid", ObjectiveDirection::Maximize);
        status.record(completed(1, 3.14));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["direction"], "maximize");
        assert_eq!(json["best_trial"]["objective"], 3.14);
        let back: OptimizationStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, status);
    }
}
