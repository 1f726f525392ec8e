//! The evaluator side of the bridge.
//!
//! [`EvaluatorWorker`] is the counterpart of [`ObjectiveBridge`](crate::ObjectiveBridge):
//! it waits for parameter record `n`, computes the objective and publishes
//! result record `n`, then moves on to `n + 1`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use hb_types::{HbResult, ParameterSet, StorageError, WaitError};
use tracing::{debug, info};

use crate::config::{BridgeConfig, PollConfig};
use crate::sequencer::JobId;
use crate::store::ParameterStore;

/// Computes the true objective value for one job.
pub trait ObjectiveFunction {
    fn eval(&mut self, params: &ParameterSet, step: JobId) -> HbResult<f64>;
}

impl<F> ObjectiveFunction for F
where
    F: FnMut(&ParameterSet, JobId) -> HbResult<f64>,
{
    fn eval(&mut self, params: &ParameterSet, step: JobId) -> HbResult<f64> {
        self(params, step)
    }
}

/// Publishes result records.
///
/// Each record is written to a hidden temporary file and renamed into
/// place, so a waiter never observes a partially written value.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    dir: PathBuf,
}

impl ResultWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn record_path(&self, job_id: JobId) -> PathBuf {
        self.dir.join(job_id.to_string())
    }

    pub fn write(&self, job_id: JobId, value: f64) -> HbResult<PathBuf> {
        let path = self.record_path(job_id);
        if path.exists() {
            return Err(StorageError::RecordExists {
                job_id,
                path: path.display().to_string(),
            }
            .into());
        }

        fs::create_dir_all(&self.dir).map_err(|source| StorageError::CreateDir {
            path: self.dir.display().to_string(),
            source,
        })?;

        let staging = self.dir.join(format!(".{job_id}.tmp"));
        fs::write(&staging, value.to_string())
            .and_then(|_| fs::rename(&staging, &path))
            .map_err(|source| StorageError::Write {
                path: path.display().to_string(),
                source,
            })?;

        debug!(job_id, value, path = %path.display(), "result record written");
        Ok(path)
    }
}

/// Serves jobs in id order until a budget or a cancellation flag stops it.
#[derive(Debug)]
pub struct EvaluatorWorker<F> {
    store: ParameterStore,
    writer: ResultWriter,
    poll: PollConfig,
    objective: F,
    next_job: JobId,
}

impl<F: ObjectiveFunction> EvaluatorWorker<F> {
    pub fn new(config: &BridgeConfig, objective: F) -> HbResult<Self> {
        config.validate()?;
        Ok(Self {
            store: ParameterStore::new(config.params_path()),
            writer: ResultWriter::new(config.results_path()),
            poll: config.poll.clone(),
            objective,
            next_job: 1,
        })
    }

    /// Resume from a later job, e.g. after a restarted evaluator.
    pub fn starting_at(mut self, job_id: JobId) -> Self {
        self.next_job = job_id;
        self
    }

    pub fn next_job(&self) -> JobId {
        self.next_job
    }

    pub fn objective(&self) -> &F {
        &self.objective
    }

    /// Evaluate `job_id` if its parameter record is complete.
    ///
    /// Returns `None` when there is nothing to do yet.
    pub fn process_job(&mut self, job_id: JobId) -> HbResult<Option<f64>> {
        let Some(params) = self.store.read_complete(job_id)? else {
            return Ok(None);
        };

        let started = Instant::now();
        let value = self.objective.eval(&params, job_id)?;
        self.writer.write(job_id, value)?;
        info!(
            job_id,
            value,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "job evaluated"
        );
        Ok(Some(value))
    }

    /// Process jobs in order, waiting for each parameter record.
    ///
    /// Stops after `max_jobs` jobs (if given) or when `cancel` is set, and
    /// returns how many jobs were evaluated. The configured poll timeout
    /// bounds the idle time between two jobs.
    pub fn serve(&mut self, max_jobs: Option<u64>, cancel: Option<&AtomicBool>) -> HbResult<u64> {
        let mut processed = 0;
        let mut idle_since = Instant::now();

        while max_jobs.map_or(true, |max| processed < max) {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                info!(processed, "evaluator cancelled");
                break;
            }

            if self.process_job(self.next_job)?.is_some() {
                processed += 1;
                self.next_job += 1;
                idle_since = Instant::now();
                continue;
            }

            if let Some(timeout) = self.poll.timeout() {
                let idle = idle_since.elapsed();
                if idle >= timeout {
                    return Err(WaitError::TimedOut {
                        job_id: self.next_job,
                        waited_ms: idle.as_millis(),
                    }
                    .into());
                }
            }
            thread::sleep(self.poll.interval());
        }

        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ObjectiveBridge;
    use hb_types::{internal_error, parameter_set, HbError, ParameterValue};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_config(work_dir: &Path) -> BridgeConfig {
        BridgeConfig::new(work_dir).with_poll(
            PollConfig::default()
                .with_interval(Duration::from_millis(5))
                .with_timeout(Duration::from_secs(10)),
        )
    }

    fn sphere(params: &ParameterSet, _step: JobId) -> HbResult<f64> {
        Ok(params.values().filter_map(ParameterValue::as_f64).map(|v| v * v).sum())
    }

    #[test]
    fn result_writer_publishes_parseable_values() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(tmp.path().join("eval"));
        let path = writer.write(1, 3.14).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "3.14");
        assert!(!tmp.path().join("eval").join(".1.tmp").exists());
        assert!(matches!(
            writer.write(1, 2.0).unwrap_err(),
            HbError::Storage(StorageError::RecordExists { job_id: 1, .. })
        ));
    }

    #[test]
    fn process_job_waits_for_a_complete_record() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        let mut worker = EvaluatorWorker::new(&config, sphere).unwrap();
        assert_eq!(worker.process_job(1).unwrap(), None);

        ParameterStore::new(config.params_path())
            .write(1, &parameter_set([("x", 3.0), ("y", 4.0)]))
            .unwrap();
        assert_eq!(worker.process_job(1).unwrap(), Some(25.0));
        assert_eq!(
            fs::read_to_string(config.results_path().join("1")).unwrap(),
            "25"
        );
    }

    #[derive(Default)]
    struct Recording {
        steps: Vec<JobId>,
    }

    impl ObjectiveFunction for Recording {
        fn eval(&mut self, params: &ParameterSet, step: JobId) -> HbResult<f64> {
            self.steps.push(step);
            sphere(params, step)
        }
    }

    #[test]
    fn worker_and_bridge_rendezvous() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());

        let worker_config = config.clone();
        let worker = thread::spawn(move || {
            let mut worker = EvaluatorWorker::new(&worker_config, Recording::default()).unwrap();
            let processed = worker.serve(Some(3), None).unwrap();
            (processed, worker.objective().steps.clone())
        });

        let mut bridge = ObjectiveBridge::new(&config).unwrap();
        let values: Vec<f64> = [1.0, 2.0, 3.0]
            .iter()
            .map(|x| bridge.evaluate(&parameter_set([("x", *x)])).unwrap())
            .collect();

        assert_eq!(values, vec![1.0, 4.0, 9.0]);
        let (processed, steps) = worker.join().unwrap();
        assert_eq!(processed, 3);
        assert_eq!(steps, vec![1, 2, 3]);
        assert!(!config.params_path().join("4").exists());
    }

    #[test]
    fn objective_failure_stops_the_worker() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        ParameterStore::new(config.params_path())
            .write(1, &parameter_set([("x", 1)]))
            .unwrap();

        let failing = |_: &ParameterSet, step: JobId| -> HbResult<f64> {
            Err(internal_error!("training job {} crashed", step))
        };
        let mut worker = EvaluatorWorker::new(&config, failing).unwrap();
        let err = worker.serve(Some(1), None).unwrap_err();
        assert!(err.to_string().contains("training job 1 crashed"));
        assert!(!config.results_path().join("1").exists());
    }

    #[test]
    fn cancelled_worker_returns_processed_count() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BridgeConfig::new(tmp.path())
            .with_poll(PollConfig::default().with_interval(Duration::from_millis(5)));
        let flag = Arc::new(AtomicBool::new(false));

        let setter = {
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                flag.store(true, Ordering::Relaxed);
            })
        };

        let mut worker = EvaluatorWorker::new(&config, sphere).unwrap().starting_at(5);
        assert_eq!(worker.serve(None, Some(&flag)).unwrap(), 0);
        assert_eq!(worker.next_job(), 5);
        setter.join().unwrap();
    }
}
