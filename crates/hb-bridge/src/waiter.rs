//! Blocking wait for result records.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use hb_types::{HbResult, RecordError, StorageError, WaitError};
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::sequencer::JobId;

/// Polls the result storage area until the record for a job appears.
#[derive(Debug, Clone)]
pub struct ResultWaiter {
    dir: PathBuf,
    poll: PollConfig,
}

impl ResultWaiter {
    pub fn new<P: AsRef<Path>>(dir: P, poll: PollConfig) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            poll,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn poll(&self) -> &PollConfig {
        &self.poll
    }

    pub fn record_path(&self, job_id: JobId) -> PathBuf {
        self.dir.join(job_id.to_string())
    }

    /// Read the result for `job_id` if its record exists, without waiting.
    pub fn try_read(&self, job_id: JobId) -> HbResult<Option<f64>> {
        let path = self.record_path(job_id);
        match fs::read_to_string(&path) {
            Ok(content) => parse_result(job_id, &path, &content).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read {
                path: path.display().to_string(),
                source,
            }
            .into()),
        }
    }

    /// Block until the result for `job_id` exists and return it.
    ///
    /// Waits forever unless the poll policy carries a timeout. The record is
    /// left in place.
    pub fn read(&self, job_id: JobId) -> HbResult<f64> {
        self.read_with_cancel(job_id, None)
    }

    /// Like [`read`](Self::read), but gives up once `cancel` is set. The
    /// flag is checked between polls.
    pub fn read_with_cancel(&self, job_id: JobId, cancel: Option<&AtomicBool>) -> HbResult<f64> {
        let started = Instant::now();
        let interval = self.poll.interval();
        let timeout = self.poll.timeout();
        let mut polls: u64 = 0;

        loop {
            if let Some(value) = self.try_read(job_id)? {
                info!(
                    job_id,
                    value,
                    polls,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "result record observed"
                );
                return Ok(value);
            }

            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                warn!(job_id, polls, "wait for result cancelled");
                return Err(WaitError::Cancelled { job_id }.into());
            }

            let mut pause = interval;
            if let Some(timeout) = timeout {
                let waited = started.elapsed();
                if waited >= timeout {
                    warn!(job_id, polls, "timed out waiting for result");
                    return Err(WaitError::TimedOut {
                        job_id,
                        waited_ms: waited.as_millis(),
                    }
                    .into());
                }
                pause = pause.min(timeout - waited);
            }

            if polls == 0 {
                debug!(
                    job_id,
                    path = %self.record_path(job_id).display(),
                    "waiting for result record"
                );
            }
            polls += 1;
            thread::sleep(pause);
        }
    }
}

/// Parse result record content as a single floating-point literal.
///
/// Surrounding whitespace is ignored; anything else that is not a number
/// is a fatal evaluator defect and is reported with the raw content.
/// `nan` and `inf` are numbers here and are passed through unchanged.
pub fn parse_result(job_id: JobId, path: &Path, content: &str) -> HbResult<f64> {
    content.trim().parse::<f64>().map_err(|_| {
        RecordError::MalformedResult {
            job_id,
            path: path.display().to_string(),
            content: content.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::HbError;
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_poll() -> PollConfig {
        PollConfig::default()
            .with_interval(Duration::from_millis(5))
            .with_timeout(Duration::from_secs(10))
    }

    #[test]
    fn existing_record_is_read_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("1"), "3.14").unwrap();

        let waiter = ResultWaiter::new(tmp.path(), fast_poll());
        assert_eq!(waiter.read(1).unwrap(), 3.14);
        assert!(tmp.path().join("1").exists());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let path = Path::new("eval/2");
        assert_eq!(parse_result(2, path, "  -0.25\n").unwrap(), -0.25);
        assert_eq!(parse_result(2, path, "1e-3").unwrap(), 0.001);
        assert_eq!(parse_result(2, path, "42").unwrap(), 42.0);
    }

    #[test]
    fn blocks_until_record_appears() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let waiter = ResultWaiter::new(&dir, fast_poll());

        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(60));
            fs::write(dir.join("3"), "0.75").unwrap();
        });

        let started = Instant::now();
        let value = waiter.read(3).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(value, 0.75);
        writer.join().unwrap();
    }

    #[test]
    fn returns_soon_after_record_appears() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let interval = Duration::from_millis(20);
        let waiter = ResultWaiter::new(
            &dir,
            PollConfig::default()
                .with_interval(interval)
                .with_timeout(Duration::from_secs(10)),
        );

        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            fs::write(dir.join("1"), "1.0").unwrap();
            Instant::now()
        });

        waiter.read(1).unwrap();
        let returned = Instant::now();
        let written = writer.join().unwrap();
        // One interval plus scheduling slack.
        assert!(returned.duration_since(written) < interval + Duration::from_millis(200));
    }

    #[test]
    fn malformed_result_fails_instead_of_hanging() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("1"), "abc").unwrap();

        let waiter = ResultWaiter::new(tmp.path(), PollConfig::default());
        let err = waiter.read(1).unwrap_err();
        assert!(matches!(
            err,
            HbError::Record(RecordError::MalformedResult { job_id: 1, .. })
        ));
        assert_eq!(err.malformed_content(), Some("abc"));
    }

    #[test]
    fn empty_result_is_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("5"), "").unwrap();
        let waiter = ResultWaiter::new(tmp.path(), fast_poll());
        assert!(waiter.read(5).unwrap_err().malformed_content().is_some());
    }

    #[test]
    fn non_finite_results_are_passed_through() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("1"), "nan\n").unwrap();
        fs::write(tmp.path().join("2"), " inf").unwrap();
        fs::write(tmp.path().join("3"), "-infinity\n").unwrap();
        let waiter = ResultWaiter::new(tmp.path(), fast_poll());

        assert!(waiter.read(1).unwrap().is_nan());
        assert_eq!(waiter.read(2).unwrap(), f64::INFINITY);
        assert_eq!(waiter.read(3).unwrap(), f64::NEG_INFINITY);
        assert!(parse_result(4, Path::new("eval/4"), "NaN").unwrap().is_nan());
    }

    #[test]
    fn try_read_does_not_block() {
        let tmp = tempfile::tempdir().unwrap();
        let waiter = ResultWaiter::new(tmp.path().join("missing"), PollConfig::default());
        assert_eq!(waiter.try_read(1).unwrap(), None);
    }

    #[test]
    fn configured_timeout_bounds_the_wait() {
        let tmp = tempfile::tempdir().unwrap();
        let waiter = ResultWaiter::new(
            tmp.path(),
            PollConfig::default()
                .with_interval(Duration::from_millis(5))
                .with_timeout(Duration::from_millis(40)),
        );

        let started = Instant::now();
        let err = waiter.read(9).unwrap_err();
        assert!(matches!(
            err,
            HbError::Wait(WaitError::TimedOut { job_id: 9, .. })
        ));
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancellation_interrupts_an_unbounded_wait() {
        let tmp = tempfile::tempdir().unwrap();
        let waiter = ResultWaiter::new(
            tmp.path(),
            PollConfig::default().with_interval(Duration::from_millis(5)),
        );
        let cancel = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&cancel);
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            flag.store(true, Ordering::Relaxed);
        });

        let err = waiter.read_with_cancel(4, Some(&cancel)).unwrap_err();
        assert!(matches!(err, HbError::Wait(WaitError::Cancelled { job_id: 4 })));
        canceller.join().unwrap();
    }
}
