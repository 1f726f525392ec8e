//! Evaluating jobs by running an external command.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use hb_bridge::{JobId, ObjectiveFunction};
use hb_types::{HbError, HbResult, ParameterSet};
use tracing::debug;

/// Job id of the evaluation, in decimal.
pub const ENV_JOB_ID: &str = "HB_JOB_ID";
/// Path of the parameter record being evaluated.
pub const ENV_PARAMS_FILE: &str = "HB_PARAMS_FILE";

/// Runs a command once per job.
///
/// The parameter record is piped to the command's stdin as JSON and its
/// location is exported in `HB_PARAMS_FILE`. The last non-empty line of
/// stdout must be the objective value.
#[derive(Debug, Clone)]
pub struct CommandObjective {
    program: String,
    args: Vec<String>,
    params_dir: PathBuf,
    current_dir: Option<PathBuf>,
}

impl CommandObjective {
    pub fn new<P: AsRef<Path>>(command: &[String], params_dir: P) -> HbResult<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| HbError::Config("evaluator command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            params_dir: params_dir.as_ref().to_path_buf(),
            current_dir: None,
        })
    }

    pub fn with_current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

impl ObjectiveFunction for CommandObjective {
    fn eval(&mut self, params: &ParameterSet, step: JobId) -> HbResult<f64> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(ENV_JOB_ID, step.to_string())
            .env(ENV_PARAMS_FILE, self.params_dir.join(step.to_string()))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        debug!(job_id = step, program = %self.program, "spawning evaluator command");
        let mut child = cmd.spawn().map_err(|e| {
            HbError::Internal(format!("cannot spawn evaluator '{}': {e}", self.program))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_string(params)?;
            match stdin.write_all(payload.as_bytes()) {
                // The command is free to ignore its stdin.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                other => other?,
            }
        }

        let output = child.wait_with_output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            return Err(HbError::Internal(format!(
                "evaluator '{}' failed for job {step} with {}",
                self.program, output.status
            )));
        }

        let last = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .unwrap_or_default();
        last.parse::<f64>().map_err(|_| {
            HbError::Internal(format!(
                "evaluator '{}' printed no number for job {step}: {:?}",
                self.program,
                stdout.trim_end()
            ))
        })
    }
}
