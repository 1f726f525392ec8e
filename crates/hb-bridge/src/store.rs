//! Parameter records: one JSON file per job, written once.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use hb_types::{HbError, HbResult, ParameterSet, RecordError, StorageError};
use tracing::{debug, info};

use crate::sequencer::JobId;

/// Storage area for parameter records, keyed by job id.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    dir: PathBuf,
}

impl ParameterStore {
    /// The storage area is created lazily on the first write.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the record for `job_id`: the id in decimal, unpadded.
    pub fn record_path(&self, job_id: JobId) -> PathBuf {
        self.dir.join(job_id.to_string())
    }

    pub fn exists(&self, job_id: JobId) -> bool {
        self.record_path(job_id).is_file()
    }

    /// Persist `params` as the record for `job_id`.
    ///
    /// The record is one JSON object followed by a newline, written in a
    /// single call and synced before returning. An existing record for the
    /// same id is never overwritten.
    pub fn write(&self, job_id: JobId, params: &ParameterSet) -> HbResult<PathBuf> {
        if let Some((name, value)) = params.iter().find(|(_, v)| !v.is_encodable()) {
            return Err(HbError::Validation(format!(
                "job {job_id}: parameter '{name}' = {value} cannot be recorded"
            )));
        }

        self.ensure_dir()?;

        let mut content = serde_json::to_string(params)?;
        content.push('\n');

        let path = self.record_path(job_id);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::RecordExists {
                    job_id,
                    path: path.display().to_string(),
                }
                .into());
            }
            Err(source) => {
                return Err(StorageError::Write {
                    path: path.display().to_string(),
                    source,
                }
                .into());
            }
        };

        file.write_all(content.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|source| StorageError::Write {
                path: path.display().to_string(),
                source,
            })?;

        info!(job_id, path = %path.display(), "parameter record written");
        Ok(path)
    }

    /// Parse the record for `job_id` back into a parameter set.
    pub fn read(&self, job_id: JobId) -> HbResult<ParameterSet> {
        let path = self.record_path(job_id);
        let content = fs::read_to_string(&path).map_err(|source| StorageError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::decode(job_id, &path, &content)
    }

    /// Read the record for `job_id` if it exists and is complete.
    ///
    /// A record is complete once its trailing newline is on disk; until then
    /// (or while the file is missing) this returns `None`.
    pub fn read_complete(&self, job_id: JobId) -> HbResult<Option<ParameterSet>> {
        let path = self.record_path(job_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Read {
                    path: path.display().to_string(),
                    source,
                }
                .into());
            }
        };
        if !content.ends_with('\n') {
            return Ok(None);
        }
        Self::decode(job_id, &path, &content).map(Some)
    }

    fn decode(job_id: JobId, path: &Path, content: &str) -> HbResult<ParameterSet> {
        serde_json::from_str(content.trim_end()).map_err(|e| {
            RecordError::MalformedParameters {
                job_id,
                path: path.display().to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// `create_dir_all` tolerates the directory appearing concurrently.
    fn ensure_dir(&self) -> HbResult<()> {
        if self.dir.is_dir() {
            return Ok(());
        }
        debug!(dir = %self.dir.display(), "creating parameter storage area");
        fs::create_dir_all(&self.dir).map_err(|source| {
            StorageError::CreateDir {
                path: self.dir.display().to_string(),
                source,
            }
            .into()
        })
    }
}
