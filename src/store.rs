use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default store filename when `SUBTITLE_JOB_STORE` is unset.
const DEFAULT_STORE_PATH: &str = "jobs.json";

/// One persisted job handle: enough to re-attach a poll loop after a
/// restart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredJob {
    /// Server-assigned job identifier
    pub job_id: String,
    /// Source filename, for the indicator and results group
    pub filename: String,
}

/// Durable list of in-flight job handles, backed by a JSON file.
///
/// Handles are added once the server assigns a job id and removed when
/// the job reaches a terminal state; whatever is left at startup gets a
/// fresh poll loop. All access happens on the GUI thread.
pub struct JobStore {
    path: PathBuf,
}

impl JobStore {
    /// Create a store backed by the given file. The file is created on
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at the path named by `SUBTITLE_JOB_STORE`, falling
    /// back to `jobs.json` in the working directory.
    pub fn from_env() -> Self {
        let path = std::env::var("SUBTITLE_JOB_STORE").unwrap_or_else(|_| DEFAULT_STORE_PATH.to_string());
        Self::new(path)
    }

    /// Read every persisted handle. A missing file is an empty store; a
    /// corrupt file is logged and treated as empty rather than blocking
    /// startup.
    pub fn load(&self) -> Vec<StoredJob> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(jobs) => jobs,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "discarding corrupt job store");
                Vec::new()
            }
        }
    }

    /// Persist a newly accepted job. A handle with the same job id is
    /// replaced rather than duplicated.
    pub fn add(&self, job: StoredJob) {
        let mut jobs = self.load();
        jobs.retain(|j| j.job_id != job.job_id);
        jobs.push(job);
        self.save(&jobs);
    }

    /// Drop the handle for a job that reached a terminal state.
    pub fn remove(&self, job_id: &str) {
        let mut jobs = self.load();
        jobs.retain(|j| j.job_id != job_id);
        self.save(&jobs);
    }

    /// Drop every persisted handle.
    pub fn clear(&self) {
        self.save(&[]);
    }

    /// Write the handle list back out. Failures are logged, not fatal;
    /// losing persistence must never take down a running job.
    fn save(&self, jobs: &[StoredJob]) {
        let serialized = match serde_json::to_string_pretty(jobs) {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "could not serialize job store");
                return;
            }
        };
        if let Err(err) = fs::write(&self.path, serialized) {
            warn!(path = %self.path.display(), error = %err, "could not write job store");
        }
    }
}
