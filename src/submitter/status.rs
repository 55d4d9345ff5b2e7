use std::fmt;

use serde::{Deserialize, Serialize};

/// State of one backend id
///
/// Backends map their native states onto this set. `Unknown` is used whenever a backend can't say,
/// including the local backend, where a job is finished by the time submission returns.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Unknown,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// What a backend says about a cancellation request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    Acknowledged,
    Rejected(String),
    /// The backend has no way to cancel, nothing was done
    Unimplemented,
}

impl fmt::Display for CancelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CancelOutcome::Acknowledged => write!(f, "acknowledged"),
            CancelOutcome::Rejected(reason) => write!(f, "rejected: {reason}"),
            CancelOutcome::Unimplemented => write!(f, "not implemented"),
        }
    }
}
