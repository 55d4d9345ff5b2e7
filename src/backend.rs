use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;

use crysub::record::JobRecord;
use crysub::submitter::batch::BatchBackend;
use crysub::submitter::local::LocalBackend;
use crysub::submitter::{Backend, CancelOutcome, JobSpec, JobStatus, SubmitError};
use crysub::WorkingDirectory;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum BackendKind {
    Local,
    Batch,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Batch => write!(f, "batch"),
        }
    }
}

/// The backend chosen on the command line
pub enum AnyBackend {
    Local(LocalBackend),
    Batch(BatchBackend),
}

impl Backend for AnyBackend {
    fn submit_job(&self, job: &JobSpec) -> Result<Vec<String>, SubmitError> {
        match self {
            AnyBackend::Local(backend) => backend.submit_job(job),
            AnyBackend::Batch(backend) => backend.submit_job(job),
        }
    }

    fn job_status(&self, queue_id: &str) -> Result<JobStatus, SubmitError> {
        match self {
            AnyBackend::Local(backend) => backend.job_status(queue_id),
            AnyBackend::Batch(backend) => backend.job_status(queue_id),
        }
    }

    fn job_cancel(&self, queue_id: &str) -> Result<CancelOutcome, SubmitError> {
        match self {
            AnyBackend::Local(backend) => backend.job_cancel(queue_id),
            AnyBackend::Batch(backend) => backend.job_cancel(queue_id),
        }
    }

    fn transfer_output(
        &self,
        record: &JobRecord,
        output_files: &[PathBuf],
        wd: &WorkingDirectory,
    ) -> Result<(), SubmitError> {
        match self {
            AnyBackend::Local(backend) => backend.transfer_output(record, output_files, wd),
            AnyBackend::Batch(backend) => backend.transfer_output(record, output_files, wd),
        }
    }
}
