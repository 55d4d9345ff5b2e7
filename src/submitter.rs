//! Submit tasks to a backend and reconcile their status against a JobRecord
//!
//! Backends implement three primitives (submit, status, cancel). The record keeping around them
//! lives once, in [`Submitter`], and is shared by every backend.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::record::JobRecord;
use crate::WorkingDirectory;

pub use error::SubmitError;
pub use status::{CancelOutcome, JobStatus};

/// Errors raised while submitting, polling or cancelling
pub mod error;
/// Status values and cancellation outcomes
pub mod status;
/// Run a command sequence synchronously through a local shell
pub mod local;
/// Render a job script and hand it to a batch queue client
pub mod batch;

/// Output file name used when none is given
pub const DEFAULT_STDOUT: &str = "stdout";

/// Everything a backend needs to run one task
///
/// Unset (or empty) fields fall back to defaults: output goes to `stdout`, the job is named after
/// the output file, and the job runs in the process current directory.
#[derive(Debug, Clone, Default)]
pub struct JobSpec {
    pub input_files: Vec<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub job_name: Option<String>,
    pub working_dir: Option<PathBuf>,
}

impl JobSpec {
    pub fn output_file(&self) -> PathBuf {
        match &self.output_file {
            Some(path) if !path.as_os_str().is_empty() => path.clone(),
            _ => PathBuf::from(DEFAULT_STDOUT),
        }
    }

    pub fn job_name(&self) -> String {
        match &self.job_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => {
                let output = self.output_file();
                output
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| DEFAULT_STDOUT.to_string())
            }
        }
    }

    pub fn working_dir(&self) -> io::Result<WorkingDirectory> {
        match &self.working_dir {
            Some(path) if !path.as_os_str().is_empty() => Ok(WorkingDirectory::new(path)),
            _ => WorkingDirectory::current(),
        }
    }

    /// Every input must already exist and open for reading
    pub fn check_inputs(&self, wd: &WorkingDirectory) -> Result<(), SubmitError> {
        for input in &self.input_files {
            let path = wd.resolve(input);
            if !path.is_file() || File::open(&path).is_err() {
                return Err(SubmitError::MissingInput(path));
            }
        }
        Ok(())
    }
}

/// The primitives a concrete backend provides
///
/// Ids returned by `submit_job` are opaque and only make sense to the backend that produced them.
pub trait Backend: Send + Sync {
    /// Start the job and return one id per sub-job it spawned (possibly none)
    fn submit_job(&self, job: &JobSpec) -> Result<Vec<String>, SubmitError>;

    fn job_status(&self, queue_id: &str) -> Result<JobStatus, SubmitError>;

    fn job_cancel(&self, queue_id: &str) -> Result<CancelOutcome, SubmitError>;

    /// Stage results back to the controlling host
    ///
    /// Backends that run on the local filesystem have nothing to move, so by default this only
    /// checks the outputs are already in the working directory.
    fn transfer_output(
        &self,
        _record: &JobRecord,
        output_files: &[PathBuf],
        wd: &WorkingDirectory,
    ) -> Result<(), SubmitError> {
        for output in output_files {
            let path = wd.resolve(output);
            if !path.is_file() {
                return Err(SubmitError::OutputNotResident(path));
            }
        }
        Ok(())
    }
}

/// Drives one backend in an explicit working directory and keeps a JobRecord up to date
pub struct Submitter<B: Backend> {
    backend: B,
    wd: WorkingDirectory,
}

impl<B: Backend> Submitter<B> {
    pub fn new(backend: B, wd: WorkingDirectory) -> Submitter<B> {
        Submitter { backend, wd }
    }

    /// Submit a task and append every id the backend returns to the record under `task`
    ///
    /// `dependencies` is accepted for future ordering constraints and otherwise ignored. If the
    /// backend fails nothing is appended and the error is returned as-is.
    pub fn execute(
        &self,
        record: &JobRecord,
        dependencies: &[String],
        input_files: &[PathBuf],
        output_file: Option<&Path>,
        task: &str,
    ) -> Result<Vec<String>, SubmitError> {
        if task.is_empty() {
            return Err(SubmitError::InvalidTaskName);
        }
        if input_files.is_empty() {
            return Err(SubmitError::NoInputFiles(task.to_string()));
        }
        if !dependencies.is_empty() {
            debug!("Task {task} lists dependencies {dependencies:?}, not enforced");
        }

        let job = JobSpec {
            input_files: input_files.to_vec(),
            output_file: output_file.map(Path::to_path_buf),
            job_name: Some(task.to_string()),
            working_dir: Some(self.wd.path.clone()),
        };
        job.check_inputs(&self.wd)?;

        info!("Submitting task {task} in {}", self.wd.path.display());
        let ids = self.backend.submit_job(&job)?;
        record.append(task, ids.iter().cloned());
        info!("Task {task} submitted, {} id(s) recorded", ids.len());

        Ok(ids)
    }

    /// One status per id recorded under `task`, in recording order
    pub fn status(&self, record: &JobRecord, task: &str) -> Result<Vec<JobStatus>, SubmitError> {
        let ids = record.ids_for(task);
        if ids.is_empty() {
            debug!("No ids recorded for task {task}");
        }
        ids.iter().map(|id| self.backend.job_status(id)).collect()
    }

    /// Ask the backend to cancel each id. Outcomes are reported, not judged.
    pub fn cancel(&self, queue_ids: &[String]) -> Result<Vec<CancelOutcome>, SubmitError> {
        let mut outcomes = Vec::with_capacity(queue_ids.len());
        for id in queue_ids {
            let outcome = self.backend.job_cancel(id)?;
            if let CancelOutcome::Rejected(reason) = &outcome {
                warn!("Cancelling {id} was rejected: {reason}");
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    pub fn transfer_output(
        &self,
        record: &JobRecord,
        output_files: &[PathBuf],
    ) -> Result<(), SubmitError> {
        self.backend.transfer_output(record, output_files, &self.wd)
    }
}
