use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::submitter::{Backend, CancelOutcome, JobSpec, JobStatus, SubmitError};
use crate::WorkingDirectory;

/// A queue client invocation. The job script name or queue id is appended as the last argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl QueueCommand {
    pub fn new(program: &str, args: &[&str]) -> QueueCommand {
        QueueCommand {
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    fn run(&self, last: &str, wd: Option<&Path>) -> std::io::Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(last).stdin(Stdio::null());
        if let Some(wd) = wd {
            cmd.current_dir(wd);
        }
        info!("{:?}", &cmd);
        cmd.output()
    }
}

/// Batch queue settings, fixed when the backend is built
///
/// None of this ends up in the JobRecord: a record only ever holds the ids the queue returned.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub queue: Option<String>,
    pub cores: u32,
    /// HH:MM:SS
    pub walltime: String,
    /// Prefix for scheduler options in the job script header, e.g. `#SBATCH`
    pub directive: String,
    pub submit: QueueCommand,
    pub status: QueueCommand,
    pub cancel: QueueCommand,
    /// Native state names (as printed by the status command) mapped onto JobStatus
    pub states: HashMap<String, JobStatus>,
    pub exe: String,
    pub prep_commands: Vec<String>,
    pub final_commands: Vec<String>,
}

impl BatchConfig {
    /// Settings for a SLURM cluster driven through sbatch, squeue and scancel
    pub fn slurm(exe: impl Into<String>) -> BatchConfig {
        let states = [
            ("PENDING", JobStatus::Queued),
            ("CONFIGURING", JobStatus::Queued),
            ("RUNNING", JobStatus::Running),
            ("COMPLETING", JobStatus::Running),
            ("COMPLETED", JobStatus::Completed),
            ("FAILED", JobStatus::Failed),
            ("CANCELLED", JobStatus::Failed),
            ("TIMEOUT", JobStatus::Failed),
            ("NODE_FAIL", JobStatus::Failed),
            ("OUT_OF_MEMORY", JobStatus::Failed),
        ]
        .into_iter()
        .map(|(name, status)| (name.to_string(), status))
        .collect();

        BatchConfig {
            queue: None,
            cores: 1,
            walltime: "01:00:00".to_string(),
            directive: "#SBATCH".to_string(),
            submit: QueueCommand::new("sbatch", &["--parsable"]),
            status: QueueCommand::new("squeue", &["-h", "-o", "%T", "-j"]),
            cancel: QueueCommand::new("scancel", &[]),
            states,
            exe: exe.into(),
            prep_commands: Vec::new(),
            final_commands: Vec::new(),
        }
    }
}

/// Submit jobs to a batch queue by writing a job script and calling the queue client
///
/// Each line printed by the submit command is one sub-job id. Status and cancellation go back
/// through the queue client with that id.
pub struct BatchBackend {
    config: BatchConfig,
}

/// Rendering context for the job script
#[derive(Serialize)]
struct ScriptContext {
    directive: String,
    name: String,
    queue: Option<String>,
    cores: u32,
    walltime: String,
    stdout: String,
    working_dir: String,
    time_now: String,
    commands: Vec<String>,
}

impl BatchBackend {
    pub fn new(config: BatchConfig) -> BatchBackend {
        BatchBackend { config }
    }

    /// Render the job script using TinyTemplate
    fn render_script(&self, job: &JobSpec, wd: &WorkingDirectory) -> Result<String, SubmitError> {
        /// included job script template
        static SCRIPT: &str =
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/batch.txt"));
        let mut tt = TinyTemplate::new();
        // commands contain shell operators, don't html escape them
        tt.set_default_formatter(&format_unescaped);
        tt.add_template("batch", SCRIPT)?;

        // order is important: prep, then the executable, then finalisation
        let commands = self
            .config
            .prep_commands
            .iter()
            .chain(std::iter::once(&self.config.exe))
            .chain(self.config.final_commands.iter())
            .cloned()
            .collect();

        let context = ScriptContext {
            directive: self.config.directive.clone(),
            name: job.job_name(),
            queue: self.config.queue.clone(),
            cores: self.config.cores,
            walltime: self.config.walltime.clone(),
            stdout: wd.resolve(&job.output_file()).display().to_string(),
            working_dir: wd.path.display().to_string(),
            time_now: Utc::now().to_string(),
            commands,
        };

        Ok(tt.render("batch", &context)?)
    }

    /// Write `<job_name>.sh` into the working directory and return its file name
    fn write_script(&self, job: &JobSpec, wd: &WorkingDirectory) -> Result<String, SubmitError> {
        let script = self.render_script(job, wd)?;
        let file_name = format!("{}.sh", job.job_name());
        let path = wd.path.join(&file_name);
        info!("Writing job script to {}", path.display());
        fs::write(&path, script)?;
        Ok(file_name)
    }
}

/// `--parsable` style output is `id;cluster`, keep the id
fn parse_ids(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split(';').next())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

impl Backend for BatchBackend {
    fn submit_job(&self, job: &JobSpec) -> Result<Vec<String>, SubmitError> {
        // the script cds into the working directory from wherever the queue starts it
        let wd = job.working_dir()?.absolute()?;
        let job_name = job.job_name();
        job.check_inputs(&wd)?;

        // the queue client runs inside the working directory, so it only needs the file name
        let script = self.write_script(job, &wd)?;
        let output = self.config.submit.run(&script, Some(&wd.path)).map_err(|err| {
            let reason = format!("can't run {}: {err}", self.config.submit.program);
            submission_failure(&job_name, reason)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = format!("queue rejected job ({}): {}", output.status, stderr.trim());
            return Err(submission_failure(&job_name, reason));
        }

        let ids = parse_ids(&String::from_utf8_lossy(&output.stdout));
        if ids.is_empty() {
            return Err(submission_failure(&job_name, "queue returned no job id".to_string()));
        }
        info!("Queue ids for {job_name}: {ids:?}");
        Ok(ids)
    }

    fn job_status(&self, queue_id: &str) -> Result<JobStatus, SubmitError> {
        let output = self.config.status.run(queue_id, None)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Can't get status of {queue_id}: {}", stderr.trim());
            return Ok(JobStatus::Unknown);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let state = stdout.lines().next().unwrap_or("").trim();
        match self.config.states.get(state) {
            Some(status) => Ok(*status),
            None => {
                if !state.is_empty() {
                    warn!("Unmapped queue state {state} for {queue_id}");
                }
                Ok(JobStatus::Unknown)
            }
        }
    }

    fn job_cancel(&self, queue_id: &str) -> Result<CancelOutcome, SubmitError> {
        let output = self.config.cancel.run(queue_id, None)?;
        if output.status.success() {
            info!("Queue acknowledged cancellation of {queue_id}");
            Ok(CancelOutcome::Acknowledged)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Ok(CancelOutcome::Rejected(stderr.trim().to_string()))
        }
    }
}

fn submission_failure(job: &str, reason: String) -> SubmitError {
    SubmitError::SubmissionFailure { job: job.to_string(), reason }
}
