use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use crysub::db::open::{open_db, release_or_rollback};
use crysub::db::record::load::load_record;
use crysub::db::record::update::append_entries;
use crysub::submitter::batch::{BatchBackend, BatchConfig};
use crysub::submitter::local::LocalBackend;
use crysub::submitter::Submitter;
use crysub::WorkingDirectory;

use crate::backend::{AnyBackend, BackendKind};

mod backend;

#[derive(Parser, Debug)]
#[command(author, version, about = "Submit CRYSTAL jobs and keep track of their queue ids")]
struct Cli {
    /// Directory holding the database and one subdirectory per job (default: current directory)
    #[arg(short, long)]
    work_dir: Option<PathBuf>,
    /// Logical job, e.g. si. Tasks run in <work_dir>/<job>.
    #[arg(short, long)]
    job: String,
    /// Don't persist anything to the database
    #[arg(long)]
    dry_run: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run or queue a task and record its ids
    Submit(SubmitArgs),
    /// Print the status of every id recorded for a task
    Status {
        #[arg(long)]
        task: String,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Cancel every id recorded for a task
    Cancel {
        #[arg(long)]
        task: String,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Make sure output files are available in the job directory
    Transfer {
        #[arg(long, required = true, num_args = 1..)]
        output: Vec<PathBuf>,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Print the job record as JSON
    Record,
}

#[derive(Args, Debug)]
struct SubmitArgs {
    #[arg(long)]
    task: String,
    /// Input files, relative to the job directory
    #[arg(long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,
    /// Where stdout goes (default: stdout)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Tasks this one depends on (recorded, not enforced)
    #[arg(long, num_args = 1..)]
    depends: Vec<String>,
    /// The job executable, run through a shell
    #[arg(long)]
    exe: String,
    #[arg(long = "prep", num_args = 1..)]
    prep_commands: Vec<String>,
    #[arg(long = "final", num_args = 1..)]
    final_commands: Vec<String>,
    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Args, Debug)]
struct BackendArgs {
    #[arg(long, value_enum, default_value_t = BackendKind::Local)]
    backend: BackendKind,
    /// Batch queue / partition
    #[arg(long)]
    queue: Option<String>,
    #[arg(long, default_value_t = 1)]
    cores: u32,
    /// Batch wall time, HH:MM:SS
    #[arg(long, default_value = "01:00:00")]
    walltime: String,
}

impl BackendArgs {
    fn build(&self, exe: &str, prep_commands: &[String], final_commands: &[String]) -> AnyBackend {
        match self.backend {
            BackendKind::Local => AnyBackend::Local(
                LocalBackend::new(exe)
                    .with_prep_commands(prep_commands.to_vec())
                    .with_final_commands(final_commands.to_vec()),
            ),
            BackendKind::Batch => {
                let mut config = BatchConfig::slurm(exe);
                config.queue = self.queue.clone();
                config.cores = self.cores;
                config.walltime = self.walltime.clone();
                config.prep_commands = prep_commands.to_vec();
                config.final_commands = final_commands.to_vec();
                AnyBackend::Batch(BatchBackend::new(config))
            }
        }
    }

    /// A backend for polling or cancelling, where no executable is needed
    fn build_query(&self) -> AnyBackend {
        self.build("", &[], &[])
    }
}

impl Cli {
    /// A queue keeps jobs it has accepted even when their ids are rolled back afterwards
    fn check_dry_run(&self) -> Result<()> {
        if let Command::Submit(args) = &self.command {
            if self.dry_run && args.backend.backend == BackendKind::Batch {
                bail!("--dry-run can't submit to a batch queue, its queue ids would be lost");
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    cli.check_dry_run()?;
    info!("starting up, job {}", cli.job);

    let root = match &cli.work_dir {
        Some(path) => WorkingDirectory::new(path),
        None => WorkingDirectory::current().context("Can't read current directory")?,
    };
    let job_wd = root.join(&cli.job);
    job_wd.ensure().with_context(|| format!("Can't create {}", job_wd.path.display()))?;

    let conn = open_db(&root)?;
    let record = load_record(&conn, &cli.job)?;

    match &cli.command {
        Command::Submit(args) => {
            let backend = args.backend.build(&args.exe, &args.prep_commands, &args.final_commands);
            info!("Using {} backend", args.backend.backend);
            let submitter = Submitter::new(backend, job_wd);

            let before = record.len();
            let ids = submitter
                .execute(&record, &args.depends, &args.input, args.output.as_deref(), &args.task)
                .with_context(|| format!("Task {} failed", args.task))?;
            append_entries(&conn, &cli.job, &record.entries()[before..])?;

            for id in ids {
                println!("{}\t{id}", args.task);
            }
        }
        Command::Status { task, backend } => {
            let submitter = Submitter::new(backend.build_query(), job_wd);
            let statuses = submitter.status(&record, task)?;
            for (id, status) in record.ids_for(task).iter().zip(statuses) {
                println!("{task}\t{id}\t{status}");
            }
        }
        Command::Cancel { task, backend } => {
            let submitter = Submitter::new(backend.build_query(), job_wd);
            let ids = record.ids_for(task);
            let outcomes = submitter.cancel(&ids)?;
            for (id, outcome) in ids.iter().zip(outcomes) {
                println!("{task}\t{id}\t{outcome}");
            }
        }
        Command::Transfer { output, backend } => {
            let submitter = Submitter::new(backend.build_query(), job_wd);
            submitter.transfer_output(&record, output)?;
            info!("All outputs present");
        }
        Command::Record => {
            println!("{}", record.to_json()?);
        }
    }

    release_or_rollback(&conn, cli.dry_run)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let base = ["crysub", "--job", "si"];
        Cli::try_parse_from(base.iter().chain(args.iter()).copied()).unwrap()
    }

    #[test]
    fn dry_run_batch_submission_is_refused() {
        let submit = ["submit", "--task", "crystal", "--input", "si.d12", "--exe", "crystal"];

        let mut args = vec!["--dry-run"];
        args.extend(submit);
        args.extend(["--backend", "batch"]);
        assert!(parse(&args).check_dry_run().is_err());

        let mut args = vec!["--dry-run"];
        args.extend(submit);
        assert!(parse(&args).check_dry_run().is_ok());

        let mut args = submit.to_vec();
        args.extend(["--backend", "batch"]);
        assert!(parse(&args).check_dry_run().is_ok());
    }

    #[test]
    fn dry_run_polling_a_batch_queue_is_allowed() {
        let cli = parse(&["--dry-run", "status", "--task", "crystal", "--backend", "batch"]);
        assert!(cli.check_dry_run().is_ok());
    }
}
