use std::{fmt, thread};

use log::{error, info};

use crate::BatchError;

use super::{
    job::{BatchStatus, Job, JobExecution, JobParameters},
    repository::JobRepository,
};

/// Result of a triggered job run, never an escaping error.
#[derive(Debug)]
pub enum JobOutcome {
    /// Every step completed.
    Completed(JobExecution),
    /// The execution ran and a step failed.
    Failed(JobExecution),
    /// The run was not admitted: invalid parameters, an instance already
    /// running or already complete.
    Rejected(BatchError),
}

impl JobOutcome {
    pub fn status(&self) -> Option<BatchStatus> {
        self.execution().map(|execution| execution.status)
    }

    pub fn execution(&self) -> Option<&JobExecution> {
        match self {
            JobOutcome::Completed(execution) | JobOutcome::Failed(execution) => Some(execution),
            JobOutcome::Rejected(_) => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Completed(execution) | JobOutcome::Failed(execution) => {
                write!(f, "{}", execution.status)
            }
            JobOutcome::Rejected(error) => write!(f, "Job failed with exception: {}", error),
        }
    }
}

/// Marks the execution FAILED in the repository if the job unwinds.
struct FailOnUnwind<'a> {
    job_repository: &'a dyn JobRepository,
    execution: JobExecution,
}

impl Drop for FailOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(
                "Job {} panicked, marking execution {} as FAILED",
                self.execution.job_name, self.execution.id
            );
            self.execution.status = BatchStatus::Failed;
            record(self.job_repository, &self.execution);
        }
    }
}

/// Stores the status of `execution`. A failure is logged: the run already
/// happened and its outcome stays the caller's answer.
fn record(job_repository: &dyn JobRepository, execution: &JobExecution) {
    if let Err(error) = job_repository.update(execution) {
        error!(
            "Unable to record status {} of job {} execution {}: {}",
            execution.status, execution.job_name, execution.id, error
        );
    }
}

/// Launches jobs against a [`JobRepository`].
pub struct JobLauncher<'a> {
    job_repository: &'a dyn JobRepository,
}

impl<'a> JobLauncher<'a> {
    pub fn new(job_repository: &'a dyn JobRepository) -> Self {
        Self { job_repository }
    }

    /// Validates the parameters, registers a new execution and runs the job.
    ///
    /// A failed step does not make this method fail: the returned execution
    /// carries the `FAILED` status. Errors are only returned when the run is
    /// not admitted.
    ///
    /// The execution is recorded as STARTED before the job runs. If the job
    /// panics it is recorded as FAILED, so the instance can be restarted.
    pub fn run(&self, job: &dyn Job, parameters: &JobParameters) -> Result<JobExecution, BatchError> {
        job.validate(parameters)?;

        let mut execution = self
            .job_repository
            .create_job_execution(job.get_name(), parameters)?;

        info!(
            "Job: [name={}] launched with the following parameters: [{}]",
            job.get_name(),
            parameters
        );

        execution.status = BatchStatus::Started;
        record(self.job_repository, &execution);

        let guard = FailOnUnwind {
            job_repository: self.job_repository,
            execution: execution.clone(),
        };
        job.execute(&mut execution);
        drop(guard);

        record(self.job_repository, &execution);

        info!(
            "Job: [name={}] completed with the following parameters: [{}] and the following status: [{}] in {:?}",
            job.get_name(),
            parameters,
            execution.status,
            execution.duration
        );

        Ok(execution)
    }

    /// Runs the job and maps every result, admission errors included, to a
    /// [`JobOutcome`].
    pub fn trigger(&self, job: &dyn Job, parameters: &JobParameters) -> JobOutcome {
        match self.run(job, parameters) {
            Ok(execution) if execution.status == BatchStatus::Completed => {
                JobOutcome::Completed(execution)
            }
            Ok(execution) => JobOutcome::Failed(execution),
            Err(error) => {
                error!("Job {} was not launched: {}", job.get_name(), error);
                JobOutcome::Rejected(error)
            }
        }
    }
}
