use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use log::debug;
use uuid::Uuid;

use crate::BatchError;

use super::job::{BatchStatus, JobExecution, JobParameters};

/// Identity of a job instance: the job name and its identifying parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobInstanceKey {
    pub job_name: String,
    pub parameters: String,
}

impl JobInstanceKey {
    pub fn new(job_name: &str, parameters: &JobParameters) -> Self {
        Self {
            job_name: job_name.to_string(),
            parameters: parameters.identifying_key(),
        }
    }
}

/// Bookkeeping of job instances and their executions.
///
/// Implementations are shared between concurrent launches, so the admission
/// check of [`create_job_execution`](JobRepository::create_job_execution) and
/// the registration of the new execution must happen atomically.
pub trait JobRepository: Send + Sync {
    /// Registers a new execution for `(job_name, parameters)`.
    ///
    /// # Errors
    /// - [`BatchError::JobExecutionAlreadyRunning`] if an execution of the same
    ///   instance has not finished yet
    /// - [`BatchError::JobInstanceAlreadyComplete`] if the instance already
    ///   completed; a failed instance may be executed again
    fn create_job_execution(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> Result<JobExecution, BatchError>;

    /// Stores the current status of an execution.
    fn update(&self, execution: &JobExecution) -> Result<(), BatchError>;

    /// Status of the most recent execution of an instance.
    fn get_last_status(&self, job_name: &str, parameters: &JobParameters) -> Option<BatchStatus>;
}

#[derive(Debug, Clone)]
struct ExecutionRecord {
    id: Uuid,
    status: BatchStatus,
}

/// Job repository kept in process memory.
#[derive(Default)]
pub struct InMemoryJobRepository {
    instances: Mutex<HashMap<JobInstanceKey, Vec<ExecutionRecord>>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executions registered for an instance.
    pub fn execution_count(&self, job_name: &str, parameters: &JobParameters) -> usize {
        let instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        instances
            .get(&JobInstanceKey::new(job_name, parameters))
            .map_or(0, Vec::len)
    }
}

impl JobRepository for InMemoryJobRepository {
    fn create_job_execution(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> Result<JobExecution, BatchError> {
        let key = JobInstanceKey::new(job_name, parameters);
        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        let executions = instances.entry(key).or_default();

        if let Some(last) = executions.last() {
            if last.status.is_running() {
                return Err(BatchError::JobExecutionAlreadyRunning {
                    job_name: job_name.to_string(),
                    parameters: parameters.to_string(),
                });
            }
            if last.status == BatchStatus::Completed {
                return Err(BatchError::JobInstanceAlreadyComplete {
                    job_name: job_name.to_string(),
                    parameters: parameters.to_string(),
                });
            }
            debug!(
                "Restarting failed instance of job {} with parameters {}",
                job_name, parameters
            );
        }

        let execution = JobExecution::new(job_name, parameters.clone());
        executions.push(ExecutionRecord {
            id: execution.id,
            status: execution.status,
        });

        Ok(execution)
    }

    fn update(&self, execution: &JobExecution) -> Result<(), BatchError> {
        let key = JobInstanceKey::new(&execution.job_name, &execution.parameters);
        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);

        let record = instances
            .get_mut(&key)
            .and_then(|executions| executions.iter_mut().find(|record| record.id == execution.id))
            .ok_or_else(|| {
                BatchError::JobRepository(format!(
                    "Unknown execution {} of job {}",
                    execution.id, execution.job_name
                ))
            })?;

        record.status = execution.status;
        Ok(())
    }

    fn get_last_status(&self, job_name: &str, parameters: &JobParameters) -> Option<BatchStatus> {
        let instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        instances
            .get(&JobInstanceKey::new(job_name, parameters))
            .and_then(|executions| executions.last())
            .map(|record| record.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::JobParametersBuilder;

    fn parameters(start_at: i64) -> JobParameters {
        JobParametersBuilder::new()
            .add_long("startAt", start_at)
            .to_job_parameters()
    }

    #[test]
    fn running_instance_rejects_second_execution() {
        let repository = InMemoryJobRepository::new();
        repository
            .create_job_execution("importUsers", &parameters(1))
            .unwrap();

        let second = repository.create_job_execution("importUsers", &parameters(1));
        assert!(matches!(
            second,
            Err(BatchError::JobExecutionAlreadyRunning { .. })
        ));
    }

    #[test]
    fn completed_instance_is_not_executed_again() {
        let repository = InMemoryJobRepository::new();
        let mut execution = repository
            .create_job_execution("importUsers", &parameters(1))
            .unwrap();
        execution.status = BatchStatus::Completed;
        repository.update(&execution).unwrap();

        let second = repository.create_job_execution("importUsers", &parameters(1));
        assert!(matches!(
            second,
            Err(BatchError::JobInstanceAlreadyComplete { .. })
        ));

        assert!(
            repository
                .create_job_execution("importUsers", &parameters(2))
                .is_ok()
        );
    }

    #[test]
    fn failed_instance_can_be_restarted() {
        let repository = InMemoryJobRepository::new();
        let mut execution = repository
            .create_job_execution("importUsers", &parameters(1))
            .unwrap();
        execution.status = BatchStatus::Failed;
        repository.update(&execution).unwrap();

        assert!(
            repository
                .create_job_execution("importUsers", &parameters(1))
                .is_ok()
        );
        assert_eq!(repository.execution_count("importUsers", &parameters(1)), 2);
        assert_eq!(
            repository.get_last_status("importUsers", &parameters(1)),
            Some(BatchStatus::NotStarted)
        );
    }

    #[test]
    fn same_parameters_of_other_job_are_another_instance() {
        let repository = InMemoryJobRepository::new();
        repository
            .create_job_execution("importUsers", &parameters(1))
            .unwrap();

        assert!(
            repository
                .create_job_execution("exportUsers", &parameters(1))
                .is_ok()
        );
    }

    #[test]
    fn update_of_unknown_execution_fails() {
        let repository = InMemoryJobRepository::new();
        let execution = JobExecution::new("importUsers", parameters(1));

        match repository.update(&execution) {
            Err(BatchError::JobRepository(message)) => {
                assert!(message.starts_with("Unknown execution"), "{}", message);
                assert!(message.ends_with("of job importUsers"), "{}", message);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
