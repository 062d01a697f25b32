use std::{
    collections::BTreeMap,
    fmt,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::BatchError;

use super::{
    build_name,
    step::{Step, StepExecution, StepOutcome},
};

/// Lifecycle of a job execution: `NotStarted -> Started -> {Completed | Failed}`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BatchStatus {
    /// The execution is registered but no step has run yet.
    NotStarted,
    /// The execution is running its steps.
    Started,
    /// Every step completed.
    Completed,
    /// A step failed.
    Failed,
}

impl BatchStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, BatchStatus::NotStarted | BatchStatus::Started)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            BatchStatus::NotStarted => "NOT_STARTED",
            BatchStatus::Started => "STARTED",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
        };
        f.write_str(status)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Long(i64),
    String(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Long(value) => write!(f, "{}", value),
            ParameterValue::String(value) => f.write_str(value),
        }
    }
}

/// A single job parameter.
///
/// Identifying parameters take part in the identity of the job instance;
/// the others are only carried to the execution.
#[derive(Debug, Clone, PartialEq)]
pub struct JobParameter {
    pub value: ParameterValue,
    pub identifying: bool,
}

/// Parameters of one job run, sorted by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobParameters {
    parameters: BTreeMap<String, JobParameter>,
}

impl JobParameters {
    pub fn get(&self, key: &str) -> Option<&JobParameter> {
        self.parameters.get(key)
    }

    pub fn get_long(&self, key: &str) -> Option<i64> {
        match self.get(key).map(|parameter| &parameter.value) {
            Some(ParameterValue::Long(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.get(key).map(|parameter| &parameter.value) {
            Some(ParameterValue::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Canonical text of the identifying parameters, used as the instance key.
    pub fn identifying_key(&self) -> String {
        self.parameters
            .iter()
            .filter(|(_, parameter)| parameter.identifying)
            .map(|(key, parameter)| format!("{}={};", key, parameter.value))
            .collect()
    }
}

impl fmt::Display for JobParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .parameters
            .iter()
            .map(|(key, parameter)| format!("{}={}", key, parameter.value))
            .collect();
        write!(f, "{{{}}}", entries.join(", "))
    }
}

/// Builder for [`JobParameters`].
///
/// ```
/// use batch_import::core::job::JobParametersBuilder;
///
/// let parameters = JobParametersBuilder::new()
///     .add_long("startAt", 1_700_000_000_000)
///     .add_non_identifying_string("requestedBy", "scheduler")
///     .to_job_parameters();
///
/// assert_eq!(parameters.get_long("startAt"), Some(1_700_000_000_000));
/// assert_eq!(parameters.identifying_key(), "startAt=1700000000000;");
/// ```
#[derive(Default)]
pub struct JobParametersBuilder {
    parameters: BTreeMap<String, JobParameter>,
}

impl JobParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_long(self, key: &str, value: i64) -> Self {
        self.add(key, ParameterValue::Long(value), true)
    }

    pub fn add_string(self, key: &str, value: &str) -> Self {
        self.add(key, ParameterValue::String(value.to_string()), true)
    }

    pub fn add_non_identifying_long(self, key: &str, value: i64) -> Self {
        self.add(key, ParameterValue::Long(value), false)
    }

    pub fn add_non_identifying_string(self, key: &str, value: &str) -> Self {
        self.add(key, ParameterValue::String(value.to_string()), false)
    }

    fn add(mut self, key: &str, value: ParameterValue, identifying: bool) -> Self {
        self.parameters
            .insert(key.to_string(), JobParameter { value, identifying });
        self
    }

    pub fn to_job_parameters(self) -> JobParameters {
        JobParameters {
            parameters: self.parameters,
        }
    }
}

/// Checks parameters before a job execution is registered.
pub trait JobParametersValidator {
    fn validate(&self, parameters: &JobParameters) -> Result<(), BatchError>;
}

/// Validator checking required and optional keys.
///
/// Every required key must be present. When optional keys are declared, any
/// key that is neither required nor optional is rejected.
#[derive(Default)]
pub struct DefaultJobParametersValidator {
    required_keys: Vec<String>,
    optional_keys: Vec<String>,
}

impl DefaultJobParametersValidator {
    pub fn new(required_keys: &[&str], optional_keys: &[&str]) -> Self {
        Self {
            required_keys: required_keys.iter().map(|key| key.to_string()).collect(),
            optional_keys: optional_keys.iter().map(|key| key.to_string()).collect(),
        }
    }
}

impl JobParametersValidator for DefaultJobParametersValidator {
    fn validate(&self, parameters: &JobParameters) -> Result<(), BatchError> {
        let missing: Vec<&str> = self
            .required_keys
            .iter()
            .map(String::as_str)
            .filter(|key| parameters.get(key).is_none())
            .collect();

        if !missing.is_empty() {
            return Err(BatchError::InvalidJobParameters(format!(
                "The JobParameters do not contain required keys: {:?}",
                missing
            )));
        }

        if !self.optional_keys.is_empty() {
            let unexpected: Vec<&str> = parameters
                .keys()
                .filter(|key| {
                    !self.required_keys.iter().any(|required| required == key)
                        && !self.optional_keys.iter().any(|optional| optional == key)
                })
                .collect();

            if !unexpected.is_empty() {
                return Err(BatchError::InvalidJobParameters(format!(
                    "The JobParameters contains keys that are not explicitly optional or required: {:?}",
                    unexpected
                )));
            }
        }

        Ok(())
    }
}

/// Represents the execution of a job.
#[derive(Debug, Clone)]
pub struct JobExecution {
    pub id: Uuid,
    pub job_name: String,
    pub parameters: JobParameters,
    pub status: BatchStatus,
    /// Wall clock time at which the execution was registered
    pub create_time: DateTime<Utc>,
    pub start: Instant,
    pub end: Instant,
    pub duration: Duration,
    pub step_executions: Vec<StepExecution>,
    /// Errors of the failed steps
    pub failures: Vec<BatchError>,
}

impl JobExecution {
    pub fn new(job_name: &str, parameters: JobParameters) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            parameters,
            status: BatchStatus::NotStarted,
            create_time: Utc::now(),
            start: now,
            end: now,
            duration: Duration::ZERO,
            step_executions: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Messages of every failure, joined for diagnosis.
    pub fn failure_message(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        Some(
            self.failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Represents a job that can be executed.
pub trait Job {
    fn get_name(&self) -> &str;

    /// Validates the parameters of a run. Accepts anything by default.
    fn validate(&self, _parameters: &JobParameters) -> Result<(), BatchError> {
        Ok(())
    }

    /// Runs the steps, recording status and step executions on `execution`.
    fn execute(&self, execution: &mut JobExecution);
}

/// Job running its steps in sequence, stopping at the first failed step.
pub struct SimpleJob<'a> {
    /// Human-readable name for the job
    name: String,
    /// Collection of steps that make up this job, in execution order
    steps: Vec<&'a dyn Step>,
    validator: Option<&'a dyn JobParametersValidator>,
}

impl Job for SimpleJob<'_> {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn validate(&self, parameters: &JobParameters) -> Result<(), BatchError> {
        match self.validator {
            Some(validator) => validator.validate(parameters),
            None => Ok(()),
        }
    }

    fn execute(&self, execution: &mut JobExecution) {
        let start = Instant::now();

        info!("Start of job: {}, id: {}", self.name, execution.id);
        execution.status = BatchStatus::Started;

        for step in &self.steps {
            let step_execution = step.execute();
            let outcome = step_execution.outcome();
            execution.step_executions.push(step_execution);

            if let StepOutcome::Failed(cause) = outcome {
                warn!("Step {} of job {} failed: {}", step.get_name(), self.name, cause);
                execution.failures.push(cause);
                execution.status = BatchStatus::Failed;
                break;
            }
        }

        if execution.status == BatchStatus::Started {
            execution.status = BatchStatus::Completed;
        }

        execution.start = start;
        execution.end = Instant::now();
        execution.duration = start.elapsed();

        info!(
            "End of job: {}, id: {}, status: {}",
            self.name, execution.id, execution.status
        );
    }
}

/// Builder for creating a job.
///
/// If no name is given a random one is generated.
#[derive(Default)]
pub struct JobBuilder<'a> {
    name: Option<String>,
    steps: Vec<&'a dyn Step>,
    validator: Option<&'a dyn JobParametersValidator>,
}

impl<'a> JobBuilder<'a> {
    pub fn new() -> Self {
        Self {
            name: None,
            steps: Vec::new(),
            validator: None,
        }
    }

    pub fn name(mut self, name: &str) -> JobBuilder<'a> {
        self.name = Some(name.to_string());
        self
    }

    /// Sets the first step of the job.
    pub fn start(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    /// Adds a step, run after the previous ones.
    pub fn next(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    pub fn validator(mut self, validator: &'a dyn JobParametersValidator) -> JobBuilder<'a> {
        self.validator = Some(validator);
        self
    }

    pub fn build(self) -> SimpleJob<'a> {
        SimpleJob {
            name: self.name.unwrap_or_else(build_name),
            steps: self.steps,
            validator: self.validator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::step::StepStatus;

    struct FixedStep {
        name: String,
        failure: Option<BatchError>,
    }

    impl Step for FixedStep {
        fn get_name(&self) -> &str {
            &self.name
        }

        fn execute(&self) -> StepExecution {
            let mut execution = StepExecution::new(&self.name);
            match &self.failure {
                Some(error) => {
                    execution.status = StepStatus::Failed;
                    execution.failure = Some(error.clone());
                }
                None => execution.status = StepStatus::Completed,
            }
            execution
        }
    }

    fn step(name: &str, failure: Option<BatchError>) -> FixedStep {
        FixedStep {
            name: name.to_string(),
            failure,
        }
    }

    #[test]
    fn job_completes_when_every_step_completes() {
        let first = step("first", None);
        let second = step("second", None);
        let job = JobBuilder::new()
            .name("test")
            .start(&first)
            .next(&second)
            .build();

        let mut execution = JobExecution::new(job.get_name(), JobParameters::default());
        job.execute(&mut execution);

        assert_eq!(execution.status, BatchStatus::Completed);
        assert_eq!(execution.step_executions.len(), 2);
        assert_eq!(execution.failure_message(), None);
    }

    #[test]
    fn job_stops_at_first_failed_step() {
        let first = step("first", Some(BatchError::Mapping("bad line".to_string())));
        let second = step("second", None);
        let job = JobBuilder::new().start(&first).next(&second).build();

        let mut execution = JobExecution::new(job.get_name(), JobParameters::default());
        job.execute(&mut execution);

        assert_eq!(execution.status, BatchStatus::Failed);
        assert_eq!(execution.step_executions.len(), 1);
        assert_eq!(
            execution.failure_message(),
            Some("Mapping error: bad line".to_string())
        );
    }

    #[test]
    fn unnamed_job_gets_random_name() {
        let job = JobBuilder::new().build();
        assert_eq!(job.get_name().len(), 8);
    }

    #[test]
    fn status_renders_in_upper_case() {
        assert_eq!(BatchStatus::Completed.to_string(), "COMPLETED");
        assert_eq!(BatchStatus::Failed.to_string(), "FAILED");
        assert_eq!(BatchStatus::NotStarted.to_string(), "NOT_STARTED");
    }

    #[test]
    fn identifying_key_ignores_non_identifying_parameters() {
        let parameters = JobParametersBuilder::new()
            .add_long("startAt", 42)
            .add_string("file", "users.csv")
            .add_non_identifying_long("attempt", 3)
            .to_job_parameters();

        assert_eq!(parameters.identifying_key(), "file=users.csv;startAt=42;");
        assert_eq!(parameters.get_string("file"), Some("users.csv"));
        assert_eq!(parameters.get_long("file"), None);
        assert_eq!(
            parameters.to_string(),
            "{attempt=3, file=users.csv, startAt=42}"
        );
    }

    #[test]
    fn validator_reports_missing_and_unexpected_keys() {
        let validator = DefaultJobParametersValidator::new(&["startAt"], &["file"]);

        let valid = JobParametersBuilder::new()
            .add_long("startAt", 1)
            .add_string("file", "users.csv")
            .to_job_parameters();
        assert!(validator.validate(&valid).is_ok());

        let missing = JobParametersBuilder::new()
            .add_string("file", "users.csv")
            .to_job_parameters();
        assert!(matches!(
            validator.validate(&missing),
            Err(BatchError::InvalidJobParameters(_))
        ));

        let unexpected = JobParametersBuilder::new()
            .add_long("startAt", 1)
            .add_long("other", 2)
            .to_job_parameters();
        assert!(matches!(
            validator.validate(&unexpected),
            Err(BatchError::InvalidJobParameters(_))
        ));
    }
}
