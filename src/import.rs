//! The user import job: a single chunk-oriented step reading users from a
//! delimited file, upper-casing their names and saving them to a repository.
//!
//! [`ImportJobTrigger`] is the entry point an outer layer (an HTTP handler, a
//! scheduler) calls. It never fails: every run ends in a status string.
//!
//! ```
//! use batch_import::core::repository::InMemoryJobRepository;
//! use batch_import::import::{ImportJobConfig, ImportJobTrigger};
//! use batch_import::item::repository::InMemoryRepository;
//! use batch_import::user::User;
//! use std::io::Write;
//!
//! let mut file = tempfile::NamedTempFile::new().unwrap();
//! writeln!(file, "id,userId,firstName,lastName,gender,email,phone,dateOfBirth,jobTitle").unwrap();
//! writeln!(file, "1,u1,john,doe,M,j@x.com,123,1990-01-01,eng").unwrap();
//!
//! let config = ImportJobConfig {
//!     resource: file.path().to_path_buf(),
//!     ..ImportJobConfig::default()
//! };
//!
//! let users: InMemoryRepository<User> = InMemoryRepository::new();
//! let job_repository = InMemoryJobRepository::new();
//! let trigger = ImportJobTrigger::new(config, &job_repository, &users, &users).unwrap();
//!
//! assert_eq!(trigger.import_data(), "COMPLETED");
//! assert_eq!(users.find_by_id(&1).unwrap().first_name, "JOHN");
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    BatchError,
    core::{
        job::{
            DefaultJobParametersValidator, JobBuilder, JobParameters, JobParametersBuilder,
            JobParametersValidator,
        },
        launcher::{JobLauncher, JobOutcome},
        repository::JobRepository,
        step::StepBuilder,
        transaction::TransactionManager,
    },
    item::{
        csv::csv_reader::CsvItemReaderBuilder,
        repository::{Repository, RepositoryItemWriter},
    },
    user::{USER_FIELD_NAMES, UpperCaseNameProcessor, User},
};

/// Identifying parameter making every triggered run a new job instance.
pub const START_AT: &str = "startAt";

/// Settings of the import job.
///
/// Every field has a default, so a JSON document only needs the values it
/// changes:
///
/// ```
/// use batch_import::import::ImportJobConfig;
///
/// let config = ImportJobConfig::from_json_str(r#"{ "chunkSize": 100 }"#).unwrap();
/// assert_eq!(config.chunk_size, 100);
/// assert_eq!(config.job_name, "importUsers");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportJobConfig {
    /// Number of users committed per transaction
    pub chunk_size: usize,
    pub delimiter: String,
    /// Header lines to discard
    pub lines_to_skip: usize,
    /// Rejects lines whose value count differs from the field count
    pub strict: bool,
    pub job_name: String,
    pub step_name: String,
    /// Delimited file holding the users
    pub resource: PathBuf,
}

impl Default for ImportJobConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            delimiter: ",".to_string(),
            lines_to_skip: 1,
            strict: false,
            job_name: "importUsers".to_string(),
            step_name: "csv-import-step".to_string(),
            resource: PathBuf::from("users-1000.csv"),
        }
    }
}

impl ImportJobConfig {
    pub fn from_json_str(json: &str) -> Result<Self, BatchError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|error| BatchError::Configuration(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, BatchError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|error| {
            BatchError::Configuration(format!("Unable to read {}: {}", path.display(), error))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.chunk_size == 0 {
            return Err(BatchError::Configuration(
                "chunkSize must be greater than 0".to_string(),
            ));
        }
        self.delimiter_byte()?;
        Ok(())
    }

    fn delimiter_byte(&self) -> Result<u8, BatchError> {
        match self.delimiter.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(BatchError::Configuration(format!(
                "delimiter must be a single byte, got {:?}",
                self.delimiter
            ))),
        }
    }
}

/// Requires `startAt` and checks it is a long.
struct ImportParametersValidator {
    keys: DefaultJobParametersValidator,
}

impl ImportParametersValidator {
    fn new() -> Self {
        Self {
            keys: DefaultJobParametersValidator::new(&[START_AT], &[]),
        }
    }
}

impl JobParametersValidator for ImportParametersValidator {
    fn validate(&self, parameters: &JobParameters) -> Result<(), BatchError> {
        self.keys.validate(parameters)?;

        if parameters.get_long(START_AT).is_none() {
            return Err(BatchError::InvalidJobParameters(format!(
                "{} must be a long",
                START_AT
            )));
        }
        Ok(())
    }
}

/// Launches the import job, one new instance per call.
///
/// The user repository and the transaction manager are usually the same
/// object (see [`InMemoryRepository`](crate::item::repository::InMemoryRepository)):
/// the transaction manager decides when the saves of a chunk become visible.
///
/// A trigger is `Sync`: concurrent callers may share it, each run gets its own
/// reader and step.
pub struct ImportJobTrigger<'a> {
    config: ImportJobConfig,
    job_repository: &'a dyn JobRepository,
    repository: &'a (dyn Repository<User> + Sync),
    transaction_manager: &'a (dyn TransactionManager + Sync),
}

impl<'a> ImportJobTrigger<'a> {
    /// # Errors
    /// Returns `BatchError::Configuration` if the configuration is invalid.
    pub fn new(
        config: ImportJobConfig,
        job_repository: &'a dyn JobRepository,
        repository: &'a (dyn Repository<User> + Sync),
        transaction_manager: &'a (dyn TransactionManager + Sync),
    ) -> Result<Self, BatchError> {
        config.validate()?;
        Ok(Self {
            config,
            job_repository,
            repository,
            transaction_manager,
        })
    }

    pub fn config(&self) -> &ImportJobConfig {
        &self.config
    }

    /// Runs the job with a fresh `startAt` taken from the current time and
    /// returns its status: `COMPLETED`, `FAILED` or
    /// `Job failed with exception: <cause>`.
    pub fn import_data(&self) -> String {
        let outcome = self.trigger(Utc::now().timestamp_millis());
        info!("Import of {} ended: {}", self.config.resource.display(), outcome);
        outcome.to_string()
    }

    /// Runs the job identified by `start_at`.
    pub fn trigger(&self, start_at: i64) -> JobOutcome {
        let parameters = JobParametersBuilder::new()
            .add_long(START_AT, start_at)
            .to_job_parameters();
        self.launch(&parameters)
    }

    /// Runs the job with explicit parameters.
    pub fn launch(&self, parameters: &JobParameters) -> JobOutcome {
        match self.try_launch(parameters) {
            Ok(outcome) => outcome,
            Err(error) => JobOutcome::Rejected(error),
        }
    }

    fn try_launch(&self, parameters: &JobParameters) -> Result<JobOutcome, BatchError> {
        let reader = CsvItemReaderBuilder::new()
            .names(&USER_FIELD_NAMES)
            .delimiter(self.config.delimiter_byte()?)
            .lines_to_skip(self.config.lines_to_skip)
            .strict(self.config.strict)
            .from_path(&self.config.resource);

        let processor = UpperCaseNameProcessor;
        let writer = RepositoryItemWriter::new(self.repository);

        let step = StepBuilder::new(&self.config.step_name)
            .chunk::<User, User>(self.config.chunk_size)
            .reader(&reader)
            .processor(&processor)
            .writer(&writer)
            .transaction_manager(self.transaction_manager)
            .build()?;

        let validator = ImportParametersValidator::new();
        let job = JobBuilder::new()
            .name(&self.config.job_name)
            .start(&step)
            .validator(&validator)
            .build();

        Ok(JobLauncher::new(self.job_repository).trigger(&job, parameters))
    }
}
