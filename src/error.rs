use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
/// Batch error
pub enum BatchError {
    /// The source could not be read or tokenized.
    #[error("ItemReader from: {0}")]
    ItemReader(String),

    /// A field set could not be turned into an item.
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("ItemProcessor from: {0}")]
    ItemProcessor(String),

    #[error("ItemWriter from: {0}")]
    ItemWriter(String),

    /// Begin, commit or rollback of a transaction failed.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A chunk could not be committed and was rolled back.
    #[error("Chunk execution failed during {operation}: {cause}")]
    ChunkExecution { operation: String, cause: String },

    #[error("Step {0} failed")]
    Step(String),

    #[error("A job execution for this job is already running: {job_name} with parameters {parameters}")]
    JobExecutionAlreadyRunning {
        job_name: String,
        parameters: String,
    },

    #[error("A job instance already exists and is complete for identification parameters={parameters}. If you want to run this job again, change the parameters.")]
    JobInstanceAlreadyComplete {
        job_name: String,
        parameters: String,
    },

    /// The job repository could not record an execution.
    #[error("Job repository error: {0}")]
    JobRepository(String),

    #[error("Invalid job parameters: {0}")]
    InvalidJobParameters(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
