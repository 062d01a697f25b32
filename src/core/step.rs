use std::time::{Duration, Instant};

use log::{debug, error, info};
use uuid::Uuid;

use crate::BatchError;

use super::{
    chunk::Chunk,
    item::{ItemProcessor, ItemReader, ItemWriter},
    transaction::{ResourcelessTransactionManager, TransactionManager},
};

static RESOURCELESS_TRANSACTION_MANAGER: ResourcelessTransactionManager =
    ResourcelessTransactionManager;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum StepStatus {
    /// The step has been created but not executed yet.
    Starting,
    /// The step is reading, processing and writing chunks.
    Started,
    /// The source was exhausted and every chunk was committed.
    Completed,
    /// The step stopped on a read, process or write error.
    Failed,
}

/// Terminal result of a step.
#[derive(Debug, PartialEq, Clone)]
pub enum StepOutcome {
    Completed,
    /// The step failed; the causing error is retained.
    Failed(BatchError),
}

/// Execution details of one step run.
#[derive(Debug, Clone)]
pub struct StepExecution {
    /// Unique identifier for this step execution
    pub id: Uuid,
    /// Human-readable name for the step
    pub name: String,
    /// Current status of the step execution
    pub status: StepStatus,
    pub start_time: Instant,
    pub end_time: Instant,
    pub duration: Duration,
    /// Number of items successfully read
    pub read_count: usize,
    /// Number of items dropped by the processor
    pub filter_count: usize,
    /// Number of items written in committed chunks
    pub write_count: usize,
    /// Number of committed chunk transactions
    pub commit_count: usize,
    /// Number of rolled back chunk transactions
    pub rollback_count: usize,
    /// Error that terminated the step, if any
    pub failure: Option<BatchError>,
}

impl StepExecution {
    pub fn new(name: &str) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: StepStatus::Starting,
            start_time: now,
            end_time: now,
            duration: Duration::ZERO,
            read_count: 0,
            filter_count: 0,
            write_count: 0,
            commit_count: 0,
            rollback_count: 0,
            failure: None,
        }
    }

    pub fn outcome(&self) -> StepOutcome {
        match (&self.status, &self.failure) {
            (StepStatus::Completed, _) => StepOutcome::Completed,
            (_, Some(error)) => StepOutcome::Failed(error.clone()),
            (_, None) => StepOutcome::Failed(BatchError::Step(self.name.clone())),
        }
    }
}

/// A named, independent phase of a job.
pub trait Step {
    fn get_name(&self) -> &str;

    /// Runs the step to its end.
    ///
    /// Errors never escape: they end up in [`StepExecution::failure`] with the
    /// status set to [`StepStatus::Failed`]. No retry is attempted.
    fn execute(&self) -> StepExecution;
}

/// Step reading items one by one, processing them and writing them by chunk.
///
/// Each chunk is written inside its own transaction: the step begins a
/// transaction, hands every buffered item to the writer in read order and
/// commits. If the writer or the commit fails, the transaction is rolled back
/// and the step fails; chunks committed earlier stay committed.
///
/// Chunk boundaries only depend on the number of items kept by the processor:
/// a chunk is written as soon as it holds `chunk_size` items, and the last one
/// may be shorter.
pub struct ChunkOrientedStep<'a, I, O> {
    name: String,
    /// Component responsible for reading items from the source
    reader: &'a dyn ItemReader<I>,
    /// Component responsible for processing items
    processor: &'a dyn ItemProcessor<I, O>,
    /// Component responsible for writing items to the destination
    writer: &'a dyn ItemWriter<O>,
    /// Transaction wrapping the write of every chunk
    transaction_manager: &'a dyn TransactionManager,
    /// Number of items committed per transaction
    chunk_size: usize,
}

impl<I, O> Step for ChunkOrientedStep<'_, I, O> {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn execute(&self) -> StepExecution {
        let mut step_execution = StepExecution::new(&self.name);
        let start_time = Instant::now();

        info!(
            "Start of step: {}, id: {}",
            step_execution.name, step_execution.id
        );

        step_execution.status = StepStatus::Started;

        match self.open_and_run(&mut step_execution) {
            Ok(()) => step_execution.status = StepStatus::Completed,
            Err(error) => {
                error!("Step {} failed: {}", step_execution.name, error);
                step_execution.status = StepStatus::Failed;
                step_execution.failure = Some(error);
            }
        }

        step_execution.start_time = start_time;
        step_execution.end_time = Instant::now();
        step_execution.duration = start_time.elapsed();

        info!(
            "End of step: {}, id: {}, status: {:?}, read: {}, filtered: {}, written: {}, commits: {}, rollbacks: {}, duration: {:?}",
            step_execution.name,
            step_execution.id,
            step_execution.status,
            step_execution.read_count,
            step_execution.filter_count,
            step_execution.write_count,
            step_execution.commit_count,
            step_execution.rollback_count,
            step_execution.duration
        );

        step_execution
    }
}

impl<I, O> ChunkOrientedStep<'_, I, O> {
    fn open_and_run(&self, step_execution: &mut StepExecution) -> Result<(), BatchError> {
        self.reader.open()?;
        self.writer.open()?;

        let result = self.run_chunks(step_execution);
        let close_result = self.writer.close();

        result.and(close_result)
    }

    fn run_chunks(&self, step_execution: &mut StepExecution) -> Result<(), BatchError> {
        let mut chunk = Chunk::new(self.chunk_size);

        loop {
            self.fill_chunk(step_execution, &mut chunk)?;

            if !chunk.is_empty() {
                self.write_chunk(step_execution, chunk.get_items())?;
            }

            if chunk.is_finished() {
                return Ok(());
            }

            chunk.clear();
        }
    }

    /// Reads and processes items until the chunk is full or the reader is
    /// exhausted.
    fn fill_chunk(
        &self,
        step_execution: &mut StepExecution,
        chunk: &mut Chunk<O>,
    ) -> Result<(), BatchError> {
        debug!("Start reading chunk");

        while !chunk.is_full() {
            let Some(item) = self.reader.read()? else {
                debug!("End reading chunk: FINISHED");
                chunk.finish();
                return Ok(());
            };
            step_execution.read_count += 1;

            match self.processor.process(&item)? {
                Some(processed) => chunk.add_item(processed),
                None => {
                    debug!("Item filtered by processor");
                    step_execution.filter_count += 1;
                }
            }
        }

        debug!("End reading chunk: FULL");
        Ok(())
    }

    fn write_chunk(
        &self,
        step_execution: &mut StepExecution,
        items: &[O],
    ) -> Result<(), BatchError> {
        debug!("Writing chunk of {} items", items.len());

        self.transaction_manager
            .begin()
            .map_err(|error| chunk_execution_error("begin", &error))?;

        if let Err(error) = self.writer.write(items).and_then(|()| self.writer.flush()) {
            return Err(self.rollback(step_execution, "write", error));
        }

        if let Err(error) = self.transaction_manager.commit() {
            return Err(self.rollback(step_execution, "commit", error));
        }

        step_execution.write_count += items.len();
        step_execution.commit_count += 1;
        debug!("Chunk of {} items committed", items.len());

        Ok(())
    }

    fn rollback(
        &self,
        step_execution: &mut StepExecution,
        operation: &str,
        cause: BatchError,
    ) -> BatchError {
        error!("Rolling back chunk after {} failure: {}", operation, cause);
        step_execution.rollback_count += 1;

        if let Err(error) = self.transaction_manager.rollback() {
            error!("Rollback failed: {}", error);
        }

        chunk_execution_error(operation, &cause)
    }
}

fn chunk_execution_error(operation: &str, cause: &BatchError) -> BatchError {
    BatchError::ChunkExecution {
        operation: operation.to_string(),
        cause: cause.to_string(),
    }
}

/// Entry point for building steps.
///
/// ```
/// use batch_import::core::item::{ItemProcessorResult, ItemReader, ItemReaderResult, ItemWriter, ItemWriterResult};
/// use batch_import::core::step::{Step, StepBuilder, StepStatus};
/// use std::cell::{Cell, RefCell};
///
/// struct CountDown(Cell<u32>);
/// impl ItemReader<u32> for CountDown {
///     fn read(&self) -> ItemReaderResult<u32> {
///         let value = self.0.get();
///         if value == 0 {
///             return Ok(None);
///         }
///         self.0.set(value - 1);
///         Ok(Some(value))
///     }
/// }
///
/// #[derive(Default)]
/// struct Collect(RefCell<Vec<Vec<u32>>>);
/// impl ItemWriter<u32> for Collect {
///     fn write(&self, items: &[u32]) -> ItemWriterResult {
///         self.0.borrow_mut().push(items.to_vec());
///         Ok(())
///     }
/// }
///
/// let reader = CountDown(Cell::new(5));
/// let writer = Collect::default();
/// let processor = |item: &u32| -> ItemProcessorResult<u32> { Ok(Some(item * 10)) };
///
/// let step = StepBuilder::new("count-down")
///     .chunk::<u32, u32>(2)
///     .reader(&reader)
///     .processor(&processor)
///     .writer(&writer)
///     .build()
///     .unwrap();
///
/// let execution = step.execute();
/// assert_eq!(execution.status, StepStatus::Completed);
/// assert_eq!(execution.commit_count, 3);
/// assert_eq!(*writer.0.borrow(), vec![vec![50, 40], vec![30, 20], vec![10]]);
/// ```
pub struct StepBuilder {
    name: String,
}

impl StepBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn chunk<'a, I, O>(self, chunk_size: usize) -> ChunkOrientedStepBuilder<'a, I, O> {
        ChunkOrientedStepBuilder::new(&self.name).chunk_size(chunk_size)
    }
}

pub struct ChunkOrientedStepBuilder<'a, I, O> {
    name: String,
    reader: Option<&'a dyn ItemReader<I>>,
    processor: Option<&'a dyn ItemProcessor<I, O>>,
    writer: Option<&'a dyn ItemWriter<O>>,
    transaction_manager: Option<&'a dyn TransactionManager>,
    chunk_size: usize,
}

impl<'a, I, O> ChunkOrientedStepBuilder<'a, I, O> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reader: None,
            processor: None,
            writer: None,
            transaction_manager: None,
            chunk_size: 10,
        }
    }

    pub fn reader(mut self, reader: &'a dyn ItemReader<I>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn processor(mut self, processor: &'a dyn ItemProcessor<I, O>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn writer(mut self, writer: &'a dyn ItemWriter<O>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Sets the transaction manager wrapping each chunk write.
    ///
    /// Defaults to [`ResourcelessTransactionManager`].
    pub fn transaction_manager(mut self, transaction_manager: &'a dyn TransactionManager) -> Self {
        self.transaction_manager = Some(transaction_manager);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn build(self) -> Result<ChunkOrientedStep<'a, I, O>, BatchError> {
        if self.chunk_size == 0 {
            return Err(BatchError::Configuration(format!(
                "Chunk size of step {} must be greater than zero",
                self.name
            )));
        }

        let reader = self.reader.ok_or_else(|| {
            BatchError::Configuration(format!("Reader is required for step {}", self.name))
        })?;
        let processor = self.processor.ok_or_else(|| {
            BatchError::Configuration(format!("Processor is required for step {}", self.name))
        })?;
        let writer = self.writer.ok_or_else(|| {
            BatchError::Configuration(format!("Writer is required for step {}", self.name))
        })?;

        Ok(ChunkOrientedStep {
            name: self.name,
            reader,
            processor,
            writer,
            transaction_manager: self
                .transaction_manager
                .unwrap_or(&RESOURCELESS_TRANSACTION_MANAGER),
            chunk_size: self.chunk_size,
        })
    }
}
