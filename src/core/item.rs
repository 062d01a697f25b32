use crate::error::BatchError;

/// Result of a read: `Ok(None)` once the source is exhausted.
pub type ItemReaderResult<I> = Result<Option<I>, BatchError>;

/// Result of a processing call: `Ok(None)` drops the item from the chunk.
pub type ItemProcessorResult<O> = Result<Option<O>, BatchError>;

pub type ItemWriterResult = Result<(), BatchError>;

/// Retrieves input for a step, one item at a time.
pub trait ItemReader<I> {
    /// Reads the next item.
    ///
    /// # Returns
    /// - `Ok(Some(item))` when an item was read
    /// - `Ok(None)` when the source is exhausted (normal termination)
    /// - `Err(BatchError)` when the underlying resource or mapping failed
    fn read(&self) -> ItemReaderResult<I>;

    /// Acquires the underlying resource. Called once by the step before the
    /// first read.
    fn open(&self) -> Result<(), BatchError> {
        Ok(())
    }
}

/// Business logic applied to every item between the reader and the writer.
///
/// Implementations must be side-effect free: every change is carried by the
/// returned value. Returning `Ok(None)` filters the item out without failing
/// the step.
///
/// Any `Fn(&I) -> ItemProcessorResult<O>` is a processor, so variants can be
/// plugged in as closures:
///
/// ```
/// use batch_import::core::item::{ItemProcessor, ItemProcessorResult};
///
/// let trim = |item: &String| -> ItemProcessorResult<String> {
///     let trimmed = item.trim();
///     if trimmed.is_empty() {
///         Ok(None)
///     } else {
///         Ok(Some(trimmed.to_string()))
///     }
/// };
///
/// assert_eq!(trim.process(&" a ".to_string()).unwrap(), Some("a".to_string()));
/// assert_eq!(trim.process(&"  ".to_string()).unwrap(), None);
/// ```
pub trait ItemProcessor<I, O> {
    fn process(&self, item: &I) -> ItemProcessorResult<O>;
}

impl<I, O, F> ItemProcessor<I, O> for F
where
    F: Fn(&I) -> ItemProcessorResult<O>,
{
    fn process(&self, item: &I) -> ItemProcessorResult<O> {
        self(item)
    }
}

/// Output of a step, one chunk of items at a time.
pub trait ItemWriter<O> {
    /// Writes every item of the chunk, in order.
    fn write(&self, items: &[O]) -> ItemWriterResult;

    fn flush(&self) -> ItemWriterResult {
        Ok(())
    }

    fn open(&self) -> ItemWriterResult {
        Ok(())
    }

    fn close(&self) -> ItemWriterResult {
        Ok(())
    }
}

/// Processor returning a copy of its input.
#[derive(Default)]
pub struct PassThroughProcessor;

impl<T: Clone> ItemProcessor<T, T> for PassThroughProcessor {
    fn process(&self, item: &T) -> ItemProcessorResult<T> {
        Ok(Some(item.clone()))
    }
}
