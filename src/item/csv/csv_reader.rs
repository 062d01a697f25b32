use csv::{ReaderBuilder, StringRecordsIntoIter, Terminator, Trim};
use log::{debug, warn};
use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::Read,
    path::Path,
};

use crate::{
    core::item::{ItemReader, ItemReaderResult},
    error::BatchError,
};

use super::field_set::{FieldSet, FieldSetMapper, SerdeFieldSetMapper};

type Opener<R> = Box<dyn FnOnce() -> Result<StringRecordsIntoIter<R>, BatchError>>;

/// Reader of delimited text producing one [`FieldSet`] per line and mapping it
/// to an item with a [`FieldSetMapper`].
///
/// # Implementation Details
///
/// - The first `lines_to_skip` lines (headers) are discarded on the first read
/// - In lenient mode (`strict(false)`) ragged lines are accepted: missing
///   trailing values read as empty, extra values are ignored
/// - In strict mode a line whose value count differs from the declared name
///   count is a read error
/// - A reader built with [`CsvItemReaderBuilder::from_path`] opens its file
///   in [`ItemReader::open`] (or on the first read), so an unreadable file
///   fails the step rather than its construction
/// - The underlying resource is dropped as soon as it is exhausted, or with the
///   reader if it is abandoned earlier
///
/// # Examples
///
/// ```
/// use batch_import::item::csv::csv_reader::CsvItemReaderBuilder;
/// use batch_import::core::item::ItemReader;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct City {
///     city: String,
///     country: String,
///     pop: Option<u32>,
/// }
///
/// let data = "\
/// city,country,pop
/// Boston,United States,4628910
/// Concord,United States
/// ";
///
/// let reader = CsvItemReaderBuilder::new()
///     .names(&["city", "country", "pop"])
///     .lines_to_skip(1)
///     .strict(false)
///     .from_reader(data.as_bytes());
///
/// let boston: City = reader.read().unwrap().unwrap();
/// assert_eq!(boston.pop, Some(4628910));
///
/// let concord: City = reader.read().unwrap().unwrap();
/// assert_eq!(concord.country, "United States");
/// assert_eq!(concord.pop, None);
///
/// assert!(ItemReader::<City>::read(&reader).unwrap().is_none());
/// ```
pub struct CsvItemReader<R, M = SerdeFieldSetMapper> {
    /// Iterator over the raw records, `None` before opening and once exhausted
    records: RefCell<Option<StringRecordsIntoIter<R>>>,
    /// Deferred opening of the resource, taken on first use
    opener: RefCell<Option<Opener<R>>>,
    names: Vec<String>,
    lines_to_skip: usize,
    strict: bool,
    skipped: Cell<bool>,
    /// Line of the last record read, for error messages
    line: Cell<u64>,
    field_set_mapper: M,
}

impl<R: Read, M> CsvItemReader<R, M> {
    fn open_records(&self) -> Result<(), BatchError> {
        let opener = self.opener.borrow_mut().take();
        if let Some(opener) = opener {
            *self.records.borrow_mut() = Some(opener()?);
        }
        Ok(())
    }

    /// Replaces the mapper used to turn field sets into items.
    pub fn with_field_set_mapper<N>(self, field_set_mapper: N) -> CsvItemReader<R, N> {
        CsvItemReader {
            records: self.records,
            opener: self.opener,
            names: self.names,
            lines_to_skip: self.lines_to_skip,
            strict: self.strict,
            skipped: self.skipped,
            line: self.line,
            field_set_mapper,
        }
    }

    /// Reads the next line as a [`FieldSet`].
    ///
    /// # Returns
    /// - `Ok(Some(field_set))` for each data line
    /// - `Ok(None)` once the source is exhausted
    /// - `Err(BatchError::ItemReader(_))` on I/O or tokenizing errors, or on a
    ///   ragged line in strict mode
    pub fn read_field_set(&self) -> ItemReaderResult<FieldSet> {
        self.open_records()?;

        let mut records = self.records.borrow_mut();
        let Some(iterator) = records.as_mut() else {
            return Ok(None);
        };

        if !self.skipped.replace(true) {
            for _ in 0..self.lines_to_skip {
                match iterator.next() {
                    Some(Ok(_)) => {}
                    Some(Err(error)) => return Err(BatchError::ItemReader(error.to_string())),
                    None => break,
                }
            }
        }

        let next = iterator.next();
        let record = match next {
            None => {
                debug!("End of resource reached, releasing it");
                *records = None;
                return Ok(None);
            }
            Some(Err(error)) => return Err(BatchError::ItemReader(error.to_string())),
            Some(Ok(record)) => record,
        };

        let line = record.position().map_or(0, |position| position.line());
        self.line.set(line);

        if record.len() != self.names.len() {
            if self.strict {
                return Err(BatchError::ItemReader(format!(
                    "Incorrect number of tokens found in record at line {}: expected {} actual {}",
                    line,
                    self.names.len(),
                    record.len()
                )));
            }
            warn!(
                "Line {} has {} values for {} declared fields",
                line,
                record.len(),
                self.names.len()
            );
        }

        Ok(Some(FieldSet::new(
            self.names.clone(),
            record.iter().map(str::to_string).collect(),
        )))
    }
}

impl<R: Read, T, M: FieldSetMapper<T>> ItemReader<T> for CsvItemReader<R, M> {
    /// Reads the next line and maps it to an item.
    ///
    /// Mapping failures are reported as `BatchError::Mapping` with the line
    /// number.
    fn read(&self) -> ItemReaderResult<T> {
        let Some(field_set) = self.read_field_set()? else {
            return Ok(None);
        };

        match self.field_set_mapper.map_field_set(&field_set) {
            Ok(item) => Ok(Some(item)),
            Err(BatchError::Mapping(message)) => Err(BatchError::Mapping(format!(
                "Parsing error at line {}: {}",
                self.line.get(),
                message
            ))),
            Err(error) => Err(error),
        }
    }

    fn open(&self) -> Result<(), BatchError> {
        self.open_records()
    }
}

/// A builder for configuring delimited file reading.
///
/// # Default Configuration
///
/// - Delimiter: comma (,)
/// - Terminator: CRLF (also accepts LF)
/// - Lines to skip: 0
/// - Strict: enabled
/// - Trimming: All fields trimmed
pub struct CsvItemReaderBuilder {
    delimiter: u8,
    terminator: Terminator,
    names: Vec<String>,
    lines_to_skip: usize,
    strict: bool,
}

impl Default for CsvItemReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvItemReaderBuilder {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            terminator: Terminator::CRLF,
            names: Vec::new(),
            lines_to_skip: 0,
            strict: true,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Declares the field names, in column order.
    pub fn names(mut self, names: &[&str]) -> Self {
        self.names = names.iter().map(|name| name.to_string()).collect();
        self
    }

    /// Number of leading lines (headers) to discard.
    pub fn lines_to_skip(mut self, lines_to_skip: usize) -> Self {
        self.lines_to_skip = lines_to_skip;
        self
    }

    /// Whether a line with a value count different from the name count is an
    /// error.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn reader_builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .trim(Trim::All)
            .delimiter(self.delimiter)
            .terminator(self.terminator)
            .has_headers(false)
            // Token count is checked against the declared names instead
            .flexible(true);
        builder
    }

    fn build<R: Read>(
        self,
        records: Option<StringRecordsIntoIter<R>>,
        opener: Option<Opener<R>>,
    ) -> CsvItemReader<R> {
        CsvItemReader {
            records: RefCell::new(records),
            opener: RefCell::new(opener),
            names: self.names,
            lines_to_skip: self.lines_to_skip,
            strict: self.strict,
            skipped: Cell::new(false),
            line: Cell::new(0),
            field_set_mapper: SerdeFieldSetMapper,
        }
    }

    /// Creates a `CsvItemReader` from any source implementing `Read`.
    pub fn from_reader<R: Read>(self, rdr: R) -> CsvItemReader<R> {
        let records = self.reader_builder().from_reader(rdr).into_records();
        self.build(Some(records), None)
    }

    /// Creates a `CsvItemReader` over a file path.
    ///
    /// The file is not touched until the reader is opened. Opening fails with
    /// `BatchError::ItemReader` if the file cannot be read.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> CsvItemReader<File> {
        let path = path.as_ref().to_path_buf();
        let reader_builder = self.reader_builder();
        let opener: Opener<File> = Box::new(move || {
            let rdr = reader_builder.from_path(&path).map_err(|error| {
                BatchError::ItemReader(format!("Unable to open {}: {}", path.display(), error))
            })?;
            debug!("Opened {}", path.display());
            Ok(rdr.into_records())
        });
        self.build(None, Some(opener))
    }
}
