#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # Batch Import

 A chunk-oriented batch engine, in the manner of Spring Batch, that imports
 records from a delimited file into a repository. Records are read one at a
 time, transformed, buffered and written by chunk, each chunk inside its own
 transaction.

 ## Core Concepts

- **Job:** A named run made of sequential `Step`s. A job instance is identified by the job name and its identifying parameters; the same instance cannot run twice at the same time, nor run again once completed.
- **Step:** Reads items, processes them and writes them by chunk. A failing chunk is rolled back and ends the step; chunks committed earlier stay committed.
- **ItemReader:** Retrieves the input of a `Step`, one item at a time.
- **ItemProcessor:** Transforms an item, or drops it. Any `Fn(&I) -> ItemProcessorResult<O>` is a processor.
- **ItemWriter:** Writes the items of a chunk.
- **TransactionManager:** Begins, commits and rolls back the transaction around each chunk.

 ## Features

| **Feature**   | **Description**                                               |
|---------------|---------------------------------------------------------------|
| csv           | Enables the delimited text `ItemReader` and the user import job (default) |
| rdbc-sqlite   | Enables an upsert repository over a SQLite table              |
| full          | Enables all available features                                |

 ## Getting Started

```rust
# use batch_import::{
#     core::{
#         item::ItemProcessorResult,
#         job::{JobBuilder, JobParametersBuilder},
#         launcher::JobLauncher,
#         repository::InMemoryJobRepository,
#         step::StepBuilder,
#     },
#     item::{
#         csv::csv_reader::CsvItemReaderBuilder,
#         repository::{InMemoryRepository, RepositoryItemWriter},
#     },
#     user::{User, USER_FIELD_NAMES},
#     BatchError,
# };
fn main() -> Result<(), BatchError> {
    let csv = "id,userId,firstName,lastName,gender,email,phone,dateOfBirth,jobTitle
1,u1,john,doe,M,j@x.com,123,1990-01-01,eng
2,u2,jane,roe,F,j@y.com,456,1991-02-02,ops
3,u3,ann,lee";

    let reader = CsvItemReaderBuilder::new()
        .names(&USER_FIELD_NAMES)
        .lines_to_skip(1)
        .strict(false)
        .from_reader(csv.as_bytes());

    // Drops users without email, capitalizes the others
    let processor = |user: &User| -> ItemProcessorResult<User> {
        if user.email.is_empty() {
            return Ok(None);
        }
        Ok(Some(User {
            first_name: user.first_name.to_uppercase(),
            ..user.clone()
        }))
    };

    let users: InMemoryRepository<User> = InMemoryRepository::new();
    let writer = RepositoryItemWriter::new(&users);

    let step = StepBuilder::new("csv-import-step")
        .chunk::<User, User>(2)
        .reader(&reader)
        .processor(&processor)
        .writer(&writer)
        .transaction_manager(&users)
        .build()?;

    let job = JobBuilder::new().name("importUsers").start(&step).build();

    let job_repository = InMemoryJobRepository::new();
    let parameters = JobParametersBuilder::new()
        .add_long("startAt", 1)
        .to_job_parameters();

    let outcome = JobLauncher::new(&job_repository).trigger(&job, &parameters);

    assert_eq!(outcome.to_string(), "COMPLETED");
    assert_eq!(users.count(), 2);
    assert_eq!(users.find_by_id(&2).unwrap().first_name, "JANE");

    Ok(())
}
```
 */

/// Core module for batch operations
pub mod core;

/// Error types for batch operations
pub mod error;

#[doc(inline)]
pub use error::*;

/// Item readers, writers and repositories
pub mod item;

/// The imported user record and its processor
pub mod user;

#[cfg(feature = "csv")]
/// The user import job and its trigger
pub mod import;
