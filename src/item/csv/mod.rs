//! Delimited text support.
//!
//! Reading is split in two stages:
//!
//! 1. **Tokenizing**: [`csv_reader::CsvItemReader`] splits each line on the
//!    configured delimiter and pairs the values with the declared field names
//!    in a [`field_set::FieldSet`]. Header lines are skipped and, in lenient
//!    mode, ragged lines are accepted.
//!
//! 2. **Mapping**: a [`field_set::FieldSetMapper`] turns the field set into an
//!    item. The default [`field_set::SerdeFieldSetMapper`] matches field names
//!    against the fields of any `serde` deserializable type.
//!
//! # Examples
//!
//! ```
//! use batch_import::item::csv::csv_reader::CsvItemReaderBuilder;
//! use batch_import::core::item::ItemReader;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize, PartialEq)]
//! #[serde(rename_all = "camelCase")]
//! struct Contact {
//!     id: i64,
//!     first_name: String,
//!     email: String,
//! }
//!
//! let data = "\
//! id,firstName,email
//! 1,john,j@x.com
//! 2,jane
//! ";
//!
//! let reader = CsvItemReaderBuilder::new()
//!     .names(&["id", "firstName", "email"])
//!     .lines_to_skip(1)
//!     .strict(false)
//!     .from_reader(data.as_bytes());
//!
//! let mut contacts: Vec<Contact> = Vec::new();
//! while let Some(contact) = reader.read().unwrap() {
//!     contacts.push(contact);
//! }
//!
//! assert_eq!(contacts.len(), 2);
//! assert_eq!(contacts[1].first_name, "jane");
//! assert_eq!(contacts[1].email, "");
//! ```

/// A module providing the field set and its mappers.
pub mod field_set;

/// A module providing facilities for reading delimited records.
pub mod csv_reader;
