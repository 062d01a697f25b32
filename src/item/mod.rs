#[cfg(feature = "csv")]
/// This module provides a delimited text item reader with field set mapping.
pub mod csv;

/// This module provides the repository abstraction, its item writer and an in-memory store.
pub mod repository;

#[cfg(feature = "rdbc-sqlite")]
/// This module provides an RDBC (SQLite) repository.
pub mod rdbc;
