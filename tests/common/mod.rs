#![allow(dead_code)]

mod mocks;

use std::io::Write;

use tempfile::NamedTempFile;

use batch_import::user::USER_FIELD_NAMES;

pub use mocks::*;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Header line followed by `rows`, written to a temporary file.
pub fn users_file(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temporary file");
    writeln!(file, "{}", USER_FIELD_NAMES.join(",")).expect("header");
    for row in rows {
        writeln!(file, "{}", row).expect("row");
    }
    file
}

/// `count` well-formed rows with ids `1..=count`.
pub fn generated_rows(count: usize) -> Vec<String> {
    (1..=count)
        .map(|id| {
            format!(
                "{id},u{id},first{id},last{id},F,user{id}@x.com,555-{id},1990-01-01,engineer"
            )
        })
        .collect()
}
