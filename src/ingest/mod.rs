// src/ingest/mod.rs

pub mod processor;
pub mod rows;

pub use processor::{process_submission, ProcessOutcome, RunContext};
pub use rows::{open_row_source, CsvRowSource, HeaderMapping, PreparsedRows, Row, RowSource};
