//! Streaming SQL statement splitter

mod scan;
pub mod sql;

pub use scan::{Pos, ScanError, Scanner, Splitter};
