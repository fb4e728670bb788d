//! Streaming splitter for multi-statement SQL migrations
#![warn(missing_docs)]
#![warn(clippy::large_stack_frames)]

// Statements are handed out while the input is still being read.
pub mod lexer;

pub use lexer::sql::{
    split, Error, FallibleIterator, Flow, Options, Remainder, Statements, DEFAULT_MAX_SIZE,
};
