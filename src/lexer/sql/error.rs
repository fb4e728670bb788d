use std::error;
use std::fmt;
use std::io;

use crate::lexer::scan::{Pos, ScanError};

/// Statement splitting errors
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// I/O Error
    Io(io::Error),
    /// Missing quote or double-quote
    UnterminatedLiteral(Option<Pos>),
    /// Missing closing `$tag$`
    UnterminatedDollarQuote(Option<Pos>),
    /// Missing `*/`
    UnterminatedBlockComment(Option<Pos>),
    /// Trailing text without delimiter, rejected by [`Remainder::Reject`](super::Remainder::Reject)
    UnterminatedStatement(Option<Pos>),
    /// Input larger than the configured budget (in bytes)
    Oversized(usize, Option<Pos>),
    /// The delimiter must contain at least one byte
    EmptyDelimiter,
    /// The handler aborted the split
    Handler(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(ref err) => err.fmt(f),
            Self::UnterminatedLiteral(pos) => {
                write!(f, "non-terminated literal at {pos:?}")
            }
            Self::UnterminatedDollarQuote(pos) => {
                write!(f, "non-terminated dollar-quoted string at {pos:?}")
            }
            Self::UnterminatedBlockComment(pos) => {
                write!(f, "non-terminated block comment at {pos:?}")
            }
            Self::UnterminatedStatement(pos) => {
                write!(f, "missing delimiter after last statement at {pos:?}")
            }
            Self::Oversized(limit, Some(pos)) => {
                write!(f, "migration larger than {limit} bytes at {pos}")
            }
            Self::Oversized(limit, _) => write!(f, "migration larger than {limit} bytes"),
            Self::EmptyDelimiter => f.write_str("empty delimiter"),
            Self::Handler(ref err) => err.fmt(f),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(ref err) => Some(err),
            Self::Handler(ref err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl ScanError for Error {
    fn position(&mut self, p: Pos) {
        match *self {
            Self::Io(_) | Self::EmptyDelimiter | Self::Handler(_) => {}
            Self::UnterminatedLiteral(ref mut pos) => *pos = Some(p),
            Self::UnterminatedDollarQuote(ref mut pos) => *pos = Some(p),
            Self::UnterminatedBlockComment(ref mut pos) => *pos = Some(p),
            Self::UnterminatedStatement(ref mut pos) => *pos = Some(p),
            Self::Oversized(_, ref mut pos) => *pos = Some(p),
        }
    }

    fn oversized(limit: usize) -> Self {
        Self::Oversized(limit, None)
    }
}
