//! Adaptation/port of [Go scanner](http://tip.golang.org/pkg/bufio/#Scanner).

use log::debug;

use std::error::Error;
use std::fmt;
use std::io::{self, Read};

/// Position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pos {
    /// line number
    pub line: u64,
    /// column number (byte offset, not char offset)
    pub column: usize,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line: {}, column: {}", self.line, self.column)
    }
}

/// Error with position
pub trait ScanError: Error + From<io::Error> + Sized {
    /// Update the position where the error occurs
    fn position(&mut self, p: Pos);
    /// The input does not fit in `limit` bytes
    fn oversized(limit: usize) -> Self;
}

/// The `TokenType` classifies the first `usize` bytes of data.
/// And the `usize` is the amount of bytes to consume.
type SplitResult<TokenType, Error> = Result<(Option<TokenType>, usize), Error>;

/// Split function used to tokenize the input
pub trait Splitter: Sized {
    /// Potential error raised
    type Error: ScanError;
    /// Token generated
    type TokenType;

    /// The arguments are an initial substring of the remaining unprocessed
    /// data and a flag, `eof`, that reports whether the reader has no more data
    /// to give.
    ///
    /// A token, when returned, spans exactly the bytes being consumed.
    /// `(None, 0)` asks for more data (or, at `eof`, signals the end).
    /// `(None, n)` skips `n` bytes.
    ///
    /// If the returned error is non-nil, scanning stops and the error
    /// is returned to the client.
    ///
    /// The function is called with an empty data slice only when `eof` is set.
    fn split(&mut self, data: &[u8], eof: bool) -> SplitResult<Self::TokenType, Self::Error>;
}

/// Like a `BufReader` but with a growable buffer.
/// Successive calls to the `scan` method will step through the 'tokens'
/// of a file, skipping the bytes between the tokens.
///
/// Scanning stops unrecoverably at EOF, the first I/O error, or once more than
/// `max_size` bytes have been consumed.
pub struct Scanner<R: Read, S: Splitter> {
    /// The reader provided by the client.
    inner: R,
    /// The function to tokenize the input.
    splitter: S,
    /// Buffer used as argument to split.
    buf: Vec<u8>,
    /// First non-processed byte in buf.
    pos: usize,
    /// End of data in buf.
    cap: usize,
    /// true once the reader has reported EOF.
    eof: bool,
    /// number of bytes consumed so far
    offset: usize,
    /// maximum number of bytes consumed, 0 for unbounded
    max_size: usize,
    /// current line number
    line: u64,
    /// current column number (byte offset, not char offset)
    column: usize,
}

impl<R: Read, S: Splitter> Scanner<R, S> {
    /// Constructor
    pub fn new(inner: R, splitter: S) -> Self {
        Self::with_capacity(inner, splitter, 4096)
    }

    /// Constructor with an initial buffer size
    pub fn with_capacity(inner: R, splitter: S, capacity: usize) -> Self {
        Self {
            inner,
            splitter,
            buf: vec![0; capacity.max(1)],
            pos: 0,
            cap: 0,
            eof: false,
            offset: 0,
            max_size: 0,
            line: 1,
            column: 1,
        }
    }

    /// Fail as soon as more than `max_size` bytes are consumed (0 means unbounded).
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
    }

    /// Current line number
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Current column number (byte offset, not char offset)
    pub fn column(&self) -> usize {
        self.column
    }

    /// Current position
    pub fn position(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.column,
        }
    }

    /// Number of bytes consumed so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Associated splitter
    pub fn splitter(&self) -> &S {
        &self.splitter
    }
}

type ScanResult<'input, TokenType, Error> = Result<Option<(&'input [u8], TokenType)>, Error>;

impl<R: Read, S: Splitter> Scanner<R, S> {
    /// Advance the Scanner to next token.
    /// Return the token as a byte slice.
    /// Return `None` when the end of the input is reached.
    /// Return any error that occurs while reading the input.
    pub fn scan(&mut self) -> ScanResult<'_, S::TokenType, S::Error> {
        debug!(target: "scanner", "scan(line: {}, column: {})", self.line, self.column);
        // Loop until we have a token.
        loop {
            // See if we can get a token with what we already have.
            if self.cap > self.pos || self.eof {
                let data = &self.buf[self.pos..self.cap];
                match self.splitter.split(data, self.eof) {
                    Err(mut e) => {
                        e.position(self.position());
                        return Err(e);
                    }
                    Ok((None, 0)) => {
                        // Request more data
                        if self.eof {
                            return Ok(None);
                        }
                        self.check_pending()?;
                    }
                    Ok((None, amt)) => {
                        // Ignore/skip this data
                        self.consume(amt)?;
                        continue;
                    }
                    Ok((Some(tt), amt)) => {
                        let start = self.pos;
                        self.consume(amt)?;
                        return Ok(Some((&self.buf[start..start + amt], tt)));
                    }
                }
            }
            // We cannot generate a token with what we are holding.
            // If we've already hit EOF, we are done.
            if self.eof {
                return Ok(None);
            }
            self.fill_buf()?;
        }
    }

    /// The splitter wants more data than what is pending:
    /// the token being scanned already ends past the budget.
    fn check_pending(&self) -> Result<(), S::Error> {
        let pending = self.cap - self.pos;
        if self.max_size > 0 && self.offset + pending > self.max_size {
            let mut err = S::Error::oversized(self.max_size);
            err.position(self.position());
            return Err(err);
        }
        Ok(())
    }

    /// Consume `amt` bytes of the buffer.
    fn consume(&mut self, amt: usize) -> Result<(), S::Error> {
        debug!(target: "scanner", "consume({})", amt);
        debug_assert!(self.pos + amt <= self.cap);
        for byte in &self.buf[self.pos..self.pos + amt] {
            if *byte == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos += amt;
        self.offset += amt;
        if self.max_size > 0 && self.offset > self.max_size {
            let mut err = S::Error::oversized(self.max_size);
            err.position(self.position());
            return Err(err);
        }
        Ok(())
    }

    fn fill_buf(&mut self) -> Result<(), S::Error> {
        // First, shift data to beginning of buffer if there's lots of empty space
        // or space is needed.
        if self.pos > 0 && (self.cap == self.buf.len() || self.pos > self.buf.len() / 2) {
            self.buf.copy_within(self.pos..self.cap, 0);
            self.cap -= self.pos;
            self.pos = 0;
        }
        // Is the buffer full? If so, resize.
        if self.cap == self.buf.len() {
            let len = self.buf.len() * 2;
            debug!(target: "scanner", "grow buffer to {}", len);
            self.buf.resize(len, 0);
        }
        // Finally we can read some input.
        loop {
            match self.inner.read(&mut self.buf[self.cap..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.cap += n;
                    return Ok(());
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    let mut err = S::Error::from(e);
                    err.position(self.position());
                    return Err(err);
                }
            }
        }
    }
}

impl<R: Read, S: Splitter> fmt::Debug for Scanner<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("pos", &self.pos)
            .field("cap", &self.cap)
            .field("eof", &self.eof)
            .field("offset", &self.offset)
            .field("line", &self.line)
            .field("column", &self.column)
            .finish()
    }
}
