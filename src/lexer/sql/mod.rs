//! Multi-statement splitter, aware of comments, quoted literals and
//! (nested) [dollar-quoted strings](https://www.postgresql.org/docs/current/sql-syntax-lexical.html#SQL-SYNTAX-DOLLAR-QUOTING)
pub use fallible_iterator::FallibleIterator;
use log::debug;
use memchr::{memchr, memchr2};
use std::error::Error as StdError;
use std::io::Read;
use std::mem;
use std::result::Result;

mod error;
mod options;
#[cfg(test)]
mod test;

use crate::lexer::scan::Splitter;
use crate::lexer::Scanner;
pub use error::Error;
pub use options::{Options, Remainder, DEFAULT_MAX_SIZE};

/// Tokens produced by [`StatementSplitter`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenType {
    /// Statement text, kept verbatim (quoted parts included)
    Text,
    /// Delimiter ending the current statement
    Delimiter,
    /// End of a comment, which separates tokens like the given byte
    Separator(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Normal,
    /// `--` or `//` up to the end of line
    LineComment,
    /// `/* ... */`, with nesting depth
    BlockComment(usize),
    /// `'...'` or `"..."`, `backslash` for `E'...'`
    Quoted { quote: u8, backslash: bool },
    /// inside at least one `$tag$`
    DollarQuoted,
}

/// Outcome of matching a marker at the start of the data
#[derive(Debug, PartialEq, Eq)]
enum Marker {
    /// marker length
    Found(usize),
    NeedMore,
    Absent,
}

/// Splits statements on an unquoted delimiter.
///
/// Comments are skipped: they are never part of a statement, only their end
/// is reported as a [`TokenType::Separator`].
/// Delimiters and comment markers inside quotes are plain text.
#[derive(Debug)]
pub struct StatementSplitter {
    delimiter: Vec<u8>,
    state: State,
    /// open `$tag$`s, innermost last
    tags: Vec<Vec<u8>>,
    /// last two bytes of text
    tail: [u8; 2],
}

impl StatementSplitter {
    /// Constructor
    pub fn new(delimiter: impl Into<Vec<u8>>) -> Result<Self, Error> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(Error::EmptyDelimiter);
        }
        Ok(Self {
            delimiter,
            state: State::Normal,
            tags: Vec::new(),
            tail: [0; 2],
        })
    }

    /// Number of dollar-quoted strings currently open
    pub fn depth(&self) -> usize {
        self.tags.len()
    }

    fn text(&mut self, data: &[u8], n: usize) -> Result<(Option<TokenType>, usize), Error> {
        debug_assert!(n > 0 && n <= data.len());
        self.tail = if n >= 2 {
            [data[n - 2], data[n - 1]]
        } else {
            [self.tail[1], data[0]]
        };
        Ok((Some(TokenType::Text), n))
    }

    fn comment(&mut self, state: State) -> Result<(Option<TokenType>, usize), Error> {
        self.state = state;
        // a comment separates tokens like a space
        self.tail = [b' '; 2];
        Ok((None, 2))
    }

    fn normal(&mut self, data: &[u8], eof: bool) -> Result<(Option<TokenType>, usize), Error> {
        match starts_with(data, &self.delimiter, eof) {
            Marker::Found(n) => {
                self.tail = [0; 2];
                return Ok((Some(TokenType::Delimiter), n));
            }
            Marker::NeedMore => return Ok((None, 0)),
            Marker::Absent => {}
        }
        match data[0] {
            b'-' => match data.get(1) {
                Some(b'-') => return self.comment(State::LineComment),
                Some(_) => return self.text(data, 1),
                None if eof => return self.text(data, 1),
                None => return Ok((None, 0)), // else ask more data
            },
            b'/' => match data.get(1) {
                Some(b'/') => return self.comment(State::LineComment),
                Some(b'*') => return self.comment(State::BlockComment(1)),
                Some(_) => return self.text(data, 1),
                None if eof => return self.text(data, 1),
                None => return Ok((None, 0)), // else ask more data
            },
            quote @ (b'\'' | b'"') => {
                // E'...' but not xE'...'
                let backslash = quote == b'\''
                    && matches!(self.tail[1], b'E' | b'e')
                    && !is_identifier_continue(self.tail[0]);
                self.state = State::Quoted { quote, backslash };
                return self.text(data, 1);
            }
            // `$` is part of an identifier like `a$b`
            b'$' if !is_identifier_continue(self.tail[1]) => match dollar_tag(data, eof) {
                Marker::Found(n) => {
                    debug!(target: "multistmt", "open {}", String::from_utf8_lossy(&data[..n]));
                    self.tags.push(data[..n].to_vec());
                    self.state = State::DollarQuoted;
                    return self.text(data, n);
                }
                Marker::NeedMore => return Ok((None, 0)),
                Marker::Absent => return self.text(data, 1),
            },
            _ => {}
        }
        // eat text up to the next byte which may start something
        let first = self.delimiter[0];
        let end = data
            .iter()
            .skip(1)
            .position(|&b| b == first || matches!(b, b'-' | b'/' | b'\'' | b'"' | b'$'))
            .map_or(data.len(), |i| i + 1);
        self.text(data, end)
    }

    fn block_comment(
        &mut self,
        data: &[u8],
        eof: bool,
        mut depth: usize,
    ) -> Result<(Option<TokenType>, usize), Error> {
        let mut i = 0;
        while let Some(j) = memchr2(b'*', b'/', &data[i..]) {
            let j = i + j;
            match (data[j], data.get(j + 1)) {
                // else ask more data to decide
                (_, None) if !eof => {
                    self.state = State::BlockComment(depth);
                    return Ok((None, j));
                }
                (b'*', Some(b'/')) => {
                    depth -= 1;
                    if depth == 0 {
                        self.state = State::Normal;
                        return Ok((Some(TokenType::Separator(b' ')), j + 2));
                    }
                    i = j + 2;
                }
                (b'/', Some(b'*')) => {
                    depth += 1;
                    i = j + 2;
                }
                _ => i = j + 1,
            }
        }
        self.state = State::BlockComment(depth);
        Ok((None, data.len()))
    }

    fn quoted(
        &mut self,
        data: &[u8],
        eof: bool,
        quote: u8,
        backslash: bool,
    ) -> Result<(Option<TokenType>, usize), Error> {
        let found = if backslash {
            memchr2(quote, b'\\', data)
        } else {
            memchr(quote, data)
        };
        let Some(i) = found else {
            return self.text(data, data.len());
        };
        if data[i] == b'\\' {
            // the escaped byte goes with the backslash
            return match data.get(i + 1) {
                Some(_) => self.text(data, i + 2),
                None if eof => self.text(data, i + 1),
                None if i > 0 => self.text(data, i),
                None => Ok((None, 0)),
            };
        }
        match data.get(i + 1) {
            // escaped quote
            Some(&b) if b == quote => self.text(data, i + 2),
            Some(_) => {
                self.state = State::Normal;
                self.text(data, i + 1)
            }
            None if eof => {
                self.state = State::Normal;
                self.text(data, i + 1)
            }
            // else ask more data to know if the quote is escaped
            None if i > 0 => self.text(data, i),
            None => Ok((None, 0)),
        }
    }

    fn dollar_quoted(
        &mut self,
        data: &[u8],
        eof: bool,
    ) -> Result<(Option<TokenType>, usize), Error> {
        match memchr(b'$', data) {
            None => self.text(data, data.len()),
            Some(0) => match dollar_tag(data, eof) {
                Marker::Found(n) => {
                    let tag = &data[..n];
                    if let Some(i) = self.tags.iter().rposition(|t| t == tag) {
                        // also closes inner tags left open
                        self.tags.truncate(i);
                        if self.tags.is_empty() {
                            self.state = State::Normal;
                        }
                    } else {
                        self.tags.push(tag.to_vec());
                    }
                    debug!(
                        target: "multistmt",
                        "{} at depth {}",
                        String::from_utf8_lossy(tag),
                        self.tags.len()
                    );
                    self.text(data, n)
                }
                Marker::NeedMore => Ok((None, 0)),
                Marker::Absent => self.text(data, 1),
            },
            Some(i) => self.text(data, i),
        }
    }
}

impl Splitter for StatementSplitter {
    type Error = Error;
    type TokenType = TokenType;

    fn split(&mut self, data: &[u8], eof: bool) -> Result<(Option<TokenType>, usize), Error> {
        if data.is_empty() {
            debug_assert!(eof);
            return match self.state {
                State::Normal | State::LineComment => Ok((None, 0)),
                State::BlockComment(_) => Err(Error::UnterminatedBlockComment(None)),
                State::Quoted { .. } => Err(Error::UnterminatedLiteral(None)),
                State::DollarQuoted => Err(Error::UnterminatedDollarQuote(None)),
            };
        }
        match self.state {
            State::Normal => self.normal(data, eof),
            State::LineComment => match memchr(b'\n', data) {
                Some(0) => {
                    self.state = State::Normal;
                    Ok((Some(TokenType::Separator(b'\n')), 1))
                }
                Some(i) => Ok((None, i)),
                None => Ok((None, data.len())),
            },
            State::BlockComment(depth) => self.block_comment(data, eof, depth),
            State::Quoted { quote, backslash } => self.quoted(data, eof, quote, backslash),
            State::DollarQuoted => self.dollar_quoted(data, eof),
        }
    }
}

fn starts_with(data: &[u8], marker: &[u8], eof: bool) -> Marker {
    if data.len() >= marker.len() {
        if data.starts_with(marker) {
            Marker::Found(marker.len())
        } else {
            Marker::Absent
        }
    } else if !eof && marker.starts_with(data) {
        Marker::NeedMore
    } else {
        Marker::Absent
    }
}

/// `$$` or `$tag$`, the tag cannot start with a digit (`$1` is a parameter)
fn dollar_tag(data: &[u8], eof: bool) -> Marker {
    debug_assert_eq!(data[0], b'$');
    for (i, &b) in data.iter().enumerate().skip(1) {
        if b == b'$' {
            return Marker::Found(i + 1);
        }
        let valid = if i == 1 {
            is_tag_start(b)
        } else {
            is_tag_continue(b)
        };
        if !valid {
            return Marker::Absent;
        }
    }
    if eof {
        Marker::Absent
    } else {
        Marker::NeedMore
    }
}

fn is_tag_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b > b'\x7F'
}

fn is_tag_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b > b'\x7F'
}

fn is_identifier_continue(b: u8) -> bool {
    is_tag_continue(b) || b == b'$'
}

/// Statements read from `input`, each one with its delimiter.
///
/// A comment inside a statement is replaced by a single `\n` (line comment)
/// or space (block comment), unless whitespace already sits on either side.
/// Comments before a statement or just before its delimiter leave nothing.
///
/// Text left after the last delimiter is handled according to
/// [`Options::remainder`].
pub struct Statements<R: Read> {
    scanner: Scanner<R, StatementSplitter>,
    options: Options,
    buffer: Vec<u8>,
    /// stands for the comment(s) between `buffer` and the next text
    separator: Option<u8>,
    done: bool,
}

impl<R: Read> Statements<R> {
    /// Constructor
    pub fn new(input: R, options: &Options) -> Result<Self, Error> {
        let splitter = StatementSplitter::new(options.delimiter.clone())?;
        let mut scanner = Scanner::with_capacity(input, splitter, options.capacity);
        scanner.set_max_size(options.max_size);
        Ok(Self {
            scanner,
            options: options.clone(),
            buffer: Vec::new(),
            separator: None,
            done: false,
        })
    }

    /// Current line number
    pub fn line(&self) -> u64 {
        self.scanner.line()
    }
    /// Current column number (byte offset, not char offset)
    pub fn column(&self) -> usize {
        self.scanner.column()
    }

    fn emit(&mut self) -> Vec<u8> {
        let stmt = mem::take(&mut self.buffer);
        debug!(
            target: "multistmt",
            "statement of {} bytes before line {}",
            stmt.len(),
            self.scanner.line()
        );
        self.options.apply_substitutions(stmt)
    }

    fn remainder(&mut self) -> Result<Option<Vec<u8>>, Error> {
        self.separator = None;
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            self.buffer.clear();
            return Ok(None);
        }
        match self.options.remainder {
            Remainder::Emit => Ok(Some(self.emit())),
            Remainder::Discard => {
                debug!(target: "multistmt", "discard {} trailing bytes", self.buffer.len());
                self.buffer.clear();
                Ok(None)
            }
            Remainder::Reject => {
                self.buffer.clear();
                Err(Error::UnterminatedStatement(Some(self.scanner.position())))
            }
        }
    }
}

impl<R: Read> FallibleIterator for Statements<R> {
    type Item = Vec<u8>;
    type Error = Error;

    fn next(&mut self) -> Result<Option<Vec<u8>>, Error> {
        if self.done {
            return Ok(None);
        }
        loop {
            let (token, token_type) = match self.scanner.scan() {
                Err(err) => {
                    self.done = true;
                    self.buffer.clear();
                    self.separator = None;
                    return Err(err);
                }
                Ok(None) => break,
                Ok(Some(tuple)) => tuple,
            };
            match token_type {
                TokenType::Text => {
                    if let Some(separator) = self.separator.take() {
                        if !token[0].is_ascii_whitespace() {
                            self.buffer.push(separator);
                        }
                    }
                    self.buffer.extend_from_slice(token);
                }
                TokenType::Separator(separator) => {
                    if self.buffer.last().is_some_and(|b| !b.is_ascii_whitespace()) {
                        self.separator = Some(separator);
                    }
                }
                TokenType::Delimiter => {
                    self.separator = None;
                    self.buffer.extend_from_slice(token);
                    return Ok(Some(self.emit()));
                }
            }
        }
        self.done = true;
        self.remainder()
    }
}

/// What to do after a statement has been handled
#[derive(Debug)]
pub enum Flow {
    /// Ask for the next statement
    Continue,
    /// Stop splitting, without error
    Stop,
    /// Stop splitting and report the error as [`Error::Handler`]
    Abort(Box<dyn StdError + Send + Sync>),
}

impl From<bool> for Flow {
    fn from(more: bool) -> Self {
        if more {
            Self::Continue
        } else {
            Self::Stop
        }
    }
}

impl<E> From<Result<(), E>> for Flow
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    fn from(res: Result<(), E>) -> Self {
        match res {
            Ok(()) => Self::Continue,
            Err(err) => Self::Abort(err.into()),
        }
    }
}

/// Split `input` and give each statement, in order, to `handler`.
///
/// The handler may return a `bool` (`false` to stop),
/// a `Result<(), E>` (an error aborts the split) or a [`Flow`].
///
/// ```
/// use sql_multistmt::{split, Options};
///
/// let mut stmts = Vec::new();
/// split(&b"SELECT 1; SELECT 2;"[..], &Options::new(), |stmt| {
///     stmts.push(stmt);
///     true
/// })
/// .unwrap();
/// assert_eq!(stmts, vec![b"SELECT 1;".to_vec(), b" SELECT 2;".to_vec()]);
/// ```
pub fn split<R, F, H>(input: R, options: &Options, mut handler: F) -> Result<(), Error>
where
    R: Read,
    F: FnMut(Vec<u8>) -> H,
    H: Into<Flow>,
{
    let mut statements = Statements::new(input, options)?;
    while let Some(stmt) = statements.next()? {
        match handler(stmt).into() {
            Flow::Continue => {}
            Flow::Stop => {
                debug!(target: "multistmt", "stopped by handler at line {}", statements.line());
                return Ok(());
            }
            Flow::Abort(err) => return Err(Error::Handler(err)),
        }
    }
    Ok(())
}
