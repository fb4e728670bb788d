use memchr::memmem;

/// Default budget for a whole migration: 10 MiB
pub const DEFAULT_MAX_SIZE: usize = 10 << 20;

/// What to do with text left after the last delimiter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Remainder {
    /// Emit it as a final statement
    #[default]
    Emit,
    /// Drop it
    Discard,
    /// Fail with [`Error::UnterminatedStatement`](super::Error::UnterminatedStatement)
    Reject,
}

/// Per-call splitting options.
///
/// ```
/// use sql_multistmt::Options;
///
/// let options = Options::new()
///     .delimiter("\nGO\n")
///     .max_size(1 << 20)
///     .substitute("{schema}", "public");
/// ```
#[derive(Clone, Debug)]
pub struct Options {
    pub(crate) delimiter: Vec<u8>,
    pub(crate) max_size: usize,
    pub(crate) capacity: usize,
    pub(crate) remainder: Remainder,
    substitutions: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            delimiter: b";".to_vec(),
            max_size: DEFAULT_MAX_SIZE,
            capacity: 4096,
            remainder: Remainder::default(),
            substitutions: Vec::new(),
        }
    }
}

impl Options {
    /// `;` delimited, [`DEFAULT_MAX_SIZE`] budget
    pub fn new() -> Self {
        Self::default()
    }

    /// Statement delimiter, must not be empty.
    ///
    /// Matched byte for byte outside comments and quotes, not on word
    /// boundaries: with `GO`, `CATEGORY` would end a statement after `CATE`.
    pub fn delimiter(mut self, delimiter: impl Into<Vec<u8>>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Maximum number of bytes read from the input, 0 means unbounded
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Initial size of the read buffer
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Policy for trailing text without delimiter
    pub fn remainder(mut self, remainder: Remainder) -> Self {
        self.remainder = remainder;
        self
    }

    /// Replace every occurrence of `token` by `value` in emitted statements.
    /// Empty tokens are ignored.
    pub fn substitute(mut self, token: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        let token = token.into();
        if !token.is_empty() {
            self.substitutions.push((token, value.into()));
        }
        self
    }

    pub(crate) fn apply_substitutions(&self, mut stmt: Vec<u8>) -> Vec<u8> {
        for (token, value) in &self.substitutions {
            stmt = replace(&stmt, token, value).unwrap_or(stmt);
        }
        stmt
    }
}

/// `None` when `token` does not occur
fn replace(haystack: &[u8], token: &[u8], value: &[u8]) -> Option<Vec<u8>> {
    let mut matches = memmem::find_iter(haystack, token).peekable();
    matches.peek()?;
    let mut out = Vec::with_capacity(haystack.len());
    let mut last = 0;
    for i in matches {
        out.extend_from_slice(&haystack[last..i]);
        out.extend_from_slice(value);
        last = i + token.len();
    }
    out.extend_from_slice(&haystack[last..]);
    Some(out)
}
