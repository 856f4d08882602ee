//! Error contracts for compilation and the program cache.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Stable compile error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// A token appeared where the grammar does not allow it.
    UnexpectedToken,
    /// Input ended inside a construct.
    UnexpectedEndOfInput,
    /// A condition expression was expected.
    ConditionExpected,
    /// The token source reported a lexical error.
    Lexical,
    /// Buffer growth failed.
    Allocation,
    /// An offset or size does not fit its encoded field.
    EncodingOverflow,
    /// Constructs are nested deeper than the configured limit.
    NestingTooDeep,
}

/// Compile error payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Error category.
    pub kind: CompileErrorKind,
    /// Source line near the failure.
    pub line: u32,
    /// Text of the offending token, if any.
    pub found: Option<String>,
    /// Keyword or token the grammar was waiting for, if known.
    pub expected: Option<&'static str>,
}

impl CompileError {
    /// Creates a compile error.
    pub fn new(
        kind: CompileErrorKind,
        line: u32,
        found: Option<String>,
        expected: Option<&'static str>,
    ) -> Self {
        Self {
            kind,
            line,
            found,
            expected,
        }
    }

    /// Creates an `UnexpectedToken` error.
    pub fn unexpected(line: u32, found: impl Into<String>, expected: Option<&'static str>) -> Self {
        Self::new(
            CompileErrorKind::UnexpectedToken,
            line,
            Some(found.into()),
            expected,
        )
    }

    /// Creates an `UnexpectedEndOfInput` error.
    pub fn end_of_input(line: u32, expected: Option<&'static str>) -> Self {
        Self::new(CompileErrorKind::UnexpectedEndOfInput, line, None, expected)
    }

    /// Creates a `ConditionExpected` error.
    pub fn condition_expected(line: u32, found: impl Into<String>) -> Self {
        Self::new(
            CompileErrorKind::ConditionExpected,
            line,
            Some(found.into()),
            None,
        )
    }

    /// Creates a `Lexical` error.
    pub fn lexical(line: u32, found: impl Into<String>) -> Self {
        Self::new(CompileErrorKind::Lexical, line, Some(found.into()), None)
    }

    /// Creates an `Allocation` error for a request of `words` words.
    pub fn allocation(words: usize) -> Self {
        Self::new(
            CompileErrorKind::Allocation,
            0,
            Some(words.to_string()),
            None,
        )
    }

    /// Creates an `EncodingOverflow` error for a size of `size` units.
    pub fn encoding_overflow(size: usize) -> Self {
        Self::new(
            CompileErrorKind::EncodingOverflow,
            0,
            Some(size.to_string()),
            None,
        )
    }

    /// Creates a `NestingTooDeep` error.
    pub fn nesting_too_deep(line: u32, limit: usize) -> Self {
        Self::new(
            CompileErrorKind::NestingTooDeep,
            line,
            Some(limit.to_string()),
            None,
        )
    }

    /// Returns `true` for errors that abort the whole compilation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CompileErrorKind::Allocation | CompileErrorKind::EncodingOverflow
        )
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CompileErrorKind::UnexpectedToken | CompileErrorKind::Lexical => {
                write!(
                    f,
                    "parse error near `{}'",
                    self.found.as_deref().unwrap_or("")
                )?;
                if let Some(expected) = self.expected {
                    write!(f, ", expected `{expected}'")?;
                }
                Ok(())
            }
            CompileErrorKind::UnexpectedEndOfInput => match self.expected {
                Some(expected) => write!(f, "parse error: `{expected}' expected before end of input"),
                None => f.write_str("parse error: unexpected end of input"),
            },
            CompileErrorKind::ConditionExpected => write!(
                f,
                "condition expected: {}",
                self.found.as_deref().unwrap_or("")
            ),
            CompileErrorKind::Allocation => write!(
                f,
                "out of memory growing code buffer to {} words",
                self.found.as_deref().unwrap_or("?")
            ),
            CompileErrorKind::EncodingOverflow => write!(
                f,
                "compiled program too large ({} units)",
                self.found.as_deref().unwrap_or("?")
            ),
            CompileErrorKind::NestingTooDeep => write!(
                f,
                "constructs nested deeper than {} levels",
                self.found.as_deref().unwrap_or("?")
            ),
        }
    }
}

impl std::error::Error for CompileError {}

/// Errors reported by the cache writer and header loader.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Reading or writing the file failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// The magic number matches neither byte order.
    #[error("{}: not a compiled program file", path.display())]
    BadMagic {
        /// File involved.
        path: PathBuf,
    },

    /// The file was written by a different version.
    #[error("{}: wrong version {found} (expected {expected})", path.display())]
    VersionMismatch {
        /// File involved.
        path: PathBuf,
        /// Version recorded in the file.
        found: String,
        /// Version this crate writes.
        expected: &'static str,
    },

    /// The file ends before the structure it declares.
    #[error("{}: file is truncated", path.display())]
    Truncated {
        /// File involved.
        path: PathBuf,
    },

    /// A dump was requested with nothing to write.
    #[error("no programs to write")]
    NoPrograms,

    /// A source file failed to compile.
    #[error("{}: {source}", path.display())]
    Compile {
        /// Source file involved.
        path: PathBuf,
        /// Compile failure.
        #[source]
        source: CompileError,
    },

    /// An offset does not fit the file format.
    #[error("{}: cache file would exceed the format limit ({bytes} bytes)", path.display())]
    TooLarge {
        /// File involved.
        path: PathBuf,
        /// Size that did not fit.
        bytes: usize,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
