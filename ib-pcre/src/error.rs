use std::collections::TryReserveError;

use thiserror::Error;

/// The result type for the `ib-pcre` crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for the `ib-pcre` crate.
///
/// "No match" is not an error: searches return `Ok(None)` for it.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The pattern failed to compile.
    ///
    /// `position` is a character offset into the pattern as supplied by the caller.
    #[error("{message} at position {position}")]
    Compile {
        /// One of [`codes`].
        code: u32,
        message: String,
        position: usize,
    },

    /// A repetition count is larger than [`codes::MAX_REPEAT`].
    #[error("number too big in {{}} quantifier at position {position}")]
    QuantifierOverflow { position: usize },

    /// A group name is empty, not UTF-8, or declared twice.
    #[error("invalid group name: {0}")]
    GroupName(String),

    /// The engine reported more groups than the span buffer can hold.
    #[error("vector overflow")]
    VectorOverflow,

    #[error("no such group: {0}")]
    NoSuchGroup(String),

    #[error("out of memory")]
    OutOfMemory,

    /// [`Pattern::study()`](crate::Pattern::study) rejected the pattern.
    #[error("study failed: {0}")]
    Study(String),

    /// The input has a shape the string adapter does not accept.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The subject is not valid UTF-8/16/32 at `offset`, or the search starts inside a UTF-8 sequence.
    ///
    /// `offset` is in the units of the buffer that failed.
    #[error("invalid Unicode at offset {offset}")]
    BadUtf { offset: usize },

    /// The blob is not compiled code of this build.
    #[error("invalid compiled code: {0}")]
    InvalidCode(String),

    /// Malformed [`Match::expand()`](crate::Match::expand) template.
    #[error("invalid template at position {position}")]
    InvalidTemplate { position: usize },
}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

/// Diagnostic codes of [`Error::Compile`].
pub mod codes {
    /// Anything not covered below.
    pub const OTHER: u32 = 0;
    /// Malformed or unsupported escape sequence.
    pub const ESCAPE: u32 = 1;
    /// Malformed character class.
    pub const CLASS: u32 = 2;
    /// Malformed repetition operator.
    pub const REPETITION: u32 = 3;
    /// Unbalanced or unsupported group syntax.
    pub const GROUP: u32 = 4;
    /// Unknown or repeated inline flag.
    pub const FLAG: u32 = 5;
    /// Nesting deeper than the configured limit.
    pub const NEST_LIMIT: u32 = 6;
    /// Unknown Unicode class or a Unicode feature that is not available.
    pub const UNICODE: u32 = 7;
    /// The pattern is not valid UTF-8.
    pub const BAD_UTF8: u32 = 8;
    /// The compiled program exceeds the engine size limits.
    pub const TOO_BIG: u32 = 9;
    /// More capture groups or longer group names than compiled code can store.
    pub const TOO_MANY_GROUPS: u32 = 10;
    /// Look-around, backreferences and other syntax the engine does not support.
    pub const UNSUPPORTED: u32 = 11;

    /// Largest repetition count accepted in `{n,m}`.
    pub const MAX_REPEAT: u32 = 65535;
}
