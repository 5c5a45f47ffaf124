use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::validate::Rejection;

pub type PersistResult<T> = Result<T, PersistError>;

#[derive(Debug, Error, Diagnostic)]
pub enum PersistError {
    #[error(transparent)]
    #[diagnostic(
        code("persist.validation"),
        help("only allow-listed shapes can be saved; a trusted load bypasses the check for files of known origin")
    )]
    Validation(#[from] Rejection),
    #[error("cannot resolve variable names: {message}")]
    #[diagnostic(
        code("persist.name_resolution"),
        help("pass plain variable names on a single line, or save an explicit document instead")
    )]
    NameResolution {
        message: String,
        /// 1-based position among the named arguments, when one is at fault.
        position: Option<usize>,
        #[source_code]
        src: String,
        #[label("here")]
        span: SourceSpan,
    },
    #[error("invalid variable name `{name}`: {reason}")]
    #[diagnostic(code("persist.invalid_name"))]
    InvalidName { name: String, reason: &'static str },
    #[error("{context}: {source}")]
    #[diagnostic(code("persist.io"))]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unreadable persisted data: {0}")]
    #[diagnostic(code("persist.format"))]
    Format(#[from] FormatError),
    #[error("resource limit exceeded: {0}")]
    #[diagnostic(code("persist.resource_limit"))]
    ResourceLimit(String),
    #[error("record has no field `{0}`")]
    #[diagnostic(code("persist.missing_field"))]
    MissingField(String),
    #[error("record has {found} fields, expected {expected}")]
    #[diagnostic(code("persist.field_count"))]
    FieldCount { expected: usize, found: usize },
    #[error("invalid configuration: {0}")]
    #[diagnostic(code("persist.config"))]
    Config(#[from] toml::de::Error),
}

impl PersistError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// The structural rejection, when this error is one.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Validation(rejection) => Some(rejection),
            _ => None,
        }
    }
}

/// Envelope or payload damage: the bytes are not a readable document at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("data too small to hold a header ({0} bytes)")]
    TooSmall(usize),
    #[error("payload too large to frame")]
    TooLarge,
    #[error("invalid magic bytes")]
    InvalidMagic,
    #[error("incompatible format version: found {found}, expected {expected}")]
    IncompatibleVersion { found: u16, expected: u16 },
    #[error("payload length mismatch: header says {declared}, found {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("malformed payload: {0}")]
    Payload(String),
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
    #[error("stored variable name `{name}` is invalid: {reason}")]
    StoredName { name: String, reason: &'static str },
}
