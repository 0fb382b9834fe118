use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(condmap::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid configuration at {location}: {message}")]
    #[diagnostic(code(condmap::config::invalid))]
    Invalid {
        message: String,
        location: SourceLocation,
    },

    #[error("Missing required field at {location}: {field}")]
    #[diagnostic(code(condmap::config::missing_field))]
    MissingField {
        field: String,
        location: SourceLocation,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Position of a node or entry inside the configuration source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceLocation {
    /// 1-indexed line
    pub line: usize,
    /// 1-indexed column
    pub column: usize,
    /// Byte offset into the source
    pub offset: usize,
    /// Length in bytes
    pub len: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize, offset: usize, len: usize) -> Self {
        Self {
            line,
            column,
            offset,
            len,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}
