//! Error types for the weaving pipeline.
//!
//! Every positional error is expressed in original-document coordinates. Host errors
//! (virtual coordinates) never leave the crate untranslated.

use crate::coords::{CoordinateIndex, Position};
use thiserror::Error;

pub const ERR_SYNTAX_IN_EMBEDDED: &str = "W-ERR-SYNTAX-001";
pub const ERR_SHAPE_MISMATCH: &str = "W-ERR-SHAPE-001";
pub const ERR_UNTERMINATED_CONSTRUCT: &str = "W-ERR-UNTERMINATED-001";
pub const ERR_INVALID_INPUT: &str = "W-ERR-INPUT-001";
pub const ERR_CONFIG: &str = "W-ERR-CONFIG-001";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeaveError {
    #[error("{message} ({line}:{column})")]
    SyntaxErrorInEmbedded {
        message: String,
        index: usize,
        line: usize,
        column: usize,
    },

    #[error("Unexpected node shape: {message} ({line}:{column})")]
    ShapeMismatch {
        message: String,
        index: usize,
        line: usize,
        column: usize,
    },

    #[error("Unterminated construct: {message} ({line}:{column})")]
    UnterminatedForeignConstruct {
        message: String,
        index: usize,
        line: usize,
        column: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Config evaluation failed: {0}")]
    Config(String),
}

impl WeaveError {
    pub fn syntax(message: impl Into<String>, index: usize, coords: &CoordinateIndex) -> Self {
        let Position { line, column } = coords.position(index);
        WeaveError::SyntaxErrorInEmbedded {
            message: message.into(),
            index,
            line,
            column,
        }
    }

    pub fn shape(message: impl Into<String>, index: usize, coords: &CoordinateIndex) -> Self {
        let Position { line, column } = coords.position(index);
        WeaveError::ShapeMismatch {
            message: message.into(),
            index,
            line,
            column,
        }
    }

    pub fn unterminated(
        message: impl Into<String>,
        index: usize,
        coords: &CoordinateIndex,
    ) -> Self {
        let Position { line, column } = coords.position(index);
        WeaveError::UnterminatedForeignConstruct {
            message: message.into(),
            index,
            line,
            column,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WeaveError::SyntaxErrorInEmbedded { .. } => ERR_SYNTAX_IN_EMBEDDED,
            WeaveError::ShapeMismatch { .. } => ERR_SHAPE_MISMATCH,
            WeaveError::UnterminatedForeignConstruct { .. } => ERR_UNTERMINATED_CONSTRUCT,
            WeaveError::InvalidInput(_) => ERR_INVALID_INPUT,
            WeaveError::Config(_) => ERR_CONFIG,
        }
    }

    /// Original-document `(index, line, column)` for positional errors.
    pub fn position(&self) -> Option<(usize, usize, usize)> {
        match self {
            WeaveError::SyntaxErrorInEmbedded {
                index,
                line,
                column,
                ..
            }
            | WeaveError::ShapeMismatch {
                index,
                line,
                column,
                ..
            }
            | WeaveError::UnterminatedForeignConstruct {
                index,
                line,
                column,
                ..
            } => Some((*index, *line, *column)),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for WeaveError {
    fn from(err: serde_json::Error) -> Self {
        WeaveError::InvalidInput(err.to_string())
    }
}

/// Failure reported by a host parser, positioned in the text it was given.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at offset {offset}")]
pub struct HostError {
    pub message: String,
    pub offset: usize,
}

impl HostError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        HostError {
            message: message.into(),
            offset,
        }
    }
}

pub type Result<T, E = WeaveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_errors_use_original_coordinates() {
        let coords = CoordinateIndex::new("<p>\n{a +}</p>");
        let err = WeaveError::syntax("Unexpected token", 8, &coords);
        assert_eq!(err.position(), Some((8, 2, 4)));
        assert_eq!(err.code(), ERR_SYNTAX_IN_EMBEDDED);
        assert_eq!(err.to_string(), "Unexpected token (2:4)");
    }

    #[test]
    fn test_non_positional_errors() {
        let err = WeaveError::Config("bad".into());
        assert_eq!(err.position(), None);
        assert_eq!(err.code(), ERR_CONFIG);
    }
}
