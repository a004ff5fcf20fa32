/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template parsing.

use thiserror::Error;

/// Errors that can occur while parsing template source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    /// Input ended inside a construct that needs a terminator.
    #[error("Unexpected end of input at byte {offset}: expected {expected}")]
    UnexpectedEof { expected: String, offset: usize },

    /// A closing tag that does not match the open element.
    #[error("Mismatched closing tag at byte {offset}: expected </{expected}>, found </{found}>")]
    MismatchedTag {
        expected: String,
        found: String,
        offset: usize,
    },

    /// A block closed with the wrong name.
    #[error("Mismatched block close at byte {offset}: expected {{{{/{expected}}}}}, found {{{{/{found}}}}}")]
    MismatchedBlock {
        expected: String,
        found: String,
        offset: usize,
    },

    /// A close or `else` that has nothing to close.
    #[error("Unexpected {construct} at byte {offset}")]
    Unexpected { construct: String, offset: usize },

    /// Malformed expression inside `{{ }}`.
    #[error("Invalid expression at byte {offset}: {message}")]
    InvalidExpression { message: String, offset: usize },
}

impl SyntaxError {
    /// Byte offset of the error in the source.
    pub fn offset(&self) -> usize {
        match self {
            SyntaxError::UnexpectedEof { offset, .. }
            | SyntaxError::MismatchedTag { offset, .. }
            | SyntaxError::MismatchedBlock { offset, .. }
            | SyntaxError::Unexpected { offset, .. }
            | SyntaxError::InvalidExpression { offset, .. } => *offset,
        }
    }
}

/// Result type for parse operations.
pub type SyntaxResult<T> = Result<T, SyntaxError>;
