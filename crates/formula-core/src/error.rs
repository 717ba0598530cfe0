//! Error taxonomy for the sheet/cell mutation surface.
//!
//! Arithmetic failure is deliberately absent from this enum: it is not
//! raised, it is returned as a `Value`/`FormulaValue` variant (see
//! [`crate::value::ArithmeticError`]).

use thiserror::Error;

use crate::position::Position;

/// Errors raised by `Sheet::set_cell` / `Sheet::get_cell` / `Sheet::clear_cell`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("position out of bounds: {0:?}")]
    InvalidPosition(Position),

    #[error("invalid formula: {0}")]
    InvalidFormula(String),

    #[error("circular dependency at {0:?}")]
    CircularDependency(Position),
}

/// Errors raised while constructing a formula adaptor from raw text.
/// Surfaced through [`CellError::InvalidFormula`] by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("unexpected character {0:?} at byte offset {1}")]
    UnexpectedChar(char, usize),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("invalid cell reference {0:?}")]
    InvalidReference(String),

    #[error("trailing input after expression: {0:?}")]
    TrailingInput(String),
}
