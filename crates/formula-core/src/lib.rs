//! Cell graph and formula evaluation core for a minimal spreadsheet engine.
//!
//! This crate implements the per-cell variant model, the forward/reverse
//! dependency edges, cycle detection performed at assignment time, lazy
//! memoized evaluation of formula cells, and the invalidation cascade
//! triggered when a cell is rewritten. It intentionally does not include a
//! formula *grammar* beyond the one concrete adaptor it ships
//! ([`formula::ExprFormula`]), a textual rendering CLI, or any persistence
//! format — those are peripheral concerns left to callers.
//!
//! ```
//! use formula_core::{Position, Sheet, Value};
//!
//! let mut sheet = Sheet::new();
//! sheet.set_cell(Position::parse_a1("A1").unwrap(), "2").unwrap();
//! sheet.set_cell(Position::parse_a1("A2").unwrap(), "=A1+3").unwrap();
//! assert_eq!(
//!     sheet.get_value(Position::parse_a1("A2").unwrap()).unwrap(),
//!     Value::Number(5.0)
//! );
//! ```

pub mod cell;
pub mod error;
pub mod formula;
pub mod position;
pub mod sheet;
pub mod value;

pub use cell::{Cell, CellKind};
pub use error::{CellError, FormulaError};
pub use formula::{ExprFormula, Formula, SheetView};
pub use position::{Position, Size, MAX_COLS, MAX_ROWS};
pub use sheet::Sheet;
pub use value::{ArithmeticError, FormulaValue, Value};
