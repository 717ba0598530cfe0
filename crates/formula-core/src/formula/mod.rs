//! The formula adaptor boundary.
//!
//! [`Formula`] is the contract the cell graph consumes; the graph never
//! names a grammar, it only calls `referenced_positions`, `expression_text`,
//! and `execute`. [`ExprFormula`] is the one concrete adaptor this crate
//! ships, implementing plain infix arithmetic over cell references.

mod ast;
mod eval;
mod parser;
mod render;

use std::fmt;

use smallvec::SmallVec;

use crate::error::FormulaError;
use crate::position::Position;
use crate::value::{FormulaValue, Value};

/// Most formulas in a spreadsheet reference only a handful of cells; inline
/// up to four references before spilling to the heap (mirrors
/// `formula-engine`'s use of `smallvec` for small per-formula argument/ref
/// lists).
type RefList = SmallVec<[Position; 4]>;

/// A read-only view of the sheet, as seen from formula execution. The only
/// operation a formula needs is resolving another cell's current value.
pub trait SheetView {
    fn get_value(&self, pos: Position) -> Value;
}

/// The boundary contract a formula adaptor must satisfy.
pub trait Formula: fmt::Debug {
    /// Positions referenced by the formula, in order of appearance, with
    /// consecutive duplicates removed.
    fn referenced_positions(&self) -> &[Position];

    /// Canonical, whitespace-normalized textual form of the expression
    /// (without the leading `=` marker, which is a `Cell`-level concern).
    fn expression_text(&self) -> &str;

    /// Evaluates the formula against `sheet`, returning a finite number or
    /// the arithmetic error.
    fn execute(&self, sheet: &dyn SheetView) -> FormulaValue;
}

/// Infix-arithmetic formula adaptor: `+ - * /`, unary `+ -`, parentheses,
/// decimal literals, and A1-style cell references.
#[derive(Debug, Clone)]
pub struct ExprFormula {
    expr: ast::Expr,
    text: String,
    refs: RefList,
}

impl ExprFormula {
    /// Parses `expression` (the formula text with the leading `=` already
    /// stripped by the caller). Fails with [`FormulaError`] on malformed
    /// input.
    pub fn parse(expression: &str) -> Result<Self, FormulaError> {
        let (expr, refs) = parser::parse(expression)?;
        let text = render::render(&expr);
        Ok(ExprFormula {
            expr,
            text,
            refs: refs.into_iter().collect(),
        })
    }
}

impl Formula for ExprFormula {
    fn referenced_positions(&self) -> &[Position] {
        &self.refs
    }

    fn expression_text(&self) -> &str {
        &self.text
    }

    fn execute(&self, sheet: &dyn SheetView) -> FormulaValue {
        eval::execute(&self.expr, sheet)
    }
}
