//! A single grid node: its variant payload and its dependency edges.
//!
//! There's no open extension requirement here, so the classic
//! `Impl`/`EmptyImpl`/`TextImpl`/`FormulaImpl` class hierarchy collapses to a
//! closed `CellKind` enum.
//!
//! `Cell` never reaches across to other cells — dependency rewiring, cycle
//! detection, and cache invalidation are owned by `Sheet` instead (see the
//! `sheet` module and `DESIGN.md` OQ-1). `Cell` only holds data and exposes
//! the accessors the sheet's graph algorithm needs.

use std::cell::RefCell;

use ahash::AHashSet;

use crate::formula::Formula;
use crate::position::Position;
use crate::value::{FormulaValue, Value};

/// Escape marker: a leading `'` in stored text suppresses formula
/// interpretation of the *rendered* value.
const ESCAPE_MARKER: char = '\'';

#[derive(Debug)]
pub enum CellKind {
    Empty,
    Text(String),
    Formula {
        formula: Box<dyn Formula>,
        /// Memoized result of the last `execute` call. `RefCell` lets a
        /// shared reference populate the cache: reading a formula cell's
        /// value is logically a read, even though it may compute and store a
        /// result as a side effect.
        cache: RefCell<Option<FormulaValue>>,
    },
}

/// A single sheet cell: its current kind/payload plus the forward and
/// reverse dependency edges the sheet maintains.
#[derive(Debug)]
pub struct Cell {
    kind: CellKind,
    forward_refs: AHashSet<Position>,
    reverse_refs: AHashSet<Position>,
}

impl Cell {
    pub fn empty() -> Self {
        Cell {
            kind: CellKind::Empty,
            forward_refs: AHashSet::new(),
            reverse_refs: AHashSet::new(),
        }
    }

    pub fn kind(&self) -> &CellKind {
        &self.kind
    }

    /// Replaces the cell's kind/payload. The caller (`Sheet`) is responsible
    /// for having already rewired `forward_refs`/`reverse_refs` and
    /// invalidated downstream caches *before* calling this, so the swap only
    /// ever commits a fully-consistent graph state.
    pub(crate) fn set_kind(&mut self, kind: CellKind) {
        self.kind = kind;
    }

    pub fn forward_refs(&self) -> &AHashSet<Position> {
        &self.forward_refs
    }

    pub(crate) fn forward_refs_mut(&mut self) -> &mut AHashSet<Position> {
        &mut self.forward_refs
    }

    pub fn reverse_refs(&self) -> &AHashSet<Position> {
        &self.reverse_refs
    }

    pub(crate) fn reverse_refs_mut(&mut self) -> &mut AHashSet<Position> {
        &mut self.reverse_refs
    }

    /// True when at least one other cell's formula directly references this
    /// one.
    pub fn is_referenced(&self) -> bool {
        !self.reverse_refs.is_empty()
    }

    /// Clears a live formula cache. A no-op for non-formula cells. O(1).
    pub(crate) fn clear_cache(&self) {
        if let CellKind::Formula { cache, .. } = &self.kind {
            *cache.borrow_mut() = None;
        }
    }

    /// True when this cell currently has a formula with a populated cache.
    pub(crate) fn has_live_cache(&self) -> bool {
        matches!(&self.kind, CellKind::Formula { cache, .. } if cache.borrow().is_some())
    }

    /// Consults the cache for formula cells, otherwise executes and
    /// memoizes; empty/text cells render directly.
    pub fn value(&self, sheet: &dyn crate::formula::SheetView) -> Value {
        match &self.kind {
            CellKind::Empty => Value::Empty,
            CellKind::Text(text) => Value::Text(display_text(text)),
            CellKind::Formula { formula, cache } => {
                if let Some(cached) = *cache.borrow() {
                    return cached.into();
                }
                let result = formula.execute(sheet);
                *cache.borrow_mut() = Some(result);
                result.into()
            }
        }
    }

    /// The stored text unchanged, or `=` + canonical expression text for
    /// formulas.
    pub fn text(&self) -> String {
        match &self.kind {
            CellKind::Empty => String::new(),
            CellKind::Text(text) => text.clone(),
            CellKind::Formula { formula, .. } => format!("={}", formula.expression_text()),
        }
    }
}

/// Strips a leading escape marker for display purposes; `GetText` returns
/// the original stored string including the marker.
fn display_text(stored: &str) -> String {
    match stored.strip_prefix(ESCAPE_MARKER) {
        Some(rest) => rest.to_string(),
        None => stored.to_string(),
    }
}
