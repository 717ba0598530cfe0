//! The sparse cell map and the mutation/query surface.
//!
//! `Sheet` is the sole owner of every [`Cell`] and, per `DESIGN.md` OQ-1,
//! the sole place the graph algorithms live: cycle detection, edge
//! rewiring, and cache-invalidation cascades all operate here rather than
//! on `Cell` itself, since `Cell` cannot safely hold a back-reference to
//! its owning `Sheet` in Rust.

use std::collections::VecDeque;
use std::io;

use ahash::{AHashMap, AHashSet};

use crate::cell::{Cell, CellKind};
use crate::error::CellError;
use crate::formula::{ExprFormula, Formula, SheetView};
use crate::position::{Position, Size};
use crate::value::Value;

/// Formula marker: a stored text beginning with `=` and at least 2 bytes
/// long is a formula. A single-character `"="` is a literal text, not a
/// formula.
const FORMULA_MARKER: char = '=';

/// Significant decimal digits kept when rendering `Value::Number` through
/// `print_values`. Trims floating-point noise (`0.1 + 0.2 ==
/// 0.30000000000000004`) without affecting exact integers or short
/// fractions, which already round-trip within this many digits.
const PRINTED_VALUE_PRECISION: i32 = 15;

/// Renders a cell's value the way `print_values` does: numbers rounded to
/// `PRINTED_VALUE_PRECISION` significant digits, everything else via its
/// ordinary `Display` impl.
fn format_printed_value(value: Value) -> String {
    match value {
        Value::Number(n) => format_number(n, PRINTED_VALUE_PRECISION),
        other => other.to_string(),
    }
}

fn format_number(n: f64, significant_digits: i32) -> String {
    if n == 0.0 || !n.is_finite() {
        return n.to_string();
    }
    let magnitude = n.abs().log10().floor() as i32;
    let scale = 10f64.powi(significant_digits - 1 - magnitude);
    let rounded = (n * scale).round() / scale;
    rounded.to_string()
}

/// Sparse mapping from position to owned cell, plus the public mutation and
/// query surface.
#[derive(Debug, Default)]
pub struct Sheet {
    cells: AHashMap<Position, Cell>,
}

impl Sheet {
    pub fn new() -> Self {
        Sheet {
            cells: AHashMap::new(),
        }
    }

    fn require_valid(pos: Position) -> Result<(), CellError> {
        if pos.is_valid() {
            Ok(())
        } else {
            log::debug!("rejecting {pos:?}: out of bounds");
            Err(CellError::InvalidPosition(pos))
        }
    }

    /// Read-only handle to the cell at `pos`, or `None` when no cell has
    /// ever been materialized there.
    pub fn get_cell(&self, pos: Position) -> Result<Option<&Cell>, CellError> {
        Self::require_valid(pos)?;
        Ok(self.cells.get(&pos))
    }

    /// Evaluates (and, for formula cells, caches) the value at `pos`.
    /// Absent cells render as `Value::Empty`, matching a freshly
    /// materialized `Empty` cell.
    pub fn get_value(&self, pos: Position) -> Result<Value, CellError> {
        Self::require_valid(pos)?;
        Ok(match self.cells.get(&pos) {
            Some(cell) => cell.value(self),
            None => Value::Empty,
        })
    }

    /// Classifies `text`, runs cycle detection for formulas, materializes
    /// missing referents, rewires edges, invalidates downstream caches, and
    /// only then commits the new payload.
    pub fn set_cell(&mut self, pos: Position, text: impl Into<String>) -> Result<(), CellError> {
        Self::require_valid(pos)?;
        let text = text.into();

        self.cells.entry(pos).or_insert_with(Cell::empty);

        if text.chars().count() >= 2 && text.starts_with(FORMULA_MARKER) {
            self.set_formula(pos, &text[FORMULA_MARKER.len_utf8()..])
        } else if text.is_empty() {
            self.rewire_and_commit(pos, CellKind::Empty, AHashSet::new());
            Ok(())
        } else {
            self.rewire_and_commit(pos, CellKind::Text(text), AHashSet::new());
            Ok(())
        }
    }

    fn set_formula(&mut self, pos: Position, expression: &str) -> Result<(), CellError> {
        let formula = ExprFormula::parse(expression).map_err(|e| {
            log::debug!("rejecting formula at {pos:?}: {e}");
            CellError::InvalidFormula(e.to_string())
        })?;

        let candidate_refs: AHashSet<Position> =
            formula.referenced_positions().iter().copied().collect();

        if self.would_create_cycle(pos, &candidate_refs) {
            log::debug!("rejecting formula at {pos:?}: would create a circular dependency");
            return Err(CellError::CircularDependency(pos));
        }

        // Materialize missing referents before committing (the accepted
        // deviation in DESIGN.md OQ-3): these survive even though cycle
        // detection has already succeeded by this point.
        for &referent in &candidate_refs {
            if !self.cells.contains_key(&referent) {
                log::debug!("materializing empty placeholder at {referent:?} for formula at {pos:?}");
            }
            self.cells.entry(referent).or_insert_with(Cell::empty);
        }

        self.rewire_and_commit(
            pos,
            CellKind::Formula {
                formula: Box::new(formula),
                cache: Default::default(),
            },
            candidate_refs,
        );
        Ok(())
    }

    /// Shared by the formula/text/empty paths: rewire forward/reverse
    /// edges, invalidate downstream caches, commit the new kind.
    fn rewire_and_commit(&mut self, pos: Position, new_kind: CellKind, new_refs: AHashSet<Position>) {
        let old_refs: Vec<Position> = self
            .cells
            .get(&pos)
            .map(|c| c.forward_refs().iter().copied().collect())
            .unwrap_or_default();

        for old in &old_refs {
            if !new_refs.contains(old) {
                if let Some(referent) = self.cells.get_mut(old) {
                    referent.reverse_refs_mut().remove(&pos);
                }
            }
        }
        for &new in &new_refs {
            if let Some(referent) = self.cells.get_mut(&new) {
                referent.reverse_refs_mut().insert(pos);
            }
        }

        if let Some(cell) = self.cells.get_mut(&pos) {
            *cell.forward_refs_mut() = new_refs;
        }

        self.invalidate_downstream(pos);

        if let Some(cell) = self.cells.get_mut(&pos) {
            cell.set_kind(new_kind);
        }
    }

    /// BFS seeded with the *candidate* reference set, thereafter following
    /// each visited cell's *existing* `forward_refs`. A cycle exists iff
    /// `origin` is ever visited.
    fn would_create_cycle(&self, origin: Position, candidate_refs: &AHashSet<Position>) -> bool {
        if candidate_refs.is_empty() {
            return false;
        }

        let mut visited: AHashSet<Position> = AHashSet::new();
        let mut queue: VecDeque<Position> = candidate_refs.iter().copied().collect();

        while let Some(current) = queue.pop_front() {
            if current == origin {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(cell) = self.cells.get(&current) {
                for &next in cell.forward_refs() {
                    queue.push_back(next);
                }
            }
        }

        false
    }

    /// Invariant I3: clears the formula cache of every cell transitively
    /// reverse-reachable from `pos`. Traversal continues
    /// through reverse edges regardless of kind, so a cleared formula
    /// behind a non-formula cell is still reached and invalidated.
    fn invalidate_downstream(&self, pos: Position) {
        let mut queue: VecDeque<Position> = VecDeque::new();
        let mut visited: AHashSet<Position> = AHashSet::new();
        queue.push_back(pos);
        visited.insert(pos);

        while let Some(current) = queue.pop_front() {
            let Some(cell) = self.cells.get(&current) else {
                continue;
            };
            for &dependent in cell.reverse_refs() {
                if let Some(dep_cell) = self.cells.get(&dependent) {
                    if dep_cell.has_live_cache() {
                        log::debug!(
                            "invalidating cached formula result at {dependent:?} (cascading from {pos:?})"
                        );
                    }
                    dep_cell.clear_cache();
                }
                if visited.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
    }

    /// Removing a cell with live reverse edges
    /// would dangle them, so such a cell is downgraded to `Empty` in place
    /// instead of being removed from the map; a cell with no reverse edges
    /// is dropped outright.
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), CellError> {
        Self::require_valid(pos)?;

        if !self.cells.contains_key(&pos) {
            return Ok(());
        }

        self.rewire_and_commit(pos, CellKind::Empty, AHashSet::new());

        let should_remove = self
            .cells
            .get(&pos)
            .map(|c| !c.is_referenced())
            .unwrap_or(false);
        if should_remove {
            self.cells.remove(&pos);
        }
        Ok(())
    }

    /// The smallest bounding box covering every non-`Empty` cell.
    /// Auto-materialized empty placeholder cells never extend the box.
    pub fn get_printable_size(&self) -> Size {
        let mut rows = 0;
        let mut cols = 0;
        for (pos, cell) in &self.cells {
            if matches!(cell.kind(), CellKind::Empty) {
                continue;
            }
            rows = rows.max(pos.row + 1);
            cols = cols.max(pos.col + 1);
        }
        Size::new(rows, cols)
    }

    /// Row-major iteration over the populated region.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &Cell)> {
        let size = self.get_printable_size();
        (0..size.rows).flat_map(move |row| {
            (0..size.cols).filter_map(move |col| {
                let pos = Position::new(row, col);
                self.cells.get(&pos).map(|cell| (pos, cell))
            })
        })
    }

    /// Writes values row-major within the printable size, tab-separated,
    /// one row per line. Numbers are rounded to [`PRINTED_VALUE_PRECISION`]
    /// significant digits before rendering, so floating-point noise (e.g.
    /// `0.1 + 0.2`) doesn't leak into printed output.
    pub fn print_values(&self, out: &mut impl io::Write) -> io::Result<()> {
        self.print_rows(out, |cell, sheet| format_printed_value(cell.value(sheet)))
    }

    /// Writes stored texts row-major within the printable size,
    /// tab-separated, one row per line.
    pub fn print_texts(&self, out: &mut impl io::Write) -> io::Result<()> {
        self.print_rows(out, |cell, _sheet| cell.text())
    }

    fn print_rows(
        &self,
        out: &mut impl io::Write,
        render: impl Fn(&Cell, &Sheet) -> String,
    ) -> io::Result<()> {
        let size = self.get_printable_size();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    write!(out, "\t")?;
                }
                if let Some(cell) = self.cells.get(&Position::new(row, col)) {
                    write!(out, "{}", render(cell, self))?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

impl SheetView for Sheet {
    fn get_value(&self, pos: Position) -> Value {
        match self.cells.get(&pos) {
            Some(cell) => cell.value(self),
            None => Value::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pos(a1: &str) -> Position {
        Position::parse_a1(a1).unwrap()
    }

    #[test]
    fn scenario_1_basic_arithmetic_and_invalidation() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "2").unwrap();
        sheet.set_cell(pos("A2"), "=A1+3").unwrap();
        assert_eq!(sheet.get_value(pos("A2")).unwrap(), Value::Number(5.0));

        sheet.set_cell(pos("A1"), "10").unwrap();
        assert_eq!(sheet.get_value(pos("A2")).unwrap(), Value::Number(13.0));
    }

    #[test]
    fn scenario_2_two_cell_cycle_is_rejected() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=B1").unwrap();
        let err = sheet.set_cell(pos("B1"), "=A1").unwrap_err();
        assert_eq!(err, CellError::CircularDependency(pos("B1")));
        // B1 was auto-materialized as Empty by A1's formula; still Empty.
        assert_eq!(sheet.get_cell(pos("B1")).unwrap().unwrap().text(), "");
    }

    #[test]
    fn scenario_3_division_by_zero_prints_arithm_token() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=1/0").unwrap();
        assert!(matches!(
            sheet.get_value(pos("A1")).unwrap(),
            Value::Error(_)
        ));

        let mut out = Vec::new();
        sheet.print_values(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "#ARITHM!\n");
    }

    #[test]
    fn scenario_4_escaped_text_round_trips() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "'=hello").unwrap();
        assert_eq!(
            sheet.get_value(pos("A1")).unwrap(),
            Value::Text("=hello".to_string())
        );
        assert_eq!(sheet.get_cell(pos("A1")).unwrap().unwrap().text(), "'=hello");
    }

    #[test]
    fn scenario_5_reference_to_absent_cell_materializes_empty() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("B2"), "=C3").unwrap();
        assert!(sheet.get_cell(pos("C3")).unwrap().is_some());
        assert_eq!(sheet.get_value(pos("B2")).unwrap(), Value::Number(0.0));
        // B2 sits at zero-based (row 1, col 1); the printable box is the
        // smallest rect covering it, i.e. rows 0..2, cols 0..2. C3 is an
        // auto-materialized Empty placeholder and must not extend it
        // (see DESIGN.md OQ-4).
        assert_eq!(sheet.get_printable_size(), Size::new(2, 2));
    }

    #[test]
    fn scenario_6_cascading_invalidation_through_transitive_dependents() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=A2+A3").unwrap();
        sheet.set_cell(pos("A2"), "1").unwrap();
        sheet.set_cell(pos("A3"), "=A2*2").unwrap();
        assert_eq!(sheet.get_value(pos("A1")).unwrap(), Value::Number(3.0));

        sheet.set_cell(pos("A2"), "5").unwrap();
        assert_eq!(sheet.get_value(pos("A1")).unwrap(), Value::Number(15.0));
    }

    #[test]
    fn self_reference_is_rejected() {
        let mut sheet = Sheet::new();
        let err = sheet.set_cell(pos("A1"), "=A1").unwrap_err();
        assert_eq!(err, CellError::CircularDependency(pos("A1")));
    }

    #[test]
    fn invalid_position_is_rejected_for_every_operation() {
        let mut sheet = Sheet::new();
        let bad = Position::new(-1, 0);
        assert_eq!(
            sheet.set_cell(bad, "1").unwrap_err(),
            CellError::InvalidPosition(bad)
        );
        assert_eq!(sheet.get_cell(bad).unwrap_err(), CellError::InvalidPosition(bad));
        assert_eq!(
            sheet.get_value(bad).unwrap_err(),
            CellError::InvalidPosition(bad)
        );
        assert_eq!(
            sheet.clear_cell(bad).unwrap_err(),
            CellError::InvalidPosition(bad)
        );
    }

    #[test]
    fn invalid_formula_leaves_cell_unchanged() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "hello").unwrap();
        let err = sheet.set_cell(pos("A1"), "=1+").unwrap_err();
        assert!(matches!(err, CellError::InvalidFormula(_)));
        assert_eq!(sheet.get_cell(pos("A1")).unwrap().unwrap().text(), "hello");
    }

    #[test]
    fn clear_is_idempotent() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "5").unwrap();
        sheet.clear_cell(pos("A1")).unwrap();
        assert_eq!(sheet.get_value(pos("A1")).unwrap(), Value::Empty);
        // second clear observes the same state
        sheet.clear_cell(pos("A1")).unwrap();
        assert_eq!(sheet.get_value(pos("A1")).unwrap(), Value::Empty);
    }

    #[test]
    fn clear_cell_with_live_dependents_keeps_placeholder() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "5").unwrap();
        sheet.set_cell(pos("A2"), "=A1+1").unwrap();
        sheet.clear_cell(pos("A1")).unwrap();
        assert_eq!(sheet.get_value(pos("A1")).unwrap(), Value::Empty);
        assert_eq!(sheet.get_value(pos("A2")).unwrap(), Value::Number(1.0));
        assert!(sheet.get_cell(pos("A1")).unwrap().unwrap().is_referenced());
    }

    #[test]
    fn printable_size_ignores_empty_placeholders() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("Z10"), "=AA20").unwrap();
        // AA20 is auto-materialized as Empty; it must not extend the box
        // beyond what Z10 alone requires.
        assert_eq!(sheet.get_printable_size(), Size::new(10, 26));
    }

    #[test]
    fn iter_yields_row_major_populated_cells() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("B1"), "1").unwrap();
        sheet.set_cell(pos("A2"), "2").unwrap();
        let positions: Vec<Position> = sheet.iter().map(|(p, _)| p).collect();
        assert_eq!(positions, vec![pos("A2"), pos("B1")]);
    }

    #[test]
    fn print_values_rounds_away_floating_point_noise() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=0.1+0.2").unwrap();
        let mut out = Vec::new();
        sheet.print_values(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0.3\n");
    }

    #[test]
    fn print_values_leaves_integers_and_small_fractions_untouched() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "10").unwrap();
        sheet.set_cell(pos("B1"), "=1/4").unwrap();
        let mut out = Vec::new();
        sheet.print_values(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "10\t0.25\n");
    }
}
