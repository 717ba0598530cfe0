//! Executes a formula AST against a read-only sheet view.

use crate::value::{ArithmeticError, FormulaValue, Value};

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::SheetView;

pub fn execute(expr: &Expr, sheet: &dyn SheetView) -> FormulaValue {
    match eval(expr, sheet) {
        Ok(n) => FormulaValue::from_f64(n),
        Err(ArithmeticError) => FormulaValue::Error(ArithmeticError),
    }
}

fn eval(expr: &Expr, sheet: &dyn SheetView) -> Result<f64, ArithmeticError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Reference(pos) => coerce_to_number(sheet.get_value(*pos)),
        Expr::Unary(op, inner) => {
            let v = eval(inner, sheet)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Minus => -v,
            })
        }
        Expr::Binary(op, left, right) => {
            let l = eval(left, sheet)?;
            let r = eval(right, sheet)?;
            match op {
                BinaryOp::Add => Ok(l + r),
                BinaryOp::Sub => Ok(l - r),
                BinaryOp::Mul => Ok(l * r),
                BinaryOp::Div => {
                    if r == 0.0 {
                        Err(ArithmeticError)
                    } else {
                        Ok(l / r)
                    }
                }
            }
        }
    }
}

/// Coercion rules: empty-string is 0; text parseable as a finite number is
/// that number; anything else is the arithmetic error.
fn coerce_to_number(value: Value) -> Result<f64, ArithmeticError> {
    match value {
        Value::Empty => Ok(0.0),
        Value::Number(n) => Ok(n),
        Value::Error(_) => Err(ArithmeticError),
        Value::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or(ArithmeticError)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct MapView(HashMap<Position, Value>);
    impl SheetView for MapView {
        fn get_value(&self, pos: Position) -> Value {
            self.0.get(&pos).cloned().unwrap_or(Value::Empty)
        }
    }

    fn expr(src: &str) -> Expr {
        super::super::parser::parse(src).unwrap().0
    }

    #[test]
    fn arithmetic_happy_path() {
        let sheet = MapView(HashMap::new());
        assert_eq!(execute(&expr("1+2*3"), &sheet), FormulaValue::Number(7.0));
    }

    #[test]
    fn division_by_zero_is_arithmetic_error() {
        let sheet = MapView(HashMap::new());
        assert_eq!(
            execute(&expr("1/0"), &sheet),
            FormulaValue::Error(ArithmeticError)
        );
    }

    #[test]
    fn empty_reference_coerces_to_zero() {
        let sheet = MapView(HashMap::new());
        assert_eq!(
            execute(&expr("A1+1"), &sheet),
            FormulaValue::Number(1.0)
        );
    }

    #[test]
    fn numeric_text_reference_coerces() {
        let mut map = HashMap::new();
        map.insert(Position::new(0, 0), Value::Text(" 5 ".to_string()));
        let sheet = MapView(map);
        assert_eq!(
            execute(&expr("A1+1"), &sheet),
            FormulaValue::Number(6.0)
        );
    }

    #[test]
    fn non_numeric_text_reference_is_arithmetic_error() {
        let mut map = HashMap::new();
        map.insert(Position::new(0, 0), Value::Text("hello".to_string()));
        let sheet = MapView(map);
        assert_eq!(
            execute(&expr("A1+1"), &sheet),
            FormulaValue::Error(ArithmeticError)
        );
    }

    #[test]
    fn error_reference_propagates() {
        let mut map = HashMap::new();
        map.insert(Position::new(0, 0), Value::Error(ArithmeticError));
        let sheet = MapView(map);
        assert_eq!(
            execute(&expr("A1+1"), &sheet),
            FormulaValue::Error(ArithmeticError)
        );
    }
}
