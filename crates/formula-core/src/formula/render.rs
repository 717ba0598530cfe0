//! Renders an AST back to its canonical, whitespace-normalized text form.

use super::ast::{BinaryOp, Expr, UnaryOp};

pub fn render(expr: &Expr) -> String {
    render_prec(expr, 0)
}

// `min_prec` is the minimum binding power the caller requires from this
// subexpression; anything binding looser gets parenthesized. Right operands
// of non-associative operators (-, /) are rendered with one extra unit of
// required precedence so `a-(b-c)` keeps its parens while `(a-b)-c` does not.
fn render_prec(expr: &Expr, min_prec: u8) -> String {
    match expr {
        Expr::Number(n) => render_number(*n),
        Expr::Reference(pos) => pos.to_a1(),
        Expr::Unary(op, inner) => {
            let s = format!("{}{}", op.symbol(), render_prec(inner, 3));
            if 3 < min_prec {
                format!("({s})")
            } else {
                s
            }
        }
        Expr::Binary(op, left, right) => {
            let prec = op.precedence();
            let left_s = render_prec(left, prec);
            let right_s = render_prec(right, prec + 1);
            let s = format!("{left_s}{}{right_s}", op.symbol());
            if prec < min_prec {
                format!("({s})")
            } else {
                s
            }
        }
    }
}

fn render_number(n: f64) -> String {
    format!("{n}")
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn drops_redundant_parens() {
        let (expr, _) = parse("(1+2)+3").unwrap();
        assert_eq!(render(&expr), "1+2+3");
    }

    #[test]
    fn keeps_required_parens_for_non_associative_ops() {
        let (expr, _) = parse("1-(2-3)").unwrap();
        assert_eq!(render(&expr), "1-(2-3)");

        let (expr, _) = parse("1/(2/3)").unwrap();
        assert_eq!(render(&expr), "1/(2/3)");
    }

    #[test]
    fn keeps_parens_around_lower_precedence_subexpression() {
        let (expr, _) = parse("(1+2)*3").unwrap();
        assert_eq!(render(&expr), "(1+2)*3");
    }

    #[test]
    fn rendered_text_reparses_to_the_same_ast() {
        for src in ["1 + 2*3", "(1+2)/(3-4)", "-5+ +6", "A1+B2*(C3-1)"] {
            let (expr, _) = parse(src).unwrap();
            let rendered = render(&expr);
            let (reparsed, _) = parse(&rendered).unwrap();
            assert_eq!(expr, reparsed);
        }
    }
}
