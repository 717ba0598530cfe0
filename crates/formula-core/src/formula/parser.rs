//! Recursive-descent parser for the arithmetic formula grammar.
//!
//! Grammar (whitespace insignificant throughout):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := factor (('*' | '/') factor)*
//! factor  := ('+' | '-') factor | primary
//! primary := number | reference | '(' expr ')'
//! ```

use crate::error::FormulaError;
use crate::position::Position;

use super::ast::{BinaryOp, Expr, UnaryOp};

/// Parses `input` into an AST plus the ordered, consecutive-duplicate-free
/// list of positions it references, in the order they appear in the
/// expression.
pub fn parse(input: &str) -> Result<(Expr, Vec<Position>), FormulaError> {
    let mut parser = Parser {
        chars: input.char_indices().collect(),
        pos: 0,
        input,
        refs: Vec::new(),
    };
    let expr = parser.parse_expr()?;
    parser.skip_ws();
    if let Some(&(i, _)) = parser.chars.get(parser.pos) {
        return Err(FormulaError::TrailingInput(input[i..].to_string()));
    }
    Ok((expr, parser.refs))
}

struct Parser<'a> {
    chars: Vec<(usize, char)>,
    pos: usize,
    input: &'a str,
    refs: Vec<Position>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_term()?;
        loop {
            self.skip_ws();
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_factor()?;
        loop {
            self.skip_ws();
            let op = match self.peek() {
                Some('*') => BinaryOp::Mul,
                Some('/') => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, FormulaError> {
        self.skip_ws();
        match self.peek() {
            Some('+') => {
                self.advance();
                Ok(Expr::Unary(UnaryOp::Plus, Box::new(self.parse_factor()?)))
            }
            Some('-') => {
                self.advance();
                Ok(Expr::Unary(UnaryOp::Minus, Box::new(self.parse_factor()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.advance();
                let inner = self.parse_expr()?;
                self.skip_ws();
                match self.advance() {
                    Some(')') => Ok(inner),
                    Some(c) => Err(FormulaError::UnexpectedChar(c, self.peek_offset())),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_reference(),
            Some(c) => Err(FormulaError::UnexpectedChar(c, self.peek_offset())),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn parse_number(&mut self) -> Result<Expr, FormulaError> {
        let start = self.peek_offset();
        let mut saw_digit = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            saw_digit = true;
            self.advance();
        }
        if self.peek() == Some('.') {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                saw_digit = true;
                self.advance();
            }
        }
        if !saw_digit {
            return Err(FormulaError::UnexpectedChar(
                self.peek().unwrap_or('\0'),
                start,
            ));
        }
        let end = self.peek_offset();
        let text = &self.input[start..end];
        let n: f64 = text
            .parse()
            .map_err(|_| FormulaError::UnexpectedChar('.', start))?;
        Ok(Expr::Number(n))
    }

    fn parse_reference(&mut self) -> Result<Expr, FormulaError> {
        let start = self.peek_offset();
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            self.advance();
        }
        let digits_start = self.peek_offset();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let end = self.peek_offset();
        if digits_start == end || digits_start == start {
            return Err(FormulaError::InvalidReference(
                self.input[start..end].to_string(),
            ));
        }
        let text = &self.input[start..end];
        let pos = Position::parse_a1(text)
            .ok_or_else(|| FormulaError::InvalidReference(text.to_string()))?;
        if self.refs.last() != Some(&pos) {
            self.refs.push(pos);
        }
        Ok(Expr::Reference(pos))
    }
}
