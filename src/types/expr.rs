//! Arithmetic evaluator for generated-column expressions.
//!
//! Deliberately tiny: numeric literals, column references, `+ - * / %`,
//! unary sign and parentheses. Anything else is rejected at table-creation
//! time, so stored expressions can never reach out of the row they are
//! computed from.

use std::collections::HashMap;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, PartialEq)]
pub enum GenExpr {
    Number(f64),
    Column(String),
    Unary {
        negate: bool,
        operand: Box<GenExpr>,
    },
    Binary {
        op: char,
        left: Box<GenExpr>,
        right: Box<GenExpr>,
    },
}

impl GenExpr {
    pub fn parse(text: &str) -> DbResult<GenExpr> {
        let tokens = tokenize(text)?;
        let mut parser = ExprParser { tokens, pos: 0 };
        let expr = parser.expression()?;
        if parser.pos != parser.tokens.len() {
            return Err(DbError::Validation(format!(
                "unexpected trailing input in generated expression '{text}'"
            )));
        }
        Ok(expr)
    }

    /// Collects every column name the expression references.
    pub fn columns(&self, out: &mut Vec<String>) {
        match self {
            GenExpr::Number(_) => {}
            GenExpr::Column(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            GenExpr::Unary { operand, .. } => operand.columns(out),
            GenExpr::Binary { left, right, .. } => {
                left.columns(out);
                right.columns(out);
            }
        }
    }

    /// Evaluates against resolved column values. A NULL input (a `None`
    /// entry) makes the whole result NULL.
    pub fn evaluate(&self, vars: &HashMap<String, Option<f64>>) -> Option<f64> {
        match self {
            GenExpr::Number(n) => Some(*n),
            GenExpr::Column(name) => *vars.get(name)?,
            GenExpr::Unary { negate, operand } => {
                let v = operand.evaluate(vars)?;
                Some(if *negate { -v } else { v })
            }
            GenExpr::Binary { op, left, right } => {
                let l = left.evaluate(vars)?;
                let r = right.evaluate(vars)?;
                Some(match op {
                    '+' => l + r,
                    '-' => l - r,
                    '*' => l * r,
                    '/' => l / r,
                    _ => l % r,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    Open,
    Close,
}

fn tokenize(text: &str) -> DbResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            let number = literal.parse::<f64>().map_err(|_| {
                DbError::Validation(format!("invalid number '{literal}' in generated expression"))
            })?;
            tokens.push(Token::Number(number));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if matches!(c, '+' | '-' | '*' | '/' | '%') {
            tokens.push(Token::Op(c));
            i += 1;
        } else if c == '(' {
            tokens.push(Token::Open);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::Close);
            i += 1;
        } else {
            return Err(DbError::Validation(format!(
                "unsupported character '{c}' in generated expression"
            )));
        }
    }
    Ok(tokens)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn expression(&mut self) -> DbResult<GenExpr> {
        let mut left = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.term()?;
            left = GenExpr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> DbResult<GenExpr> {
        let mut left = self.factor()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.factor()?;
            left = GenExpr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> DbResult<GenExpr> {
        if let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            let negate = *op == '-';
            self.pos += 1;
            let operand = self.factor()?;
            return Ok(GenExpr::Unary {
                negate,
                operand: Box::new(operand),
            });
        }
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(GenExpr::Number(n))
            }
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(GenExpr::Column(name))
            }
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.expression()?;
                match self.peek() {
                    Some(Token::Close) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(DbError::Validation(
                        "unbalanced parentheses in generated expression".into(),
                    )),
                }
            }
            _ => Err(DbError::Validation(
                "malformed generated expression".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, f64)]) -> HashMap<String, Option<f64>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(*v)))
            .collect()
    }

    #[test]
    fn precedence_and_parens() {
        let expr = GenExpr::parse("price * quantity + 1").unwrap();
        let v = vars(&[("price", 2.0), ("quantity", 3.0)]);
        assert_eq!(expr.evaluate(&v), Some(7.0));

        let expr = GenExpr::parse("price * (quantity + 1)").unwrap();
        assert_eq!(expr.evaluate(&v), Some(8.0));
    }

    #[test]
    fn unary_minus() {
        let expr = GenExpr::parse("-price + 10").unwrap();
        assert_eq!(expr.evaluate(&vars(&[("price", 4.0)])), Some(6.0));
    }

    #[test]
    fn null_input_propagates() {
        let expr = GenExpr::parse("a + b").unwrap();
        let mut v = vars(&[("a", 1.0)]);
        v.insert("b".into(), None);
        assert_eq!(expr.evaluate(&v), None);
    }

    #[test]
    fn rejects_function_calls_and_strings() {
        assert!(GenExpr::parse("len(name)").is_err());
        assert!(GenExpr::parse("'abc'").is_err());
        assert!(GenExpr::parse("a; b").is_err());
    }

    #[test]
    fn collects_referenced_columns() {
        let expr = GenExpr::parse("a * b + a").unwrap();
        let mut cols = Vec::new();
        expr.columns(&mut cols);
        assert_eq!(cols, vec!["a".to_string(), "b".to_string()]);
    }
}
