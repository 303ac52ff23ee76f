//! KPI formula compilation and evaluation.
//!
//! Formulas are arithmetic over numeric literals, `+ - * /`, parentheses and a
//! fixed set of variables. Identifiers are matched as whole tokens, so a name
//! such as `initialValue2` is rejected instead of being partially substituted.

use crate::error::{FormulaError, FormulaEvaluationError};
use crate::schema::{Account, Product};
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    PeriodIndex,
    InitialValue,
    PrdCustomValue(u8),
    AccCustomValue(u8),
}

impl Variable {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "periodIndex" => Some(Variable::PeriodIndex),
            "initialValue" => Some(Variable::InitialValue),
            "prdCustomValue1" => Some(Variable::PrdCustomValue(1)),
            "prdCustomValue2" => Some(Variable::PrdCustomValue(2)),
            "prdCustomValue3" => Some(Variable::PrdCustomValue(3)),
            "accCustomValue1" => Some(Variable::AccCustomValue(1)),
            "accCustomValue2" => Some(Variable::AccCustomValue(2)),
            "accCustomValue3" => Some(Variable::AccCustomValue(3)),
            _ => None,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::PeriodIndex => write!(f, "periodIndex"),
            Variable::InitialValue => write!(f, "initialValue"),
            Variable::PrdCustomValue(slot) => write!(f, "prdCustomValue{}", slot),
            Variable::AccCustomValue(slot) => write!(f, "accCustomValue{}", slot),
        }
    }
}

/// Values a formula can see for one (period, product, account) cell.
#[derive(Debug, Clone, Copy)]
pub struct FormulaContext<'a> {
    pub period_index: i64,
    pub product: &'a Product,
    pub account: &'a Account,
}

impl<'a> FormulaContext<'a> {
    pub fn new(period_index: i64, product: &'a Product, account: &'a Account) -> Self {
        Self {
            period_index,
            product,
            account,
        }
    }

    fn resolve(&self, variable: Variable) -> Result<f64, FormulaError> {
        let value = match variable {
            Variable::PeriodIndex => Some(self.period_index as f64),
            Variable::InitialValue => self.product.initial_value,
            Variable::PrdCustomValue(slot) => self.product.custom_value(slot),
            Variable::AccCustomValue(slot) => self.account.custom_value(slot),
        };
        value.ok_or_else(|| FormulaError::MissingCatalogField(variable.to_string()))
    }
}

/* --------------------------------- Lexer --------------------------------- */

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn consume_while<F: Fn(char) -> bool>(&mut self, start: usize, pred: F) -> usize {
        let mut end = start;
        while let Some(&(idx, c)) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            end = idx + c.len_utf8();
            self.chars.next();
        }
        end
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, FormulaError> {
        let mut end = self.consume_while(start, |c| c.is_ascii_digit() || c == '.');

        if let Some(&(idx, c)) = self.chars.peek() {
            if c == 'e' || c == 'E' {
                end = idx + 1;
                self.chars.next();
                if let Some(&(sign_idx, sign)) = self.chars.peek() {
                    if sign == '+' || sign == '-' {
                        end = sign_idx + 1;
                        self.chars.next();
                    }
                }
                end = self.consume_while(end, |c| c.is_ascii_digit());
            }
        }

        let text = &self.source[start..end];
        text.parse::<f64>()
            .map(|value| Token {
                kind: TokenKind::Number(value),
                position: start,
            })
            .map_err(|_| FormulaError::Parse {
                message: format!("invalid number '{}'", text),
                position: start,
            })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, FormulaError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&(_, c)) = self.chars.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.chars.next();
        }

        let &(start, c) = self.chars.peek()?;

        if c.is_ascii_digit() || c == '.' {
            return Some(self.lex_number(start));
        }

        if c.is_alphabetic() || c == '_' {
            let end = self.consume_while(start, |c| c.is_alphanumeric() || c == '_');
            return Some(Ok(Token {
                kind: TokenKind::Identifier(self.source[start..end].to_string()),
                position: start,
            }));
        }

        self.chars.next();
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            other => {
                return Some(Err(FormulaError::Parse {
                    message: format!("unexpected character '{}'", other),
                    position: start,
                }))
            }
        };
        Some(Ok(Token {
            kind,
            position: start,
        }))
    }
}

/* ---------------------------------- AST ---------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable(Variable),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    fn eval(&self, ctx: &FormulaContext<'_>) -> Result<f64, FormulaError> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Variable(v) => ctx.resolve(*v),
            Expr::Negate(inner) => Ok(-inner.eval(ctx)?),
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval(ctx)?;
                let r = rhs.eval(ctx)?;
                match op {
                    BinaryOp::Add => Ok(l + r),
                    BinaryOp::Sub => Ok(l - r),
                    BinaryOp::Mul => Ok(l * r),
                    BinaryOp::Div if r == 0.0 => Err(FormulaError::DivisionByZero),
                    BinaryOp::Div => Ok(l / r),
                }
            }
        }
    }

    fn collect_variables(&self, out: &mut Vec<Variable>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(v) => {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            Expr::Negate(inner) => inner.collect_variables(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
        }
    }
}

/* --------------------------------- Parser -------------------------------- */

/// Deepest expression tree the parser builds. Nested parentheses, unary signs
/// and chained binary operators each add a level.
const MAX_DEPTH: usize = 256;

struct Parser<'a> {
    tokens: Peekable<Lexer<'a>>,
    source_len: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            tokens: Lexer::new(source).peekable(),
            source_len: source.len(),
            depth: 0,
        }
    }

    fn descend(&mut self, position: usize) -> Result<(), FormulaError> {
        if self.depth >= MAX_DEPTH {
            return Err(FormulaError::Parse {
                message: "formula nested too deeply".to_string(),
                position,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Consumes the peeked token and returns where it started.
    fn advance(&mut self) -> Result<usize, FormulaError> {
        Ok(self
            .next_token()?
            .map_or(self.source_len, |tok| tok.position))
    }

    fn parse(&mut self) -> Result<Expr, FormulaError> {
        if self.tokens.peek().is_none() {
            return Err(FormulaError::Parse {
                message: "empty formula".to_string(),
                position: 0,
            });
        }

        let expr = self.parse_sum()?;
        match self.next_token()? {
            None => Ok(expr),
            Some(tok) => Err(FormulaError::Parse {
                message: format!("unexpected {:?} after expression", tok.kind),
                position: tok.position,
            }),
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, FormulaError> {
        self.tokens.next().transpose()
    }

    fn peek_kind(&mut self) -> Option<TokenKind> {
        match self.tokens.peek() {
            Some(Ok(tok)) => Some(tok.kind.clone()),
            _ => None,
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, FormulaError> {
        let entry_depth = self.depth;
        let mut lhs = self.parse_product()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => {
                    self.depth = entry_depth;
                    return Ok(lhs);
                }
            };
            let position = self.advance()?;
            self.descend(position)?;
            let rhs = self.parse_product()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_product(&mut self) -> Result<Expr, FormulaError> {
        let entry_depth = self.depth;
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                _ => {
                    self.depth = entry_depth;
                    return Ok(lhs);
                }
            };
            let position = self.advance()?;
            self.descend(position)?;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        match self.peek_kind() {
            Some(TokenKind::Minus) => {
                let position = self.advance()?;
                self.descend(position)?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(Expr::Negate(Box::new(inner)))
            }
            Some(TokenKind::Plus) => {
                let position = self.advance()?;
                self.descend(position)?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(inner)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        let tok = self.next_token()?.ok_or_else(|| FormulaError::Parse {
            message: "unexpected end of formula".to_string(),
            position: self.source_len,
        })?;

        match tok.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Identifier(name) => Variable::from_name(&name)
                .map(Expr::Variable)
                .ok_or(FormulaError::UnknownVariable(name)),
            TokenKind::LParen => {
                self.descend(tok.position)?;
                let inner = self.parse_sum()?;
                self.depth -= 1;
                match self.next_token()? {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(FormulaError::Parse {
                        message: format!("expected ')', found {:?}", other.kind),
                        position: other.position,
                    }),
                    None => Err(FormulaError::Parse {
                        message: "missing ')'".to_string(),
                        position: self.source_len,
                    }),
                }
            }
            other => Err(FormulaError::Parse {
                message: format!("unexpected {:?}", other),
                position: tok.position,
            }),
        }
    }
}

/* -------------------------------- Formula -------------------------------- */

/// A parsed KPI formula, reusable across every cell of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaEvaluationError> {
        let expr = Parser::new(source)
            .parse()
            .map_err(|e| FormulaEvaluationError {
                formula: source.to_string(),
                source: e,
            })?;

        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Distinct variables in order of first appearance.
    pub fn variables(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        self.expr.collect_variables(&mut out);
        out
    }

    pub fn evaluate(&self, ctx: &FormulaContext<'_>) -> Result<f64, FormulaEvaluationError> {
        let value = self
            .expr
            .eval(ctx)
            .and_then(|v| {
                if v.is_finite() {
                    Ok(v)
                } else {
                    Err(FormulaError::NonFinite)
                }
            })
            .map_err(|e| FormulaEvaluationError {
                formula: self.source.clone(),
                source: e,
            })?;
        Ok(value)
    }
}

/// Parses and evaluates `formula` for a single cell.
pub fn evaluate(
    formula: &str,
    period_index: i64,
    product: &Product,
    account: &Account,
) -> Result<f64, FormulaEvaluationError> {
    Formula::parse(formula)?.evaluate(&FormulaContext::new(period_index, product, account))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product {
            ext_id: "P1".to_string(),
            initial_value: Some(100.0),
            prd_custom_value1: Some(2.0),
            prd_custom_value2: None,
            prd_custom_value3: Some(0.5),
        }
    }

    fn account() -> Account {
        Account {
            ext_id: "A1".to_string(),
            weight: 100.0,
            acc_custom_value1: Some(10.0),
            acc_custom_value2: None,
            acc_custom_value3: None,
        }
    }

    fn eval(formula: &str, period: i64) -> Result<f64, FormulaEvaluationError> {
        evaluate(formula, period, &product(), &account())
    }

    #[test]
    fn test_initial_value_plus_period() {
        assert_eq!(eval("initialValue + periodIndex", 3).unwrap(), 103.0);
    }

    #[test]
    fn test_precedence_and_grouping() {
        assert_eq!(eval("1 + 2 * 3", 0).unwrap(), 7.0);
        assert_eq!(eval("(1 + 2) * 3", 0).unwrap(), 9.0);
        assert_eq!(eval("10 - 4 - 3", 0).unwrap(), 3.0);
        assert_eq!(eval("24 / 4 / 2", 0).unwrap(), 3.0);
        assert_eq!(eval("7 / 2", 0).unwrap(), 3.5);
    }

    #[test]
    fn test_unary_minus_and_negative_period() {
        assert_eq!(eval("-initialValue", 0).unwrap(), -100.0);
        assert_eq!(eval("initialValue - -periodIndex", -2).unwrap(), 98.0);
        assert_eq!(eval("2 * -(3 + 1)", 0).unwrap(), -8.0);
    }

    #[test]
    fn test_custom_values() {
        let value = eval(
            "initialValue * prdCustomValue1 + accCustomValue1 * periodIndex + prdCustomValue3",
            4,
        )
        .unwrap();
        assert_eq!(value, 240.5);
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(eval("1.5e2 + .5", 0).unwrap(), 150.5);
        assert_eq!(eval("2E-1", 0).unwrap(), 0.2);
    }

    #[test]
    fn test_division_by_zero() {
        let err = eval("initialValue / 0", 0).unwrap_err();
        assert_eq!(err.formula, "initialValue / 0");
        assert_eq!(err.source, FormulaError::DivisionByZero);

        let err = eval("initialValue / periodIndex", 0).unwrap_err();
        assert_eq!(err.source, FormulaError::DivisionByZero);
    }

    #[test]
    fn test_missing_custom_value() {
        let err = eval("prdCustomValue2 * 2", 0).unwrap_err();
        assert_eq!(
            err.source,
            FormulaError::MissingCatalogField("prdCustomValue2".to_string())
        );
    }

    #[test]
    fn test_missing_initial_value() {
        let mut p = product();
        p.initial_value = None;
        let err = evaluate("initialValue", 0, &p, &account()).unwrap_err();
        assert_eq!(
            err.source,
            FormulaError::MissingCatalogField("initialValue".to_string())
        );
        // Formulas that never mention it still evaluate.
        assert_eq!(evaluate("periodIndex * 2", 3, &p, &account()).unwrap(), 6.0);
    }

    #[test]
    fn test_identifiers_match_whole_tokens() {
        let err = eval("initialValue2 + 1", 0).unwrap_err();
        assert_eq!(
            err.source,
            FormulaError::UnknownVariable("initialValue2".to_string())
        );

        let err = eval("myperiodIndex", 0).unwrap_err();
        assert_eq!(
            err.source,
            FormulaError::UnknownVariable("myperiodIndex".to_string())
        );
    }

    #[test]
    fn test_malformed_formulas() {
        for formula in ["", "   ", "1 +", "(1 + 2", "1 2", "3 ** 2", "1 + )", "abs(1)", "1 % 2"] {
            let result = eval(formula, 0);
            assert!(result.is_err(), "'{}' should fail", formula);
        }
    }

    #[test]
    fn test_variables_listed_once() {
        let formula = Formula::parse("initialValue * periodIndex + initialValue").unwrap();
        assert_eq!(
            formula.variables(),
            vec![Variable::InitialValue, Variable::PeriodIndex]
        );
        assert!(Formula::parse("2 * 3").unwrap().variables().is_empty());
    }

    #[test]
    fn test_deep_nesting_is_a_parse_error() {
        let parens = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        let minus = format!("{}1", "-".repeat(10_000));
        let plus = format!("{}1", "+".repeat(10_000));
        let chain = vec!["1"; 10_000].join(" + ");

        for formula in [&parens, &minus, &plus, &chain] {
            let err = eval(formula, 0).unwrap_err();
            assert!(
                matches!(&err.source, FormulaError::Parse { message, .. } if message.contains("nested too deeply")),
                "unexpected error: {}",
                err
            );
        }
    }

    #[test]
    fn test_moderate_nesting_still_evaluates() {
        let parens = format!("{}initialValue{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(eval(&parens, 0).unwrap(), 100.0);

        let minus = format!("{}periodIndex", "-".repeat(100));
        assert_eq!(eval(&minus, 3).unwrap(), 3.0);

        let chain = vec!["periodIndex"; 100].join(" + ");
        assert_eq!(eval(&chain, 2).unwrap(), 200.0);
    }
}
