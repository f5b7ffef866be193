//! Band-maths expressions for pixel masks and derived features
//!
//! Expressions are parsed once with pest, identifiers are bound to value
//! indices at compile time, and the resulting tree is evaluated per pixel (or
//! per bin) against a plain `&[f64]` slice.
//!
//! ```text
//! chl > 0 && !nan(sst)
//! (a - b) / max(a + b, 1e-6)
//! ```
//!
//! Boolean results are represented as `1.0` / `0.0`; `NaN` counts as false.

use crate::errors::{BinningError, Result};
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::sync::OnceLock;

#[derive(Parser)]
#[grammar = "expr.pest"]
struct ExpressionParser;

fn pratt() -> &'static PrattParser<Rule> {
    static PRATT: OnceLock<PrattParser<Rule>> = OnceLock::new();
    PRATT.get_or_init(|| {
        PrattParser::new()
            .op(Op::infix(Rule::or_op, Assoc::Left))
            .op(Op::infix(Rule::and_op, Assoc::Left))
            .op(Op::infix(Rule::eq, Assoc::Left) | Op::infix(Rule::ne, Assoc::Left))
            .op(Op::infix(Rule::lt, Assoc::Left)
                | Op::infix(Rule::le, Assoc::Left)
                | Op::infix(Rule::gt, Assoc::Left)
                | Op::infix(Rule::ge, Assoc::Left))
            .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
            .op(Op::infix(Rule::mul, Assoc::Left) | Op::infix(Rule::div, Assoc::Left))
            .op(Op::prefix(Rule::neg) | Op::prefix(Rule::not))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Abs,
    Sqrt,
    Exp,
    Log,
    Log10,
    Min,
    Max,
    IsNan,
}

impl Function {
    fn lookup(name: &str) -> Option<(Self, usize)> {
        let found = match name {
            "abs" => (Self::Abs, 1),
            "sqrt" => (Self::Sqrt, 1),
            "exp" => (Self::Exp, 1),
            "log" => (Self::Log, 1),
            "log10" => (Self::Log10, 1),
            "min" => (Self::Min, 2),
            "max" => (Self::Max, 2),
            "nan" => (Self::IsNan, 1),
            _ => return None,
        };
        Some(found)
    }
}

/// Expression tree; `V` is an identifier name before binding and a value
/// index afterwards.
#[derive(Debug, Clone, PartialEq)]
enum Node<V> {
    Const(f64),
    Var(V),
    Unary(UnaryOp, Box<Node<V>>),
    Binary(BinaryOp, Box<Node<V>>, Box<Node<V>>),
    Call(Function, Vec<Node<V>>),
}

impl Node<String> {
    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Const(_) => {}
            Self::Var(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name.as_str());
                }
            }
            Self::Unary(_, operand) => operand.collect_identifiers(out),
            Self::Binary(_, lhs, rhs) => {
                lhs.collect_identifiers(out);
                rhs.collect_identifiers(out);
            }
            Self::Call(_, args) => args.iter().for_each(|a| a.collect_identifiers(out)),
        }
    }

    fn bind(self, names: &[String], source: &str) -> Result<Node<usize>> {
        let bound = match self {
            Self::Const(v) => Node::Const(v),
            Self::Var(name) => match names.iter().position(|n| *n == name) {
                Some(index) => Node::Var(index),
                None => {
                    return Err(BinningError::expression(
                        source,
                        format!("unknown symbol '{name}'"),
                    ))
                }
            },
            Self::Unary(op, operand) => Node::Unary(op, Box::new(operand.bind(names, source)?)),
            Self::Binary(op, lhs, rhs) => Node::Binary(
                op,
                Box::new(lhs.bind(names, source)?),
                Box::new(rhs.bind(names, source)?),
            ),
            Self::Call(function, args) => Node::Call(
                function,
                args.into_iter()
                    .map(|a| a.bind(names, source))
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        Ok(bound)
    }
}

fn truthy(value: f64) -> bool {
    !value.is_nan() && value != 0.0
}

fn from_bool(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl Node<usize> {
    fn eval(&self, values: &[f64]) -> f64 {
        match self {
            Self::Const(v) => *v,
            Self::Var(index) => values.get(*index).copied().unwrap_or(f64::NAN),
            Self::Unary(UnaryOp::Neg, operand) => -operand.eval(values),
            Self::Unary(UnaryOp::Not, operand) => from_bool(!truthy(operand.eval(values))),
            Self::Binary(op, lhs, rhs) => {
                let a = lhs.eval(values);
                let b = || rhs.eval(values);
                match op {
                    BinaryOp::And => from_bool(truthy(a) && truthy(b())),
                    BinaryOp::Or => from_bool(truthy(a) || truthy(b())),
                    BinaryOp::Eq => from_bool(a == b()),
                    BinaryOp::Ne => from_bool(a != b()),
                    BinaryOp::Lt => from_bool(a < b()),
                    BinaryOp::Le => from_bool(a <= b()),
                    BinaryOp::Gt => from_bool(a > b()),
                    BinaryOp::Ge => from_bool(a >= b()),
                    BinaryOp::Add => a + b(),
                    BinaryOp::Sub => a - b(),
                    BinaryOp::Mul => a * b(),
                    BinaryOp::Div => a / b(),
                }
            }
            Self::Call(function, args) => {
                let arg = |i: usize| args.get(i).map_or(f64::NAN, |a| a.eval(values));
                match function {
                    Function::Abs => arg(0).abs(),
                    Function::Sqrt => arg(0).sqrt(),
                    Function::Exp => arg(0).exp(),
                    Function::Log => arg(0).ln(),
                    Function::Log10 => arg(0).log10(),
                    Function::Min => arg(0).min(arg(1)),
                    Function::Max => arg(0).max(arg(1)),
                    Function::IsNan => from_bool(arg(0).is_nan()),
                }
            }
        }
    }
}

fn syntax_error(source: &str, error: &pest::error::Error<Rule>) -> BinningError {
    let (line, column) = match error.line_col {
        pest::error::LineColLocation::Pos((l, c)) | pest::error::LineColLocation::Span((l, c), _) => (l, c),
    };
    BinningError::expression(source, format!("syntax error at line {line}, column {column}"))
}

fn parse(source: &str) -> Result<Node<String>> {
    let mut pairs = ExpressionParser::parse(Rule::expression, source)
        .map_err(|e| syntax_error(source, &e))?;
    let expression = pairs
        .next()
        .ok_or_else(|| BinningError::expression(source, "empty expression"))?;
    let expr = expression
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| BinningError::expression(source, "empty expression"))?;
    build(expr.into_inner(), source)
}

fn build(pairs: Pairs<'_, Rule>, source: &str) -> Result<Node<String>> {
    pratt()
        .map_primary(|primary| build_primary(primary, source))
        .map_prefix(|op, operand| {
            let op = match op.as_rule() {
                Rule::neg => UnaryOp::Neg,
                _ => UnaryOp::Not,
            };
            Ok(Node::Unary(op, Box::new(operand?)))
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::or_op => BinaryOp::Or,
                Rule::and_op => BinaryOp::And,
                Rule::eq => BinaryOp::Eq,
                Rule::ne => BinaryOp::Ne,
                Rule::lt => BinaryOp::Lt,
                Rule::le => BinaryOp::Le,
                Rule::gt => BinaryOp::Gt,
                Rule::ge => BinaryOp::Ge,
                Rule::add => BinaryOp::Add,
                Rule::sub => BinaryOp::Sub,
                Rule::mul => BinaryOp::Mul,
                _ => BinaryOp::Div,
            };
            Ok(Node::Binary(op, Box::new(lhs?), Box::new(rhs?)))
        })
        .parse(pairs)
}

fn build_primary(pair: Pair<'_, Rule>, source: &str) -> Result<Node<String>> {
    match pair.as_rule() {
        Rule::number => pair
            .as_str()
            .parse::<f64>()
            .map(Node::Const)
            .map_err(|e| BinningError::expression(source, format!("bad number '{}': {e}", pair.as_str()))),
        Rule::boolean => Ok(Node::Const(from_bool(pair.as_str() == "true"))),
        Rule::nan_lit => Ok(Node::Const(f64::NAN)),
        Rule::identifier => Ok(Node::Var(pair.as_str().to_string())),
        Rule::expr => build(pair.into_inner(), source),
        Rule::function_call => {
            let mut inner = pair.into_inner();
            let name = inner
                .next()
                .map(|p| p.as_str().to_string())
                .ok_or_else(|| BinningError::expression(source, "missing function name"))?;
            let (function, arity) = Function::lookup(&name)
                .ok_or_else(|| BinningError::expression(source, format!("unknown function '{name}'")))?;
            let args = inner
                .map(|arg| build(arg.into_inner(), source))
                .collect::<Result<Vec<_>>>()?;
            if args.len() != arity {
                return Err(BinningError::expression(
                    source,
                    format!("function '{name}' expects {arity} argument(s), got {}", args.len()),
                ));
            }
            Ok(Node::Call(function, args))
        }
        rule => Err(BinningError::expression(source, format!("unexpected token {rule:?}"))),
    }
}

/// Names referenced by an expression, in first-use order
///
/// # Errors
///
/// Returns an expression error if the source does not parse.
pub fn identifiers(source: &str) -> Result<Vec<String>> {
    let tree = parse(source)?;
    let mut names = Vec::new();
    tree.collect_identifiers(&mut names);
    Ok(names.into_iter().map(str::to_string).collect())
}

/// A parsed expression bound to a list of value names
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    root: Node<usize>,
}

impl CompiledExpression {
    /// Parse `source` and resolve its identifiers against `names`
    ///
    /// # Errors
    ///
    /// Returns [`BinningError::Expression`] for syntax errors, unknown
    /// functions, wrong argument counts and unknown identifiers.
    pub fn compile(source: &str, names: &[String]) -> Result<Self> {
        let root = parse(source)?.bind(names, source)?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against values ordered like the names given to `compile`
    #[must_use]
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.root.eval(values)
    }

    /// Evaluate as a condition; `NaN` and `0` are false
    #[must_use]
    pub fn evaluate_bool(&self, values: &[f64]) -> bool {
        truthy(self.evaluate(values))
    }
}
