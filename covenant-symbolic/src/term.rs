#![forbid(unsafe_code)]

//! Translation of pure contract expressions into SMT-LIB terms.

use std::fmt;

use covenant_ast::{format_decimal, format_magnitude, BinOp, Expr, ExprKind, Literal, Span, UnaryOp};

use crate::env::{SymbolicEnvironment, SymbolicName};
use crate::error::AnalysisError;
use crate::types::{classify, SymbolicType};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    Int(i128),
    Real { mantissa: i128, scale: u32 },
    Bool(bool),
    Str(String),
    Symbol(SymbolicName),
    App { op: &'static str, args: Vec<Term> },
}

impl Term {
    pub fn app(op: &'static str, args: Vec<Term>) -> Term {
        Term::App { op, args }
    }

    pub fn equals(lhs: Term, rhs: Term) -> Term {
        Term::app("=", vec![lhs, rhs])
    }
}

/// Boolean complement of `term`.
pub fn negate(term: Term) -> Term {
    Term::app("not", vec![term])
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Int(n) if *n < 0 => write!(f, "(- {})", n.unsigned_abs()),
            Term::Int(n) => write!(f, "{n}"),
            Term::Real { mantissa, scale } if *mantissa < 0 => {
                write!(f, "(- {})", format_magnitude(mantissa.unsigned_abs(), *scale))
            }
            Term::Real { mantissa, scale } => f.write_str(&format_decimal(*mantissa, *scale)),
            Term::Bool(b) => write!(f, "{b}"),
            Term::Str(s) => write_string_literal(f, s),
            Term::Symbol(name) => write!(f, "{name}"),
            Term::App { op, args } => {
                write!(f, "({op}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// SMT-LIB 2.6 string literal: `"` doubled, everything outside printable
/// ASCII (and `\`, which would start an escape) as `\u{..}`.
fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\"\"")?,
            '\\' => f.write_str("\\u{5c}")?,
            ' '..='~' => write!(f, "{c}")?,
            _ => write!(f, "\\u{{{:x}}}", u32::from(c))?,
        }
    }
    f.write_str("\"")
}

/// Builds the solver term for a pure expression.
///
/// Only literals, tracked variables, a single operator over two
/// variable/literal operands, and logical connectives over nested pure
/// expressions are accepted. Anything else is rejected as a whole.
pub fn build_term(expr: &Expr, env: &SymbolicEnvironment) -> Result<Term, AnalysisError> {
    match &expr.kind {
        ExprKind::Literal(lit) => literal_term(lit, expr.span),
        ExprKind::Var { .. } => variable_term(expr, env).map(|(t, _)| t),
        ExprKind::Binary { left, op, right } => {
            if is_atomic(left) && is_atomic(right) && !(is_literal(left) && is_literal(right)) {
                if let Some(smt) = operator(*op) {
                    return operator_term(smt, *op, left, right, expr.span, env);
                }
            }
            match op {
                BinOp::Eq | BinOp::And | BinOp::Or => {
                    let smt = op.symbol();
                    let wrap = |e: AnalysisError| AnalysisError::wrap(smt, expr.span)(e);
                    let l = build_term(left, env).map_err(wrap)?;
                    let r = build_term(right, env).map_err(wrap)?;
                    Ok(Term::app(connective(*op), vec![l, r]))
                }
                _ => Err(unsupported(expr)),
            }
        }
        ExprKind::Unary {
            op: UnaryOp::Not,
            expr: inner,
        } => {
            let t = build_term(inner, env).map_err(AnalysisError::wrap("not", expr.span))?;
            Ok(negate(t))
        }
        _ => Err(unsupported(expr)),
    }
}

fn unsupported(expr: &Expr) -> AnalysisError {
    AnalysisError::UnsupportedConstruct {
        shape: expr.kind.shape(),
        span: expr.span,
    }
}

fn is_literal(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(_))
}

fn is_atomic(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(_) | ExprKind::Var { .. })
}

fn operator(op: BinOp) -> Option<&'static str> {
    match op {
        BinOp::Gt => Some(">"),
        BinOp::Lt => Some("<"),
        BinOp::Ge => Some(">="),
        BinOp::Le => Some("<="),
        BinOp::Eq => Some("="),
        BinOp::Add => Some("+"),
        BinOp::Sub => Some("-"),
        BinOp::Mul => Some("*"),
        BinOp::Div => Some("/"),
        BinOp::Mod | BinOp::Ne | BinOp::And | BinOp::Or => None,
    }
}

fn connective(op: BinOp) -> &'static str {
    match op {
        BinOp::And => "and",
        BinOp::Or => "or",
        _ => "=",
    }
}

fn operator_term(
    smt: &'static str,
    op: BinOp,
    left: &Expr,
    right: &Expr,
    span: Span,
    env: &SymbolicEnvironment,
) -> Result<Term, AnalysisError> {
    let (l, lty) = operand_term(left, env).map_err(AnalysisError::wrap(smt, span))?;
    let (r, rty) = operand_term(right, env).map_err(AnalysisError::wrap(smt, span))?;

    // Integer division is `div`; `/` is real division.
    let smt = match (op, lty, rty) {
        (BinOp::Div, Some(SymbolicType::Integer), Some(SymbolicType::Integer)) => "div",
        _ => smt,
    };
    Ok(Term::app(smt, vec![l, r]))
}

fn operand_term(
    expr: &Expr,
    env: &SymbolicEnvironment,
) -> Result<(Term, Option<SymbolicType>), AnalysisError> {
    match &expr.kind {
        ExprKind::Var { .. } => variable_term(expr, env),
        ExprKind::Literal(lit) => Ok((literal_term(lit, expr.span)?, classify(expr))),
        _ => Err(unsupported(expr)),
    }
}

fn literal_term(lit: &Literal, span: Span) -> Result<Term, AnalysisError> {
    match lit {
        Literal::Bool(b) => Ok(Term::Bool(*b)),
        Literal::Integer(n) => Ok(Term::Int(*n)),
        Literal::Decimal { mantissa, scale } => Ok(Term::Real {
            mantissa: *mantissa,
            scale: *scale,
        }),
        Literal::String(s) => Ok(Term::Str(s.clone())),
        Literal::Time(t) => Err(AnalysisError::UnsupportedType {
            what: format!("time literal {t:?}"),
            span,
        }),
    }
}

fn variable_term(
    expr: &Expr,
    env: &SymbolicEnvironment,
) -> Result<(Term, Option<SymbolicType>), AnalysisError> {
    let ExprKind::Var { name, binding } = &expr.kind else {
        return Err(unsupported(expr));
    };
    let Some(var) = env.lookup(*binding) else {
        return Err(AnalysisError::UnresolvedVariable {
            name: name.node.clone(),
            span: expr.span,
        });
    };
    match var.status.reason() {
        None => Ok((var.term(), var.ty)),
        Some(reason) => Err(AnalysisError::UntrackedVariable {
            name: name.node.clone(),
            reason: reason.to_string(),
            span: expr.span,
        }),
    }
}
