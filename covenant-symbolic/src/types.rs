#![forbid(unsafe_code)]

use std::fmt;

use covenant_ast::{Expr, PrimType};
use serde::Serialize;

/// The primitive types that have a faithful solver representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SymbolicType {
    Integer,
    Decimal,
    Boolean,
    String,
}

/// Solver sort literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Sort {
    Int,
    Real,
    Bool,
    String,
}

impl Sort {
    pub fn as_smtlib(self) -> &'static str {
        match self {
            Sort::Int => "Int",
            Sort::Real => "Real",
            Sort::Bool => "Bool",
            Sort::String => "String",
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_smtlib())
    }
}

impl SymbolicType {
    pub fn sort(self) -> Sort {
        sort_of(self)
    }

    pub fn to_prim(self) -> PrimType {
        match self {
            SymbolicType::Integer => PrimType::Integer,
            SymbolicType::Decimal => PrimType::Decimal,
            SymbolicType::Boolean => PrimType::Bool,
            SymbolicType::String => PrimType::String,
        }
    }
}

pub fn classify_type(ty: &PrimType) -> Option<SymbolicType> {
    match ty {
        PrimType::Integer => Some(SymbolicType::Integer),
        PrimType::Decimal => Some(SymbolicType::Decimal),
        PrimType::Bool => Some(SymbolicType::Boolean),
        PrimType::String => Some(SymbolicType::String),
        PrimType::Time
        | PrimType::Keyset
        | PrimType::Guard
        | PrimType::Unit
        | PrimType::Object(_)
        | PrimType::Table(_)
        | PrimType::List(_) => None,
    }
}

/// Symbolic type of an expression's resolved type, if it has one.
pub fn classify(expr: &Expr) -> Option<SymbolicType> {
    expr.ty.as_ref().and_then(classify_type)
}

pub fn sort_of(ty: SymbolicType) -> Sort {
    match ty {
        SymbolicType::Integer => Sort::Int,
        SymbolicType::Boolean => Sort::Bool,
        SymbolicType::Decimal => Sort::Real,
        SymbolicType::String => Sort::String,
    }
}
