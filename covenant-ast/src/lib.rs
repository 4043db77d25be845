#![forbid(unsafe_code)]

//! Typed contract syntax as produced by type inference.
//!
//! Every node carries a stable identity, the resolved primitive type (when
//! inference produced one) and a span into the original source.

use std::fmt;

use miette::SourceSpan;

mod builder;

pub use builder::{AstBuilder, Bindable};

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub type Ident = Spanned<String>;

/// Identity assigned by type inference. Unique within one module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(pub u32);

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrimType {
    Integer,
    Decimal,
    Bool,
    String,
    Time,
    Keyset,
    Guard,
    Unit,
    /// Object with an optional schema name.
    Object(Option<String>),
    Table(String),
    List(Box<PrimType>),
}

impl PrimType {
    pub fn display(&self) -> String {
        match self {
            PrimType::Integer => "integer".to_string(),
            PrimType::Decimal => "decimal".to_string(),
            PrimType::Bool => "bool".to_string(),
            PrimType::String => "string".to_string(),
            PrimType::Time => "time".to_string(),
            PrimType::Keyset => "keyset".to_string(),
            PrimType::Guard => "guard".to_string(),
            PrimType::Unit => "unit".to_string(),
            PrimType::Object(None) => "object".to_string(),
            PrimType::Object(Some(schema)) => format!("object{{{schema}}}"),
            PrimType::Table(schema) => format!("table{{{schema}}}"),
            PrimType::List(elem) => format!("[{}]", elem.display()),
        }
    }
}

/// A contract function after type inference.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub span: Span,
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub id: ExprId,
    pub name: Ident,
    pub ty: Option<PrimType>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub span: Span,
    pub ty: Option<PrimType>,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Bool(bool),
    Integer(i128),
    /// `mantissa / 10^scale`
    Decimal { mantissa: i128, scale: u32 },
    String(String),
    /// ISO-8601 text as written in source.
    Time(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Integer(n) => write!(f, "{n}"),
            Literal::Decimal { mantissa, scale } => {
                f.write_str(&format_decimal(*mantissa, *scale))
            }
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::Time(t) => write!(f, "(time {t:?})"),
        }
    }
}

/// Renders `mantissa / 10^scale` with at least one fractional digit.
pub fn format_decimal(mantissa: i128, scale: u32) -> String {
    let sign = if mantissa < 0 { "-" } else { "" };
    format!("{sign}{}", format_magnitude(mantissa.unsigned_abs(), scale))
}

/// Unsigned form of [`format_decimal`].
pub fn format_magnitude(magnitude: u128, scale: u32) -> String {
    let digits = magnitude.to_string();
    let scale = scale as usize;
    if scale == 0 {
        return format!("{digits}.0");
    }
    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    format!("{int_part}.{frac_part}")
}

#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub id: ExprId,
    pub name: Ident,
    pub ty: Option<PrimType>,
    pub value: Expr,
}

/// `{ column := name }` inside `with-read`.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnBinding {
    pub id: ExprId,
    pub column: Ident,
    pub name: Ident,
    pub ty: Option<PrimType>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowWrite {
    pub table: Ident,
    pub key: Box<Expr>,
    pub fields: Vec<(Ident, Expr)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// Reference to a parameter, `let` binding or `with-read` column binding.
    Var {
        name: Ident,
        binding: ExprId,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    /// `(let ((a ..) (b ..)) body..)`; bindings are introduced in order.
    Let {
        bindings: Vec<Binding>,
        body: Vec<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Enforce {
        cond: Box<Expr>,
        message: String,
    },
    EnforceKeyset {
        keyset: String,
    },
    Insert(RowWrite),
    Update(RowWrite),
    WithRead {
        table: Ident,
        key: Box<Expr>,
        columns: Vec<ColumnBinding>,
        body: Vec<Expr>,
    },
    /// Whole-row `read` without per-column projection.
    Read {
        table: Ident,
        key: Box<Expr>,
    },
    Object(Vec<(Ident, Expr)>),
    TableRef(Ident),
    /// Any other native or user function call.
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
}

impl ExprKind {
    /// Short human-readable description of the node shape.
    pub fn shape(&self) -> String {
        match self {
            ExprKind::Literal(Literal::Time(_)) => "time literal".to_string(),
            ExprKind::Literal(_) => "literal".to_string(),
            ExprKind::Var { name, .. } => format!("variable `{}`", name.node),
            ExprKind::Unary { op, .. } => format!("application of `{}`", op.symbol()),
            ExprKind::Binary { op, .. } => format!("application of `{}`", op.symbol()),
            ExprKind::Let { .. } => "let binding group".to_string(),
            ExprKind::If { .. } => "if".to_string(),
            ExprKind::Enforce { .. } => "enforce".to_string(),
            ExprKind::EnforceKeyset { .. } => "enforce-keyset".to_string(),
            ExprKind::Insert(w) => format!("insert into `{}`", w.table.node),
            ExprKind::Update(w) => format!("update of `{}`", w.table.node),
            ExprKind::WithRead { table, .. } => format!("with-read of `{}`", table.node),
            ExprKind::Read { table, .. } => format!("read of `{}`", table.node),
            ExprKind::Object(_) => "object literal".to_string(),
            ExprKind::TableRef(t) => format!("table reference `{}`", t.node),
            ExprKind::Call { callee, .. } => format!("call of `{}`", callee.node),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "mod",
            BinOp::Eq => "=",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }
}
