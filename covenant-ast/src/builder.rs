#![forbid(unsafe_code)]

use crate::{
    span, BinOp, Binding, ColumnBinding, Expr, ExprId, ExprKind, Function, Ident, Literal,
    Param, PrimType, RowWrite, Spanned, UnaryOp,
};

/// Anything a `Var` node can point at.
pub trait Bindable {
    fn binding_id(&self) -> ExprId;
    fn binding_name(&self) -> &str;
    fn binding_ty(&self) -> Option<&PrimType>;
}

impl Bindable for Param {
    fn binding_id(&self) -> ExprId {
        self.id
    }
    fn binding_name(&self) -> &str {
        &self.name.node
    }
    fn binding_ty(&self) -> Option<&PrimType> {
        self.ty.as_ref()
    }
}

impl Bindable for Binding {
    fn binding_id(&self) -> ExprId {
        self.id
    }
    fn binding_name(&self) -> &str {
        &self.name.node
    }
    fn binding_ty(&self) -> Option<&PrimType> {
        self.ty.as_ref()
    }
}

impl Bindable for ColumnBinding {
    fn binding_id(&self) -> ExprId {
        self.id
    }
    fn binding_name(&self) -> &str {
        &self.name.node
    }
    fn binding_ty(&self) -> Option<&PrimType> {
        self.ty.as_ref()
    }
}

/// Hands out fresh identities while assembling typed trees by hand.
///
/// Embedders that bridge from their own type checker and tests both use it;
/// every node gets a one-byte span at its identity so diagnostics stay
/// distinguishable.
#[derive(Debug, Default)]
pub struct AstBuilder {
    next: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_id(&mut self) -> ExprId {
        self.next += 1;
        ExprId(self.next)
    }

    fn ident(&self, id: ExprId, name: &str) -> Ident {
        Spanned::new(span(id.0 as usize, 1), name.to_string())
    }

    fn node(&mut self, ty: Option<PrimType>, kind: ExprKind) -> Expr {
        let id = self.fresh_id();
        Expr {
            id,
            span: span(id.0 as usize, 1),
            ty,
            kind,
        }
    }

    pub fn param(&mut self, name: &str, ty: PrimType) -> Param {
        let id = self.fresh_id();
        Param {
            id,
            name: self.ident(id, name),
            ty: Some(ty),
        }
    }

    pub fn literal(&mut self, lit: Literal) -> Expr {
        let ty = match &lit {
            Literal::Bool(_) => PrimType::Bool,
            Literal::Integer(_) => PrimType::Integer,
            Literal::Decimal { .. } => PrimType::Decimal,
            Literal::String(_) => PrimType::String,
            Literal::Time(_) => PrimType::Time,
        };
        self.node(Some(ty), ExprKind::Literal(lit))
    }

    pub fn int(&mut self, n: i128) -> Expr {
        self.literal(Literal::Integer(n))
    }

    pub fn decimal(&mut self, mantissa: i128, scale: u32) -> Expr {
        self.literal(Literal::Decimal { mantissa, scale })
    }

    pub fn boolean(&mut self, b: bool) -> Expr {
        self.literal(Literal::Bool(b))
    }

    pub fn string(&mut self, s: &str) -> Expr {
        self.literal(Literal::String(s.to_string()))
    }

    pub fn time(&mut self, iso: &str) -> Expr {
        self.literal(Literal::Time(iso.to_string()))
    }

    pub fn var(&mut self, target: &impl Bindable) -> Expr {
        let id = self.fresh_id();
        let name = self.ident(id, target.binding_name());
        Expr {
            id,
            span: span(id.0 as usize, 1),
            ty: target.binding_ty().cloned(),
            kind: ExprKind::Var {
                name,
                binding: target.binding_id(),
            },
        }
    }

    pub fn binary(&mut self, op: BinOp, left: Expr, right: Expr) -> Expr {
        let ty = if op.is_comparison() || matches!(op, BinOp::And | BinOp::Or) {
            Some(PrimType::Bool)
        } else {
            left.ty.clone()
        };
        self.node(
            ty,
            ExprKind::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
        )
    }

    pub fn not(&mut self, expr: Expr) -> Expr {
        self.node(
            Some(PrimType::Bool),
            ExprKind::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            },
        )
    }

    pub fn if_(&mut self, cond: Expr, then_branch: Expr, else_branch: Expr) -> Expr {
        let ty = then_branch.ty.clone();
        self.node(
            ty,
            ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
        )
    }

    pub fn enforce(&mut self, cond: Expr, message: &str) -> Expr {
        self.node(
            Some(PrimType::Bool),
            ExprKind::Enforce {
                cond: Box::new(cond),
                message: message.to_string(),
            },
        )
    }

    pub fn enforce_keyset(&mut self, keyset: &str) -> Expr {
        self.node(
            Some(PrimType::Bool),
            ExprKind::EnforceKeyset {
                keyset: keyset.to_string(),
            },
        )
    }

    pub fn binding(&mut self, name: &str, ty: Option<PrimType>, value: Expr) -> Binding {
        let id = self.fresh_id();
        Binding {
            id,
            name: self.ident(id, name),
            ty,
            value,
        }
    }

    pub fn let_(&mut self, bindings: Vec<Binding>, body: Vec<Expr>) -> Expr {
        let ty = body.last().and_then(|e| e.ty.clone());
        self.node(ty, ExprKind::Let { bindings, body })
    }

    pub fn column(&mut self, column: &str, name: &str, ty: Option<PrimType>) -> ColumnBinding {
        let id = self.fresh_id();
        ColumnBinding {
            id,
            column: self.ident(id, column),
            name: self.ident(id, name),
            ty,
        }
    }

    pub fn with_read(
        &mut self,
        table: &str,
        key: Expr,
        columns: Vec<ColumnBinding>,
        body: Vec<Expr>,
    ) -> Expr {
        let id = self.fresh_id();
        let table = self.ident(id, table);
        let ty = body.last().and_then(|e| e.ty.clone());
        self.node(
            ty,
            ExprKind::WithRead {
                table,
                key: Box::new(key),
                columns,
                body,
            },
        )
    }

    pub fn read(&mut self, table: &str, key: Expr) -> Expr {
        let id = self.fresh_id();
        let table = self.ident(id, table);
        self.node(
            Some(PrimType::Object(None)),
            ExprKind::Read {
                table,
                key: Box::new(key),
            },
        )
    }

    fn row_write(&mut self, table: &str, key: Expr, fields: Vec<(&str, Expr)>) -> RowWrite {
        let id = self.fresh_id();
        RowWrite {
            table: self.ident(id, table),
            key: Box::new(key),
            fields: fields
                .into_iter()
                .map(|(name, value)| (self.ident(id, name), value))
                .collect(),
        }
    }

    pub fn insert(&mut self, table: &str, key: Expr, fields: Vec<(&str, Expr)>) -> Expr {
        let write = self.row_write(table, key, fields);
        self.node(Some(PrimType::String), ExprKind::Insert(write))
    }

    pub fn update(&mut self, table: &str, key: Expr, fields: Vec<(&str, Expr)>) -> Expr {
        let write = self.row_write(table, key, fields);
        self.node(Some(PrimType::String), ExprKind::Update(write))
    }

    pub fn call(&mut self, callee: &str, args: Vec<Expr>, ty: Option<PrimType>) -> Expr {
        let id = self.fresh_id();
        let callee = self.ident(id, callee);
        self.node(ty, ExprKind::Call { callee, args })
    }

    pub fn function(&mut self, name: &str, params: Vec<Param>, body: Vec<Expr>) -> Function {
        let id = self.fresh_id();
        Function {
            span: span(id.0 as usize, 1),
            name: self.ident(id, name),
            params,
            body,
        }
    }
}
