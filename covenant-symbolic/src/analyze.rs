#![forbid(unsafe_code)]

//! Recursive descent over a function body, one proof tree node per statement.

use std::fmt;

use covenant_ast::{
    ColumnBinding, Expr, ExprKind, Function, Ident, Literal, Param, PrimType, RowWrite, Span,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::env::{tracking_for, SymbolicEnvironment, SymbolicName, TrackingStatus};
use crate::error::AnalysisError;
use crate::options::AnalysisOptions;
use crate::term::{build_term, negate, Term};
use crate::tree::ProofTree;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// A literal or variable that is not the last statement has no effect.
    DiscardedValue { shape: String, offset: usize },
    /// A binding with a representable type whose definition was not.
    LostTrack { name: SymbolicName, reason: String },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisWarning::DiscardedValue { shape, offset } => {
                write!(f, "value of {shape} at offset {offset} is discarded")
            }
            AnalysisWarning::LostTrack { name, reason } => {
                write!(f, "lost track of `{name}`: {reason}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Analysis {
    pub function: String,
    pub tree: ProofTree,
    pub warnings: Vec<AnalysisWarning>,
}

#[derive(Clone, Copy)]
enum WriteKind {
    Insert,
    Update,
}

impl WriteKind {
    fn as_str(self) -> &'static str {
        match self {
            WriteKind::Insert => "insert",
            WriteKind::Update => "update",
        }
    }
}

/// Work item on one path: a statement, or the end of a binding group's scope.
#[derive(Clone)]
enum Step<'a> {
    Stmt(&'a Expr),
    CloseScope(Vec<&'a str>),
}

/// Nothing but scope exits remain.
fn is_final(rest: &[Step<'_>]) -> bool {
    rest.iter().all(|step| matches!(step, Step::CloseScope(_)))
}

/// `body`, then the scope exit for `names`, then `rest`.
fn scoped_continuation<'a>(
    body: &'a [Expr],
    names: Vec<&'a str>,
    rest: &[Step<'a>],
) -> Vec<Step<'a>> {
    body.iter()
        .map(Step::Stmt)
        .chain(std::iter::once(Step::CloseScope(names)))
        .chain(rest.iter().cloned())
        .collect()
}

pub struct PathAnalyzer<'o> {
    options: &'o AnalysisOptions,
    warnings: Vec<AnalysisWarning>,
}

impl<'o> PathAnalyzer<'o> {
    pub fn new(options: &'o AnalysisOptions) -> Self {
        Self {
            options,
            warnings: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[AnalysisWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<AnalysisWarning> {
        self.warnings
    }

    pub fn analyze(&mut self, statements: &[Expr], env: SymbolicEnvironment) -> ProofTree {
        let seq: Vec<Step<'_>> = statements.iter().map(Step::Stmt).collect();
        self.analyze_seq(&seq, env, 0)
    }

    fn analyze_seq(
        &mut self,
        steps: &[Step<'_>],
        env: SymbolicEnvironment,
        depth: usize,
    ) -> ProofTree {
        let stmt = match steps.split_first() {
            None => return ProofTree::Terminate,
            Some((Step::CloseScope(names), rest)) => {
                let env = env.close_scope(names.iter().copied());
                return self.analyze_seq(rest, env, depth);
            }
            Some((Step::Stmt(stmt), _)) => *stmt,
        };
        let rest = &steps[1..];
        if depth >= self.options.max_depth {
            return ProofTree::CannotAnalyze {
                env,
                reason: AnalysisError::DepthLimitExceeded {
                    limit: self.options.max_depth,
                    span: stmt.span,
                },
            };
        }

        debug!(shape = %stmt.kind.shape(), depth, remaining = rest.len(), "statement");
        match &stmt.kind {
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.conditional(stmt, cond, then_branch, else_branch, rest, env, depth),
            ExprKind::Enforce { cond, message } => {
                let guard = match build_term(cond, &env) {
                    Ok(t) => t,
                    Err(reason) => return ProofTree::CannotAnalyze { env, reason },
                };
                let continuation = if is_final(rest) {
                    ProofTree::ReturnUnit
                } else {
                    self.analyze_seq(rest, env.assert(guard.clone()), depth + 1)
                };
                ProofTree::EnforceConstraint {
                    env,
                    guard,
                    message: message.clone(),
                    continuation: Box::new(continuation),
                }
            }
            ExprKind::Let { bindings, body } => {
                let mut scoped = env;
                for b in bindings {
                    let definition = build_term(&b.value, &scoped);
                    scoped = match self.bind_source(&scoped, b.id, &b.name, b.ty.as_ref(), definition)
                    {
                        Ok(next) => next,
                        Err(reason) => return ProofTree::CannotAnalyze { env: scoped, reason },
                    };
                }
                let names = bindings.iter().map(|b| b.name.node.as_str()).collect();
                let continuation = scoped_continuation(body, names, rest);
                self.analyze_seq(&continuation, scoped, depth + 1)
            }
            ExprKind::Literal(value) if is_final(rest) => ProofTree::ReturnLiteral {
                env,
                value: value.clone(),
            },
            ExprKind::Var { name, binding } if is_final(rest) => match env.lookup(*binding) {
                Some(var) => ProofTree::ReturnVariable {
                    variable: var.clone(),
                    env,
                },
                None => ProofTree::CannotAnalyze {
                    reason: AnalysisError::UnresolvedVariable {
                        name: name.node.clone(),
                        span: stmt.span,
                    },
                    env,
                },
            },
            ExprKind::Literal(_) | ExprKind::Var { .. } => {
                self.discarded(stmt);
                self.analyze_seq(rest, env, depth + 1)
            }
            ExprKind::EnforceKeyset { keyset } => {
                let continuation = self.analyze_seq(rest, env.clone(), depth + 1);
                ProofTree::EnforceKeySet {
                    env,
                    keyset: keyset.clone(),
                    continuation: Box::new(continuation),
                }
            }
            ExprKind::Insert(write) => self.row_write(WriteKind::Insert, write, rest, env, depth),
            ExprKind::Update(write) => self.row_write(WriteKind::Update, write, rest, env, depth),
            ExprKind::WithRead {
                table,
                key,
                columns,
                body,
            } => self.with_read(table, key, columns, body, rest, env, depth),
            ExprKind::Read { table, .. } => ProofTree::CannotAnalyze {
                env,
                reason: AnalysisError::UnsupportedType {
                    what: format!("whole-row read of `{}` without column bindings", table.node),
                    span: stmt.span,
                },
            },
            ExprKind::Unary { .. }
            | ExprKind::Binary { .. }
            | ExprKind::Object(_)
            | ExprKind::TableRef(_)
            | ExprKind::Call { .. } => ProofTree::CannotAnalyze {
                env,
                reason: AnalysisError::UnsupportedConstruct {
                    shape: stmt.kind.shape(),
                    span: stmt.span,
                },
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn conditional(
        &mut self,
        stmt: &Expr,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: &Expr,
        rest: &[Step<'_>],
        env: SymbolicEnvironment,
        depth: usize,
    ) -> ProofTree {
        let (ExprKind::Literal(then_value), ExprKind::Literal(else_value)) =
            (&then_branch.kind, &else_branch.kind)
        else {
            return ProofTree::CannotAnalyze {
                env,
                reason: AnalysisError::UnsupportedConstruct {
                    shape: "if with non-literal branches".to_string(),
                    span: stmt.span,
                },
            };
        };
        let guard = match build_term(cond, &env) {
            Ok(t) => t,
            Err(reason) => return ProofTree::CannotAnalyze { env, reason },
        };

        let then_env = env.assert(guard.clone());
        let else_env = env.assert(negate(guard.clone()));
        let (then_tree, else_tree) = if is_final(rest) {
            (
                ProofTree::ReturnLiteral {
                    env: then_env,
                    value: then_value.clone(),
                },
                ProofTree::ReturnLiteral {
                    env: else_env,
                    value: else_value.clone(),
                },
            )
        } else {
            self.discarded(stmt);
            (
                self.analyze_seq(rest, then_env, depth + 1),
                self.analyze_seq(rest, else_env, depth + 1),
            )
        };

        ProofTree::IfBranch {
            env,
            guard,
            then_branch: Box::new(then_tree),
            else_branch: Box::new(else_tree),
        }
    }

    fn row_write(
        &mut self,
        kind: WriteKind,
        write: &RowWrite,
        rest: &[Step<'_>],
        env: SymbolicEnvironment,
        depth: usize,
    ) -> ProofTree {
        let key = match row_key(&write.key, &env) {
            Ok(t) => t,
            Err(reason) => return ProofTree::CannotAnalyze { env, reason },
        };

        let mut env = env;
        for (field, value) in &write.fields {
            let base = format!("{}_{}_{}", write.table.node, kind.as_str(), field.node);
            let definition = build_term(value, &env);
            env = self.bind_derived(&env, &base, value.ty.as_ref(), definition);
        }

        let continuation = Box::new(self.analyze_seq(rest, env.clone(), depth + 1));
        let table = write.table.node.clone();
        match kind {
            WriteKind::Insert => ProofTree::TableInsert {
                env,
                table,
                key,
                continuation,
            },
            WriteKind::Update => ProofTree::TableUpdate {
                env,
                table,
                key,
                continuation,
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn with_read(
        &mut self,
        table: &Ident,
        key: &Expr,
        columns: &[ColumnBinding],
        body: &[Expr],
        rest: &[Step<'_>],
        env: SymbolicEnvironment,
        depth: usize,
    ) -> ProofTree {
        let key = match row_key(key, &env) {
            Ok(t) => t,
            Err(reason) => return ProofTree::CannotAnalyze { env, reason },
        };

        let mut env = env;
        for col in columns {
            if let Err(reason) = env.ensure_unbound(col.id, &col.name.node, col.name.span) {
                return ProofTree::CannotAnalyze { env, reason };
            }
            // The stored cell is unconstrained; the projection equals it.
            let (read_env, cell) = env.declare_derived(
                &format!("{}_read_{}", table.node, col.column.node),
                col.ty.as_ref(),
                tracking_for(col.ty.as_ref()),
            );
            let definition = match cell.status.reason() {
                None => Ok(cell.term()),
                Some(reason) => Err(AnalysisError::UntrackedVariable {
                    name: cell.name.to_string(),
                    reason: reason.to_string(),
                    span: col.column.span,
                }),
            };
            env = match self.bind_source(&read_env, col.id, &col.name, col.ty.as_ref(), definition)
            {
                Ok(next) => next,
                Err(reason) => return ProofTree::CannotAnalyze { env: read_env, reason },
            };
        }

        let names = columns.iter().map(|c| c.name.node.as_str()).collect();
        let continuation = scoped_continuation(body, names, rest);
        let continuation = Box::new(self.analyze_seq(&continuation, env.clone(), depth + 1));
        ProofTree::WithRead {
            env,
            table: table.node.clone(),
            key,
            continuation,
        }
    }

    /// Declares a source binding and equates it with its definition.
    ///
    /// Only a duplicate name fails; an unbuildable definition leaves the
    /// binding declared but `LostTrack`.
    fn bind_source(
        &mut self,
        env: &SymbolicEnvironment,
        id: covenant_ast::ExprId,
        name: &Ident,
        ty: Option<&PrimType>,
        definition: Result<Term, AnalysisError>,
    ) -> Result<SymbolicEnvironment, AnalysisError> {
        env.ensure_unbound(id, &name.node, name.span)?;
        let (status, equation) = self.settle(ty, definition);
        let (next, var) = env.declare_source(id, &name.node, name.span, ty, status)?;
        Ok(self.finish_binding(next, &var.name, &var.status, equation))
    }

    fn bind_derived(
        &mut self,
        env: &SymbolicEnvironment,
        base: &str,
        ty: Option<&PrimType>,
        definition: Result<Term, AnalysisError>,
    ) -> SymbolicEnvironment {
        let (status, equation) = self.settle(ty, definition);
        let (next, var) = env.declare_derived(base, ty, status);
        self.finish_binding(next, &var.name, &var.status, equation)
    }

    fn settle(
        &self,
        ty: Option<&PrimType>,
        definition: Result<Term, AnalysisError>,
    ) -> (TrackingStatus, Option<Term>) {
        match (tracking_for(ty), definition) {
            (TrackingStatus::Tracked, Ok(term)) => (TrackingStatus::Tracked, Some(term)),
            (TrackingStatus::Tracked, Err(e)) => (TrackingStatus::LostTrack(e.to_string()), None),
            (untracked, _) => (untracked, None),
        }
    }

    fn finish_binding(
        &mut self,
        env: SymbolicEnvironment,
        name: &SymbolicName,
        status: &TrackingStatus,
        equation: Option<Term>,
    ) -> SymbolicEnvironment {
        if let TrackingStatus::LostTrack(reason) = status {
            warn!(binding = %name, %reason, "lost track of binding");
            self.warnings.push(AnalysisWarning::LostTrack {
                name: name.clone(),
                reason: reason.clone(),
            });
        }
        match equation {
            Some(term) => env.assert(Term::equals(Term::Symbol(name.clone()), term)),
            None => env,
        }
    }

    fn discarded(&mut self, stmt: &Expr) {
        let shape = stmt.kind.shape();
        if self.options.warn_on_discarded {
            warn!(%shape, offset = stmt.span.offset(), "discarding value of non-final statement");
            self.warnings.push(AnalysisWarning::DiscardedValue {
                shape,
                offset: stmt.span.offset(),
            });
        } else {
            debug!(%shape, "discarding value of non-final statement");
        }
    }
}

/// Row keys must be a plain literal or variable.
fn row_key(key: &Expr, env: &SymbolicEnvironment) -> Result<Term, AnalysisError> {
    match &key.kind {
        ExprKind::Literal(Literal::Time(_)) => Err(malformed_key(key.span)),
        ExprKind::Literal(_) | ExprKind::Var { .. } => build_term(key, env),
        _ => Err(malformed_key(key.span)),
    }
}

fn malformed_key(span: Span) -> AnalysisError {
    AnalysisError::UnsupportedConstruct {
        shape: "row key that is not a literal or variable".to_string(),
        span,
    }
}

/// One declaration per parameter, in order.
pub fn seed_environment(params: &[Param]) -> Result<SymbolicEnvironment, AnalysisError> {
    params.iter().try_fold(SymbolicEnvironment::new(), |env, p| {
        let (next, _) = env.declare_source(
            p.id,
            &p.name.node,
            p.name.span,
            p.ty.as_ref(),
            tracking_for(p.ty.as_ref()),
        )?;
        Ok(next)
    })
}

/// Analyzes `statements` under `env` with default options.
pub fn analyze(statements: &[Expr], env: SymbolicEnvironment) -> ProofTree {
    let options = AnalysisOptions::default();
    PathAnalyzer::new(&options).analyze(statements, env)
}

#[instrument(skip_all, fields(function = %function.name.node))]
pub fn analyze_function(function: &Function, options: &AnalysisOptions) -> Analysis {
    info!(
        params = function.params.len(),
        statements = function.body.len(),
        "analyzing function"
    );
    let mut analyzer = PathAnalyzer::new(options);
    let tree = match seed_environment(&function.params) {
        Ok(env) => analyzer.analyze(&function.body, env),
        Err(reason) => ProofTree::CannotAnalyze {
            env: SymbolicEnvironment::new(),
            reason,
        },
    };
    let warnings = analyzer.into_warnings();
    info!(
        nodes = tree.node_count(),
        warnings = warnings.len(),
        "analysis finished"
    );
    Analysis {
        function: function.name.node.clone(),
        tree,
        warnings,
    }
}
