#![forbid(unsafe_code)]

use covenant_ast::Literal;

use crate::env::{SymbolicEnvironment, SymbolicVariable};
use crate::error::AnalysisError;
use crate::term::{negate, Term};

/// One node per recognized statement shape.
///
/// `env` is the snapshot valid at the node. For `IfBranch` and
/// `EnforceConstraint` it is the state before the guard is assumed; for the
/// table nodes it already includes the equations the read or write produced.
#[derive(Clone, Debug, PartialEq)]
pub enum ProofTree {
    IfBranch {
        env: SymbolicEnvironment,
        guard: Term,
        then_branch: Box<ProofTree>,
        else_branch: Box<ProofTree>,
    },
    EnforceConstraint {
        env: SymbolicEnvironment,
        guard: Term,
        message: String,
        continuation: Box<ProofTree>,
    },
    EnforceKeySet {
        env: SymbolicEnvironment,
        keyset: String,
        continuation: Box<ProofTree>,
    },
    WithRead {
        env: SymbolicEnvironment,
        table: String,
        key: Term,
        continuation: Box<ProofTree>,
    },
    TableInsert {
        env: SymbolicEnvironment,
        table: String,
        key: Term,
        continuation: Box<ProofTree>,
    },
    TableUpdate {
        env: SymbolicEnvironment,
        table: String,
        key: Term,
        continuation: Box<ProofTree>,
    },
    ReturnLiteral {
        env: SymbolicEnvironment,
        value: Literal,
    },
    ReturnVariable {
        env: SymbolicEnvironment,
        variable: SymbolicVariable,
    },
    ReturnUnit,
    Terminate,
    CannotAnalyze {
        env: SymbolicEnvironment,
        reason: AnalysisError,
    },
}

impl ProofTree {
    pub fn kind(&self) -> &'static str {
        match self {
            ProofTree::IfBranch { .. } => "IfBranch",
            ProofTree::EnforceConstraint { .. } => "EnforceConstraint",
            ProofTree::EnforceKeySet { .. } => "EnforceKeySet",
            ProofTree::WithRead { .. } => "WithRead",
            ProofTree::TableInsert { .. } => "TableInsert",
            ProofTree::TableUpdate { .. } => "TableUpdate",
            ProofTree::ReturnLiteral { .. } => "ReturnLiteral",
            ProofTree::ReturnVariable { .. } => "ReturnVariable",
            ProofTree::ReturnUnit => "ReturnUnit",
            ProofTree::Terminate => "Terminate",
            ProofTree::CannotAnalyze { .. } => "CannotAnalyze",
        }
    }

    pub fn env(&self) -> Option<&SymbolicEnvironment> {
        match self {
            ProofTree::IfBranch { env, .. }
            | ProofTree::EnforceConstraint { env, .. }
            | ProofTree::EnforceKeySet { env, .. }
            | ProofTree::WithRead { env, .. }
            | ProofTree::TableInsert { env, .. }
            | ProofTree::TableUpdate { env, .. }
            | ProofTree::ReturnLiteral { env, .. }
            | ProofTree::ReturnVariable { env, .. }
            | ProofTree::CannotAnalyze { env, .. } => Some(env),
            ProofTree::ReturnUnit | ProofTree::Terminate => None,
        }
    }

    /// Children paired with the environment their path starts from.
    ///
    /// Leaves without their own snapshot (`ReturnUnit`, `Terminate`) inherit
    /// this environment.
    pub fn branches(&self) -> Vec<(&'static str, SymbolicEnvironment, &ProofTree)> {
        match self {
            ProofTree::IfBranch {
                env,
                guard,
                then_branch,
                else_branch,
            } => vec![
                ("then", env.assert(guard.clone()), then_branch.as_ref()),
                ("else", env.assert(negate(guard.clone())), else_branch.as_ref()),
            ],
            ProofTree::EnforceConstraint {
                env,
                guard,
                continuation,
                ..
            } => vec![("continuation", env.assert(guard.clone()), continuation.as_ref())],
            ProofTree::EnforceKeySet {
                env, continuation, ..
            }
            | ProofTree::WithRead {
                env, continuation, ..
            }
            | ProofTree::TableInsert {
                env, continuation, ..
            }
            | ProofTree::TableUpdate {
                env, continuation, ..
            } => vec![("continuation", env.clone(), continuation.as_ref())],
            ProofTree::ReturnLiteral { .. }
            | ProofTree::ReturnVariable { .. }
            | ProofTree::ReturnUnit
            | ProofTree::Terminate
            | ProofTree::CannotAnalyze { .. } => Vec::new(),
        }
    }

    pub fn children(&self) -> Vec<&ProofTree> {
        self.branches().into_iter().map(|(_, _, child)| child).collect()
    }

    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(|c| c.depth()).max().unwrap_or(0)
    }
}
