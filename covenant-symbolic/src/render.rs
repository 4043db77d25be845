#![forbid(unsafe_code)]

//! Deterministic rendering of proof trees.
//!
//! Rendering is a pure function of the tree: the same tree always produces
//! byte-identical JSON, which golden tests rely on. Every ordered collection
//! comes from the environment's command list or a `BTreeMap`.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use covenant_ast::Literal;
use serde::Serialize;

use crate::env::{Command, SymbolicEnvironment, SymbolicName};
use crate::error::AnalysisError;
use crate::options::AnalysisOptions;
use crate::term::{negate, Term};
use crate::tree::ProofTree;

pub const UNSUPPORTED_SORT: &str = "unsupported";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedDeclaration {
    pub name: String,
    pub sort: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedEnvironment {
    pub declarations: Vec<RenderedDeclaration>,
    pub assertions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedChild {
    pub role: &'static str,
    pub node: RenderedNode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedNode {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<RenderedEnvironment>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub payload: BTreeMap<&'static str, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderedChild>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedLeaf {
    pub route: Vec<String>,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub environment: RenderedEnvironment,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Document {
    pub root: RenderedNode,
    pub leaves: Vec<RenderedLeaf>,
}

impl Document {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_string_with(&self, options: &AnalysisOptions) -> Result<String, serde_json::Error> {
        if options.pretty {
            self.to_json_pretty()
        } else {
            self.to_json()
        }
    }
}

pub fn render(tree: &ProofTree) -> Document {
    Document {
        root: render_node(tree),
        leaves: leaves(tree).iter().map(PathLeaf::render).collect(),
    }
}

pub fn render_environment(env: &SymbolicEnvironment) -> RenderedEnvironment {
    let declarations = env
        .declarations()
        .map(|(name, sort)| RenderedDeclaration {
            name: name.to_string(),
            sort: sort
                .map(|s| s.as_smtlib().to_string())
                .unwrap_or_else(|| UNSUPPORTED_SORT.to_string()),
        })
        .collect();
    let assertions = env.assertions().map(|t| t.to_string()).collect();
    RenderedEnvironment {
        declarations,
        assertions,
    }
}

fn render_node(tree: &ProofTree) -> RenderedNode {
    let mut payload = BTreeMap::new();
    match tree {
        ProofTree::IfBranch { guard, .. } => {
            payload.insert("guard", guard.to_string());
        }
        ProofTree::EnforceConstraint { guard, message, .. } => {
            payload.insert("guard", guard.to_string());
            payload.insert("message", message.clone());
        }
        ProofTree::EnforceKeySet { keyset, .. } => {
            payload.insert("keyset", keyset.clone());
        }
        ProofTree::WithRead { table, key, .. }
        | ProofTree::TableInsert { table, key, .. }
        | ProofTree::TableUpdate { table, key, .. } => {
            payload.insert("table", table.clone());
            payload.insert("key", key.to_string());
        }
        ProofTree::ReturnLiteral { value, .. } => {
            payload.insert("literal", value.to_string());
        }
        ProofTree::ReturnVariable { variable, .. } => {
            payload.insert("variable", variable.name.to_string());
            if let Some(reason) = variable.status.reason() {
                payload.insert("untracked", reason.to_string());
            }
        }
        ProofTree::CannotAnalyze { reason, .. } => {
            payload.insert("error", reason.kind().to_string());
            payload.insert("reason", reason.to_string());
        }
        ProofTree::ReturnUnit | ProofTree::Terminate => {}
    }

    RenderedNode {
        kind: tree.kind(),
        environment: tree.env().map(render_environment),
        payload,
        children: tree
            .branches()
            .into_iter()
            .map(|(role, _, child)| RenderedChild {
                role,
                node: render_node(child),
            })
            .collect(),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LeafOutcome {
    Literal(Literal),
    Variable(SymbolicName),
    Unit,
    Terminated,
    /// The path on which an `enforce` guard is false and execution aborts.
    ConstraintViolation { message: String },
    Unanalyzable { reason: AnalysisError },
}

impl LeafOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            LeafOutcome::Literal(_) => "literal",
            LeafOutcome::Variable(_) => "variable",
            LeafOutcome::Unit => "unit",
            LeafOutcome::Terminated => "terminated",
            LeafOutcome::ConstraintViolation { .. } => "constraint_violation",
            LeafOutcome::Unanalyzable { .. } => "unanalyzable",
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            LeafOutcome::Literal(lit) => Some(lit.to_string()),
            LeafOutcome::Variable(name) => Some(name.to_string()),
            LeafOutcome::ConstraintViolation { message } => Some(message.clone()),
            LeafOutcome::Unanalyzable { reason } => Some(reason.to_string()),
            LeafOutcome::Unit | LeafOutcome::Terminated => None,
        }
    }
}

/// A complete path: what holds along it and how it ends.
#[derive(Clone, Debug, PartialEq)]
pub struct PathLeaf {
    pub route: Vec<String>,
    pub env: SymbolicEnvironment,
    pub outcome: LeafOutcome,
}

impl PathLeaf {
    pub fn render(&self) -> RenderedLeaf {
        RenderedLeaf {
            route: self.route.clone(),
            outcome: self.outcome.kind(),
            detail: self.outcome.detail(),
            environment: render_environment(&self.env),
        }
    }

    /// SMT-LIB script for this path. With a `property`, the script is
    /// satisfiable exactly when the property can fail on the path.
    pub fn to_smtlib(&self, property: Option<&Term>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; path: {}", self.route.join(" / "));
        let _ = writeln!(out, "; outcome: {}", self.outcome.kind());
        out.push_str("(set-logic ALL)\n");
        for command in self.env.commands() {
            out.push_str(&command.to_smtlib());
            out.push('\n');
        }
        if let Some(property) = property {
            let _ = writeln!(out, "{}", Command::Assert(negate(property.clone())).to_smtlib());
        }
        out.push_str("(check-sat)\n");
        out
    }
}

/// Every reachable leaf, depth first, then-branch before else-branch.
pub fn leaves(tree: &ProofTree) -> Vec<PathLeaf> {
    let mut out = Vec::new();
    let mut route = Vec::new();
    collect_leaves(tree, &SymbolicEnvironment::new(), &mut route, &mut out);
    out
}

fn collect_leaves(
    tree: &ProofTree,
    inherited: &SymbolicEnvironment,
    route: &mut Vec<String>,
    out: &mut Vec<PathLeaf>,
) {
    let mut leaf = |env: &SymbolicEnvironment, outcome: LeafOutcome, route: &[String]| {
        out.push(PathLeaf {
            route: route.to_vec(),
            env: env.clone(),
            outcome,
        })
    };

    match tree {
        ProofTree::ReturnLiteral { env, value } => {
            leaf(env, LeafOutcome::Literal(value.clone()), route.as_slice())
        }
        ProofTree::ReturnVariable { env, variable } => {
            leaf(env, LeafOutcome::Variable(variable.name.clone()), route.as_slice())
        }
        ProofTree::ReturnUnit => leaf(inherited, LeafOutcome::Unit, route.as_slice()),
        ProofTree::Terminate => leaf(inherited, LeafOutcome::Terminated, route.as_slice()),
        ProofTree::CannotAnalyze { env, reason } => leaf(
            env,
            LeafOutcome::Unanalyzable {
                reason: reason.clone(),
            },
            route.as_slice(),
        ),
        ProofTree::EnforceConstraint {
            env,
            guard,
            message,
            ..
        } => {
            route.push("enforce:violated".to_string());
            leaf(
                &env.assert(negate(guard.clone())),
                LeafOutcome::ConstraintViolation {
                    message: message.clone(),
                },
                route.as_slice(),
            );
            route.pop();
            descend(tree, route, out);
        }
        ProofTree::IfBranch { .. }
        | ProofTree::EnforceKeySet { .. }
        | ProofTree::WithRead { .. }
        | ProofTree::TableInsert { .. }
        | ProofTree::TableUpdate { .. } => descend(tree, route, out),
    }
}

fn descend(tree: &ProofTree, route: &mut Vec<String>, out: &mut Vec<PathLeaf>) {
    for (role, env, child) in tree.branches() {
        route.push(step_label(tree, role));
        collect_leaves(child, &env, route, out);
        route.pop();
    }
}

fn step_label(tree: &ProofTree, role: &str) -> String {
    match tree {
        ProofTree::IfBranch { .. } => format!("if:{role}"),
        ProofTree::EnforceConstraint { .. } => "enforce".to_string(),
        ProofTree::EnforceKeySet { keyset, .. } => format!("keyset:{keyset}"),
        ProofTree::WithRead { table, .. } => format!("with-read:{table}"),
        ProofTree::TableInsert { table, .. } => format!("insert:{table}"),
        ProofTree::TableUpdate { table, .. } => format!("update:{table}"),
        _ => role.to_string(),
    }
}
