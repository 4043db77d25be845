#![forbid(unsafe_code)]

//! Copy-on-extend symbolic state threaded down each path.
//!
//! A `SymbolicEnvironment` is never mutated in place: every declaration or
//! assertion returns a new value. The persistent `im` collections share
//! structure between the old and new value, so handing one environment to
//! both arms of a branch costs nothing and neither arm can observe the other.

use std::fmt;

use covenant_ast::{ExprId, PrimType, Span};
use im::{OrdMap, OrdSet, Vector};
use serde::Serialize;

use crate::error::AnalysisError;
use crate::term::Term;
use crate::types::{classify_type, Sort, SymbolicType};

/// Solver symbol for one binding. Unique among live bindings on a path.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SymbolicName(String);

impl SymbolicName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TrackingStatus {
    Tracked,
    /// The binding's type has no solver sort.
    Untracked(String),
    /// The type is representable but the defining expression was not.
    LostTrack(String),
}

impl TrackingStatus {
    pub fn is_tracked(&self) -> bool {
        matches!(self, TrackingStatus::Tracked)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            TrackingStatus::Tracked => None,
            TrackingStatus::Untracked(r) | TrackingStatus::LostTrack(r) => Some(r),
        }
    }
}

/// Initial status of a binding, decided by its resolved type alone.
pub fn tracking_for(ty: Option<&PrimType>) -> TrackingStatus {
    match ty {
        None => TrackingStatus::Untracked("type was not resolved".to_string()),
        Some(t) if classify_type(t).is_some() => TrackingStatus::Tracked,
        Some(t) => TrackingStatus::Untracked(format!(
            "{} has no symbolic representation",
            t.display()
        )),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SymbolicVariable {
    pub name: SymbolicName,
    pub ty: Option<SymbolicType>,
    pub status: TrackingStatus,
}

impl SymbolicVariable {
    pub fn sort(&self) -> Option<Sort> {
        self.ty.map(SymbolicType::sort)
    }

    pub fn term(&self) -> Term {
        Term::Symbol(self.name.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BindingKey {
    /// Parameter, `let` binding or `with-read` column binding.
    Source(ExprId),
    /// Synthesized for a table read or write.
    Derived(SymbolicName),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `sort` is `None` when the binding's type has no solver sort.
    Declare { name: SymbolicName, sort: Option<Sort> },
    Assert(Term),
}

impl Command {
    pub fn to_smtlib(&self) -> String {
        match self {
            Command::Declare {
                name,
                sort: Some(sort),
            } => format!("(declare-const {name} {sort})"),
            Command::Declare { name, sort: None } => format!("; {name}: unsupported"),
            Command::Assert(term) => format!("(assert {term})"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolicEnvironment {
    bindings: OrdMap<BindingKey, SymbolicVariable>,
    // source name -> identity, for the duplicate-binding check
    scope: OrdMap<String, ExprId>,
    names: OrdSet<SymbolicName>,
    commands: Vector<Command>,
}

impl SymbolicEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, id: ExprId) -> Option<&SymbolicVariable> {
        self.bindings.get(&BindingKey::Source(id))
    }

    pub fn get(&self, key: &BindingKey) -> Option<&SymbolicVariable> {
        self.bindings.get(key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether a source-level name is bound on this path.
    pub fn is_live(&self, name: &str) -> bool {
        self.scope.contains_key(name)
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn declarations(&self) -> impl Iterator<Item = (&SymbolicName, Option<Sort>)> {
        self.commands.iter().filter_map(|c| match c {
            Command::Declare { name, sort } => Some((name, *sort)),
            Command::Assert(_) => None,
        })
    }

    pub fn assertions(&self) -> impl Iterator<Item = &Term> {
        self.commands.iter().filter_map(|c| match c {
            Command::Assert(t) => Some(t),
            Command::Declare { .. } => None,
        })
    }

    pub fn last_assertion(&self) -> Option<&Term> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::Assert(t) => Some(t),
            Command::Declare { .. } => None,
        })
    }

    pub fn ensure_unbound(&self, id: ExprId, name: &str, span: Span) -> Result<(), AnalysisError> {
        if self.is_live(name) || self.bindings.contains_key(&BindingKey::Source(id)) {
            return Err(AnalysisError::DuplicateBinding {
                name: name.to_string(),
                span,
            });
        }
        Ok(())
    }

    /// `base` made into a plain SMT-LIB symbol, suffixed `_1`, `_2`, .. until
    /// it collides with no live name.
    pub fn fresh_name(&self, base: &str) -> SymbolicName {
        let mut base: String = base
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
            base.insert_str(0, "v_");
        }

        let mut candidate = SymbolicName(base.clone());
        let mut counter = 0u32;
        while self.names.contains(&candidate) {
            counter += 1;
            candidate = SymbolicName(format!("{base}_{counter}"));
        }
        candidate
    }

    /// Declares a parameter or local binding.
    pub fn declare_source(
        &self,
        id: ExprId,
        name: &str,
        span: Span,
        ty: Option<&PrimType>,
        status: TrackingStatus,
    ) -> Result<(Self, SymbolicVariable), AnalysisError> {
        self.ensure_unbound(id, name, span)?;
        let symbol = self.fresh_name(&format!("{name}_{id}"));
        let (mut next, var) = self.declare(BindingKey::Source(id), symbol, ty, status);
        next.scope.insert(name.to_string(), id);
        Ok((next, var))
    }

    /// Declares a variable synthesized by the analyzer; it has no source name.
    pub fn declare_derived(
        &self,
        base: &str,
        ty: Option<&PrimType>,
        status: TrackingStatus,
    ) -> (Self, SymbolicVariable) {
        let symbol = self.fresh_name(base);
        self.declare(BindingKey::Derived(symbol.clone()), symbol, ty, status)
    }

    fn declare(
        &self,
        key: BindingKey,
        name: SymbolicName,
        ty: Option<&PrimType>,
        status: TrackingStatus,
    ) -> (Self, SymbolicVariable) {
        let ty = ty.and_then(classify_type);
        debug_assert!(!status.is_tracked() || ty.is_some());

        let var = SymbolicVariable {
            name: name.clone(),
            ty,
            status,
        };
        let mut next = self.clone();
        next.names.insert(name.clone());
        next.bindings.insert(key, var.clone());
        next.commands.push_back(Command::Declare {
            name,
            sort: var.sort(),
        });
        (next, var)
    }

    /// Ends the scope of `names`. Their declarations, equations and symbols
    /// stay; only the source names become free to bind again.
    pub fn close_scope<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut next = self.clone();
        for name in names {
            next.scope.remove(name);
        }
        next
    }

    pub fn assert(&self, term: Term) -> Self {
        let mut next = self.clone();
        next.commands.push_back(Command::Assert(term));
        next
    }
}
