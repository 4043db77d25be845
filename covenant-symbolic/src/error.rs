#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use covenant_ast::Span;
use miette::Diagnostic;
use thiserror::Error;

/// Why a term, binding or whole path could not be modeled.
#[derive(Clone, Debug, PartialEq, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum AnalysisError {
    #[error("unresolved variable `{name}`")]
    #[diagnostic(code(covenant::analyze::unresolved_variable))]
    UnresolvedVariable {
        name: String,
        #[label("not bound on this path")]
        span: Span,
    },

    #[error("variable `{name}` has no symbolic representation: {reason}")]
    #[diagnostic(code(covenant::analyze::untracked_variable))]
    UntrackedVariable {
        name: String,
        reason: String,
        #[label]
        span: Span,
    },

    #[error("`{name}` is already bound on this path")]
    #[diagnostic(code(covenant::analyze::duplicate_binding))]
    DuplicateBinding {
        name: String,
        #[label("rebound here")]
        span: Span,
    },

    #[error("unsupported construct: {shape}")]
    #[diagnostic(code(covenant::analyze::unsupported_construct))]
    UnsupportedConstruct {
        shape: String,
        #[label]
        span: Span,
    },

    #[error("unsupported type: {what}")]
    #[diagnostic(code(covenant::analyze::unsupported_type))]
    UnsupportedType {
        what: String,
        #[label]
        span: Span,
    },

    #[error("cannot build term for `{operator}`: {source}")]
    #[diagnostic(code(covenant::analyze::term_construction))]
    TermConstructionFailure {
        operator: String,
        source: Box<AnalysisError>,
        #[label]
        span: Span,
    },

    #[error("path exceeds the analysis depth limit of {limit}")]
    #[diagnostic(code(covenant::analyze::depth_limit))]
    DepthLimitExceeded {
        limit: usize,
        #[label]
        span: Span,
    },
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::UnresolvedVariable { .. } => "UnresolvedVariable",
            AnalysisError::UntrackedVariable { .. } => "UntrackedVariable",
            AnalysisError::DuplicateBinding { .. } => "DuplicateBinding",
            AnalysisError::UnsupportedConstruct { .. } => "UnsupportedConstruct",
            AnalysisError::UnsupportedType { .. } => "UnsupportedType",
            AnalysisError::TermConstructionFailure { .. } => "TermConstructionFailure",
            AnalysisError::DepthLimitExceeded { .. } => "DepthLimitExceeded",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            AnalysisError::UnresolvedVariable { span, .. }
            | AnalysisError::UntrackedVariable { span, .. }
            | AnalysisError::DuplicateBinding { span, .. }
            | AnalysisError::UnsupportedConstruct { span, .. }
            | AnalysisError::UnsupportedType { span, .. }
            | AnalysisError::TermConstructionFailure { span, .. }
            | AnalysisError::DepthLimitExceeded { span, .. } => *span,
        }
    }

    /// Innermost failure behind any `TermConstructionFailure` wrappers.
    pub fn root_cause(&self) -> &AnalysisError {
        match self {
            AnalysisError::TermConstructionFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn wrap(operator: &str, span: Span) -> impl FnOnce(AnalysisError) -> AnalysisError {
        let operator = operator.to_string();
        move |source| AnalysisError::TermConstructionFailure {
            operator,
            source: Box::new(source),
            span,
        }
    }
}
