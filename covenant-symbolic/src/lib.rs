#![forbid(unsafe_code)]

//! Symbolic path analysis for typed contract functions.
//!
//! A function body is walked once, statement by statement, producing a
//! [`ProofTree`] whose leaves are the statically distinguishable execution
//! paths. Each node carries the solver declarations and assertions that hold
//! on the way to it; [`render`] turns the tree into a deterministic document
//! and [`PathLeaf::to_smtlib`] into per-path solver scripts.

pub mod analyze;
pub mod env;
pub mod error;
pub mod logging;
pub mod options;
pub mod render;
pub mod term;
pub mod tree;
pub mod types;

pub use analyze::{analyze, analyze_function, seed_environment, Analysis, AnalysisWarning, PathAnalyzer};
pub use env::{
    tracking_for, BindingKey, Command, SymbolicEnvironment, SymbolicName, SymbolicVariable,
    TrackingStatus,
};
pub use error::AnalysisError;
pub use options::{AnalysisOptions, OptionsError};
pub use render::{leaves, render, Document, LeafOutcome, PathLeaf};
pub use term::{build_term, negate, Term};
pub use tree::ProofTree;
pub use types::{classify, classify_type, sort_of, Sort, SymbolicType};
