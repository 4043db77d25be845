#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_DEPTH_ENV: &str = "COVENANT_MAX_DEPTH";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisOptions {
    /// Statements nested deeper than this on one path become `CannotAnalyze`.
    pub max_depth: usize,
    /// Record a warning when a non-final literal or variable is dropped.
    pub warn_on_discarded: bool,
    /// Pretty-print rendered documents.
    pub pretty: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_depth: 512,
            warn_on_discarded: true,
            pretty: true,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum OptionsError {
    #[error("invalid analysis options: {0}")]
    #[diagnostic(code(covenant::options::toml))]
    Toml(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {var}: expected a positive integer")]
    #[diagnostic(code(covenant::options::env))]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Default, Deserialize)]
struct OptionsFile {
    #[serde(default)]
    analysis: AnalysisOptions,
}

impl AnalysisOptions {
    /// Reads the `[analysis]` table of a TOML document; every key is optional.
    pub fn from_toml_str(src: &str) -> Result<Self, OptionsError> {
        let file: OptionsFile = toml::from_str(src)?;
        Ok(file.analysis)
    }

    pub fn with_env_overrides(self) -> Result<Self, OptionsError> {
        self.apply_env(|var| std::env::var(var).ok())
    }

    pub fn apply_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, OptionsError> {
        if let Some(value) = lookup(MAX_DEPTH_ENV) {
            self.max_depth = match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(OptionsError::InvalidEnv {
                        var: MAX_DEPTH_ENV,
                        value,
                    });
                }
            };
        }
        Ok(self)
    }
}
