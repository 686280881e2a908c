//! Rich diagnostic error types for the sem-rewrite engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives; [`SemError`] wraps them so the full diagnostic chain reaches the
//! user. Conditions the engine recovers from locally are not errors: they
//! are reported as [`RewriteWarning`] values next to the result.

use std::fmt;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::document::DocumentError;
use crate::literal::LiteralError;
use crate::ontology::OntologyError;
use crate::rules::RuleError;

/// Top-level error type.
#[derive(Debug, Error, Diagnostic)]
pub enum SemError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Literal(#[from] LiteralError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ontology(#[from] OntologyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

pub type SemResult<T> = std::result::Result<T, SemError>;

// ---------------------------------------------------------------------------
// Recoverable conditions
// ---------------------------------------------------------------------------

/// A recoverable condition met while processing a sentence.
///
/// Each one has already been logged through `tracing` when it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewriteWarning {
    /// A guard's ontology query failed; that candidate binding was dropped.
    GuardFailure {
        sentence: usize,
        rule: String,
        guard: String,
        binding: String,
        message: String,
    },
    /// The rewrite hit its iteration bound; the clause set is best effort.
    NonConvergence { sentence: usize, iterations: usize },
    /// An input record referenced a token that does not exist; it was dropped.
    MalformedInputFact { sentence: usize, detail: String },
    /// The adapter could not ask the ontology about a sense; the token was
    /// treated as a class.
    OntologyLookup {
        sentence: usize,
        term: String,
        message: String,
    },
}

impl fmt::Display for RewriteWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteWarning::GuardFailure {
                sentence,
                rule,
                guard,
                binding,
                message,
            } => write!(
                f,
                "sentence {sentence}: guard {guard} of rule {rule} failed under {binding}: {message}"
            ),
            RewriteWarning::NonConvergence {
                sentence,
                iterations,
            } => write!(
                f,
                "sentence {sentence}: rewrite did not converge after {iterations} iterations"
            ),
            RewriteWarning::MalformedInputFact { sentence, detail } => {
                write!(f, "sentence {sentence}: dropped malformed input fact: {detail}")
            }
            RewriteWarning::OntologyLookup {
                sentence,
                term,
                message,
            } => write!(f, "sentence {sentence}: ontology lookup of {term} failed: {message}"),
        }
    }
}
