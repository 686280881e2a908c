//! Load-time errors for rule sets.
//!
//! Every variant names the offending rule and its line so a broken rule file
//! can be fixed without guessing. Loading is all-or-nothing: the first error
//! aborts the whole rule set.

use miette::Diagnostic;
use thiserror::Error;

/// Errors produced while reading and parsing rule files.
#[derive(Debug, Error, Diagnostic)]
pub enum RuleError {
    #[error("syntax error in rule \"{rule}\" at line {line}, column {column}: {message}")]
    #[diagnostic(
        code(sem::rules::syntax),
        help(
            "Rules have the form `lhs ==> rhs.` where lhs is a comma-separated list of \
             literals like nsubj(?V,?A). Prefix + to preserve, - to negate, wrap \
             procedures in braces, and end every rule with a period."
        )
    )]
    Syntax {
        rule: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("duplicate rule name \"{name}\" at line {line} (first defined at line {first_line})")]
    #[diagnostic(
        code(sem::rules::duplicate),
        help("Rule names given with `@rule` must be unique within a rule set. Rename one of them.")
    )]
    DuplicateRule {
        name: String,
        line: usize,
        first_line: usize,
    },

    #[error("rule \"{rule}\" at line {line} uses ?{variable} in {place} but never binds it")]
    #[diagnostic(
        code(sem::rules::unbound_variable),
        help(
            "Every variable asserted, retracted or tested by a guard must occur in a \
             positive (non-negated) left-hand literal."
        )
    )]
    UnboundVariable {
        rule: String,
        line: usize,
        variable: String,
        place: String,
    },

    #[error("rule \"{rule}\" at line {line} has no positive pattern")]
    #[diagnostic(
        code(sem::rules::no_pattern),
        help(
            "A rule needs at least one literal to match against the clause set; \
             guards and negated literals alone cannot bind anything."
        )
    )]
    NoPattern { rule: String, line: usize },

    #[error("unknown procedure \"{name}\" in rule \"{rule}\" at line {line}")]
    #[diagnostic(
        code(sem::rules::unknown_procedure),
        help(
            "Braces mark procedural guards. Known procedures: isCELTclass, isSubclass, \
             isInstanceOf, isChildOf, isSubAttribute, different, termExists, \
             documentationContains."
        )
    )]
    UnknownProcedure {
        rule: String,
        line: usize,
        name: String,
    },

    #[error("unknown directive \"@{directive}\" at line {line}")]
    #[diagnostic(
        code(sem::rules::unknown_directive),
        help("Supported directives: @rule <name> [priority], @consume, @preserve.")
    )]
    UnknownDirective { directive: String, line: usize },

    #[error("failed to read rule file: {path}")]
    #[diagnostic(
        code(sem::rules::read),
        help("Ensure the rule file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type RuleResult<T> = std::result::Result<T, RuleError>;
