//! Rewrite rules and rule sets.
//!
//! A rule set is loaded once from text (see [`parser`] for the grammar),
//! ordered by priority, and then shared read-only between interpreters.
//! Everything in here is `Send + Sync`.
//!
//! ```text
//! ; roles from dependencies
//! @rule agent-patient 10
//! nsubj(?V,?A), dobj(?V,?B) ==> (agent(?V,?A), patient(?V,?B)).
//!
//! @consume
//! det(?X,?D), +sumo(?C,?X), {isSubclass(?C,Human)} ==> !.
//! /- attribute(Male,SexAttribute).
//! ```

pub mod error;
pub mod lexer;
pub mod parser;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cnf::Cnf;
use crate::literal::{Literal, Term};

pub use error::{RuleError, RuleResult};

// ---------------------------------------------------------------------------
// Rule parts
// ---------------------------------------------------------------------------

/// How a rule treats the clause set when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    /// `==>`: assert, retract, consume as written.
    Rewrite,
    /// `?=>`: never consumes the literals it matched.
    Optional,
}

/// One element of a rule's left-hand side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LhsElement {
    /// A literal that must match a distinct clause.
    Match { literal: Literal, consume: bool },
    /// `(a | b)`: any one of the options must match.
    Alternatives { options: Vec<Literal>, consume: bool },
    /// `-a`: no clause may match under the final binding.
    Absent(Literal),
    /// Procedural side condition, evaluated once the binding is complete.
    Guard(Literal),
}

impl LhsElement {
    /// Whether this element binds clauses (as opposed to testing them).
    pub fn is_positive(&self) -> bool {
        matches!(self, LhsElement::Match { .. } | LhsElement::Alternatives { .. })
    }

    /// Whether the matched clause is retracted when the rule fires.
    pub fn consumes(&self) -> bool {
        match self {
            LhsElement::Match { consume, .. } | LhsElement::Alternatives { consume, .. } => {
                *consume
            }
            _ => false,
        }
    }

    pub(crate) fn set_consume(&mut self, value: bool) {
        if let LhsElement::Match { consume, .. } | LhsElement::Alternatives { consume, .. } = self
        {
            *consume = value;
        }
    }

    /// The pattern literals this element can bind, in written order.
    pub fn options(&self) -> &[Literal] {
        match self {
            LhsElement::Match { literal, .. } => std::slice::from_ref(literal),
            LhsElement::Alternatives { options, .. } => options,
            LhsElement::Absent(literal) | LhsElement::Guard(literal) => {
                std::slice::from_ref(literal)
            }
        }
    }
}

impl fmt::Display for LhsElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LhsElement::Match { literal, consume } => {
                // Marked only when the literal is kept while others are consumed.
                if *consume {
                    write!(f, "{literal}")
                } else {
                    write!(f, "+{literal}")
                }
            }
            LhsElement::Alternatives { options, consume } => {
                if !*consume {
                    write!(f, "+")?;
                }
                let joined: Vec<String> = options.iter().map(Literal::to_string).collect();
                write!(f, "({})", joined.join(" | "))
            }
            LhsElement::Absent(literal) => write!(f, "-{literal}"),
            LhsElement::Guard(literal) => write!(f, "{{{literal}}}"),
        }
    }
}

/// A right-hand side action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Add the bound literal to the clause set.
    Assert(Literal),
    /// Remove the bound literal from the clause set.
    Retract(Literal),
    /// Emit a formula with the binding substituted; the clause set is untouched.
    Formula(String),
    /// `!`: nothing beyond consuming matched literals.
    BindOnly,
    /// `stop`: apply consumption, then end the rewrite.
    Stop,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Assert(lit) => write!(f, "{lit}"),
            Action::Retract(lit) => write!(f, "-{lit}"),
            Action::Formula(text) => write!(f, "{{{text}}}"),
            Action::BindOnly => write!(f, "!"),
            Action::Stop => write!(f, "stop"),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A named `lhs ==> rhs` rewrite with optional guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    /// Source line the rule starts on.
    pub line: usize,
    /// Higher priorities are tried first; ties keep file order.
    pub priority: i32,
    pub kind: RuleKind,
    pub lhs: Vec<LhsElement>,
    pub guards: Vec<Literal>,
    pub rhs: Vec<Action>,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        line: usize,
        priority: i32,
        kind: RuleKind,
        lhs: Vec<LhsElement>,
        guards: Vec<Literal>,
        rhs: Vec<Action>,
    ) -> Self {
        Self {
            name: name.into(),
            line,
            priority,
            kind,
            lhs,
            guards,
            rhs,
        }
    }

    /// Parse a single rule from text.
    pub fn parse(source: &str) -> RuleResult<Rule> {
        let parsed = parser::parse_rules(source)?;
        let count = parsed.rules.len();
        let mut rules = parsed.rules.into_iter();
        match (rules.next(), count) {
            (Some(rule), 1) => Ok(rule),
            _ => Err(RuleError::Syntax {
                rule: "<input>".into(),
                line: 1,
                column: 1,
                message: format!("expected exactly one rule, found {count}"),
            }),
        }
    }

    /// Whether the rule ends the rewrite when it fires.
    pub fn stops(&self) -> bool {
        self.rhs.contains(&Action::Stop)
    }

    /// Predicates that must occur in a clause set for this rule to match.
    pub fn required_predicates(&self) -> impl Iterator<Item = &str> {
        self.mandatory_literals().map(|l| l.predicate.as_str())
    }

    /// Constant arguments that must occur in a clause set for this rule to
    /// match.
    pub fn required_terms(&self) -> impl Iterator<Item = &Term> {
        self.mandatory_literals()
            .flat_map(|l| [&l.arg1, &l.arg2])
            .filter(|t| !t.is_pattern())
    }

    fn mandatory_literals(&self) -> impl Iterator<Item = &Literal> {
        self.lhs.iter().filter_map(|element| match element {
            LhsElement::Match { literal, .. } => Some(literal),
            _ => None,
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lhs: Vec<String> = self
            .lhs
            .iter()
            .map(LhsElement::to_string)
            .chain(self.guards.iter().map(|g| format!("{{{g}}}")))
            .collect();
        let arrow = match self.kind {
            RuleKind::Rewrite => "==>",
            RuleKind::Optional => "?=>",
        };
        let rhs: Vec<String> = self.rhs.iter().map(Action::to_string).collect();
        let rhs = if self.rhs.iter().all(|a| matches!(a, Action::Assert(_) | Action::Retract(_))) {
            format!("({})", rhs.join(", "))
        } else {
            rhs.join(", ")
        };
        write!(f, "{} {arrow} {rhs}.", lhs.join(", "))
    }
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// An ordered, immutable collection of rules plus permanent facts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    rules: Vec<Rule>,
    /// Facts declared with `/-`, added to every input clause set.
    facts: Cnf,
    /// Where the rules came from (file path or "inline").
    pub source: String,
}

impl RuleSet {
    /// Parse a rule set from text.
    pub fn parse(name: &str, source: &str) -> RuleResult<Self> {
        let parsed = parser::parse_rules(source)?;
        let mut rules = parsed.rules;
        // Stable: equal priorities keep file order.
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
        tracing::info!(
            rule_set = name,
            rules = rules.len(),
            facts = parsed.facts.len(),
            "loaded rule set"
        );
        Ok(Self {
            name: name.to_string(),
            rules,
            facts: parsed.facts,
            source: "inline".into(),
        })
    }

    /// Read and parse a rule file. The set is named after the file stem.
    pub fn from_file(path: &Path) -> RuleResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| RuleError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rules".into());
        let mut set = Self::parse(&name, &text)?;
        set.source = path.display().to_string();
        Ok(set)
    }

    /// Rules in application order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn facts(&self) -> &Cnf {
        &self.facts
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
