//! Substitution groups: per-document token rewrites applied before matching.
//!
//! A [`SubstitutionGroup`] maps individual token positions to a canonical
//! replacement token. Two builders exist:
//!
//! - [`SubstitutionGroup::from_segments`] collapses externally segmented
//!   multi-word units (`John Smith` becomes `John_Smith-1`).
//! - [`SubstitutionGroup::from_coreference`] points every non-root mention of
//!   a coreference chain at the chain's root mention.
//!
//! Groups are immutable once built and shared read-only by the sentences of
//! their document. Each replacement remembers its surface text so rendering
//! can show `John Smith` instead of `John_Smith-1`.

mod coref;
mod segments;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cnf::Cnf;
use crate::error::RewriteWarning;
use crate::literal::{Literal, Term};
use crate::token::Token;

pub use coref::REFLEXIVE_PRONOUNS;

/// Position of a token in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenKey {
    pub sentence: usize,
    pub index: u32,
}

impl TokenKey {
    pub fn new(sentence: usize, index: u32) -> Self {
        Self { sentence, index }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sentence, self.index)
    }
}

/// The canonical token a substituted position is rewritten to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    /// Token text, multi-word spans joined with `_`.
    pub text: String,
    /// Index of the first token of the canonical span.
    pub index: u32,
    /// Original surface text, words separated by spaces.
    pub surface: String,
}

impl Replacement {
    /// Build a replacement from a run of tokens. Empty runs give `None`.
    pub(crate) fn from_tokens(tokens: &[&Token]) -> Option<Self> {
        let first = tokens.first()?;
        let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        Some(Self {
            text: words.join("_"),
            index: first.index,
            surface: words.join(" "),
        })
    }

    pub fn term(&self) -> Term {
        Term::token(&self.text, self.index)
    }
}

/// What produced a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Segments,
    Coreference,
}

/// An immutable map from token positions to canonical replacements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstitutionGroup {
    kind: GroupKind,
    #[serde(with = "entries")]
    map: BTreeMap<TokenKey, Replacement>,
    warnings: Vec<RewriteWarning>,
}

impl SubstitutionGroup {
    pub(crate) fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            map: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Record a substitution. The first one recorded for a position wins.
    pub(crate) fn insert(&mut self, key: TokenKey, replacement: Replacement) -> bool {
        if self.map.contains_key(&key) {
            return false;
        }
        self.map.insert(key, replacement);
        true
    }

    pub(crate) fn warn(&mut self, warning: RewriteWarning) {
        tracing::warn!(kind = ?self.kind, %warning, "dropped input record");
        self.warnings.push(warning);
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, sentence: usize, index: u32) -> Option<&Replacement> {
        self.map.get(&TokenKey::new(sentence, index))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TokenKey, &Replacement)> {
        self.map.iter()
    }

    /// Malformed input records dropped while building the group.
    pub fn warnings(&self) -> &[RewriteWarning] {
        &self.warnings
    }

    /// Warnings that concern one sentence.
    pub fn warnings_for(&self, sentence: usize) -> impl Iterator<Item = &RewriteWarning> {
        self.warnings.iter().filter(move |w| match w {
            RewriteWarning::MalformedInputFact { sentence: s, .. } => *s == sentence,
            _ => false,
        })
    }

    fn substitute(&self, sentence: usize, term: &Term, fixed: &impl Fn(&Term) -> bool) -> Option<Term> {
        let index = term.token_index()?;
        if fixed(term) {
            return None;
        }
        self.get(sentence, index).map(Replacement::term)
    }

    /// Rewrite every token argument of `cnf` (from sentence `sentence`)
    /// that has a substitution.
    ///
    /// A literal whose two distinct arguments both end up as the same
    /// canonical token related parts of one unit and is dropped.
    pub fn apply(&self, cnf: &Cnf, sentence: usize) -> Cnf {
        self.apply_except(cnf, sentence, |_| false)
    }

    /// Like [`SubstitutionGroup::apply`], but leaves every term for which
    /// `fixed` holds untouched. Synthetic token-shaped names such as
    /// `time-1` share indices with real tokens and must not be rewritten.
    pub fn apply_except(&self, cnf: &Cnf, sentence: usize, fixed: impl Fn(&Term) -> bool) -> Cnf {
        if self.map.is_empty() {
            return cnf.clone();
        }
        let mut out = Cnf::new();
        for lit in cnf {
            let arg1 = self.substitute(sentence, &lit.arg1, &fixed);
            let arg2 = self.substitute(sentence, &lit.arg2, &fixed);
            if arg1.is_none() && arg2.is_none() {
                out.append(lit.clone());
                continue;
            }
            let rewritten = Literal::new(
                lit.predicate.clone(),
                arg1.unwrap_or_else(|| lit.arg1.clone()),
                arg2.unwrap_or_else(|| lit.arg2.clone()),
            );
            if rewritten.arg1 == rewritten.arg2 && lit.arg1 != lit.arg2 {
                tracing::trace!(sentence, literal = %lit, "dropped literal internal to a span");
                continue;
            }
            out.append(rewritten);
        }
        out
    }

    /// Surface text of a canonical token produced by this group.
    pub fn surface(&self, term: &Term) -> Option<&str> {
        let Term::Token { text, index } = term else {
            return None;
        };
        self.map
            .values()
            .find(|r| r.index == *index && r.text == *text)
            .map(|r| r.surface.as_str())
    }
}

/// The map serializes as a list of `[key, replacement]` pairs; JSON object
/// keys must be strings.
mod entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::{Replacement, TokenKey};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<TokenKey, Replacement>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<TokenKey, Replacement>, D::Error> {
        let pairs = Vec::<(TokenKey, Replacement)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// Surface text for `term` from the first group that knows it.
pub fn surface_of<'g>(groups: &[&'g SubstitutionGroup], term: &Term) -> Option<&'g str> {
    groups.iter().find_map(|g| g.surface(term))
}
