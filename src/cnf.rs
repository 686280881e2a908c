//! The clause set: an ordered, duplicate-free conjunction of literals.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::literal::{split_top_level, Literal, LiteralError, Term};

/// An ordered set of literals.
///
/// Insertion order is kept for display and deterministic matching; equality
/// ignores it. Appending a literal that is already present is a no-op.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Literal>", into = "Vec<Literal>")]
pub struct Cnf {
    literals: Vec<Literal>,
    members: HashSet<Literal>,
}

impl Cnf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Literal> {
        self.literals.iter()
    }

    pub fn get(&self, position: usize) -> Option<&Literal> {
        self.literals.get(position)
    }

    pub fn contains(&self, literal: &Literal) -> bool {
        self.members.contains(literal)
    }

    /// Add `literal` unless an equal literal is present. Returns whether it
    /// was new.
    pub fn append(&mut self, literal: Literal) -> bool {
        if self.members.contains(&literal) {
            return false;
        }
        self.members.insert(literal.clone());
        self.literals.push(literal);
        true
    }

    /// Append every literal of `other`; returns how many were new.
    pub fn merge(&mut self, other: &Cnf) -> usize {
        other
            .iter()
            .filter(|lit| self.append((*lit).clone()))
            .count()
    }

    /// Remove `literal` if present. Returns whether it was removed.
    pub fn remove(&mut self, literal: &Literal) -> bool {
        if !self.members.remove(literal) {
            return false;
        }
        self.literals.retain(|l| l != literal);
        true
    }

    /// Keep only the literals for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&Literal) -> bool) {
        let members = &mut self.members;
        self.literals.retain(|lit| {
            let k = keep(lit);
            if !k {
                members.remove(lit);
            }
            k
        });
    }

    /// All ground literals compatible with `pattern` under `binding`.
    pub fn contains_pattern(&self, pattern: &Literal, binding: &Binding) -> Vec<&Literal> {
        self.candidates(pattern, binding)
            .into_iter()
            .map(|(pos, _)| &self.literals[pos])
            .collect()
    }

    /// Positions of compatible literals with the extended binding of each,
    /// ordered by lowest token index and then insertion order.
    pub(crate) fn candidates(&self, pattern: &Literal, binding: &Binding) -> Vec<(usize, Binding)> {
        let mut found: Vec<(usize, Binding)> = self
            .literals
            .iter()
            .enumerate()
            .filter_map(|(pos, lit)| pattern.match_ground(lit, binding).map(|b| (pos, b)))
            .collect();
        found.sort_by_key(|(pos, _)| {
            (
                self.literals[*pos].min_token_index().unwrap_or(u32::MAX),
                *pos,
            )
        });
        found
    }

    /// Distinct predicate names, sorted.
    pub fn predicates(&self) -> BTreeSet<&str> {
        self.literals.iter().map(|l| l.predicate.as_str()).collect()
    }

    /// Whether any literal uses `predicate`.
    pub fn has_predicate(&self, predicate: &str) -> bool {
        self.literals.iter().any(|l| l.predicate == predicate)
    }

    /// Whether `term` appears as an argument anywhere.
    pub fn has_term(&self, term: &Term) -> bool {
        self.literals.iter().any(|l| l.arg1 == *term || l.arg2 == *term)
    }

    /// Distinct argument terms, sorted.
    pub fn terms(&self) -> BTreeSet<&Term> {
        self.literals
            .iter()
            .flat_map(|l| [&l.arg1, &l.arg2])
            .collect()
    }

    /// Canonical string form of each literal, in insertion order.
    pub fn render(&self) -> Vec<String> {
        self.literals.iter().map(Literal::to_string).collect()
    }
}

impl PartialEq for Cnf {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl Eq for Cnf {}

impl From<Vec<Literal>> for Cnf {
    fn from(literals: Vec<Literal>) -> Self {
        literals.into_iter().collect()
    }
}

impl From<Cnf> for Vec<Literal> {
    fn from(cnf: Cnf) -> Self {
        cnf.literals
    }
}

impl FromIterator<Literal> for Cnf {
    fn from_iter<I: IntoIterator<Item = Literal>>(iter: I) -> Self {
        let mut cnf = Cnf::new();
        for lit in iter {
            cnf.append(lit);
        }
        cnf
    }
}

impl Extend<Literal> for Cnf {
    fn extend<I: IntoIterator<Item = Literal>>(&mut self, iter: I) {
        for lit in iter {
            self.append(lit);
        }
    }
}

impl<'a> IntoIterator for &'a Cnf {
    type Item = &'a Literal;
    type IntoIter = std::slice::Iter<'a, Literal>;

    fn into_iter(self) -> Self::IntoIter {
        self.literals.iter()
    }
}

impl fmt::Display for Cnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, lit) in self.literals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{lit}")?;
        }
        Ok(())
    }
}

/// Parses a comma-separated clause list such as `a(b,c), d(e,f).`
impl FromStr for Cnf {
    type Err = LiteralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('.');
        split_top_level(s, ',')
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .map(str::parse::<Literal>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Literal {
        s.parse().unwrap()
    }

    #[test]
    fn append_is_idempotent() {
        let mut cnf = Cnf::new();
        assert!(cnf.append(lit("nsubj(killed-3,John-1)")));
        let once = cnf.clone();
        assert!(!cnf.append(lit("nsubj(killed-3,John-1)")));
        assert_eq!(cnf, once);
        assert_eq!(cnf.len(), 1);
    }

    #[test]
    fn merge_counts_new_literals() {
        let mut a: Cnf = "p(a,b), q(b,c)".parse().unwrap();
        let b: Cnf = "q(b,c), r(c,d)".parse().unwrap();
        assert_eq!(a.merge(&b), 1);
        assert_eq!(a.render(), vec!["p(a,b)", "q(b,c)", "r(c,d)"]);
    }

    #[test]
    fn remove_and_retain_keep_membership_in_sync() {
        let mut cnf: Cnf = "p(a,b), q(b,c), r(c,d)".parse().unwrap();
        assert!(cnf.remove(&lit("q(b,c)")));
        assert!(!cnf.remove(&lit("q(b,c)")));
        cnf.retain(|l| l.predicate != "r");
        assert_eq!(cnf.render(), vec!["p(a,b)"]);
        assert!(cnf.append(lit("r(c,d)")));
    }

    #[test]
    fn contains_pattern_respects_binding() {
        let cnf: Cnf = "p(a,b), p(a,c), p(d,b)".parse().unwrap();
        let pattern = lit("p(?X,?Y)");
        assert_eq!(cnf.contains_pattern(&pattern, &Binding::new()).len(), 3);

        let bound: Binding = [("X", Term::constant("a"))].into_iter().collect();
        let hits = cnf.contains_pattern(&pattern, &bound);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|l| l.arg1 == Term::constant("a")));

        let none: Binding = [("X", Term::constant("zzz"))].into_iter().collect();
        assert!(cnf.contains_pattern(&pattern, &none).is_empty());
    }

    #[test]
    fn candidates_prefer_lowest_token_index() {
        let cnf: Cnf = "amod(dog-5,big-4), amod(cat-2,small-1)".parse().unwrap();
        let hits = cnf.contains_pattern(&lit("amod(?X,?Y)"), &Binding::new());
        assert_eq!(hits[0].to_string(), "amod(cat-2,small-1)");
    }

    #[test]
    fn equality_ignores_order() {
        let a: Cnf = "p(a,b), q(b,c)".parse().unwrap();
        let b: Cnf = "q(b,c), p(a,b)".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn serde_uses_plain_list() {
        let cnf: Cnf = "p(a,b), p(a,b), q(b-1,c)".parse().unwrap();
        let json = serde_json::to_string(&cnf).unwrap();
        let back: Cnf = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back, cnf);
    }

    #[test]
    fn terms_and_predicates() {
        let cnf: Cnf = "sumo(Human,John-1), names(John-1,\"John\")".parse().unwrap();
        assert!(cnf.has_predicate("names"));
        assert!(cnf.has_term(&Term::constant("Human")));
        assert_eq!(cnf.predicates().into_iter().collect::<Vec<_>>(), vec!["names", "sumo"]);
        assert_eq!(cnf.terms().len(), 3);
    }
}
