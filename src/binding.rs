//! Binding environments built during LHS matching.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::literal::Term;

/// A consistent mapping from variable names (without the `?`) to terms.
///
/// Extension never overwrites: [`Binding::bind`] refuses a variable that is
/// already bound to a different term, which is what keeps a match internally
/// consistent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    vars: BTreeMap<String, Term>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `var` to `term`.
    ///
    /// Returns `false` (and leaves the binding unchanged) if `var` is already
    /// bound to a different term.
    pub fn bind(&mut self, var: &str, term: &Term) -> bool {
        match self.vars.get(var) {
            Some(existing) => existing == term,
            None => {
                self.vars.insert(var.to_string(), term.clone());
                true
            }
        }
    }

    pub fn get(&self, var: &str) -> Option<&Term> {
        self.vars.get(var)
    }

    pub fn contains(&self, var: &str) -> bool {
        self.vars.contains_key(var)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Resolve a term: variables are replaced by their binding, everything
    /// else (including unbound variables) is returned unchanged.
    pub fn resolve(&self, term: &Term) -> Term {
        match term {
            Term::Variable(name) => self.vars.get(name).cloned().unwrap_or_else(|| term.clone()),
            other => other.clone(),
        }
    }
}

impl<'a> FromIterator<(&'a str, Term)> for Binding {
    fn from_iter<I: IntoIterator<Item = (&'a str, Term)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (var, term)) in self.vars.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "?{var}={term}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebinding_same_term_is_allowed() {
        let mut b = Binding::new();
        let john = Term::token("John", 1);
        assert!(b.bind("X", &john));
        assert!(b.bind("X", &john));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn conflicting_rebind_is_refused() {
        let mut b = Binding::new();
        assert!(b.bind("X", &Term::token("John", 1)));
        assert!(!b.bind("X", &Term::token("Mary", 2)));
        assert_eq!(b.get("X"), Some(&Term::token("John", 1)));
    }

    #[test]
    fn resolve_leaves_unbound_variables() {
        let b: Binding = [("X", Term::constant("Human"))].into_iter().collect();
        assert_eq!(b.resolve(&Term::variable("X")), Term::constant("Human"));
        assert_eq!(b.resolve(&Term::variable("Y")), Term::variable("Y"));
    }

    #[test]
    fn display_is_sorted() {
        let b: Binding = [("Y", Term::constant("b")), ("X", Term::constant("a"))]
            .into_iter()
            .collect();
        assert_eq!(b.to_string(), "{?X=a, ?Y=b}");
    }
}
