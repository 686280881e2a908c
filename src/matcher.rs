//! Rule-to-clause-set unification.
//!
//! [`Matcher`] enumerates every binding under which all positive left-hand
//! elements of a rule match distinct clauses. The search is a depth-first
//! backtracking walk driven by an explicit stack of choice points, one per
//! positive element, each holding the candidate clauses still to try. There
//! is no recursion, so long left-hand sides cannot exhaust the call stack.
//!
//! Candidates for an element are tried alternative by alternative in written
//! order, and within one alternative by lowest token index, then clause
//! order. Negated elements and guards run only once a binding is complete.

use crate::binding::Binding;
use crate::cnf::Cnf;
use crate::literal::Literal;
use crate::ontology::Ontology;
use crate::procedures::Procedures;
use crate::rules::{LhsElement, Rule};

/// One complete, accepted binding of a rule's left-hand side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub binding: Binding,
    /// Clause positions bound by each positive element, in left-hand order.
    pub positions: Vec<usize>,
    /// The subset of `positions` whose element consumes its clause.
    pub consumed: Vec<usize>,
}

impl Match {
    /// The clauses this match bound, in left-hand order.
    pub fn literals<'c>(&self, cnf: &'c Cnf) -> Vec<&'c Literal> {
        self.positions.iter().filter_map(|&p| cnf.get(p)).collect()
    }
}

/// A guard the ontology could not answer for one candidate binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardFailure {
    pub rule: String,
    pub guard: String,
    pub binding: Binding,
    pub message: String,
}

struct ChoicePoint {
    /// Candidate clause positions with the binding each one produces.
    candidates: Vec<(usize, Binding)>,
    next: usize,
}

impl ChoicePoint {
    fn chosen(&self) -> Option<usize> {
        self.next
            .checked_sub(1)
            .and_then(|i| self.candidates.get(i))
            .map(|(pos, _)| *pos)
    }
}

/// Lazy enumeration of the matches of one rule against one clause set.
pub struct Matcher<'a> {
    rule: &'a Rule,
    cnf: &'a Cnf,
    procedures: Procedures<'a>,
    positives: Vec<&'a LhsElement>,
    stack: Vec<ChoicePoint>,
    started: bool,
    guard_failures: Vec<GuardFailure>,
}

impl<'a> Matcher<'a> {
    pub fn new(rule: &'a Rule, cnf: &'a Cnf, ontology: &'a dyn Ontology) -> Self {
        Self {
            rule,
            cnf,
            procedures: Procedures::new(ontology),
            positives: rule.lhs.iter().filter(|e| e.is_positive()).collect(),
            stack: Vec::new(),
            started: false,
            guard_failures: Vec::new(),
        }
    }

    /// Guard evaluations that failed because the ontology errored.
    pub fn guard_failures(&self) -> &[GuardFailure] {
        &self.guard_failures
    }

    pub fn take_guard_failures(&mut self) -> Vec<GuardFailure> {
        std::mem::take(&mut self.guard_failures)
    }

    fn used_positions(&self) -> Vec<usize> {
        self.stack.iter().filter_map(ChoicePoint::chosen).collect()
    }

    /// Candidates for positive element `depth`, skipping clauses already
    /// bound higher up the stack.
    fn choice_point(&self, depth: usize, binding: &Binding) -> ChoicePoint {
        let used = self.used_positions();
        let mut candidates: Vec<(usize, Binding)> = Vec::new();
        for option in self.positives[depth].options() {
            for (pos, extended) in self.cnf.candidates(option, binding) {
                if !used.contains(&pos) && !candidates.iter().any(|(p, _)| *p == pos) {
                    candidates.push((pos, extended));
                }
            }
        }
        ChoicePoint {
            candidates,
            next: 0,
        }
    }

    /// Negation and guard checks on a syntactically complete binding.
    fn accept(&mut self, binding: &Binding) -> bool {
        for element in &self.rule.lhs {
            if let LhsElement::Absent(pattern) = element {
                if !self.cnf.contains_pattern(pattern, binding).is_empty() {
                    tracing::trace!(rule = %self.rule.name, %pattern, %binding, "negated literal present");
                    return false;
                }
            }
        }
        for guard in &self.rule.guards {
            let ground = guard.substitute(binding);
            match self.procedures.evaluate(&ground) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::trace!(rule = %self.rule.name, guard = %ground, "guard rejected binding");
                    return false;
                }
                Err(e) => {
                    tracing::warn!(
                        rule = %self.rule.name,
                        guard = %ground,
                        %binding,
                        error = %e,
                        "guard failed; binding discarded"
                    );
                    self.guard_failures.push(GuardFailure {
                        rule: self.rule.name.clone(),
                        guard: ground.to_string(),
                        binding: binding.clone(),
                        message: e.to_string(),
                    });
                    return false;
                }
            }
        }
        true
    }

    fn complete(&self, binding: Binding) -> Match {
        let positions = self.used_positions();
        let consumed = positions
            .iter()
            .zip(&self.positives)
            .filter(|(_, element)| element.consumes())
            .map(|(pos, _)| *pos)
            .collect();
        Match {
            binding,
            positions,
            consumed,
        }
    }
}

impl Iterator for Matcher<'_> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        if !self.started {
            self.started = true;
            if self.positives.is_empty() {
                return None;
            }
            let root = self.choice_point(0, &Binding::new());
            self.stack.push(root);
        }
        loop {
            let top = self.stack.last_mut()?;
            let Some((_, binding)) = top.candidates.get(top.next).cloned() else {
                self.stack.pop();
                continue;
            };
            top.next += 1;

            let depth = self.stack.len();
            if depth < self.positives.len() {
                let next = self.choice_point(depth, &binding);
                self.stack.push(next);
                continue;
            }
            if self.accept(&binding) {
                return Some(self.complete(binding));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Term;
    use crate::ontology::{NullOntology, Taxonomy};

    fn cnf(s: &str) -> Cnf {
        s.parse().unwrap()
    }

    fn rule(s: &str) -> Rule {
        Rule::parse(s).unwrap()
    }

    #[test]
    fn chain_has_exactly_one_binding() {
        let c = cnf("p(a,b), q(b,c)");
        let r = rule("p(?X,?Y), q(?Y,?Z) ==> r(?X,?Z).");
        let matches: Vec<Match> = Matcher::new(&r, &c, &NullOntology).collect();
        assert_eq!(matches.len(), 1);
        let b = &matches[0].binding;
        assert_eq!(b.get("X"), Some(&Term::constant("a")));
        assert_eq!(b.get("Y"), Some(&Term::constant("b")));
        assert_eq!(b.get("Z"), Some(&Term::constant("c")));
    }

    #[test]
    fn every_binding_is_sound() {
        let c = cnf(
            "nsubj(killed-3,John-1), dobj(killed-3,Mary-2), nsubj(saw-6,Bill-5), \
             dobj(saw-6,Sue-7), dobj(killed-3,Tom-9)",
        );
        let r = rule("nsubj(?V,?A), dobj(?V,?B) ==> agent(?V,?A).");
        let matches: Vec<Match> = Matcher::new(&r, &c, &NullOntology).collect();
        assert_eq!(matches.len(), 3);
        for m in &matches {
            for element in &r.lhs {
                let lit = element.options()[0].substitute(&m.binding);
                assert!(c.contains(&lit), "{lit} missing for {}", m.binding);
            }
        }
    }

    #[test]
    fn candidates_follow_token_order() {
        let c = cnf("amod(dog-5,big-4), amod(cat-2,small-1)");
        let r = rule("amod(?X,?Y) ==> attribute(?X,?Y).");
        let first = Matcher::new(&r, &c, &NullOntology).next().unwrap();
        assert_eq!(first.binding.get("X"), Some(&Term::token("cat", 2)));
    }

    #[test]
    fn positive_elements_bind_distinct_clauses() {
        let c = cnf("conj(a-1,b-2)");
        let r = rule("conj(?X,?Y), conj(?P,?Q) ==> pair(?X,?P).");
        assert_eq!(Matcher::new(&r, &c, &NullOntology).count(), 0);

        let c = cnf("conj(a-1,b-2), conj(c-3,d-4)");
        assert_eq!(Matcher::new(&r, &c, &NullOntology).count(), 2);
    }

    #[test]
    fn negation_blocks_binding() {
        let c = cnf("nsubj(ran-2,dog-1), det(dog-1,the-0), nsubj(sat-5,cat-4)");
        let r = rule("nsubj(?V,?X), -det(?X,?D) ==> bare(?X,?V).");
        let matches: Vec<Match> = Matcher::new(&r, &c, &NullOntology).collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].binding.get("X"), Some(&Term::token("cat", 4)));
    }

    #[test]
    fn alternatives_are_all_explored() {
        let c = cnf("nsubj(ran-2,dog-1), nsubjpass(seen-5,cat-4)");
        let r = rule("(nsubj(?V,?X) | nsubjpass(?V,?X)) ==> agent(?V,?X).");
        let matches: Vec<Match> = Matcher::new(&r, &c, &NullOntology).collect();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].binding.get("X"), Some(&Term::token("dog", 1)));
    }

    #[test]
    fn guards_filter_complete_bindings() {
        let tax = Taxonomy::new().subclass("Man", "Human");
        let c = cnf("sumo(Man,John-1), sumo(Dog,Rex-3)");
        let r = rule("sumo(?C,?X), {isSubclass(?C,Human)} ==> human(?X,?C).");
        let matches: Vec<Match> = Matcher::new(&r, &c, &tax).collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].binding.get("X"), Some(&Term::token("John", 1)));
    }

    #[test]
    fn consumed_positions_follow_markers() {
        let c = cnf("det(dog-2,the-1), sumo(Dog,dog-2)");
        let r = rule("@consume\ndet(?X,?D), +sumo(?C,?X) ==> !.");
        let m = Matcher::new(&r, &c, &NullOntology).next().unwrap();
        assert_eq!(m.positions, vec![0, 1]);
        assert_eq!(m.consumed, vec![0]);
        assert_eq!(m.literals(&c).len(), 2);
    }

    #[test]
    fn wildcards_match_words() {
        let c = cnf("aux(going-3,Was-2), aux(eat-7,will-6)");
        let r = rule("aux(?V,be*) ==> progressive(?V,?V).");
        let matches: Vec<Match> = Matcher::new(&r, &c, &NullOntology).collect();
        assert!(matches.is_empty());
        let r = rule("aux(?V,was*) ==> past(?V,?V).");
        assert_eq!(Matcher::new(&r, &c, &NullOntology).count(), 1);
    }

    #[test]
    fn long_left_hand_sides_do_not_recurse() {
        let facts: Vec<String> = (1..=200).map(|i| format!("next(n-{i},n-{})", i + 1)).collect();
        let c = cnf(&facts.join(", "));
        let lhs: Vec<String> = (0..150).map(|i| format!("next(?A{i},?A{})", i + 1)).collect();
        let r = rule(&format!("{} ==> chain(?A0,?A150).", lhs.join(", ")));
        let first = Matcher::new(&r, &c, &NullOntology).next().unwrap();
        assert_eq!(first.binding.get("A0"), Some(&Term::token("n", 1)));
        assert_eq!(first.binding.get("A150"), Some(&Term::token("n", 151)));
    }
}
