//! Output rendering.
//!
//! The canonical form (`pred(arg1,arg2)`, tokens as `text-index`) is stable
//! and parses back into the same literals. The display form swaps canonical
//! tokens produced by substitution for the surface text they stand for and is
//! meant for people only.

use std::fmt::Write as _;

use crate::cnf::Cnf;
use crate::literal::{Literal, Term};
use crate::pipeline::DocumentOutcome;
use crate::substitution::{surface_of, SubstitutionGroup};

/// Canonical strings of a clause set, in order.
pub fn canonical(cnf: &Cnf) -> Vec<String> {
    cnf.render()
}

fn display_term(term: &Term, groups: &[&SubstitutionGroup]) -> String {
    match surface_of(groups, term) {
        Some(surface) => surface.to_string(),
        None => term.to_string(),
    }
}

/// One literal with surface spans restored.
pub fn display_literal(lit: &Literal, groups: &[&SubstitutionGroup]) -> String {
    format!(
        "{}({},{})",
        lit.predicate,
        display_term(&lit.arg1, groups),
        display_term(&lit.arg2, groups)
    )
}

/// A clause set with surface spans restored.
pub fn display(cnf: &Cnf, groups: &[&SubstitutionGroup]) -> Vec<String> {
    cnf.iter().map(|lit| display_literal(lit, groups)).collect()
}

/// Plain-text report of a processed document.
///
/// Per sentence: its text, the output clauses, emitted formulas and
/// warnings. With `trace` set, each rule application is listed as well.
pub fn report(outcome: &DocumentOutcome, trace: bool) -> String {
    let groups = outcome.groups();
    let mut out = String::new();
    for s in &outcome.sentences {
        let _ = writeln!(out, "[{}] {}", s.sentence, s.text);
        if trace {
            for fired in &s.fired {
                let _ = writeln!(out, "  fired {fired}");
            }
        }
        for line in display(&s.output, &groups) {
            let _ = writeln!(out, "  {line}");
        }
        for formula in &s.formulas {
            let _ = writeln!(out, "  formula {formula}");
        }
        if !s.converged {
            let _ = writeln!(out, "  (did not converge after {} iterations)", s.iterations);
        }
        for warning in &s.warnings {
            let _ = writeln!(out, "  warning: {warning}");
        }
    }
    out
}
