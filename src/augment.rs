//! Numeric and date augmentation clauses.
//!
//! The numeric/date extractor is an upstream collaborator; this module only
//! turns its output into clause clusters and merges them into a sentence's
//! clause set:
//!
//! ```text
//! measure(Mahal-2,measure1), unit(measure1,GroupOfPeople),
//! value(measure1,3000000), valueToken(3000000,three-4)
//! time(left-3,time-1), hour(time-1,10), minute(time-1,30)
//! ```
//!
//! Counters (`measureN`, `time-N`) come from the position of the cluster
//! among the sentence's clusters of the same kind, so building and merging
//! the same clusters twice produces the same literals and adds nothing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::adapter::{dependency_literal, token_ref};
use crate::cnf::Cnf;
use crate::error::RewriteWarning;
use crate::literal::{Literal, Term};
use crate::token::Sentence;

/// Named-entity classes whose tokens are covered by augmentation clauses.
pub const NUMERIC_NER: &[&str] = &[
    "DATE", "NUMBER", "ORDINAL", "PERCENT", "DURATION", "TIME", "MONEY",
];

/// Date and clock fields of a time cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeParts {
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl TimeParts {
    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let numbers = [
            ("hour", self.hour),
            ("minute", self.minute),
            ("second", self.second),
            ("day", self.day),
            ("month", self.month),
        ];
        for (name, value) in numbers {
            if let Some(v) = value {
                out.push((name, v.to_string()));
            }
        }
        if let Some(year) = self.year {
            out.push(("year", year.to_string()));
        }
        out
    }
}

/// One cluster reported by the numeric/date extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Augmentation {
    /// A measurement of token `target`.
    Measure {
        sentence: usize,
        target: u32,
        value: String,
        #[serde(default)]
        unit: Option<String>,
        /// Token the value was read from.
        #[serde(default)]
        value_token: Option<u32>,
    },
    /// A point in time attached to token `target`.
    Time {
        sentence: usize,
        target: u32,
        #[serde(flatten)]
        parts: TimeParts,
    },
    /// Clauses already rendered by the collaborator, e.g.
    /// `"year(time-1,1999), time(born-2,time-1)"`.
    Clauses { sentence: usize, clauses: String },
}

impl Augmentation {
    pub fn measure(sentence: usize, target: u32, value: impl Into<String>) -> Self {
        Augmentation::Measure {
            sentence,
            target,
            value: value.into(),
            unit: None,
            value_token: None,
        }
    }

    pub fn time(sentence: usize, target: u32, parts: TimeParts) -> Self {
        Augmentation::Time {
            sentence,
            target,
            parts,
        }
    }

    pub fn sentence(&self) -> usize {
        match self {
            Augmentation::Measure { sentence, .. }
            | Augmentation::Time { sentence, .. }
            | Augmentation::Clauses { sentence, .. } => *sentence,
        }
    }
}

/// Clauses built from a sentence's augmentation clusters.
#[derive(Debug, Clone, Default)]
pub struct Augmented {
    pub clauses: Cnf,
    pub warnings: Vec<RewriteWarning>,
    /// `time-N` counters. They look like tokens but name no sentence token.
    pub synthetic: BTreeSet<Term>,
}

impl Augmented {
    pub fn is_synthetic(&self, term: &Term) -> bool {
        self.synthetic.contains(term)
    }
}

fn malformed(sentence: usize, detail: String) -> RewriteWarning {
    tracing::warn!(sentence, %detail, "dropped augmentation cluster");
    RewriteWarning::MalformedInputFact { sentence, detail }
}

fn token_term(s: &Sentence, index: u32) -> Option<Term> {
    s.token(index).map(token_ref)
}

/// Build the clause clusters for one sentence.
pub fn build(sentence: usize, s: &Sentence, items: &[&Augmentation]) -> Augmented {
    let mut out = Augmented::default();
    let mut measures = 0;
    let mut times = 0;

    for item in items {
        match item {
            Augmentation::Measure {
                target,
                value,
                unit,
                value_token,
                ..
            } => {
                measures += 1;
                let Some(arg) = token_term(s, *target) else {
                    out.warnings
                        .push(malformed(sentence, format!("measure target {target} is out of range")));
                    continue;
                };
                let value = value.replace(',', "");
                let measure = Term::constant(format!("measure{measures}"));
                out.clauses.append(Literal::new("measure", arg, measure.clone()));
                if let Some(unit) = unit {
                    out.clauses
                        .append(Literal::new("unit", measure.clone(), Term::constant(unit)));
                }
                out.clauses
                    .append(Literal::new("value", measure, Term::constant(&value)));
                if let Some(tok) = value_token.and_then(|i| token_term(s, i)) {
                    out.clauses
                        .append(Literal::new("valueToken", Term::constant(&value), tok));
                }
            }
            Augmentation::Time { target, parts, .. } => {
                times += 1;
                let Some(arg) = token_term(s, *target) else {
                    out.warnings
                        .push(malformed(sentence, format!("time target {target} is out of range")));
                    continue;
                };
                let time = Term::token("time", times);
                out.synthetic.insert(time.clone());
                for (field, value) in parts.fields() {
                    out.clauses
                        .append(Literal::new(field, time.clone(), Term::constant(value)));
                }
                out.clauses.append(Literal::new("time", arg, time));
            }
            Augmentation::Clauses { clauses, .. } => match clauses.parse::<Cnf>() {
                Ok(cnf) => {
                    for lit in Vec::from(cnf) {
                        for term in lit.args() {
                            if is_counter(s, term) {
                                out.synthetic.insert(term.clone());
                            }
                        }
                        match unknown_token(s, &lit).map(ToString::to_string) {
                            Some(term) => out.warnings.push(malformed(
                                sentence,
                                format!("{lit} references unknown token {term}"),
                            )),
                            None => {
                                out.clauses.append(lit);
                            }
                        }
                    }
                }
                Err(e) => out
                    .warnings
                    .push(malformed(sentence, format!("unparseable clauses {clauses:?}: {e}"))),
            },
        }
    }
    out
}

fn names_sentence_token(s: &Sentence, term: &Term) -> bool {
    term.token_index()
        .and_then(|i| s.token(i))
        .is_some_and(|t| token_ref(t) == *term)
}

/// A `time-N` counter that is not the sentence's own token `N`.
fn is_counter(s: &Sentence, term: &Term) -> bool {
    matches!(term, Term::Token { text, .. } if text == "time") && !names_sentence_token(s, term)
}

/// A token argument that names neither a sentence token nor a `time-N`
/// counter.
fn unknown_token<'l>(s: &Sentence, lit: &'l Literal) -> Option<&'l Term> {
    lit.args().into_iter().find(|term| {
        matches!(term, Term::Token { .. }) && !is_counter(s, term) && !names_sentence_token(s, term)
    })
}

/// Merge augmentation clauses into a clause set. Returns how many were new.
pub fn merge(cnf: &mut Cnf, augmented: &Augmented) -> usize {
    cnf.merge(&augmented.clauses)
}

/// Remove the dependency literals that touch numeric tokens, which the
/// augmentation clauses describe instead. Returns how many were removed.
pub fn scrub_numeric_dependencies(cnf: &mut Cnf, s: &Sentence) -> usize {
    let is_numeric = |index: u32| {
        s.token(index)
            .is_some_and(|t| NUMERIC_NER.contains(&t.ner.as_str()))
    };
    let mut removed = 0;
    for dep in &s.dependencies {
        if !(is_numeric(dep.governor) || is_numeric(dep.dependent)) {
            continue;
        }
        if let Some(lit) = dependency_literal(s, dep) {
            if cnf.remove(&lit) {
                removed += 1;
            }
        }
    }
    if removed > 0 {
        tracing::debug!(removed, "scrubbed numeric dependencies");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    fn sentence() -> Sentence {
        Sentence::new(vec![
            Token::new(1, "The"),
            Token::new(2, "Mahal").with_pos("NNP"),
            Token::new(3, "has"),
            Token::new(4, "3,000,000").with_ner("NUMBER").with_pos("CD"),
            Token::new(5, "visitors").with_pos("NNS"),
            Token::new(6, "since"),
            Token::new(7, "1999").with_ner("DATE").with_pos("CD"),
        ])
        .with_dependency("nummod", 5, 4)
        .with_dependency("dobj", 3, 5)
        .with_dependency("nmod:since", 3, 7)
    }

    fn mahal() -> Augmentation {
        Augmentation::Measure {
            sentence: 0,
            target: 2,
            value: "3,000,000".into(),
            unit: Some("GroupOfPeople".into()),
            value_token: Some(4),
        }
    }

    #[test]
    fn measure_cluster_shape() {
        let s = sentence();
        let m = mahal();
        let out = build(0, &s, &[&m]);
        assert_eq!(
            out.clauses.render(),
            vec![
                "measure(Mahal-2,measure1)",
                "unit(measure1,GroupOfPeople)",
                "value(measure1,3000000)",
                "valueToken(3000000,3000000-4)",
            ]
        );
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn merging_twice_adds_nothing() {
        let s = sentence();
        let m = mahal();
        let mut cnf: Cnf = "dobj(has-3,visitors-5)".parse().unwrap();
        assert_eq!(merge(&mut cnf, &build(0, &s, &[&m])), 4);
        assert_eq!(merge(&mut cnf, &build(0, &s, &[&m])), 0);
        assert_eq!(cnf.len(), 5);
        let values = cnf.iter().filter(|l| l.predicate == "value").count();
        assert_eq!(values, 1);
    }

    #[test]
    fn time_cluster_and_counters() {
        let s = sentence();
        let t1 = Augmentation::time(
            0,
            3,
            TimeParts {
                year: Some(1999),
                ..Default::default()
            },
        );
        let t2 = Augmentation::time(
            0,
            5,
            TimeParts {
                hour: Some(10),
                minute: Some(30),
                ..Default::default()
            },
        );
        let out = build(0, &s, &[&t1, &t2]);
        assert_eq!(
            out.clauses.render(),
            vec![
                "year(time-1,1999)",
                "time(has-3,time-1)",
                "hour(time-2,10)",
                "minute(time-2,30)",
                "time(visitors-5,time-2)",
            ]
        );
        assert!(out.is_synthetic(&Term::token("time", 1)));
        assert!(out.is_synthetic(&Term::token("time", 2)));
        assert!(!out.is_synthetic(&Term::token("has", 3)));
    }

    #[test]
    fn raw_clause_counters_are_synthetic() {
        let s = sentence();
        let raw = Augmentation::Clauses {
            sentence: 0,
            clauses: "year(time-2,1999), time(has-3,time-2)".into(),
        };
        let out = build(0, &s, &[&raw]);
        assert_eq!(out.clauses.len(), 2);
        assert!(out.is_synthetic(&Term::token("time", 2)));
        assert!(!out.is_synthetic(&Term::token("has", 3)));
    }

    #[test]
    fn malformed_clusters_are_dropped_with_warnings() {
        let s = sentence();
        let bad = Augmentation::measure(0, 42, "7");
        let raw = Augmentation::Clauses {
            sentence: 0,
            clauses: "year(time-1,1999), time(ghost-9,time-1)".into(),
        };
        let out = build(0, &s, &[&bad, &raw]);
        assert_eq!(out.clauses.render(), vec!["year(time-1,1999)"]);
        assert_eq!(out.warnings.len(), 2);
    }

    #[test]
    fn scrub_removes_numeric_dependencies() {
        let s = sentence();
        let mut cnf: Cnf = "nummod(visitors-5,3,000,000-4), dobj(has-3,visitors-5), nmod:since(has-3,1999-7)"
            .parse()
            .unwrap();
        // The thousands separator is stripped when parsing the clause list.
        assert_eq!(cnf.len(), 3);
        let removed = scrub_numeric_dependencies(&mut cnf, &s);
        assert_eq!(removed, 2);
        assert_eq!(cnf.render(), vec!["dobj(has-3,visitors-5)"]);
    }

    #[test]
    fn augmentation_json_shape() {
        let json = r#"[
            {"type": "measure", "sentence": 0, "target": 2, "value": "12", "unit": "Meter"},
            {"type": "time", "sentence": 1, "target": 3, "year": 2001, "month": 9},
            {"type": "clauses", "sentence": 2, "clauses": "day(time-1,11)"}
        ]"#;
        let items: Vec<Augmentation> = serde_json::from_str(json).unwrap();
        assert_eq!(items[1].sentence(), 1);
        assert!(matches!(
            &items[1],
            Augmentation::Time { parts, .. } if parts.year == Some(2001) && parts.month == Some(9)
        ));
    }
}
