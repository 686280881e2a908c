//! Annotation adapter: builds a sentence's initial clause set.
//!
//! Every dependency edge becomes `relation(gov_text-gov, dep_text-dep)`, with
//! the root governor rendered `ROOT-0`. Depending on [`AdapterConfig`] the
//! adapter adds information literals derived from the token tags:
//!
//! | literal | source |
//! |---|---|
//! | `tense(PAST, ran-2)` | verb tag and its auxiliaries |
//! | `aspect(PROGRESSIVE, running-3)` | verb tag and its auxiliaries |
//! | `number(PLURAL, dogs-2)` | noun tag |
//! | `lemma(run, ran-2)` | token lemma |
//! | `sumo(Human, John-1)` / `sumoInstance(Paris, Paris-4)` | ontology sense or NER class |
//! | `sense(201926311, ran-2)` | word-sense key |
//! | `names(John-1, "John")` | `PERSON` entities |

use serde::{Deserialize, Serialize};

use crate::cnf::Cnf;
use crate::error::RewriteWarning;
use crate::literal::{Literal, Term};
use crate::ontology::Ontology;
use crate::token::{Dependency, Sentence, Token, ROOT_INDEX, ROOT_TEXT};

/// Which information literals the adapter emits besides dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// `tense`, `aspect` and `number` literals.
    pub pos_literals: bool,
    /// `lemma` literals.
    pub lemma_literals: bool,
    /// `sumo`, `sumoInstance`, `sense` and `names` literals.
    pub sense_literals: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            pos_literals: true,
            lemma_literals: true,
            sense_literals: true,
        }
    }
}

/// Ontology classes for named-entity tags without a word sense.
const NER_CLASSES: &[(&str, &str)] = &[
    ("PERSON", "Human"),
    ("LOCATION", "GeographicArea"),
    ("ORGANIZATION", "Organization"),
    ("CITY", "City"),
    ("COUNTRY", "Nation"),
    ("STATE_OR_PROVINCE", "StateOrProvince"),
];

const BE_FORMS: &[&str] = &["be", "is", "am", "are", "was", "were", "been", "being", "'s", "'re", "'m"];
const HAVE_FORMS: &[&str] = &["have", "has", "had", "having", "'ve", "'d"];
const FUTURE_FORMS: &[&str] = &["will", "shall", "'ll", "wo"];

/// A token as a literal argument. Thousands separators are dropped from
/// numbers (`3,000,000`) so the rendered literal parses back to the same
/// term; punctuation such as `,` keeps its text.
pub fn token_ref(token: &Token) -> Term {
    if token.text.contains(|c: char| c.is_ascii_digit()) {
        Term::token(token.text.replace(',', ""), token.index)
    } else {
        Term::token(&token.text, token.index)
    }
}

/// The literal of one dependency edge, or `None` if an end is out of range.
pub fn dependency_literal(s: &Sentence, dep: &Dependency) -> Option<Literal> {
    let governor = if dep.governor == ROOT_INDEX {
        Term::token(ROOT_TEXT, ROOT_INDEX)
    } else {
        token_ref(s.token(dep.governor)?)
    };
    let dependent = token_ref(s.token(dep.dependent)?);
    Some(Literal::new(dep.relation.clone(), governor, dependent))
}

/// Initial clause set of a sentence.
#[derive(Debug, Clone, Default)]
pub struct Adapted {
    pub cnf: Cnf,
    pub warnings: Vec<RewriteWarning>,
}

/// Turns annotated sentences into clause sets.
pub struct Adapter<'a> {
    config: &'a AdapterConfig,
    ontology: &'a dyn Ontology,
}

impl<'a> Adapter<'a> {
    pub fn new(config: &'a AdapterConfig, ontology: &'a dyn Ontology) -> Self {
        Self { config, ontology }
    }

    pub fn sentence_cnf(&self, sentence: usize, s: &Sentence) -> Adapted {
        let mut out = Adapted::default();
        for dep in &s.dependencies {
            match dependency_literal(s, dep) {
                Some(lit) => {
                    out.cnf.append(lit);
                }
                None => {
                    let detail = format!(
                        "{}({},{}) references a token outside 1..={}",
                        dep.relation,
                        dep.governor,
                        dep.dependent,
                        s.tokens.len()
                    );
                    tracing::warn!(sentence, %detail, "dropped dependency");
                    out.warnings
                        .push(RewriteWarning::MalformedInputFact { sentence, detail });
                }
            }
        }
        for token in &s.tokens {
            if self.config.pos_literals {
                self.pos_literals(s, token, &mut out.cnf);
            }
            if self.config.lemma_literals {
                lemma_literal(s, token, &mut out.cnf);
            }
            if self.config.sense_literals {
                self.sense_literals(sentence, token, &mut out);
            }
        }
        tracing::debug!(sentence, clauses = out.cnf.len(), "built initial clause set");
        out
    }

    fn pos_literals(&self, s: &Sentence, token: &Token, cnf: &mut Cnf) {
        if token.is_noun() {
            let number = if token.pos.ends_with('S') { "PLURAL" } else { "SINGULAR" };
            cnf.append(Literal::new("number", Term::constant(number), token_ref(token)));
        }
        if !token.is_verb() || s.is_auxiliary(token.index) {
            return;
        }
        let auxiliaries: Vec<&Token> = s
            .dependencies
            .iter()
            .filter(|d| d.governor == token.index && d.relation == "aux")
            .filter_map(|d| s.token(d.dependent))
            .collect();
        let has = |forms: &[&str]| {
            auxiliaries
                .iter()
                .any(|a| forms.contains(&a.text.to_lowercase().as_str()) || forms.contains(&a.lemma.as_str()))
        };
        let tagged = |tags: &[&str]| {
            tags.contains(&token.pos.as_str()) || auxiliaries.iter().any(|a| tags.contains(&a.pos.as_str()))
        };

        let tense = if has(FUTURE_FORMS) {
            Some("FUTURE")
        } else if tagged(&["VBD"]) {
            Some("PAST")
        } else if tagged(&["VBZ", "VBP"]) {
            Some("PRESENT")
        } else {
            None
        };
        if let Some(tense) = tense {
            cnf.append(Literal::new("tense", Term::constant(tense), token_ref(token)));
        }

        let aspect = match token.pos.as_str() {
            "VBG" if has(BE_FORMS) && has(HAVE_FORMS) => Some("PROGRESSIVE_PERFECT"),
            "VBG" if has(BE_FORMS) => Some("PROGRESSIVE"),
            "VBN" if has(HAVE_FORMS) => Some("PERFECT"),
            _ => None,
        };
        if let Some(aspect) = aspect {
            cnf.append(Literal::new("aspect", Term::constant(aspect), token_ref(token)));
        }
    }

    fn sense_literals(&self, sentence: usize, token: &Token, out: &mut Adapted) {
        let Adapted { cnf, warnings } = out;
        let arg = token_ref(token);
        if let Some(sense) = &token.sense {
            cnf.append(Literal::new("sense", Term::constant(sense), arg.clone()));
        }
        match token.ontology_sense.as_deref().map(|c| c.trim_end_matches(['=', '+', '@'])) {
            Some(class) if !class.is_empty() => {
                let instance = self.ontology.is_instance(class).unwrap_or_else(|e| {
                    tracing::warn!(sentence, term = class, error = %e, "instance lookup failed");
                    warnings.push(RewriteWarning::OntologyLookup {
                        sentence,
                        term: class.to_string(),
                        message: e.to_string(),
                    });
                    false
                });
                let predicate = if instance { "sumoInstance" } else { "sumo" };
                cnf.append(Literal::new(predicate, Term::constant(class), arg.clone()));
            }
            _ => {
                if let Some((_, class)) = NER_CLASSES.iter().find(|(ner, _)| *ner == token.ner) {
                    cnf.append(Literal::new("sumo", Term::constant(*class), arg.clone()));
                }
            }
        }
        if token.ner == "PERSON" {
            cnf.append(Literal::new("sumo", Term::constant("Human"), arg.clone()));
            let name = format!("\"{}\"", token.text.replace('"', ""));
            cnf.append(Literal::new("names", arg, Term::constant(name)));
        }
    }
}

fn lemma_literal(s: &Sentence, token: &Token, cnf: &mut Cnf) {
    let is_word = token.pos.is_empty() || token.pos.starts_with(|c: char| c.is_ascii_alphabetic());
    if !is_word || s.is_auxiliary(token.index) {
        return;
    }
    let lemma = token.lemma_or_text();
    if lemma.is_empty() || lemma.contains(['(', ')', ',', '"']) {
        return;
    }
    cnf.append(Literal::new("lemma", Term::constant(lemma), token_ref(token)));
}
