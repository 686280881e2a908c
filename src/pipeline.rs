//! Document pipeline: annotated document in, rewritten clause sets out.
//!
//! Per sentence the stages run in this order:
//!
//! 1. **Adapt**: dependency and information literals from the annotations.
//! 2. **Scrub**: when the sentence has augmentation clusters, drop the
//!    dependencies on numeric tokens.
//! 3. **Collapse segments**, then **substitute coreference**.
//! 4. **Augment**: merge measure and time clauses (substituted the same way).
//! 5. **Rewrite** to a fixpoint.
//!
//! Substitution groups are built once per document. Sentences are
//! independent, so [`Pipeline::process_parallel`] fans them out over rayon
//! with one interpreter clone per worker.

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::adapter::Adapter;
use crate::augment::{self, Augmented};
use crate::binding::Binding;
use crate::cnf::Cnf;
use crate::config::RewriteConfig;
use crate::document::Document;
use crate::error::{RewriteWarning, SemResult};
use crate::interpreter::{FiredRule, Interpreter};
use crate::literal::Term;
use crate::ontology::{NullOntology, Ontology, Taxonomy, TimedOntology};
use crate::render;
use crate::rules::RuleSet;
use crate::substitution::SubstitutionGroup;

/// Everything produced for one sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceOutcome {
    pub sentence: usize,
    pub text: String,
    /// Clause set straight from the adapter.
    pub original: Cnf,
    /// Clause set the interpreter started from.
    pub input: Cnf,
    /// Final clause set.
    pub output: Cnf,
    pub formulas: Vec<String>,
    pub fired: Vec<FiredRule>,
    pub iterations: usize,
    pub converged: bool,
    pub stopped: bool,
    pub warnings: Vec<RewriteWarning>,
}

impl SentenceOutcome {
    pub fn rendered(&self) -> Vec<String> {
        self.output.render()
    }

    /// Bindings of every application of `rule`.
    pub fn bindings_of(&self, rule: &str) -> Vec<&Binding> {
        self.fired
            .iter()
            .filter(|f| f.rule == rule)
            .map(|f| &f.binding)
            .collect()
    }
}

/// Everything produced for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub id: Option<String>,
    pub sentences: Vec<SentenceOutcome>,
    pub segments: SubstitutionGroup,
    pub coreference: SubstitutionGroup,
}

impl DocumentOutcome {
    pub fn groups(&self) -> [&SubstitutionGroup; 2] {
        [&self.segments, &self.coreference]
    }

    pub fn warnings(&self) -> impl Iterator<Item = &RewriteWarning> {
        self.sentences.iter().flat_map(|s| s.warnings.iter())
    }

    /// Whether every sentence reached a fixpoint.
    pub fn converged(&self) -> bool {
        self.sentences.iter().all(|s| s.converged)
    }

    /// Output of one sentence with original surface spans restored.
    pub fn display(&self, sentence: usize) -> Option<Vec<String>> {
        let outcome = self.sentences.get(sentence)?;
        Some(render::display(&outcome.output, &self.groups()))
    }
}

/// Substitution groups shared by the sentences of one document.
struct Prepared {
    segments: SubstitutionGroup,
    coreference: SubstitutionGroup,
}

impl Prepared {
    fn substitute(&self, cnf: &Cnf, sentence: usize) -> Cnf {
        let collapsed = self.segments.apply(cnf, sentence);
        self.coreference.apply(&collapsed, sentence)
    }

    /// Substitute augmentation clauses, leaving their counters alone.
    fn substitute_augmented(&self, augmented: &Augmented, sentence: usize) -> Cnf {
        let fixed = |term: &Term| augmented.is_synthetic(term);
        let collapsed = self.segments.apply_except(&augmented.clauses, sentence, fixed);
        self.coreference.apply_except(&collapsed, sentence, fixed)
    }
}

/// Runs documents through adapter, substitution, augmentation and rewrite.
#[derive(Clone)]
pub struct Pipeline {
    interpreter: Interpreter,
    ontology: Arc<dyn Ontology>,
    config: RewriteConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("interpreter", &self.interpreter)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Build a pipeline. With `guard_timeout_ms` set, every ontology call
    /// (guards and adapter lookups) runs under that timeout.
    pub fn new(rules: Arc<RuleSet>, ontology: Arc<dyn Ontology>, config: RewriteConfig) -> Self {
        let ontology: Arc<dyn Ontology> = match config.guard_timeout() {
            Some(timeout) => Arc::new(TimedOntology::new(ontology, timeout)),
            None => ontology,
        };
        let interpreter = Interpreter::new(rules, Arc::clone(&ontology), config.interpreter());
        Self {
            interpreter,
            ontology,
            config,
        }
    }

    /// Build a pipeline from a rule file and an optional taxonomy file.
    /// Without a taxonomy, guards see an empty ontology.
    pub fn from_files(rules: &Path, taxonomy: Option<&Path>, config: RewriteConfig) -> SemResult<Self> {
        let rules = Arc::new(RuleSet::from_file(rules)?);
        let ontology: Arc<dyn Ontology> = match taxonomy {
            Some(path) => Arc::new(Taxonomy::from_file(path)?),
            None => Arc::new(NullOntology),
        };
        Ok(Self::new(rules, ontology, config))
    }

    /// Load an annotated document and process it.
    pub fn process_file(&self, document: &Path, parallel: bool) -> SemResult<DocumentOutcome> {
        let doc = Document::from_file(document)?;
        Ok(if parallel {
            self.process_parallel(&doc)
        } else {
            self.process(&doc)
        })
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    fn prepare(&self, doc: &Document) -> Prepared {
        Prepared {
            segments: SubstitutionGroup::from_segments(doc),
            coreference: SubstitutionGroup::from_coreference(doc),
        }
    }

    /// Process every sentence in order on the calling thread.
    pub fn process(&self, doc: &Document) -> DocumentOutcome {
        let prepared = self.prepare(doc);
        let sentences = (0..doc.sentences.len())
            .map(|i| self.process_sentence(&self.interpreter, doc, &prepared, i))
            .collect();
        self.finish(doc, prepared, sentences)
    }

    /// Process sentences in parallel. Results keep sentence order and equal
    /// those of [`Pipeline::process`].
    pub fn process_parallel(&self, doc: &Document) -> DocumentOutcome {
        let prepared = self.prepare(doc);
        let sentences = (0..doc.sentences.len())
            .into_par_iter()
            .map_init(
                || self.interpreter.clone(),
                |interpreter, i| self.process_sentence(interpreter, doc, &prepared, i),
            )
            .collect();
        self.finish(doc, prepared, sentences)
    }

    fn finish(&self, doc: &Document, prepared: Prepared, sentences: Vec<SentenceOutcome>) -> DocumentOutcome {
        let outcome = DocumentOutcome {
            id: doc.id.clone(),
            sentences,
            segments: prepared.segments,
            coreference: prepared.coreference,
        };
        tracing::info!(
            document = doc.id.as_deref().unwrap_or("-"),
            sentences = outcome.sentences.len(),
            warnings = outcome.warnings().count(),
            converged = outcome.converged(),
            "document processed"
        );
        outcome
    }

    fn process_sentence(
        &self,
        interpreter: &Interpreter,
        doc: &Document,
        prepared: &Prepared,
        sentence: usize,
    ) -> SentenceOutcome {
        let s = &doc.sentences[sentence];
        let adapter_config = self.config.adapter();
        let adapted = Adapter::new(&adapter_config, self.ontology.as_ref()).sentence_cnf(sentence, s);
        let mut warnings = adapted.warnings;
        warnings.extend(prepared.segments.warnings_for(sentence).cloned());
        warnings.extend(prepared.coreference.warnings_for(sentence).cloned());

        let original = adapted.cnf;
        let mut working = original.clone();
        let clusters = doc.augmentations_for(sentence);
        if !clusters.is_empty() && self.config.scrub_numeric_dependencies {
            augment::scrub_numeric_dependencies(&mut working, s);
        }
        let mut input = prepared.substitute(&working, sentence);
        if !clusters.is_empty() {
            let mut augmented = augment::build(sentence, s, &clusters);
            augmented.clauses = prepared.substitute_augmented(&augmented, sentence);
            augment::merge(&mut input, &augmented);
            warnings.extend(augmented.warnings);
        }

        let outcome = interpreter.rewrite_sentence(sentence, &input);
        warnings.extend(outcome.warnings);
        SentenceOutcome {
            sentence,
            text: s.text(),
            original,
            input,
            output: outcome.cnf,
            formulas: outcome.formulas,
            fired: outcome.fired,
            iterations: outcome.iterations,
            converged: outcome.converged,
            stopped: outcome.stopped,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Mention, Segment};
    use crate::ontology::NullOntology;
    use crate::token::{Sentence, Token};

    fn pipeline(rules: &str) -> Pipeline {
        let rules = Arc::new(RuleSet::parse("test", rules).unwrap());
        let config = RewriteConfig {
            pos_literals: false,
            lemma_literals: false,
            sense_literals: false,
            ..Default::default()
        };
        Pipeline::new(rules, Arc::new(NullOntology), config)
    }

    fn document() -> Document {
        let first = Sentence::new(vec![
            Token::new(1, "John").with_pos("NNP"),
            Token::new(2, "Smith").with_pos("NNP"),
            Token::new(3, "arrived").with_pos("VBD"),
        ])
        .with_dependency("compound", 2, 1)
        .with_dependency("nsubj", 3, 2);
        let second = Sentence::new(vec![
            Token::new(1, "He").with_pos("PRP"),
            Token::new(2, "left").with_pos("VBD"),
        ])
        .with_dependency("nsubj", 2, 1);
        Document::new(vec![first, second])
            .with_segment(Segment::new(0, 1, 3))
            .with_chain("7", vec![Mention::new(1, 1, 2), Mention::new(0, 1, 3)])
    }

    #[test]
    fn segments_and_coreference_reach_the_rules() {
        let p = pipeline("nsubj(?V,?A) ==> agent(?V,?A).");
        let out = p.process(&document());
        assert_eq!(
            out.sentences[0].rendered(),
            vec!["nsubj(arrived-3,John_Smith-1)", "agent(arrived-3,John_Smith-1)"]
        );
        assert_eq!(
            out.sentences[1].rendered(),
            vec!["nsubj(left-2,John_Smith-1)", "agent(left-2,John_Smith-1)"]
        );
        assert_eq!(out.sentences[1].original.render(), vec!["nsubj(left-2,He-1)"]);
        assert_eq!(
            out.display(1).unwrap(),
            vec!["nsubj(left-2,John Smith)", "agent(left-2,John Smith)"]
        );
    }

    #[test]
    fn time_counters_survive_coreference() {
        use crate::augment::{Augmentation, TimeParts};

        let first = Sentence::new(vec![
            Token::new(1, "John").with_pos("NNP"),
            Token::new(2, "arrived").with_pos("VBD"),
        ])
        .with_dependency("nsubj", 2, 1);
        let second = Sentence::new(vec![
            Token::new(1, "He").with_pos("PRP"),
            Token::new(2, "left").with_pos("VBD"),
            Token::new(3, "1999").with_pos("CD").with_ner("DATE"),
        ])
        .with_dependency("nsubj", 2, 1)
        .with_dependency("tmod", 2, 3);
        let year = TimeParts {
            year: Some(1999),
            ..Default::default()
        };
        let doc = Document::new(vec![first, second])
            .with_chain("1", vec![Mention::new(0, 1, 2), Mention::new(1, 1, 2)])
            .with_augmentation(Augmentation::time(1, 2, year));

        let out = pipeline("nsubj(?V,?A) ==> agent(?V,?A).").process(&doc);
        let rendered = out.sentences[1].rendered();
        for expected in [
            "nsubj(left-2,John-1)",
            "agent(left-2,John-1)",
            "time(left-2,time-1)",
            "year(time-1,1999)",
        ] {
            assert!(rendered.iter().any(|r| r == expected), "missing {expected} in {rendered:?}");
        }
        assert!(!rendered.iter().any(|r| r == "time(left-2,John-1)"));
        assert!(!rendered.iter().any(|r| r == "year(John-1,1999)"));
    }

    #[test]
    fn parallel_matches_sequential() {
        let p = pipeline("nsubj(?V,?A) ==> agent(?V,?A).");
        let doc = document();
        let seq = p.process(&doc);
        let par = p.process_parallel(&doc);
        assert_eq!(seq.sentences.len(), par.sentences.len());
        for (a, b) in seq.sentences.iter().zip(&par.sentences) {
            assert_eq!(a.sentence, b.sentence);
            assert_eq!(a.output, b.output);
        }
    }

    #[test]
    fn warnings_are_collected_per_sentence() {
        let p = pipeline("nsubj(?V,?A) ==> agent(?V,?A).");
        let mut doc = document();
        doc.sentences[1] = doc.sentences[1].clone().with_dependency("dobj", 2, 8);
        let out = p.process(&doc);
        assert!(out.sentences[0].warnings.is_empty());
        assert_eq!(out.sentences[1].warnings.len(), 1);
        assert_eq!(out.warnings().count(), 1);
    }
}
