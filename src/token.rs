//! Annotated tokens and sentences as delivered by the annotation pipeline.
//!
//! A [`Token`] is a fixed record: every tag the rewriting core reads has its
//! own field, so there is no open-ended annotation bag to consult. Tokens are
//! created once per sentence and never mutated afterwards; literals refer to
//! them by `(text, index)` through [`Term::Token`](crate::literal::Term::Token).

use serde::{Deserialize, Serialize};

/// Index reserved for the synthetic root governor of a dependency graph.
pub const ROOT_INDEX: u32 = 0;

/// Surface text used for the synthetic root governor.
pub const ROOT_TEXT: &str = "ROOT";

/// A single annotated token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// 1-based position in the sentence, unique within it.
    pub index: u32,
    /// Surface text.
    pub text: String,
    /// Lemma (falls back to the surface text when the pipeline gives none).
    #[serde(default)]
    pub lemma: String,
    /// Penn Treebank part-of-speech tag.
    #[serde(default)]
    pub pos: String,
    /// Named-entity tag (`O` when none).
    #[serde(default = "default_ner")]
    pub ner: String,
    /// Word-sense key (e.g. a WordNet synset id).
    #[serde(default)]
    pub sense: Option<String>,
    /// Ontology class or instance the sense maps to.
    #[serde(default)]
    pub ontology_sense: Option<String>,
}

fn default_ner() -> String {
    "O".into()
}

impl Token {
    /// Create a token with only text and index; other tags are empty.
    pub fn new(index: u32, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            index,
            lemma: text.clone(),
            text,
            pos: String::new(),
            ner: default_ner(),
            sense: None,
            ontology_sense: None,
        }
    }

    pub fn with_lemma(mut self, lemma: impl Into<String>) -> Self {
        self.lemma = lemma.into();
        self
    }

    pub fn with_pos(mut self, pos: impl Into<String>) -> Self {
        self.pos = pos.into();
        self
    }

    pub fn with_ner(mut self, ner: impl Into<String>) -> Self {
        self.ner = ner.into();
        self
    }

    pub fn with_sense(mut self, sense: impl Into<String>) -> Self {
        self.sense = Some(sense.into());
        self
    }

    pub fn with_ontology_sense(mut self, class: impl Into<String>) -> Self {
        self.ontology_sense = Some(class.into());
        self
    }

    /// The lemma, or the surface text if the lemma is empty.
    pub fn lemma_or_text(&self) -> &str {
        if self.lemma.is_empty() {
            &self.text
        } else {
            &self.lemma
        }
    }

    /// Render as `text-index`, the form used inside literals.
    pub fn label(&self) -> String {
        format!("{}-{}", self.text, self.index)
    }

    pub fn is_verb(&self) -> bool {
        self.pos.starts_with("VB")
    }

    pub fn is_noun(&self) -> bool {
        self.pos.starts_with("NN")
    }

    pub fn is_pronoun(&self) -> bool {
        self.pos == "PRP" || self.pos == "PRP$"
    }

    pub fn has_entity(&self) -> bool {
        !self.ner.is_empty() && self.ner != "O"
    }
}

/// A labeled dependency edge `relation(governor, dependent)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub relation: String,
    /// Governor index; [`ROOT_INDEX`] for the root edge.
    pub governor: u32,
    pub dependent: u32,
}

impl Dependency {
    pub fn new(relation: impl Into<String>, governor: u32, dependent: u32) -> Self {
        Self {
            relation: relation.into(),
            governor,
            dependent,
        }
    }
}

/// One annotated sentence: ordered tokens plus its dependency graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl Sentence {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, relation: &str, governor: u32, dependent: u32) -> Self {
        self.dependencies
            .push(Dependency::new(relation, governor, dependent));
        self
    }

    /// Look up a token by its 1-based index.
    pub fn token(&self, index: u32) -> Option<&Token> {
        // Tokens are normally stored in index order; fall back to a scan.
        let pos = (index as usize).checked_sub(1)?;
        match self.tokens.get(pos) {
            Some(tok) if tok.index == index => Some(tok),
            _ => self.tokens.iter().find(|t| t.index == index),
        }
    }

    /// Surface text of a token index, `ROOT` for index 0.
    pub fn text_of(&self, index: u32) -> Option<&str> {
        if index == ROOT_INDEX {
            return Some(ROOT_TEXT);
        }
        self.token(index).map(|t| t.text.as_str())
    }

    /// Whether `index` names a dependent of an `aux` or `auxpass` edge.
    pub fn is_auxiliary(&self, index: u32) -> bool {
        self.dependencies
            .iter()
            .any(|d| d.dependent == index && (d.relation == "aux" || d.relation == "auxpass"))
    }

    /// Plain text of the sentence, tokens joined with single spaces.
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
