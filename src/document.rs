//! Annotated input documents.
//!
//! A document is what the upstream annotation pipeline hands over: sentences
//! of tokens with their dependency edges, coreference chains across those
//! sentences, multi-word segments and numeric/date augmentation clusters.
//! Documents are read from JSON.
//!
//! Sentence numbers are 0-based positions in [`Document::sentences`]; token
//! indices are 1-based within their sentence. Spans are half-open
//! (`end` is exclusive).

use std::collections::BTreeMap;
use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::augment::Augmentation;
use crate::token::{Sentence, Token};

/// Errors reading an input document.
#[derive(Debug, Error, Diagnostic)]
pub enum DocumentError {
    #[error("failed to read document: {path}")]
    #[diagnostic(
        code(sem::document::read),
        help("Ensure the document file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse document {path}: {message}")]
    #[diagnostic(
        code(sem::document::parse),
        help("Documents are JSON objects with a \"sentences\" array of {{tokens, dependencies}}.")
    )]
    Parse { path: String, message: String },
}

pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

/// One mention of a coreference chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Mention {
    pub sentence: usize,
    pub start: u32,
    pub end: u32,
}

impl Mention {
    pub fn new(sentence: usize, start: u32, end: u32) -> Self {
        Self { sentence, start, end }
    }

    pub fn contains(&self, sentence: usize, index: u32) -> bool {
        self.sentence == sentence && (self.start..self.end).contains(&index)
    }

    pub fn indices(&self) -> std::ops::Range<u32> {
        self.start..self.end
    }
}

/// An externally segmented multi-word unit, typically a named entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub sentence: usize,
    pub start: u32,
    pub end: u32,
    /// Canonical form; defaults to the token texts joined with `_`.
    #[serde(default)]
    pub canonical: Option<String>,
    /// Entity type reported by the segmenter, if any.
    #[serde(default)]
    pub kind: Option<String>,
}

impl Segment {
    pub fn new(sentence: usize, start: u32, end: u32) -> Self {
        Self {
            sentence,
            start,
            end,
            canonical: None,
            kind: None,
        }
    }

    pub fn with_canonical(mut self, canonical: impl Into<String>) -> Self {
        self.canonical = Some(canonical.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// A fully annotated document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: Option<String>,
    pub sentences: Vec<Sentence>,
    /// Coreference chains keyed by chain id.
    #[serde(default)]
    pub coref_chains: BTreeMap<String, Vec<Mention>>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub augmentations: Vec<Augmentation>,
}

impl Document {
    pub fn new(sentences: Vec<Sentence>) -> Self {
        Self {
            sentences,
            ..Default::default()
        }
    }

    pub fn with_chain(mut self, id: impl Into<String>, mentions: Vec<Mention>) -> Self {
        self.coref_chains.insert(id.into(), mentions);
        self
    }

    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn with_augmentation(mut self, augmentation: Augmentation) -> Self {
        self.augmentations.push(augmentation);
        self
    }

    pub fn sentence(&self, sentence: usize) -> Option<&Sentence> {
        self.sentences.get(sentence)
    }

    pub fn token(&self, sentence: usize, index: u32) -> Option<&Token> {
        self.sentences.get(sentence)?.token(index)
    }

    /// The tokens of a mention, or `None` if any of them is out of range.
    pub fn mention_tokens(&self, mention: &Mention) -> Option<Vec<&Token>> {
        if mention.start >= mention.end {
            return None;
        }
        mention
            .indices()
            .map(|i| self.token(mention.sentence, i))
            .collect()
    }

    /// Augmentation clusters that belong to one sentence, in document order.
    pub fn augmentations_for(&self, sentence: usize) -> Vec<&Augmentation> {
        self.augmentations
            .iter()
            .filter(|a| a.sentence() == sentence)
            .collect()
    }

    pub fn from_json_str(text: &str, origin: &str) -> DocumentResult<Self> {
        serde_json::from_str(text).map_err(|e| DocumentError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_file(path: &Path) -> DocumentResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DocumentError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let doc = Self::from_json_str(&text, &path.display().to_string())?;
        tracing::info!(
            path = %path.display(),
            sentences = doc.sentences.len(),
            chains = doc.coref_chains.len(),
            "loaded document"
        );
        Ok(doc)
    }
}
