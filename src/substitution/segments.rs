//! Multi-word segment collapsing.

use super::{GroupKind, Replacement, SubstitutionGroup, TokenKey};
use crate::document::{Document, Mention};
use crate::error::RewriteWarning;

impl SubstitutionGroup {
    /// Collapse every segment of `document` onto one canonical token.
    ///
    /// The canonical token takes the segment's canonical form (spaces become
    /// `_`), or the joined token texts, and the index of its first token.
    /// Single-token segments without a canonical form change nothing and are
    /// skipped.
    pub fn from_segments(document: &Document) -> Self {
        let mut group = SubstitutionGroup::new(GroupKind::Segments);
        for segment in &document.segments {
            let span = Mention::new(segment.sentence, segment.start, segment.end);
            let Some(tokens) = document.mention_tokens(&span) else {
                group.warn(RewriteWarning::MalformedInputFact {
                    sentence: segment.sentence,
                    detail: format!("segment {}..{} is out of range", segment.start, segment.end),
                });
                continue;
            };
            let Some(mut replacement) = Replacement::from_tokens(&tokens) else {
                continue;
            };
            match &segment.canonical {
                Some(canonical) => {
                    replacement.text = canonical.split_whitespace().collect::<Vec<_>>().join("_");
                }
                None if tokens.len() == 1 => continue,
                None => {}
            }
            for token in &tokens {
                group.insert(TokenKey::new(segment.sentence, token.index), replacement.clone());
            }
        }
        tracing::debug!(substitutions = group.len(), "built segment group");
        group
    }
}
