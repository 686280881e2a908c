//! Coreference substitution.
//!
//! For a chain with more than one mention the root mention is the earliest
//! one in document order. Every other mention is pointed at a canonical
//! token built from the root: the longest run of root tokens sharing one
//! part-of-speech tag, so `Jon Bov Joni the leader` contributes only
//! `Jon_Bov_Joni`. A determiner at the head of a run passes the tag on to
//! the next token. Reflexive pronouns are never substituted.

use super::{GroupKind, Replacement, SubstitutionGroup, TokenKey};
use crate::document::{Document, Mention};
use crate::error::RewriteWarning;
use crate::token::Token;

/// Pronouns that refer back within their own clause and keep their token.
pub const REFLEXIVE_PRONOUNS: &[&str] = &[
    "himself",
    "herself",
    "itself",
    "themselves",
    "myself",
    "yourself",
    "ourselves",
    "yourselves",
    "oneself",
];

fn is_reflexive(token: &Token) -> bool {
    let lower = token.text.to_lowercase();
    REFLEXIVE_PRONOUNS.contains(&lower.as_str())
}

/// Leading tokens that share one tag.
///
/// `master` seeds the tag; an empty master or a `DT` tag takes the tag of the
/// token under inspection instead.
fn same_tag_run<'t>(tokens: &[&'t Token], master: &str) -> Vec<&'t Token> {
    let mut tag = master.to_string();
    let mut run = Vec::new();
    for &token in tokens {
        if tag.is_empty() || tag == "DT" {
            tag = token.pos.clone();
        }
        if token.pos != tag {
            break;
        }
        run.push(token);
    }
    run
}

fn overlaps(a: &Mention, b: &Mention) -> bool {
    a.sentence == b.sentence && a.start < b.end && b.start < a.end
}

impl SubstitutionGroup {
    /// Build the coreference group of a document.
    ///
    /// Chains are visited in id order and mentions in document order, so the
    /// result does not depend on how the chains were listed.
    pub fn from_coreference(document: &Document) -> Self {
        let mut group = SubstitutionGroup::new(GroupKind::Coreference);
        for (chain, mentions) in &document.coref_chains {
            let mut valid: Vec<(Mention, Vec<&Token>)> = Vec::new();
            for mention in mentions {
                match document.mention_tokens(mention) {
                    Some(tokens) => valid.push((*mention, tokens)),
                    None => group.warn(RewriteWarning::MalformedInputFact {
                        sentence: mention.sentence,
                        detail: format!(
                            "coreference chain {chain}: mention {}..{} is out of range",
                            mention.start, mention.end
                        ),
                    }),
                }
            }
            if valid.len() < 2 {
                continue;
            }
            valid.sort_by_key(|(m, _)| *m);
            let (root, root_tokens) = &valid[0];

            for (mention, tokens) in &valid[1..] {
                if overlaps(root, mention) {
                    continue;
                }
                let Some(&first) = tokens.first() else {
                    continue;
                };
                if is_reflexive(first) {
                    tracing::trace!(chain = %chain, token = %first.label(), "reflexive pronoun kept");
                    continue;
                }
                let master = if first.is_pronoun() { "" } else { first.pos.as_str() };
                let canonical: Vec<&Token> = same_tag_run(root_tokens, master)
                    .into_iter()
                    .filter(|t| t.pos != "DT")
                    .collect();
                let Some(replacement) = Replacement::from_tokens(&canonical) else {
                    tracing::trace!(chain = %chain, mention = %first.label(), "no canonical run; mention kept");
                    continue;
                };
                for token in same_tag_run(tokens, "") {
                    group.insert(TokenKey::new(mention.sentence, token.index), replacement.clone());
                }
            }
        }
        tracing::debug!(substitutions = group.len(), "built coreference group");
        group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::Cnf;
    use crate::token::Sentence;

    fn tok(index: u32, text: &str, pos: &str) -> Token {
        Token::new(index, text).with_pos(pos)
    }

    /// "John ... he ... him" with mentions at positions 2, 7 and 12.
    fn long_sentence() -> Sentence {
        let words = [
            ("Yesterday", "NN"),
            ("John", "NNP"),
            ("said", "VBD"),
            ("that", "IN"),
            ("the", "DT"),
            ("car", "NN"),
            ("he", "PRP"),
            ("bought", "VBD"),
            ("had", "VBD"),
            ("failed", "VBN"),
            ("on", "IN"),
            ("him", "PRP"),
        ];
        Sentence::new(
            words
                .iter()
                .enumerate()
                .map(|(i, (w, p))| tok(i as u32 + 1, w, p))
                .collect(),
        )
    }

    #[test]
    fn root_is_earliest_mention_regardless_of_order() {
        let orders = [[2, 7, 12], [12, 2, 7], [7, 12, 2]];
        for order in orders {
            let doc = Document::new(vec![long_sentence()]).with_chain(
                "1",
                order.iter().map(|&i| Mention::new(0, i, i + 1)).collect(),
            );
            let g = SubstitutionGroup::from_coreference(&doc);
            assert_eq!(g.len(), 2, "order {order:?}");
            for i in [7, 12] {
                let rep = g.get(0, i).unwrap();
                assert_eq!((rep.text.as_str(), rep.index), ("John", 2));
            }
            assert!(g.get(0, 2).is_none());
        }
    }

    #[test]
    fn reflexive_pronouns_are_kept() {
        let s = Sentence::new(vec![
            tok(1, "Mary", "NNP"),
            tok(2, "hurt", "VBD"),
            tok(3, "herself", "PRP"),
        ]);
        let doc = Document::new(vec![s]).with_chain(
            "4",
            vec![Mention::new(0, 1, 2), Mention::new(0, 3, 4)],
        );
        assert!(SubstitutionGroup::from_coreference(&doc).is_empty());
    }

    #[test]
    fn root_span_is_truncated_to_one_tag() {
        let first = Sentence::new(vec![
            tok(1, "Jon", "NNP"),
            tok(2, "Bov", "NNP"),
            tok(3, "Joni", "NNP"),
            tok(4, "the", "DT"),
            tok(5, "leader", "NN"),
            tok(6, "spoke", "VBD"),
        ]);
        let second = Sentence::new(vec![tok(1, "He", "PRP"), tok(2, "left", "VBD")]);
        let doc = Document::new(vec![first, second]).with_chain(
            "2",
            vec![Mention::new(0, 1, 6), Mention::new(1, 1, 2)],
        );
        let g = SubstitutionGroup::from_coreference(&doc);
        let rep = g.get(1, 1).unwrap();
        assert_eq!(rep.term().to_string(), "Jon_Bov_Joni-1");
        assert_eq!(rep.surface, "Jon Bov Joni");

        let cnf: Cnf = "nsubj(left-2,He-1)".parse().unwrap();
        assert_eq!(g.apply(&cnf, 1).render(), vec!["nsubj(left-2,Jon_Bov_Joni-1)"]);
    }

    #[test]
    fn determiner_passes_the_tag_on() {
        let first = Sentence::new(vec![
            tok(1, "The", "DT"),
            tok(2, "dog", "NN"),
            tok(3, "barked", "VBD"),
        ]);
        let second = Sentence::new(vec![
            tok(1, "the", "DT"),
            tok(2, "dog", "NN"),
            tok(3, "slept", "VBD"),
        ]);
        let doc = Document::new(vec![first, second]).with_chain(
            "3",
            vec![Mention::new(1, 1, 3), Mention::new(0, 1, 3)],
        );
        let g = SubstitutionGroup::from_coreference(&doc);
        assert_eq!(g.get(1, 2).unwrap().term().to_string(), "dog-2");

        let cnf: Cnf = "det(dog-2,the-1), nsubj(slept-3,dog-2)".parse().unwrap();
        // Both mention tokens map to the root; the internal det edge goes.
        assert_eq!(g.apply(&cnf, 1).render(), vec!["nsubj(slept-3,dog-2)"]);
    }

    #[test]
    fn single_mention_chains_and_bad_mentions() {
        let doc = Document::new(vec![long_sentence()])
            .with_chain("1", vec![Mention::new(0, 2, 3)])
            .with_chain("2", vec![Mention::new(0, 2, 3), Mention::new(3, 1, 2)]);
        let g = SubstitutionGroup::from_coreference(&doc);
        assert!(g.is_empty());
        assert_eq!(g.warnings().len(), 1);
        assert_eq!(g.warnings_for(3).count(), 1);
    }
}
