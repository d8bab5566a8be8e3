//! Cross-lingual supports and Finnish frequency ranks.

use crate::alignment::{Side, WordAlignment};
use crate::anchor::{FI_TOK, ZH_TOK};
use crate::tagging::{DERIV, TagSupport, Tagging, TransferType};
use crate::wordnets::Wordnets;

/// Decorate tags of both taggings with supports from the other one.
///
/// Tag ids must already be assigned.
pub fn add_supports(fi: &mut Tagging, zh: &mut Tagging, alignment: &WordAlignment, wordnets: &Wordnets) {
    support_direction(fi, Side::Fi, zh, alignment, wordnets);
    support_direction(zh, Side::Zh, fi, alignment, wordnets);
}

fn tok_variant(side: Side) -> &'static str {
    match side {
        Side::Fi => FI_TOK,
        Side::Zh => ZH_TOK,
    }
}

fn support_direction(
    dest: &mut Tagging,
    side: Side,
    source: &Tagging,
    alignment: &WordAlignment,
    wordnets: &Wordnets,
) {
    let source_ids = source.canonical_ids();
    let deriv = wordnets.expand_deriv(&source_ids);
    let dest_variant = tok_variant(side);
    let source_variant = tok_variant(side.other());

    for token in &mut dest.tokens {
        let dest_span = token.token_span(dest_variant);
        for tag in &mut token.tags {
            let synset = tag.synset();
            let mut found: Vec<(usize, u32, Vec<String>)> = Vec::new();
            if source_ids.contains(&synset) {
                for (idx, src) in source.tags_for(synset) {
                    found.push((idx, src.id, Vec::new()));
                }
            }
            if let Some(origins) = deriv.get(&synset) {
                for origin in origins {
                    for (idx, src) in source.tags_for(*origin) {
                        found.push((idx, src.id, vec![DERIV.to_string()]));
                    }
                }
            }
            for (idx, transfer_from, transform_chain) in found {
                let src_span = source.tokens[idx].token_span(source_variant);
                let aligned = match (&dest_span, src_span) {
                    (Some(d), Some(s)) => alignment.spans_aligned(side, d.clone(), s),
                    _ => false,
                };
                tag.supports.push(TagSupport {
                    transfer_type: if aligned {
                        TransferType::Aligned
                    } else {
                        TransferType::Unaligned
                    },
                    transfer_from,
                    transform_chain,
                });
            }
        }
    }
}

/// Dense frequency ordinals per token; equal counts share an ordinal.
pub fn assign_ranks(fi: &mut Tagging, wordnets: &Wordnets) {
    for token in &mut fi.tokens {
        let counts: Vec<u32> = token
            .tags
            .iter()
            .map(|tag| tag.lemma_objs.iter().map(|o| wordnets.count(o)).max().unwrap_or(0))
            .collect();
        let mut distinct = counts.clone();
        distinct.sort_unstable_by(|a, b| b.cmp(a));
        distinct.dedup();
        for (tag, count) in token.tags.iter_mut().zip(counts) {
            let ordinal = distinct.iter().position(|c| *c == count).unwrap_or(0) as u32 + 1;
            tag.rank = Some((ordinal, count));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::{Anchor, ZH_UNTOK};
    use crate::t2s::T2s;
    use crate::tagging::{LemmaObj, TaggedLemma, Token, assign_ids};
    use wordnet_db::{LemmaCounts, TabWordNet};
    use wordnet_types::{Pos, SynsetId};

    fn sid(offset: u32) -> SynsetId {
        SynsetId {
            pos: Pos::Noun,
            offset,
        }
    }

    fn tag(wordnet: &str, lemma: &str, offset: u32) -> TaggedLemma {
        TaggedLemma::new(
            lemma,
            vec![LemmaObj {
                wordnet: wordnet.into(),
                synset: sid(offset),
                name: lemma.into(),
            }],
        )
    }

    fn wordnets(counts: &str) -> Wordnets {
        Wordnets::from_parts(
            vec![TabWordNet::from_entries("fin", [])],
            vec![TabWordNet::from_entries("cmn", [])],
            None,
            LemmaCounts::from_reader(counts.as_bytes()).unwrap(),
            T2s::identity(),
        )
    }

    #[test]
    fn supports_follow_alignment() {
        let mut fi = Tagging::new(vec![Token {
            token: "ystäväni".into(),
            anchors: vec![Anchor::tok(FI_TOK, 0, 0, 1)],
            tags: vec![tag("fin", "ystävä", 1), tag("fin", "ystävä", 2)],
        }]);
        let mut zh = Tagging::new(vec![
            Token {
                token: "朋友".into(),
                anchors: vec![Anchor::untok(ZH_UNTOK, 0), Anchor::tok(ZH_TOK, 0, 0, 1)],
                tags: vec![tag("cmn", "朋友", 1)],
            },
            Token {
                token: "朋友".into(),
                anchors: vec![Anchor::untok(ZH_UNTOK, 5)],
                tags: vec![tag("cmn", "朋友", 1)],
            },
        ]);
        assign_ids(&mut fi, &mut zh);
        let alignment = WordAlignment::parse("0-0").unwrap();
        add_supports(&mut fi, &mut zh, &alignment, &wordnets(""));

        let supports = &fi.tokens[0].tags[0].supports;
        assert_eq!(supports.len(), 2);
        assert_eq!(supports[0].transfer_type, TransferType::Aligned);
        assert_eq!(supports[0].transfer_from, 2);
        assert_eq!(supports[1].transfer_type, TransferType::Unaligned);
        assert!(fi.tokens[0].tags[1].supports.is_empty());
        assert_eq!(zh.tokens[0].tags[0].supports[0].transfer_from, 0);
    }

    #[test]
    fn ranks_are_dense() {
        let mut fi = Tagging::new(vec![Token {
            token: "kuusi".into(),
            anchors: vec![Anchor::tok(FI_TOK, 0, 0, 1)],
            tags: vec![tag("fin", "kuusi", 1), tag("fin", "kuusi", 2), tag("fin", "kuusi", 3)],
        }]);
        let wns = wordnets("00000001-n\tkuusi\t4\n00000002-n\tkuusi\t9\n00000003-n\tkuusi\t4\n");
        assign_ranks(&mut fi, &wns);
        let ranks: Vec<_> = fi.tokens[0].tags.iter().map(|t| t.rank).collect();
        assert_eq!(ranks, vec![Some((2, 4)), Some((1, 9)), Some((2, 4))]);
    }
}
