//! Rank and comparison policies for the tournaments.

use std::cmp::Ordering;
use std::sync::Arc;

use wordnet_types::{Pos, SynsetId, parse_synset_name};

use crate::anchor::Anchor;
use crate::error::Result;
use crate::filter::tournament::{Compared, Ranked};
use crate::filter::SentenceCtx;
use crate::tagging::TransferType;
use crate::wordnets::{Wordnets, is_wiki};
use crate::xml::stiff::Annotation;

fn flag(b: bool) -> i64 {
    i64::from(b)
}

/// 1 when the annotation has any cross-lingual support.
pub struct HasSupport;

impl Ranked for HasSupport {
    fn rank(&self, _: &SentenceCtx, ann: &Annotation) -> Result<i64> {
        Ok(flag(!ann.supports.is_empty()))
    }
}

/// 1 when some support is word-aligned.
pub struct Align;

impl Ranked for Align {
    fn rank(&self, _: &SentenceCtx, ann: &Annotation) -> Result<i64> {
        Ok(flag(
            ann.supports
                .iter()
                .any(|s| s.transfer_type == Some(TransferType::Aligned)),
        ))
    }
}

/// Length in characters of the longest supporting source anchor.
pub struct SrcCharLen;

impl Ranked for SrcCharLen {
    fn rank(&self, _: &SentenceCtx, ann: &Annotation) -> Result<i64> {
        Ok(ann
            .supports
            .iter()
            .map(|s| s.source_char_len() as i64)
            .max()
            .unwrap_or(0))
    }
}

fn head_token(ann: &Annotation) -> Option<usize> {
    let (_, start, len) = ann.token_span()?;
    Some(start + len.max(1) - 1)
}

fn last_subword(lemma: &str) -> String {
    lemma
        .rsplit(['_', ' ', '+'])
        .next()
        .unwrap_or(lemma)
        .to_lowercase()
}

/// 1 when the tagger's lemma of the head token equals the head of one of
/// the wordnet lemmas.
pub struct NaiveLemma;

impl Ranked for NaiveLemma {
    fn rank(&self, ctx: &SentenceCtx, ann: &Annotation) -> Result<i64> {
        let Some(gram) = head_token(ann).and_then(|t| ctx.grams.get(&t)) else {
            return Ok(0);
        };
        let tagged = gram.lemma.to_lowercase();
        Ok(flag(ann.wnlemmas.iter().any(|l| last_subword(l) == tagged)))
    }
}

pub(crate) fn synset_pos(raw: &str) -> Option<Pos> {
    if let Ok(id) = raw.parse::<SynsetId>() {
        return Some(id.pos);
    }
    parse_synset_name(raw).map(|(_, pos, _)| pos)
}

/// 1 when the tagger's POS agrees with the synset's, -1 when it
/// disagrees, 0 when either is unknown.
pub struct NaivePos;

impl Ranked for NaivePos {
    fn rank(&self, ctx: &SentenceCtx, ann: &Annotation) -> Result<i64> {
        let wn_pos = ann.synsets.first().and_then(|s| synset_pos(s));
        let tag_pos = head_token(ann)
            .and_then(|t| ctx.grams.get(&t))
            .and_then(|g| Pos::from_upos(&g.pos));
        Ok(match (wn_pos, tag_pos) {
            (Some(a), Some(b)) if a == b => 1,
            (Some(_), Some(_)) => -1,
            _ => 0,
        })
    }
}

/// 1 unless some token's lemma was only reached recursively.
pub struct LemmaPathRank;

impl Ranked for LemmaPathRank {
    fn rank(&self, _: &SentenceCtx, ann: &Annotation) -> Result<i64> {
        Ok(flag(ann.lemma_paths.iter().all(|p| p != "recur")))
    }
}

/// 1 when some support did not go through a derivation.
pub struct NonDeriv;

impl Ranked for NonDeriv {
    fn rank(&self, _: &SentenceCtx, ann: &Annotation) -> Result<i64> {
        Ok(flag(ann.supports.iter().any(|s| !s.is_deriv())))
    }
}

/// Negated frequency ordinal; unranked annotations lose to every ranked one.
pub struct FreqRank;

impl Ranked for FreqRank {
    fn rank(&self, _: &SentenceCtx, ann: &Annotation) -> Result<i64> {
        Ok(ann.rank.map(|r| -i64::from(r)).unwrap_or(i64::MIN))
    }
}

pub struct PreferNonWikiTarget;

impl Ranked for PreferNonWikiTarget {
    fn rank(&self, _: &SentenceCtx, ann: &Annotation) -> Result<i64> {
        Ok(flag(ann.wordnets.iter().any(|w| !is_wiki(w))))
    }
}

pub struct PreferNonWikiSource;

impl Ranked for PreferNonWikiSource {
    fn rank(&self, _: &SentenceCtx, ann: &Annotation) -> Result<i64> {
        Ok(flag(ann.supports.iter().any(|s| {
            s.source_wordnets.iter().any(|w| !is_wiki(w))
        })))
    }
}

fn dominance(a_over_b: bool, b_over_a: bool) -> Ordering {
    match (a_over_b, b_over_a) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

/// Lexicographically smaller synset ids win.
pub struct Alphabetic;

impl Compared for Alphabetic {
    fn compare(&self, _: &SentenceCtx, a: &Annotation, b: &Annotation) -> Result<Ordering> {
        Ok(b.synsets.cmp(&a.synsets))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct SrcSpan {
    from_id: String,
    start: usize,
    end: usize,
}

impl SrcSpan {
    fn strictly_contains(&self, other: &SrcSpan) -> bool {
        self.from_id == other.from_id
            && self.start <= other.start
            && other.end <= self.end
            && self != other
    }
}

fn source_spans(ann: &Annotation) -> Vec<SrcSpan> {
    let mut out = Vec::new();
    for support in &ann.supports {
        let len = support.source_char_len();
        for pos in &support.source_positions {
            let span = src_span(pos, len);
            if !out.contains(&span) {
                out.push(span);
            }
        }
    }
    out
}

fn src_span(pos: &Anchor, len: usize) -> SrcSpan {
    // Multi-token anchors in tokenised text include the separating spaces.
    let gaps = pos.token_length.map(|l| l.saturating_sub(1)).unwrap_or(0);
    SrcSpan {
        from_id: pos.from_id.clone(),
        start: pos.char,
        end: pos.char + len + gaps,
    }
}

/// `a` dominates `b` when every source span of `a` strictly contains some
/// source span of `b`.
pub struct SrcCharSpan;

impl SrcCharSpan {
    fn dominates(a: &[SrcSpan], b: &[SrcSpan]) -> bool {
        !a.is_empty() && a.iter().all(|sa| b.iter().any(|sb| sa.strictly_contains(sb)))
    }
}

impl Compared for SrcCharSpan {
    fn compare(&self, _: &SentenceCtx, a: &Annotation, b: &Annotation) -> Result<Ordering> {
        let (sa, sb) = (source_spans(a), source_spans(b));
        Ok(dominance(Self::dominates(&sa, &sb), Self::dominates(&sb, &sa)))
    }
}

/// More specific senses win: `a` dominates `b` when `b` lies on one of
/// `a`'s hypernym paths.
pub struct Hyp {
    wordnets: Arc<Wordnets>,
}

impl Hyp {
    pub fn new(wordnets: Arc<Wordnets>) -> Self {
        Self { wordnets }
    }

    fn paths(&self, ann: &Annotation) -> Vec<Vec<SynsetId>> {
        ann.synsets
            .first()
            .and_then(|s| self.wordnets.resolve(s))
            .map(|id| self.wordnets.hypernym_paths(id))
            .unwrap_or_default()
    }

    fn below(a: &[Vec<SynsetId>], b: &[Vec<SynsetId>]) -> bool {
        a.iter()
            .any(|pa| b.iter().any(|pb| pb.len() < pa.len() && pa.starts_with(pb)))
    }
}

impl Compared for Hyp {
    fn compare(&self, _: &SentenceCtx, a: &Annotation, b: &Annotation) -> Result<Ordering> {
        let (pa, pb) = (self.paths(a), self.paths(b));
        Ok(dominance(Self::below(&pa, &pb), Self::below(&pb, &pa)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::stiff::{Gram, Support};

    fn ann(synset: &str) -> Annotation {
        Annotation {
            lang: "fi".into(),
            synsets: vec![synset.into()],
            positions: vec![Anchor::tok("fi-tok", 0, 1, 1)],
            ..Default::default()
        }
    }

    #[test]
    fn naive_pos_compares_tagger_and_synset() {
        let mut ctx = SentenceCtx::default();
        ctx.grams.insert(
            1,
            Gram {
                lemma: "ystävä".into(),
                pos: "NOUN".into(),
            },
        );
        assert_eq!(NaivePos.rank(&ctx, &ann("10112591-n")).unwrap(), 1);
        assert_eq!(NaivePos.rank(&ctx, &ann("friendly.a.01")).unwrap(), -1);
        assert_eq!(NaivePos.rank(&SentenceCtx::default(), &ann("10112591-n")).unwrap(), 0);
    }

    #[test]
    fn naive_lemma_uses_head_subword() {
        let mut ctx = SentenceCtx::default();
        ctx.grams.insert(
            1,
            Gram {
                lemma: "Ystävä".into(),
                pos: "NOUN".into(),
            },
        );
        let mut a = ann("10112591-n");
        a.wnlemmas = vec!["hyvä_ystävä".into()];
        assert_eq!(NaiveLemma.rank(&ctx, &a).unwrap(), 1);
        a.wnlemmas = vec!["kaveri".into()];
        assert_eq!(NaiveLemma.rank(&ctx, &a).unwrap(), 0);
    }

    #[test]
    fn src_char_span_prefers_containing_spans() {
        let support = |char: usize, anchor: &str| Support {
            source_anchor: Some(anchor.into()),
            source_positions: vec![Anchor::untok("zh-untok", char)],
            ..Default::default()
        };
        let mut long = ann("00000001-n");
        long.supports = vec![support(0, "好莱坞")];
        let mut short = ann("00000002-n");
        short.supports = vec![support(1, "莱坞")];
        let ctx = SentenceCtx::default();
        assert_eq!(SrcCharSpan.compare(&ctx, &long, &short).unwrap(), Ordering::Greater);
        assert_eq!(SrcCharSpan.compare(&ctx, &short, &long).unwrap(), Ordering::Less);
        assert_eq!(SrcCharSpan.compare(&ctx, &long, &long).unwrap(), Ordering::Equal);
    }

    #[test]
    fn alphabetic_prefers_smaller_ids() {
        let ctx = SentenceCtx::default();
        assert_eq!(
            Alphabetic.compare(&ctx, &ann("00000001-n"), &ann("00000002-n")).unwrap(),
            Ordering::Greater
        );
    }
}
