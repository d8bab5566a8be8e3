//! Greedy longest-span selection.
//!
//! Start positions are visited in order. At each position not yet covered
//! by an earlier winner, every annotation of maximal length wins and the
//! cursor moves past it; annotations starting inside a winner lose. Ties
//! are all kept, so these filters never impose a total order on their own.

use std::collections::BTreeMap;

use bitvec::prelude::*;

use crate::error::Result;
use crate::filter::{SentenceCtx, Tournament};

/// `(lang, variant)` → `(start, len, annotation position)`.
type Lanes = BTreeMap<(String, String), Vec<(usize, usize, usize)>>;

fn greedy(lanes: Lanes, alive: &mut BitVec) {
    for (_, mut spans) in lanes {
        spans.sort_unstable();
        let mut cursor = 0;
        let mut idx = 0;
        while idx < spans.len() {
            let start = spans[idx].0;
            let end = spans[idx..]
                .iter()
                .position(|s| s.0 != start)
                .map_or(spans.len(), |n| idx + n);
            let at_start = &spans[idx..end];
            if start < cursor {
                for (_, _, pos) in at_start {
                    alive.set(*pos, false);
                }
            } else {
                let longest = at_start.iter().map(|s| s.1).max().unwrap_or(0);
                for (_, len, pos) in at_start {
                    if *len < longest {
                        alive.set(*pos, false);
                    }
                }
                cursor = start + longest.max(1);
            }
            idx = end;
        }
    }
}

/// Longest token span wins.
pub struct TokSpanDom;

impl Tournament for TokSpanDom {
    fn key_name(&self) -> &'static str {
        "tok-span"
    }

    fn survivors(&self, ctx: &SentenceCtx) -> Result<BitVec> {
        let mut alive = bitvec![1; ctx.annotations.len()];
        let mut lanes = Lanes::new();
        for (pos, ann) in ctx.annotations.iter().enumerate() {
            if let Some((from_id, start, len)) = ann.token_span() {
                lanes
                    .entry((ann.lang.clone(), from_id.to_string()))
                    .or_default()
                    .push((start, len, pos));
            }
        }
        greedy(lanes, &mut alive);
        Ok(alive)
    }
}

/// Longest character span wins among single-token and untokenised
/// annotations; multi-token annotations are left alone.
pub struct CharSpanDom;

impl Tournament for CharSpanDom {
    fn key_name(&self) -> &'static str {
        "char-span"
    }

    fn survivors(&self, ctx: &SentenceCtx) -> Result<BitVec> {
        let mut alive = bitvec![1; ctx.annotations.len()];
        let mut lanes = Lanes::new();
        for (pos, ann) in ctx.annotations.iter().enumerate() {
            if ann.token_span().is_some_and(|(_, _, len)| len > 1) {
                continue;
            }
            let Some(anchor) = ann.primary_position() else {
                continue;
            };
            lanes
                .entry((ann.lang.clone(), anchor.from_id.clone()))
                .or_default()
                .push((anchor.char, ann.anchor_char_len(), pos));
        }
        greedy(lanes, &mut alive);
        Ok(alive)
    }
}
