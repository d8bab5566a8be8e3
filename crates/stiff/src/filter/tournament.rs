use std::cmp::Ordering;
use std::marker::PhantomData;

use bitvec::prelude::*;

use crate::error::Result;
use crate::filter::{Keyed, SentenceCtx, Tournament, groups};
use crate::xml::stiff::Annotation;

/// A numeric score per annotation; higher is better.
pub trait Ranked: Send + Sync {
    fn rank(&self, ctx: &SentenceCtx, ann: &Annotation) -> Result<i64>;
}

impl<R: Ranked + ?Sized> Ranked for Box<R> {
    fn rank(&self, ctx: &SentenceCtx, ann: &Annotation) -> Result<i64> {
        (**self).rank(ctx, ann)
    }
}

/// A three-valued comparison; `Greater` means `a` dominates `b`.
pub trait Compared: Send + Sync {
    fn compare(&self, ctx: &SentenceCtx, a: &Annotation, b: &Annotation) -> Result<Ordering>;
}

impl<C: Compared + ?Sized> Compared for Box<C> {
    fn compare(&self, ctx: &SentenceCtx, a: &Annotation, b: &Annotation) -> Result<Ordering> {
        (**self).compare(ctx, a, b)
    }
}

/// Remove listed ranks, then optionally keep only the best rank per group.
pub struct RankTournament<R, K> {
    ranker: R,
    do_dom: bool,
    rm_ranks: Vec<i64>,
    key: PhantomData<fn() -> K>,
}

impl<R: Ranked, K: Keyed> RankTournament<R, K> {
    pub fn new(ranker: R, do_dom: bool, rm_ranks: Vec<i64>) -> Self {
        Self {
            ranker,
            do_dom,
            rm_ranks,
            key: PhantomData,
        }
    }

    pub fn ranks(&self, ctx: &SentenceCtx) -> Result<Vec<i64>> {
        ctx.annotations
            .iter()
            .map(|ann| self.ranker.rank(ctx, ann))
            .collect()
    }
}

impl<R: Ranked, K: Keyed> Tournament for RankTournament<R, K> {
    fn key_name(&self) -> &'static str {
        K::NAME
    }

    fn survivors(&self, ctx: &SentenceCtx) -> Result<BitVec> {
        let ranks = self.ranks(ctx)?;
        let mut alive = bitvec![1; ranks.len()];
        for (idx, rank) in ranks.iter().enumerate() {
            if self.rm_ranks.contains(rank) {
                alive.set(idx, false);
            }
        }
        if self.do_dom {
            for members in groups::<K>(ctx, &alive).into_values() {
                let best = members.iter().map(|i| ranks[*i]).max().unwrap_or(i64::MIN);
                for idx in members {
                    if ranks[idx] < best {
                        alive.set(idx, false);
                    }
                }
            }
        }
        Ok(alive)
    }
}

/// Within each group keep the annotations no other member strictly
/// dominates.
pub struct PairwiseTournament<C, K> {
    cmp: C,
    key: PhantomData<fn() -> K>,
}

impl<C: Compared, K: Keyed> PairwiseTournament<C, K> {
    pub fn new(cmp: C) -> Self {
        Self {
            cmp,
            key: PhantomData,
        }
    }
}

impl<C: Compared, K: Keyed> Tournament for PairwiseTournament<C, K> {
    fn key_name(&self) -> &'static str {
        K::NAME
    }

    fn survivors(&self, ctx: &SentenceCtx) -> Result<BitVec> {
        let all = bitvec![1; ctx.annotations.len()];
        let mut alive = all.clone();
        for members in groups::<K>(ctx, &all).into_values() {
            for &b in &members {
                for &a in &members {
                    if a == b {
                        continue;
                    }
                    let ordering = self
                        .cmp
                        .compare(ctx, &ctx.annotations[a], &ctx.annotations[b])?;
                    if ordering == Ordering::Greater {
                        alive.set(b, false);
                        break;
                    }
                }
            }
        }
        Ok(alive)
    }
}

/// Remove every annotation whose group still has more than one member.
pub struct RmAmbiguous<K> {
    key: PhantomData<fn() -> K>,
}

impl<K: Keyed> RmAmbiguous<K> {
    pub fn new() -> Self {
        Self { key: PhantomData }
    }
}

impl<K: Keyed> Default for RmAmbiguous<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Keyed> Tournament for RmAmbiguous<K> {
    fn key_name(&self) -> &'static str {
        K::NAME
    }

    fn survivors(&self, ctx: &SentenceCtx) -> Result<BitVec> {
        let all = bitvec![1; ctx.annotations.len()];
        let mut alive = all.clone();
        for members in groups::<K>(ctx, &all).into_values() {
            if members.len() > 1 {
                for idx in members {
                    alive.set(idx, false);
                }
            }
        }
        Ok(alive)
    }
}
