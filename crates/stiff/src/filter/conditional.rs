use bitvec::prelude::*;

use crate::error::{Result, StiffError};
use crate::filter::tournament::Ranked;
use crate::filter::{Keyed, SentenceCtx, Tournament};

/// Run `apply` only among the annotations whose `filter` rank is one of
/// `vals`; every other annotation survives untouched.
pub struct Conditional {
    apply: Box<dyn Tournament>,
    filter: Box<dyn Ranked>,
    vals: Vec<i64>,
    key: &'static str,
}

impl Conditional {
    /// `K` is the keying of `filter`; it must match `apply`'s.
    pub fn new<K: Keyed>(apply: Box<dyn Tournament>, filter: Box<dyn Ranked>, vals: Vec<i64>) -> Result<Self> {
        if apply.key_name() != K::NAME {
            return Err(StiffError::FilterOption(format!(
                "conditional filters disagree on keying: {} vs {}",
                apply.key_name(),
                K::NAME
            )));
        }
        Ok(Self {
            apply,
            filter,
            vals,
            key: K::NAME,
        })
    }
}

impl Tournament for Conditional {
    fn key_name(&self) -> &'static str {
        self.key
    }

    fn survivors(&self, ctx: &SentenceCtx) -> Result<BitVec> {
        let mut selected = bitvec![0; ctx.annotations.len()];
        for (idx, ann) in ctx.annotations.iter().enumerate() {
            if self.vals.contains(&self.filter.rank(ctx, ann)?) {
                selected.set(idx, true);
            }
        }
        let (sub, positions) = ctx.subset(&selected);
        let sub_alive = self.apply.survivors(&sub)?;

        let mut alive = bitvec![1; ctx.annotations.len()];
        for (sub_idx, pos) in positions.into_iter().enumerate() {
            alive.set(pos, sub_alive[sub_idx]);
        }
        Ok(alive)
    }
}
