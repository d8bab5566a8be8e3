use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, StiffError};

/// Moses-style word alignment between Finnish (source) and tokenised
/// Chinese (target) token indices, indexed in both directions.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WordAlignment {
    fi_to_zh: BTreeMap<usize, BTreeSet<usize>>,
    zh_to_fi: BTreeMap<usize, BTreeSet<usize>>,
}

/// Which side of the alignment a token index belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Side {
    Fi,
    Zh,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Fi => Side::Zh,
            Side::Zh => Side::Fi,
        }
    }
}

impl WordAlignment {
    /// Parse a line of space-separated `src-tgt` pairs. Empty lines are an
    /// empty alignment.
    pub fn parse(line: &str) -> Result<Self> {
        let mut alignment = WordAlignment::default();
        for pair in line.split_whitespace() {
            let parsed = pair
                .split_once('-')
                .and_then(|(s, t)| Some((s.parse().ok()?, t.parse().ok()?)));
            let Some((src, tgt)) = parsed else {
                return Err(StiffError::MalformedInput {
                    line: 0,
                    reason: format!("bad alignment pair {pair:?}"),
                });
            };
            alignment.insert(src, tgt);
        }
        Ok(alignment)
    }

    pub fn insert(&mut self, fi: usize, zh: usize) {
        self.fi_to_zh.entry(fi).or_default().insert(zh);
        self.zh_to_fi.entry(zh).or_default().insert(fi);
    }

    pub fn is_empty(&self) -> bool {
        self.fi_to_zh.is_empty()
    }

    /// Whether `token` on `side` is aligned to `other` on the opposite side.
    pub fn aligned(&self, side: Side, token: usize, other: usize) -> bool {
        let map = match side {
            Side::Fi => &self.fi_to_zh,
            Side::Zh => &self.zh_to_fi,
        };
        map.get(&token).is_some_and(|targets| targets.contains(&other))
    }

    /// Whether any token of span `a` (on `side`) aligns with any token of `b`.
    pub fn spans_aligned(
        &self,
        side: Side,
        a: std::ops::Range<usize>,
        b: std::ops::Range<usize>,
    ) -> bool {
        a.into_iter()
            .any(|i| b.clone().any(|j| self.aligned(side, i, j)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_both_directions() {
        let al = WordAlignment::parse("0-0 0-1 1-2 2-4 3-5").unwrap();
        assert!(al.aligned(Side::Fi, 0, 1));
        assert!(al.aligned(Side::Zh, 4, 2));
        assert!(!al.aligned(Side::Zh, 2, 1));
        assert!(al.spans_aligned(Side::Fi, 1..2, 0..3));
        assert!(WordAlignment::parse("").unwrap().is_empty());
        assert!(WordAlignment::parse("0-x").is_err());
    }
}
