//! Conversions between STIFF, Eurosense, Unified and Senseval documents,
//! and the in-place Eurosense clean-up stages.

pub mod eurosense;
pub mod names;
pub mod senseval;
pub mod unified;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;
use wordnet_types::SynsetId;

/// Per-kind counts of recoverable problems seen during one run.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Recovered {
    pub stage: String,
    pub counts: BTreeMap<&'static str, usize>,
}

impl Recovered {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            counts: BTreeMap::new(),
        }
    }

    pub fn bump(&mut self, what: &'static str) {
        *self.counts.entry(what).or_default() += 1;
    }

    pub fn get(&self, what: &str) -> usize {
        self.counts.get(what).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.values().all(|&n| n == 0)
    }

    /// Log the counts as one JSON object.
    pub fn report(&self) {
        match serde_json::to_string(self) {
            Ok(json) => info!(target: "stiff::recovered", "{json}"),
            Err(err) => info!(stage = %self.stage, "could not serialise counts: {err}"),
        }
    }
}

/// Universal POS of an `offset-pos` key, `X` when it does not parse.
pub fn upos_of(key: &str) -> &'static str {
    key.parse::<SynsetId>().map(|id| id.pos.upos()).unwrap_or("X")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_and_serialise() {
        let mut rec = Recovered::new("retag");
        assert!(rec.is_empty());
        rec.bump("dropped");
        rec.bump("dropped");
        rec.bump("relabelled");
        assert_eq!(rec.get("dropped"), 2);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["counts"]["relabelled"], 1);
        assert_eq!(upos_of("00001740-n"), "NOUN");
        assert_eq!(upos_of("bn:00001n"), "X");
    }
}
