//! Open Multilingual Wordnet style tab files.
//!
//! ```text
//! # fin	https://example.org/finnwordnet	CC-BY 3.0
//! 00001740-n	fin:lemma	olio
//! 09044862-n	fin:lemma	Hollywood
//! ```
//!
//! Only `*:lemma` rows are read; definitions and examples are skipped.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use wordnet_types::SynsetId;

use crate::normalize_lemma;

/// A single lemma-level wordnet keyed by Princeton synset ids.
#[derive(Clone, Debug, Default)]
pub struct TabWordNet {
    id: String,
    lemma_to_synsets: BTreeMap<String, Vec<SynsetId>>,
    synset_to_lemmas: BTreeMap<SynsetId, Vec<String>>,
}

impl TabWordNet {
    /// Load a tab file, naming the resource `id` (e.g. `fin`, `cmn`).
    pub fn load(id: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open wordnet {}", path.display()))?;
        Self::from_reader(id, BufReader::new(file))
            .with_context(|| format!("parse wordnet {}", path.display()))
    }

    /// Parse tab rows from any reader.
    pub fn from_reader(id: impl Into<String>, reader: impl BufRead) -> Result<Self> {
        let mut wn = TabWordNet {
            id: id.into(),
            ..Default::default()
        };
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("read line {}", lineno + 1))?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let mut fields = line.splitn(3, '\t');
            let (Some(synset), Some(kind), Some(lemma)) = (fields.next(), fields.next(), fields.next())
            else {
                anyhow::bail!("line {}: expected three tab-separated fields", lineno + 1);
            };
            if !kind.ends_with(":lemma") && kind != "lemma" {
                continue;
            }
            let synset: SynsetId = synset
                .parse()
                .with_context(|| format!("line {}: synset id", lineno + 1))?;
            wn.insert(synset, lemma.trim());
        }
        wn.finish();
        Ok(wn)
    }

    /// Build a wordnet from `(synset, lemma)` pairs.
    pub fn from_entries<'a>(
        id: impl Into<String>,
        entries: impl IntoIterator<Item = (SynsetId, &'a str)>,
    ) -> Self {
        let mut wn = TabWordNet {
            id: id.into(),
            ..Default::default()
        };
        for (synset, lemma) in entries {
            wn.insert(synset, lemma);
        }
        wn.finish();
        wn
    }

    fn insert(&mut self, synset: SynsetId, lemma: &str) {
        self.lemma_to_synsets
            .entry(normalize_lemma(lemma))
            .or_default()
            .push(synset);
        self.synset_to_lemmas
            .entry(synset)
            .or_default()
            .push(lemma.replace(' ', "_"));
    }

    fn finish(&mut self) {
        for synsets in self.lemma_to_synsets.values_mut() {
            synsets.sort();
            synsets.dedup();
        }
        for lemmas in self.synset_to_lemmas.values_mut() {
            let mut seen = BTreeSet::new();
            lemmas.retain(|l| seen.insert(l.clone()));
        }
    }

    /// Resource identifier, as written into `wordnets` attributes.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Synsets listing `lemma` (case-insensitive, spaces as `_`).
    pub fn synsets(&self, lemma: &str) -> &[SynsetId] {
        self.lemma_to_synsets
            .get(&normalize_lemma(lemma))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Lemma names of a synset with their original casing, spaces as `_`.
    pub fn lemmas(&self, synset: SynsetId) -> &[String] {
        self.synset_to_lemmas
            .get(&synset)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All `(synset, lemma)` pairs in synset order.
    pub fn entries(&self) -> impl Iterator<Item = (SynsetId, &str)> + '_ {
        self.synset_to_lemmas
            .iter()
            .flat_map(|(sid, lemmas)| lemmas.iter().map(move |l| (*sid, l.as_str())))
    }

    pub fn synset_count(&self) -> usize {
        self.synset_to_lemmas.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordnet_types::Pos;

    const ROWS: &str = "# fin\tFinnWordNet\n\
        09044862-n\tfin:lemma\tHollywood\n\
        09044862-n\tfin:def\tsome definition\n\
        10112591-n\tfin:lemma\tystävä\n\
        10112591-n\tfin:lemma\tystävä\n";

    #[test]
    fn reads_lemma_rows_only() {
        let wn = TabWordNet::from_reader("fin", ROWS.as_bytes()).unwrap();
        assert_eq!(wn.id(), "fin");
        assert_eq!(wn.synset_count(), 2);
        let holly = SynsetId {
            pos: Pos::Noun,
            offset: 9044862,
        };
        assert_eq!(wn.synsets("hollywood"), &[holly]);
        assert_eq!(wn.lemmas(holly), &["Hollywood".to_string()]);
        assert_eq!(
            wn.lemmas(SynsetId {
                pos: Pos::Noun,
                offset: 10112591
            })
            .len(),
            1,
            "duplicate rows collapse"
        );
    }

    #[test]
    fn rejects_malformed_rows() {
        assert!(TabWordNet::from_reader("fin", "00001740-n only-two".as_bytes()).is_err());
        assert!(TabWordNet::from_reader("fin", "x-n\tfin:lemma\tolio".as_bytes()).is_err());
    }
}
