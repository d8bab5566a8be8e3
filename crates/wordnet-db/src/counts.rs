use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use wordnet_types::SynsetId;

use crate::normalize_lemma;

/// Lemma frequency table.
///
/// Rows are either `lemma<TAB>count` (lemma-level) or
/// `offset-pos<TAB>lemma<TAB>count` (sense-level). Lemmas are matched
/// case-insensitively with spaces folded to `_`, the same way the wordnets
/// are keyed. Missing entries count as zero.
#[derive(Clone, Debug, Default)]
pub struct LemmaCounts {
    lemmas: HashMap<String, u32>,
    senses: HashMap<(SynsetId, String), u32>,
}

impl LemmaCounts {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("open lemma counts {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("parse lemma counts {}", path.display()))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut counts = LemmaCounts::default();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("read line {}", lineno + 1))?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let parse_count = |raw: &str| {
                raw.trim()
                    .parse::<u32>()
                    .with_context(|| format!("line {}: count", lineno + 1))
            };
            match fields.as_slice() {
                &[lemma, count] => {
                    let count = parse_count(count)?;
                    *counts.lemmas.entry(normalize_lemma(lemma)).or_insert(0) += count;
                }
                &[synset, lemma, count] => {
                    let synset: SynsetId = synset
                        .parse()
                        .with_context(|| format!("line {}: synset id", lineno + 1))?;
                    let count = parse_count(count)?;
                    let lemma = normalize_lemma(lemma);
                    *counts.senses.entry((synset, lemma.clone())).or_insert(0) += count;
                    *counts.lemmas.entry(lemma).or_insert(0) += count;
                }
                _ => anyhow::bail!("line {}: expected [synset<TAB>]lemma<TAB>count", lineno + 1),
            }
        }
        Ok(counts)
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        Self {
            lemmas: pairs
                .into_iter()
                .map(|(lemma, count)| (normalize_lemma(lemma), count))
                .collect(),
            senses: HashMap::new(),
        }
    }

    /// Total count of a lemma over all its senses.
    pub fn lemma_count(&self, lemma: &str) -> u32 {
        self.lemmas.get(&normalize_lemma(lemma)).copied().unwrap_or(0)
    }

    /// Count of `lemma` in `synset`, falling back to the lemma-level count
    /// when the table has no sense-level rows for it.
    pub fn sense_count(&self, synset: SynsetId, lemma: &str) -> u32 {
        let lemma = normalize_lemma(lemma);
        match self.senses.get(&(synset, lemma.clone())) {
            Some(count) => *count,
            None if self.senses.keys().any(|(_, l)| *l == lemma) => 0,
            None => self.lemmas.get(&lemma).copied().unwrap_or(0),
        }
    }

    pub fn len(&self) -> usize {
        self.lemmas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lemmas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordnet_types::Pos;

    fn noun(offset: u32) -> SynsetId {
        SynsetId {
            pos: Pos::Noun,
            offset,
        }
    }

    #[test]
    fn sums_duplicate_rows_and_defaults_to_zero() {
        let counts = LemmaCounts::from_reader("ystävä\t10\nYstävä\t2\nhyvä ystävä\t1\n".as_bytes())
            .unwrap();
        assert_eq!(counts.lemma_count("ystävä"), 12);
        assert_eq!(counts.lemma_count("hyvä_ystävä"), 1);
        assert_eq!(counts.lemma_count("alan"), 0);
        assert_eq!(counts.sense_count(noun(1), "ystävä"), 12);
        assert!(LemmaCounts::from_reader("no-tab-here\n".as_bytes()).is_err());
    }

    #[test]
    fn sense_rows_distinguish_synsets() {
        let counts = LemmaCounts::from_reader(
            "00000001-n\tkuusi\t7\n00000002-n\tkuusi\t3\n".as_bytes(),
        )
        .unwrap();
        assert_eq!(counts.sense_count(noun(1), "kuusi"), 7);
        assert_eq!(counts.sense_count(noun(2), "kuusi"), 3);
        assert_eq!(counts.sense_count(noun(3), "kuusi"), 0);
        assert_eq!(counts.lemma_count("kuusi"), 10);
    }
}
