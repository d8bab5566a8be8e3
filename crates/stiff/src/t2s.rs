//! Traditional → simplified Chinese character conversion.
//!
//! Reads OpenCC `TSCharacters.txt` style tables: one traditional character,
//! a tab, then one or more simplified candidates separated by spaces. The
//! first candidate wins, which makes the conversion deterministic.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

#[derive(Clone, Debug, Default)]
pub struct T2s {
    map: HashMap<char, char>,
}

impl T2s {
    /// Conversion that leaves every character alone.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open t2s table {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("parse t2s table {}", path.display()))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut map = HashMap::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("read line {}", lineno + 1))?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((trad, simp)) = line.split_once('\t') else {
                anyhow::bail!("line {}: expected traditional<TAB>simplified", lineno + 1);
            };
            let mut trad_chars = trad.chars();
            let (Some(from), None) = (trad_chars.next(), trad_chars.next()) else {
                // Phrase entries are not used for lemma conversion.
                continue;
            };
            let Some(to) = simp.split_whitespace().next().and_then(|s| s.chars().next()) else {
                anyhow::bail!("line {}: no simplified form", lineno + 1);
            };
            map.entry(from).or_insert(to);
        }
        Ok(Self { map })
    }

    pub fn convert(&self, text: &str) -> String {
        text.chars()
            .map(|c| self.map.get(&c).copied().unwrap_or(c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_candidate_wins_and_phrases_are_skipped() {
        let t2s = T2s::from_reader("萊\t莱\n塢\t坞 埗\n好萊塢\t好莱坞\n".as_bytes()).unwrap();
        assert_eq!(t2s.len(), 2);
        assert_eq!(t2s.convert("好萊塢"), "好莱坞");
        assert_eq!(T2s::identity().convert("好萊塢"), "好萊塢");
    }
}
