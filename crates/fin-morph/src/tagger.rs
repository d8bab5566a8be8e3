use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

/// Base form and universal POS tag assigned to one token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tagged {
    pub lemma: String,
    pub pos: String,
}

/// Sentence-level POS tagger interface.
pub trait PosTagger: Send + Sync {
    /// One entry per input token; `None` when the token cannot be tagged.
    fn tag(&self, tokens: &[&str]) -> Vec<Option<Tagged>>;
}

/// Tagger reading `surface<TAB>lemma<TAB>pos` rows; context-free lookup.
#[derive(Clone, Debug, Default)]
pub struct TableTagger {
    table: HashMap<String, Tagged>,
}

impl TableTagger {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open tag table {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("parse tag table {}", path.display()))
    }

    pub fn from_rows(rows: &str) -> Result<Self> {
        Self::from_reader(rows.as_bytes())
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut table = HashMap::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("read line {}", lineno + 1))?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let &[surface, lemma, pos] = fields.as_slice() else {
                anyhow::bail!("line {}: expected surface<TAB>lemma<TAB>pos", lineno + 1);
            };
            // First row wins, as a tagger commits to one reading.
            table.entry(surface.to_string()).or_insert_with(|| Tagged {
                lemma: lemma.to_string(),
                pos: pos.to_string(),
            });
        }
        Ok(Self { table })
    }
}

impl PosTagger for TableTagger {
    fn tag(&self, tokens: &[&str]) -> Vec<Option<Tagged>> {
        tokens
            .iter()
            .map(|tok| {
                self.table
                    .get(*tok)
                    .or_else(|| self.table.get(&tok.to_lowercase()))
                    .cloned()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_known_tokens_only() {
        let tagger = TableTagger::from_rows("ystäväni\tystävä\tNOUN\nhyvä\thyvä\tADJ\n").unwrap();
        let tags = tagger.tag(&["Hyvä", "ystäväni", "Alan"]);
        assert_eq!(tags[0].as_ref().map(|t| t.pos.as_str()), Some("ADJ"));
        assert_eq!(tags[1].as_ref().map(|t| t.lemma.as_str()), Some("ystävä"));
        assert_eq!(tags[2], None);
        assert!(TableTagger::from_rows("two\tfields\n").is_err());
    }
}
