//! Load the WordNet resources used for cross-lingual sense tagging.
//!
//! Three kinds of data are read here:
//!
//! - [`WordNet`]: the Princeton `data.*`/`index.*` files. They supply the
//!   relations (derivationally related forms, hypernyms) and the
//!   `lemma.pos.NN` sense names for the synset ids every other resource is
//!   keyed by. Text borrows from memory-mapped or owned buffers chosen at
//!   runtime via [`LoadMode`].
//! - [`TabWordNet`]: Open Multilingual Wordnet style tab files
//!   (`00001740-n<TAB>fin:lemma<TAB>olio`), one per Finnish or Chinese
//!   resource.
//! - [`LemmaCounts`]: lemma frequency tables used to rank senses.
//!
//! # Example
//! ```no_run
//! use wordnet_db::{LoadMode, WordNet};
//! use wordnet_types::Pos;
//!
//! # fn main() -> anyhow::Result<()> {
//! let wn = WordNet::load_with_mode("/path/to/wordnet", LoadMode::Mmap)?;
//! for sid in wn.synsets_for_lemma(Pos::Noun, "friend") {
//!     println!("{sid} {:?}", wn.synset_name(*sid));
//!     for related in wn.derivationally_related(*sid) {
//!         println!("  + {related}");
//!     }
//! }
//! # Ok(()) }
//! ```
//!
//! For a runnable demo, see `cargo run -p wordnet-db --example stats -- <dict>`.

mod counts;
mod tab;

pub use counts::LemmaCounts;
pub use tab::TabWordNet;

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use memmap2::Mmap;
use wordnet_types::{Lemma, Pointer, Pos, Synset, SynsetId, decode_st, parse_synset_name, synset_name};

/// Strategy for loading dictionary files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map each WordNet file (fast, zero-copy).
    Mmap,
    /// Read each file into an owned buffer (portable fallback).
    Owned,
}

impl LoadMode {
    /// Parse `mmap` / `owned` (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "mmap" => Some(LoadMode::Mmap),
            "owned" => Some(LoadMode::Owned),
            _ => None,
        }
    }
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

const POS_FILES: [(Pos, &str); 4] = [
    (Pos::Noun, "noun"),
    (Pos::Verb, "verb"),
    (Pos::Adj, "adj"),
    (Pos::Adv, "adv"),
];

#[derive(Clone, Copy, Debug)]
struct TextRef {
    pos: Pos,
    start: usize,
    len: usize,
}

/// One `data.*` buffer per part of speech.
struct DataFiles {
    data: HashMap<Pos, Buffer>,
}

impl DataFiles {
    fn text(&self, r: TextRef) -> &str {
        let bytes = self.data.get(&r.pos).map(Buffer::as_slice).unwrap_or(&[]);
        let slice = &bytes[r.start..r.start + r.len];
        std::str::from_utf8(slice).expect("wordnet text is valid utf8")
    }
}

struct PointerData {
    symbol: TextRef,
    target: SynsetId,
    src_word: Option<u16>,
    dst_word: Option<u16>,
}

struct SynsetData {
    words: Vec<(TextRef, u8)>,
    pointers: Vec<PointerData>,
}

/// Read-only view of the Princeton WordNet relations and sense inventory.
pub struct WordNet {
    files: DataFiles,
    synsets: HashMap<SynsetId, SynsetData>,
    lemma_to_synsets: HashMap<(Pos, String), Vec<SynsetId>>,
}

impl WordNet {
    /// Load WordNet from a directory containing `data.*` and `index.*` files.
    ///
    /// Defaults to memory-mapping the source files. Use [`WordNet::load_with_mode`]
    /// to force owned buffers instead.
    pub fn load(dict_dir: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_mode(dict_dir, LoadMode::Mmap)
    }

    /// Load WordNet choosing between mmap and owned buffers at runtime.
    pub fn load_with_mode(dict_dir: impl AsRef<Path>, mode: LoadMode) -> Result<Self> {
        let dir = dict_dir.as_ref();
        for (_, suffix) in POS_FILES {
            for prefix in ["data", "index"] {
                let path = dir.join(format!("{prefix}.{suffix}"));
                if !path.exists() {
                    anyhow::bail!("missing required WordNet file: {}", path.display());
                }
            }
        }

        let mut lemma_to_synsets = HashMap::new();
        let mut data = HashMap::new();
        let mut synsets = HashMap::new();
        for (pos, suffix) in POS_FILES {
            // Index files are only needed while building the lemma map.
            let index = load_file(dir.join(format!("index.{suffix}")), mode)?;
            parse_index(index.as_slice(), pos, &mut lemma_to_synsets)
                .with_context(|| format!("parse index.{suffix}"))?;

            let buffer = load_file(dir.join(format!("data.{suffix}")), mode)?;
            parse_data(buffer.as_slice(), pos, &mut synsets)
                .with_context(|| format!("parse data.{suffix}"))?;
            data.insert(pos, buffer);
        }

        Ok(Self {
            files: DataFiles { data },
            synsets,
            lemma_to_synsets,
        })
    }

    /// Check whether a lemma exists for the given POS according to index files.
    pub fn lemma_exists(&self, pos: Pos, lemma: &str) -> bool {
        let key = (pos, normalize_lemma(lemma));
        self.lemma_to_synsets.contains_key(&key)
    }

    /// Return the synsets associated with a lemma in sense order, or an empty slice.
    pub fn synsets_for_lemma(&self, pos: Pos, lemma: &str) -> &[SynsetId] {
        let key = (pos, normalize_lemma(lemma));
        self.lemma_to_synsets
            .get(&key)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Fetch a `Synset` by id if loaded.
    pub fn get_synset(&self, id: SynsetId) -> Option<Synset<'_>> {
        self.synsets.get(&id).map(|syn| self.make_synset_view(id, syn))
    }

    /// Whether the synset exists in the data files.
    pub fn contains(&self, id: SynsetId) -> bool {
        self.synsets.contains_key(&id)
    }

    /// Number of synsets.
    pub fn synset_count(&self) -> usize {
        self.synsets.len()
    }

    /// Number of lemmas tracked across all parts of speech.
    pub fn lemma_count(&self) -> usize {
        self.lemma_to_synsets.len()
    }

    /// Lemma names of a synset in file order.
    pub fn lemma_names(&self, id: SynsetId) -> Vec<&str> {
        self.synsets
            .get(&id)
            .map(|syn| syn.words.iter().map(|(t, _)| self.files.text(*t)).collect())
            .unwrap_or_default()
    }

    /// Synsets reachable through a `+` pointer from any lemma of `id`.
    ///
    /// Both lexical (word-to-word) and semantic `+` pointers are followed.
    /// The result is sorted and deduplicated.
    pub fn derivationally_related(&self, id: SynsetId) -> Vec<SynsetId> {
        let Some(syn) = self.synsets.get(&id) else {
            return Vec::new();
        };
        let mut out: Vec<SynsetId> = syn
            .pointers
            .iter()
            .filter(|p| self.files.text(p.symbol) == "+")
            .map(|p| p.target)
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Direct hypernyms (`@` and `@i`).
    pub fn hypernyms(&self, id: SynsetId) -> Vec<SynsetId> {
        self.synsets
            .get(&id)
            .map(|syn| {
                syn.pointers
                    .iter()
                    .filter(|p| matches!(self.files.text(p.symbol), "@" | "@i"))
                    .map(|p| p.target)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every hypernym path from a root down to `id`, inclusive of both ends.
    ///
    /// A synset without hypernyms has the single path `[id]`. Cycles in
    /// malformed data are cut at the first repeated synset.
    pub fn hypernym_paths(&self, id: SynsetId) -> Vec<Vec<SynsetId>> {
        let mut visiting = HashSet::new();
        self.paths_from(id, &mut visiting)
    }

    fn paths_from(&self, id: SynsetId, visiting: &mut HashSet<SynsetId>) -> Vec<Vec<SynsetId>> {
        if !visiting.insert(id) {
            return Vec::new();
        }
        let parents = self.hypernyms(id);
        let mut paths = Vec::new();
        if parents.is_empty() {
            paths.push(vec![id]);
        } else {
            for parent in parents {
                for mut path in self.paths_from(parent, visiting) {
                    path.push(id);
                    paths.push(path);
                }
            }
            if paths.is_empty() {
                paths.push(vec![id]);
            }
        }
        visiting.remove(&id);
        paths
    }

    /// `lemma.pos.NN` name of a synset, named after its first lemma.
    pub fn synset_name(&self, id: SynsetId) -> Option<String> {
        let first = *self.lemma_names(id).first()?;
        let sense = self
            .synsets_for_lemma(id.pos, first)
            .iter()
            .position(|sid| *sid == id)?;
        Some(synset_name(first, id.pos, sense as u32 + 1))
    }

    /// Resolve a `lemma.pos.NN` name back to a synset id.
    pub fn resolve_name(&self, name: &str) -> Option<SynsetId> {
        let (lemma, pos, sense) = parse_synset_name(name)?;
        let idx = (sense as usize).checked_sub(1)?;
        let candidates = self.synsets_for_lemma(pos, lemma);
        // Satellite names (`x.s.01`) index adjectives.
        candidates.get(idx).copied()
    }

    fn make_synset_view<'a>(&'a self, id: SynsetId, data: &'a SynsetData) -> Synset<'a> {
        let words = data
            .words
            .iter()
            .map(|(text, lex_id)| Lemma {
                text: self.files.text(*text),
                lex_id: *lex_id,
            })
            .collect();
        let pointers = data
            .pointers
            .iter()
            .map(|p| Pointer {
                symbol: self.files.text(p.symbol),
                target: p.target,
                src_word: p.src_word,
                dst_word: p.dst_word,
            })
            .collect();
        Synset {
            id,
            words,
            pointers,
        }
    }
}

fn load_file(path: PathBuf, mode: LoadMode) -> Result<Buffer> {
    match mode {
        LoadMode::Mmap => {
            let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
            unsafe { Mmap::map(&file) }
                .map(Buffer::Mmap)
                .with_context(|| format!("mmap {}", path.display()))
        }
        LoadMode::Owned => {
            let mut file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            Ok(Buffer::Owned(buf))
        }
    }
}

fn parse_index(
    bytes: &[u8],
    pos: Pos,
    lemma_to_synsets: &mut HashMap<(Pos, String), Vec<SynsetId>>,
) -> Result<()> {
    for (lineno, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
        let line = strip_cr(raw_line);
        if line.is_empty() || matches!(line.first(), Some(b' ' | b'\t')) {
            continue;
        }
        let line_str = std::str::from_utf8(line)?;
        let tokens: Vec<&str> = line_str.split_ascii_whitespace().collect();
        if tokens.len() < 6 {
            anyhow::bail!("line {}: malformed index line (too few tokens)", lineno + 1);
        }

        let synset_cnt: usize = tokens[2]
            .parse()
            .with_context(|| format!("line {}: synset_cnt", lineno + 1))?;
        let p_cnt: usize = tokens[3]
            .parse()
            .with_context(|| format!("line {}: p_cnt", lineno + 1))?;
        // lemma pos synset_cnt p_cnt [ptr_symbol...] sense_cnt tagsense_cnt offsets...
        let first_offset = 4 + p_cnt + 2;
        if tokens.len() < first_offset {
            anyhow::bail!("line {}: pointer count mismatch", lineno + 1);
        }
        let offsets = tokens[first_offset..]
            .iter()
            .map(|t| {
                t.parse::<u32>()
                    .with_context(|| format!("line {}: synset offset {t}", lineno + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        if offsets.len() != synset_cnt {
            anyhow::bail!(
                "line {}: synset_cnt mismatch (expected {}, got {})",
                lineno + 1,
                synset_cnt,
                offsets.len()
            );
        }

        lemma_to_synsets.insert(
            (pos, normalize_lemma(tokens[0])),
            offsets
                .into_iter()
                .map(|offset| SynsetId { pos, offset })
                .collect(),
        );
    }

    Ok(())
}

fn parse_data(bytes: &[u8], pos: Pos, synsets: &mut HashMap<SynsetId, SynsetData>) -> Result<()> {
    for (lineno, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
        let line = strip_cr(raw_line);
        if line.is_empty() || matches!(line.first(), Some(b' ' | b'\t')) {
            continue;
        }
        let line_str = std::str::from_utf8(line)?;
        let left = line_str.split_once('|').map_or(line_str, |(l, _)| l);

        let tokens: Vec<&str> = left.split_ascii_whitespace().collect();
        if tokens.len() < 4 {
            anyhow::bail!("line {}: malformed data line", lineno + 1);
        }

        let offset: u32 = tokens[0]
            .parse()
            .with_context(|| format!("line {}: offset", lineno + 1))?;
        let w_cnt = usize::from_str_radix(tokens[3], 16)
            .with_context(|| format!("line {}: w_cnt", lineno + 1))?;

        let mut idx = 4;
        if tokens.len() < idx + (w_cnt * 2) + 1 {
            anyhow::bail!("line {}: not enough word/lex_id pairs", lineno + 1);
        }
        let mut words = Vec::with_capacity(w_cnt);
        for _ in 0..w_cnt {
            let lex_id = u8::from_str_radix(tokens[idx + 1], 16)
                .with_context(|| format!("line {}: lex_id", lineno + 1))?;
            words.push((text_ref(pos, bytes, tokens[idx]), lex_id));
            idx += 2;
        }

        let p_cnt: usize = tokens[idx]
            .parse()
            .with_context(|| format!("line {}: p_cnt", lineno + 1))?;
        idx += 1;

        let mut pointers = Vec::with_capacity(p_cnt);
        for _ in 0..p_cnt {
            if tokens.len() < idx + 4 {
                anyhow::bail!("line {}: incomplete pointer block", lineno + 1);
            }
            let target_offset: u32 = tokens[idx + 1]
                .parse()
                .with_context(|| format!("line {}: pointer target offset", lineno + 1))?;
            let target_pos = tokens[idx + 2]
                .chars()
                .next()
                .and_then(Pos::from_char)
                .ok_or_else(|| anyhow::anyhow!("line {}: pointer target pos", lineno + 1))?;
            let (src_word, dst_word) = decode_st(tokens[idx + 3]);
            pointers.push(PointerData {
                symbol: text_ref(pos, bytes, tokens[idx]),
                target: SynsetId {
                    pos: target_pos,
                    offset: target_offset,
                },
                src_word,
                dst_word,
            });
            idx += 4;
        }

        synsets.insert(SynsetId { pos, offset }, SynsetData { words, pointers });
    }

    Ok(())
}

fn text_ref(pos: Pos, root: &[u8], token: &str) -> TextRef {
    let start = token.as_ptr() as usize - root.as_ptr() as usize;
    TextRef {
        pos,
        start,
        len: token.len(),
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

pub(crate) fn normalize_lemma(text: &str) -> String {
    text.trim().to_lowercase().replace(' ', "_")
}
