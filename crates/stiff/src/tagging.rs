//! The in-memory result of extraction: tokens, their candidate tags and the
//! cross-lingual supports attached to those tags.
//!
//! A [`Tagging`] owns its tokens and tags. Supports point at tags of the
//! sibling tagging by numeric id only; ids are unique across both taggings
//! of a sentence (see [`assign_ids`]).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;

use fin_morph::LemmaPath;
use wordnet_types::SynsetId;

use crate::anchor::Anchor;

pub const DERIV: &str = "deriv";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum TransferType {
    Aligned,
    Unaligned,
}

impl TransferType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferType::Aligned => "aligned",
            TransferType::Unaligned => "unaligned",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "aligned" => Some(TransferType::Aligned),
            "unaligned" => Some(TransferType::Unaligned),
            _ => None,
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence that a sibling tag in the other language shares this synset.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TagSupport {
    pub transfer_type: TransferType,
    pub transfer_from: u32,
    pub transform_chain: Vec<String>,
}

/// A wordnet lemma realising a synset in one resource.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct LemmaObj {
    pub wordnet: String,
    pub synset: SynsetId,
    pub name: String,
}

/// One candidate sense of a token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaggedLemma {
    pub id: u32,
    pub lemma: String,
    /// Never empty; every entry shares one canonical synset.
    pub lemma_objs: Vec<LemmaObj>,
    /// `(ordinal, count)`; ordinal 1 is the most frequent.
    pub rank: Option<(u32, u32)>,
    pub supports: Vec<TagSupport>,
    /// Finnish only: how each covered token reached its lemma.
    pub lemma_path: Vec<LemmaPath>,
}

impl TaggedLemma {
    pub fn new(lemma: impl Into<String>, lemma_objs: Vec<LemmaObj>) -> Self {
        debug_assert!(!lemma_objs.is_empty(), "a tag needs at least one lemma object");
        Self {
            id: 0,
            lemma: lemma.into(),
            lemma_objs,
            rank: None,
            supports: Vec::new(),
            lemma_path: Vec::new(),
        }
    }

    /// Canonical synset id shared by all lemma objects.
    pub fn synset(&self) -> SynsetId {
        self.lemma_objs[0].synset
    }

    /// Distinct wordnet resources, in first-seen order.
    pub fn wordnets(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for obj in &self.lemma_objs {
            if !out.contains(&obj.wordnet.as_str()) {
                out.push(&obj.wordnet);
            }
        }
        out
    }

    /// Distinct wordnet lemma names, in first-seen order.
    pub fn wn_lemmas(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for obj in &self.lemma_objs {
            if !out.contains(&obj.name.as_str()) {
                out.push(&obj.name);
            }
        }
        out
    }
}

/// A matched span (single token or multiword) with its candidate tags.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub token: String,
    pub anchors: Vec<Anchor>,
    pub tags: Vec<TaggedLemma>,
}

impl Token {
    /// Token-index range of this span in the given tokenised variant.
    pub fn token_span(&self, from_id: &str) -> Option<Range<usize>> {
        self.anchors
            .iter()
            .find(|a| a.from_id == from_id)
            .and_then(|a| Some(a.token?..a.token? + a.token_length?))
    }
}

/// All tokens and tags for one sentence in one language.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Tagging {
    pub tokens: Vec<Token>,
    /// Canonical synset id → indices of tokens carrying a tag for it.
    pub wnsynsets: BTreeMap<SynsetId, Vec<usize>>,
}

impl Tagging {
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tagging = Tagging {
            tokens,
            wnsynsets: BTreeMap::new(),
        };
        tagging.reindex();
        tagging
    }

    pub fn reindex(&mut self) {
        self.wnsynsets.clear();
        for (idx, token) in self.tokens.iter().enumerate() {
            for tag in &token.tags {
                let entry = self.wnsynsets.entry(tag.synset()).or_default();
                if entry.last() != Some(&idx) {
                    entry.push(idx);
                }
            }
        }
    }

    pub fn canonical_ids(&self) -> BTreeSet<SynsetId> {
        self.wnsynsets.keys().copied().collect()
    }

    /// `(token index, tag)` for every tag in document order.
    pub fn tags(&self) -> impl Iterator<Item = (usize, &TaggedLemma)> + '_ {
        self.tokens
            .iter()
            .enumerate()
            .flat_map(|(idx, tok)| tok.tags.iter().map(move |tag| (idx, tag)))
    }

    /// Tags bearing `synset`, with their token index.
    pub fn tags_for(&self, synset: SynsetId) -> Vec<(usize, &TaggedLemma)> {
        let Some(indices) = self.wnsynsets.get(&synset) else {
            return Vec::new();
        };
        indices
            .iter()
            .flat_map(|idx| {
                self.tokens[*idx]
                    .tags
                    .iter()
                    .filter(move |tag| tag.synset() == synset)
                    .map(move |tag| (*idx, tag))
            })
            .collect()
    }

    pub fn tag_by_id(&self, id: u32) -> Option<(usize, &TaggedLemma)> {
        self.tags().find(|(_, tag)| tag.id == id)
    }

    pub fn tag_count(&self) -> usize {
        self.tokens.iter().map(|t| t.tags.len()).sum()
    }
}

/// Number every tag of both taggings sequentially, Finnish first.
pub fn assign_ids(fi: &mut Tagging, zh: &mut Tagging) {
    let mut next = 0u32;
    for tagging in [fi, zh] {
        for token in &mut tagging.tokens {
            for tag in &mut token.tags {
                tag.id = next;
                next += 1;
            }
        }
    }
}
