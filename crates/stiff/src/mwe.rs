//! Trie of Finnish multiword wordnet entries.
//!
//! Entries are keyed by their subword sequence (`hyvä_ystävä` → `hyvä`,
//! `ystävä`). Each subword is also inserted under every lemma the analyser
//! derives from it, so inflected heads in lexicalised entries still match
//! the lemma candidates of running text.

use std::collections::{BTreeMap, HashMap};

use fin_morph::{Analyser, LemmaPath, Lemmatizer};

use crate::tagging::LemmaObj;

/// Upper bound on subword-alternative combinations inserted per entry.
const MAX_VARIANTS: usize = 16;

#[derive(Clone, Debug)]
pub struct MweEntry {
    pub name: String,
    pub objs: Vec<LemmaObj>,
}

#[derive(Default)]
struct Node {
    children: HashMap<String, usize>,
    entries: Vec<usize>,
}

/// A longest match starting at `start`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MweMatch {
    pub start: usize,
    pub len: usize,
    pub entry: usize,
    pub paths: Vec<LemmaPath>,
}

pub struct MweTrie {
    nodes: Vec<Node>,
    entries: Vec<MweEntry>,
}

pub fn is_multiword(name: &str) -> bool {
    subwords(name).len() > 1
}

fn subwords(name: &str) -> Vec<&str> {
    name.split(['_', '+', ' ']).filter(|s| !s.is_empty()).collect()
}

impl MweTrie {
    pub fn build<A: Analyser>(
        entries: impl IntoIterator<Item = (String, LemmaObj)>,
        lemmatizer: &Lemmatizer<A>,
    ) -> Self {
        let mut grouped: BTreeMap<String, Vec<LemmaObj>> = BTreeMap::new();
        for (name, obj) in entries {
            if !is_multiword(&name) {
                continue;
            }
            let objs = grouped.entry(name).or_default();
            if !objs.contains(&obj) {
                objs.push(obj);
            }
        }

        let mut trie = MweTrie {
            nodes: vec![Node::default()],
            entries: Vec::new(),
        };
        for (name, objs) in grouped {
            let alternatives: Vec<Vec<String>> = subwords(&name)
                .into_iter()
                .map(|sub| {
                    let lower = sub.to_lowercase();
                    let mut alts = vec![lower.clone()];
                    for lemma in lemmatizer.lemma_set(&lower) {
                        let lemma = lemma.to_lowercase();
                        if !alts.contains(&lemma) {
                            alts.push(lemma);
                        }
                    }
                    alts
                })
                .collect();
            let entry = trie.entries.len();
            trie.entries.push(MweEntry { name, objs });
            for variant in variants(&alternatives) {
                trie.insert(&variant, entry);
            }
        }
        trie
    }

    fn insert(&mut self, words: &[&str], entry: usize) {
        let mut node = 0;
        for word in words {
            node = match self.nodes[node].children.get(*word) {
                Some(next) => *next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].children.insert(word.to_string(), next);
                    next
                }
            };
        }
        if !self.nodes[node].entries.contains(&entry) {
            self.nodes[node].entries.push(entry);
        }
    }

    pub fn entry(&self, idx: usize) -> &MweEntry {
        &self.entries[idx]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Walk the candidate lemmas of each token and report, per start
    /// position, every entry ending at the longest reachable match of at
    /// least two tokens.
    pub fn matches(&self, candidates: &[Vec<(String, LemmaPath)>]) -> Vec<MweMatch> {
        let mut out = Vec::new();
        for start in 0..candidates.len() {
            let mut frontier: Vec<(usize, Vec<LemmaPath>)> = vec![(0, Vec::new())];
            let mut best: Option<(usize, Vec<(usize, Vec<LemmaPath>)>)> = None;
            for (offset, cands) in candidates[start..].iter().enumerate() {
                let mut next: Vec<(usize, Vec<LemmaPath>)> = Vec::new();
                for (node, paths) in &frontier {
                    for (lemma, path) in cands {
                        let Some(child) = self.nodes[*node].children.get(&lemma.to_lowercase())
                        else {
                            continue;
                        };
                        if next.iter().any(|(n, _)| n == child) {
                            continue;
                        }
                        let mut paths = paths.clone();
                        paths.push(*path);
                        next.push((*child, paths));
                    }
                }
                if next.is_empty() {
                    break;
                }
                let len = offset + 1;
                let terminal: Vec<(usize, Vec<LemmaPath>)> = next
                    .iter()
                    .filter(|(node, _)| !self.nodes[*node].entries.is_empty())
                    .cloned()
                    .collect();
                if len >= 2 && !terminal.is_empty() {
                    best = Some((len, terminal));
                }
                frontier = next;
            }
            if let Some((len, terminal)) = best {
                let mut seen = Vec::new();
                for (node, paths) in terminal {
                    for entry in &self.nodes[node].entries {
                        if seen.contains(entry) {
                            continue;
                        }
                        seen.push(*entry);
                        out.push(MweMatch {
                            start,
                            len,
                            entry: *entry,
                            paths: paths.clone(),
                        });
                    }
                }
            }
        }
        out
    }
}

fn variants(alternatives: &[Vec<String>]) -> Vec<Vec<&str>> {
    let mut out: Vec<Vec<&str>> = vec![Vec::new()];
    for alts in alternatives {
        let mut next = Vec::new();
        for prefix in &out {
            for alt in alts {
                if next.len() >= MAX_VARIANTS {
                    break;
                }
                let mut v = prefix.clone();
                v.push(alt.as_str());
                next.push(v);
            }
        }
        out = next;
    }
    out
}
