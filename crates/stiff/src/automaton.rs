//! Bulk lemma matching with Aho-Corasick.
//!
//! One automaton serves both Chinese passes: over the raw untokenised
//! string, and over the tokenised sentence with its separators removed, in
//! which case only matches starting and ending on token boundaries count.

use std::collections::BTreeMap;

use aho_corasick::{AhoCorasick, MatchKind};

use crate::error::{Result, StiffError};
use crate::tagging::LemmaObj;

pub struct LemmaAutomaton {
    ac: AhoCorasick,
    patterns: Vec<String>,
    objs: Vec<Vec<LemmaObj>>,
}

/// A match in an untokenised string; offsets in characters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UntokMatch {
    pub char: usize,
    pub pattern: usize,
}

/// A match covering whole tokens.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TokMatch {
    pub token: usize,
    pub token_length: usize,
    pub pattern: usize,
}

impl LemmaAutomaton {
    pub fn build(entries: impl IntoIterator<Item = (String, LemmaObj)>) -> Result<Self> {
        let mut by_pattern: BTreeMap<String, Vec<LemmaObj>> = BTreeMap::new();
        for (pattern, obj) in entries {
            if pattern.is_empty() {
                continue;
            }
            let objs = by_pattern.entry(pattern).or_default();
            if !objs.contains(&obj) {
                objs.push(obj);
            }
        }
        let (patterns, objs): (Vec<String>, Vec<Vec<LemmaObj>>) = by_pattern.into_iter().unzip();
        let ac = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&patterns)
            .map_err(|err| StiffError::Resource {
                what: "lemma automaton",
                source: anyhow::Error::new(err),
            })?;
        Ok(Self { ac, patterns, objs })
    }

    pub fn pattern(&self, idx: usize) -> &str {
        &self.patterns[idx]
    }

    pub fn objs(&self, idx: usize) -> &[LemmaObj] {
        &self.objs[idx]
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Every (possibly overlapping) occurrence, ordered by start then pattern.
    pub fn find_untok(&self, text: &str) -> Vec<UntokMatch> {
        let char_at = byte_to_char(text);
        let mut out: Vec<UntokMatch> = self
            .ac
            .find_overlapping_iter(text)
            .map(|m| UntokMatch {
                char: char_at[m.start()],
                pattern: m.pattern().as_usize(),
            })
            .collect();
        out.sort_by_key(|m| (m.char, m.pattern));
        out
    }

    /// Occurrences aligned to token boundaries of `tokens`.
    pub fn find_tok(&self, tokens: &[&str]) -> Vec<TokMatch> {
        let mut joined = String::new();
        let mut starts = BTreeMap::new();
        let mut ends = BTreeMap::new();
        for (idx, tok) in tokens.iter().enumerate() {
            starts.insert(joined.len(), idx);
            joined.push_str(tok);
            ends.insert(joined.len(), idx);
        }
        let mut out: Vec<TokMatch> = self
            .ac
            .find_overlapping_iter(&joined)
            .filter_map(|m| {
                let first = *starts.get(&m.start())?;
                let last = *ends.get(&m.end())?;
                Some(TokMatch {
                    token: first,
                    token_length: last + 1 - first,
                    pattern: m.pattern().as_usize(),
                })
            })
            .collect();
        out.sort_by_key(|m| (m.token, m.pattern));
        out
    }
}

fn byte_to_char(text: &str) -> Vec<usize> {
    let mut map = vec![0; text.len() + 1];
    let mut chars = 0;
    for (byte, ch) in text.char_indices() {
        for slot in &mut map[byte..byte + ch.len_utf8()] {
            *slot = chars;
        }
        chars += 1;
    }
    map[text.len()] = chars;
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordnet_types::{Pos, SynsetId};

    fn obj(name: &str, offset: u32) -> (String, LemmaObj) {
        (
            name.to_string(),
            LemmaObj {
                wordnet: "cmn".into(),
                synset: SynsetId {
                    pos: Pos::Noun,
                    offset,
                },
                name: name.into(),
            },
        )
    }

    fn automaton() -> LemmaAutomaton {
        LemmaAutomaton::build([obj("朋友", 1), obj("阿兰", 2), obj("的朋", 3), obj("好莱坞", 4)])
            .unwrap()
    }

    #[test]
    fn untok_matches_use_char_offsets() {
        let ac = automaton();
        let found: Vec<(usize, &str)> = ac
            .find_untok("我的朋友，阿兰")
            .iter()
            .map(|m| (m.char, ac.pattern(m.pattern)))
            .collect();
        assert_eq!(found, vec![(1, "的朋"), (2, "朋友"), (5, "阿兰")]);
    }

    #[test]
    fn tok_matches_respect_token_boundaries() {
        let ac = automaton();
        let found: Vec<(usize, usize, &str)> = ac
            .find_tok(&["我", "的", "朋友", "，", "阿兰"])
            .iter()
            .map(|m| (m.token, m.token_length, ac.pattern(m.pattern)))
            .collect();
        assert_eq!(found, vec![(2, 1, "朋友"), (4, 1, "阿兰")]);
    }

    #[test]
    fn tok_matches_may_span_tokens() {
        let ac = automaton();
        let found = ac.find_tok(&["好莱", "坞"]);
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].token, found[0].token_length), (0, 2));
    }
}
