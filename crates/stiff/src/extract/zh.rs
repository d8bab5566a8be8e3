use std::collections::BTreeMap;

use crate::anchor::{Anchor, ZH_TOK, ZH_UNTOK, dense_offset, token_starts};
use crate::automaton::LemmaAutomaton;
use crate::error::{Result, StiffError};
use crate::tagging::{TaggedLemma, Tagging, Token};
use crate::wordnets::Wordnets;

/// Match both Chinese variants and merge tokens denoting one occurrence.
pub fn extract(
    untok: &str,
    tok: &str,
    wordnets: &Wordnets,
    automaton: &LemmaAutomaton,
) -> Result<Tagging> {
    let mut merged: BTreeMap<(usize, String), Token> = BTreeMap::new();

    for m in automaton.find_untok(untok) {
        let surface = automaton.pattern(m.pattern).to_string();
        let token = Token {
            token: surface.clone(),
            anchors: vec![Anchor::untok(ZH_UNTOK, m.char)],
            tags: tags_for(automaton, m.pattern, wordnets)?,
        };
        merged.insert((dense_offset(untok, m.char), surface), token);
    }

    let words: Vec<&str> = tok.split_whitespace().collect();
    let starts = token_starts(tok);
    for m in automaton.find_tok(&words) {
        let surface = automaton.pattern(m.pattern).to_string();
        let char = starts[m.token];
        let anchor = Anchor::tok(ZH_TOK, char, m.token, m.token_length);
        let key = (dense_offset(tok, char), surface.clone());
        match merged.get_mut(&key) {
            Some(existing) => {
                let tags = tags_for(automaton, m.pattern, wordnets)?;
                if tags != existing.tags {
                    return Err(StiffError::malformed(format!(
                        "tokenised and untokenised matches of {surface:?} disagree on tags"
                    )));
                }
                existing.anchors.push(anchor);
            }
            None => {
                merged.insert(
                    key,
                    Token {
                        token: surface,
                        anchors: vec![anchor],
                        tags: tags_for(automaton, m.pattern, wordnets)?,
                    },
                );
            }
        }
    }

    Ok(Tagging::new(merged.into_values().collect()))
}

fn tags_for(automaton: &LemmaAutomaton, pattern: usize, wordnets: &Wordnets) -> Result<Vec<TaggedLemma>> {
    let lemma = automaton.pattern(pattern);
    Ok(wordnets
        .group_canonical(automaton.objs(pattern).to_vec())?
        .into_values()
        .map(|objs| TaggedLemma::new(lemma, objs))
        .collect())
}
