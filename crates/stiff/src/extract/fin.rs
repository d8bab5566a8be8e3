use fin_morph::{Analyser, LemmaPath, Lemmatizer, PosTagger, Tagged};

use crate::anchor::{Anchor, FI_TOK};
use crate::error::Result;
use crate::mwe::MweTrie;
use crate::tagging::{TaggedLemma, Tagging, Token};
use crate::wordnets::{Lang, Wordnets};

/// Finnish tagging plus the POS tagger's reading of every token.
pub struct FinExtraction {
    pub tagging: Tagging,
    pub grams: Vec<Option<Tagged>>,
}

pub fn extract<A: Analyser>(
    text: &str,
    wordnets: &Wordnets,
    lemmatizer: &Lemmatizer<A>,
    tagger: &dyn PosTagger,
    trie: &MweTrie,
) -> Result<FinExtraction> {
    let words = lemmatizer.analyser().tokenize(text);
    let surfaces: Vec<&str> = words.iter().map(|w| w.surface.as_str()).collect();
    let grams = tagger.tag(&surfaces);

    let mut tokens = Vec::with_capacity(words.len());
    let mut candidates: Vec<Vec<(String, LemmaPath)>> = Vec::with_capacity(words.len());
    for (idx, word) in words.iter().enumerate() {
        let tagger_lemma = grams.get(idx).and_then(|g| g.as_ref()).map(|g| g.lemma.as_str());
        let cands = lemmatizer.lemmas_for(&word.surface, tagger_lemma);

        let mut tags = Vec::new();
        for cand in &cands {
            let groups = wordnets.group_canonical(wordnets.lemma_objs(Lang::Fi, &cand.lemma))?;
            for (_, objs) in groups {
                let mut tag = TaggedLemma::new(cand.lemma.clone(), objs);
                tag.lemma_path = vec![cand.path];
                tags.push(tag);
            }
        }
        tokens.push(Token {
            token: word.surface.clone(),
            anchors: vec![Anchor::tok(FI_TOK, word.start, idx, 1)],
            tags,
        });

        let mut lemmas: Vec<(String, LemmaPath)> = vec![(word.surface.to_lowercase(), LemmaPath::Surface)];
        lemmas.extend(cands.into_iter().map(|c| (c.lemma, c.path)));
        candidates.push(lemmas);
    }

    for found in trie.matches(&candidates) {
        let entry = trie.entry(found.entry);
        let span = &words[found.start..found.start + found.len];
        let surface = span
            .iter()
            .map(|w| w.surface.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let mut tags = Vec::new();
        for (_, objs) in wordnets.group_canonical(entry.objs.clone())? {
            let mut tag = TaggedLemma::new(entry.name.clone(), objs);
            tag.lemma_path = found.paths.clone();
            tags.push(tag);
        }
        tokens.push(Token {
            token: surface,
            anchors: vec![Anchor::tok(FI_TOK, span[0].start, found.start, found.len)],
            tags,
        });
    }

    Ok(FinExtraction {
        tagging: Tagging::new(tokens),
        grams,
    })
}
