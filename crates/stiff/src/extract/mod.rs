//! Sentence-level extraction: both languages, supports and ranks.
//!
//! The Chinese automaton and the Finnish multiword trie are expensive to
//! build, so an [`Extractor`] builds each on first use and keeps it for
//! the rest of the run. Separate extractors never share them, which keeps
//! tests free to construct their own resources.

mod fin;
mod zh;

use std::sync::Arc;
use std::time::Instant;

use fin_morph::{Analyser, Lemmatizer, PosTagger, Tagged};
use once_cell::sync::OnceCell;
use tracing::info;

use crate::alignment::WordAlignment;
use crate::automaton::LemmaAutomaton;
use crate::error::Result;
use crate::mwe::MweTrie;
use crate::support::{add_supports, assign_ranks};
use crate::tagging::{Tagging, assign_ids};
use crate::wordnets::{Lang, Wordnets};

pub use fin::FinExtraction;

/// One sentence pair as read from the corpus.
#[derive(Clone, Debug, Default)]
pub struct SentencePair {
    /// 1-based line in the tokenised files.
    pub line: usize,
    pub sources: String,
    pub imdb: String,
    pub fi: String,
    pub zh_tok: String,
    pub zh_untok: String,
    pub alignment: WordAlignment,
}

/// Both taggings of a sentence pair, ids, supports and ranks assigned.
#[derive(Clone, Debug)]
pub struct TaggedSentence {
    pub fi: Tagging,
    pub zh: Tagging,
    pub grams: Vec<Option<Tagged>>,
}

pub struct Extractor<A> {
    wordnets: Arc<Wordnets>,
    lemmatizer: Lemmatizer<A>,
    tagger: Box<dyn PosTagger>,
    zh_automaton: OnceCell<LemmaAutomaton>,
    mwe_trie: OnceCell<MweTrie>,
}

impl<A: Analyser> Extractor<A> {
    pub fn new(wordnets: Arc<Wordnets>, analyser: A, tagger: Box<dyn PosTagger>) -> Self {
        Self {
            wordnets,
            lemmatizer: Lemmatizer::new(analyser),
            tagger,
            zh_automaton: OnceCell::new(),
            mwe_trie: OnceCell::new(),
        }
    }

    pub fn wordnets(&self) -> &Wordnets {
        &self.wordnets
    }

    pub fn lemmatizer(&self) -> &Lemmatizer<A> {
        &self.lemmatizer
    }

    fn zh_automaton(&self) -> Result<&LemmaAutomaton> {
        self.zh_automaton.get_or_try_init(|| {
            let start = Instant::now();
            let automaton = LemmaAutomaton::build(self.wordnets.entries(Lang::Zh))?;
            info!(
                patterns = automaton.len(),
                "Chinese automaton built in {} ms",
                start.elapsed().as_millis()
            );
            Ok(automaton)
        })
    }

    fn mwe_trie(&self) -> &MweTrie {
        self.mwe_trie.get_or_init(|| {
            let start = Instant::now();
            let trie = MweTrie::build(self.wordnets.entries(Lang::Fi), &self.lemmatizer);
            info!(
                entries = trie.len(),
                "multiword trie built in {} ms",
                start.elapsed().as_millis()
            );
            trie
        })
    }

    pub fn extract_fi(&self, text: &str) -> Result<FinExtraction> {
        fin::extract(
            text,
            &self.wordnets,
            &self.lemmatizer,
            self.tagger.as_ref(),
            self.mwe_trie(),
        )
    }

    pub fn extract_zh(&self, untok: &str, tok: &str) -> Result<Tagging> {
        zh::extract(untok, tok, &self.wordnets, self.zh_automaton()?)
    }

    pub fn tag_pair(&self, pair: &SentencePair) -> Result<TaggedSentence> {
        let FinExtraction { tagging: mut fi, grams } = self.extract_fi(&pair.fi)?;
        let mut zh = self.extract_zh(&pair.zh_untok, &pair.zh_tok)?;
        assign_ids(&mut fi, &mut zh);
        add_supports(&mut fi, &mut zh, &pair.alignment, &self.wordnets);
        assign_ranks(&mut fi, &self.wordnets);
        Ok(TaggedSentence { fi, zh, grams })
    }
}
