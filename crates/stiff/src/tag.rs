//! Tagging a whole corpus into a STIFF document.

use std::io::Write;
use std::time::Instant;

use fin_morph::Analyser;
use serde::Serialize;
use tracing::{debug, info};

use crate::callback::iter_from_callback;
use crate::corpus::{CorpusPaths, for_each_pair};
use crate::error::{Result, StiffError};
use crate::extract::{Extractor, SentencePair};
use crate::xml::stiff::{StiffWriter, sentence_element};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct TagStats {
    pub sentences: usize,
    pub fi_tags: usize,
    pub zh_tags: usize,
    /// Finnish tags with at least one support.
    pub supported: usize,
}

/// Tag the corpus at `paths`, writing STIFF to `output`.
///
/// Reading runs on its own thread; stopping early (a `limit`, an error or a
/// closed output) shuts it down.
pub fn tag_corpus<A: Analyser, W: Write>(
    paths: CorpusPaths,
    extractor: &Extractor<A>,
    output: W,
    limit: Option<usize>,
) -> Result<TagStats> {
    let start = Instant::now();
    let pairs = iter_from_callback::<SentencePair, StiffError, _>(move |emit| {
        for_each_pair(&paths, |pair| emit(pair))
    });

    let mut writer = StiffWriter::new(output)?;
    let mut stats = TagStats::default();
    for pair in pairs {
        if limit.is_some_and(|n| stats.sentences >= n) {
            break;
        }
        let pair = pair?;
        let tagged = extractor.tag_pair(&pair)?;
        stats.sentences += 1;
        stats.fi_tags += tagged.fi.tag_count();
        stats.zh_tags += tagged.zh.tag_count();
        stats.supported += tagged.fi.tags().filter(|(_, t)| !t.supports.is_empty()).count();
        debug!(line = pair.line, fi = tagged.fi.tag_count(), zh = tagged.zh.tag_count(), "tagged");

        let sentence = sentence_element(pair.line, &pair, &tagged);
        writer.write_sentence(&pair.sources, &pair.imdb, &sentence)?;
    }
    writer.finish()?.flush()?;
    info!(
        sentences = stats.sentences,
        fi_tags = stats.fi_tags,
        zh_tags = stats.zh_tags,
        supported = stats.supported,
        "corpus tagged in {} ms",
        start.elapsed().as_millis()
    );
    Ok(stats)
}
