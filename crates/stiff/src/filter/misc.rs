use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use bitvec::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::filter::{SentenceCtx, SentenceFilter, Tournament, Verdict};
use crate::wordnets::Lang;
use crate::xml::stiff::{Annotation, SentenceDoc, Support};

/// Keep annotations of one language.
pub struct LangFilter {
    lang: Lang,
}

impl LangFilter {
    pub fn new(lang: Lang) -> Self {
        Self { lang }
    }
}

impl Tournament for LangFilter {
    fn key_name(&self) -> &'static str {
        "lang"
    }

    fn survivors(&self, ctx: &SentenceCtx) -> Result<BitVec> {
        Ok(ctx
            .annotations
            .iter()
            .map(|ann| ann.lang == self.lang.as_str())
            .collect())
    }
}

/// Bypass sentences without annotations.
pub struct RmEmpty;

impl SentenceFilter for RmEmpty {
    fn name(&self) -> &str {
        "rm-empty"
    }

    fn apply(&self, doc: &mut SentenceDoc) -> Result<Verdict> {
        Ok(if doc.annotation_count() == 0 {
            Verdict::Bypass
        } else {
            Verdict::Keep
        })
    }
}

/// Pass the first `n` sentences, then stop the stream.
pub struct Head {
    limit: usize,
    seen: AtomicUsize,
}

impl Head {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            seen: AtomicUsize::new(0),
        }
    }
}

impl SentenceFilter for Head {
    fn name(&self) -> &str {
        "head"
    }

    fn apply(&self, _: &mut SentenceDoc) -> Result<Verdict> {
        if self.seen.fetch_add(1, Ordering::Relaxed) < self.limit {
            Ok(Verdict::Keep)
        } else {
            Ok(Verdict::Break)
        }
    }
}

/// Drop supports of Finnish annotations whose source annotation is no
/// longer in the sentence.
pub struct RmNonFiSupport;

impl SentenceFilter for RmNonFiSupport {
    fn name(&self) -> &str {
        "rm-non-fi-support"
    }

    fn apply(&self, doc: &mut SentenceDoc) -> Result<Verdict> {
        let present: BTreeSet<String> = doc.annotations()?.into_iter().map(|a| a.id).collect();
        let mut dropped = 0;
        for (idx, el) in doc.annotation_elements_mut().enumerate() {
            let ann = Annotation::from_element(idx, el)?;
            if ann.lang != Lang::Fi.as_str() || ann.supports.is_empty() {
                continue;
            }
            let kept: Vec<&Support> = ann
                .supports
                .iter()
                .filter(|s| s.transfer_from.as_ref().is_some_and(|id| present.contains(id)))
                .collect();
            if kept.len() == ann.supports.len() {
                continue;
            }
            dropped += ann.supports.len() - kept.len();
            if kept.is_empty() {
                el.remove_attr("support")?;
            } else {
                let encoded: Vec<String> = kept.iter().map(|s| s.encode()).collect();
                el.set_attr("support", &encoded.join(" "))?;
            }
        }
        if dropped > 0 {
            debug!(dropped, "removed dangling supports");
        }
        Ok(Verdict::Keep)
    }
}
