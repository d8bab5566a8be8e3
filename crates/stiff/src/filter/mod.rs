//! Sentence filters over STIFF annotations.
//!
//! Most filters are *tournaments*: annotations are grouped by a key (see
//! [`Keyed`]), scored by a [`Ranked`] or [`Compared`] policy, and the losers
//! of each group are removed. A tournament only reports survivors; the
//! [`TournamentFilter`] adapter applies them to the sentence.
//!
//! Filters are named by a short spec string such as `align dom`,
//! `naive-pos rm=-1` or `cond align 1 : hyp`. See [`build_filter`].

mod conditional;
mod misc;
mod rankers;
mod span;
mod tournament;

use std::collections::BTreeMap;
use std::sync::Arc;

use bitvec::prelude::*;

use crate::error::{Result, StiffError};
use crate::wordnets::{Lang, Wordnets};
use crate::xml::stiff::{Annotation, Gram, SentenceDoc};

pub use conditional::Conditional;
pub use misc::{Head, LangFilter, RmEmpty, RmNonFiSupport};
pub use rankers::{
    Align, Alphabetic, FreqRank, HasSupport, Hyp, LemmaPathRank, NaiveLemma, NaivePos, NonDeriv,
    PreferNonWikiSource, PreferNonWikiTarget, SrcCharLen, SrcCharSpan,
};
pub use span::{CharSpanDom, TokSpanDom};
pub use tournament::{Compared, PairwiseTournament, RankTournament, Ranked, RmAmbiguous};

/// What happens to a sentence after a filter ran.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    Keep,
    Bypass,
    Break,
}

pub trait SentenceFilter: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, doc: &mut SentenceDoc) -> Result<Verdict>;
}

/// Annotations and tagger readings of one sentence, parsed once per filter.
#[derive(Clone, Debug, Default)]
pub struct SentenceCtx {
    pub annotations: Vec<Annotation>,
    pub grams: BTreeMap<usize, Gram>,
}

impl SentenceCtx {
    pub fn from_doc(doc: &SentenceDoc) -> Result<Self> {
        Ok(Self {
            annotations: doc.annotations()?,
            grams: doc.grams()?,
        })
    }

    /// The annotations selected by `mask`, and their positions in `self`.
    pub fn subset(&self, mask: &BitSlice) -> (SentenceCtx, Vec<usize>) {
        let positions: Vec<usize> = mask.iter_ones().collect();
        let ctx = SentenceCtx {
            annotations: positions.iter().map(|i| self.annotations[*i].clone()).collect(),
            grams: self.grams.clone(),
        };
        (ctx, positions)
    }
}

/// Grouping of annotations that compete with each other.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GroupKey {
    pub lang: String,
    pub from_id: String,
    pub start: usize,
    pub len: usize,
}

pub trait Keyed {
    const NAME: &'static str;
    fn key(ann: &Annotation) -> GroupKey;
}

/// Token span of the first tokenised anchor; character span otherwise.
pub struct SpanKey;

impl Keyed for SpanKey {
    const NAME: &'static str = "span";

    fn key(ann: &Annotation) -> GroupKey {
        if let Some((from_id, start, len)) = ann.token_span() {
            return GroupKey {
                lang: ann.lang.clone(),
                from_id: from_id.to_string(),
                start,
                len,
            };
        }
        CharKey::key(ann)
    }
}

/// Character offset and length of the preferred anchor.
pub struct CharKey;

impl Keyed for CharKey {
    const NAME: &'static str = "char";

    fn key(ann: &Annotation) -> GroupKey {
        let (from_id, start) = ann
            .primary_position()
            .map(|a| (a.from_id.clone(), a.char))
            .unwrap_or_default();
        GroupKey {
            lang: ann.lang.clone(),
            from_id,
            start,
            len: ann.anchor_char_len(),
        }
    }
}

/// Positions of the live annotations, grouped by key.
pub fn groups<K: Keyed>(ctx: &SentenceCtx, alive: &BitSlice) -> BTreeMap<GroupKey, Vec<usize>> {
    let mut out: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    for idx in alive.iter_ones() {
        out.entry(K::key(&ctx.annotations[idx])).or_default().push(idx);
    }
    out
}

pub trait Tournament: Send + Sync {
    /// Name of the grouping the tournament competes within.
    fn key_name(&self) -> &'static str;
    /// One bit per annotation of `ctx`; set bits survive.
    fn survivors(&self, ctx: &SentenceCtx) -> Result<BitVec>;
}

impl<T: Tournament + ?Sized> Tournament for Box<T> {
    fn key_name(&self) -> &'static str {
        (**self).key_name()
    }

    fn survivors(&self, ctx: &SentenceCtx) -> Result<BitVec> {
        (**self).survivors(ctx)
    }
}

pub struct TournamentFilter<T> {
    name: String,
    inner: T,
}

impl<T: Tournament> TournamentFilter<T> {
    pub fn new(name: impl Into<String>, inner: T) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

impl<T: Tournament> SentenceFilter for TournamentFilter<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, doc: &mut SentenceDoc) -> Result<Verdict> {
        let ctx = SentenceCtx::from_doc(doc)?;
        let mask = self.inner.survivors(&ctx)?;
        if mask.count_ones() < mask.len() {
            doc.retain_annotations(|idx| mask.get(idx).is_some_and(|b| *b));
        }
        Ok(Verdict::Keep)
    }
}

/// Shared resources some filters consult.
#[derive(Clone, Default)]
pub struct FilterResources {
    pub wordnets: Option<Arc<Wordnets>>,
}

/// Filter names understood by [`build_filter`].
pub const FILTER_NAMES: &[&str] = &[
    "has-support",
    "align",
    "src-char-len",
    "src-char-span",
    "naive-lemma",
    "naive-pos",
    "lemma-path",
    "non-deriv",
    "freq",
    "alphabetic",
    "prefer-non-wiki-target",
    "prefer-non-wiki-source",
    "hyp",
    "tok-span",
    "char-span",
    "rm-ambg",
    "lang",
    "rm-empty",
    "head",
    "rm-non-fi-support",
    "cond",
];

/// Options after a filter name: `dom`, `rm=<r>[,<r>…]`, and positionals.
#[derive(Debug, Default)]
struct Options {
    dom: bool,
    rm_ranks: Vec<i64>,
    positional: Vec<String>,
}

impl Options {
    fn parse(words: &[&str]) -> Result<Self> {
        let mut opts = Options::default();
        for word in words {
            if *word == "dom" {
                opts.dom = true;
            } else if let Some(ranks) = word.strip_prefix("rm=") {
                for rank in ranks.split(',').filter(|r| !r.is_empty()) {
                    opts.rm_ranks.push(rank.parse().map_err(|_| {
                        StiffError::FilterOption(format!("rank {rank:?} is not an integer"))
                    })?);
                }
            } else {
                opts.positional.push(word.to_string());
            }
        }
        Ok(opts)
    }

    fn no_positionals(&self, name: &str) -> Result<()> {
        if self.positional.is_empty() {
            Ok(())
        } else {
            Err(StiffError::FilterOption(format!(
                "{name} takes no arguments, got {:?}",
                self.positional
            )))
        }
    }
}

fn rank_tournament<R: Ranked + 'static>(name: &str, ranker: R, opts: &Options) -> Result<Box<dyn Tournament>> {
    opts.no_positionals(name)?;
    if !opts.dom && opts.rm_ranks.is_empty() {
        return Err(StiffError::FilterOption(format!(
            "{name} needs `dom` and/or `rm=…`"
        )));
    }
    Ok(Box::new(RankTournament::<R, SpanKey>::new(
        ranker,
        opts.dom,
        opts.rm_ranks.clone(),
    )))
}

/// Whether building `spec` requires [`FilterResources::wordnets`].
pub fn needs_wordnets(spec: &str) -> bool {
    spec.split_whitespace().any(|word| word == "hyp")
}

fn wordnets(res: &FilterResources, name: &str) -> Result<Arc<Wordnets>> {
    res.wordnets.clone().ok_or_else(|| {
        StiffError::FilterOption(format!("{name} needs wordnet resources"))
    })
}

/// Build a tournament from its spec; `None` for non-tournament filters.
fn build_tournament(name: &str, opts: &Options, res: &FilterResources) -> Result<Option<Box<dyn Tournament>>> {
    let pairwise = |cmp: Box<dyn Compared>| -> Result<Option<Box<dyn Tournament>>> {
        opts.no_positionals(name)?;
        if opts.dom || !opts.rm_ranks.is_empty() {
            return Err(StiffError::FilterOption(format!(
                "{name} always keeps the dominating annotations and takes no `dom` or `rm=`"
            )));
        }
        Ok(Some(Box::new(PairwiseTournament::<_, SpanKey>::new(cmp))))
    };
    let t: Box<dyn Tournament> = match name {
        "has-support" => rank_tournament(name, HasSupport, opts)?,
        "align" => rank_tournament(name, Align, opts)?,
        "src-char-len" => rank_tournament(name, SrcCharLen, opts)?,
        "naive-lemma" => rank_tournament(name, NaiveLemma, opts)?,
        "naive-pos" => rank_tournament(name, NaivePos, opts)?,
        "lemma-path" => rank_tournament(name, LemmaPathRank, opts)?,
        "non-deriv" => rank_tournament(name, NonDeriv, opts)?,
        "freq" => rank_tournament(name, FreqRank, opts)?,
        "prefer-non-wiki-target" => rank_tournament(name, PreferNonWikiTarget, opts)?,
        "prefer-non-wiki-source" => rank_tournament(name, PreferNonWikiSource, opts)?,
        "src-char-span" => return pairwise(Box::new(SrcCharSpan)),
        "alphabetic" => return pairwise(Box::new(Alphabetic)),
        "hyp" => return pairwise(Box::new(Hyp::new(wordnets(res, name)?))),
        "tok-span" => {
            opts.no_positionals(name)?;
            Box::new(TokSpanDom)
        }
        "char-span" => {
            opts.no_positionals(name)?;
            Box::new(CharSpanDom)
        }
        "rm-ambg" => {
            opts.no_positionals(name)?;
            Box::new(RmAmbiguous::<SpanKey>::new())
        }
        "lang" => {
            let [lang] = opts.positional.as_slice() else {
                return Err(StiffError::FilterOption("lang takes one language".into()));
            };
            Box::new(LangFilter::new(lang.parse::<Lang>()?))
        }
        _ => return Ok(None),
    };
    Ok(Some(t))
}

/// Parse a filter spec into a runnable filter.
pub fn build_filter(spec: &str, res: &FilterResources) -> Result<Box<dyn SentenceFilter>> {
    let spec = spec.trim();
    let words: Vec<&str> = spec.split_whitespace().collect();
    let Some((name, rest)) = words.split_first() else {
        return Err(StiffError::UnknownFilter(String::new()));
    };

    if *name == "cond" {
        return Ok(Box::new(TournamentFilter::new(spec, build_conditional(spec, res)?)));
    }

    let opts = Options::parse(rest)?;
    if let Some(t) = build_tournament(name, &opts, res)? {
        return Ok(Box::new(TournamentFilter::new(spec, t)));
    }
    match *name {
        "rm-empty" => {
            opts.no_positionals(name)?;
            Ok(Box::new(RmEmpty))
        }
        "rm-non-fi-support" => {
            opts.no_positionals(name)?;
            Ok(Box::new(RmNonFiSupport))
        }
        "head" => {
            let n = match opts.positional.as_slice() {
                [n] => n.parse().map_err(|_| {
                    StiffError::FilterOption(format!("head count {n:?} is not a number"))
                })?,
                _ => return Err(StiffError::FilterOption("head takes one count".into())),
            };
            Ok(Box::new(Head::new(n)))
        }
        other => Err(StiffError::UnknownFilter(other.to_string())),
    }
}

/// `cond <rank-filter> <v>[,<v>…] : <tournament spec>`
fn build_conditional(spec: &str, res: &FilterResources) -> Result<Conditional> {
    let body = spec.trim_start_matches("cond").trim();
    let Some((filter, apply)) = body.split_once(':') else {
        return Err(StiffError::FilterOption(format!(
            "conditional {spec:?} needs `<filter> <values> : <apply>`"
        )));
    };
    let filter_words: Vec<&str> = filter.split_whitespace().collect();
    let &[filter_name, vals] = filter_words.as_slice() else {
        return Err(StiffError::FilterOption(format!(
            "conditional filter {filter:?} needs a name and values"
        )));
    };
    let vals = vals
        .split(',')
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| StiffError::FilterOption(format!("value {v:?} is not an integer")))
        })
        .collect::<Result<Vec<_>>>()?;
    let ranker: Box<dyn Ranked> = match filter_name {
        "has-support" => Box::new(HasSupport),
        "align" => Box::new(Align),
        "src-char-len" => Box::new(SrcCharLen),
        "naive-lemma" => Box::new(NaiveLemma),
        "naive-pos" => Box::new(NaivePos),
        "lemma-path" => Box::new(LemmaPathRank),
        "non-deriv" => Box::new(NonDeriv),
        "freq" => Box::new(FreqRank),
        "prefer-non-wiki-target" => Box::new(PreferNonWikiTarget),
        "prefer-non-wiki-source" => Box::new(PreferNonWikiSource),
        other => return Err(StiffError::UnknownFilter(other.to_string())),
    };
    let apply_words: Vec<&str> = apply.split_whitespace().collect();
    let Some((apply_name, apply_rest)) = apply_words.split_first() else {
        return Err(StiffError::FilterOption(format!("conditional {spec:?} lacks a filter to apply")));
    };
    let opts = Options::parse(apply_rest)?;
    let Some(apply) = build_tournament(apply_name, &opts, res)? else {
        return Err(StiffError::FilterOption(format!(
            "{apply_name} cannot be applied conditionally"
        )));
    };
    Conditional::new::<SpanKey>(apply, ranker, vals)
}
