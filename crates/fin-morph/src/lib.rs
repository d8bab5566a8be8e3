//! Finnish morphology as seen by the sense tagger.
//!
//! The morphological analyser and the POS tagger are external tools; this
//! crate only fixes their interfaces ([`Analyser`], [`PosTagger`]) and ships
//! table-backed implementations that read precomputed analyses. On top of
//! the analyser, [`Lemmatizer`] extracts every candidate lemma of a surface
//! form together with the path that produced it.
//!
//! # How it works
//! 1. Analyse the surface form; each analysis lemma is a direct candidate.
//! 2. Recurse: compound tails and re-analyses of found lemmas add further
//!    candidates, marked [`LemmaPath::Recursive`].
//! 3. Add the POS tagger's base form if it is new.
//! 4. Fall back to the lowercased surface when nothing else is known.
//!
//! # Example
//! ```
//! use fin_morph::{Lemmatizer, LemmaPath, TableAnalyser};
//!
//! let analyser = TableAnalyser::from_rows("ystäväni\tystävä\tNOUN\nkotitalous\tkoti#talous\tNOUN\n")
//!     .unwrap();
//! let lemmatizer = Lemmatizer::new(analyser);
//! let cands = lemmatizer.lemmas_for("kotitalous", None);
//! assert_eq!(cands[0].lemma, "kotitalous");
//! assert!(cands.iter().any(|c| c.lemma == "talous" && c.path == LemmaPath::Recursive));
//! ```

mod tagger;
mod tokens;

pub use tagger::{PosTagger, TableTagger, Tagged};
pub use tokens::{Token, tokenize_whitespace, word_bounds, words};

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;

const MAX_RECURSION: usize = 3;

/// One reading of a surface form.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Analysis {
    /// Base form with compound boundaries removed.
    pub lemma: String,
    /// Compound parts; a single element for non-compounds.
    pub parts: Vec<String>,
    /// Universal POS tag, if the analyser supplies one.
    pub pos: Option<String>,
}

impl Analysis {
    /// Build an analysis from a lemma using `#` as the compound boundary.
    pub fn from_segmented(segmented: &str, pos: Option<&str>) -> Self {
        let parts: Vec<String> = segmented
            .split('#')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            lemma: parts.concat(),
            parts,
            pos: pos.map(str::to_string),
        }
    }
}

/// Morphological analyser interface.
pub trait Analyser: Send + Sync {
    /// All readings of `surface`; empty when the word is unknown.
    fn analyse(&self, surface: &str) -> Vec<Analysis>;

    /// Split a sentence into tokens with their start character offsets.
    ///
    /// The corpus is pre-tokenised, so the default splits on whitespace.
    fn tokenize(&self, text: &str) -> Vec<Token> {
        tokenize_whitespace(text)
    }
}

impl<A: Analyser + ?Sized> Analyser for Arc<A> {
    fn analyse(&self, surface: &str) -> Vec<Analysis> {
        (**self).analyse(surface)
    }

    fn tokenize(&self, text: &str) -> Vec<Token> {
        (**self).tokenize(text)
    }
}

/// Analyser reading `surface<TAB>lemma[<TAB>pos]` rows.
///
/// Lemmas mark compound boundaries with `#` (`koti#talous`). A surface may
/// have several rows. Lookups try the exact surface, then its lowercase form.
#[derive(Clone, Debug, Default)]
pub struct TableAnalyser {
    analyses: HashMap<String, Vec<Analysis>>,
}

impl TableAnalyser {
    /// Load an analysis table from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("open analysis table {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("parse analysis table {}", path.display()))
    }

    pub fn from_rows(rows: &str) -> Result<Self> {
        Self::from_reader(rows.as_bytes())
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut analyses: HashMap<String, Vec<Analysis>> = HashMap::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("read line {}", lineno + 1))?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let surface = fields.next().unwrap_or_default().trim();
            let Some(lemma) = fields.next().map(str::trim).filter(|l| !l.is_empty()) else {
                anyhow::bail!("line {}: expected surface<TAB>lemma", lineno + 1);
            };
            let pos = fields.next().map(str::trim).filter(|p| !p.is_empty());
            let analysis = Analysis::from_segmented(lemma, pos);
            let entry = analyses.entry(surface.to_string()).or_default();
            if !entry.contains(&analysis) {
                entry.push(analysis);
            }
        }
        Ok(Self { analyses })
    }

    pub fn len(&self) -> usize {
        self.analyses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyses.is_empty()
    }
}

impl Analyser for TableAnalyser {
    fn analyse(&self, surface: &str) -> Vec<Analysis> {
        if let Some(found) = self.analyses.get(surface) {
            return found.clone();
        }
        self.analyses
            .get(&surface.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}

/// Memoising wrapper so each distinct surface is analysed once per process.
pub struct CachedAnalyser<A> {
    inner: A,
    cache: DashMap<String, Arc<[Analysis]>>,
}

impl<A: Analyser> CachedAnalyser<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

impl<A: Analyser> Analyser for CachedAnalyser<A> {
    fn analyse(&self, surface: &str) -> Vec<Analysis> {
        if let Some(hit) = self.cache.get(surface) {
            return hit.to_vec();
        }
        let found: Arc<[Analysis]> = self.inner.analyse(surface).into();
        self.cache.insert(surface.to_string(), Arc::clone(&found));
        found.to_vec()
    }

    fn tokenize(&self, text: &str) -> Vec<Token> {
        self.inner.tokenize(text)
    }
}

/// How a candidate lemma was reached from the surface form.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum LemmaPath {
    /// The surface itself, used when nothing else is known.
    Surface,
    /// A direct analysis of the surface.
    Analysis,
    /// A compound tail or re-analysis of another lemma.
    Recursive,
    /// Only the POS tagger proposed it.
    Tagger,
}

impl LemmaPath {
    pub fn as_str(self) -> &'static str {
        match self {
            LemmaPath::Surface => "surf",
            LemmaPath::Analysis => "morph",
            LemmaPath::Recursive => "recur",
            LemmaPath::Tagger => "postag",
        }
    }
}

impl fmt::Display for LemmaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LemmaPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "surf" => Ok(LemmaPath::Surface),
            "morph" => Ok(LemmaPath::Analysis),
            "recur" => Ok(LemmaPath::Recursive),
            "postag" => Ok(LemmaPath::Tagger),
            other => Err(format!("unknown lemma path {other:?}")),
        }
    }
}

/// A lemma candidate paired with its provenance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LemmaCandidate {
    pub lemma: String,
    pub path: LemmaPath,
}

/// Candidate lemma extraction over an [`Analyser`].
pub struct Lemmatizer<A> {
    analyser: A,
    max_depth: usize,
}

impl<A: Analyser> Lemmatizer<A> {
    pub fn new(analyser: A) -> Self {
        Self {
            analyser,
            max_depth: MAX_RECURSION,
        }
    }

    pub fn analyser(&self) -> &A {
        &self.analyser
    }

    /// Candidate lemmas for a surface form, direct analyses first.
    ///
    /// `tagger_lemma` is the POS tagger's base form for this token, if any.
    /// Each lemma appears once, with the first path that reached it.
    pub fn lemmas_for(&self, surface: &str, tagger_lemma: Option<&str>) -> Vec<LemmaCandidate> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();

        for analysis in self.analyser.analyse(surface) {
            push_unique(&mut out, &mut seen, &analysis.lemma, LemmaPath::Analysis);
            queue.push_back((analysis.lemma.clone(), 1));
            self.push_tails(&analysis, 1, &mut out, &mut seen, &mut queue);
        }

        while let Some((word, depth)) = queue.pop_front() {
            if depth > self.max_depth {
                continue;
            }
            for analysis in self.analyser.analyse(&word) {
                if push_unique(&mut out, &mut seen, &analysis.lemma, LemmaPath::Recursive) {
                    queue.push_back((analysis.lemma.clone(), depth + 1));
                }
                self.push_tails(&analysis, depth + 1, &mut out, &mut seen, &mut queue);
            }
        }

        if let Some(lemma) = tagger_lemma.filter(|l| !l.is_empty()) {
            push_unique(&mut out, &mut seen, lemma, LemmaPath::Tagger);
        }

        if out.is_empty() && !surface.is_empty() {
            push_unique(&mut out, &mut seen, &surface.to_lowercase(), LemmaPath::Surface);
        }

        out
    }

    /// The word itself plus every lemma reachable from it, for matching
    /// multiword entries against token candidates.
    pub fn lemma_set(&self, word: &str) -> Vec<String> {
        let mut set = vec![word.to_string()];
        for cand in self.lemmas_for(word, None) {
            if !set.contains(&cand.lemma) {
                set.push(cand.lemma);
            }
        }
        set
    }

    fn push_tails(
        &self,
        analysis: &Analysis,
        depth: usize,
        out: &mut Vec<LemmaCandidate>,
        seen: &mut HashSet<String>,
        queue: &mut VecDeque<(String, usize)>,
    ) {
        if depth > self.max_depth {
            return;
        }
        for k in 1..analysis.parts.len() {
            let tail = analysis.parts[k..].concat();
            if push_unique(out, seen, &tail, LemmaPath::Recursive) {
                queue.push_back((tail, depth + 1));
            }
        }
    }
}

fn push_unique(
    out: &mut Vec<LemmaCandidate>,
    seen: &mut HashSet<String>,
    lemma: &str,
    path: LemmaPath,
) -> bool {
    if lemma.is_empty() || !seen.insert(lemma.to_string()) {
        return false;
    }
    out.push(LemmaCandidate {
        lemma: lemma.to_string(),
        path,
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyser(rows: &str) -> TableAnalyser {
        TableAnalyser::from_rows(rows).expect("rows parse")
    }

    #[test]
    fn direct_analyses_come_first() {
        let lem = Lemmatizer::new(analyser("ystäväni\tystävä\tNOUN\nystävä\tystävä\tNOUN\n"));
        let cands = lem.lemmas_for("ystäväni", Some("ystävä"));
        assert_eq!(
            cands,
            vec![LemmaCandidate {
                lemma: "ystävä".into(),
                path: LemmaPath::Analysis
            }]
        );
    }

    #[test]
    fn compounds_recurse_into_tails() {
        let lem = Lemmatizer::new(analyser(
            "kotitaloudessa\tkoti#talous\tNOUN\ntalous\ttalous\tNOUN\n",
        ));
        let cands = lem.lemmas_for("kotitaloudessa", None);
        let lemmas: Vec<_> = cands.iter().map(|c| (c.lemma.as_str(), c.path)).collect();
        assert_eq!(
            lemmas,
            vec![
                ("kotitalous", LemmaPath::Analysis),
                ("talous", LemmaPath::Recursive)
            ]
        );
    }

    #[test]
    fn reanalysis_of_lemmas_is_recursive() {
        let lem = Lemmatizer::new(analyser(
            "juoksijoille\tjuoksija\tNOUN\njuoksija\tjuosta\tVERB\njuoksija\tjuoksija\tNOUN\n",
        ));
        let cands = lem.lemmas_for("juoksijoille", None);
        assert_eq!(cands[0].lemma, "juoksija");
        assert_eq!(cands[0].path, LemmaPath::Analysis);
        assert!(
            cands
                .iter()
                .any(|c| c.lemma == "juosta" && c.path == LemmaPath::Recursive)
        );
    }

    #[test]
    fn tagger_and_surface_fallbacks() {
        let lem = Lemmatizer::new(analyser(""));
        let cands = lem.lemmas_for("Alan", Some("Alan"));
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].path, LemmaPath::Tagger);

        let cands = lem.lemmas_for("Hmm", None);
        assert_eq!(cands[0].lemma, "hmm");
        assert_eq!(cands[0].path, LemmaPath::Surface);
    }

    #[test]
    fn table_lookup_falls_back_to_lowercase() {
        let table = analyser("hyvä\thyvä\tADJ\n");
        assert_eq!(table.analyse("Hyvä").len(), 1);
        assert!(TableAnalyser::from_rows("no-lemma-column\n").is_err());
    }

    #[test]
    fn cache_memoises_surfaces() {
        let cached = CachedAnalyser::new(analyser("hyvä\thyvä\tADJ\n"));
        assert_eq!(cached.analyse("hyvä").len(), 1);
        assert_eq!(cached.analyse("hyvä").len(), 1);
        assert_eq!(cached.analyse("pahaa").len(), 0);
        assert_eq!(cached.cached_entries(), 2);
    }

    #[test]
    fn lemma_paths_parse_back() {
        for path in [
            LemmaPath::Surface,
            LemmaPath::Analysis,
            LemmaPath::Recursive,
            LemmaPath::Tagger,
        ] {
            assert_eq!(path.as_str().parse::<LemmaPath>(), Ok(path));
        }
    }
}
