//! Resource locations and switches, read from the environment.
//!
//! Command-line flags override these after [`Config::from_env`]; nothing
//! here touches the filesystem until one of the `load_*` methods runs.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use fin_morph::{CachedAnalyser, TableAnalyser, TableTagger};
use tracing::{info, warn};
use wordnet_db::{LemmaCounts, LoadMode, WordNet};

use crate::convert::eurosense::BabelMap;
use crate::error::{Result, StiffError};
use crate::t2s::T2s;
use crate::wordnets::Wordnets;

const DEFAULT_WORDNET_DIR: &str = "data/wordnet";
const DEFAULT_TAB_DIR: &str = "data/omw";
const DEFAULT_MORPH_DIR: &str = "data/morph";

/// Analyses table inside the morphology directory.
pub const ANALYSES_FILE: &str = "analyses.tsv";
/// POS tag table inside the morphology directory.
pub const POSTAGS_FILE: &str = "postags.tsv";

#[derive(Clone, Debug)]
pub struct Config {
    pub wordnet_dir: PathBuf,
    pub wordnet_mode: LoadMode,
    pub tab_dir: PathBuf,
    pub morph_dir: PathBuf,
    pub lemma_counts: Option<PathBuf>,
    pub t2s: Option<PathBuf>,
    pub babel_map: Option<PathBuf>,
    /// Write every pipeline stage to a file here instead of fusing stages.
    pub pipeline_tmpdir: Option<PathBuf>,
    pub trace_pipeline: bool,
}

/// `1`, `true`, `yes` and `on`, in any case.
pub fn truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| var(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        Config {
            wordnet_dir: path("WORDNET_DIR").unwrap_or_else(|| PathBuf::from(DEFAULT_WORDNET_DIR)),
            wordnet_mode: var("WORDNET_LOAD_MODE")
                .as_deref()
                .and_then(LoadMode::parse)
                .unwrap_or(LoadMode::Mmap),
            tab_dir: path("STIFF_WORDNETS").unwrap_or_else(|| PathBuf::from(DEFAULT_TAB_DIR)),
            morph_dir: path("STIFF_MORPH").unwrap_or_else(|| PathBuf::from(DEFAULT_MORPH_DIR)),
            lemma_counts: path("STIFF_LEMMA_COUNTS"),
            t2s: path("STIFF_T2S"),
            babel_map: path("BABEL2WN_MAP"),
            pipeline_tmpdir: path("EUROSENSE_PIPELINE_TMPDIR"),
            trace_pipeline: var("TRACE_PIPELINE").as_deref().is_some_and(truthy),
        }
    }

    fn require(what: &'static str, path: &Path) -> Result<()> {
        if path.exists() {
            Ok(())
        } else {
            Err(StiffError::ResourceMissing {
                what,
                path: path.to_path_buf(),
            })
        }
    }

    pub fn load_pwn(&self) -> Result<WordNet> {
        Self::require("Princeton WordNet", &self.wordnet_dir)?;
        let start = Instant::now();
        let wn = WordNet::load_with_mode(&self.wordnet_dir, self.wordnet_mode)
            .map_err(|source| StiffError::Resource {
                what: "Princeton WordNet",
                source,
            })?;
        info!(
            "wordnet loaded from {} in {} ms (mode: {:?})",
            self.wordnet_dir.display(),
            start.elapsed().as_millis(),
            self.wordnet_mode
        );
        Ok(wn)
    }

    pub fn load_wordnets(&self) -> Result<Wordnets> {
        Self::require("wordnet tab directory", &self.tab_dir)?;
        let pwn = self.load_pwn()?;
        let counts = match &self.lemma_counts {
            Some(path) => {
                Self::require("lemma counts", path)?;
                LemmaCounts::load(path).map_err(|source| StiffError::Resource {
                    what: "lemma counts",
                    source,
                })?
            }
            None => {
                warn!("no lemma counts configured; frequency ranks will all tie");
                LemmaCounts::default()
            }
        };
        let t2s = match &self.t2s {
            Some(path) => {
                Self::require("t2s table", path)?;
                T2s::load(path).map_err(|source| StiffError::Resource {
                    what: "t2s table",
                    source,
                })?
            }
            None => T2s::identity(),
        };
        Wordnets::load(&self.tab_dir, pwn, counts, t2s)
    }

    pub fn load_analyser(&self) -> Result<CachedAnalyser<TableAnalyser>> {
        let path = self.morph_dir.join(ANALYSES_FILE);
        Self::require("morphological analyses", &path)?;
        let table = TableAnalyser::load(&path).map_err(|source| StiffError::Resource {
            what: "morphological analyses",
            source,
        })?;
        info!(surfaces = table.len(), "loaded analyses from {}", path.display());
        Ok(CachedAnalyser::new(table))
    }

    pub fn load_tagger(&self) -> Result<TableTagger> {
        let path = self.morph_dir.join(POSTAGS_FILE);
        if !path.exists() {
            warn!(path = %path.display(), "no POS tag table; tokens stay untagged");
            return Ok(TableTagger::default());
        }
        TableTagger::load(&path).map_err(|source| StiffError::Resource {
            what: "POS tag table",
            source,
        })
    }

    pub fn load_babel_map(&self) -> Result<BabelMap> {
        let Some(path) = &self.babel_map else {
            return Err(StiffError::ResourceMissing {
                what: "babel to wordnet map (set BABEL2WN_MAP)",
                path: PathBuf::new(),
            });
        };
        BabelMap::load(path)
    }
}
