//! The union of Finnish and Chinese wordnets plus the Princeton relations
//! they are keyed by.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use tracing::{info, warn};
use wordnet_db::{LemmaCounts, TabWordNet, WordNet};
use wordnet_types::SynsetId;

use crate::error::{Result, StiffError};
use crate::t2s::T2s;
use crate::tagging::LemmaObj;

pub const FIN_WORDNETS: [&str; 3] = ["fin", "qf2", "qwf"];
pub const ZH_WORDNETS: [&str; 3] = ["cmn", "qcn", "qwc"];
/// Resources extracted from Wiktionary; lower quality than the curated ones.
pub const WIKI_WORDNETS: [&str; 2] = ["qwf", "qwc"];

const REQUIRED: [&str; 2] = ["fin", "cmn"];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Lang {
    Fi,
    Zh,
}

impl Lang {
    pub fn as_str(self) -> &'static str {
        match self {
            Lang::Fi => "fi",
            Lang::Zh => "zh",
        }
    }

    pub fn other(self) -> Lang {
        match self {
            Lang::Fi => Lang::Zh,
            Lang::Zh => Lang::Fi,
        }
    }

    fn wordnet_ids(self) -> &'static [&'static str] {
        match self {
            Lang::Fi => &FIN_WORDNETS,
            Lang::Zh => &ZH_WORDNETS,
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lang {
    type Err = StiffError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fi" => Ok(Lang::Fi),
            "zh" => Ok(Lang::Zh),
            other => Err(StiffError::FilterOption(format!("unknown language {other:?}"))),
        }
    }
}

pub fn is_wiki(wordnet: &str) -> bool {
    WIKI_WORDNETS.contains(&wordnet)
}

/// Every lexical resource extraction and filtering consult.
///
/// The Princeton database is optional only so that tests can run without
/// one; [`Wordnets::load`] always requires it. Without it there are no
/// derivational expansions, hypernym paths or sense names.
pub struct Wordnets {
    fin: Vec<TabWordNet>,
    zh: Vec<TabWordNet>,
    pwn: Option<WordNet>,
    counts: LemmaCounts,
    t2s: T2s,
}

impl Wordnets {
    pub fn from_parts(
        fin: Vec<TabWordNet>,
        zh: Vec<TabWordNet>,
        pwn: Option<WordNet>,
        counts: LemmaCounts,
        t2s: T2s,
    ) -> Self {
        Self {
            fin,
            zh,
            pwn,
            counts,
            t2s,
        }
    }

    /// Load `wn-data-<id>.tab` files from `tab_dir` and the Princeton
    /// database from `pwn`.
    pub fn load(
        tab_dir: &Path,
        pwn: WordNet,
        counts: LemmaCounts,
        t2s: T2s,
    ) -> Result<Self> {
        let start = Instant::now();
        let load_lang = |lang: Lang| -> Result<Vec<TabWordNet>> {
            let mut out = Vec::new();
            for id in lang.wordnet_ids() {
                let path = tab_dir.join(format!("wn-data-{id}.tab"));
                if !path.exists() {
                    if REQUIRED.contains(id) {
                        return Err(StiffError::ResourceMissing {
                            what: "wordnet tab file",
                            path,
                        });
                    }
                    warn!(wordnet = id, path = %path.display(), "optional wordnet missing");
                    continue;
                }
                let wn = TabWordNet::load(*id, &path).map_err(|source| StiffError::Resource {
                    what: "wordnet tab file",
                    source,
                })?;
                info!(wordnet = id, synsets = wn.synset_count(), "loaded wordnet");
                out.push(wn);
            }
            Ok(out)
        };
        let fin = load_lang(Lang::Fi)?;
        let zh = load_lang(Lang::Zh)?;
        info!("wordnets loaded in {} ms", start.elapsed().as_millis());
        Ok(Self::from_parts(fin, zh, Some(pwn), counts, t2s))
    }

    pub fn resources(&self, lang: Lang) -> &[TabWordNet] {
        match lang {
            Lang::Fi => &self.fin,
            Lang::Zh => &self.zh,
        }
    }

    pub fn resource(&self, id: &str) -> Result<&TabWordNet> {
        self.fin
            .iter()
            .chain(&self.zh)
            .find(|wn| wn.id() == id)
            .ok_or_else(|| StiffError::UnknownWordnet(id.to_string()))
    }

    pub fn pwn(&self) -> Option<&WordNet> {
        self.pwn.as_ref()
    }

    pub fn counts(&self) -> &LemmaCounts {
        &self.counts
    }

    pub fn t2s(&self) -> &T2s {
        &self.t2s
    }

    /// Lemma objects for `lemma` across every wordnet of `lang`.
    pub fn lemma_objs(&self, lang: Lang, lemma: &str) -> Vec<LemmaObj> {
        let key = fold(lemma);
        let mut out = Vec::new();
        for wn in self.resources(lang) {
            for synset in wn.synsets(lemma) {
                let name = wn
                    .lemmas(*synset)
                    .iter()
                    .find(|l| fold(l) == key)
                    .cloned()
                    .unwrap_or_else(|| lemma.replace(' ', "_"));
                out.push(LemmaObj {
                    wordnet: wn.id().to_string(),
                    synset: *synset,
                    name,
                });
            }
        }
        out
    }

    /// Stable id shared by equivalent senses across resources.
    ///
    /// Every loaded resource is keyed by Princeton offsets, so the canonical
    /// id is the synset id itself once the resource is known.
    pub fn canonical(&self, obj: &LemmaObj) -> Result<SynsetId> {
        self.resource(&obj.wordnet)?;
        Ok(obj.synset)
    }

    /// Group lemma objects by canonical id, keeping first-seen order inside
    /// each group.
    pub fn group_canonical(&self, objs: Vec<LemmaObj>) -> Result<BTreeMap<SynsetId, Vec<LemmaObj>>> {
        let mut groups: BTreeMap<SynsetId, Vec<LemmaObj>> = BTreeMap::new();
        for obj in objs {
            let id = self.canonical(&obj)?;
            let group = groups.entry(id).or_default();
            if !group.contains(&obj) {
                group.push(obj);
            }
        }
        Ok(groups)
    }

    /// `(lemma name, lemma object)` for every entry of `lang`'s wordnets.
    /// Chinese names are converted to simplified characters with internal
    /// separators removed.
    pub fn entries(&self, lang: Lang) -> impl Iterator<Item = (String, LemmaObj)> + '_ {
        self.resources(lang).iter().flat_map(move |wn| {
            wn.entries().map(move |(synset, name)| {
                let key = match lang {
                    Lang::Fi => name.to_string(),
                    Lang::Zh => self
                        .t2s
                        .convert(name)
                        .chars()
                        .filter(|c| !matches!(c, '_' | '+') && !c.is_whitespace())
                        .collect(),
                };
                (
                    key,
                    LemmaObj {
                        wordnet: wn.id().to_string(),
                        synset,
                        name: name.to_string(),
                    },
                )
            })
        })
    }

    /// Lemma names of `synset` across `lang`'s wordnets, deduplicated.
    pub fn synset_lemmas(&self, lang: Lang, synset: SynsetId) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for wn in self.resources(lang) {
            for lemma in wn.lemmas(synset) {
                if !out.contains(&lemma.as_str()) {
                    out.push(lemma);
                }
            }
        }
        out
    }

    /// Derivationally related synsets of every id in `ids`, mapped back to
    /// the ids they were reached from.
    pub fn expand_deriv(&self, ids: &BTreeSet<SynsetId>) -> BTreeMap<SynsetId, BTreeSet<SynsetId>> {
        let mut out: BTreeMap<SynsetId, BTreeSet<SynsetId>> = BTreeMap::new();
        let Some(pwn) = &self.pwn else {
            return out;
        };
        for id in ids {
            for related in pwn.derivationally_related(*id) {
                out.entry(related).or_default().insert(*id);
            }
        }
        out
    }

    pub fn hypernym_paths(&self, id: SynsetId) -> Vec<Vec<SynsetId>> {
        match &self.pwn {
            Some(pwn) => pwn.hypernym_paths(id),
            None => vec![vec![id]],
        }
    }

    /// `lemma.pos.NN` name, when the Princeton database knows the synset.
    pub fn synset_name(&self, id: SynsetId) -> Option<String> {
        self.pwn.as_ref()?.synset_name(id)
    }

    /// Parse either an `offset-pos` id or a `lemma.pos.NN` name.
    pub fn resolve(&self, raw: &str) -> Option<SynsetId> {
        raw.parse()
            .ok()
            .or_else(|| self.pwn.as_ref()?.resolve_name(raw))
    }

    /// Frequency of a lemma object, sense-specific where the table allows.
    pub fn count(&self, obj: &LemmaObj) -> u32 {
        self.counts.sense_count(obj.synset, &obj.name)
    }
}

/// Case-insensitive, separator-insensitive lemma key.
pub fn fold(lemma: &str) -> String {
    lemma
        .trim()
        .to_lowercase()
        .replace([' ', '+'], "_")
}
