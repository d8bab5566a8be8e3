//! Eurosense clean-up: BabelNet ids to WordNet, lemma repair, light-word
//! reanchoring and language relabelling.
//!
//! Every stage is a streaming `<sentence>` transform that edits
//! annotations in place and reports what it could not fix.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use fin_morph::{Analyser, Lemmatizer};
use tracing::{debug, info, warn};
use wordnet_types::SynsetId;

use crate::anchor::{Anchor, encode_all};
use crate::convert::Recovered;
use crate::error::{Result, StiffError};
use crate::wordnets::{Lang, Wordnets, fold};
use crate::xml::dom::Element;
use crate::xml::stiff::{Annotation, SentenceDoc};
use crate::xml::stream::{Outcome, transform_stream};

/// Words that may open a Finnish multiword lemma without belonging to it.
pub const LIGHT_WORDS: [&str; 2] = ["ei", "olla"];

/// BabelNet synset ids to WordNet synset ids.
#[derive(Clone, Debug, Default)]
pub struct BabelMap {
    map: HashMap<String, Vec<SynsetId>>,
}

impl BabelMap {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|_| StiffError::ResourceMissing {
            what: "babel to wordnet map",
            path: path.to_path_buf(),
        })?;
        let map = Self::from_reader(BufReader::new(file))?;
        info!(entries = map.len(), path = %path.display(), "loaded babel map");
        Ok(map)
    }

    /// Rows are `bn:…<TAB>offset-pos[<TAB>offset-pos…]`; a BabelNet id may
    /// repeat over several rows.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut map: HashMap<String, Vec<SynsetId>> = HashMap::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let Some(babel) = fields.next() else { continue };
            let targets = map.entry(babel.to_string()).or_default();
            for field in fields {
                let id = field.parse::<SynsetId>().map_err(|err| StiffError::MalformedInput {
                    line: idx + 1,
                    reason: err.to_string(),
                })?;
                if !targets.contains(&id) {
                    targets.push(id);
                }
            }
        }
        Ok(Self { map })
    }

    pub fn get(&self, babel: &str) -> &[SynsetId] {
        self.map.get(babel).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// `lang → text` of a Eurosense sentence, in document order.
fn sentence_texts(doc: &SentenceDoc) -> Result<Vec<(String, String)>> {
    doc.element
        .children_named("text")
        .map(|el| Ok((el.attr("lang")?.unwrap_or_default(), el.text()?)))
        .collect()
}

fn char_find(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .find(needle)
        .map(|byte| haystack[..byte].chars().count())
}

/// Apply `edit` to each annotation; `false` drops it.
fn edit_annotations(
    doc: &mut SentenceDoc,
    mut edit: impl FnMut(&Annotation, &mut Element) -> Result<bool>,
) -> Result<()> {
    let mut keep = Vec::new();
    for (idx, el) in doc.annotation_elements_mut().enumerate() {
        let ann = Annotation::from_element(idx, el)?;
        keep.push(edit(&ann, el)?);
    }
    if keep.iter().any(|k| !k) {
        doc.retain_annotations(|idx| keep.get(idx).copied().unwrap_or(true));
    }
    Ok(())
}

fn run_stage<R: BufRead, W: Write>(
    input: R,
    output: W,
    mut rec: Recovered,
    mut stage: impl FnMut(&mut SentenceDoc, &mut Recovered) -> Result<()>,
) -> Result<Recovered> {
    transform_stream(input, output, "sentence", |el| {
        let mut doc = SentenceDoc::new(el);
        stage(&mut doc, &mut rec)?;
        Ok(Outcome::Keep(doc.into_element()))
    })?;
    rec.report();
    Ok(rec)
}

/// Replace BabelNet ids by WordNet ids and give each annotation an
/// untokenised anchor position into the text of its language.
pub fn babel_to_wordnet<R: BufRead, W: Write>(input: R, output: W, map: &BabelMap) -> Result<Recovered> {
    run_stage(input, output, Recovered::new("babel-to-wordnet"), |doc, rec| {
        let texts = sentence_texts(doc)?;
        edit_annotations(doc, |ann, el| {
            let mut ids: Vec<String> = Vec::new();
            for raw in &ann.synsets {
                if raw.starts_with("bn:") {
                    let mapped = map.get(raw);
                    if mapped.is_empty() {
                        rec.bump("unmapped babel id");
                    }
                    ids.extend(mapped.iter().map(ToString::to_string));
                } else {
                    ids.push(raw.clone());
                }
            }
            let mut seen = BTreeSet::new();
            ids.retain(|id| seen.insert(id.clone()));
            if ids.is_empty() {
                rec.bump("annotation without wordnet id");
                return Ok(false);
            }
            el.set_text(&ids.join(" "));
            if ann.positions.is_empty() {
                let found = texts
                    .iter()
                    .find(|(lang, _)| *lang == ann.lang)
                    .and_then(|(_, text)| char_find(text, &ann.anchor));
                match found {
                    Some(char) => el.set_attr("anchor-positions", &Anchor::untok(&ann.lang, char).encode())?,
                    None => rec.bump("anchor not found"),
                }
            }
            Ok(true)
        })
    })
}

/// How a lemma repair succeeded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FixedBy {
    Lemma,
    Anchor,
    Morphology,
}

impl FixedBy {
    fn as_str(self) -> &'static str {
        match self {
            FixedBy::Lemma => "fixed by lemma",
            FixedBy::Anchor => "fixed by anchor",
            FixedBy::Morphology => "fixed by morphology",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LemmaFix {
    Resolved {
        lemma: String,
        synsets: Vec<SynsetId>,
        wordnets: Vec<String>,
        by: FixedBy,
    },
    Unresolved,
    Ambiguous(Vec<String>),
}

/// A Finnish wordnet lemma of one of the annotation's synsets.
struct Candidate<'a> {
    lemma: &'a str,
    synset: SynsetId,
    wordnet: &'a str,
}

fn candidates<'w>(wordnets: &'w Wordnets, synsets: &[SynsetId]) -> Vec<Candidate<'w>> {
    let mut out = Vec::new();
    for wn in wordnets.resources(Lang::Fi) {
        for &synset in synsets {
            for lemma in wn.lemmas(synset) {
                out.push(Candidate {
                    lemma,
                    synset,
                    wordnet: wn.id(),
                });
            }
        }
    }
    out
}

fn resolved(cands: &[&Candidate<'_>], by: FixedBy) -> LemmaFix {
    let mut synsets: Vec<SynsetId> = cands.iter().map(|c| c.synset).collect();
    synsets.sort();
    synsets.dedup();
    let wordnets: BTreeSet<&str> = cands.iter().map(|c| c.wordnet).collect();
    LemmaFix::Resolved {
        lemma: cands[0].lemma.replace('_', " "),
        synsets,
        wordnets: wordnets.into_iter().map(str::to_string).collect(),
        by,
    }
}

/// Matches a Eurosense annotation against the Finnish wordnets.
pub struct LemmaFixer<'a, A> {
    wordnets: &'a Wordnets,
    lemmatizer: &'a Lemmatizer<A>,
    keep_unknown: bool,
}

impl<'a, A: Analyser> LemmaFixer<'a, A> {
    pub fn new(wordnets: &'a Wordnets, lemmatizer: &'a Lemmatizer<A>, keep_unknown: bool) -> Self {
        Self {
            wordnets,
            lemmatizer,
            keep_unknown,
        }
    }

    /// Try the given lemma, then the lowercased anchor, then a token-wise
    /// morphological match between anchor and candidate lemmas.
    pub fn fix(&self, lemma: &str, anchor: &str, synsets: &[SynsetId]) -> LemmaFix {
        let cands = candidates(self.wordnets, synsets);
        if cands.is_empty() {
            return LemmaFix::Unresolved;
        }

        for (key, by) in [(fold(lemma), FixedBy::Lemma), (fold(anchor), FixedBy::Anchor)] {
            let hits: Vec<&Candidate<'_>> = cands.iter().filter(|c| fold(c.lemma) == key).collect();
            if !hits.is_empty() {
                return resolved(&hits, by);
            }
        }

        let anchor_sets: Vec<Vec<String>> = anchor
            .split_whitespace()
            .map(|tok| self.lemmatizer.lemma_set(tok).iter().map(|l| fold(l)).collect())
            .collect();
        let hits: Vec<&Candidate<'_>> = cands
            .iter()
            .filter(|c| {
                let parts: Vec<&str> = c.lemma.split(['_', ' ']).filter(|p| !p.is_empty()).collect();
                parts.len() == anchor_sets.len()
                    && parts
                        .iter()
                        .zip(&anchor_sets)
                        .all(|(part, set)| set.contains(&fold(part)))
            })
            .collect();
        let distinct: BTreeSet<String> = hits.iter().map(|c| fold(c.lemma)).collect();
        match distinct.len() {
            0 => LemmaFix::Unresolved,
            1 => resolved(&hits, FixedBy::Morphology),
            _ => LemmaFix::Ambiguous(distinct.into_iter().collect()),
        }
    }

    /// Repair one annotation element; `false` means drop it.
    pub fn apply(&self, ann: &Annotation, el: &mut Element, rec: &mut Recovered) -> Result<bool> {
        let synsets: Vec<SynsetId> = ann.synsets.iter().filter_map(|s| s.parse().ok()).collect();
        match self.fix(&ann.lemma, &ann.anchor, &synsets) {
            LemmaFix::Resolved {
                lemma,
                synsets,
                wordnets,
                by,
            } => {
                rec.bump(by.as_str());
                let ids: Vec<String> = synsets.iter().map(ToString::to_string).collect();
                el.set_attr("lemma", &lemma)?;
                el.set_attr("wnlemma", &lemma.replace(' ', "_"))?;
                el.set_attr("wordnets", &wordnets.join(" "))?;
                el.set_text(&ids.join(" "));
                Ok(true)
            }
            LemmaFix::Unresolved => {
                warn!(lemma = %ann.lemma, anchor = %ann.anchor, "lemma not in wordnet");
                rec.bump("unresolved");
                Ok(self.keep_unknown)
            }
            LemmaFix::Ambiguous(found) => {
                warn!(lemma = %ann.lemma, anchor = %ann.anchor, ?found, "lemma matches several wordnet lemmas");
                rec.bump("ambiguous");
                Ok(self.keep_unknown)
            }
        }
    }
}

/// Repair Finnish annotation lemmas against the wordnets.
pub fn lemma_fix<R: BufRead, W: Write, A: Analyser>(
    input: R,
    output: W,
    fixer: &LemmaFixer<'_, A>,
) -> Result<Recovered> {
    run_stage(input, output, Recovered::new("lemma-fix"), |doc, rec| {
        edit_annotations(doc, |ann, el| {
            if ann.lang != Lang::Fi.as_str() {
                return Ok(true);
            }
            fixer.apply(ann, el, rec)
        })
    })
}

fn first_word(s: &str) -> Option<String> {
    s.split(['_', ' ']).find(|w| !w.is_empty()).map(str::to_lowercase)
}

/// Strip a leading light word from lemma and anchor when no wordnet lemma
/// of the annotation starts with it. Returns the new `(lemma, anchor,
/// chars removed from the anchor front)`.
pub fn strip_light_word(
    lemma: &str,
    anchor: &str,
    wordnet_lemmas: &[&str],
) -> Option<(String, String, usize)> {
    let mut lemma_words = lemma.split_whitespace();
    let light = lemma_words.next()?.to_lowercase();
    if !LIGHT_WORDS.contains(&light.as_str()) {
        return None;
    }
    let rest: Vec<&str> = lemma_words.collect();
    if rest.is_empty() {
        return None;
    }
    if wordnet_lemmas
        .iter()
        .any(|l| first_word(l).as_deref() == Some(light.as_str()))
    {
        return None;
    }

    let trimmed = anchor.trim_start();
    let lead = anchor.chars().count() - trimmed.chars().count();
    let (head, tail) = trimmed.split_once(char::is_whitespace)?;
    let tail_trimmed = tail.trim_start();
    let removed = lead + head.chars().count() + 1 + (tail.chars().count() - tail_trimmed.chars().count());
    Some((rest.join(" "), tail_trimmed.to_string(), removed))
}

/// Drop light-word prefixes (`ei`, `olla`) from Finnish annotations.
pub fn reanchor<R: BufRead, W: Write>(input: R, output: W, wordnets: &Wordnets) -> Result<Recovered> {
    run_stage(input, output, Recovered::new("reanchor"), |doc, rec| {
        edit_annotations(doc, |ann, el| {
            if ann.lang != Lang::Fi.as_str() {
                return Ok(true);
            }
            let synsets: Vec<SynsetId> = ann.synsets.iter().filter_map(|s| s.parse().ok()).collect();
            let cands = candidates(wordnets, &synsets);
            let lemmas: Vec<&str> = cands.iter().map(|c| c.lemma).collect();
            let Some((lemma, anchor, removed)) = strip_light_word(&ann.lemma, &ann.anchor, &lemmas) else {
                return Ok(true);
            };
            debug!(from = %ann.lemma, to = %lemma, "reanchored");
            rec.bump("reanchored");
            el.set_attr("lemma", &lemma)?;
            el.set_attr("anchor", &anchor)?;
            if !ann.positions.is_empty() {
                let moved: Vec<Anchor> = ann
                    .positions
                    .iter()
                    .map(|p| {
                        let mut p = p.clone();
                        p.char += removed;
                        if let (Some(tok), Some(len)) = (p.token, p.token_length) {
                            if len > 1 {
                                p.token = Some(tok + 1);
                                p.token_length = Some(len - 1);
                            }
                        }
                        p
                    })
                    .collect();
                el.set_attr("anchor-positions", &encode_all(&moved))?;
            }
            Ok(true)
        })
    })
}

/// Relabel annotations whose anchor is missing from their own language's
/// text to the first language whose text has it; drop the rest.
pub fn retag_language<R: BufRead, W: Write>(input: R, output: W) -> Result<Recovered> {
    run_stage(input, output, Recovered::new("retag-language"), |doc, rec| {
        let texts = sentence_texts(doc)?;
        edit_annotations(doc, |ann, el| {
            let own = texts.iter().find(|(lang, _)| *lang == ann.lang);
            if own.is_some_and(|(_, text)| text.contains(&ann.anchor)) {
                return Ok(true);
            }
            let Some((lang, text)) = texts.iter().find(|(_, text)| text.contains(&ann.anchor)) else {
                rec.bump("dropped");
                return Ok(false);
            };
            rec.bump("relabelled");
            el.set_attr("lang", lang)?;
            if let Some(char) = char_find(text, &ann.anchor) {
                el.set_attr("anchor-positions", &Anchor::untok(lang, char).encode())?;
            }
            Ok(true)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fin_morph::TableAnalyser;
    use wordnet_db::{LemmaCounts, TabWordNet};
    use wordnet_types::Pos;

    use crate::t2s::T2s;

    fn sid(offset: u32) -> SynsetId {
        SynsetId {
            pos: Pos::Noun,
            offset,
        }
    }

    fn wordnets() -> Wordnets {
        let fin = vec![TabWordNet::from_entries(
            "fin",
            [(sid(1), "ystävä"), (sid(2), "hyvä ystävä"), (sid(3), "kotitalous")],
        )];
        Wordnets::from_parts(fin, Vec::new(), None, LemmaCounts::default(), T2s::identity())
    }

    #[test]
    fn lemma_fix_prefers_lemma_then_anchor_then_morphology() {
        let wns = wordnets();
        let lemmatizer = Lemmatizer::new(
            TableAnalyser::from_rows("ystäviä\tystävä\tNOUN\nhyviä\thyvä\tADJ\n").unwrap(),
        );
        let fixer = LemmaFixer::new(&wns, &lemmatizer, false);

        match fixer.fix("Ystävä", "ystäviä", &[sid(1)]) {
            LemmaFix::Resolved { by, synsets, .. } => {
                assert_eq!(by, FixedBy::Lemma);
                assert_eq!(synsets, vec![sid(1)]);
            }
            other => panic!("{other:?}"),
        }
        assert!(matches!(
            fixer.fix("x", "Kotitalous", &[sid(3)]),
            LemmaFix::Resolved { by: FixedBy::Anchor, .. }
        ));
        match fixer.fix("hyvä ystävät", "hyviä ystäviä", &[sid(1), sid(2)]) {
            LemmaFix::Resolved { by, lemma, synsets, .. } => {
                assert_eq!(by, FixedBy::Morphology);
                assert_eq!(lemma, "hyvä ystävä");
                assert_eq!(synsets, vec![sid(2)]);
            }
            other => panic!("{other:?}"),
        }
        assert_eq!(fixer.fix("kissa", "kissa", &[sid(9)]), LemmaFix::Unresolved);
    }

    #[test]
    fn light_word_is_stripped_unless_a_lemma_starts_with_it() {
        let got = strip_light_word("ei ole", "ei ole", &[]).unwrap();
        assert_eq!(got, ("ole".to_string(), "ole".to_string(), 3));
        assert!(strip_light_word("ei ole", "ei ole", &["ei_ole"]).is_none());
        assert!(strip_light_word("olla", "on", &[]).is_none());
        assert!(strip_light_word("hyvä ystävä", "hyvä ystävä", &[]).is_none());
    }

    #[test]
    fn retag_moves_annotation_to_language_with_anchor() {
        let xml = r#"<corpus><sentence id="0"><text lang="en">a friend</text><text lang="fi">ystävä</text><annotations><annotation lang="en" anchor="ystävä" lemma="ystävä">00000001-n</annotation><annotation lang="fi" anchor="nowhere" lemma="x">00000002-n</annotation></annotations></sentence></corpus>"#;
        let mut out = Vec::new();
        let rec = retag_language(xml.as_bytes(), &mut out).unwrap();
        assert_eq!(rec.get("relabelled"), 1);
        assert_eq!(rec.get("dropped"), 1);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(r#"lang="fi" anchor="ystävä""#));
        assert!(!out.contains("nowhere"));
    }

    #[test]
    fn babel_ids_are_mapped() {
        let map = BabelMap::from_reader("bn:00000001n\t00000001-n\t00000002-n\n".as_bytes()).unwrap();
        let xml = r#"<sentence id="0"><text lang="fi">hyvä ystävä</text><annotations><annotation lang="fi" anchor="ystävä" lemma="ystävä">bn:00000001n</annotation><annotation lang="fi" anchor="hyvä" lemma="hyvä">bn:99999999n</annotation></annotations></sentence>"#;
        let mut out = Vec::new();
        let rec = babel_to_wordnet(xml.as_bytes(), &mut out, &map).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(">00000001-n 00000002-n</annotation>"));
        assert!(out.contains("from-id=fi&amp;char=5"));
        assert_eq!(rec.get("unmapped babel id"), 1);
        assert_eq!(rec.get("annotation without wordnet id"), 1);
    }
}
