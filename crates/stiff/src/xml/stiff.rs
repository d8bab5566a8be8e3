//! The STIFF corpus format: writing tagged sentences and reading
//! annotations back for filtering.

use std::collections::BTreeMap;
use std::io::Write;

use fin_morph::{LemmaPath, Tagged};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use url::form_urlencoded;

use crate::anchor::{Anchor, FI_TOK, ZH_TOK, ZH_UNTOK, decode_all, encode_all};
use crate::error::{Result, StiffError};
use crate::extract::{SentencePair, TaggedSentence};
use crate::tagging::{DERIV, TagSupport, Tagging, TransferType};
use crate::xml::dom::Element;

pub const CORPUS_SOURCE: &str = "OpenSubtitles2018";

/// A support as stored in the `support` attribute, enriched with what the
/// source tag looked like so filters need not consult the sibling.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Support {
    pub transfer_type: Option<TransferType>,
    pub transfer_from: Option<String>,
    pub transform_chain: Vec<String>,
    pub source_wordnets: Vec<String>,
    pub source_anchor: Option<String>,
    pub source_positions: Vec<Anchor>,
}

impl Support {
    pub fn encode(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        if let Some(tt) = self.transfer_type {
            ser.append_pair("transfer-type", tt.as_str());
        }
        if let Some(from) = &self.transfer_from {
            ser.append_pair("transfer-from", from);
        }
        ser.append_pair("transform-chain", &self.transform_chain.join(","));
        if !self.source_wordnets.is_empty() {
            ser.append_pair("transfer-from-wordnets", &self.source_wordnets.join(" "));
        }
        if let Some(anchor) = &self.source_anchor {
            ser.append_pair("transfer-from-anchor", anchor);
        }
        if !self.source_positions.is_empty() {
            ser.append_pair(
                "transfer-from-anchor-positions",
                &encode_all(&self.source_positions),
            );
        }
        ser.finish()
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let mut support = Support::default();
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "transfer-type" => {
                    support.transfer_type = Some(TransferType::parse(&value).ok_or_else(|| {
                        StiffError::malformed(format!("unknown transfer-type {value:?}"))
                    })?)
                }
                "transfer-from" => support.transfer_from = Some(value.into_owned()),
                "transform-chain" => {
                    support.transform_chain = value
                        .split(',')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                "transfer-from-wordnets" => {
                    support.source_wordnets =
                        value.split_whitespace().map(str::to_string).collect()
                }
                "transfer-from-anchor" => support.source_anchor = Some(value.into_owned()),
                "transfer-from-anchor-positions" => support.source_positions = decode_all(&value)?,
                _ => {}
            }
        }
        Ok(support)
    }

    pub fn is_deriv(&self) -> bool {
        self.transform_chain.iter().any(|t| t == DERIV)
    }

    /// Character length of the source anchor, whitespace excluded.
    pub fn source_char_len(&self) -> usize {
        self.source_anchor
            .as_deref()
            .map(|a| a.chars().filter(|c| !c.is_whitespace()).count())
            .unwrap_or(0)
    }
}

/// One `<annotation>` of a sentence, parsed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Annotation {
    /// Position among the `<annotation>` children of `<annotations>`.
    pub idx: usize,
    pub id: String,
    pub lang: String,
    pub anchor: String,
    pub positions: Vec<Anchor>,
    pub supports: Vec<Support>,
    pub rank: Option<u32>,
    pub freq: Option<u32>,
    pub lemma: String,
    pub wnlemmas: Vec<String>,
    pub wordnets: Vec<String>,
    pub lemma_paths: Vec<String>,
    /// Whitespace-separated annotation text.
    pub synsets: Vec<String>,
}

impl Annotation {
    pub fn from_element(idx: usize, el: &Element) -> Result<Self> {
        let list = |key: &str| -> Result<Vec<String>> {
            Ok(el
                .attr(key)?
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default())
        };
        let number = |key: &str| -> Result<Option<u32>> {
            el.attr(key)?
                .map(|v| {
                    v.trim().parse().map_err(|_| {
                        StiffError::malformed(format!("annotation {key}={v:?} is not a number"))
                    })
                })
                .transpose()
        };
        let supports = list("support")?
            .iter()
            .map(|s| Support::decode(s))
            .collect::<Result<Vec<_>>>()?;
        let positions = decode_all(&el.attr("anchor-positions")?.unwrap_or_default())?;
        Ok(Annotation {
            idx,
            id: el.attr("id")?.unwrap_or_default(),
            lang: el.attr("lang")?.unwrap_or_default(),
            anchor: el.attr("anchor")?.unwrap_or_default(),
            positions,
            supports,
            rank: number("rank")?,
            freq: number("freq")?,
            lemma: el.attr("lemma")?.unwrap_or_default(),
            wnlemmas: list("wnlemma")?,
            wordnets: list("wordnets")?,
            lemma_paths: list("lemma-path")?,
            synsets: el.text()?.split_whitespace().map(str::to_string).collect(),
        })
    }

    /// Preferred anchor: tokenised if any, else the first one.
    pub fn primary_position(&self) -> Option<&Anchor> {
        self.positions
            .iter()
            .find(|a| a.is_tokenised())
            .or_else(|| self.positions.first())
    }

    /// Token span `(from_id, first token, token count)` of the first
    /// tokenised anchor.
    pub fn token_span(&self) -> Option<(&str, usize, usize)> {
        self.positions.iter().find_map(|a| {
            Some((a.from_id.as_str(), a.token?, a.token_length?))
        })
    }

    pub fn anchor_char_len(&self) -> usize {
        self.anchor.chars().count()
    }
}

/// A `<sentence>` being filtered.
pub struct SentenceDoc {
    pub element: Element,
}

/// One `<gram>` reading of a Finnish token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Gram {
    pub lemma: String,
    pub pos: String,
}

impl SentenceDoc {
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    pub fn into_element(self) -> Element {
        self.element
    }

    pub fn id(&self) -> Result<String> {
        Ok(self.element.attr("id")?.unwrap_or_default())
    }

    /// `id → (lang, text)` of every `<text>` variant.
    pub fn texts(&self) -> Result<BTreeMap<String, (String, String)>> {
        let mut out = BTreeMap::new();
        for text in self.element.children_named("text") {
            out.insert(
                text.required_attr("id")?,
                (text.attr("lang")?.unwrap_or_default(), text.text()?),
            );
        }
        Ok(out)
    }

    /// Tagger readings of Finnish tokens, keyed by token index.
    pub fn grams(&self) -> Result<BTreeMap<usize, Gram>> {
        let mut out = BTreeMap::new();
        for gram in self.element.children_named("gram") {
            let token = gram.required_attr("token")?;
            let token = token
                .parse()
                .map_err(|_| StiffError::malformed(format!("gram token {token:?}")))?;
            out.insert(
                token,
                Gram {
                    lemma: gram.attr("lemma")?.unwrap_or_default(),
                    pos: gram.attr("pos")?.unwrap_or_default(),
                },
            );
        }
        Ok(out)
    }

    pub fn annotations(&self) -> Result<Vec<Annotation>> {
        let Some(anns) = self.element.child("annotations") else {
            return Ok(Vec::new());
        };
        anns.children_named("annotation")
            .enumerate()
            .map(|(idx, el)| Annotation::from_element(idx, el))
            .collect()
    }

    pub fn annotation_count(&self) -> usize {
        self.element
            .child("annotations")
            .map(|a| a.children_named("annotation").count())
            .unwrap_or(0)
    }

    /// Keep the annotations whose position `keep` accepts.
    pub fn retain_annotations(&mut self, mut keep: impl FnMut(usize) -> bool) {
        if let Some(anns) = self.element.child_mut("annotations") {
            anns.retain_elements(|idx, _| keep(idx));
        }
    }

    pub fn annotation_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> + '_ {
        self.element
            .child_mut("annotations")
            .into_iter()
            .flat_map(|anns| anns.elements_mut())
            .filter(|el| el.name() == "annotation")
    }
}

/// Build the `<sentence>` element for a tagged pair.
pub fn sentence_element(id: usize, pair: &SentencePair, tagged: &TaggedSentence) -> Element {
    let mut sentence = Element::new("sentence").with_attr("id", &id.to_string());
    sentence.push_child(
        Element::new("text")
            .with_attr("id", ZH_TOK)
            .with_attr("lang", "zh")
            .with_text(&pair.zh_tok),
    );
    sentence.push_child(
        Element::new("text")
            .with_attr("id", ZH_UNTOK)
            .with_attr("lang", "zh")
            .with_attr("tokenized", "false")
            .with_text(&pair.zh_untok),
    );
    sentence.push_child(
        Element::new("text")
            .with_attr("id", FI_TOK)
            .with_attr("lang", "fi")
            .with_text(&pair.fi),
    );
    for (token, gram) in tagged.grams.iter().enumerate() {
        let Some(gram) = gram else { continue };
        sentence.push_child(gram_element(token, gram));
    }
    let mut anns = Element::new("annotations");
    for el in tagging_annotations("fi", &tagged.fi, &tagged.zh)
        .into_iter()
        .chain(tagging_annotations("zh", &tagged.zh, &tagged.fi))
    {
        anns.push_child(el);
    }
    sentence.push_child(anns);
    sentence
}

fn gram_element(token: usize, gram: &Tagged) -> Element {
    Element::new("gram")
        .with_attr("type", "postag")
        .with_attr("for", FI_TOK)
        .with_attr("token", &token.to_string())
        .with_attr("lemma", &gram.lemma)
        .with_attr("pos", &gram.pos)
}

fn tagging_annotations(lang: &str, tagging: &Tagging, sibling: &Tagging) -> Vec<Element> {
    let mut out = Vec::new();
    for token in &tagging.tokens {
        for tag in &token.tags {
            let mut el = Element::new("annotation")
                .with_attr("id", &tag.id.to_string())
                .with_attr("type", "stiff");
            if !tag.supports.is_empty() {
                let supports: Vec<String> = tag
                    .supports
                    .iter()
                    .map(|s| enrich(s, sibling).encode())
                    .collect();
                el = el.with_attr("support", &supports.join(" "));
            }
            if let Some((ordinal, count)) = tag.rank {
                el = el
                    .with_attr("rank", &ordinal.to_string())
                    .with_attr("freq", &count.to_string());
            }
            el = el
                .with_attr("lang", lang)
                .with_attr("anchor", &token.token)
                .with_attr("anchor-positions", &encode_all(&token.anchors))
                .with_attr("lemma", &tag.lemma)
                .with_attr("wnlemma", &tag.wn_lemmas().join(" "))
                .with_attr("wordnets", &tag.wordnets().join(" "));
            if !tag.lemma_path.is_empty() {
                let paths: Vec<&str> = tag.lemma_path.iter().map(|p: &LemmaPath| p.as_str()).collect();
                el = el.with_attr("lemma-path", &paths.join(" "));
            }
            out.push(el.with_text(&tag.synset().to_string()));
        }
    }
    out
}

fn enrich(support: &TagSupport, sibling: &Tagging) -> Support {
    let mut out = Support {
        transfer_type: Some(support.transfer_type),
        transfer_from: Some(support.transfer_from.to_string()),
        transform_chain: support.transform_chain.clone(),
        ..Default::default()
    };
    if let Some((idx, tag)) = sibling.tag_by_id(support.transfer_from) {
        let token = &sibling.tokens[idx];
        out.source_wordnets = tag.wordnets().iter().map(|s| s.to_string()).collect();
        out.source_anchor = Some(token.token.clone());
        out.source_positions = token.anchors.clone();
    }
    out
}

/// Writes a STIFF document, grouping sentences into `<subtitle>`s whenever
/// the imdb id changes.
pub struct StiffWriter<W: Write> {
    writer: Writer<W>,
    current: Option<String>,
}

impl<W: Write> StiffWriter<W> {
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = Writer::new_with_indent(inner, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        writer.write_event(Event::Start(
            BytesStart::new("corpus").with_attributes([("source", CORPUS_SOURCE)]),
        ))?;
        Ok(Self {
            writer,
            current: None,
        })
    }

    pub fn write_sentence(&mut self, sources: &str, imdb: &str, sentence: &Element) -> Result<()> {
        if self.current.as_deref() != Some(imdb) {
            self.close_subtitle()?;
            self.writer.write_event(Event::Start(
                BytesStart::new("subtitle").with_attributes([("sources", sources), ("imdb", imdb)]),
            ))?;
            self.current = Some(imdb.to_string());
        }
        sentence.write_to(&mut self.writer)
    }

    fn close_subtitle(&mut self) -> Result<()> {
        if self.current.take().is_some() {
            self.writer.write_event(Event::End(BytesEnd::new("subtitle")))?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.close_subtitle()?;
        self.writer.write_event(Event::End(BytesEnd::new("corpus")))?;
        let mut inner = self.writer.into_inner();
        inner.write_all(b"\n")?;
        Ok(inner)
    }
}
