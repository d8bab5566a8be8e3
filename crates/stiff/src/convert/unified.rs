//! Unified WSD evaluation format: `<instance>`/`<wf>` tokens in XML plus a
//! keyfile of `instance-id synset…` lines.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::ops::ControlFlow;

use fin_morph::word_bounds;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::anchor::FI_TOK;
use crate::convert::{Recovered, upos_of};
use crate::error::{Result, StiffError};
use crate::wordnets::Lang;
use crate::xml::dom::Element;
use crate::xml::stiff::{Annotation, SentenceDoc};
use crate::xml::stream::for_each_element;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UnifiedToken {
    Word(String),
    Instance {
        anchor: String,
        lemma: String,
        pos: String,
        keys: Vec<String>,
    },
}

/// Streams `<text>`s of `<sentence>`s, numbering instances as it goes.
pub struct UnifiedWriter<W: Write, K: Write> {
    writer: Writer<W>,
    keys: K,
    text_idx: usize,
    sent_idx: usize,
    in_text: bool,
}

impl<W: Write, K: Write> UnifiedWriter<W, K> {
    pub fn new(output: W, keys: K, lang: Lang, source: &str) -> Result<Self> {
        let mut writer = Writer::new_with_indent(output, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(
            BytesStart::new("corpus").with_attributes([("lang", lang.as_str()), ("source", source)]),
        ))?;
        Ok(Self {
            writer,
            keys,
            text_idx: 0,
            sent_idx: 0,
            in_text: false,
        })
    }

    fn text_id(&self) -> String {
        format!("d{:03}", self.text_idx)
    }

    pub fn begin_text(&mut self, source: Option<&str>) -> Result<()> {
        self.end_text()?;
        let id = self.text_id();
        let mut start = BytesStart::new("text").with_attributes([("id", id.as_str())]);
        if let Some(source) = source {
            start.push_attribute(("source", source));
        }
        self.writer.write_event(Event::Start(start))?;
        self.in_text = true;
        self.sent_idx = 0;
        Ok(())
    }

    pub fn end_text(&mut self) -> Result<()> {
        if self.in_text {
            self.writer.write_event(Event::End(BytesEnd::new("text")))?;
            self.in_text = false;
            self.text_idx += 1;
        }
        Ok(())
    }

    pub fn write_sentence(&mut self, tokens: &[UnifiedToken]) -> Result<()> {
        if !self.in_text {
            self.begin_text(None)?;
        }
        let sent_id = format!("{}.s{:03}", self.text_id(), self.sent_idx);
        self.sent_idx += 1;
        self.writer.write_event(Event::Start(
            BytesStart::new("sentence").with_attributes([("id", sent_id.as_str())]),
        ))?;
        let mut inst_idx = 0;
        for token in tokens {
            match token {
                UnifiedToken::Word(word) => {
                    self.writer.write_event(Event::Start(BytesStart::new("wf")))?;
                    self.writer.write_event(Event::Text(BytesText::new(word)))?;
                    self.writer.write_event(Event::End(BytesEnd::new("wf")))?;
                }
                UnifiedToken::Instance {
                    anchor,
                    lemma,
                    pos,
                    keys,
                } => {
                    let id = format!("{sent_id}.t{inst_idx:03}");
                    inst_idx += 1;
                    self.writer.write_event(Event::Start(BytesStart::new("instance").with_attributes([
                        ("id", id.as_str()),
                        ("lemma", lemma.as_str()),
                        ("pos", pos.as_str()),
                    ])))?;
                    self.writer.write_event(Event::Text(BytesText::new(anchor)))?;
                    self.writer.write_event(Event::End(BytesEnd::new("instance")))?;
                    writeln!(self.keys, "{id} {}", keys.join(" "))?;
                }
            }
        }
        self.writer.write_event(Event::End(BytesEnd::new("sentence")))?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<(W, K)> {
        self.end_text()?;
        self.writer.write_event(Event::End(BytesEnd::new("corpus")))?;
        let mut inner = self.writer.into_inner();
        inner.write_all(b"\n")?;
        inner.flush()?;
        self.keys.flush()?;
        Ok((inner, self.keys))
    }
}

fn instance(group: &[Annotation]) -> UnifiedToken {
    let mut keys: Vec<String> = Vec::new();
    for ann in group {
        for key in &ann.synsets {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    UnifiedToken::Instance {
        anchor: group[0].anchor.clone(),
        lemma: group[0].lemma.clone(),
        pos: keys.first().map_or("X", |k| upos_of(k)).to_string(),
        keys,
    }
}

/// Walk `text` with a cursor, emitting an instance wherever an annotation
/// starts and a `<wf>` for every other word.
///
/// `anns` must be sorted by start character. Annotations sharing a start
/// become one instance keyed by all their synsets; they must agree on the
/// lemma. An annotation starting inside an earlier instance, or past the end
/// of the text, is malformed.
pub fn tokens_for(text: &str, anns: &[(usize, Annotation)]) -> Result<Vec<UnifiedToken>> {
    let chars: Vec<char> = text.chars().collect();
    if let Some((start, ann)) = anns.iter().find(|(start, _)| *start >= chars.len()) {
        return Err(StiffError::malformed(format!(
            "anchor {:?} at char {start} is beyond the {}-char text {text:?}",
            ann.anchor,
            chars.len()
        )));
    }
    let mut out = Vec::new();
    let mut cursor = 0;
    let mut next = 0;
    while cursor < chars.len() {
        if chars[cursor].is_whitespace() {
            cursor += 1;
            continue;
        }
        if let Some((start, ann)) = anns.get(next).filter(|(start, _)| *start < cursor) {
            return Err(StiffError::malformed(format!(
                "anchor {:?} at char {start} overlaps the previous instance in {text:?}",
                ann.anchor
            )));
        }
        if next < anns.len() && anns[next].0 == cursor {
            let end = anns[next..]
                .iter()
                .position(|(c, _)| *c != cursor)
                .map_or(anns.len(), |n| next + n);
            let group: Vec<Annotation> = anns[next..end].iter().map(|(_, a)| a.clone()).collect();
            if let Some(other) = group.iter().find(|a| a.lemma != group[0].lemma) {
                return Err(StiffError::malformed(format!(
                    "lemmas {:?} and {:?} share char {cursor} in {text:?}",
                    group[0].lemma, other.lemma
                )));
            }
            out.push(instance(&group));
            next = end;
            cursor += group[0].anchor_char_len().max(1);
            while cursor < chars.len() && !chars[cursor].is_whitespace() {
                cursor += 1;
            }
            continue;
        }
        let word_end = chars[cursor..]
            .iter()
            .position(|c| c.is_whitespace())
            .map_or(chars.len(), |n| cursor + n);
        let stop = match anns.get(next) {
            Some((start, _)) if *start < word_end => *start,
            _ => word_end,
        };
        let piece: String = chars[cursor..stop].iter().collect();
        if stop == word_end || piece.chars().any(char::is_alphanumeric) {
            out.push(UnifiedToken::Word(piece));
        }
        cursor = stop;
    }
    if let Some((start, ann)) = anns.get(next) {
        return Err(StiffError::malformed(format!(
            "anchor {:?} at char {start} overlaps the last instance in {text:?}",
            ann.anchor
        )));
    }
    Ok(out)
}

/// Finnish tokens of a STIFF sentence in Unified form.
pub fn stiff_sentence_tokens(doc: &SentenceDoc, rec: &mut Recovered) -> Result<Vec<UnifiedToken>> {
    let texts = doc.texts()?;
    let Some((_, text)) = texts.get(FI_TOK) else {
        rec.bump("sentence without fi-tok");
        return Ok(Vec::new());
    };
    let mut anns = Vec::new();
    for ann in doc.annotations()? {
        if ann.lang != Lang::Fi.as_str() {
            continue;
        }
        let Some(char) = ann.positions.iter().find(|p| p.from_id == FI_TOK).map(|p| p.char) else {
            return Err(StiffError::malformed(format!(
                "annotation {:?} ({}) has no {FI_TOK} anchor position",
                ann.anchor,
                ann.synsets.join(" ")
            )));
        };
        anns.push((char, ann));
    }
    anns.sort_by_key(|(char, _)| *char);
    tokens_for(text, &anns)
}

/// STIFF to Unified. Each `<subtitle>` becomes a `<text>`.
pub fn stiff_to_unified<R: BufRead, W: Write, K: Write>(input: R, output: W, keys: K) -> Result<Recovered> {
    let mut rec = Recovered::new("stiff-to-unified");
    let mut out = UnifiedWriter::new(output, keys, Lang::Fi, crate::xml::stiff::CORPUS_SOURCE)?;
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        buf.clear();
        match event {
            Event::Start(start) if start.name().as_ref() == b"subtitle" => {
                let el = Element::from_empty(start);
                out.begin_text(el.attr("imdb")?.as_deref())?;
            }
            Event::End(end) if end.name().as_ref() == b"subtitle" => out.end_text()?,
            Event::Start(start) if start.name().as_ref() == b"sentence" => {
                let doc = SentenceDoc::new(Element::read_from(&mut reader, start)?);
                let tokens = stiff_sentence_tokens(&doc, &mut rec)?;
                out.write_sentence(&tokens)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    out.finish()?;
    rec.report();
    Ok(rec)
}

#[derive(Default)]
struct TrieNode {
    next: BTreeMap<char, usize>,
    entry: Option<usize>,
}

/// Character trie over annotation anchors.
#[derive(Default)]
pub struct AnchorTrie {
    nodes: Vec<TrieNode>,
}

impl AnchorTrie {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
        }
    }

    /// Returns the entry already stored under `key`, if any.
    pub fn insert(&mut self, key: &str, entry: usize) -> Option<usize> {
        let mut node = 0;
        for ch in key.chars() {
            node = match self.nodes[node].next.get(&ch) {
                Some(&child) => child,
                None => {
                    self.nodes.push(TrieNode::default());
                    let child = self.nodes.len() - 1;
                    self.nodes[node].next.insert(ch, child);
                    child
                }
            };
        }
        let prev = self.nodes[node].entry;
        if prev.is_none() {
            self.nodes[node].entry = Some(entry);
        }
        prev
    }

    /// Longest key starting at `start` whose end `accept`s; `(end, entry)`.
    pub fn longest(&self, chars: &[char], start: usize, accept: impl Fn(usize) -> bool) -> Option<(usize, usize)> {
        let mut node = 0;
        let mut best = None;
        for (offset, ch) in chars[start..].iter().enumerate() {
            let Some(&child) = self.nodes[node].next.get(ch) else {
                break;
            };
            node = child;
            let end = start + offset + 1;
            if let Some(entry) = self.nodes[node].entry.filter(|_| accept(end)) {
                best = Some((end, entry));
            }
        }
        best
    }
}

/// Tokens of a Eurosense sentence in `lang`, walking word segments greedily
/// and taking the longest annotated anchor at each one.
pub fn eurosense_sentence_tokens(doc: &SentenceDoc, lang: Lang, rec: &mut Recovered) -> Result<Vec<UnifiedToken>> {
    let mut text = None;
    for el in doc.element.children_named("text") {
        if el.attr("lang")?.as_deref() == Some(lang.as_str()) {
            text = Some(el.text()?);
        }
    }
    let Some(text) = text else {
        rec.bump("sentence without text");
        return Ok(Vec::new());
    };

    let mut trie = AnchorTrie::new();
    let mut groups: Vec<Vec<Annotation>> = Vec::new();
    for ann in doc.annotations()? {
        if ann.lang != lang.as_str() || ann.anchor.is_empty() {
            continue;
        }
        match trie.insert(&ann.anchor, groups.len()) {
            Some(existing) => groups[existing].push(ann),
            None => groups.push(vec![ann]),
        }
    }

    // Word segments as char ranges, whitespace dropped.
    let mut segments = Vec::new();
    let mut char_pos = 0;
    for (_, seg) in word_bounds(&text) {
        let len = seg.chars().count();
        if !seg.trim().is_empty() {
            segments.push((char_pos, char_pos + len));
        }
        char_pos += len;
    }
    let chars: Vec<char> = text.chars().collect();
    let ends: Vec<usize> = segments.iter().map(|s| s.1).collect();

    let mut out = Vec::new();
    let mut used = vec![false; groups.len()];
    let mut idx = 0;
    while idx < segments.len() {
        let (start, end) = segments[idx];
        if let Some((match_end, entry)) = trie.longest(&chars, start, |e| ends.binary_search(&e).is_ok()) {
            out.push(instance(&groups[entry]));
            used[entry] = true;
            while idx < segments.len() && segments[idx].0 < match_end {
                idx += 1;
            }
        } else {
            out.push(UnifiedToken::Word(chars[start..end].iter().collect()));
            idx += 1;
        }
    }
    for (entry, _) in used.iter().enumerate().filter(|(_, u)| !**u) {
        let anchor: Vec<char> = groups[entry][0].anchor.chars().collect();
        let present = segments.iter().any(|&(start, _)| {
            chars[start..].starts_with(&anchor) && ends.binary_search(&(start + anchor.len())).is_ok()
        });
        if present {
            rec.bump("anchor shadowed");
        } else {
            rec.bump("anchor not found");
        }
    }
    Ok(out)
}

/// Eurosense to Unified for one language; the whole corpus is one `<text>`.
pub fn eurosense_to_unified<R: BufRead, W: Write, K: Write>(
    input: R,
    output: W,
    keys: K,
    lang: Lang,
) -> Result<Recovered> {
    let mut rec = Recovered::new("eurosense-to-unified");
    let mut out = UnifiedWriter::new(output, keys, lang, "eurosense")?;
    for_each_element(input, "sentence", |el| {
        let doc = SentenceDoc::new(el);
        let tokens = eurosense_sentence_tokens(&doc, lang, &mut rec)?;
        out.write_sentence(&tokens)?;
        Ok(ControlFlow::Continue(()))
    })?;
    out.finish()?;
    rec.report();
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::Anchor;

    fn ann(char: usize, anchor: &str, key: &str) -> (usize, Annotation) {
        (
            char,
            Annotation {
                lang: "fi".into(),
                anchor: anchor.into(),
                lemma: anchor.to_lowercase(),
                positions: vec![Anchor::tok(FI_TOK, char, 0, 1)],
                synsets: vec![key.into()],
                ..Default::default()
            },
        )
    }

    #[test]
    fn instances_and_words_follow_the_cursor() {
        let anns = vec![ann(5, "ystäväni", "00000001-n"), ann(5, "ystäväni", "00000002-n")];
        let tokens = tokens_for("Hyvä ystäväni Alan .", &anns).unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0], UnifiedToken::Word("Hyvä".into()));
        match &tokens[1] {
            UnifiedToken::Instance { keys, pos, .. } => {
                assert_eq!(keys, &vec!["00000001-n".to_string(), "00000002-n".to_string()]);
                assert_eq!(pos, "NOUN");
            }
            other => panic!("expected instance, got {other:?}"),
        }
        assert_eq!(tokens[3], UnifiedToken::Word(".".into()));
    }

    #[test]
    fn leading_filler_is_skipped() {
        let anns = vec![ann(1, "Alan", "00000003-n")];
        let tokens = tokens_for("-Alan", &anns).unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(matches!(tokens[0], UnifiedToken::Instance { .. }));
    }

    fn assert_malformed(res: Result<Vec<UnifiedToken>>, needle: &str) {
        match res {
            Err(StiffError::MalformedAnnotation(msg)) => assert!(msg.contains(needle), "{msg}"),
            other => panic!("expected a malformed annotation, got {other:?}"),
        }
    }

    #[test]
    fn overlapping_anchors_are_rejected() {
        let anns = vec![ann(0, "Hyvä ystäväni", "00000001-n"), ann(5, "ystäväni", "00000002-n")];
        assert_malformed(tokens_for("Hyvä ystäväni Alan .", &anns), "overlaps");
    }

    #[test]
    fn lemmas_disagreeing_at_one_position_are_rejected() {
        let (char, mut other) = ann(5, "ystäväni", "00000002-n");
        other.lemma = "ystävätär".into();
        let anns = vec![ann(5, "ystäväni", "00000001-n"), (char, other)];
        assert_malformed(tokens_for("Hyvä ystäväni Alan .", &anns), "ystävätär");
    }

    #[test]
    fn anchor_past_the_text_is_rejected() {
        let anns = vec![ann(30, "Alan", "00000003-n")];
        assert_malformed(tokens_for("Hyvä ystäväni Alan .", &anns), "beyond");
    }

    #[test]
    fn annotation_without_finnish_token_anchor_is_rejected() {
        let xml = r#"<sentence id="1"><text id="fi-tok" lang="fi">Hyvä ystäväni .</text><annotations><annotation lang="fi" anchor="ystäväni" anchor-positions="from-id=zh-untok&amp;char=5" lemma="ystävä">00000001-n</annotation></annotations></sentence>"#;
        let doc = SentenceDoc::new(Element::parse(xml).unwrap());
        let mut rec = Recovered::new("t");
        assert_malformed(stiff_sentence_tokens(&doc, &mut rec), "no fi-tok anchor");
    }

    #[test]
    fn writer_numbers_instances_and_writes_keys() {
        let mut xml = Vec::new();
        let mut keys = Vec::new();
        let mut w = UnifiedWriter::new(&mut xml, &mut keys, Lang::Fi, "test").unwrap();
        w.write_sentence(&[
            UnifiedToken::Word("Hyvä".into()),
            UnifiedToken::Instance {
                anchor: "ystäväni".into(),
                lemma: "ystävä".into(),
                pos: "NOUN".into(),
                keys: vec!["00000001-n".into()],
            },
        ])
        .unwrap();
        w.finish().unwrap();
        let xml = String::from_utf8(xml).unwrap();
        assert!(xml.contains(r#"<instance id="d000.s000.t000" lemma="ystävä" pos="NOUN">ystäväni</instance>"#));
        assert!(xml.contains("<wf>Hyvä</wf>"));
        assert_eq!(String::from_utf8(keys).unwrap(), "d000.s000.t000 00000001-n\n");
    }

    #[test]
    fn eurosense_takes_longest_anchor() {
        let xml = r#"<sentence id="0"><text lang="fi">Hyvä ystävä tuli.</text><annotations><annotation lang="fi" anchor="ystävä" lemma="ystävä">00000001-n</annotation><annotation lang="fi" anchor="Hyvä ystävä" lemma="hyvä ystävä">00000002-n</annotation><annotation lang="fi" anchor="puuttuu" lemma="puuttua">00000003-v</annotation></annotations></sentence>"#;
        let doc = SentenceDoc::new(Element::parse(xml).unwrap());
        let mut rec = Recovered::new("t");
        let tokens = eurosense_sentence_tokens(&doc, Lang::Fi, &mut rec).unwrap();
        assert_eq!(tokens.len(), 3);
        match &tokens[0] {
            UnifiedToken::Instance { anchor, keys, .. } => {
                assert_eq!(anchor, "Hyvä ystävä");
                assert_eq!(keys, &vec!["00000002-n".to_string()]);
            }
            other => panic!("expected instance, got {other:?}"),
        }
        assert_eq!(tokens[1], UnifiedToken::Word("tuli".into()));
        assert_eq!(tokens[2], UnifiedToken::Word(".".into()));
        assert_eq!(rec.get("anchor shadowed"), 1);
        assert_eq!(rec.get("anchor not found"), 1);
    }
}
