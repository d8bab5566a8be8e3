//! Senseval-2 style lexical sample files.
//!
//! A Unified corpus is scattered into one file per `(lemma, pos)` lexelt,
//! each instance carrying its whole sentence as context with the target
//! wrapped in `<head>`. Gathering puts the per-word files back under a
//! single `<corpus>`.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use fin_morph::PosTagger;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::info;
use wordnet_types::Pos;

use crate::convert::Recovered;
use crate::error::{Result, StiffError};
use crate::xml::dom::{Element, Node};
use crate::xml::stream::{Outcome, for_each_element, transform_stream};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instance {
    pub id: String,
    pub prefix: String,
    pub head: String,
    pub suffix: String,
    pub keys: Vec<String>,
}

/// `lemma.p` with the WordNet POS letter where the tag maps to one.
pub fn lexelt_item(lemma: &str, pos: &str) -> String {
    let pos = Pos::from_upos(pos).map_or_else(|| pos.to_lowercase(), |p| p.to_char().to_string());
    format!("{}.{pos}", lemma.replace(' ', "_"))
}

/// Filesystem-safe stem for a lexelt item.
pub fn file_stem(item: &str) -> String {
    item.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `instance-id key…` lines.
pub fn read_keys(reader: impl BufRead) -> Result<HashMap<String, Vec<String>>> {
    let mut keys = HashMap::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let mut fields = line.split_whitespace();
        let Some(id) = fields.next() else { continue };
        let found: Vec<String> = fields.map(str::to_string).collect();
        if found.is_empty() {
            return Err(StiffError::MalformedInput {
                line: idx + 1,
                reason: format!("instance {id} has no key"),
            });
        }
        keys.insert(id.to_string(), found);
    }
    Ok(keys)
}

/// Group the instances of a Unified document by lexelt item.
pub fn collect_instances(
    input: impl BufRead,
    keys: &HashMap<String, Vec<String>>,
    rec: &mut Recovered,
) -> Result<BTreeMap<String, Vec<Instance>>> {
    let mut lexelts: BTreeMap<String, Vec<Instance>> = BTreeMap::new();
    for_each_element(input, "sentence", |sentence| {
        let mut words = Vec::new();
        let mut targets = Vec::new();
        for el in sentence.elements() {
            match el.name().as_str() {
                "wf" => words.push(el.text()?),
                "instance" => {
                    targets.push((words.len(), el.required_attr("id")?, el.attr("lemma")?, el.attr("pos")?));
                    words.push(el.text()?);
                }
                _ => {}
            }
        }
        for (pos_in_sentence, id, lemma, pos) in targets {
            let Some(instance_keys) = keys.get(&id) else {
                rec.bump("instance without key");
                continue;
            };
            let lemma = lemma.unwrap_or_else(|| words[pos_in_sentence].to_lowercase());
            let item = lexelt_item(&lemma, pos.as_deref().unwrap_or("X"));
            lexelts.entry(item).or_default().push(Instance {
                id,
                prefix: words[..pos_in_sentence].join(" "),
                head: words[pos_in_sentence].clone(),
                suffix: words[pos_in_sentence + 1..].join(" "),
                keys: instance_keys.clone(),
            });
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(lexelts)
}

fn context_xml(inst: &Instance) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer
        .create_element("context")
        .write_inner_content::<_, StiffError>(|w| {
            if !inst.prefix.is_empty() {
                w.write_event(Event::Text(BytesText::new(&format!("{} ", inst.prefix))))?;
            }
            w.create_element("head")
                .write_text_content(BytesText::new(&inst.head))?;
            if !inst.suffix.is_empty() {
                w.write_event(Event::Text(BytesText::new(&format!(" {}", inst.suffix))))?;
            }
            Ok(())
        })?;
    Ok(writer.into_inner())
}

/// Write one lexelt file.
pub fn write_lexelt<W: Write>(output: W, lang: &str, item: &str, instances: &[Instance]) -> Result<W> {
    let pos = item.rsplit_once('.').map_or("", |(_, p)| p);
    let mut writer = Writer::new_with_indent(output, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("corpus").with_attributes([("lang", lang)])))?;
    writer.write_event(Event::Start(
        BytesStart::new("lexelt").with_attributes([("item", item), ("pos", pos)]),
    ))?;
    for inst in instances {
        writer.write_event(Event::Start(
            BytesStart::new("instance").with_attributes([("id", inst.id.as_str())]),
        ))?;
        // Mixed content, so <context> is rendered unindented on its own line.
        writer.write_indent()?;
        writer.get_mut().write_all(&context_xml(inst)?)?;
        writer.write_event(Event::End(BytesEnd::new("instance")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("lexelt")))?;
    writer.write_event(Event::End(BytesEnd::new("corpus")))?;
    let mut inner = writer.into_inner();
    inner.write_all(b"\n")?;
    Ok(inner)
}

/// Scatter a Unified document and its keyfile into `out_dir`, one
/// `<stem>.xml` and `<stem>.key` per lexelt.
pub fn scatter(input: impl BufRead, keys: impl BufRead, out_dir: &Path, lang: &str) -> Result<Recovered> {
    let mut rec = Recovered::new("senseval-scatter");
    let keys = read_keys(keys)?;
    let lexelts = collect_instances(input, &keys, &mut rec)?;
    fs::create_dir_all(out_dir)?;

    let mut stems: HashMap<String, usize> = HashMap::new();
    for (item, instances) in &lexelts {
        let base = file_stem(item);
        let seen = stems.entry(base.clone()).or_default();
        let stem = if *seen == 0 {
            base
        } else {
            rec.bump("file name collision");
            format!("{base}-{seen}")
        };
        *seen += 1;

        let xml = BufWriter::new(File::create(out_dir.join(format!("{stem}.xml")))?);
        write_lexelt(xml, lang, item, instances)?.flush()?;
        let mut key = BufWriter::new(File::create(out_dir.join(format!("{stem}.key")))?);
        for inst in instances {
            writeln!(key, "{item} {} {}", inst.id, inst.keys.join(" "))?;
        }
        key.flush()?;
    }
    info!(lexelts = lexelts.len(), dir = %out_dir.display(), "scattered senseval files");
    rec.report();
    Ok(rec)
}

fn sorted_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.retain(|p| p.extension().is_some_and(|e| e == ext));
    paths.sort();
    Ok(paths)
}

/// Concatenate the per-word files of `dir` under one `<corpus>` and their
/// keys into `keys`. Returns the number of files gathered.
pub fn gather<W: Write, K: Write>(dir: &Path, output: W, mut keys: K, lang: &str) -> Result<usize> {
    let xml_files = sorted_with_extension(dir, "xml")?;
    let mut writer = Writer::new(output);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Text(BytesText::new("\n")))?;
    writer.write_event(Event::Start(BytesStart::new("corpus").with_attributes([("lang", lang)])))?;

    for path in &xml_files {
        let mut reader = Reader::from_reader(BufReader::new(File::open(path)?));
        let mut buf = Vec::new();
        let mut depth = 0usize;
        loop {
            let event = reader.read_event_into(&mut buf)?.into_owned();
            buf.clear();
            match event {
                Event::Eof => break,
                Event::Decl(_) => {}
                Event::Start(start) if depth == 0 && start.name().as_ref() == b"corpus" => depth += 1,
                Event::End(end) if depth == 1 && end.name().as_ref() == b"corpus" => depth -= 1,
                Event::Start(start) => {
                    depth += 1;
                    writer.write_event(Event::Start(start))?;
                }
                Event::End(end) => {
                    depth = depth.saturating_sub(1);
                    writer.write_event(Event::End(end))?;
                }
                Event::Text(text) if depth == 0 => drop(text),
                other => writer.write_event(other)?,
            }
        }

        let key_path = path.with_extension("key");
        if key_path.exists() {
            let mut key_file = File::open(&key_path)?;
            std::io::copy(&mut key_file, &mut keys)?;
        }
    }

    writer.write_event(Event::Text(BytesText::new("\n")))?;
    writer.write_event(Event::End(BytesEnd::new("corpus")))?;
    let mut inner = writer.into_inner();
    inner.write_all(b"\n")?;
    inner.flush()?;
    keys.flush()?;
    info!(files = xml_files.len(), dir = %dir.display(), "gathered senseval files");
    Ok(xml_files.len())
}

fn tag_words(words: &[&str], tags: &[Option<fin_morph::Tagged>]) -> Vec<String> {
    words
        .iter()
        .zip(tags)
        .map(|(word, tag)| format!("{word}/{}", tag.as_ref().map_or("X", |t| t.pos.as_str())))
        .collect()
}

/// Rewrite one `<context>` as `word/POS` tokens, keeping `<head>` where it
/// was. A head that opens the context stays the first child.
pub fn tag_context(context: &mut Element, tagger: &dyn PosTagger) -> Result<()> {
    let mut prefix = String::new();
    let mut head = None;
    let mut suffix = String::new();
    for child in &context.children {
        match child {
            Node::Text(text) => {
                let text = text.unescape()?;
                if head.is_none() {
                    prefix.push_str(&text);
                } else {
                    suffix.push_str(&text);
                }
            }
            Node::Element(el) if el.name() == "head" => head = Some(el.text()?),
            Node::Element(el) => {
                let text = el.text()?;
                if head.is_none() {
                    prefix.push_str(&text);
                } else {
                    suffix.push_str(&text);
                }
            }
            Node::Other(_) => {}
        }
    }
    let Some(head) = head else {
        return Err(StiffError::malformed("senseval context without <head>"));
    };

    let before: Vec<&str> = prefix.split_whitespace().collect();
    let target: Vec<&str> = head.split_whitespace().collect();
    let after: Vec<&str> = suffix.split_whitespace().collect();
    let all: Vec<&str> = before.iter().chain(&target).chain(&after).copied().collect();
    let tags = tagger.tag(&all);
    let (tags_before, rest) = tags.split_at(before.len().min(tags.len()));
    let (tags_target, tags_after) = rest.split_at(target.len().min(rest.len()));

    context.children.clear();
    if !before.is_empty() {
        context.push_text(&format!("{} ", tag_words(&before, tags_before).join(" ")));
    }
    context.push_child(Element::new("head").with_text(&tag_words(&target, tags_target).join(" ")));
    if !after.is_empty() {
        context.push_text(&format!(" {}", tag_words(&after, tags_after).join(" ")));
    }
    Ok(())
}

/// POS-tag every context of a Senseval document.
pub fn pos_tag<R: BufRead, W: Write>(input: R, output: W, tagger: &dyn PosTagger) -> Result<usize> {
    let stats = transform_stream(input, output, "context", |mut context| {
        tag_context(&mut context, tagger)?;
        Ok(Outcome::Keep(context))
    })?;
    Ok(stats.kept)
}
