//! `offset-pos` keys to `lemma.pos.NN` sense names.

use std::io::{BufRead, Write};

use wordnet_types::SynsetId;

use crate::convert::Recovered;
use crate::error::{Result, StiffError};
use crate::wordnets::Wordnets;
use crate::xml::stiff::SentenceDoc;
use crate::xml::stream::{Outcome, transform_stream};

fn rename(raw: &str, name: &impl Fn(SynsetId) -> Option<String>, rec: &mut Recovered) -> String {
    match raw.parse::<SynsetId>().ok().and_then(name) {
        Some(named) => named,
        None => {
            rec.bump("no sense name");
            raw.to_string()
        }
    }
}

/// Rename the keys of every annotation; unknown keys are kept as they are.
pub fn rename_annotations<R: BufRead, W: Write>(
    input: R,
    output: W,
    name: impl Fn(SynsetId) -> Option<String>,
) -> Result<Recovered> {
    let mut rec = Recovered::new("stiff-to-names");
    transform_stream(input, output, "sentence", |el| {
        let mut doc = SentenceDoc::new(el);
        for ann in doc.annotation_elements_mut() {
            let text = ann.text()?;
            let renamed: Vec<String> = text
                .split_whitespace()
                .map(|raw| rename(raw, &name, &mut rec))
                .collect();
            ann.set_text(&renamed.join(" "));
        }
        Ok(Outcome::Keep(doc.into_element()))
    })?;
    rec.report();
    Ok(rec)
}

/// Rename the keys of a Unified keyfile.
pub fn rename_keyfile<R: BufRead, W: Write>(
    input: R,
    mut output: W,
    name: impl Fn(SynsetId) -> Option<String>,
) -> Result<Recovered> {
    let mut rec = Recovered::new("keyfile-to-names");
    for line in input.lines() {
        let line = line?;
        let mut fields = line.split_whitespace();
        let Some(id) = fields.next() else { continue };
        let renamed: Vec<String> = fields.map(|raw| rename(raw, &name, &mut rec)).collect();
        writeln!(output, "{id} {}", renamed.join(" "))?;
    }
    output.flush()?;
    rec.report();
    Ok(rec)
}

fn require_pwn(wordnets: &Wordnets) -> Result<()> {
    if wordnets.pwn().is_none() {
        return Err(StiffError::Resource {
            what: "Princeton WordNet",
            source: anyhow::anyhow!("sense names need the Princeton database"),
        });
    }
    Ok(())
}

pub fn stiff_to_names<R: BufRead, W: Write>(input: R, output: W, wordnets: &Wordnets) -> Result<Recovered> {
    require_pwn(wordnets)?;
    rename_annotations(input, output, |id| wordnets.synset_name(id))
}

pub fn keyfile_to_names<R: BufRead, W: Write>(input: R, output: W, wordnets: &Wordnets) -> Result<Recovered> {
    require_pwn(wordnets)?;
    rename_keyfile(input, output, |id| wordnets.synset_name(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(id: SynsetId) -> Option<String> {
        (id.offset == 1).then(|| "friend.n.01".to_string())
    }

    #[test]
    fn annotation_keys_are_renamed() {
        let xml = r#"<corpus><sentence id="1"><annotations><annotation lang="fi" anchor="ystävä">00000001-n 00000009-n</annotation></annotations></sentence></corpus>"#;
        let mut out = Vec::new();
        let rec = rename_annotations(xml.as_bytes(), &mut out, names).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(">friend.n.01 00000009-n</annotation>"));
        assert_eq!(rec.get("no sense name"), 1);
    }

    #[test]
    fn keyfile_ids_are_kept() {
        let mut out = Vec::new();
        rename_keyfile("d000.s000.t000 00000001-n\n".as_bytes(), &mut out, names).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "d000.s000.t000 friend.n.01\n");
    }
}
