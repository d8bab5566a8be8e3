//! OpenSubtitles2018 Finnish–Chinese corpus files.
//!
//! The tokenised files, `ids` and the alignment are line-parallel. The
//! untokenised Chinese is not: it is re-synchronised against the tokenised
//! Chinese by comparing whitespace-stripped content, looking at most
//! [`SKIP_TOLERANCE`] lines ahead.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::alignment::WordAlignment;
use crate::error::{Result, StiffError};
use crate::extract::SentencePair;

pub const SKIP_TOLERANCE: usize = 200;

#[derive(Clone, Debug)]
pub struct CorpusPaths {
    pub fi: PathBuf,
    pub zh_tok: PathBuf,
    pub zh_untok: PathBuf,
    pub ids: PathBuf,
    pub alignment: PathBuf,
}

impl CorpusPaths {
    /// Standard file names for pair `fi-<zh>` (`zh` is `zh_cn` or `zh_tw`).
    pub fn in_dir(dir: &Path, zh: &str) -> Self {
        Self {
            fi: dir.join("c.clean.fi"),
            zh_tok: dir.join(format!("c.clean.{zh}")),
            zh_untok: dir.join(format!("OpenSubtitles2018.fi-{zh}.{zh}")),
            ids: dir.join("ids"),
            alignment: dir.join("aligned.grow-diag-final-and"),
        }
    }

    fn open(path: &Path) -> Result<Lines<BufReader<File>>> {
        if !path.exists() {
            return Err(StiffError::ResourceMissing {
                what: "corpus file",
                path: path.to_path_buf(),
            });
        }
        Ok(BufReader::new(File::open(path)?).lines())
    }
}

fn strip_ws(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Untokenised lines with a lookahead window for re-synchronisation.
struct Resync<R> {
    lines: Lines<R>,
    window: VecDeque<String>,
    consumed: usize,
}

impl<R: BufRead> Resync<R> {
    fn new(lines: Lines<R>) -> Self {
        Self {
            lines,
            window: VecDeque::new(),
            consumed: 0,
        }
    }

    fn find(&mut self, tok: &str, line: usize) -> Result<String> {
        let target = strip_ws(tok);
        for offset in 0..=SKIP_TOLERANCE {
            if offset == self.window.len() {
                match self.lines.next() {
                    Some(next) => self.window.push_back(next?),
                    None => break,
                }
            }
            if strip_ws(&self.window[offset]) == target {
                if offset > 0 {
                    debug!(line, skipped = offset, "skipped untokenised lines");
                }
                self.window.drain(..offset);
                self.consumed += offset + 1;
                return self
                    .window
                    .pop_front()
                    .ok_or_else(|| StiffError::AlignmentDesync { line, skipped: offset });
            }
        }
        Err(StiffError::AlignmentDesync {
            line,
            skipped: self.window.len(),
        })
    }
}

/// Read sentence pairs, handing each to `on_pair` until it breaks or the
/// files end.
pub fn for_each_pair(
    paths: &CorpusPaths,
    mut on_pair: impl FnMut(SentencePair) -> ControlFlow<()>,
) -> Result<()> {
    let mut fi = CorpusPaths::open(&paths.fi)?;
    let mut zh_tok = CorpusPaths::open(&paths.zh_tok)?;
    let mut ids = CorpusPaths::open(&paths.ids)?;
    let mut align = CorpusPaths::open(&paths.alignment)?;
    let mut untok = Resync::new(CorpusPaths::open(&paths.zh_untok)?);

    let mut line = 0;
    loop {
        line += 1;
        let (Some(fi_line), Some(tok_line), Some(id_line), Some(align_line)) =
            (fi.next(), zh_tok.next(), ids.next(), align.next())
        else {
            break;
        };
        let (fi_line, tok_line, id_line, align_line) = (fi_line?, tok_line?, id_line?, align_line?);
        let zh_untok = untok.find(&tok_line, line)?;
        let alignment = WordAlignment::parse(&align_line).map_err(|err| match err {
            StiffError::MalformedInput { reason, .. } => StiffError::MalformedInput { line, reason },
            other => other,
        })?;
        let (sources, imdb) = split_ids(&id_line);
        let pair = SentencePair {
            line,
            sources,
            imdb,
            fi: fi_line,
            zh_tok: tok_line,
            zh_untok,
            alignment,
        };
        if on_pair(pair).is_break() {
            break;
        }
    }
    debug!(lines = line - 1, untok_consumed = untok.consumed, "corpus read");
    Ok(())
}

/// `ids` rows are whitespace separated; the last field is the imdb id.
fn split_ids(line: &str) -> (String, String) {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.split_last() {
        Some((imdb, rest)) => (rest.join(" "), imdb.to_string()),
        None => (String::new(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resync_skips_extra_untok_lines() {
        let untok = "垃圾\n我的朋友，阿兰...\n好莱坞\n";
        let mut resync = Resync::new(untok.as_bytes().lines());
        assert_eq!(resync.find("我 的 朋友 ， 阿兰 ...", 1).unwrap(), "我的朋友，阿兰...");
        assert_eq!(resync.find("好莱坞", 2).unwrap(), "好莱坞");
        assert!(matches!(
            resync.find("不存在", 3),
            Err(StiffError::AlignmentDesync { line: 3, .. })
        ));
    }

    #[test]
    fn ids_take_last_field_as_imdb() {
        let (sources, imdb) = split_ids("fi/2005/1 zh_cn/2005/2 1234567");
        assert_eq!(sources, "fi/2005/1 zh_cn/2005/2");
        assert_eq!(imdb, "1234567");
    }
}
