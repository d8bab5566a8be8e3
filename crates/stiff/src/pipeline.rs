//! Running filter sequences over a STIFF stream.
//!
//! Stages are fused into one streaming pass by default. With a staging
//! directory each stage instead writes its whole output to a file that the
//! next stage reads, which leaves every intermediate document inspectable.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::Result;
use crate::filter::{FilterResources, SentenceFilter, Verdict, build_filter};
use crate::methods::Method;
use crate::xml::stiff::SentenceDoc;
use crate::xml::stream::{Outcome, StreamStats, transform_stream};

pub struct Pipeline {
    stages: Vec<Box<dyn SentenceFilter>>,
    trace: bool,
}

impl Pipeline {
    pub fn from_specs<S: AsRef<str>>(specs: &[S], res: &FilterResources) -> Result<Self> {
        let stages = specs
            .iter()
            .map(|spec| build_filter(spec.as_ref(), res))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            stages,
            trace: false,
        })
    }

    pub fn from_method(method: &Method, res: &FilterResources) -> Result<Self> {
        Self::from_specs(method.stages, res)
    }

    /// Echo each stage as it starts.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    fn apply_all(stages: &[Box<dyn SentenceFilter>], doc: &mut SentenceDoc) -> Result<Verdict> {
        for stage in stages {
            match stage.apply(doc)? {
                Verdict::Keep => {}
                other => return Ok(other),
            }
        }
        Ok(Verdict::Keep)
    }

    fn run_stages<R: BufRead, W: Write>(
        stages: &[Box<dyn SentenceFilter>],
        input: R,
        output: W,
    ) -> Result<StreamStats> {
        transform_stream(input, output, "sentence", |element| {
            let mut doc = SentenceDoc::new(element);
            Ok(match Self::apply_all(stages, &mut doc)? {
                Verdict::Keep => Outcome::Keep(doc.into_element()),
                Verdict::Bypass => Outcome::Bypass,
                Verdict::Break => Outcome::Break,
            })
        })
    }

    /// All stages in a single pass.
    pub fn run<R: BufRead, W: Write>(&self, input: R, output: W) -> Result<StreamStats> {
        if self.trace {
            for name in self.stage_names() {
                info!(stage = name, "+ filter");
            }
        }
        let stats = Self::run_stages(&self.stages, input, output)?;
        debug!(?stats, "pipeline finished");
        Ok(stats)
    }

    /// One pass per stage through files in `dir`.
    pub fn run_staged<R: BufRead, W: Write>(&self, input: R, mut output: W, dir: &Path) -> Result<StreamStats> {
        let Some((first, rest)) = self.stages.split_first() else {
            return Self::run_stages(&[], input, output);
        };
        let stage_path = |idx: usize| dir.join(format!("stage-{idx:02}.xml"));
        let run_to = |stage: &Box<dyn SentenceFilter>, input: &mut dyn BufRead, path: &Path| -> Result<StreamStats> {
            if self.trace {
                info!(stage = stage.name(), path = %path.display(), "+ filter");
            }
            let mut writer = BufWriter::new(File::create(path)?);
            let stats = Self::run_stages(std::slice::from_ref(stage), input, &mut writer)?;
            writer.flush()?;
            Ok(stats)
        };

        let mut input = input;
        let mut path = stage_path(0);
        let mut stats = run_to(first, &mut input, &path)?;
        for (idx, stage) in rest.iter().enumerate() {
            let next = stage_path(idx + 1);
            let mut reader = BufReader::new(File::open(&path)?);
            stats = run_to(stage, &mut reader, &next)?;
            path = next;
        }

        let mut reader = BufReader::new(File::open(&path)?);
        std::io::copy(&mut reader, &mut output)?;
        output.flush()?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<corpus>
  <subtitle imdb="1">
    <sentence id="1">
      <annotations>
        <annotation id="0" lang="fi" rank="1" anchor="a" anchor-positions="from-id=fi-tok&amp;char=0&amp;token=0&amp;token-length=1">00000001-n</annotation>
        <annotation id="1" lang="fi" rank="2" anchor="a" anchor-positions="from-id=fi-tok&amp;char=0&amp;token=0&amp;token-length=1">00000002-n</annotation>
      </annotations>
    </sentence>
    <sentence id="2">
      <annotations>
        <annotation id="0" lang="zh" anchor="b" anchor-positions="from-id=zh-untok&amp;char=0">00000003-n</annotation>
      </annotations>
    </sentence>
  </subtitle>
</corpus>
"#;

    #[test]
    fn fused_and_staged_agree() {
        let res = FilterResources::default();
        let pipeline = Pipeline::from_specs(&["lang fi", "freq dom", "rm-empty"], &res).unwrap();
        let mut fused = Vec::new();
        pipeline.run(DOC.as_bytes(), &mut fused).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut staged = Vec::new();
        pipeline
            .run_staged(DOC.as_bytes(), &mut staged, dir.path())
            .unwrap();

        assert_eq!(fused, staged);
        let out = String::from_utf8(fused).unwrap();
        assert!(out.contains("00000001-n"));
        assert!(!out.contains("00000002-n"));
        assert!(!out.contains("sentence id=\"2\""));
        assert!(dir.path().join("stage-02.xml").exists());
    }
}
