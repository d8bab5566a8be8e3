use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = StiffError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StiffError {
    /// Tokenised and untokenised Chinese could not be matched up.
    #[error("untokenised Chinese lost sync with tokenised line {line} (skipped {skipped} lines)")]
    AlignmentDesync { line: usize, skipped: usize },
    #[error("missing resource {what}: {}", path.display())]
    ResourceMissing { what: &'static str, path: PathBuf },
    #[error("failed to load {what}: {source:#}")]
    Resource {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("unknown wordnet id {0:?}")]
    UnknownWordnet(String),
    #[error("malformed annotation: {0}")]
    MalformedAnnotation(String),
    #[error("unknown filter {0:?}")]
    UnknownFilter(String),
    #[error("unknown method {0:?}")]
    UnknownMethod(String),
    #[error("invalid filter option: {0}")]
    FilterOption(String),
    #[error("malformed input line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl StiffError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        StiffError::MalformedAnnotation(msg.into())
    }

    /// Whether the error is the downstream reader hanging up.
    pub fn is_broken_pipe(&self) -> bool {
        match self {
            StiffError::Io(err) => err.kind() == io::ErrorKind::BrokenPipe,
            StiffError::Xml(quick_xml::Error::Io(err)) => err.kind() == io::ErrorKind::BrokenPipe,
            _ => false,
        }
    }
}
