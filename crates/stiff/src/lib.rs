//! Sense-tagged instances for Finnish.
//!
//! Finnish and Chinese sides of a parallel subtitle corpus are tagged with
//! every wordnet sense their lemmas could carry. Tags of one language that
//! share a sense with a tag of the other become supports, and filter
//! pipelines then narrow the tagging down to one sense per token.

pub mod alignment;
pub mod anchor;
pub mod automaton;
pub mod callback;
pub mod config;
pub mod convert;
pub mod corpus;
pub mod error;
pub mod extract;
pub mod filter;
pub mod methods;
pub mod mwe;
pub mod pipeline;
pub mod support;
pub mod t2s;
pub mod tag;
pub mod tagging;
pub mod wordnets;
pub mod xml;

pub use config::Config;
pub use error::{Result, StiffError};
pub use extract::{Extractor, SentencePair, TaggedSentence};
pub use pipeline::Pipeline;
pub use wordnets::{Lang, Wordnets};
