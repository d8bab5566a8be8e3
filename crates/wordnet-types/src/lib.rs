//! Shared types for WordNet-keyed sense inventories.
//!
//! Every wordnet the tagger reads (Princeton data files as well as the
//! tab-separated Finnish and Chinese resources) is keyed by Princeton
//! `(offset, pos)` pairs. [`SynsetId`] is that pair and doubles as the
//! canonical, cross-resource synset identifier. It renders as `00001740-n`
//! and parses back from the same form.
//!
//! ```rust
//! use wordnet_types::{Pos, SynsetId, decode_st};
//!
//! let id: SynsetId = "00001740-n".parse().unwrap();
//! assert_eq!(id, SynsetId { pos: Pos::Noun, offset: 1740 });
//! assert_eq!(id.to_string(), "00001740-n");
//! assert_eq!(decode_st("0a0b"), (Some(10), Some(11)));
//! ```

use std::fmt;
use std::str::FromStr;

/// Part-of-speech marker as used by WordNet files (`n`, `v`, `a`/`s`, `r`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Pos {
    Noun,
    Verb,
    Adj,
    Adv,
}

impl Pos {
    /// Parse a WordNet POS character into an enum. Satellites fold into `Adj`.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'n' => Some(Pos::Noun),
            'v' => Some(Pos::Verb),
            'a' | 's' => Some(Pos::Adj),
            'r' => Some(Pos::Adv),
            _ => None,
        }
    }

    /// Emit the POS character used in `index.*`/`data.*`.
    pub fn to_char(self) -> char {
        match self {
            Pos::Noun => 'n',
            Pos::Verb => 'v',
            Pos::Adj => 'a',
            Pos::Adv => 'r',
        }
    }

    /// Universal POS tag (`NOUN`, `VERB`, `ADJ`, `ADV`), as used by the
    /// unified WSD evaluation format.
    pub fn upos(self) -> &'static str {
        match self {
            Pos::Noun => "NOUN",
            Pos::Verb => "VERB",
            Pos::Adj => "ADJ",
            Pos::Adv => "ADV",
        }
    }

    /// Inverse of [`Pos::upos`]; also accepts `PROPN` as a noun.
    pub fn from_upos(tag: &str) -> Option<Self> {
        match tag {
            "NOUN" | "PROPN" => Some(Pos::Noun),
            "VERB" | "AUX" => Some(Pos::Verb),
            "ADJ" => Some(Pos::Adj),
            "ADV" => Some(Pos::Adv),
            _ => None,
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Pos::Noun => "noun",
            Pos::Verb => "verb",
            Pos::Adj => "adj",
            Pos::Adv => "adv",
        })
    }
}

/// `(offset, pos)` pair uniquely identifying a synset within the WordNet files.
///
/// Ordering is by POS first, then offset, which keeps serialised outputs
/// deterministic when ids are collected into ordered sets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SynsetId {
    pub pos: Pos,
    pub offset: u32,
}

impl fmt::Display for SynsetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}-{}", self.offset, self.pos.to_char())
    }
}

/// Error returned when a string is not an `offset-pos` synset id.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseSynsetIdError(pub String);

impl fmt::Display for ParseSynsetIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not an offset-pos synset id: {:?}", self.0)
    }
}

impl std::error::Error for ParseSynsetIdError {}

impl FromStr for SynsetId {
    type Err = ParseSynsetIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSynsetIdError(s.to_string());
        let (offset, pos) = s.trim().rsplit_once('-').ok_or_else(err)?;
        let mut pos_chars = pos.chars();
        let pos = match (pos_chars.next(), pos_chars.next()) {
            (Some(c), None) => Pos::from_char(c).ok_or_else(err)?,
            _ => return Err(err()),
        };
        let offset = offset.parse::<u32>().map_err(|_| err())?;
        Ok(SynsetId { pos, offset })
    }
}

/// A lemma string and its per-synset `lex_id`.
#[derive(Clone, Debug)]
pub struct Lemma<'a> {
    pub text: &'a str,
    pub lex_id: u8,
}

/// Pointer metadata from the `p_cnt` section of a data line.
#[derive(Clone, Debug)]
pub struct Pointer<'a> {
    pub symbol: &'a str,
    pub target: SynsetId,
    pub src_word: Option<u16>,
    pub dst_word: Option<u16>,
}

impl Pointer<'_> {
    /// `+`: derivationally related form (a lexical pointer).
    pub fn is_derivation(&self) -> bool {
        self.symbol == "+"
    }

    /// `@` or `@i`: hypernym or instance hypernym.
    pub fn is_hypernym(&self) -> bool {
        matches!(self.symbol, "@" | "@i")
    }
}

/// Synset record restricted to the fields sense tagging needs.
#[derive(Clone, Debug)]
pub struct Synset<'a> {
    pub id: SynsetId,
    pub words: Vec<Lemma<'a>>,
    pub pointers: Vec<Pointer<'a>>,
}

/// Decode the four-hex source/target field used in pointer blocks.
///
/// High byte is the source word number, low byte is the target word number.
/// Zero indicates "not specified" per WordNet conventions.
pub fn decode_st(hex4: &str) -> (Option<u16>, Option<u16>) {
    if hex4.len() != 4 {
        return (None, None);
    }

    match u16::from_str_radix(hex4, 16) {
        Ok(val) => {
            let src = val >> 8;
            let dst = val & 0x00FF;
            let src = if src == 0 { None } else { Some(src) };
            let dst = if dst == 0 { None } else { Some(dst) };
            (src, dst)
        }
        Err(_) => (None, None),
    }
}

/// Render a `lemma.pos.NN` synset name (NLTK style), e.g. `dog.n.01`.
pub fn synset_name(lemma: &str, pos: Pos, sense_number: u32) -> String {
    format!("{}.{}.{:02}", lemma.to_lowercase(), pos.to_char(), sense_number)
}

/// Split a `lemma.pos.NN` synset name into its parts.
///
/// Lemmas may themselves contain dots (`st._john's_wort.n.01`), so the split
/// is taken from the right.
pub fn parse_synset_name(name: &str) -> Option<(&str, Pos, u32)> {
    let (rest, num) = name.rsplit_once('.')?;
    let (lemma, pos) = rest.rsplit_once('.')?;
    let mut chars = pos.chars();
    let pos = match (chars.next(), chars.next()) {
        (Some(c), None) => Pos::from_char(c)?,
        _ => return None,
    };
    let num = num.parse().ok()?;
    if lemma.is_empty() {
        return None;
    }
    Some((lemma, pos, num))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_source_target() {
        assert_eq!(decode_st("0000"), (None, None));
        assert_eq!(decode_st("0100"), (Some(1), None));
        assert_eq!(decode_st("00ff"), (None, Some(255)));
        assert_eq!(decode_st("0a0b"), (Some(10), Some(11)));
        assert_eq!(decode_st("bad"), (None, None));
    }

    #[test]
    fn synset_id_round_trips_through_text() {
        let id = SynsetId {
            pos: Pos::Verb,
            offset: 2500,
        };
        assert_eq!(id.to_string(), "00002500-v");
        assert_eq!("00002500-v".parse::<SynsetId>().unwrap(), id);
        assert_eq!(
            "00002500-s".parse::<SynsetId>().unwrap().pos,
            Pos::Adj,
            "satellites fold into adjectives"
        );
        assert!("2500v".parse::<SynsetId>().is_err());
        assert!("00002500-nv".parse::<SynsetId>().is_err());
        assert!("abc-n".parse::<SynsetId>().is_err());
    }

    #[test]
    fn synset_names() {
        assert_eq!(synset_name("Dog", Pos::Noun, 1), "dog.n.01");
        assert_eq!(
            parse_synset_name("st._john's_wort.n.01"),
            Some(("st._john's_wort", Pos::Noun, 1))
        );
        assert_eq!(parse_synset_name("dog.x.01"), None);
        assert_eq!(parse_synset_name("dog"), None);
    }

    #[test]
    fn universal_pos_tags() {
        assert_eq!(Pos::from_upos("PROPN"), Some(Pos::Noun));
        assert_eq!(Pos::from_upos(Pos::Adv.upos()), Some(Pos::Adv));
        assert_eq!(Pos::from_upos("PUNCT"), None);
    }
}
