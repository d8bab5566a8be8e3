//! Anchors locate a match inside one of a sentence's text variants.
//!
//! Offsets are 0-based *characters*. For tokenised variants an anchor also
//! carries the whitespace-split token index and the span length in tokens.
//! The same occurrence in a tokenised and an untokenised variant is
//! recognised by comparing offsets with whitespace discounted, see
//! [`same_position`].

use url::form_urlencoded;

use crate::error::{Result, StiffError};

pub const FI_TOK: &str = "fi-tok";
pub const ZH_TOK: &str = "zh-tok";
pub const ZH_UNTOK: &str = "zh-untok";

#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Anchor {
    pub from_id: String,
    pub char: usize,
    pub token: Option<usize>,
    pub token_length: Option<usize>,
}

impl Anchor {
    /// Anchor into an untokenised text.
    pub fn untok(from_id: &str, char: usize) -> Self {
        Self {
            from_id: from_id.to_string(),
            char,
            token: None,
            token_length: None,
        }
    }

    /// Anchor into a tokenised text.
    pub fn tok(from_id: &str, char: usize, token: usize, token_length: usize) -> Self {
        Self {
            from_id: from_id.to_string(),
            char,
            token: Some(token),
            token_length: Some(token_length),
        }
    }

    pub fn is_tokenised(&self) -> bool {
        self.token.is_some()
    }

    /// `from-id=…&char=…[&token=…&token-length=…]`, as stored in
    /// `anchor-positions`.
    pub fn encode(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        ser.append_pair("from-id", &self.from_id);
        ser.append_pair("char", &self.char.to_string());
        if let Some(token) = self.token {
            ser.append_pair("token", &token.to_string());
        }
        if let Some(len) = self.token_length {
            ser.append_pair("token-length", &len.to_string());
        }
        ser.finish()
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let mut from_id = None;
        let mut char = None;
        let mut token = None;
        let mut token_length = None;
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let number = || {
                value.parse::<usize>().map_err(|_| {
                    StiffError::malformed(format!("anchor field {key}={value:?} is not a number"))
                })
            };
            match key.as_ref() {
                "from-id" => from_id = Some(value.to_string()),
                "char" => char = Some(number()?),
                "token" => token = Some(number()?),
                "token-length" => token_length = Some(number()?),
                _ => {}
            }
        }
        match (from_id, char) {
            (Some(from_id), Some(char)) => Ok(Anchor {
                from_id,
                char,
                token,
                token_length,
            }),
            _ => Err(StiffError::malformed(format!(
                "anchor position {raw:?} lacks from-id or char"
            ))),
        }
    }
}

/// Encode several anchors as a whitespace-separated attribute value.
pub fn encode_all(anchors: &[Anchor]) -> String {
    anchors
        .iter()
        .map(Anchor::encode)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn decode_all(raw: &str) -> Result<Vec<Anchor>> {
    raw.split_whitespace().map(Anchor::decode).collect()
}

/// Number of whitespace characters strictly before character `char_idx`.
pub fn ws_before(text: &str, char_idx: usize) -> usize {
    text.chars()
        .take(char_idx)
        .filter(|c| c.is_whitespace())
        .count()
}

/// Character offset with preceding whitespace discounted.
pub fn dense_offset(text: &str, char_idx: usize) -> usize {
    char_idx - ws_before(text, char_idx)
}

/// Whether offsets in two variants of the same sentence denote one position.
pub fn same_position(tok_text: &str, tok_char: usize, untok_text: &str, untok_char: usize) -> bool {
    dense_offset(tok_text, tok_char) == dense_offset(untok_text, untok_char)
}

/// `len` characters starting at character `char`.
pub fn char_slice(text: &str, char: usize, len: usize) -> String {
    text.chars().skip(char).take(len).collect()
}

/// Character offset of every whitespace-split token.
pub fn token_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut prev_ws = true;
    for (idx, ch) in text.chars().enumerate() {
        let ws = ch.is_whitespace();
        if prev_ws && !ws {
            starts.push(idx);
        }
        prev_ws = ws;
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_optional_token_fields() {
        let untok = Anchor::untok(ZH_UNTOK, 3);
        assert_eq!(untok.encode(), "from-id=zh-untok&char=3");
        let tok = Anchor::tok(ZH_TOK, 4, 2, 1);
        assert_eq!(tok.encode(), "from-id=zh-tok&char=4&token=2&token-length=1");
        assert_eq!(Anchor::decode(&tok.encode()).unwrap(), tok);
        assert!(Anchor::decode("char=3").is_err());
        assert!(Anchor::decode("from-id=fi-tok&char=x").is_err());
    }

    #[test]
    fn whitespace_discounted_positions_match() {
        let untok = "我的朋友，阿兰...";
        let tok = "我 的 朋友 ， 阿兰 ...";
        // 朋友: untok char 2, tok char 4.
        assert!(same_position(tok, 4, untok, 2));
        // 阿兰: untok char 5, tok char 9.
        assert!(same_position(tok, 9, untok, 5));
        assert!(!same_position(tok, 9, untok, 4));
    }

    #[test]
    fn token_starts_skip_runs_of_space() {
        assert_eq!(token_starts(" a  bc d"), vec![1, 4, 7]);
        assert_eq!(char_slice("好莱坞电影", 0, 3), "好莱坞");
    }
}
