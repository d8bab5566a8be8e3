use unicode_segmentation::UnicodeSegmentation;

/// A surface token and its 0-based character offset in the sentence.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub surface: String,
    pub start: usize,
}

impl Token {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.surface.chars().count()
    }
}

/// Split on Unicode whitespace, recording character (not byte) offsets.
pub fn tokenize_whitespace(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;
    for (idx, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            if !current.is_empty() {
                tokens.push(Token {
                    surface: std::mem::take(&mut current),
                    start,
                });
            }
        } else {
            if current.is_empty() {
                start = idx;
            }
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(Token {
            surface: current,
            start,
        });
    }
    tokens
}

/// Words per UAX #29, dropping punctuation and whitespace segments.
pub fn words(text: &str) -> Vec<&str> {
    text.unicode_words().collect()
}

/// All UAX #29 word-boundary segments with byte offsets, punctuation included.
pub fn word_bounds(text: &str) -> Vec<(usize, &str)> {
    text.split_word_bound_indices().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_in_characters() {
        let tokens = tokenize_whitespace("Hyvä  ystäväni Alan .");
        let starts: Vec<_> = tokens.iter().map(|t| (t.surface.as_str(), t.start)).collect();
        assert_eq!(
            starts,
            vec![("Hyvä", 0), ("ystäväni", 6), ("Alan", 15), (".", 20)]
        );
        assert_eq!(tokens[1].char_len(), 8);
    }

    #[test]
    fn words_drop_punctuation() {
        assert_eq!(words("ei ole, eikä."), vec!["ei", "ole", "eikä"]);
        assert!(word_bounds("ei ole.").iter().any(|(_, w)| *w == "."));
    }
}
