use proptest::prelude::*;
use stiff::anchor::{Anchor, char_slice, decode_all, encode_all, same_position, token_starts};

fn words() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zäö好莱坞朋友]{1,4}", 1..8)
}

proptest! {
    #[test]
    fn token_starts_slice_out_every_token(words in words(), gap in 1usize..3) {
        let tok = words.join(&" ".repeat(gap));
        let starts = token_starts(&tok);
        prop_assert_eq!(starts.len(), words.len());
        for (start, word) in starts.iter().zip(&words) {
            prop_assert_eq!(&char_slice(&tok, *start, word.chars().count()), word);
        }
    }

    #[test]
    fn tokenised_and_untokenised_positions_agree(words in words()) {
        let tok = words.join(" ");
        let untok: String = words.concat();
        let starts = token_starts(&tok);
        let mut untok_char = 0;
        for (idx, word) in words.iter().enumerate() {
            prop_assert!(same_position(&tok, starts[idx], &untok, untok_char));
            if untok_char > 0 {
                prop_assert!(!same_position(&tok, starts[idx], &untok, untok_char - 1));
            }
            untok_char += word.chars().count();
        }
    }

    #[test]
    fn anchor_lists_survive_the_attribute_encoding(
        spans in prop::collection::vec((0usize..40, 0usize..10, 1usize..4, any::<bool>()), 0..5),
    ) {
        let anchors: Vec<Anchor> = spans
            .into_iter()
            .map(|(char, token, len, tokenised)| {
                if tokenised {
                    Anchor::tok("fi-tok", char, token, len)
                } else {
                    Anchor::untok("zh-untok", char)
                }
            })
            .collect();
        prop_assert_eq!(decode_all(&encode_all(&anchors)).expect("decode"), anchors);
    }
}
