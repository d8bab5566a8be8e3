use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use wordnet_db::{LoadMode, WordNet};
use wordnet_types::Pos;

fn main() -> Result<()> {
    let dict_dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: cargo run -p wordnet-db --example stats -- <path-to-wordnet-dir>")?;

    let wn = WordNet::load_with_mode(&dict_dir, LoadMode::Mmap)
        .with_context(|| format!("loading WordNet from {}", dict_dir.display()))?;

    println!("Dictionary: {}", dict_dir.display());
    println!("Lemma keys   : {}", wn.lemma_count());
    println!("Synsets      : {}", wn.synset_count());

    // Spot-check a couple of lemmas and their derivational neighbourhood.
    for (pos, lemma) in [(Pos::Noun, "friend"), (Pos::Verb, "run")] {
        for sid in wn.synsets_for_lemma(pos, lemma) {
            let name = wn.synset_name(*sid).unwrap_or_default();
            let related = wn.derivationally_related(*sid);
            let depth = wn
                .hypernym_paths(*sid)
                .iter()
                .map(Vec::len)
                .max()
                .unwrap_or(0);
            println!(
                "{sid} {name}: {} derivationally related, hypernym depth {depth}",
                related.len()
            );
        }
    }

    Ok(())
}
