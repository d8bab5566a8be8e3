use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use fin_morph::{Analyser, Lemmatizer, TableAnalyser};

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let table = args.next().map(PathBuf::from).context(
        "usage: cargo run -p fin-morph --example lookup -- <analysis-table> <sentence>",
    )?;
    let Some(sentence) = args.next() else {
        bail!("usage: cargo run -p fin-morph --example lookup -- <analysis-table> <sentence>");
    };

    let analyser = TableAnalyser::load(&table)
        .with_context(|| format!("loading analyses from {}", table.display()))?;
    let lemmatizer = Lemmatizer::new(analyser);

    for token in lemmatizer.analyser().tokenize(&sentence) {
        println!("{} @{}", token.surface, token.start);
        for cand in lemmatizer.lemmas_for(&token.surface, None) {
            println!("    {:<16} [{}]", cand.lemma, cand.path);
        }
    }

    Ok(())
}
