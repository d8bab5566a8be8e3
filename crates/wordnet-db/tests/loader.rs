use std::fs;

use tempfile::TempDir;
use wordnet_db::{LoadMode, WordNet};
use wordnet_types::{Pos, SynsetId};

const DATA_NOUN: &str = "  1 This software and database is being provided to you\n\
09622049 03 n 01 person 0 000 | a human being\n\
10112591 18 n 02 friend 0 ally 0 002 @ 09622049 n 0000 + 02540670 v 0101 | a person you know well\n\
10112592 18 n 01 friend 0 001 @ 09622049 n 0000 | a supporter\n";

const INDEX_NOUN: &str = "  1 This software and database is being provided to you\n\
ally n 1 1 @ 1 0 10112591\n\
friend n 2 2 @ + 2 1 10112591 10112592\n\
person n 1 0 1 0 09622049\n";

const DATA_VERB: &str =
    "02540670 41 v 01 befriend 0 001 + 10112591 n 0101 01 + 01 00 | become friends with\n";

const INDEX_VERB: &str = "befriend v 1 1 + 1 0 02540670\n";

fn fixture() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, body) in [
        ("data.noun", DATA_NOUN),
        ("index.noun", INDEX_NOUN),
        ("data.verb", DATA_VERB),
        ("index.verb", INDEX_VERB),
        ("data.adj", ""),
        ("index.adj", ""),
        ("data.adv", ""),
        ("index.adv", ""),
    ] {
        fs::write(dir.path().join(name), body).expect("write fixture");
    }
    dir
}

fn noun(offset: u32) -> SynsetId {
    SynsetId {
        pos: Pos::Noun,
        offset,
    }
}

#[test]
fn loads_lemmas_in_sense_order() {
    let dir = fixture();
    let wn = WordNet::load(dir.path()).expect("load fixtures");
    assert_eq!(wn.synset_count(), 4);
    assert!(wn.lemma_exists(Pos::Noun, "Friend"));
    assert_eq!(
        wn.synsets_for_lemma(Pos::Noun, "friend"),
        &[noun(10112591), noun(10112592)]
    );
    assert_eq!(wn.lemma_names(noun(10112591)), vec!["friend", "ally"]);
}

#[test]
fn owned_mode_matches_mmap() {
    let dir = fixture();
    let owned = WordNet::load_with_mode(dir.path(), LoadMode::Owned).expect("owned");
    let mapped = WordNet::load_with_mode(dir.path(), LoadMode::Mmap).expect("mmap");
    assert_eq!(owned.synset_count(), mapped.synset_count());
    let syn = owned.get_synset(noun(10112591)).expect("friend synset");
    assert_eq!(syn.words[1].text, "ally");
    assert_eq!(syn.pointers.len(), 2);
    assert!(syn.pointers[1].is_derivation());
    assert_eq!(syn.pointers[1].src_word, Some(1));
}

#[test]
fn follows_derivation_and_hypernym_pointers() {
    let dir = fixture();
    let wn = WordNet::load(dir.path()).expect("load fixtures");
    let befriend = SynsetId {
        pos: Pos::Verb,
        offset: 2540670,
    };
    assert_eq!(wn.derivationally_related(noun(10112591)), vec![befriend]);
    assert_eq!(wn.derivationally_related(befriend), vec![noun(10112591)]);
    assert_eq!(
        wn.hypernym_paths(noun(10112591)),
        vec![vec![noun(9622049), noun(10112591)]]
    );
    assert_eq!(wn.hypernym_paths(noun(9622049)), vec![vec![noun(9622049)]]);
}

#[test]
fn names_synsets_by_first_lemma_sense() {
    let dir = fixture();
    let wn = WordNet::load(dir.path()).expect("load fixtures");
    assert_eq!(wn.synset_name(noun(10112592)).as_deref(), Some("friend.n.02"));
    assert_eq!(wn.resolve_name("friend.n.02"), Some(noun(10112592)));
    assert_eq!(wn.resolve_name("friend.n.03"), None);
    assert_eq!(wn.resolve_name("friend.n.00"), None);
}

#[test]
fn missing_files_are_fatal() {
    let dir = fixture();
    fs::remove_file(dir.path().join("index.adv")).unwrap();
    let err = WordNet::load(dir.path()).err().expect("missing index.adv");
    assert!(err.to_string().contains("index.adv"));
}
