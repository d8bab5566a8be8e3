use std::fs;
use std::path::Path;
use std::sync::Arc;

use fin_morph::{TableAnalyser, TableTagger};
use stiff::alignment::WordAlignment;
use stiff::anchor::{FI_TOK, ZH_TOK, char_slice, token_starts};
use stiff::corpus::CorpusPaths;
use stiff::filter::FilterResources;
use stiff::methods;
use stiff::t2s::T2s;
use stiff::tag::tag_corpus;
use stiff::tagging::TransferType;
use stiff::xml::stiff::{Annotation, SentenceDoc, sentence_element};
use stiff::xml::stream::for_each_element;
use stiff::{Extractor, Pipeline, SentencePair, StiffError, Wordnets};
use tempfile::TempDir;
use wordnet_db::{LemmaCounts, LoadMode, TabWordNet, WordNet};
use wordnet_types::{Pos, SynsetId};

const DATA_NOUN: &str = "  1 This software and database is being provided to you\n\
09622049 03 n 01 person 0 000 | a human being\n\
10112591 18 n 02 friend 0 ally 0 001 @ 09622049 n 0000 | a person you know well\n\
10112592 18 n 01 friend 0 001 @ 09622049 n 0000 | a supporter\n";

const INDEX_NOUN: &str = "  1 This software and database is being provided to you\n\
ally n 1 1 @ 1 0 10112591\n\
friend n 2 1 @ 2 1 10112591 10112592\n\
person n 1 0 1 0 09622049\n";

const HOLLYWOOD_DISTRICT: u32 = 8_935_042;
const HOLLYWOOD_INDUSTRY: u32 = 8_935_043;
const HOLLYWOOD_STYLE: u32 = 8_935_044;
const FRIEND: u32 = 10_112_591;
const SUPPORTER: u32 = 10_112_592;

fn noun(offset: u32) -> SynsetId {
    SynsetId {
        pos: Pos::Noun,
        offset,
    }
}

fn pwn_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, body) in [
        ("data.noun", DATA_NOUN),
        ("index.noun", INDEX_NOUN),
        ("data.verb", ""),
        ("index.verb", ""),
        ("data.adj", ""),
        ("index.adj", ""),
        ("data.adv", ""),
        ("index.adv", ""),
    ] {
        fs::write(dir.path().join(name), body).expect("write wordnet fixture");
    }
    dir
}

fn wordnets() -> Arc<Wordnets> {
    let dir = pwn_dir();
    let pwn = WordNet::load_with_mode(dir.path(), LoadMode::Owned).expect("load wordnet fixture");
    let fin = vec![
        TabWordNet::from_entries(
            "fin",
            [
                (noun(HOLLYWOOD_DISTRICT), "Hollywood"),
                (noun(HOLLYWOOD_INDUSTRY), "Hollywood"),
                (noun(HOLLYWOOD_STYLE), "hollywood"),
                (noun(FRIEND), "ystävä"),
                (noun(SUPPORTER), "ystävä"),
            ],
        ),
        TabWordNet::from_entries("qwf", [(noun(HOLLYWOOD_DISTRICT), "Hollywood")]),
    ];
    let zh = vec![TabWordNet::from_entries(
        "cmn",
        [
            (noun(HOLLYWOOD_DISTRICT), "好萊塢"),
            (noun(HOLLYWOOD_INDUSTRY), "好萊塢"),
            (noun(FRIEND), "朋友"),
        ],
    )];
    let t2s = T2s::from_reader("萊\t莱\n塢\t坞\n".as_bytes()).expect("t2s table");
    let counts = LemmaCounts::from_pairs([("ystävä", 40), ("hollywood", 3)]);
    Arc::new(Wordnets::from_parts(fin, zh, Some(pwn), counts, t2s))
}

fn extractor() -> Extractor<TableAnalyser> {
    let analyser = TableAnalyser::from_rows(
        "Hollywoodiin\tHollywood\tPROPN\n\
         ystäväni\tystävä\tNOUN\n\
         Hyvä\thyvä\tADJ\n\
         Alan\tAlan\tPROPN\n",
    )
    .expect("analyses");
    let tagger = TableTagger::from_rows("ystäväni\tystävä\tNOUN\nHyvä\thyvä\tADJ\n").expect("tags");
    Extractor::new(wordnets(), analyser, Box::new(tagger))
}

fn pair(line: usize, fi: &str, zh_untok: &str, zh_tok: &str, align: &str) -> SentencePair {
    SentencePair {
        line,
        sources: "fi/1.xml zh_cn/1.xml".into(),
        imdb: "1234".into(),
        fi: fi.into(),
        zh_tok: zh_tok.into(),
        zh_untok: zh_untok.into(),
        alignment: WordAlignment::parse(align).expect("alignment"),
    }
}

fn hollywood() -> SentencePair {
    pair(1, "Hollywoodiin", "好莱坞", "好莱坞", "0-0")
}

fn friend() -> SentencePair {
    pair(
        2,
        "Hyvä ystäväni Alan .",
        "我的朋友，阿兰...",
        "我 的 朋友 ， 阿兰 ...",
        "0-0 0-1 1-2 2-4 3-5",
    )
}

fn aligned(supports: &[stiff::tagging::TagSupport]) -> bool {
    supports.iter().any(|s| s.transfer_type == TransferType::Aligned)
}

#[test]
fn place_name_gets_aligned_support_from_chinese() {
    let tagged = extractor().tag_pair(&hollywood()).expect("tag pair");
    let token = &tagged.fi.tokens[0];
    assert_eq!(token.token, "Hollywoodiin");

    let supported = token.tags.iter().filter(|t| aligned(&t.supports)).count();
    let unsupported = token.tags.iter().filter(|t| t.supports.is_empty()).count();
    assert!(supported >= 2, "tags: {:?}", token.tags);
    assert!(unsupported >= 1, "tags: {:?}", token.tags);

    let district = token
        .tags
        .iter()
        .find(|t| t.synset() == noun(HOLLYWOOD_DISTRICT))
        .expect("district sense");
    assert_eq!(district.wordnets(), vec!["fin", "qwf"]);
}

#[test]
fn possessive_friend_is_supported_by_aligned_chinese() {
    let ext = extractor();
    let tagged = ext.tag_pair(&friend()).expect("tag pair");
    let token = tagged
        .fi
        .tokens
        .iter()
        .find(|t| t.token == "ystäväni")
        .expect("ystäväni token");
    let pwn = ext.wordnets().pwn().expect("princeton wordnet");
    assert!(token.tags.iter().any(|tag| {
        pwn.lemma_names(tag.synset()).contains(&"friend") && aligned(&tag.supports)
    }));

    // The other sense of ystävä has no Chinese counterpart.
    let supporter = token
        .tags
        .iter()
        .find(|t| t.synset() == noun(SUPPORTER))
        .expect("supporter sense");
    assert!(supporter.supports.is_empty());
}

#[test]
fn supports_point_at_tags_sharing_the_synset() {
    let tagged = extractor().tag_pair(&friend()).expect("tag pair");
    for (_, tag) in tagged.fi.tags() {
        for support in &tag.supports {
            let (_, source) = tagged
                .zh
                .tag_by_id(support.transfer_from)
                .expect("support refers to an existing Chinese tag");
            if support.transform_chain.is_empty() {
                assert_eq!(source.synset(), tag.synset());
            }
        }
    }
}

#[test]
fn ranks_are_dense_within_each_token() {
    let tagged = extractor().tag_pair(&friend()).expect("tag pair");
    for token in &tagged.fi.tokens {
        let mut ranks: Vec<(u32, u32)> = token.tags.iter().filter_map(|t| t.rank).collect();
        assert_eq!(ranks.len(), token.tags.len());
        ranks.sort_by(|a, b| a.0.cmp(&b.0));
        let mut expected = 1;
        for window in ranks.windows(2) {
            let ((r1, c1), (r2, c2)) = (window[0], window[1]);
            if c1 == c2 {
                assert_eq!(r1, r2);
            } else {
                assert!(c1 > c2);
                expected += 1;
                assert_eq!(r2, expected);
            }
        }
        if let Some((first, _)) = ranks.first() {
            assert_eq!(*first, 1);
        }
    }
}

#[test]
fn extraction_is_deterministic() {
    let render = || {
        let ext = extractor();
        [hollywood(), friend()]
            .iter()
            .map(|p| {
                let tagged = ext.tag_pair(p).expect("tag pair");
                sentence_element(p.line, p, &tagged).to_xml().expect("serialise")
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(render(), render());
}

fn strip_ws(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Characters of `text` from `char` on until as many non-space characters
/// as `anchor` has were seen.
fn covered(text: &str, char: usize, anchor: &str) -> String {
    let want = strip_ws(anchor).chars().count();
    text.chars()
        .skip(char)
        .filter(|c| !c.is_whitespace())
        .take(want)
        .collect()
}

#[test]
fn anchors_point_into_their_texts() {
    let ext = extractor();
    for p in [hollywood(), friend()] {
        let tagged = ext.tag_pair(&p).expect("tag pair");
        let doc = SentenceDoc::new(sentence_element(p.line, &p, &tagged));
        let texts = doc.texts().expect("texts");
        let annotations = doc.annotations().expect("annotations");
        assert!(!annotations.is_empty());
        for ann in annotations {
            assert!(!ann.positions.is_empty(), "{ann:?}");
            for pos in &ann.positions {
                let (_, text) = texts.get(&pos.from_id).expect("anchor names a text of the sentence");
                assert_eq!(covered(text, pos.char, &ann.anchor), strip_ws(&ann.anchor));

                let (Some(token), Some(len)) = (pos.token, pos.token_length) else {
                    continue;
                };
                let starts = token_starts(text);
                assert_eq!(pos.char, starts[token]);
                let words: Vec<&str> = text.split_whitespace().collect();
                let joined = words[token..token + len].join(" ");
                if pos.from_id == FI_TOK {
                    assert_eq!(joined, ann.anchor);
                } else {
                    assert_eq!(pos.from_id, ZH_TOK);
                    assert_eq!(strip_ws(&joined), strip_ws(&ann.anchor));
                }
                if len == 1 {
                    assert_eq!(char_slice(text, pos.char, words[token].chars().count()), words[token]);
                }
            }
        }
    }
}

fn write_corpus(dir: &Path, untok: &str) {
    let files = [
        ("c.clean.fi", "Hollywoodiin\nHyvä ystäväni Alan .\n"),
        ("c.clean.zh_cn", "好莱坞\n我 的 朋友 ， 阿兰 ...\n"),
        ("OpenSubtitles2018.fi-zh_cn.zh_cn", untok),
        ("ids", "fi/1.xml zh_cn/1.xml 1234\nfi/2.xml zh_cn/2.xml 5678\n"),
        ("aligned.grow-diag-final-and", "0-0\n0-0 0-1 1-2 2-4 3-5\n"),
    ];
    for (name, body) in files {
        fs::write(dir.join(name), body).expect("write corpus file");
    }
}

fn sentences(xml: &[u8]) -> Vec<Vec<Annotation>> {
    let mut out = Vec::new();
    for_each_element(xml, "sentence", |el| {
        out.push(SentenceDoc::new(el).annotations()?);
        Ok(std::ops::ControlFlow::Continue(()))
    })
    .expect("read sentences");
    out
}

#[test]
fn corpus_is_tagged_with_resync_and_subtitles() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_corpus(dir.path(), "好莱坞\n-\n我的朋友，阿兰...\n");
    let mut out = Vec::new();
    let stats = tag_corpus(
        CorpusPaths::in_dir(dir.path(), "zh_cn"),
        &extractor(),
        &mut out,
        None,
    )
    .expect("tag corpus");
    assert_eq!(stats.sentences, 2);
    assert!(stats.supported >= 3);
    assert!(stats.zh_tags >= 3);

    let xml = String::from_utf8(out.clone()).expect("utf-8");
    assert!(xml.contains(r#"<corpus source="OpenSubtitles2018">"#));
    assert!(xml.contains(r#"imdb="1234""#));
    assert!(xml.contains(r#"imdb="5678""#));
    assert_eq!(sentences(&out).len(), 2);
}

#[test]
fn limit_stops_reading_early() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_corpus(dir.path(), "好莱坞\n我的朋友，阿兰...\n");
    let stats = tag_corpus(
        CorpusPaths::in_dir(dir.path(), "zh_cn"),
        &extractor(),
        Vec::new(),
        Some(1),
    )
    .expect("tag corpus");
    assert_eq!(stats.sentences, 1);
}

#[test]
fn lost_untokenised_line_is_a_desync() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_corpus(dir.path(), "好莱坞\n完全不同\n");
    let err = tag_corpus(
        CorpusPaths::in_dir(dir.path(), "zh_cn"),
        &extractor(),
        Vec::new(),
        None,
    )
    .expect_err("second line cannot be found");
    assert!(matches!(err, StiffError::AlignmentDesync { line: 2, .. }), "{err}");
}

#[test]
fn null_method_round_trips_annotations() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_corpus(dir.path(), "好莱坞\n我的朋友，阿兰...\n");
    let mut tagged = Vec::new();
    tag_corpus(
        CorpusPaths::in_dir(dir.path(), "zh_cn"),
        &extractor(),
        &mut tagged,
        None,
    )
    .expect("tag corpus");

    let res = FilterResources::default();
    let null = Pipeline::from_method(methods::lookup("N").expect("null method"), &res).expect("pipeline");
    let mut out = Vec::new();
    null.run(tagged.as_slice(), &mut out).expect("run null");
    assert_eq!(sentences(&tagged), sentences(&out));
}

#[test]
fn unambiguous_methods_leave_one_annotation_per_span() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_corpus(dir.path(), "好莱坞\n我的朋友，阿兰...\n");
    let mut tagged = Vec::new();
    tag_corpus(
        CorpusPaths::in_dir(dir.path(), "zh_cn"),
        &extractor(),
        &mut tagged,
        None,
    )
    .expect("tag corpus");

    let res = FilterResources::default();
    for code in ["MR", "BR", "EC"] {
        let method = methods::lookup(code).expect("method");
        assert!(method.ends_unambiguous(), "{code}");
        let mut out = Vec::new();
        Pipeline::from_method(method, &res)
            .expect("pipeline")
            .run(tagged.as_slice(), &mut out)
            .expect("run method");
        for anns in sentences(&out) {
            let mut spans: Vec<_> = anns
                .iter()
                .filter_map(|a| a.token_span().map(|(id, s, l)| (a.lang.clone(), id.to_string(), s, l)))
                .collect();
            let total = spans.len();
            spans.sort();
            spans.dedup();
            assert_eq!(spans.len(), total, "{code} left an ambiguous span");
        }
    }
}

fn noun_annotation(id: usize, offset: u32, token: usize) -> String {
    format!(
        r#"<annotation id="{id}" type="stiff" lang="fi" anchor="sana" anchor-positions="from-id=fi-tok&amp;char={char}&amp;token={token}&amp;token-length=1" lemma="sana">{offset:08}-n</annotation>"#,
        char = token * 5,
    )
}

#[test]
fn hyponyms_dominate_their_hypernyms() {
    let anns = [
        noun_annotation(0, 9_622_049, 0),
        noun_annotation(1, FRIEND, 0),
        noun_annotation(2, HOLLYWOOD_STYLE, 0),
        noun_annotation(3, 9_622_049, 1),
    ]
    .join("\n        ");
    let xml = format!(
        "<corpus source=\"OpenSubtitles2018\">\n  <sentence id=\"1\">\n    <text id=\"fi-tok\" lang=\"fi\">sana sana</text>\n    <annotations>\n        {anns}\n    </annotations>\n  </sentence>\n</corpus>\n"
    );

    let res = FilterResources {
        wordnets: Some(wordnets()),
    };
    let mut out = Vec::new();
    Pipeline::from_specs(&["hyp"], &res)
        .expect("pipeline")
        .run(xml.as_bytes(), &mut out)
        .expect("run hyp");

    let survivors: Vec<(usize, String)> = sentences(&out)
        .into_iter()
        .flatten()
        .map(|a| (a.token_span().map_or(usize::MAX, |(_, start, _)| start), a.synsets[0].clone()))
        .collect();
    assert_eq!(
        survivors,
        [
            (0, format!("{FRIEND:08}-n")),
            (0, format!("{HOLLYWOOD_STYLE:08}-n")),
            (1, "09622049-n".to_string()),
        ]
    );
}
