use std::fs;

use fin_morph::TableTagger;
use stiff::convert::eurosense::reanchor;
use stiff::convert::senseval::{gather, pos_tag, scatter};
use stiff::convert::unified::stiff_to_unified;
use stiff::t2s::T2s;
use stiff::xml::dom::Element;
use stiff::xml::stiff::SentenceDoc;
use stiff::Wordnets;
use wordnet_db::{LemmaCounts, TabWordNet};
use wordnet_types::{Pos, SynsetId};

const STIFF: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<corpus source="OpenSubtitles2018">
  <subtitle sources="fi/1.xml zh_cn/1.xml" imdb="1234">
    <sentence id="1">
      <text id="fi-tok" lang="fi">Ystävä tuli kotiin .</text>
      <annotations>
        <annotation id="0" type="stiff" lang="fi" anchor="Ystävä" anchor-positions="from-id=fi-tok&amp;char=0&amp;token=0&amp;token-length=1" lemma="ystävä">10112591-n</annotation>
      </annotations>
    </sentence>
    <sentence id="2">
      <text id="fi-tok" lang="fi">Hyvä ystäväni Alan .</text>
      <annotations>
        <annotation id="0" type="stiff" lang="fi" anchor="ystäväni" anchor-positions="from-id=fi-tok&amp;char=5&amp;token=1&amp;token-length=1" lemma="ystävä">10112591-n</annotation>
      </annotations>
    </sentence>
  </subtitle>
</corpus>
"#;

#[test]
fn head_first_context_survives_the_senseval_round_trip() {
    let mut unified = Vec::new();
    let mut keys = Vec::new();
    let rec = stiff_to_unified(STIFF.as_bytes(), &mut unified, &mut keys).expect("to unified");
    assert!(rec.is_empty());
    let keys = String::from_utf8(keys).expect("utf-8");
    assert_eq!(keys.lines().count(), 2);

    let dir = tempfile::tempdir().expect("tempdir");
    scatter(unified.as_slice(), keys.as_bytes(), dir.path(), "fi").expect("scatter");
    let lexelt = dir.path().join("ystävä.n.xml");
    assert!(lexelt.exists(), "{:?}", fs::read_dir(dir.path()).map(|d| d.count()));

    let mut gathered = Vec::new();
    let mut gathered_keys = Vec::new();
    assert_eq!(gather(dir.path(), &mut gathered, &mut gathered_keys, "fi").expect("gather"), 1);

    let tagger = TableTagger::from_rows(
        "Ystävä\tystävä\tNOUN\ntuli\ttulla\tVERB\nystäväni\tystävä\tNOUN\nHyvä\thyvä\tADJ\n",
    )
    .expect("tagger");
    let mut tagged = Vec::new();
    assert_eq!(pos_tag(gathered.as_slice(), &mut tagged, &tagger).expect("pos tag"), 2);
    let tagged = String::from_utf8(tagged).expect("utf-8");

    let start = tagged.find("<context>").expect("a context");
    let end = tagged[start..].find("</context>").expect("closed context") + start + "</context>".len();
    let context = Element::parse(&tagged[start..end]).expect("parse context");
    assert_eq!(
        context.elements().next().map(|el| el.name()),
        Some("head".to_string())
    );
    assert!(tagged.contains("<context><head>Ystävä/NOUN</head> tuli/VERB kotiin/X ./X</context>"));
    assert!(tagged.contains("<context>Hyvä/ADJ <head>ystäväni/NOUN</head> Alan/X ./X</context>"));
}

#[test]
fn light_verb_is_dropped_from_lemma_and_anchor() {
    let olla = SynsetId {
        pos: Pos::Verb,
        offset: 2_604_760,
    };
    let fin = vec![TabWordNet::from_entries("fin", [(olla, "olla")])];
    let wordnets = Wordnets::from_parts(fin, Vec::new(), None, LemmaCounts::default(), T2s::identity());

    let xml = r#"<corpus><sentence id="0"><text lang="fi">Hän ei ole täällä.</text><annotations><annotation lang="fi" anchor="ei ole" lemma="ei ole">02604760-v</annotation></annotations></sentence></corpus>"#;
    let mut out = Vec::new();
    let rec = reanchor(xml.as_bytes(), &mut out, &wordnets).expect("reanchor");
    assert_eq!(rec.get("reanchored"), 1);

    let out = String::from_utf8(out).expect("utf-8");
    let start = out.find("<sentence").expect("sentence kept");
    let end = out.find("</sentence>").expect("sentence closed") + "</sentence>".len();
    let doc = SentenceDoc::new(Element::parse(&out[start..end]).expect("parse sentence"));
    let anns = doc.annotations().expect("annotations");
    assert_eq!(anns.len(), 1);
    assert_eq!(anns[0].lemma, "ole");
    assert_eq!(anns[0].anchor, "ole");
}
