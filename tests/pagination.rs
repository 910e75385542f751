mod common;

use common::{fixed_now, page_texts};
use xlsxide_pdf::{
    Block, Config, Error, FieldBlock, PageGeometry, Record, Span, render, render_record,
    render_with_geometry,
};

fn long_record(fields: usize) -> Record {
    let mut record = Record::new();
    record.push("Name", "Long project");
    for i in 0..fields {
        record.push(
            format!("Activity {i}"),
            "A fairly long description of the activity that wraps across more than one line \
             at the body font size used for field values in the generated document.",
        );
    }
    record
}

#[test]
fn every_footer_shows_the_final_total() {
    let _ = env_logger::try_init();
    let doc = render_record(&long_record(80), &Config::default(), fixed_now()).unwrap();
    assert!(doc.page_count >= 3, "got {} page(s)", doc.page_count);
    assert_eq!(doc.printed_at, "14/03/2026 09:26");

    let pages = page_texts(&doc.bytes);
    assert_eq!(pages.len(), doc.page_count);
    for (i, words) in pages.iter().enumerate() {
        let expected = format!("{}/{}", i + 1, doc.page_count);
        assert!(words.contains(&expected), "page {} lacks {expected:?}", i + 1);
        assert!(words.iter().any(|w| w == "printed at: 14/03/2026 09:26"));
        // no provisional totals anywhere
        assert!(!words.iter().any(|w| w.ends_with("/0") || w.ends_with("/?")));
    }
}

#[test]
fn empty_document_still_gets_one_footed_page() {
    let doc = render(&[], &Config::default(), fixed_now()).unwrap();
    assert_eq!(doc.page_count, 1);
    let pages = page_texts(&doc.bytes);
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0], ["printed at: 14/03/2026 09:26", "1/1"]);
}

#[test]
fn record_without_fields_renders_title_page() {
    let doc = render_record(&Record::new(), &Config::default(), fixed_now()).unwrap();
    assert_eq!(doc.page_count, 1);
    let pages = page_texts(&doc.bytes);
    assert_eq!(
        pages,
        [["Project", "Summary", "printed at: 14/03/2026 09:26", "1/1"]]
    );
}

#[test]
fn custom_footer_label_and_format() {
    let config = Config {
        footer_label: "impresso em:".into(),
        timestamp_format: "%Y-%m-%d".into(),
        ..Config::default()
    };
    let doc = render(&[Block::Title("T".into())], &config, fixed_now()).unwrap();
    assert_eq!(doc.footers[0].left, "impresso em: 2026-03-14");
    assert_eq!(doc.footers[0].right, "1/1");
}

#[test]
fn block_taller_than_a_page_is_rejected() {
    let huge = Block::Field(FieldBlock {
        label: Some("Abstract".into()),
        spans: vec![Span::Text("lorem ipsum dolor ".repeat(3000))],
    });
    let err = render(&[huge], &Config::default(), fixed_now()).unwrap_err();
    match err {
        Error::LayoutImpossible { height, available } => assert!(height > available),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn blocks_are_never_split_across_pages() {
    let geometry = PageGeometry {
        height: 300.0,
        ..PageGeometry::default()
    };
    let blocks: Vec<Block> = (0..10)
        .map(|i| {
            Block::Field(FieldBlock {
                label: Some(format!("F{i}")),
                spans: vec![Span::Text("one two three".into())],
            })
        })
        .collect();
    let doc = render_with_geometry(&blocks, &Config::default(), fixed_now(), geometry).unwrap();
    assert!(doc.page_count > 1);

    // each label and its value words land on the same page
    let pages = page_texts(&doc.bytes);
    let mut seen = 0;
    for words in &pages {
        for (i, w) in words.iter().enumerate() {
            if w.starts_with('F') && w.ends_with(':') {
                assert_eq!(&words[i + 1..i + 4], ["one", "two", "three"]);
                seen += 1;
            }
        }
    }
    assert_eq!(seen, 10);
}

#[test]
fn invalid_timestamp_format_is_a_config_error() {
    let config = Config {
        timestamp_format: "%Q".into(),
        ..Config::default()
    };
    assert!(matches!(
        render(&[], &config, fixed_now()),
        Err(Error::Config(_))
    ));
}
