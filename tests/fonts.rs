mod common;

use std::path::{Path, PathBuf};

use common::{contains, fixed_now};
use xlsxide_pdf::{Config, FontConfig, Record, render_record};

fn fixture_font() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/fonts/DejaVuSansMono.ttf")
}

fn record() -> Record {
    [("Name", "Ωmega Ação"), ("Site", "see https://example.com")]
        .into_iter()
        .collect()
}

fn with_fonts(fonts: FontConfig) -> Config {
    Config {
        fonts,
        ..Config::default()
    }
}

#[test]
fn missing_font_falls_back_to_helvetica() {
    let _ = env_logger::try_init();
    let config = with_fonts(FontConfig {
        regular: Some(PathBuf::from("/nonexistent/xlsxide/NoSuchFont.ttf")),
        bold: None,
    });
    let doc = render_record(&record(), &config, fixed_now()).unwrap();
    assert!(doc.bytes.starts_with(b"%PDF-"));
    assert_eq!(doc.page_count, 1);
    assert!(contains(&doc.bytes, "/BaseFont /Helvetica"));
    assert!(contains(&doc.bytes, "/BaseFont /Helvetica-Bold"));
    assert!(!contains(&doc.bytes, "/Identity-H"));
}

#[test]
fn truetype_font_is_embedded_as_type0() {
    let _ = env_logger::try_init();
    let font = fixture_font();
    assert!(font.is_file(), "missing fixture {}", font.display());

    let config = with_fonts(FontConfig {
        regular: Some(font),
        bold: None,
    });
    let doc = render_record(&record(), &config, fixed_now()).unwrap();
    assert_eq!(doc.page_count, 1);
    assert_eq!(doc.footers[0].right, "1/1");

    // both faces come from the same file when no bold font is given
    assert!(contains(&doc.bytes, "/Subtype /Type0"));
    assert!(contains(&doc.bytes, "/Identity-H"));
    assert!(contains(&doc.bytes, "/ToUnicode"));
    assert!(contains(&doc.bytes, "/FontFile2"));
    assert!(!contains(&doc.bytes, "/Helvetica"));
}
