#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use chrono::{NaiveDate, NaiveDateTime};
use zip::write::SimpleFileOptions;

/// Fixed print time so footers are predictable.
pub fn fixed_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 14)
        .and_then(|d| d.and_hms_opt(9, 26, 53))
        .unwrap()
}

fn column_letters(mut idx: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn row_xml(row_num: usize, cells: &[&str]) -> String {
    let mut xml = format!(r#"<row r="{row_num}">"#);
    for (col, value) in cells.iter().enumerate() {
        if value.is_empty() {
            continue;
        }
        xml.push_str(&format!(
            r#"<c r="{}{row_num}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            column_letters(col),
            xml_escape(value)
        ));
    }
    xml.push_str("</row>");
    xml
}

/// Minimal single-sheet workbook with inline-string cells. Empty strings
/// leave the cell out entirely, the way spreadsheet apps save blanks.
pub fn workbook(headers: &[&str], rows: &[&[&str]]) -> Vec<u8> {
    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    sheet.push_str(&row_xml(1, headers));
    for (i, row) in rows.iter().enumerate() {
        sheet.push_str(&row_xml(i + 2, row));
    }
    sheet.push_str("</sheetData></worksheet>");

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    zip.start_file("xl/workbook.xml", opts).unwrap();
    zip.write_all(
        br#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Projetos" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
    )
    .unwrap();
    zip.start_file("xl/_rels/workbook.xml.rels", opts).unwrap();
    zip.write_all(
        br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
    )
    .unwrap();
    zip.start_file("xl/worksheets/sheet1.xml", opts).unwrap();
    zip.write_all(sheet.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

/// Inflated bytes of every FlateDecode stream in the file, in file order.
pub fn content_streams(pdf: &[u8]) -> Vec<Vec<u8>> {
    let mut streams = Vec::new();
    let mut pos = 0;
    while let Some(start) = find(&pdf[pos..], b"stream\n").map(|i| pos + i + 7) {
        let Some(end) = find(&pdf[start..], b"endstream").map(|i| start + i) else {
            break;
        };
        let raw = pdf[start..end].strip_suffix(b"\n").unwrap_or(&pdf[start..end]);
        if let Ok(data) = miniz_oxide::inflate::decompress_to_vec_zlib(raw) {
            streams.push(data);
        }
        pos = end + 9;
    }
    streams
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Strings passed to `Tj` in one content stream, in drawing order.
pub fn shown_strings(stream: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < stream.len() {
        if stream[i] != b'(' {
            i += 1;
            continue;
        }
        let mut bytes = Vec::new();
        let mut depth = 1;
        i += 1;
        while i < stream.len() {
            match stream[i] {
                b'\\' if i + 1 < stream.len() => {
                    i += 1;
                    bytes.push(match stream[i] {
                        b'n' => b'\n',
                        b'r' => b'\r',
                        b't' => b'\t',
                        other => other,
                    });
                }
                b'(' => {
                    depth += 1;
                    bytes.push(b'(');
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    bytes.push(b')');
                }
                b => bytes.push(b),
            }
            i += 1;
        }
        i += 1;
        let rest = &stream[i.min(stream.len())..];
        if rest.trim_ascii_start().starts_with(b"Tj") {
            out.push(bytes.iter().map(|&b| b as char).collect());
        }
    }
    out
}

/// Visible text of every page, one entry per page content stream.
pub fn page_texts(pdf: &[u8]) -> Vec<Vec<String>> {
    content_streams(pdf)
        .iter()
        .map(|s| shown_strings(s))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Names and contents of every entry of a ZIP, in archive order.
pub fn unzip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            (file.name().to_string(), data)
        })
        .collect()
}

pub fn contains(haystack: &[u8], needle: &str) -> bool {
    find(haystack, needle.as_bytes()).is_some()
}

pub fn count(haystack: &[u8], needle: &str) -> usize {
    haystack
        .windows(needle.len())
        .filter(|w| *w == needle.as_bytes())
        .count()
}
