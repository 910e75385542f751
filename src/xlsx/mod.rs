use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};
use std::path::Path;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::Error;
use crate::model::{Record, Value};

const SML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const DEFAULT_SHEET: &str = "xl/worksheets/sheet1.xml";

fn sml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(SML_NS))
}

fn sml_children<'a>(
    node: roxmltree::Node<'a, 'a>,
    name: &'a str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'a>> + 'a {
    node.children()
        .filter(move |n| n.tag_name().name() == name && n.tag_name().namespace() == Some(SML_NS))
}

fn read_zip_text<R: Read + Seek>(zip: &mut zip::ZipArchive<R>, name: &str) -> Option<String> {
    let mut content = String::new();
    zip.by_name(name).ok()?.read_to_string(&mut content).ok()?;
    Some(content)
}

fn parse_rels_xml(xml_content: &str) -> HashMap<String, String> {
    let mut rels = HashMap::new();
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        return rels;
    };
    for node in xml.root_element().children() {
        if node.tag_name().name() == "Relationship"
            && let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target"))
        {
            rels.insert(id.to_string(), target.to_string());
        }
    }
    rels
}

/// Zip path of the first worksheet, following workbook.xml and its rels.
fn first_sheet_path<R: Read + Seek>(zip: &mut zip::ZipArchive<R>) -> String {
    let rel_id = read_zip_text(zip, "xl/workbook.xml").and_then(|text| {
        let xml = roxmltree::Document::parse(&text).ok()?;
        let sheets = sml(xml.root_element(), "sheets")?;
        let first = sml(sheets, "sheet")?;
        first.attribute((REL_NS, "id")).map(str::to_string)
    });
    let target = rel_id.and_then(|id| {
        let rels = parse_rels_xml(&read_zip_text(zip, "xl/_rels/workbook.xml.rels")?);
        rels.get(&id).cloned()
    });
    match target {
        Some(t) if t.starts_with('/') => t.trim_start_matches('/').to_string(),
        Some(t) => format!("xl/{t}"),
        None => DEFAULT_SHEET.to_string(),
    }
}

/// Text of an `<si>` / `<is>` node: plain `<t>` or the concatenated rich-text runs,
/// ignoring phonetic `<rPh>` hints.
fn string_item_text(node: roxmltree::Node) -> String {
    node.descendants()
        .filter(|n| n.tag_name().name() == "t")
        .filter(|n| {
            !n.ancestors()
                .any(|a| a.tag_name().name() == "rPh")
        })
        .filter_map(|n| n.text())
        .collect()
}

fn parse_shared_strings<R: Read + Seek>(zip: &mut zip::ZipArchive<R>) -> Result<Vec<String>, Error> {
    let Some(text) = read_zip_text(zip, "xl/sharedStrings.xml") else {
        return Ok(Vec::new());
    };
    let xml = roxmltree::Document::parse(&text)?;
    Ok(sml_children(xml.root_element(), "si")
        .map(string_item_text)
        .collect())
}

/// Last column Excel allows (`XFD`), zero-based.
const MAX_COLUMN: usize = 16_383;

/// Zero-based column index from a cell reference like `AB12`, `None` when the
/// reference has no column letters.
fn column_index(cell_ref: &str) -> Result<Option<usize>, Error> {
    let past_limit = || Error::InvalidXlsx(format!("cell reference {cell_ref:?} is past column XFD"));
    let mut idx = 0usize;
    let mut has_letters = false;
    for b in cell_ref.bytes().take_while(u8::is_ascii_alphabetic) {
        has_letters = true;
        idx = idx
            .checked_mul(26)
            .and_then(|i| i.checked_add((b.to_ascii_uppercase() - b'A' + 1) as usize))
            .filter(|&i| i <= MAX_COLUMN + 1)
            .ok_or_else(past_limit)?;
    }
    Ok(has_letters.then(|| idx - 1))
}

/// Built-in number format ids that display a date or time.
fn is_builtin_date_format(id: u32) -> bool {
    matches!(id, 14..=22 | 45..=47)
}

/// A custom format code displays a date or time when one of `d m y h s`
/// appears outside quoted text, `[...]` sections and escaped characters.
/// Only the first (positive) section is looked at.
fn is_date_format_code(code: &str) -> bool {
    let mut chars = code.chars();
    let mut in_quotes = false;
    let mut in_brackets = false;
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => in_brackets = true,
            ']' => in_brackets = false,
            _ if in_brackets => {}
            ';' => break,
            c if matches!(c.to_ascii_lowercase(), 'd' | 'm' | 'y' | 'h' | 's') => return true,
            _ => {}
        }
    }
    false
}

/// Which cell styles (`s="…"`) format numbers as dates, and the workbook's epoch.
#[derive(Debug, Default)]
struct DateStyles {
    date_xfs: Vec<bool>,
    date1904: bool,
}

impl DateStyles {
    fn is_date(&self, style: Option<&str>) -> bool {
        style
            .and_then(|s| s.trim().parse::<usize>().ok())
            .and_then(|i| self.date_xfs.get(i).copied())
            .unwrap_or(false)
    }

    /// Serial day number to a date/time, rounded to the second. `None` when
    /// the serial is negative or outside chrono's range.
    fn serial_value(&self, serial: f64) -> Option<Value> {
        let secs = (serial * 86_400.0).round();
        if !(0.0..9.0e15).contains(&secs) {
            return None;
        }
        let secs = secs as u64;
        let time = NaiveTime::from_num_seconds_from_midnight_opt((secs % 86_400) as u32, 0)?;
        let days = secs / 86_400;
        if days == 0 && !self.date1904 {
            return Some(Value::Time(time));
        }
        // 1899-12-30 absorbs the 1900 leap-year bug for every date from March 1900 on.
        let epoch = if self.date1904 {
            NaiveDate::from_ymd_opt(1904, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(1899, 12, 30)?
        };
        let date = epoch.checked_add_days(Days::new(days))?;
        Some(Value::DateTime(date.and_time(time)))
    }
}

fn parse_date_styles<R: Read + Seek>(zip: &mut zip::ZipArchive<R>) -> Result<DateStyles, Error> {
    let date1904 = read_zip_text(zip, "xl/workbook.xml")
        .and_then(|text| {
            let xml = roxmltree::Document::parse(&text).ok()?;
            let flag = sml(xml.root_element(), "workbookPr")?.attribute("date1904")?;
            Some(flag == "1" || flag.eq_ignore_ascii_case("true"))
        })
        .unwrap_or(false);

    let Some(text) = read_zip_text(zip, "xl/styles.xml") else {
        return Ok(DateStyles {
            date_xfs: Vec::new(),
            date1904,
        });
    };
    let xml = roxmltree::Document::parse(&text)?;
    let root = xml.root_element();

    let custom: HashMap<u32, bool> = sml(root, "numFmts")
        .into_iter()
        .flat_map(|fmts| sml_children(fmts, "numFmt"))
        .filter_map(|fmt| {
            let id = fmt.attribute("numFmtId")?.parse().ok()?;
            Some((id, is_date_format_code(fmt.attribute("formatCode")?)))
        })
        .collect();
    let date_xfs = sml(root, "cellXfs")
        .into_iter()
        .flat_map(|xfs| sml_children(xfs, "xf"))
        .map(|xf| {
            let id: u32 = xf
                .attribute("numFmtId")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            custom
                .get(&id)
                .copied()
                .unwrap_or_else(|| is_builtin_date_format(id))
        })
        .collect();

    Ok(DateStyles { date_xfs, date1904 })
}

/// `t="d"` cells hold ISO 8601 text.
fn iso_date_value(raw: &str) -> Value {
    let v = raw.trim();
    NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f")
        .map(Value::DateTime)
        .or_else(|_| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map(|d| Value::DateTime(d.and_time(NaiveTime::MIN)))
        })
        .or_else(|_| NaiveTime::parse_from_str(v, "%H:%M:%S%.f").map(Value::Time))
        .unwrap_or_else(|_| Value::Text(raw.to_string()))
}

fn cell_value(cell: roxmltree::Node, shared: &[String], styles: &DateStyles) -> Value {
    let raw = sml(cell, "v").and_then(|v| v.text());
    match cell.attribute("t").unwrap_or("n") {
        "s" => raw
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(|i| shared.get(i))
            .map_or(Value::Empty, |s| Value::Text(s.clone())),
        "inlineStr" => sml(cell, "is").map_or(Value::Empty, |is| Value::Text(string_item_text(is))),
        "str" => raw.map_or(Value::Empty, |v| Value::Text(v.to_string())),
        "b" => raw.map_or(Value::Empty, |v| Value::Bool(v.trim() == "1")),
        "d" => raw.map_or(Value::Empty, iso_date_value),
        "e" => Value::Empty,
        _ => match raw {
            Some(v) => match v.trim().parse::<f64>() {
                Ok(n) if styles.is_date(cell.attribute("s")) => {
                    styles.serial_value(n).unwrap_or(Value::Number(n))
                }
                Ok(n) => Value::Number(n),
                Err(_) => Value::Text(v.to_string()),
            },
            None => Value::Empty,
        },
    }
}

/// Header names with empty headers filled in and duplicates suffixed `.1`, `.2`, …
fn dedupe_headers(raw: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = raw.iter().map(|h| h.trim().to_string()).collect();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for (col, header) in raw.into_iter().enumerate() {
        let header = header.trim().to_string();
        let base = if header.is_empty() {
            format!("Unnamed: {col}")
        } else {
            header
        };
        if seen.insert(base.clone()) {
            out.push(base);
            continue;
        }
        let count = counts.entry(base.clone()).or_insert(0);
        let name = loop {
            *count += 1;
            let candidate = format!("{base}.{count}");
            if !used.contains(&candidate) {
                break candidate;
            }
        };
        used.insert(name.clone());
        seen.insert(name.clone());
        out.push(name);
    }
    out
}

fn parse_sheet(
    xml_content: &str,
    shared: &[String],
    styles: &DateStyles,
) -> Result<Vec<Record>, Error> {
    let xml = roxmltree::Document::parse(xml_content)?;
    let sheet_data = sml(xml.root_element(), "sheetData")
        .ok_or_else(|| Error::InvalidXlsx("worksheet has no sheetData".into()))?;

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for row in sml_children(sheet_data, "row") {
        let mut values: Vec<Value> = Vec::new();
        for cell in sml_children(row, "c") {
            let col = match cell.attribute("r") {
                Some(r) => column_index(r)?,
                None => None,
            }
            .unwrap_or(values.len());
            if col > MAX_COLUMN {
                return Err(Error::InvalidXlsx(format!(
                    "row has more than {} cells",
                    MAX_COLUMN + 1
                )));
            }
            if values.len() <= col {
                values.resize(col + 1, Value::Empty);
            }
            values[col] = cell_value(cell, shared, styles);
        }
        rows.push(values);
    }

    // Data may run past the last header cell; those columns get `Unnamed: N`.
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut rows = rows.into_iter();
    let Some(mut header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    header_row.resize(width, Value::Empty);
    let headers = dedupe_headers(header_row.iter().map(Value::display).collect());

    let records: Vec<Record> = rows
        .filter(|values| values.iter().any(|v| v.non_empty().is_some()))
        .map(|mut values| {
            values.resize(headers.len(), Value::Empty);
            headers.iter().cloned().zip(values).collect()
        })
        .collect();
    log::debug!("xlsx: {} column(s), {} record(s)", headers.len(), records.len());
    Ok(records)
}

fn parse_archive<R: Read + Seek>(reader: R) -> Result<Vec<Record>, Error> {
    let mut zip = zip::ZipArchive::new(reader)
        .map_err(|_| Error::InvalidXlsx("file is not a ZIP archive".into()))?;

    let shared = parse_shared_strings(&mut zip)?;
    let styles = parse_date_styles(&mut zip)?;
    let sheet_path = first_sheet_path(&mut zip);
    let sheet_xml = read_zip_text(&mut zip, &sheet_path).ok_or_else(|| {
        Error::InvalidXlsx(format!("missing {sheet_path} (is this an XLSX file?)"))
    })?;
    parse_sheet(&sheet_xml, &shared, &styles)
}

/// Read every data row of the first worksheet. The first row holds the headers.
pub fn parse(path: &Path) -> Result<Vec<Record>, Error> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => Error::Io(
            std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())),
        ),
        _ => Error::Io(e),
    })?;
    parse_archive(std::io::BufReader::new(file))
}

pub fn parse_bytes(data: &[u8]) -> Result<Vec<Record>, Error> {
    parse_archive(std::io::Cursor::new(data))
}
