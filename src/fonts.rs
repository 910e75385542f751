use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

pub(crate) struct FontEntry {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    /// WinAnsi widths for bytes 32..=255, in 1000-units.
    pub(crate) widths_1000: Vec<f32>,
    pub(crate) ascender_ratio: Option<f32>,
    pub(crate) char_to_gid: Option<HashMap<char, u16>>,
    pub(crate) char_widths_1000: Option<HashMap<char, f32>>,
}

impl FontEntry {
    /// Width of a single character in 1000-units. Embedded fonts use their
    /// per-char table; Helvetica falls back to WinAnsi (`?` for unmappable chars).
    pub(crate) fn char_width_1000(&self, ch: char) -> f32 {
        if let Some(ref map) = self.char_widths_1000 {
            return map.get(&ch).copied().unwrap_or(0.0);
        }
        let byte = winansi_byte(ch).unwrap_or(b'?');
        if byte >= 32 {
            self.widths_1000[(byte - 32) as usize]
        } else {
            0.0
        }
    }

    pub(crate) fn word_width(&self, word: &str, font_size: f32) -> f32 {
        word.chars()
            .map(|ch| self.char_width_1000(ch) * font_size / 1000.0)
            .sum()
    }

    pub(crate) fn space_width(&self, font_size: f32) -> f32 {
        self.char_width_1000(' ') * font_size / 1000.0
    }

    /// Bytes for a `Tj` string in this font's encoding.
    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match self.char_to_gid.as_ref() {
            Some(map) => encode_as_gids(text, map),
            None => to_winansi_bytes(text),
        }
    }

    pub(crate) fn ascender_ratio(&self) -> f32 {
        self.ascender_ratio.unwrap_or(0.75)
    }
}

/// The two faces a document uses.
pub(crate) struct FontSet {
    pub(crate) regular: FontEntry,
    pub(crate) bold: FontEntry,
}

impl FontSet {
    pub(crate) fn get(&self, bold: bool) -> &FontEntry {
        if bold { &self.bold } else { &self.regular }
    }

    pub(crate) fn entries(&self) -> [&FontEntry; 2] {
        [&self.regular, &self.bold]
    }
}

/// Windows-1252 (WinAnsi) byte to Unicode char mapping.
/// Bytes 0x80-0x9F are remapped; all others map directly to their Unicode codepoint.
fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => byte as char,
    }
}

/// WinAnsi byte for a printable char, `None` when the encoding has no slot for it.
fn winansi_byte(c: char) -> Option<u8> {
    match c as u32 {
        0x0020..=0x007E => Some(c as u8),
        0x00A0..=0x00FF => Some(c as u8),
        _ => (0x80u8..=0x9F).find(|&b| winansi_to_char(b) == c),
    }
}

/// WinAnsi bytes for text drawn in a base-14 font; unmappable chars become `?`.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .filter(|c| !c.is_control())
        .map(|c| winansi_byte(c).unwrap_or(b'?'))
        .collect()
}

/// Encode UTF-8 text as big-endian 2-byte glyph IDs for CIDFont content streams.
pub(crate) fn encode_as_gids(text: &str, char_to_gid: &HashMap<char, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        let gid = char_to_gid.get(&ch).copied().unwrap_or(0);
        out.push((gid >> 8) as u8);
        out.push((gid & 0xFF) as u8);
    }
    out
}

// Helvetica / Helvetica-Bold AFM widths for ASCII 32..=126.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Helvetica widths at 1000 units/em for WinAnsi bytes 32..=255. ASCII is exact;
/// the upper half is approximated from the unaccented base letters.
fn helvetica_widths(bold: bool) -> Vec<f32> {
    let ascii = if bold { &HELVETICA_BOLD_ASCII } else { &HELVETICA_ASCII };
    let (upper, lower) = if bold { (722.0, 611.0) } else { (667.0, 556.0) };
    (32u8..=255u8)
        .map(|b| match b {
            32..=126 => ascii[(b - 32) as usize] as f32,
            0x85 | 0x97 | 0xC6 => 1000.0,      // … — Æ
            0x91..=0x94 => 333.0,              // curly quotes
            0x95 => 350.0,                     // bullet
            0xA0 => 278.0,                     // nbsp
            0xCC..=0xCF | 0xEC..=0xEF => 278.0, // accented I / i
            0xD2..=0xD6 | 0xD8 => 778.0,       // accented O
            0xC0..=0xDF => upper,
            0xE0..=0xFF => lower,
            _ => 556.0,
        })
        .collect()
}

struct EmbeddedMetrics {
    ascender_ratio: f32,
    char_to_gid: HashMap<char, u16>,
    char_widths_1000: HashMap<char, f32>,
}

/// Embed a TrueType/OpenType font as a CIDFont (Type0 composite) with Identity-H encoding.
/// The font data is subsetted to only include glyphs used in the document.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    font_data: &[u8],
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<EmbeddedMetrics> {
    let face = Face::parse(font_data, 0).ok()?;
    let units = face.units_per_em() as f32;
    let to_1000 = |v: f32| v / units * 1000.0;

    let ps_name = face
        .names()
        .into_iter()
        .find(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME && n.is_unicode())
        .and_then(|n| n.to_string())
        .unwrap_or_else(|| "EmbeddedFont".to_string())
        .replace(' ', "");

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut char_to_gid = HashMap::new();
    let mut char_widths_1000 = HashMap::new();
    let mut gid_widths: Vec<(u16, f32)> = Vec::new();
    for &ch in used_chars {
        let Some(gid) = face.glyph_index(ch) else {
            log::warn!("{ps_name} has no glyph for {ch:?}");
            continue;
        };
        let new_gid = remapper.remap(gid.0);
        let w = face
            .glyph_hor_advance(gid)
            .map(|adv| to_1000(adv as f32))
            .unwrap_or(0.0);
        char_to_gid.insert(ch, new_gid);
        char_widths_1000.insert(ch, w);
        gid_widths.push((new_gid, w));
    }
    gid_widths.sort_by_key(|&(gid, _)| gid);
    gid_widths.dedup_by_key(|&mut (gid, _)| gid);

    let subset_data = subsetter::subset(font_data, 0, &remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {ps_name}: {e}; embedding the full font");
        font_data.to_vec()
    });

    let descriptor_ref = alloc();
    let data_ref = alloc();
    let cid_font_ref = alloc();
    let tounicode_ref = alloc();

    let data_len = i32::try_from(subset_data.len()).ok()?;
    pdf.stream(data_ref, &subset_data)
        .pair(Name(b"Length1"), data_len);

    let bb = face.global_bounding_box();
    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(Rect::new(
            to_1000(bb.x_min as f32),
            to_1000(bb.y_min as f32),
            to_1000(bb.x_max as f32),
            to_1000(bb.y_max as f32),
        ))
        .italic_angle(0.0)
        .ascent(to_1000(face.ascender() as f32))
        .descent(to_1000(face.descender() as f32))
        .cap_height(face.capital_height().map_or(700.0, |h| to_1000(h as f32)))
        .stem_v(80.0)
        .font_file2(data_ref);

    let system_info = || pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(ps_name.as_bytes()));
        cid.system_info(system_info());
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !gid_widths.is_empty() {
            let mut w = cid.widths();
            for &(gid, width) in &gid_widths {
                w.consecutive(gid, [width]);
            }
        }
    }

    let cmap_name = format!("{ps_name}-UTF16");
    let mut cmap = pdf_writer::types::UnicodeCmap::new(Name(cmap_name.as_bytes()), system_info());
    for (&ch, &new_gid) in &char_to_gid {
        cmap.pair(new_gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);

    Some(EmbeddedMetrics {
        ascender_ratio: face.ascender() as f32 / units,
        char_to_gid,
        char_widths_1000,
    })
}

fn map_font_file(path: &Path) -> std::io::Result<Mmap> {
    let file = File::open(path)?;
    // SAFETY: the mapping is read-only and dropped before this render returns.
    unsafe { Mmap::map(&file) }
}

/// Register one face: the TrueType file at `path` when given and loadable,
/// otherwise base-14 Helvetica (bold or regular).
pub(crate) fn register_font(
    pdf: &mut Pdf,
    path: Option<&Path>,
    bold: bool,
    pdf_name: String,
    alloc: &mut impl FnMut() -> Ref,
    used_chars: &HashSet<char>,
) -> FontEntry {
    let t0 = std::time::Instant::now();
    let font_ref = alloc();

    let embedded = path.and_then(|path| match map_font_file(path) {
        Ok(data) => {
            let metrics = embed_truetype(pdf, font_ref, &data, used_chars, alloc);
            if metrics.is_none() {
                log::warn!("Unusable font file {}, using Helvetica", path.display());
            }
            metrics
        }
        Err(e) => {
            log::warn!("Font not found: {}: {e}; using Helvetica", path.display());
            None
        }
    });

    let entry = match embedded {
        Some(m) => FontEntry {
            pdf_name,
            font_ref,
            widths_1000: helvetica_widths(bold),
            ascender_ratio: Some(m.ascender_ratio),
            char_to_gid: Some(m.char_to_gid),
            char_widths_1000: Some(m.char_widths_1000),
        },
        None => {
            let base: &[u8] = if bold { b"Helvetica-Bold" } else { b"Helvetica" };
            pdf.type1_font(font_ref)
                .base_font(Name(base))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
            FontEntry {
                pdf_name,
                font_ref,
                widths_1000: helvetica_widths(bold),
                ascender_ratio: None,
                char_to_gid: None,
                char_widths_1000: None,
            }
        }
    };

    log::debug!(
        "register_font: bold={bold} embedded={} → {:.1}ms",
        entry.char_to_gid.is_some(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    entry
}
