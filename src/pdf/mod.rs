mod layout;

use std::collections::HashSet;

use chrono::{Datelike, NaiveDateTime, Timelike};
use pdf_writer::{Content, Date, Filter, Name, Pdf, Rect, Ref, Str, TextStr};

use crate::config::Config;
use crate::error::Error;
use crate::fonts::{FontSet, register_font};
use crate::model::{Alignment, Block, FieldBlock, Span};

use layout::{LinkAnnotation, TextLine, build_lines, field_runs, render_lines};

/// ISO A4 in points.
pub const A4_WIDTH: f32 = 595.2756;
pub const A4_HEIGHT: f32 = 841.8898;

const MARGIN: f32 = 72.0;

const TITLE_SIZE: f32 = 18.0;
const TITLE_LEADING: f32 = 22.0;
const BODY_SIZE: f32 = 10.0;
const BODY_LEADING: f32 = 12.0;
const FOOTER_SIZE: f32 = 8.0;
const BLOCK_SPACING: f32 = 12.0;
const GROUP_PADDING: f32 = 6.0;
const GROUP_FIELD_GAP: f32 = 4.0;

#[derive(Clone, Copy, Debug)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width: A4_WIDTH,
            height: A4_HEIGHT,
            margin_top: MARGIN,
            margin_bottom: MARGIN,
            margin_left: MARGIN,
            margin_right: MARGIN,
        }
    }
}

impl PageGeometry {
    fn text_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    fn content_top(&self) -> f32 {
        self.height - self.margin_top
    }

    fn content_height(&self) -> f32 {
        self.height - self.margin_top - self.margin_bottom
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageFooter {
    /// `printed at: {timestamp}`
    pub left: String,
    /// `{page}/{total}`
    pub right: String,
}

/// One record rendered to PDF bytes.
#[derive(Clone, Debug)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub footers: Vec<PageFooter>,
    pub title: String,
    pub printed_at: String,
}

/// Renderer lifecycle. Each phase is entered exactly once, in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    LayingOut,
    CountKnown,
    Finalizing,
    Done,
}

impl Phase {
    fn next(self) -> Option<Phase> {
        match self {
            Phase::LayingOut => Some(Phase::CountKnown),
            Phase::CountKnown => Some(Phase::Finalizing),
            Phase::Finalizing => Some(Phase::Done),
            Phase::Done => None,
        }
    }
}

/// Drawing state of one page, kept open until its footer is known.
struct RecordedPage {
    content: Content,
    links: Vec<LinkAnnotation>,
}

impl RecordedPage {
    fn new() -> Self {
        Self {
            content: Content::new(),
            links: Vec::new(),
        }
    }
}

struct FinishedPage {
    content: Vec<u8>,
    links: Vec<LinkAnnotation>,
}

/// A block with its lines already broken, so its height is known before placement.
enum Measured {
    Title(Vec<TextLine>),
    Field(Vec<TextLine>, Alignment),
    Group(Vec<Vec<TextLine>>),
}

impl Measured {
    fn height(&self) -> f32 {
        match self {
            Measured::Title(lines) => lines.len() as f32 * TITLE_LEADING,
            Measured::Field(lines, _) => lines.len() as f32 * BODY_LEADING,
            Measured::Group(fields) => {
                let body: f32 = fields.iter().map(|l| l.len() as f32 * BODY_LEADING).sum();
                let gaps = fields.len().saturating_sub(1) as f32 * GROUP_FIELD_GAP;
                body + gaps + 2.0 * GROUP_PADDING
            }
        }
    }
}

fn measure(block: &Block, fonts: &FontSet, text_width: f32) -> Measured {
    match block {
        Block::Title(text) => {
            let runs = [layout::Run {
                text: text.clone(),
                bold: true,
                link: None,
            }];
            Measured::Title(build_lines(&runs, fonts, TITLE_SIZE, text_width))
        }
        Block::Field(field) => {
            // unlabeled reference lines stay ragged-right
            let alignment = if field.label.is_some() {
                Alignment::Justify
            } else {
                Alignment::Left
            };
            let lines = build_lines(&field_runs(field), fonts, BODY_SIZE, text_width);
            Measured::Field(lines, alignment)
        }
        Block::Group(fields) => {
            let inner = text_width - 2.0 * GROUP_PADDING;
            Measured::Group(
                fields
                    .iter()
                    .map(|f| build_lines(&field_runs(f), fonts, BODY_SIZE, inner))
                    .collect(),
            )
        }
    }
}

/// First baseline for text whose line box starts at `top`.
fn first_baseline(top: f32, font_size: f32, leading: f32, ascender_ratio: f32) -> f32 {
    top - (leading - font_size) / 2.0 - font_size * ascender_ratio
}

/// Two-pass page builder: blocks are flowed onto recorded pages first; footers
/// are stamped only after the final page count is known.
struct Paginator<'a> {
    phase: Phase,
    fonts: &'a FontSet,
    geometry: PageGeometry,
    pages: Vec<RecordedPage>,
    current: RecordedPage,
    cursor_y: f32,
    page_empty: bool,
}

impl<'a> Paginator<'a> {
    fn new(fonts: &'a FontSet, geometry: PageGeometry) -> Self {
        Self {
            phase: Phase::LayingOut,
            fonts,
            geometry,
            pages: Vec::new(),
            current: RecordedPage::new(),
            cursor_y: geometry.content_top(),
            page_empty: true,
        }
    }

    fn advance(&mut self, to: Phase) -> Result<(), Error> {
        if self.phase.next() != Some(to) {
            return Err(Error::Render(format!(
                "invalid transition {:?} -> {to:?}",
                self.phase
            )));
        }
        log::trace!("paginator: {:?} -> {to:?}", self.phase);
        self.phase = to;
        Ok(())
    }

    fn expect(&self, phase: Phase) -> Result<(), Error> {
        if self.phase != phase {
            return Err(Error::Render(format!(
                "expected phase {phase:?}, found {:?}",
                self.phase
            )));
        }
        Ok(())
    }

    fn break_page(&mut self) {
        let full = std::mem::replace(&mut self.current, RecordedPage::new());
        self.pages.push(full);
        self.cursor_y = self.geometry.content_top();
        self.page_empty = true;
    }

    /// Place one block, starting a new page when it does not fit on this one.
    /// Blocks are never split; a block taller than a whole page is an error.
    fn place(&mut self, block: &Measured) -> Result<(), Error> {
        self.expect(Phase::LayingOut)?;
        let height = block.height();
        let available = self.geometry.content_height();
        if height > available {
            return Err(Error::LayoutImpossible { height, available });
        }
        if !self.page_empty && self.cursor_y - height < self.geometry.margin_bottom {
            self.break_page();
        }

        let top = self.cursor_y;
        self.draw(block, top);
        self.cursor_y = top - height - BLOCK_SPACING;
        self.page_empty = false;
        Ok(())
    }

    fn draw(&mut self, block: &Measured, top: f32) {
        let g = self.geometry;
        let fonts = self.fonts;
        let page = &mut self.current;
        match block {
            Measured::Title(lines) => {
                let baseline = first_baseline(
                    top,
                    TITLE_SIZE,
                    TITLE_LEADING,
                    fonts.bold.ascender_ratio(),
                );
                render_lines(
                    &mut page.content,
                    lines,
                    Alignment::Center,
                    g.margin_left,
                    g.text_width(),
                    baseline,
                    TITLE_LEADING,
                    TITLE_SIZE,
                    fonts,
                    &mut page.links,
                );
            }
            Measured::Field(lines, alignment) => {
                let baseline = first_baseline(
                    top,
                    BODY_SIZE,
                    BODY_LEADING,
                    fonts.regular.ascender_ratio(),
                );
                render_lines(
                    &mut page.content,
                    lines,
                    *alignment,
                    g.margin_left,
                    g.text_width(),
                    baseline,
                    BODY_LEADING,
                    BODY_SIZE,
                    fonts,
                    &mut page.links,
                );
            }
            Measured::Group(fields) => {
                let height = block.height();
                page.content.save_state();
                page.content.set_stroke_gray(0.6);
                page.content.set_line_width(0.75);
                page.content
                    .rect(g.margin_left, top - height, g.text_width(), height)
                    .stroke();
                page.content.restore_state();

                let mut field_top = top - GROUP_PADDING;
                for lines in fields {
                    let baseline = first_baseline(
                        field_top,
                        BODY_SIZE,
                        BODY_LEADING,
                        fonts.regular.ascender_ratio(),
                    );
                    render_lines(
                        &mut page.content,
                        lines,
                        Alignment::Justify,
                        g.margin_left + GROUP_PADDING,
                        g.text_width() - 2.0 * GROUP_PADDING,
                        baseline,
                        BODY_LEADING,
                        BODY_SIZE,
                        fonts,
                        &mut page.links,
                    );
                    field_top -= lines.len() as f32 * BODY_LEADING + GROUP_FIELD_GAP;
                }
            }
        }
    }

    /// Close the last page; the page count is final from here on.
    fn finish_layout(&mut self) -> Result<usize, Error> {
        self.expect(Phase::LayingOut)?;
        let last = std::mem::replace(&mut self.current, RecordedPage::new());
        self.pages.push(last);
        self.advance(Phase::CountKnown)?;
        Ok(self.pages.len())
    }

    /// Replay every recorded page in order, stamp its footer, and finish its stream.
    fn finalize(
        &mut self,
        footer_label: &str,
        printed_at: &str,
    ) -> Result<(Vec<FinishedPage>, Vec<PageFooter>), Error> {
        self.expect(Phase::CountKnown)?;
        let total = self.pages.len();
        self.advance(Phase::Finalizing)?;

        let mut finished = Vec::with_capacity(total);
        let mut footers = Vec::with_capacity(total);
        for (idx, mut page) in std::mem::take(&mut self.pages).into_iter().enumerate() {
            let footer = PageFooter {
                left: format!("{footer_label} {printed_at}"),
                right: format!("{}/{}", idx + 1, total),
            };
            self.stamp_footer(&mut page.content, &footer);
            finished.push(FinishedPage {
                content: page.content.finish().as_slice().to_vec(),
                links: page.links,
            });
            footers.push(footer);
        }

        self.advance(Phase::Done)?;
        Ok((finished, footers))
    }

    fn stamp_footer(&self, content: &mut Content, footer: &PageFooter) {
        let g = self.geometry;
        let font = &self.fonts.regular;
        let baseline = g.margin_bottom / 2.0;
        let right_w = font.word_width(&footer.right, FOOTER_SIZE);
        let right_x = g.margin_left + g.text_width() - right_w;

        content.set_fill_gray(0.0);
        content.begin_text();
        content.set_font(Name(font.pdf_name.as_bytes()), FOOTER_SIZE);
        content.next_line(g.margin_left, baseline);
        content.show(Str(&font.encode(&footer.left)));
        content.next_line(right_x - g.margin_left, 0.0);
        content.show(Str(&font.encode(&footer.right)));
        content.end_text();
    }
}

/// Every char the document may draw, for font subsetting.
fn used_chars(blocks: &[Block], config: &Config, printed_at: &str) -> HashSet<char> {
    fn field_chars(field: &FieldBlock, out: &mut HashSet<char>) {
        if let Some(label) = &field.label {
            out.extend(label.chars());
            out.insert(':');
        }
        for span in &field.spans {
            match span {
                Span::Text(t) => out.extend(t.chars()),
                Span::Link { label, .. } => out.extend(label.chars()),
            }
        }
    }

    let mut chars: HashSet<char> = HashSet::new();
    for block in blocks {
        match block {
            Block::Title(t) => chars.extend(t.chars()),
            Block::Field(f) => field_chars(f, &mut chars),
            Block::Group(fields) => fields.iter().for_each(|f| field_chars(f, &mut chars)),
        }
    }
    chars.extend(config.footer_label.chars());
    chars.extend(printed_at.chars());
    chars.extend('0'..='9');
    chars.extend(['/', ' ', '?']);
    chars.retain(|c| !c.is_control());
    chars
}

fn pdf_date(dt: &NaiveDateTime) -> Date {
    Date::new(dt.year().clamp(0, 9999) as u16)
        .month(dt.month() as u8)
        .day(dt.day() as u8)
        .hour(dt.hour() as u8)
        .minute(dt.minute() as u8)
        .second(dt.second() as u8)
}

/// Render composed blocks into a paginated A4 PDF with a
/// `printed at: … | page/total` footer on every page.
pub fn render(blocks: &[Block], config: &Config, now: NaiveDateTime) -> Result<RenderedDocument, Error> {
    render_with_geometry(blocks, config, now, PageGeometry::default())
}

pub fn render_with_geometry(
    blocks: &[Block],
    config: &Config,
    now: NaiveDateTime,
    geometry: PageGeometry,
) -> Result<RenderedDocument, Error> {
    config.validate()?;
    let t0 = std::time::Instant::now();
    let printed_at = now.format(&config.timestamp_format).to_string();

    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let info_id = alloc();

    // Phase 1: fonts
    let chars = used_chars(blocks, config, &printed_at);
    let fonts = FontSet {
        regular: register_font(
            &mut pdf,
            config.fonts.regular.as_deref(),
            false,
            "F1".to_string(),
            &mut alloc,
            &chars,
        ),
        bold: register_font(
            &mut pdf,
            config.fonts.bold.as_deref().or(config.fonts.regular.as_deref()),
            true,
            "F2".to_string(),
            &mut alloc,
            &chars,
        ),
    };
    let t_fonts = t0.elapsed();

    // Phase 2: layout pass, then footers once the count is known
    let mut paginator = Paginator::new(&fonts, geometry);
    for block in blocks {
        let measured = measure(block, &fonts, geometry.text_width());
        paginator.place(&measured)?;
    }
    let total = paginator.finish_layout()?;
    let (pages, footers) = paginator.finalize(&config.footer_label, &printed_at)?;
    debug_assert_eq!(pages.len(), total);
    let t_layout = t0.elapsed();

    // Phase 3: assemble objects now that page count is known
    let n = pages.len();
    let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();

    let page_annot_refs: Vec<Vec<Ref>> = pages
        .iter()
        .map(|page| {
            page.links
                .iter()
                .map(|link| {
                    let annot_ref = alloc();
                    let mut annot = pdf.annotation(annot_ref);
                    annot
                        .subtype(pdf_writer::types::AnnotationType::Link)
                        .rect(link.rect)
                        .border(0.0, 0.0, 0.0, None);
                    annot
                        .action()
                        .action_type(pdf_writer::types::ActionType::Uri)
                        .uri(Str(link.url.as_bytes()));
                    annot_ref
                })
                .collect()
        })
        .collect();

    for (i, page) in pages.iter().enumerate() {
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&page.content, 6);
        pdf.stream(content_ids[i], &compressed).filter(Filter::FlateDecode);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(n as i32);

    for i in 0..n {
        let mut page = pdf.page(page_ids[i]);
        page.media_box(Rect::new(0.0, 0.0, geometry.width, geometry.height))
            .parent(pages_id)
            .contents(content_ids[i]);
        if !page_annot_refs[i].is_empty() {
            page.annotations(page_annot_refs[i].iter().copied());
        }
        let mut resources = page.resources();
        let mut font_dict = resources.fonts();
        for entry in fonts.entries() {
            font_dict.pair(Name(entry.pdf_name.as_bytes()), entry.font_ref);
        }
    }

    pdf.document_info(info_id)
        .title(TextStr(&config.title))
        .author(TextStr(&config.author))
        .creator(TextStr(concat!("xlsxide-pdf ", env!("CARGO_PKG_VERSION"))))
        .creation_date(pdf_date(&now));

    let bytes = pdf.finish();
    let t_total = t0.elapsed();

    log::debug!(
        "Render phases: fonts={:.1}ms, layout={:.1}ms, assembly={:.1}ms ({} page(s), {} bytes)",
        t_fonts.as_secs_f64() * 1000.0,
        (t_layout - t_fonts).as_secs_f64() * 1000.0,
        (t_total - t_layout).as_secs_f64() * 1000.0,
        n,
        bytes.len(),
    );

    Ok(RenderedDocument {
        bytes,
        page_count: n,
        footers,
        title: config.title.clone(),
        printed_at,
    })
}
