use pdf_writer::{Content, Name, Rect, Str};

use crate::fonts::FontSet;
use crate::model::{Alignment, FieldBlock, Span};

const LINK_COLOR: [f32; 3] = [0.0, 0.0, 0.8];

/// A styled piece of text before line breaking.
pub(super) struct Run {
    pub(super) text: String,
    pub(super) bold: bool,
    pub(super) link: Option<String>,
}

impl Run {
    fn plain(text: impl Into<String>, bold: bool) -> Self {
        Self {
            text: text.into(),
            bold,
            link: None,
        }
    }
}

/// Runs for a field block: bold `label:` followed by the value spans.
pub(super) fn field_runs(field: &FieldBlock) -> Vec<Run> {
    let mut runs = Vec::with_capacity(field.spans.len() + 1);
    if let Some(label) = &field.label {
        runs.push(Run::plain(format!("{label}: "), true));
    }
    for span in &field.spans {
        runs.push(match span {
            Span::Text(t) => Run::plain(t.clone(), false),
            Span::Link { url, label } => Run {
                text: label.clone(),
                bold: false,
                link: Some(url.clone()),
            },
        });
    }
    runs
}

pub(super) struct WordChunk {
    pub(super) bold: bool,
    pub(super) text: String,
    pub(super) x_offset: f32, // x relative to line start
    pub(super) width: f32,
    pub(super) link: Option<String>,
    /// A space separates this chunk from the previous one on its line.
    pub(super) space_before: bool,
}

pub(super) struct LinkAnnotation {
    pub(super) rect: Rect,
    pub(super) url: String,
}

pub(super) struct TextLine {
    pub(super) chunks: Vec<WordChunk>,
    pub(super) total_width: f32,
}

fn finish_line(chunks: &mut Vec<WordChunk>) -> TextLine {
    let total_width = chunks.last().map(|c| c.x_offset + c.width).unwrap_or(0.0);
    TextLine {
        chunks: std::mem::take(chunks),
        total_width,
    }
}

/// Greedy word wrap of runs into lines no wider than `max_width`.
/// No space is inserted between runs unless one side of the boundary is
/// whitespace, so `link` + `).` stays `link).`.
pub(super) fn build_lines(
    runs: &[Run],
    fonts: &FontSet,
    font_size: f32,
    max_width: f32,
) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut current_chunks: Vec<WordChunk> = Vec::new();
    let mut current_x: f32 = 0.0;
    let mut prev_ended_with_ws = false;
    let mut prev_space_w: f32 = 0.0;

    for run in runs {
        let font = fonts.get(run.bold);
        let space_w = font.space_width(font_size);
        let starts_with_ws = run.text.starts_with(char::is_whitespace);

        for (i, word) in run.text.split_whitespace().enumerate() {
            let ww = font.word_width(word, font_size);

            let need_space =
                !current_chunks.is_empty() && (i > 0 || starts_with_ws || prev_ended_with_ws);
            // The space belongs to whichever run holds the whitespace char.
            let effective_space_w = if i > 0 || starts_with_ws {
                space_w
            } else {
                prev_space_w
            };
            let proposed_x = if need_space {
                current_x + effective_space_w
            } else {
                current_x
            };

            let mut space_before = need_space;
            if !current_chunks.is_empty() && proposed_x + ww > max_width {
                lines.push(finish_line(&mut current_chunks));
                current_x = 0.0;
                space_before = false;
            } else {
                current_x = proposed_x;
            }

            current_chunks.push(WordChunk {
                bold: run.bold,
                text: word.to_string(),
                x_offset: current_x,
                width: ww,
                link: run.link.clone(),
                space_before,
            });
            current_x += ww;
        }

        if !run.text.is_empty() {
            prev_ended_with_ws = run.text.ends_with(char::is_whitespace);
            prev_space_w = space_w;
        }
    }

    if !current_chunks.is_empty() {
        lines.push(finish_line(&mut current_chunks));
    }
    if lines.is_empty() {
        lines.push(TextLine {
            chunks: vec![],
            total_width: 0.0,
        });
    }
    lines
}

/// Absolute x of every chunk on a line. Justification spreads the slack over
/// the word gaps only; runs that touch (`link` + `).`) stay touching.
fn chunk_positions(
    line: &TextLine,
    alignment: Alignment,
    justify: bool,
    margin_left: f32,
    text_width: f32,
) -> Vec<f32> {
    let line_start_x = match alignment {
        Alignment::Center => margin_left + (text_width - line.total_width) / 2.0,
        Alignment::Left | Alignment::Justify => margin_left,
    };
    let gaps = line.chunks.iter().filter(|c| c.space_before).count();
    let extra_per_gap = if justify && gaps > 0 {
        (text_width - line.total_width).max(0.0) / gaps as f32
    } else {
        0.0
    };

    let mut gaps_seen = 0;
    line.chunks
        .iter()
        .map(|chunk| {
            if chunk.space_before {
                gaps_seen += 1;
            }
            line_start_x + chunk.x_offset + gaps_seen as f32 * extra_per_gap
        })
        .collect()
}

/// Draw pre-built lines. Justified lines spread the slack across word gaps,
/// except the block's last line. Link words are blue, underlined, and get a
/// URI annotation per line (adjacent words of one link share a rectangle).
pub(super) fn render_lines(
    content: &mut Content,
    lines: &[TextLine],
    alignment: Alignment,
    margin_left: f32,
    text_width: f32,
    first_baseline_y: f32,
    line_pitch: f32,
    font_size: f32,
    fonts: &FontSet,
    links: &mut Vec<LinkAnnotation>,
) {
    let last_line_idx = lines.len().saturating_sub(1);
    let mut in_link_color = false;

    for (line_num, line) in lines.iter().enumerate() {
        if line.chunks.is_empty() {
            continue;
        }
        let y = first_baseline_y - line_num as f32 * line_pitch;

        let justify = alignment == Alignment::Justify && line_num != last_line_idx;
        let xs = chunk_positions(line, alignment, justify, margin_left, text_width);

        let mut underlines: Vec<(f32, f32, f32)> = Vec::new();
        let mut cur_bold: Option<bool> = None;
        let mut td_x = 0.0_f32;
        let mut td_y = 0.0_f32;

        content.begin_text();
        for (chunk, &x) in line.chunks.iter().zip(&xs) {

            let is_link = chunk.link.is_some();
            if is_link != in_link_color {
                if is_link {
                    let [r, g, b] = LINK_COLOR;
                    content.set_fill_rgb(r, g, b);
                } else {
                    content.set_fill_gray(0.0);
                }
                in_link_color = is_link;
            }

            if cur_bold != Some(chunk.bold) {
                let font = fonts.get(chunk.bold);
                content.set_font(Name(font.pdf_name.as_bytes()), font_size);
                cur_bold = Some(chunk.bold);
            }

            content.next_line(x - td_x, y - td_y);
            td_x = x;
            td_y = y;
            content.show(Str(&fonts.get(chunk.bold).encode(&chunk.text)));

            if let Some(ref url) = chunk.link {
                let thick = (font_size * 0.05).max(0.5);
                underlines.push((x, y - font_size * 0.08 - thick, chunk.width));

                let bottom = y - font_size * 0.2;
                let top = y + font_size * 0.8;
                let merged = links
                    .last_mut()
                    .filter(|prev| prev.url == *url && (prev.rect.y1 - bottom).abs() < 1.0);
                if let Some(prev) = merged {
                    prev.rect.x2 = x + chunk.width;
                } else {
                    links.push(LinkAnnotation {
                        rect: Rect::new(x, bottom, x + chunk.width, top),
                        url: url.clone(),
                    });
                }
            }
        }
        content.end_text();

        if !underlines.is_empty() {
            let [r, g, b] = LINK_COLOR;
            content.set_fill_rgb(r, g, b);
            in_link_color = true;
            let thick = (font_size * 0.05).max(0.5);
            for &(ux, uy, uw) in &underlines {
                content.rect(ux, uy, uw, thick).fill_nonzero();
            }
        }
    }
    if in_link_color {
        content.set_fill_gray(0.0);
    }
}
