use std::collections::HashSet;

use crate::config::{CompositionMode, Config};
use crate::linker::{escape, link_spans, to_markup};
use crate::model::{Block, FieldBlock, Record, Span};
use crate::normalize::normalize;

impl FieldBlock {
    /// Markup as the block renders it: `<b>label:</b> value`.
    pub fn markup(&self) -> String {
        match &self.label {
            Some(label) if self.spans.is_empty() => format!("<b>{}:</b>", escape(label)),
            Some(label) => format!("<b>{}:</b> {}", escape(label), to_markup(&self.spans)),
            None => to_markup(&self.spans),
        }
    }
}

/// Drops blocks whose markup was already emitted in this document.
struct Dedup {
    seen: HashSet<String>,
    dropped: usize,
}

impl Dedup {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            dropped: 0,
        }
    }

    fn admit(&mut self, key: String) -> bool {
        if self.seen.insert(key) {
            true
        } else {
            self.dropped += 1;
            false
        }
    }

    fn push_field(&mut self, out: &mut Vec<Block>, field: FieldBlock) {
        if self.admit(field.markup()) {
            out.push(Block::Field(field));
        }
    }
}

/// Blocks for one `label: value` entry. Reference-style labels become a
/// header plus one plain block per non-empty line; everything else is linked.
fn field_blocks(label: &str, value: &str, config: &Config) -> Vec<FieldBlock> {
    if config.is_reference_label(label) {
        let mut blocks = vec![FieldBlock {
            label: Some(label.to_string()),
            spans: Vec::new(),
        }];
        blocks.extend(
            value
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|line| FieldBlock {
                    label: None,
                    spans: vec![Span::Text(line.to_string())],
                }),
        );
        blocks
    } else {
        vec![FieldBlock {
            label: Some(label.to_string()),
            spans: link_spans(value, &config.link_label),
        }]
    }
}

/// Compose one record into layout blocks: the title first, then its fields.
pub fn compose(record: &Record, config: &Config) -> Vec<Block> {
    let mut blocks = vec![Block::Title(config.title.clone())];
    let mut dedup = Dedup::new();

    match &config.mode {
        CompositionMode::BaseName => {
            for group in normalize(record) {
                for (label, value) in group.entries() {
                    for field in field_blocks(label, value, config) {
                        dedup.push_field(&mut blocks, field);
                    }
                }
            }
        }
        CompositionMode::Sections { marker } => {
            compose_sections(record, marker, config, &mut dedup, &mut blocks);
        }
    }

    if dedup.dropped > 0 {
        log::debug!("compose: dropped {} duplicate block(s)", dedup.dropped);
    }
    blocks
}

fn compose_sections(
    record: &Record,
    marker: &str,
    config: &Config,
    dedup: &mut Dedup,
    blocks: &mut Vec<Block>,
) {
    let marker = marker.trim().to_lowercase();
    let mut section: Option<Vec<FieldBlock>> = None;

    let flush = |section: &mut Option<Vec<FieldBlock>>, dedup: &mut Dedup, blocks: &mut Vec<Block>| {
        if let Some(fields) = section.take()
            && !fields.is_empty()
        {
            let key: String = fields.iter().map(|f| f.markup() + "\n").collect();
            if dedup.admit(key) {
                blocks.push(Block::Group(fields));
            }
        }
    };

    for (name, value) in record.fields() {
        let label = name.trim();
        if label.to_lowercase().starts_with(&marker) {
            flush(&mut section, dedup, blocks);
            section = Some(Vec::new());
        }
        let Some(text) = value.non_empty() else {
            continue;
        };
        let fields = field_blocks(label, &text, config);
        match section.as_mut() {
            Some(current) => current.extend(fields),
            None => {
                for field in fields {
                    dedup.push_field(blocks, field);
                }
            }
        }
    }
    flush(&mut section, dedup, blocks);
}
