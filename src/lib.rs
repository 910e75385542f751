mod batch;
mod compose;
mod config;
mod error;
mod fonts;
mod linker;
mod model;
mod normalize;
mod pdf;
mod xlsx;

pub use batch::{
    Archive, ArchiveEntry, ErrorPolicy, SkippedRecord, build_archive, build_archive_at,
    output_stem, render_record, sanitize,
};
pub use compose::compose;
pub use config::{CompositionMode, Config, FontConfig};
pub use error::Error;
pub use linker::{escape, link_spans, linkify, to_markup};
pub use model::{Block, FieldBlock, FieldGroup, Record, Span, Value};
pub use normalize::normalize;
pub use pdf::{A4_HEIGHT, A4_WIDTH, PageFooter, PageGeometry, RenderedDocument, render, render_with_geometry};

use std::io::Write;
use std::path::Path;
use std::time::Instant;

pub fn read_records(input: &Path) -> Result<Vec<Record>, Error> {
    xlsx::parse(input)
}

pub fn read_records_bytes(input: &[u8]) -> Result<Vec<Record>, Error> {
    xlsx::parse_bytes(input)
}

/// Read the workbook, render one PDF per row, and write them all into one ZIP.
/// The returned archive also gives access to each PDF individually.
pub fn convert_xlsx_to_zip(
    input: &Path,
    output: &Path,
    config: &Config,
    policy: ErrorPolicy,
) -> Result<Archive, Error> {
    let t0 = Instant::now();

    let records = xlsx::parse(input)?;
    let t_parse = t0.elapsed();

    let archive = build_archive(&records, config, policy)?;
    let t_render = t0.elapsed();

    let file = std::fs::File::create(output).map_err(|e| {
        Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", e, output.display())))
    })?;
    archive.write_zip(std::io::BufWriter::new(file))?.flush()?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, render={:.1}ms, zip={:.1}ms, total={:.1}ms ({} records, {} documents)",
        t_parse.as_secs_f64() * 1000.0,
        (t_render - t_parse).as_secs_f64() * 1000.0,
        (t_total - t_render).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        records.len(),
        archive.len(),
    );

    Ok(archive)
}
