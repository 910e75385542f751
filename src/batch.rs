use std::collections::HashSet;
use std::io::{Seek, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDateTime;
use zip::write::SimpleFileOptions;

use crate::compose::compose;
use crate::config::Config;
use crate::error::Error;
use crate::model::Record;
use crate::pdf::{RenderedDocument, render};

/// What to do when one record cannot be rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop the batch and return the record's error.
    #[default]
    Abort,
    /// Log, remember the failure, and continue with the next record.
    Skip,
}

#[derive(Clone, Debug)]
pub struct ArchiveEntry {
    /// `{sanitized-name}.pdf`, unique within the archive.
    pub file_name: String,
    pub record_index: usize,
    pub page_count: usize,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug)]
pub struct SkippedRecord {
    pub record_index: usize,
    pub name: String,
    pub error: Error,
}

/// Rendered documents of one batch, in record order.
#[derive(Debug, Default)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
    skipped: Vec<SkippedRecord>,
}

impl Archive {
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn get(&self, file_name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.file_name == file_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }

    /// Write every entry into a Deflate-compressed ZIP.
    pub fn write_zip<W: Write + Seek>(&self, writer: W) -> Result<W, Error> {
        let mut zip = zip::ZipWriter::new(writer);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for entry in &self.entries {
            zip.start_file(entry.file_name.as_str(), options)?;
            zip.write_all(&entry.bytes)?;
        }
        Ok(zip.finish()?)
    }

    pub fn to_zip(&self) -> Result<Vec<u8>, Error> {
        Ok(self.write_zip(std::io::Cursor::new(Vec::new()))?.into_inner())
    }

    /// Write each PDF as its own file under `dir`.
    pub fn write_dir(&self, dir: &Path) -> Result<(), Error> {
        std::fs::create_dir_all(dir)?;
        for entry in &self.entries {
            let path = dir.join(&entry.file_name);
            std::fs::write(&path, &entry.bytes).map_err(|e| {
                Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())))
            })?;
        }
        Ok(())
    }
}

/// Trim, then `/` and `\` → `-`, whitespace → `_`.
pub fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Unsanitized file stem: the first non-empty candidate name field, else
/// `{fallback_prefix}{index + 1}`.
pub fn output_stem(record: &Record, index: usize, config: &Config) -> String {
    config
        .name_fields
        .iter()
        .find_map(|field| record.get(field).and_then(|v| v.non_empty()))
        .unwrap_or_else(|| format!("{}{}", config.fallback_prefix, index + 1))
}

/// `{stem}.pdf`, or `{stem}_2.pdf`, `{stem}_3.pdf`, … when already taken.
fn unique_file_name(stem: &str, taken: &mut HashSet<String>) -> String {
    let first = format!("{stem}.pdf");
    if taken.insert(first.clone()) {
        return first;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{stem}_{n}.pdf");
        if taken.insert(candidate.clone()) {
            log::warn!("name collision: {first} already used, writing {candidate}");
            return candidate;
        }
        n += 1;
    }
}

/// Compose and render one record.
pub fn render_record(record: &Record, config: &Config, now: NaiveDateTime) -> Result<RenderedDocument, Error> {
    let blocks = compose(record, config);
    render(&blocks, config, now)
}

/// Render every record in order into an archive, stamping `now` in each footer.
pub fn build_archive_at(
    records: &[Record],
    config: &Config,
    policy: ErrorPolicy,
    now: NaiveDateTime,
) -> Result<Archive, Error> {
    config.validate()?;
    let t0 = std::time::Instant::now();
    let mut archive = Archive::default();
    let mut taken: HashSet<String> = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        let stem = sanitize(&output_stem(record, index, config));
        match render_record(record, config, now) {
            Ok(doc) => {
                let file_name = unique_file_name(&stem, &mut taken);
                log::debug!("{file_name}: {} page(s)", doc.page_count);
                archive.entries.push(ArchiveEntry {
                    file_name,
                    record_index: index,
                    page_count: doc.page_count,
                    bytes: Arc::from(doc.bytes),
                });
            }
            Err(e) => {
                let e = e.in_record(index, &stem);
                match policy {
                    ErrorPolicy::Abort => return Err(e),
                    ErrorPolicy::Skip => {
                        log::warn!("skipping: {e}");
                        archive.skipped.push(SkippedRecord {
                            record_index: index,
                            name: stem,
                            error: e,
                        });
                    }
                }
            }
        }
    }

    log::info!(
        "Batch: {} document(s), {} skipped in {:.1}ms",
        archive.entries.len(),
        archive.skipped.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(archive)
}

/// [`build_archive_at`] with the local wall clock.
pub fn build_archive(records: &[Record], config: &Config, policy: ErrorPolicy) -> Result<Archive, Error> {
    build_archive_at(records, config, policy, chrono::Local::now().naive_local())
}
