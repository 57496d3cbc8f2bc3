//! Sidecar index: persistence and parallel reload.
//!
//! The index is a plain ASCII file, one `"{start} {end}\n"` line per
//! message, sorted ascending by start. It is tiny next to the archive, so
//! loading slurps it whole, then groups consecutive entries into batches
//! that each fit one positional read; a worker turns each batch's slab back
//! into records without rescanning the archive.

use std::fs::File;
use std::fmt::Write as _;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};

use crate::buffer::ParseBuf;
use crate::config::{INDEX_FLUSH_SIZE, IO_READ_SIZE};
use crate::io::{read_range, ReadAt};
use crate::message::{build_record, sort_by_start, MessageRecord};
use crate::pool::WorkerPool;

/// One persisted `[start, end)` byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub start: u64,
    pub end: u64,
}

fn flush_at(file: &File, lines: &mut String, offset: &mut u64) -> Result<()> {
    file.write_all_at(lines.as_bytes(), *offset)
        .context("failed to write index block")?;
    file.sync_all().context("failed to fsync index")?;
    *offset += lines.len() as u64;
    lines.clear();
    Ok(())
}

/// Persist the records' offsets to `path`, sorting the records by start
/// first. An empty record list leaves a zero-byte file.
pub fn save_index(path: &Path, records: &mut [MessageRecord]) -> Result<()> {
    sort_by_start(records);

    let file = File::create(path)
        .with_context(|| format!("failed to create index file {}", path.display()))?;
    let mut lines = String::with_capacity(INDEX_FLUSH_SIZE * 2);
    let mut offset = 0u64;

    for record in records.iter() {
        let _ = writeln!(lines, "{} {}", record.start, record.end);
        if lines.len() >= INDEX_FLUSH_SIZE {
            flush_at(&file, &mut lines, &mut offset)?;
        }
    }

    if !lines.is_empty() {
        flush_at(&file, &mut lines, &mut offset)?;
    }
    Ok(())
}

/// Parse index bytes into entries.
pub fn parse_index_bytes(bytes: &[u8]) -> Result<Vec<IndexEntry>> {
    let text = std::str::from_utf8(bytes).context("index file is not ASCII")?;
    let mut entries = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let mut fields = line.splitn(2, ' ');
        let (start, end) = match (fields.next(), fields.next()) {
            (Some(start), Some(end)) => (start, end),
            _ => bail!("index line {} is malformed: {:?}", lineno + 1, line),
        };
        let start: u64 = start
            .parse()
            .with_context(|| format!("bad start offset on index line {}", lineno + 1))?;
        let end: u64 = end
            .trim_end()
            .parse()
            .with_context(|| format!("bad end offset on index line {}", lineno + 1))?;
        entries.push(IndexEntry { start, end });
    }

    Ok(entries)
}

/// Group consecutive entries into batches whose spanned bytes
/// (`last.end - first.start`) stay within `budget`. An entry larger than the
/// budget on its own gets a singleton batch.
pub fn group_batches(entries: &[IndexEntry], budget: u64) -> Vec<Vec<IndexEntry>> {
    let mut batches = Vec::new();
    let mut batch: Vec<IndexEntry> = Vec::new();

    for &entry in entries {
        if let Some(first) = batch.first() {
            if entry.end - first.start <= budget {
                batch.push(entry);
                continue;
            }
            batches.push(std::mem::take(&mut batch));
        }
        batch.push(entry);
    }

    if !batch.is_empty() {
        batches.push(batch);
    }
    batches
}

fn load_batch(source: &dyn ReadAt, batch: &[IndexEntry]) -> Result<Vec<MessageRecord>> {
    let (first, last) = match (batch.first(), batch.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Ok(Vec::new()),
    };
    let span = (last.end - first.start) as usize;

    let slab = read_range(source, first.start, span)
        .context("failed to read message batch from archive")?;

    let mut records = Vec::with_capacity(batch.len());
    for entry in batch {
        let from = (entry.start - first.start) as usize;
        let to = ((entry.end - first.start) as usize).min(slab.len());
        if from >= to {
            continue;
        }
        let mut buf = ParseBuf::from_bytes(&slab[from..to]);
        records.push(build_record(&mut buf, entry.start, entry.end));
    }
    Ok(records)
}

/// Rebuild the record list from a saved index, reading only the listed byte
/// ranges of the archive. Batched reads run on `threads` workers.
pub fn load_index(idx_path: &Path, mbox_path: &Path, threads: usize) -> Result<Vec<MessageRecord>> {
    let bytes = std::fs::read(idx_path)
        .with_context(|| format!("failed to read index file {}", idx_path.display()))?;
    let entries = parse_index_bytes(&bytes)?;
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let file = File::open(mbox_path)
        .with_context(|| format!("failed to open archive {}", mbox_path.display()))?;
    let source: Arc<dyn ReadAt> = Arc::new(file);

    let batches = group_batches(&entries, IO_READ_SIZE as u64);
    let records = Arc::new(Mutex::new(Vec::with_capacity(entries.len())));
    let pool = WorkerPool::new(threads);

    for batch in batches {
        let source = Arc::clone(&source);
        let records = Arc::clone(&records);
        pool.enqueue(move || {
            if let Ok(mut batch_records) = load_batch(&*source, &batch) {
                records.lock().unwrap().append(&mut batch_records);
            }
        });
    }

    pool.release();

    let records = std::mem::take(&mut *records.lock().unwrap());
    Ok(records)
}
