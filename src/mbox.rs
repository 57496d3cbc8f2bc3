//! The archive handle and the parse pipeline.
//!
//! `parse` wires the pieces together: plan nominal regions, align them on
//! the I/O pool, then let each I/O worker frame its region while a second
//! pool of parser workers turns raw messages into records. A region that
//! dies on a read error takes only its own messages with it.

use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;

use crate::io::ReadAt;
use crate::message::{record_from_raw, MessageRecord};
use crate::pool::WorkerPool;
use crate::region::{align_region, nominal_regions, seal_regions, Region, RegionFramer};

/// Read handle on one mbox archive.
pub struct Mbox {
    source: Arc<dyn ReadAt>,
    file_size: u64,
}

impl Mbox {
    /// Open an archive for reading and record its size.
    pub fn open_read(path: &Path) -> Result<Mbox> {
        let file = File::open(path)
            .with_context(|| format!("failed to open mbox {}", path.display()))?;
        let file_size = file
            .metadata()
            .with_context(|| format!("failed to stat mbox {}", path.display()))?
            .len();

        Ok(Mbox {
            source: Arc::new(file),
            file_size,
        })
    }

    /// An archive backed by any positional source; tests hand in byte
    /// vectors.
    pub fn from_source(source: Arc<dyn ReadAt>, file_size: u64) -> Mbox {
        Mbox { source, file_size }
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Align every nominal region start to a message boundary, in parallel,
    /// then fix ends and drop collapsed regions.
    fn plan_regions(&self, io_pool: &WorkerPool, count: usize) -> Vec<Region> {
        let (tx, rx) = unbounded();

        for mut region in nominal_regions(self.file_size, count) {
            let source = Arc::clone(&self.source);
            let tx = tx.clone();
            io_pool.enqueue(move || {
                if let Err(err) = align_region(&*source, &mut region) {
                    region.err = Some(err);
                }
                let _ = tx.send(region);
            });
        }
        drop(tx);

        let aligned: Vec<Region> = rx.iter().collect();
        seal_regions(aligned, self.file_size)
    }

    /// Run the full pipeline and return one record per message found.
    ///
    /// `thread_count` is split evenly between framing and parsing workers.
    /// Record order is whatever the workers produced; sort by start, date,
    /// or sender as needed. A region that fails mid-flight contributes the
    /// records it emitted before dying.
    pub fn parse(&self, thread_count: usize) -> Vec<MessageRecord> {
        if self.file_size == 0 {
            return Vec::new();
        }

        let io_threads = (thread_count / 2).max(1);
        let parse_threads = (thread_count / 2).max(1);

        let io_pool = WorkerPool::new(io_threads);
        let parse_pool = WorkerPool::new(parse_threads);

        let regions = self.plan_regions(&io_pool, io_threads);
        let records: Arc<Mutex<Vec<MessageRecord>>> = Arc::new(Mutex::new(Vec::new()));

        for region in regions {
            let source = Arc::clone(&self.source);
            let parse_pool = parse_pool.clone();
            let records = Arc::clone(&records);

            io_pool.enqueue(move || {
                let mut framer = RegionFramer::new(source, region);
                while let Some(raw) = framer.next_message() {
                    let records = Arc::clone(&records);
                    parse_pool.enqueue(move || {
                        let record = record_from_raw(raw);
                        records.lock().unwrap().push(record);
                    });
                }
            });
        }

        io_pool.release();
        parse_pool.release();

        let result = std::mem::take(&mut *records.lock().unwrap());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::sort_by_start;

    const THREE_MESSAGES: &[u8] = b"From alice@example.com Fri Feb 24 15:13:20 +0000 2023\nFrom: Alice <alice@example.com>\nSubject: first\nDate: Mon, 27 Feb 2023 07:30:00 +0000\n\nbody one\n\nFrom bob@example.com Fri Feb 24 16:00:00 +0000 2023\nFrom: Bob <bob@example.com>\nSubject: second\n\nbody two\n\nFrom carol@example.com Fri Feb 24 17:00:00 +0000 2023\nFrom: Carol <carol@example.com>\nSubject: third\n\nbody three\n";

    fn parse_bytes(bytes: &[u8], threads: usize) -> Vec<MessageRecord> {
        let mbox = Mbox::from_source(Arc::new(bytes.to_vec()), bytes.len() as u64);
        let mut records = mbox.parse(threads);
        sort_by_start(&mut records);
        records
    }

    #[test]
    fn test_parse_three_messages() {
        let records = parse_bytes(THREE_MESSAGES, 4);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].subject.as_deref(), Some("first"));
        assert_eq!(records[1].subject.as_deref(), Some("second"));
        assert_eq!(records[2].subject.as_deref(), Some("third"));

        // Records tile the archive exactly.
        assert_eq!(records[0].start, 0);
        for pair in records.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(records[2].end, THREE_MESSAGES.len() as u64);
        for record in &records {
            assert_eq!(THREE_MESSAGES[record.start as usize], b'F');
        }
    }

    #[test]
    fn test_thread_count_invariance() {
        let baseline: Vec<(u64, u64)> = parse_bytes(THREE_MESSAGES, 1)
            .iter()
            .map(|r| (r.start, r.end))
            .collect();

        for threads in [2, 4, 8, 16] {
            let offsets: Vec<(u64, u64)> = parse_bytes(THREE_MESSAGES, threads)
                .iter()
                .map(|r| (r.start, r.end))
                .collect();
            assert_eq!(offsets, baseline, "threads {}", threads);
        }
    }

    #[test]
    fn test_parse_empty_archive() {
        let records = parse_bytes(b"", 4);
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_single_unterminated_message() {
        let source = b"From a b\nSubject: only\n\nno trailing newline";
        let records = parse_bytes(source, 8);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject.as_deref(), Some("only"));
        assert_eq!(records[0].end, source.len() as u64);
    }

    #[test]
    fn test_timestamps_flow_through() {
        let records = parse_bytes(THREE_MESSAGES, 2);
        // First record has a Date header, the others fall back to the
        // envelope line.
        assert_eq!(records[0].unix_timestamp, 1_677_483_000);
        assert_eq!(records[1].unix_timestamp, 1_677_254_400);
        assert_eq!(records[2].unix_timestamp, 1_677_258_000);
    }
}
