//! mboxidx - Parallel mbox archive parser and offset indexer.
//!
//! This library turns a multi-gigabyte UNIX mbox file into a list of compact
//! per-message records (sender, subject, date, a short body preview, and the
//! message's byte offsets), reading disjoint regions of the file in parallel
//! to saturate I/O. Offsets persist to a tiny sidecar index so a later run
//! can rebuild the record list with positional reads alone.
//!
//! # Features
//!
//! - Boundary-aligned parallel region parsing (no inter-thread coordination)
//! - RFC-822-style header parsing with folded lines and Q-encoded words
//! - `multipart/alternative` structure traversal
//! - Sidecar offset index with parallel batched reload
//! - Case-insensitive sender filtering and in-place sorts
//!
//! # Example
//!
//! ```ignore
//! use mboxidx::{Mbox, save_index, load_index, sort_by_start};
//! use std::path::Path;
//!
//! let mbox = Mbox::open_read(Path::new("archive.mbox"))?;
//! let mut records = mbox.parse(8);
//! sort_by_start(&mut records);
//! save_index(Path::new("archive.mbox.idx"), &mut records)?;
//!
//! // Later: skip the scan entirely.
//! let records = load_index(
//!     Path::new("archive.mbox.idx"),
//!     Path::new("archive.mbox"),
//!     8,
//! )?;
//! ```

pub mod buffer;
pub mod config;
pub mod date;
pub mod headers;
pub mod index;
pub mod io;
pub mod mbox;
pub mod message;
pub mod mime;
pub mod multipart;
pub mod pool;
pub mod region;

pub use index::{load_index, save_index, IndexEntry};
pub use mbox::Mbox;
pub use message::{
    filter_by_sender, sort_by_date, sort_by_from, sort_by_start, MessageRecord, RawMessage,
};
