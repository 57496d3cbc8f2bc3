//! Tunable constants for the parser and indexer.
//!
//! These values control chunk sizes and the fixed shapes of the records the
//! pipeline produces. They are compile-time constants rather than runtime
//! configuration; the only runtime knob is the thread count.

/// Size in bytes of a single positional read.
///
/// Used by the framing loop for forward refills, by the boundary aligner for
/// backward jumps, and by the index loader as the byte budget of one read
/// batch.
pub const IO_READ_SIZE: usize = 300_000;

/// Length in bytes of the body preview stored on every record.
///
/// Shorter bodies are zero-padded up to this length so the preview field has
/// a fixed shape.
pub const PREVIEW_LEN: usize = 420;

/// The index writer flushes and fsyncs once this many bytes are buffered.
pub const INDEX_FLUSH_SIZE: usize = 8192;

/// Format of the `Date:` header once the leading `Mon, ` day name has been
/// skipped.
pub const DATE_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

/// Format of the date carried on an envelope `From ` line.
pub const DATE_FORMAT_FROM_LINE: &str = "%a %b %d %H:%M:%S %z %Y";

/// Header-map key under which the envelope `From ` line is stored.
///
/// The envelope line has no `Name: value` shape of its own, so the parser
/// files it under this reserved name.
pub const FROM_LINE_KEY: &str = "__FROM_LINE__";

/// Content-Type fragment that routes a message through the multipart walker.
pub const CONTENT_TYPE_MULTIPART: &str = "multipart/alternative";
