//! Region planning and the message framing loop.
//!
//! The archive is cut into one region per I/O worker. A nominal cut lands
//! anywhere, so each region slides its start backwards to a real `\nFrom `
//! boundary; alignment needs no coordination because every region does it
//! against the immutable file. A sealed region then walks forward emitting
//! one raw message per `From ` line it owns.

use std::io;
use std::sync::Arc;

use crate::buffer::ParseBuf;
use crate::config::IO_READ_SIZE;
use crate::io::{read_into, ReadAt};
use crate::message::RawMessage;

/// Extra bytes read past a backward-jump window so a `\nFrom ` straddling
/// two jumps is still seen.
const JUMP_OVERLAP: usize = 5;

/// How close the cursor may get to the buffered data's end before the
/// from-line scanner refills.
const FROM_WINDOW: usize = 6;

/// One boundary-aligned slice of the archive, owned by a single worker.
#[derive(Debug)]
pub struct Region {
    pub id: u32,
    /// First byte of this region; 0 or the `F` of a `\nFrom ` sequence.
    pub start_offset: u64,
    /// One past the last byte this region owns.
    pub end_offset: u64,
    /// Absolute offset of the next unemitted message.
    pub cursor: u64,
    /// Set when the region died on an I/O error; siblings are unaffected.
    pub err: Option<io::Error>,
}

/// First cut: `count` equal byte ranges. Ends stay unset until the aligned
/// starts are known.
pub fn nominal_regions(file_size: u64, count: usize) -> Vec<Region> {
    let count = count.max(1);
    let chunk = file_size / count as u64;

    (0..count as u64)
        .map(|i| Region {
            id: i as u32,
            start_offset: i * chunk,
            end_offset: 0,
            cursor: 0,
            err: None,
        })
        .collect()
}

fn find_boundary_marker(window: &[u8]) -> Option<usize> {
    window.windows(6).position(|w| w == b"\nFrom ")
}

/// Slide `region.start_offset` backwards to the nearest message boundary.
///
/// Reads windows of [`IO_READ_SIZE`] walking towards the file start and
/// takes the first `\nFrom ` seen in each window. Region 0 keeps offset 0.
/// A scan that drains the file head without a match also lands on 0; the
/// duplicate coverage dies in [`seal_regions`].
pub fn align_region(source: &dyn ReadAt, region: &mut Region) -> io::Result<()> {
    let nominal = region.start_offset;
    if nominal == 0 {
        return Ok(());
    }

    let mut buf = ParseBuf::with_capacity(IO_READ_SIZE + JUMP_OVERLAP);
    let mut base = nominal;

    loop {
        let jump_base = base.saturating_sub(IO_READ_SIZE as u64);
        // Window runs JUMP_OVERLAP bytes past `base` so a marker straddling
        // two jumps is caught, but never past the nominal cut.
        let want = (base - jump_base) as usize + JUMP_OVERLAP;

        buf.clear();
        let n = read_into(source, &mut buf, jump_base, want)?;
        if n == 0 {
            region.start_offset = 0;
            return Ok(());
        }

        if let Some(idx) = find_boundary_marker(buf.as_slice()) {
            region.start_offset = jump_base + idx as u64 + 1;
            return Ok(());
        }

        if jump_base == 0 {
            region.start_offset = 0;
            return Ok(());
        }
        base = jump_base;
    }
}

/// Fix the ends of aligned regions and drop the degenerate ones.
///
/// Each region runs to the next region's start; the last runs to the end of
/// the file. Regions whose aligned starts collided collapse to zero length
/// and are discarded.
pub fn seal_regions(mut regions: Vec<Region>, file_size: u64) -> Vec<Region> {
    regions.sort_by_key(|r| r.start_offset);

    let starts: Vec<u64> = regions.iter().map(|r| r.start_offset).collect();
    for (i, region) in regions.iter_mut().enumerate() {
        region.end_offset = starts.get(i + 1).copied().unwrap_or(file_size);
        region.cursor = region.start_offset;
    }

    let mut sealed: Vec<Region> = regions
        .into_iter()
        .filter(|r| r.end_offset > r.start_offset)
        .collect();
    for (i, region) in sealed.iter_mut().enumerate() {
        region.id = i as u32;
    }
    sealed
}

enum FromSeek {
    /// Cursor parked on the `F` of the next message.
    Found,
    /// Source drained; cursor parked at the end of the data.
    Eof,
}

/// Walks one region forward, framing a [`RawMessage`] per `From ` line.
pub struct RegionFramer {
    source: Arc<dyn ReadAt>,
    pub region: Region,
    buf: ParseBuf,
    /// Next file offset to refill from.
    file_cursor: u64,
    read_size: usize,
    eof: bool,
    done: bool,
}

impl RegionFramer {
    pub fn new(source: Arc<dyn ReadAt>, region: Region) -> Self {
        Self::with_read_size(source, region, IO_READ_SIZE)
    }

    /// A framer refilling in chunks of `read_size` instead of
    /// [`IO_READ_SIZE`], so refill-boundary handling can be driven hard.
    pub(crate) fn with_read_size(source: Arc<dyn ReadAt>, region: Region, read_size: usize) -> Self {
        let file_cursor = region.start_offset;
        RegionFramer {
            source,
            region,
            buf: ParseBuf::with_capacity(read_size + 1),
            file_cursor,
            read_size,
            eof: false,
            done: false,
        }
    }

    /// Whether the region has emitted everything it owns.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn refill(&mut self) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }
        let n = read_into(&*self.source, &mut self.buf, self.file_cursor, self.read_size)?;
        if n == 0 {
            self.eof = true;
        } else {
            self.file_cursor += n as u64;
        }
        Ok(n)
    }

    /// Advance the cursor past the blank line ending this message's header
    /// block. False when the source drains first.
    fn seek_headers_end(&mut self) -> io::Result<bool> {
        loop {
            let mut off = self.buf.offset();

            while off < self.buf.len() {
                let data = self.buf.as_slice();
                while off < data.len() && data[off] != b'\n' {
                    off += 1;
                }
                if off + 1 >= data.len() {
                    break;
                }
                if data[off + 1] == b'\n' {
                    self.buf.set_offset(off + 2);
                    return Ok(true);
                }
                if data[off + 1] == b'\r' {
                    if off + 2 >= data.len() {
                        break;
                    }
                    if data[off + 2] == b'\n' {
                        self.buf.set_offset(off + 3);
                        return Ok(true);
                    }
                }
                off += 1;
            }

            // Park on the unresolved byte so the check reruns once more
            // data is in.
            self.buf.set_offset(off.min(self.buf.len()));
            if self.refill()? == 0 {
                return Ok(false);
            }
        }
    }

    /// Advance the cursor to the `F` of the next `\nFrom ` line, or to the
    /// end of the data at EOF.
    fn seek_next_from(&mut self) -> io::Result<FromSeek> {
        loop {
            while self.buf.offset() < self.buf.len() && self.buf.peek() != b'\n' {
                self.buf.advance(1);
            }

            if self.buf.offset() >= self.buf.len() {
                if self.refill()? == 0 {
                    self.buf.set_offset(self.buf.len());
                    return Ok(FromSeek::Eof);
                }
                continue;
            }

            // Parked on a '\n'. The 6-byte window may hang over the data we
            // have; refill and retry the same position rather than guess.
            if self.buf.offset() + FROM_WINDOW > self.buf.len() {
                if self.refill()? == 0 {
                    self.buf.set_offset(self.buf.len());
                    return Ok(FromSeek::Eof);
                }
                continue;
            }

            if self.buf.peek_at(1) == b'F'
                && self.buf.peek_at(2) == b'r'
                && self.buf.peek_at(3) == b'o'
                && self.buf.peek_at(4) == b'm'
                && self.buf.peek_at(5) == b' '
            {
                self.buf.advance(1);
                return Ok(FromSeek::Found);
            }

            self.buf.advance(1);
        }
    }

    /// Frame the next message. `None` once the region is exhausted or has
    /// recorded an error.
    pub fn next_message(&mut self) -> Option<RawMessage> {
        if self.done {
            return None;
        }

        self.buf.compact();

        let outcome = self.seek_headers_end().and_then(|found| {
            if !found {
                return Ok(None);
            }
            self.seek_next_from().map(Some)
        });

        let seek = match outcome {
            Ok(Some(seek)) => seek,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(err) => {
                self.region.err = Some(err);
                self.done = true;
                return None;
            }
        };

        if let FromSeek::Eof = seek {
            self.done = true;
        }

        let len = self.buf.offset();
        if len == 0 {
            self.done = true;
            return None;
        }

        let start = self.region.cursor;
        let end = start + len as u64;
        self.region.cursor = end;
        if self.region.cursor >= self.region.end_offset {
            self.done = true;
        }

        Some(RawMessage {
            bytes: self.buf.as_slice()[..len].to_vec(),
            start,
            end,
        })
    }
}
