//! Header-block parsing.
//!
//! Parses the RFC-822-style header section of one message into a
//! [`HeaderMap`]: case-insensitive names, folded continuation lines joined,
//! Q-encoded words decoded. The envelope `From ` line is not a real header,
//! so it is captured under the reserved [`FROM_LINE_KEY`] name.

use ahash::RandomState;
use indexmap::IndexMap;

use crate::buffer::ParseBuf;
use crate::config::FROM_LINE_KEY;
use crate::mime;

/// Ordered header name → value map.
///
/// Names are stored case-folded and the entries are kept sorted by name, so
/// iteration order is deterministic regardless of the order headers appeared
/// in the message. Inserting an existing name replaces its value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HeaderMap {
    map: IndexMap<String, String, RandomState>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under the case-folded `name`, keeping the map sorted.
    pub fn insert(&mut self, name: &str, value: String) {
        let _ = self.map.insert_sorted(name.to_ascii_lowercase(), value);
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entries in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn is_line_break(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

fn matches_from_line(buf: &ParseBuf) -> bool {
    buf.peek_at(0) == b'F'
        && buf.peek_at(1) == b'r'
        && buf.peek_at(2) == b'o'
        && buf.peek_at(3) == b'm'
        && buf.peek_at(4) == b' '
}

/// Consume one line, dropping `\r`, leaving the cursor past the `\n`.
fn take_line(buf: &mut ParseBuf, out: &mut Vec<u8>) {
    while buf.offset() < buf.len() && buf.peek() != b'\n' {
        let byte = buf.peek();
        if byte != b'\r' {
            out.push(byte);
        }
        buf.advance(1);
    }
    if buf.offset() < buf.len() {
        buf.advance(1);
    }
}

/// Parse the header block starting at the buffer's cursor.
///
/// Consumes up to and including the blank line that terminates the headers,
/// leaving the cursor on the first body byte. Malformed lines end the parse
/// early; whatever parsed cleanly before them is returned. Running the
/// parser twice over the same bytes (cursor reset in between) produces equal
/// maps.
pub fn parse_headers(buf: &mut ParseBuf) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let mut scratch: Vec<u8> = Vec::with_capacity(256);

    while buf.offset() < buf.len() && is_line_break(buf.peek()) {
        buf.advance(1);
    }

    'lines: while buf.offset() < buf.len() {
        if matches_from_line(buf) {
            scratch.clear();
            take_line(buf, &mut scratch);
            headers.insert(
                FROM_LINE_KEY,
                String::from_utf8_lossy(&scratch).into_owned(),
            );
            continue;
        }

        // Name runs up to the ':'. A line break before one means the line is
        // not a header at all and the block is treated as finished.
        scratch.clear();
        while buf.offset() < buf.len() && buf.peek() != b':' {
            if buf.peek() == b'\n' {
                break 'lines;
            }
            scratch.push(buf.peek());
            buf.advance(1);
        }
        if buf.offset() >= buf.len() {
            break;
        }
        let name = String::from_utf8_lossy(&scratch).into_owned();

        // Step over ": ".
        buf.advance(2);

        scratch.clear();
        loop {
            while buf.offset() < buf.len() && buf.peek() != b'\n' {
                let byte = buf.peek();
                if byte != b'\r' && byte != b'\t' {
                    scratch.push(byte);
                }
                buf.advance(1);
            }
            if buf.offset() >= buf.len() {
                // Value never saw its terminator; drop it.
                break 'lines;
            }
            buf.advance(1);

            // A folded line continues the value with its indent stripped.
            if buf.peek() == b' ' || buf.peek() == b'\t' {
                continue;
            }

            let raw = String::from_utf8_lossy(&scratch).into_owned();
            let value = if mime::is_encoded_word(&raw) {
                mime::decode_encoded_word(&raw)
            } else {
                raw
            };
            headers.insert(&name, value);

            if is_line_break(buf.peek()) {
                while buf.offset() < buf.len() && is_line_break(buf.peek()) {
                    buf.advance(1);
                }
                break 'lines;
            }
            break;
        }
    }

    headers
}
