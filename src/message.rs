//! Message records and their assembly.
//!
//! A [`RawMessage`] is the unit handed from framing workers to parser
//! workers: one message's bytes plus its offsets in the archive. Parsing it
//! produces the [`MessageRecord`] the library hands out — the handful of
//! canonical headers, a fixed-size body preview, and the offsets needed to
//! find the full message again.

use std::fmt;

use rayon::prelude::*;

use crate::buffer::{self, ParseBuf};
use crate::config::{
    CONTENT_TYPE_MULTIPART, DATE_FORMAT, DATE_FORMAT_FROM_LINE, FROM_LINE_KEY, PREVIEW_LEN,
};
use crate::date::{parse_date, to_unix_seconds};
use crate::headers::parse_headers;
use crate::multipart;

/// One framed message: its bytes and the `[start, end)` range they occupy
/// in the archive. `end - start == bytes.len()`.
#[derive(Debug)]
pub struct RawMessage {
    pub bytes: Vec<u8>,
    pub start: u64,
    pub end: u64,
}

/// Compact summary of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub msg_id: Option<String>,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    /// The envelope `From ` line, when one prefixed the message.
    pub from_line: Option<String>,
    /// First [`PREVIEW_LEN`] body bytes, zero-padded when the body is
    /// shorter.
    pub preview: Vec<u8>,
    /// UTC seconds from the `Date:` header (or the envelope line's date);
    /// 0 when neither is usable.
    pub unix_timestamp: i64,
    pub start: u64,
    pub end: u64,
}

/// `Date:` values carry an RFC-2822 `Mon, ` day-name prefix the numeric
/// format does not; cut it when present.
fn strip_day_name(date: &str) -> &str {
    let bytes = date.as_bytes();
    if bytes.len() > 5 && bytes[3] == b',' && bytes[4] == b' ' {
        &date[5..]
    } else {
        date
    }
}

fn timestamp_from_date(date: &str) -> i64 {
    match parse_date(strip_day_name(date), DATE_FORMAT) {
        Some(parts) if parts.hour != -1 => to_unix_seconds(&parts),
        _ => 0,
    }
}

/// Recover a timestamp from the envelope line's trailing date, e.g.
/// `From alice@example.com Fri Feb 24 15:13:20 +0000 2023`.
fn timestamp_from_envelope(from_line: &str) -> i64 {
    let mut parts = from_line.splitn(3, ' ');
    let _from = parts.next();
    let _addr = parts.next();
    let tail = match parts.next() {
        Some(tail) => tail,
        None => return 0,
    };

    match parse_date(tail, DATE_FORMAT_FROM_LINE) {
        Some(parts) if parts.hour != -1 => to_unix_seconds(&parts),
        _ => 0,
    }
}

/// Build a record from one message's bytes, starting at the buffer cursor.
///
/// Consumes the header block, snapshots the preview, and — for
/// `multipart/alternative` bodies — walks the boundary structure through its
/// terminal marker. A malformed multipart body never suppresses the record.
pub fn build_record(buf: &mut ParseBuf, start: u64, end: u64) -> MessageRecord {
    let headers = parse_headers(buf);

    let body = buf.remaining();
    let mut preview = vec![0u8; PREVIEW_LEN];
    let copy = body.len().min(PREVIEW_LEN);
    preview[..copy].copy_from_slice(&body[..copy]);

    let date = headers.get("Date").map(str::to_owned);
    let from_line = headers.get(FROM_LINE_KEY).map(str::to_owned);

    let mut unix_timestamp = match &date {
        Some(date) => timestamp_from_date(date),
        None => 0,
    };
    if date.is_none() {
        if let Some(from_line) = &from_line {
            unix_timestamp = timestamp_from_envelope(from_line);
        }
    }

    if let Some(content_type) = headers.get("Content-Type") {
        let multipart_hit = buffer::find_ignore_case(
            content_type.as_bytes(),
            CONTENT_TYPE_MULTIPART.as_bytes(),
        );
        if multipart_hit.is_some() {
            // The walk pins down the message's structural end; a truncated
            // body leaves the record intact.
            let _ = multipart::validate_structure(buf, content_type);
        }
    }

    MessageRecord {
        msg_id: headers.get("Message-ID").map(str::to_owned),
        from: headers.get("From").map(str::to_owned),
        subject: headers.get("Subject").map(str::to_owned),
        date,
        from_line,
        preview,
        unix_timestamp,
        start,
        end,
    }
}

/// Build a record from a framed message, consuming it.
pub fn record_from_raw(raw: RawMessage) -> MessageRecord {
    let mut buf = ParseBuf::from_bytes(&raw.bytes);
    build_record(&mut buf, raw.start, raw.end)
}

/// Split a `From:` header into display name and address.
///
/// Handles the shapes mail clients actually emit:
/// `Name <a@b>`, `"Name" <a@b>`, `<a@b>`, `=?utf-8?Q?Name?= <a@b>`, and a
/// bare `a@b`.
pub fn split_sender(from: &str) -> (Option<String>, Option<String>) {
    let from = from.trim_start();

    if let Some(rest) = from.strip_prefix('<') {
        let email = rest.split('>').next().unwrap_or(rest);
        return (None, Some(email.to_owned()));
    }

    match from.find('<') {
        Some(lt) => {
            let name = from[..lt].trim().trim_matches('"').trim();
            let name = if name.is_empty() {
                None
            } else {
                Some(crate::mime::decode_encoded_word(name))
            };
            let email = from[lt + 1..].split('>').next().unwrap_or("");
            let email = if email.is_empty() {
                None
            } else {
                Some(email.to_owned())
            };
            (name, email)
        }
        None => {
            let bare = from.trim();
            if bare.is_empty() {
                (None, None)
            } else {
                (None, Some(bare.to_owned()))
            }
        }
    }
}

/// Sort records by their timestamp, oldest first.
pub fn sort_by_date(records: &mut [MessageRecord]) {
    records.par_sort_by_key(|r| r.unix_timestamp);
}

/// Sort records by sender, case-insensitively; records without one sort
/// first.
pub fn sort_by_from(records: &mut [MessageRecord]) {
    records.par_sort_by_key(|r| r.from.as_deref().map(str::to_ascii_lowercase));
}

/// Sort records by their position in the archive.
pub fn sort_by_start(records: &mut [MessageRecord]) {
    records.par_sort_unstable_by_key(|r| r.start);
}

/// Records whose sender contains `needle`, matched case-insensitively.
pub fn filter_by_sender<'a>(
    records: &'a [MessageRecord],
    needle: &str,
) -> Vec<&'a MessageRecord> {
    let (folded, table) = buffer::fold_pattern(needle.as_bytes());

    records
        .iter()
        .filter(|record| {
            record.from.as_deref().is_some_and(|from| {
                buffer::find_ignore_case_with_table(from.as_bytes(), &table, &folded).is_some()
            })
        })
        .collect()
}

impl fmt::Display for MessageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nil = "(nil)";
        writeln!(f, "ID: {}", self.msg_id.as_deref().unwrap_or(nil))?;
        writeln!(f, "From: {}", self.from.as_deref().unwrap_or(nil))?;
        writeln!(f, "Subject: {}", self.subject.as_deref().unwrap_or(nil))?;
        writeln!(f, "Date: {}", self.date.as_deref().unwrap_or(nil))?;
        writeln!(f, "Offsets: [{}, {})", self.start, self.end)?;

        let preview_len = self
            .preview
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.preview.len());
        write!(f, "{}", String::from_utf8_lossy(&self.preview[..preview_len]))
    }
}
