//! Walker for `multipart/alternative` message bodies.
//!
//! Multipart bodies interleave `--boundary` section markers with sub-headers
//! and sub-bodies, and end with a terminal `--boundary--`. The walker
//! traverses that structure to find the message's true end; the sub-bodies
//! themselves are not surfaced. Only the boundary string of the part being
//! walked is matched — markers of nested multiparts are passed over as body
//! bytes.

use std::fmt;

use crate::buffer::ParseBuf;
use crate::headers::parse_headers;

/// Result of probing the bytes at the cursor for a boundary marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// Not enough buffer left to compare.
    Eof,
    /// A `--` pair that is not our boundary.
    NoMatch,
    /// A section marker; the cursor moved past it.
    Match,
    /// The terminal marker; the cursor moved past it.
    Eom,
}

/// Structural failure while walking a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartError {
    /// The Content-Type announced a multipart but carried no boundary.
    MissingBoundary,
    /// The buffer ran out before the terminal marker.
    Truncated,
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultipartError::MissingBoundary => {
                write!(f, "multipart content type without a boundary parameter")
            }
            MultipartError::Truncated => {
                write!(f, "multipart body ended before its terminal boundary")
            }
        }
    }
}

impl std::error::Error for MultipartError {}

/// Pull the boundary token out of a `Content-Type` value: skip to the first
/// `b`, then to the `=`; a quoted boundary runs to the closing quote, a bare
/// one to the end of the value with `\r` stripped.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    let bytes = content_type.as_bytes();
    let b_pos = bytes.iter().position(|&b| b == b'b')?;
    let eq_pos = b_pos + bytes[b_pos..].iter().position(|&b| b == b'=')?;
    let rest = &bytes[eq_pos + 1..];

    let boundary: Vec<u8> = if rest.first() == Some(&b'"') {
        rest[1..].iter().take_while(|&&b| b != b'"').copied().collect()
    } else {
        rest.iter().filter(|&&b| b != b'\r').copied().collect()
    };

    if boundary.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&boundary).into_owned())
}

/// Probe the `--` pair at the cursor against `boundary`, advancing past the
/// marker when it matches. Marker forms: `--boundary` (section) and
/// `--boundary--` (terminal).
pub fn check_boundary(buf: &mut ParseBuf, boundary: &[u8]) -> ScanStatus {
    if buf.peek() != b'-' || buf.peek_at(1) != b'-' {
        return ScanStatus::NoMatch;
    }

    if buf.offset() + 3 + boundary.len() > buf.len() {
        return ScanStatus::Eof;
    }

    let start = buf.offset() + 2;
    if &buf.as_slice()[start..start + boundary.len()] != boundary {
        return ScanStatus::NoMatch;
    }

    if buf.peek_at(2 + boundary.len()) == b'-' && buf.peek_at(3 + boundary.len()) == b'-' {
        buf.advance(4 + boundary.len());
        return ScanStatus::Eom;
    }

    buf.advance(2 + boundary.len());
    ScanStatus::Match
}

/// Validate the multipart structure of the body at the cursor, given the
/// message's `Content-Type` value. Returns the number of sections walked.
pub fn validate_structure(
    buf: &mut ParseBuf,
    content_type: &str,
) -> Result<usize, MultipartError> {
    let boundary = extract_boundary(content_type).ok_or(MultipartError::MissingBoundary)?;
    walk(buf, &boundary)
}

/// Walk every section of a multipart body from the cursor to the terminal
/// marker. Returns the number of sections traversed.
pub fn walk(buf: &mut ParseBuf, boundary: &str) -> Result<usize, MultipartError> {
    let boundary = boundary.as_bytes();
    let mut sections = 0;

    loop {
        while buf.offset() < buf.len() && buf.peek() != b'-' {
            buf.advance(1);
        }
        if buf.offset() >= buf.len() {
            return Err(MultipartError::Truncated);
        }

        match check_boundary(buf, boundary) {
            ScanStatus::Eof => return Err(MultipartError::Truncated),
            ScanStatus::NoMatch => buf.advance(1),
            ScanStatus::Eom => return Ok(sections),
            ScanStatus::Match => {
                // Sub-headers for this section; the sub-body is whatever
                // runs from here to the next marker.
                let _section_headers = parse_headers(buf);
                sections += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bare_boundary() {
        assert_eq!(
            extract_boundary("multipart/alternative; boundary=abc123").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn test_extract_quoted_boundary() {
        assert_eq!(
            extract_boundary("multipart/alternative; boundary=\"==_mime_77\"; charset=utf-8")
                .as_deref(),
            Some("==_mime_77")
        );
    }

    #[test]
    fn test_extract_missing_boundary() {
        assert_eq!(extract_boundary("text/plain; charset=utf-8"), None);
    }

    #[test]
    fn test_check_boundary_forms() {
        let mut buf = ParseBuf::from_bytes(b"--abc\nrest");
        assert_eq!(check_boundary(&mut buf, b"abc"), ScanStatus::Match);
        assert_eq!(buf.peek(), b'\n');

        let mut buf = ParseBuf::from_bytes(b"--abc--\n");
        assert_eq!(check_boundary(&mut buf, b"abc"), ScanStatus::Eom);

        let mut buf = ParseBuf::from_bytes(b"--xyz\n");
        assert_eq!(check_boundary(&mut buf, b"abc"), ScanStatus::NoMatch);

        let mut buf = ParseBuf::from_bytes(b"--ab");
        assert_eq!(check_boundary(&mut buf, b"abc"), ScanStatus::Eof);
    }

    #[test]
    fn test_walk_two_sections() {
        let body = b"--sep\nContent-Type: text/plain\n\nplain text\n--sep\nContent-Type: text/html\n\n<p>html</p>\n--sep--\n";
        let mut buf = ParseBuf::from_bytes(body);
        assert_eq!(walk(&mut buf, "sep"), Ok(2));
    }

    #[test]
    fn test_walk_empty_multipart() {
        let mut buf = ParseBuf::from_bytes(b"--sep--\n");
        assert_eq!(walk(&mut buf, "sep"), Ok(0));
    }

    #[test]
    fn test_walk_truncated() {
        let mut buf = ParseBuf::from_bytes(b"--sep\nContent-Type: text/plain\n\nno terminal marker");
        assert_eq!(walk(&mut buf, "sep"), Err(MultipartError::Truncated));
    }

    #[test]
    fn test_walk_skips_nested_boundary() {
        // The inner part's markers use a different boundary and must be
        // treated as body bytes of the outer walk.
        let body = b"--outer\nContent-Type: multipart/alternative; boundary=inner\n\n--inner\nContent-Type: text/plain\n\nhi\n--inner--\n--outer--\n";
        let mut buf = ParseBuf::from_bytes(body);
        assert_eq!(walk(&mut buf, "outer"), Ok(1));
    }

    #[test]
    fn test_validate_structure_missing_boundary() {
        let mut buf = ParseBuf::from_bytes(b"--sep--\n");
        assert_eq!(
            validate_structure(&mut buf, "multipart/alternative"),
            Err(MultipartError::MissingBoundary)
        );

        let mut buf = ParseBuf::from_bytes(b"--sep--\n");
        assert_eq!(
            validate_structure(&mut buf, "multipart/alternative; boundary=sep"),
            Ok(0)
        );
    }

    #[test]
    fn test_walk_dashes_in_body() {
        let body = b"--sep\nContent-Type: text/plain\n\ndash - and -- dashes\n--sep--\n";
        let mut buf = ParseBuf::from_bytes(body);
        assert_eq!(walk(&mut buf, "sep"), Ok(1));
    }
}
