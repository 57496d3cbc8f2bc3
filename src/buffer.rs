//! Growable byte buffer with a parse cursor.
//!
//! `ParseBuf` is the working storage for the framing loop and the header
//! parser: bytes are appended at `len` (by file reads or `push`) and consumed
//! at `offset`. The byte at `len` is always zero so short fixed-width window
//! comparisons near the end of the data read a terminator instead of stale
//! bytes.

/// Minimum number of bytes a reallocation grows the buffer by.
const GROW_STEP: usize = 256;

/// Byte buffer with `offset`/`len` cursors into a larger allocation.
///
/// Invariants: `offset <= len < capacity`, and `data[len] == 0`. Capacity
/// never shrinks.
#[derive(Debug)]
pub struct ParseBuf {
    data: Vec<u8>,
    len: usize,
    offset: usize,
}

impl ParseBuf {
    /// Create a buffer able to hold at least `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        ParseBuf {
            data: vec![0u8; capacity.max(GROW_STEP)],
            len: 0,
            offset: 0,
        }
    }

    /// Build a buffer holding a copy of `bytes`, cursor at 0.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = ParseBuf::with_capacity(bytes.len() + 1);
        buf.data[..bytes.len()].copy_from_slice(bytes);
        buf.len = bytes.len();
        buf
    }

    /// Number of bytes present.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total allocated bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current parse position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn set_offset(&mut self, offset: usize) {
        debug_assert!(offset <= self.len);
        self.offset = offset;
    }

    /// Move the parse position forward by `n`, saturating at the end of the
    /// data.
    pub fn advance(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.len);
    }

    /// All bytes present.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Bytes from the parse position to the end of the data.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.offset..self.len]
    }

    /// Byte at the parse position, or the 0 sentinel when exhausted.
    pub fn peek(&self) -> u8 {
        self.data[self.offset.min(self.len)]
    }

    /// Byte at `at` past the parse position, or the 0 sentinel.
    pub fn peek_at(&self, at: usize) -> u8 {
        let pos = self.offset + at;
        if pos > self.len {
            return 0;
        }
        self.data[pos]
    }

    /// Append one byte.
    pub fn push(&mut self, byte: u8) {
        self.reserve(1);
        self.data[self.len] = byte;
        self.len += 1;
        self.data[self.len] = 0;
    }

    /// Append a run of bytes.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        self.data[self.len] = 0;
    }

    /// Ensure room for `additional` more bytes plus the sentinel, growing in
    /// steps of at least [`GROW_STEP`].
    pub fn reserve(&mut self, additional: usize) {
        if self.len + 1 + additional >= self.capacity() {
            let grow = additional.max(GROW_STEP);
            let new_capacity = self.capacity() + grow;
            self.data.resize(new_capacity, 0);
        }
    }

    /// Writable slice of `n` bytes starting at `len`, for file reads to land
    /// in. Call [`ParseBuf::commit`] with the number of bytes actually
    /// written.
    pub fn tail_mut(&mut self, n: usize) -> &mut [u8] {
        self.reserve(n);
        let len = self.len;
        &mut self.data[len..len + n]
    }

    /// Account for `n` bytes written into [`ParseBuf::tail_mut`].
    pub fn commit(&mut self, n: usize) {
        self.len += n;
        self.data[self.len] = 0;
    }

    /// Drop everything before the parse position, moving the unconsumed tail
    /// to the front. The parse position resets to 0.
    pub fn compact(&mut self) {
        let new_len = self.len - self.offset;
        self.data.copy_within(self.offset..self.len, 0);
        self.len = new_len;
        self.offset = 0;
        self.data[self.len] = 0;
    }

    /// Empty the buffer without releasing its allocation.
    pub fn clear(&mut self) {
        self.len = 0;
        self.offset = 0;
        self.data[0] = 0;
    }
}

/// KMP failure function over `pattern`.
pub fn prefix_table(pattern: &[u8]) -> Vec<usize> {
    let mut table = vec![0usize; pattern.len()];
    let mut k = 0;

    for i in 1..pattern.len() {
        while k > 0 && pattern[k] != pattern[i] {
            k = table[k - 1];
        }
        if pattern[k] == pattern[i] {
            k += 1;
        }
        table[i] = k;
    }
    table
}

/// KMP search with a precomputed failure table. Returns the index of the
/// first occurrence of `pattern` in `haystack`.
pub fn find_with_table(haystack: &[u8], table: &[usize], pattern: &[u8]) -> Option<usize> {
    if pattern.is_empty() {
        return None;
    }

    let mut q = 0;
    for (i, &byte) in haystack.iter().enumerate() {
        while q > 0 && pattern[q] != byte {
            q = table[q - 1];
        }
        if pattern[q] == byte {
            q += 1;
        }
        if q == pattern.len() {
            return Some(i + 1 - pattern.len());
        }
    }
    None
}

/// Find `pattern` in `haystack`.
pub fn find(haystack: &[u8], pattern: &[u8]) -> Option<usize> {
    let table = prefix_table(pattern);
    find_with_table(haystack, &table, pattern)
}

/// Case-folded KMP search. `table` and `pattern` must already be folded with
/// [`fold_pattern`].
pub fn find_ignore_case_with_table(
    haystack: &[u8],
    table: &[usize],
    pattern: &[u8],
) -> Option<usize> {
    if pattern.is_empty() {
        return None;
    }

    let mut q = 0;
    for (i, &byte) in haystack.iter().enumerate() {
        let byte = byte.to_ascii_lowercase();
        while q > 0 && pattern[q] != byte {
            q = table[q - 1];
        }
        if pattern[q] == byte {
            q += 1;
        }
        if q == pattern.len() {
            return Some(i + 1 - pattern.len());
        }
    }
    None
}

/// Lowercase a pattern and build its failure table for repeated
/// case-insensitive searches.
pub fn fold_pattern(pattern: &[u8]) -> (Vec<u8>, Vec<usize>) {
    let folded: Vec<u8> = pattern.iter().map(|b| b.to_ascii_lowercase()).collect();
    let table = prefix_table(&folded);
    (folded, table)
}

/// Find `pattern` in `haystack` ignoring ASCII case.
pub fn find_ignore_case(haystack: &[u8], pattern: &[u8]) -> Option<usize> {
    let (folded, table) = fold_pattern(pattern);
    find_ignore_case_with_table(haystack, &table, &folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_sentinel() {
        let mut buf = ParseBuf::with_capacity(4);
        buf.push(b'a');
        buf.push(b'b');
        assert_eq!(buf.as_slice(), b"ab");
        assert_eq!(buf.len(), 2);
        // Sentinel sits one past the data.
        assert_eq!(buf.peek_at(2), 0);
    }

    #[test]
    fn test_growth_step() {
        let mut buf = ParseBuf::with_capacity(8);
        let initial = buf.capacity();
        for i in 0..initial {
            buf.push(b'a' + (i % 26) as u8);
        }
        // Growth happens in jumps of at least 256 and never shrinks.
        assert!(buf.capacity() >= initial + 256);
        assert!(buf.len() < buf.capacity());
    }

    #[test]
    fn test_compact_moves_tail() {
        let mut buf = ParseBuf::from_bytes(b"consumed|tail");
        buf.set_offset(9);
        buf.compact();
        assert_eq!(buf.as_slice(), b"tail");
        assert_eq!(buf.offset(), 0);
    }

    #[test]
    fn test_tail_mut_commit() {
        let mut buf = ParseBuf::from_bytes(b"abc");
        let tail = buf.tail_mut(3);
        tail.copy_from_slice(b"def");
        buf.commit(3);
        assert_eq!(buf.as_slice(), b"abcdef");
    }

    #[test]
    fn test_peek_past_end_is_zero() {
        let buf = ParseBuf::from_bytes(b"x");
        assert_eq!(buf.peek_at(0), b'x');
        assert_eq!(buf.peek_at(1), 0);
        assert_eq!(buf.peek_at(100), 0);
    }

    #[test]
    fn test_find_basic() {
        assert_eq!(find(b"Hello world", b"Hello"), Some(0));
        assert_eq!(find(b"Hello world", b"world"), Some(6));
        assert_eq!(find(b"Hello world", b"worlds"), None);
        assert_eq!(find(b"Hello world", b""), None);
    }

    #[test]
    fn test_find_boundary_hashes() {
        let line: &[u8] =
            b"--68760429edd956d2400d1396f4e6c6371100c4ae3610a9940d6b2ac0ec37--";
        let boundary: &[u8] =
            b"68760429edd956d2400d1396f4e6c6371100c4ae3610a9940d6b2ac0ec37";
        assert_eq!(find(line, boundary), Some(2));

        let other: &[u8] =
            b"--cee6855870433e9118d4d70cc3592d5e37d74eb38f5fed35863c2038a349--";
        assert_eq!(find(other, boundary), None);
    }

    #[test]
    fn test_find_ignore_case() {
        assert_eq!(find_ignore_case(b"Content-Type: TEXT/plain", b"text/plain"), Some(14));
        assert_eq!(find_ignore_case(b"multipart/ALTERNATIVE", b"multipart/alternative"), Some(0));
        assert_eq!(find_ignore_case(b"text/html", b"text/plain"), None);
    }

    #[test]
    fn test_find_with_shared_table() {
        let needle = b"abab";
        let table = prefix_table(needle);
        assert_eq!(find_with_table(b"xxababyy", &table, needle), Some(2));
        assert_eq!(find_with_table(b"abacabab", &table, needle), Some(4));
        assert_eq!(find_with_table(b"ababab", &table, needle), Some(0));
    }
}
