//! SIMD-accelerated XML scanning using memchr
//!
//! Cursor over the input buffer. Delimiter searches go through memchr/memmem
//! (SSE2, AVX2 or NEON depending on the target); everything it returns is a
//! [`StringView`] into the same buffer.

use super::view::StringView;
use memchr::{memchr, memmem};

/// Cursor over the input bytes
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    #[inline]
    pub fn new(input: &'a [u8]) -> Self {
        Scanner { input, pos: 0 }
    }

    #[inline]
    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// View of `[start, end)` in the input
    #[inline]
    pub fn view(&self, start: usize, end: usize) -> StringView<'a> {
        StringView::new(&self.input[start..end])
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Skip whitespace characters (space, tab, newline, carriage return)
    #[inline]
    pub fn skip_whitespace(&mut self) -> usize {
        let start = self.pos;
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
        self.pos - start
    }

    /// Find next '<' (tag start)
    #[inline]
    pub fn find_tag_start(&self) -> Option<usize> {
        self.find_byte(b'<')
    }

    #[inline]
    pub fn find_byte(&self, byte: u8) -> Option<usize> {
        memchr(byte, &self.input[self.pos..]).map(|i| self.pos + i)
    }

    /// Find the next occurrence of a byte sequence
    #[inline]
    pub fn find_seq(&self, needle: &[u8]) -> Option<usize> {
        memmem::find(&self.input[self.pos..], needle).map(|i| self.pos + i)
    }

    /// Find tag end while handling quotes properly
    /// Returns the position of '>' that is not inside quotes
    pub fn find_tag_end_quoted(&self) -> Option<usize> {
        let mut pos = self.pos;
        let mut in_single_quote = false;
        let mut in_double_quote = false;

        while pos < self.input.len() {
            match self.input[pos] {
                b'"' if !in_single_quote => in_double_quote = !in_double_quote,
                b'\'' if !in_double_quote => in_single_quote = !in_single_quote,
                b'>' if !in_single_quote && !in_double_quote => return Some(pos),
                _ => {}
            }
            pos += 1;
        }
        None
    }

    #[inline]
    pub fn starts_with(&self, needle: &[u8]) -> bool {
        self.input[self.pos..].starts_with(needle)
    }

    /// Consume `needle` if the input continues with it
    #[inline]
    pub fn eat(&mut self, needle: &[u8]) -> bool {
        if self.starts_with(needle) {
            self.pos += needle.len();
            true
        } else {
            false
        }
    }

    /// Read an identifier. Bytes are taken until an ASCII delimiter;
    /// non-ASCII bytes pass through untouched.
    pub fn read_name(&mut self) -> StringView<'a> {
        let start = self.pos;
        while self.pos < self.input.len() && !is_name_delimiter(self.input[self.pos]) {
            self.pos += 1;
        }
        self.view(start, self.pos)
    }

    /// Read a `"..."` or `'...'` literal, returning its contents without quotes
    pub fn read_quoted(&mut self) -> Option<StringView<'a>> {
        let quote = match self.peek()? {
            q @ (b'"' | b'\'') => q,
            _ => return None,
        };
        let start = self.pos + 1;
        let end = memchr(quote, &self.input[start..])? + start;
        self.pos = end + 1;
        Some(self.view(start, end))
    }
}

/// ASCII bytes that terminate element, attribute and declaration names
#[inline]
pub fn is_name_delimiter(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/' | b'=' | b'<' | b'?' | b'[' | b']' | b'"' | b'\''
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_tag_start() {
        let scanner = Scanner::new(b"hello <world>");
        assert_eq!(scanner.find_tag_start(), Some(6));
    }

    #[test]
    fn test_find_tag_end_quoted() {
        let scanner = Scanner::new(b"<a attr=\">test\">content");
        assert_eq!(scanner.find_tag_end_quoted(), Some(15));
    }

    #[test]
    fn test_read_name() {
        let mut scanner = Scanner::new(b"element-name>");
        assert_eq!(scanner.read_name(), "element-name");
        assert_eq!(scanner.position(), 12);
    }

    #[test]
    fn test_read_name_passes_non_ascii() {
        let mut scanner = Scanner::new("données attr".as_bytes());
        assert_eq!(scanner.read_name(), "données");
    }

    #[test]
    fn test_read_quoted() {
        let mut scanner = Scanner::new(b"'a\"b' rest");
        assert_eq!(scanner.read_quoted().unwrap(), "a\"b");
        assert_eq!(scanner.position(), 5);
        assert!(Scanner::new(b"\"open").read_quoted().is_none());
    }

    #[test]
    fn test_skip_whitespace() {
        let mut scanner = Scanner::new(b"  \t\n hello");
        assert_eq!(scanner.skip_whitespace(), 5);
        assert_eq!(scanner.position(), 5);
        assert!(scanner.eat(b"hel"));
        assert!(!scanner.eat(b"xx"));
        assert_eq!(scanner.peek(), Some(b'l'));
    }
}
