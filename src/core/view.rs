//! StringView - zero-copy window into the input buffer
//!
//! A `StringView<'a>` is a borrowed `(ptr, len)` range of the document bytes.
//! All parsing works on views; nothing is copied until a caller asks for an
//! owned string. Equality and hashing are by content, so two views of equal
//! bytes compare equal wherever they point; [`StringView::same_identity`]
//! compares addresses instead.

use crate::core::hash::hash32;
use crate::error::{Result, XmlError};
use memchr::{memchr, memmem, memrchr};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;

#[inline]
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Non-owning view of a byte range
#[derive(Clone, Copy, Default)]
pub struct StringView<'a> {
    bytes: &'a [u8],
}

impl<'a> StringView<'a> {
    #[inline]
    pub const fn new(bytes: &'a [u8]) -> Self {
        StringView { bytes }
    }

    /// The empty view
    #[inline]
    pub const fn empty() -> Self {
        StringView { bytes: &[] }
    }

    #[inline]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// View as UTF-8, if the range does not split a character
    pub fn to_str(&self) -> Option<&'a str> {
        std::str::from_utf8(self.bytes).ok()
    }

    pub fn to_string_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.bytes)
    }

    /// Sub-view from `start` to the end
    pub fn slice(&self, start: usize) -> Result<Self> {
        if start > self.bytes.len() {
            return Err(XmlError::OutOfRange {
                start,
                len: 0,
                available: self.bytes.len(),
            });
        }
        Ok(StringView::new(&self.bytes[start..]))
    }

    /// Sub-view of `len` bytes starting at `start`
    pub fn slice_len(&self, start: usize, len: usize) -> Result<Self> {
        match start.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(StringView::new(&self.bytes[start..end])),
            _ => Err(XmlError::OutOfRange {
                start,
                len,
                available: self.bytes.len(),
            }),
        }
    }

    /// Strip ASCII space, tab, CR and LF from both ends
    pub fn trim(&self) -> Self {
        self.trim_start().trim_end()
    }

    pub fn trim_start(&self) -> Self {
        let skip = self.bytes.iter().take_while(|&&b| is_space(b)).count();
        StringView::new(&self.bytes[skip..])
    }

    pub fn trim_end(&self) -> Self {
        let keep = self.bytes.len() - self.bytes.iter().rev().take_while(|&&b| is_space(b)).count();
        StringView::new(&self.bytes[..keep])
    }

    pub fn starts_with<N: Needle>(&self, needle: N) -> bool {
        needle.with_bytes(|n| self.bytes.starts_with(n))
    }

    pub fn ends_with<N: Needle>(&self, needle: N) -> bool {
        needle.with_bytes(|n| self.bytes.ends_with(n))
    }

    pub fn contains<N: Needle>(&self, needle: N) -> bool {
        self.index_of(needle).is_some()
    }

    /// Byte offset of the first occurrence of `needle`
    pub fn index_of<N: Needle>(&self, needle: N) -> Option<usize> {
        needle.with_bytes(|n| find_bytes(self.bytes, n))
    }

    /// Byte offset of the first occurrence at or after `from`
    pub fn index_of_from<N: Needle>(&self, needle: N, from: usize) -> Option<usize> {
        let rest = self.bytes.get(from..)?;
        needle.with_bytes(|n| find_bytes(rest, n)).map(|i| i + from)
    }

    /// Byte offset of the last occurrence of `needle`
    pub fn last_index_of<N: Needle>(&self, needle: N) -> Option<usize> {
        needle.with_bytes(|n| match n {
            [b] => memrchr(*b, self.bytes),
            _ => memmem::rfind(self.bytes, n),
        })
    }

    /// Byte range of the first occurrence of `needle`
    pub fn range_of<N: Needle>(&self, needle: N) -> Option<Range<usize>> {
        needle.with_bytes(|n| find_bytes(self.bytes, n).map(|i| i..i + n.len()))
    }

    /// Split on every occurrence of `separator`
    pub fn split<N: Needle>(&self, separator: N) -> Split<'a> {
        let mut sep = [0u8; 4];
        let owned = separator.with_bytes(|n| {
            if n.len() <= 4 {
                sep[..n.len()].copy_from_slice(n);
                None
            } else {
                Some(n.to_vec())
            }
        });
        let sep_len = separator.with_bytes(|n| n.len());
        Split {
            rest: Some(self.bytes),
            separator: match owned {
                Some(v) => SplitSeparator::Long(v),
                None => SplitSeparator::Short(sep, sep_len),
            },
        }
    }

    /// Split at the first occurrence of `separator`, dropping the separator
    pub fn split2<N: Needle>(&self, separator: N) -> Option<(Self, Self)> {
        let range = self.range_of(separator)?;
        Some((
            StringView::new(&self.bytes[..range.start]),
            StringView::new(&self.bytes[range.end..]),
        ))
    }

    /// Parse a decimal integer: `^[-+]?[0-9]+$` (signed) or `^\+?[0-9]+$` (unsigned).
    /// Overflow is an error, never a wraparound.
    pub fn parse_int<T: ParseInt>(&self) -> Result<T> {
        T::parse_view(self.bytes).ok_or_else(|| XmlError::InvalidNumber {
            kind: T::KIND,
            text: self.to_string_lossy().into_owned(),
        })
    }

    pub fn parse_f64(&self) -> Result<f64> {
        self.to_str()
            .and_then(parse_float_text)
            .ok_or_else(|| XmlError::InvalidNumber {
                kind: "f64",
                text: self.to_string_lossy().into_owned(),
            })
    }

    pub fn parse_f32(&self) -> Result<f32> {
        let text = self.to_str();
        text.and_then(|s| s.parse::<f32>().ok())
            .or_else(|| text.and_then(parse_float_text).map(|v| v as f32))
            .ok_or_else(|| XmlError::InvalidNumber {
                kind: "f32",
                text: self.to_string_lossy().into_owned(),
            })
    }

    /// Content hash with an explicit seed
    pub fn content_hash(&self, seed: u32) -> u32 {
        hash32(self.bytes, seed)
    }

    /// True when both views cover the same address range
    pub fn same_identity(&self, other: &StringView<'_>) -> bool {
        std::ptr::eq(self.bytes.as_ptr(), other.bytes.as_ptr()) && self.bytes.len() == other.bytes.len()
    }

    /// Offset of this view inside `buffer`, if it is a sub-range of it
    pub fn offset_in(&self, buffer: &[u8]) -> Option<usize> {
        let outer_start = buffer.as_ptr() as usize;
        let start = self.bytes.as_ptr() as usize;
        let offset = start.checked_sub(outer_start)?;
        if offset.checked_add(self.bytes.len())? <= buffer.len() {
            Some(offset)
        } else {
            None
        }
    }
}

#[inline]
fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    match needle {
        [] => Some(0),
        [b] => memchr(*b, haystack),
        _ => memmem::find(haystack, needle),
    }
}

/// Standard decimal parse, then the `nan` / `inf` / `∞` spellings
fn parse_float_text(text: &str) -> Option<f64> {
    if let Ok(v) = text.parse::<f64>() {
        return Some(v);
    }
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let value = if body.eq_ignore_ascii_case("nan") {
        f64::NAN
    } else if body.eq_ignore_ascii_case("inf") || body.eq_ignore_ascii_case("infinity") || body == "∞" {
        f64::INFINITY
    } else {
        return None;
    };
    Some(if negative { -value } else { value })
}

/// Something that can be searched for inside a view
pub trait Needle {
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R;
}

impl Needle for u8 {
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(std::slice::from_ref(self))
    }
}

impl Needle for char {
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let mut buf = [0u8; 4];
        f(self.encode_utf8(&mut buf).as_bytes())
    }
}

impl Needle for &[u8] {
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self)
    }
}

impl<const N: usize> Needle for &[u8; N] {
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self[..])
    }
}

impl Needle for &str {
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.as_bytes())
    }
}

impl Needle for StringView<'_> {
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.bytes)
    }
}

enum SplitSeparator {
    Short([u8; 4], usize),
    Long(Vec<u8>),
}

impl SplitSeparator {
    fn bytes(&self) -> &[u8] {
        match self {
            SplitSeparator::Short(buf, len) => &buf[..*len],
            SplitSeparator::Long(v) => v,
        }
    }
}

/// Iterator returned by [`StringView::split`]
pub struct Split<'a> {
    rest: Option<&'a [u8]>,
    separator: SplitSeparator,
}

impl<'a> Iterator for Split<'a> {
    type Item = StringView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        let sep = self.separator.bytes();
        if sep.is_empty() {
            self.rest = None;
            return Some(StringView::new(rest));
        }
        match find_bytes(rest, sep) {
            Some(i) => {
                self.rest = Some(&rest[i + sep.len()..]);
                Some(StringView::new(&rest[..i]))
            }
            None => {
                self.rest = None;
                Some(StringView::new(rest))
            }
        }
    }
}

/// Integer widths parseable from a view
pub trait ParseInt: Sized {
    const KIND: &'static str;
    fn parse_view(bytes: &[u8]) -> Option<Self>;
}

/// `^\+?[0-9]+$` with checked accumulation
fn parse_unsigned(bytes: &[u8]) -> Option<u64> {
    let digits = bytes.strip_prefix(b"+").unwrap_or(bytes);
    if digits.is_empty() {
        return None;
    }
    digits.iter().try_fold(0u64, |acc, &b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add((b - b'0') as u64)
    })
}

/// `^[-+]?[0-9]+$`, accumulated negatively so `i64::MIN` parses
fn parse_signed(bytes: &[u8]) -> Option<i64> {
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.iter().try_fold(0i64, |acc, &b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_sub((b - b'0') as i64)
    })?;
    if negative {
        Some(magnitude)
    } else {
        magnitude.checked_neg()
    }
}

macro_rules! impl_parse_int {
    ($parse:ident => $($t:ty),*) => {
        $(
            impl ParseInt for $t {
                const KIND: &'static str = stringify!($t);

                fn parse_view(bytes: &[u8]) -> Option<Self> {
                    $parse(bytes).and_then(|v| <$t>::try_from(v).ok())
                }
            }
        )*
    };
}

impl_parse_int!(parse_signed => i8, i16, i32, i64, isize);
impl_parse_int!(parse_unsigned => u8, u16, u32, u64, usize);

impl PartialEq for StringView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for StringView<'_> {}

impl PartialEq<[u8]> for StringView<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.bytes == other
    }
}

impl PartialEq<&[u8]> for StringView<'_> {
    fn eq(&self, other: &&[u8]) -> bool {
        self.bytes == *other
    }
}

impl<const N: usize> PartialEq<&[u8; N]> for StringView<'_> {
    fn eq(&self, other: &&[u8; N]) -> bool {
        self.bytes == &other[..]
    }
}

impl PartialEq<str> for StringView<'_> {
    fn eq(&self, other: &str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<&str> for StringView<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl Hash for StringView<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl AsRef<[u8]> for StringView<'_> {
    fn as_ref(&self) -> &[u8] {
        self.bytes
    }
}

impl<'a> From<&'a [u8]> for StringView<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        StringView::new(bytes)
    }
}

impl<'a> From<&'a str> for StringView<'a> {
    fn from(s: &'a str) -> Self {
        StringView::new(s.as_bytes())
    }
}

impl fmt::Debug for StringView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

impl fmt::Display for StringView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn v(s: &str) -> StringView<'_> {
        StringView::from(s)
    }

    #[test]
    fn test_slice_bounds() {
        let view = v("hello world");
        assert_eq!(view.slice(6).unwrap(), "world");
        assert_eq!(view.slice_len(0, 5).unwrap(), "hello");
        assert_eq!(view.slice(11).unwrap(), "");
        assert!(matches!(view.slice(12), Err(XmlError::OutOfRange { .. })));
        assert!(matches!(view.slice_len(6, 6), Err(XmlError::OutOfRange { .. })));
        assert!(view.slice_len(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_trim() {
        let view = v(" \t\r\nabc \n");
        assert_eq!(view.trim(), "abc");
        assert_eq!(view.trim_start(), "abc \n");
        assert_eq!(view.trim_end(), " \t\r\nabc");
        assert_eq!(v("   ").trim(), "");
    }

    #[test]
    fn test_search() {
        let view = v("a:b:c");
        assert!(view.starts_with(b'a'));
        assert!(view.starts_with("a:"));
        assert!(view.ends_with(b":c"));
        assert!(view.contains(':'));
        assert_eq!(view.index_of(b':'), Some(1));
        assert_eq!(view.index_of_from(b':', 2), Some(3));
        assert_eq!(view.last_index_of(':'), Some(3));
        assert_eq!(view.range_of("b:c"), Some(2..5));
        assert_eq!(view.index_of("zz"), None);
        assert!(v("naïve").contains('ï'));
    }

    #[test]
    fn test_split() {
        let parts: Vec<_> = v("a,,b,").split(b',').collect();
        assert_eq!(parts, vec![v("a"), v(""), v("b"), v("")]);

        let (prefix, local) = v("xmlns:p").split2(b':').unwrap();
        assert_eq!(prefix, "xmlns");
        assert_eq!(local, "p");
        assert!(v("plain").split2(b':').is_none());
    }

    #[test]
    fn test_parse_signed() {
        assert_eq!(v("42").parse_int::<i32>().unwrap(), 42);
        assert_eq!(v("+007").parse_int::<i8>().unwrap(), 7);
        assert_eq!(v("-128").parse_int::<i8>().unwrap(), -128);
        assert!(v("128").parse_int::<i8>().is_err());
        assert_eq!(v("-9223372036854775808").parse_int::<i64>().unwrap(), i64::MIN);
        assert!(v("9223372036854775808").parse_int::<i64>().is_err());
        assert!(v("").parse_int::<i32>().is_err());
        assert!(v("-").parse_int::<i32>().is_err());
        assert!(v(" 1").parse_int::<i32>().is_err());
        assert!(v("1e3").parse_int::<i32>().is_err());
    }

    #[test]
    fn test_parse_unsigned() {
        assert_eq!(v("255").parse_int::<u8>().unwrap(), 255);
        assert!(v("256").parse_int::<u8>().is_err());
        assert!(v("-1").parse_int::<u32>().is_err());
        assert_eq!(v("+0").parse_int::<u16>().unwrap(), 0);
        assert_eq!(v("18446744073709551615").parse_int::<u64>().unwrap(), u64::MAX);
        assert!(v("18446744073709551616").parse_int::<u64>().is_err());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(v("1.5").parse_f64().unwrap(), 1.5);
        assert_eq!(v("-2e3").parse_f32().unwrap(), -2000.0);
        assert!(v("NaN").parse_f64().unwrap().is_nan());
        assert_eq!(v("-INF").parse_f64().unwrap(), f64::NEG_INFINITY);
        assert_eq!(v("+∞").parse_f64().unwrap(), f64::INFINITY);
        assert_eq!(v("-∞").parse_f32().unwrap(), f32::NEG_INFINITY);
        assert!(v("abc").parse_f64().is_err());
    }

    #[test]
    fn test_equality_and_identity() {
        let a = b"<x>abc</x><y>abc</y>";
        let first = StringView::new(&a[3..6]);
        let second = StringView::new(&a[13..16]);
        assert_eq!(first, second);
        assert_eq!(first.content_hash(9), second.content_hash(9));
        assert!(!first.same_identity(&second));
        assert!(first.same_identity(&StringView::new(&a[3..6])));
    }

    #[test]
    fn test_offset_in() {
        let input = b"hello world";
        let view = StringView::new(&input[6..11]);
        assert_eq!(view.offset_in(input), Some(6));
        let other = b"world".to_vec();
        assert_eq!(StringView::new(&other).offset_in(input), None);
    }
}
