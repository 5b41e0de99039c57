//! XML Entity Table and Resolution
//!
//! Custom entities declared in the DOCTYPE internal subset live in a
//! fixed-capacity open-addressing table (linear probing, empty key marks a
//! free slot). Lookups of a reference `&name;` go:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos; (never stored)
//! - Numeric character references: &#123; &#x7B;
//! - The table
//!
//! Resolution is two-step: [`EntityTable::check_need_to_resolve`] reports
//! whether a string needs work and how long the result will be, then
//! [`EntityTable::resolve`] writes into a caller buffer. [`EntityTable::decode`]
//! wraps both and stays zero-copy when nothing needs resolving.
//!
//! Each declaration's resolved length is computed once when it is added, so
//! measuring a string costs O(len) no matter how deeply entities nest. A `;`
//! that does not close a reference is ordinary text.

use super::hash::{hash32, process_seed};
use super::view::StringView;
use crate::error::{Result, XmlError};
use memchr::{memchr, memchr2};
use std::borrow::Cow;

/// Outcome of [`EntityTable::check_need_to_resolve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStatus {
    /// No references; the text can be used as-is
    NoNeeded,
    /// Every reference resolves
    NeedToResolve,
    /// Malformed or unknown reference
    CannotResolve,
}

/// Slots per declared entity
const LOAD_FACTOR: usize = 3;

/// Longest text a resolution may produce; anything larger is CannotResolve
pub const MAX_EXPANDED_LEN: usize = 16 * 1024 * 1024;

/// The five XML-mandated entities
#[inline]
pub fn predefined(name: &[u8]) -> Option<&'static [u8]> {
    match name {
        b"lt" => Some(b"<"),
        b"gt" => Some(b">"),
        b"amp" => Some(b"&"),
        b"quot" => Some(b"\""),
        b"apos" => Some(b"'"),
        _ => None,
    }
}

/// What a single `&name;` expands to
enum Replacement<'a> {
    Bytes(&'static [u8]),
    Char([u8; 4], usize),
    /// Replacement text and its resolved length, `None` when it cannot resolve
    Entity(StringView<'a>, Option<usize>),
}

/// Position of the next reference in `s` at or after `from`
enum RefScan {
    Done,
    /// `(amp, semi)` offsets
    Found(usize, usize),
    /// Offset of the malformed construct
    Malformed(usize),
}

fn next_reference(s: &[u8], from: usize) -> RefScan {
    let open = match memchr(b'&', &s[from..]) {
        None => return RefScan::Done,
        Some(i) => from + i,
    };
    match memchr2(b'&', b';', &s[open + 1..]) {
        // '&' never closed
        None => RefScan::Malformed(open),
        Some(i) if s[open + 1 + i] == b'&' => RefScan::Malformed(open + 1 + i),
        Some(i) => RefScan::Found(open, open + 1 + i),
    }
}

/// Decode a numeric character reference body (after '#')
fn decode_char_ref(digits: &[u8]) -> Option<([u8; 4], usize)> {
    let text = std::str::from_utf8(digits).ok()?;
    let codepoint = match text.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => text.parse::<u32>().ok()?,
    };
    if !is_valid_xml_char(codepoint) {
        return None;
    }
    let c = char::from_u32(codepoint)?;
    let mut buf = [0u8; 4];
    let len = c.encode_utf8(&mut buf).len();
    Some((buf, len))
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot<'a> {
    key: StringView<'a>,
    value: StringView<'a>,
    /// Length of `value` once resolved, `None` when it cannot resolve
    resolved_len: Option<usize>,
}

/// Fixed-capacity map from entity name to replacement text
#[derive(Debug, Clone)]
pub struct EntityTable<'a> {
    slots: Box<[Slot<'a>]>,
    len: usize,
    seed: u32,
}

impl Default for EntityTable<'_> {
    fn default() -> Self {
        EntityTable::with_seed(0, process_seed())
    }
}

impl<'a> EntityTable<'a> {
    /// Table sized for `declared` entities, using the process-wide seed
    pub fn new(declared: usize) -> Self {
        Self::with_seed(declared, process_seed())
    }

    /// Table sized for `declared` entities with an explicit hash seed
    pub fn with_seed(declared: usize, seed: u32) -> Self {
        let capacity = declared.saturating_mul(LOAD_FACTOR);
        EntityTable {
            slots: vec![Slot::default(); capacity].into_boxed_slice(),
            len: 0,
            seed,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn home_slot(&self, key: &[u8]) -> usize {
        hash32(key, self.seed) as usize % self.slots.len()
    }

    /// Insert a declaration. Returns false for an empty or duplicate key,
    /// or when every slot is taken.
    ///
    /// The value may only reference entities already in the table; anything
    /// else leaves the entry in place but unresolvable.
    pub fn try_add(&mut self, key: StringView<'a>, value: StringView<'a>) -> bool {
        if key.is_empty() || self.len >= self.slots.len() {
            return false;
        }
        let resolved_len = self.measure(value.as_bytes()).map(|(_, len)| len);
        let capacity = self.slots.len();
        let mut slot = self.home_slot(key.as_bytes());
        loop {
            let existing = self.slots[slot].key;
            if existing.is_empty() {
                self.slots[slot] = Slot {
                    key,
                    value,
                    resolved_len,
                };
                self.len += 1;
                return true;
            }
            if existing == key {
                return false;
            }
            slot = (slot + 1) % capacity;
        }
    }

    fn find_slot(&self, key: &[u8]) -> Option<&Slot<'a>> {
        if key.is_empty() || self.slots.is_empty() {
            return None;
        }
        let capacity = self.slots.len();
        let mut slot = self.home_slot(key);
        for _ in 0..capacity {
            let entry = &self.slots[slot];
            if entry.key.is_empty() {
                return None;
            }
            if entry.key == key {
                return Some(entry);
            }
            slot = (slot + 1) % capacity;
        }
        None
    }

    /// Replacement text of a declared entity
    pub fn try_get(&self, key: &[u8]) -> Option<StringView<'a>> {
        self.find_slot(key).map(|entry| entry.value)
    }

    /// Declared entities in slot order
    pub fn iter(&self) -> impl Iterator<Item = (StringView<'a>, StringView<'a>)> + '_ {
        self.slots
            .iter()
            .filter(|entry| !entry.key.is_empty())
            .map(|entry| (entry.key, entry.value))
    }

    /// True when `s` is well formed and every reference in it names a
    /// predefined entity, a valid character, or an entry already in the table.
    /// Only the top level is inspected; entries were checked when added.
    pub fn references_declared(&self, s: StringView<'_>) -> bool {
        let s = s.as_bytes();
        let mut pos = 0;
        loop {
            match next_reference(s, pos) {
                RefScan::Done => return true,
                RefScan::Malformed(_) => return false,
                RefScan::Found(amp, semi) => {
                    if self.lookup(&s[amp + 1..semi]).is_none() {
                        return false;
                    }
                    pos = semi + 1;
                }
            }
        }
    }

    fn lookup(&self, name: &[u8]) -> Option<Replacement<'a>> {
        if let Some(bytes) = predefined(name) {
            return Some(Replacement::Bytes(bytes));
        }
        if let Some(digits) = name.strip_prefix(b"#") {
            return decode_char_ref(digits).map(|(buf, len)| Replacement::Char(buf, len));
        }
        self.find_slot(name)
            .map(|entry| Replacement::Entity(entry.value, entry.resolved_len))
    }

    /// Resolved length of `s` and whether it holds references; `None` when
    /// something cannot be resolved or the result would pass
    /// [`MAX_EXPANDED_LEN`]. Entity lengths come from their slots.
    fn measure(&self, s: &[u8]) -> Option<(bool, usize)> {
        if memchr(b'&', s).is_none() {
            return Some((false, s.len()));
        }
        let mut total = 0usize;
        let mut pos = 0;
        loop {
            match next_reference(s, pos) {
                RefScan::Done => {
                    total = total.checked_add(s.len() - pos)?;
                    break;
                }
                RefScan::Malformed(_) => return None,
                RefScan::Found(amp, semi) => {
                    let replacement_len = match self.lookup(&s[amp + 1..semi])? {
                        Replacement::Bytes(b) => b.len(),
                        Replacement::Char(_, len) => len,
                        Replacement::Entity(_, len) => len?,
                    };
                    total = total.checked_add(amp - pos)?.checked_add(replacement_len)?;
                    if total > MAX_EXPANDED_LEN {
                        return None;
                    }
                    pos = semi + 1;
                }
            }
        }
        (total <= MAX_EXPANDED_LEN).then_some((true, total))
    }

    /// Decide whether `s` contains references, and the length it resolves to
    pub fn check_need_to_resolve(&self, s: StringView<'_>) -> (ResolveStatus, usize) {
        match self.measure(s.as_bytes()) {
            Some((false, len)) => (ResolveStatus::NoNeeded, len),
            Some((true, len)) => (ResolveStatus::NeedToResolve, len),
            None => (ResolveStatus::CannotResolve, 0),
        }
    }

    /// Write the resolved form of `s` into `out`, returning the bytes written
    pub fn resolve(&self, s: StringView<'_>, out: &mut [u8]) -> Result<usize> {
        let required = match self.measure(s.as_bytes()) {
            Some((_, len)) => len,
            None => return Err(self.locate_failure(s.as_bytes())),
        };
        if required > out.len() {
            return Err(XmlError::BufferTooSmall {
                required,
                available: out.len(),
            });
        }
        Ok(self.write_resolved(s.as_bytes(), out, 0))
    }

    /// Copy literal runs and substitute references. Only called after
    /// `measure` succeeded, so every lookup resolves and `out` is large enough.
    /// An entry only references entries added before it, which bounds the
    /// recursion by the table size.
    fn write_resolved(&self, s: &[u8], out: &mut [u8], mut written: usize) -> usize {
        let mut pos = 0;
        while let RefScan::Found(amp, semi) = next_reference(s, pos) {
            let literal = &s[pos..amp];
            out[written..written + literal.len()].copy_from_slice(literal);
            written += literal.len();
            match self.lookup(&s[amp + 1..semi]) {
                Some(Replacement::Bytes(b)) => {
                    out[written..written + b.len()].copy_from_slice(b);
                    written += b.len();
                }
                Some(Replacement::Char(buf, len)) => {
                    out[written..written + len].copy_from_slice(&buf[..len]);
                    written += len;
                }
                Some(Replacement::Entity(v, _)) => {
                    written = self.write_resolved(v.as_bytes(), out, written);
                }
                None => {}
            }
            pos = semi + 1;
        }
        let tail = &s[pos..];
        out[written..written + tail.len()].copy_from_slice(tail);
        written + tail.len()
    }

    /// Byte offset of the first construct that fails to resolve
    fn locate_failure(&self, s: &[u8]) -> XmlError {
        let mut pos = 0;
        loop {
            match next_reference(s, pos) {
                RefScan::Done => {
                    return XmlError::format("Entity expansion too large", 0);
                }
                RefScan::Malformed(at) => {
                    return XmlError::format("Malformed entity reference", at);
                }
                RefScan::Found(amp, semi) => {
                    let name = &s[amp + 1..semi];
                    let ok = match self.lookup(name) {
                        Some(Replacement::Entity(_, len)) => len.is_some(),
                        Some(_) => true,
                        None => false,
                    };
                    if !ok {
                        return XmlError::format(
                            format!("Unresolved entity: &{};", String::from_utf8_lossy(name)),
                            amp,
                        );
                    }
                    pos = semi + 1;
                }
            }
        }
    }

    /// Resolve `s`, borrowing when it holds no references
    pub fn decode(&self, s: StringView<'a>) -> Result<Cow<'a, [u8]>> {
        match self.check_need_to_resolve(s) {
            (ResolveStatus::NoNeeded, _) => Ok(Cow::Borrowed(s.as_bytes())),
            (ResolveStatus::CannotResolve, _) => Err(XmlError::CannotResolve),
            (ResolveStatus::NeedToResolve, len) => {
                let mut out = vec![0u8; len];
                let written = self.resolve(s, &mut out)?;
                out.truncate(written);
                Ok(Cow::Owned(out))
            }
        }
    }

    /// [`decode`](Self::decode) as text; invalid UTF-8 is replaced
    pub fn decode_str(&self, s: StringView<'a>) -> Result<Cow<'a, str>> {
        Ok(match self.decode(s)? {
            Cow::Borrowed(b) => String::from_utf8_lossy(b),
            Cow::Owned(v) => Cow::Owned(String::from_utf8_lossy(&v).into_owned()),
        })
    }
}
