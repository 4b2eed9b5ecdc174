/*!
Input strings and their normalization into the UTF-8 byte stream the engine searches.

A [`Subject`] is any of the accepted string shapes. [`normalize()`] turns it into a [`Normalized`] buffer: the subject's own bytes when they are already usable, or a transcoded copy together with the [`OffsetMap`] that maps its byte offsets back to the subject's units.

| Subject | Units | Transcoding |
| --- | --- | --- |
| [`Subject::Str`] | bytes | never |
| [`Subject::Bytes`] | bytes | Latin-1 → UTF-8 if any byte ≥ 0x80, unless [`Options::UTF8`] |
| [`Subject::Chars`] | scalars | always (UTF-8 encoding) |
| [`Subject::Utf16`] | UTF-16 code units | always |
| [`Subject::Utf32`] | UTF-32 code units | always |
| [`Subject::Buffer`] | items | as bytes, UTF-16 or UTF-32 by item size |
*/
use std::{
    borrow::Cow,
    ops::{Deref, Range},
    sync::Arc,
};

use ib_unicode::{ascii, utf8};
use log::trace;
use widestring::{U16Str, U16String, U32Str, U32String};

use crate::{
    error::{Error, Result},
    options::Options,
};

pub mod offset;

pub use offset::{Cursor, OffsetMap};

/// A string as supplied by the caller.
///
/// All offsets reported for a subject (match spans, error positions) are in its own [units](self#).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subject<'s> {
    /// Native UTF-8 string. Offsets are byte offsets.
    Str(&'s str),
    /// 8-bit string: Latin-1, or UTF-8 when [`Options::UTF8`] is in effect.
    Bytes(&'s [u8]),
    /// Unicode scalar sequence.
    Chars(&'s [char]),
    Utf16(&'s U16Str),
    Utf32(&'s U32Str),
    /// Raw contiguous buffer of 1, 2 or 4 byte items.
    Buffer(Buffer<'s>),
}

/// A raw 1-dimensional buffer view with native endian items of 1, 2 or 4 bytes.
///
/// 2-byte items are read as UTF-16 and 4-byte items as UTF-32.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Buffer<'s> {
    data: &'s [u8],
    item_size: usize,
}

impl<'s> Buffer<'s> {
    /// Fails with [`Error::TypeMismatch`] for any shape other than a 1-dimensional buffer of 1, 2 or 4 byte items.
    pub fn new(data: &'s [u8], item_size: usize, ndim: usize) -> Result<Self> {
        if ndim != 1 {
            return Err(Error::TypeMismatch(format!(
                "expected a 1-dimensional buffer, got {ndim} dimensions"
            )));
        }
        if !matches!(item_size, 1 | 2 | 4) {
            return Err(Error::TypeMismatch(format!(
                "unsupported buffer item size {item_size}"
            )));
        }
        if data.len() % item_size != 0 {
            return Err(Error::TypeMismatch(format!(
                "buffer length {} is not a multiple of item size {item_size}",
                data.len()
            )));
        }
        Ok(Self { data, item_size })
    }

    pub fn data(&self) -> &'s [u8] {
        self.data
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.data.len() / self.item_size
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Items in `range`.
    pub fn get(&self, range: Range<usize>) -> Option<Self> {
        let data = self
            .data
            .get(range.start * self.item_size..range.end * self.item_size)?;
        Some(Self { data, item_size: self.item_size })
    }

    fn units16(&self) -> impl Iterator<Item = u16> + 's {
        self.data
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
    }

    fn units32(&self) -> impl Iterator<Item = u32> + 's {
        self.data
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
    }
}

impl<'s> Subject<'s> {
    /// Length in the subject's own units.
    pub fn len(&self) -> usize {
        match self {
            Subject::Str(s) => s.len(),
            Subject::Bytes(b) => b.len(),
            Subject::Chars(c) => c.len(),
            Subject::Utf16(s) => s.len(),
            Subject::Utf32(s) => s.len(),
            Subject::Buffer(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sub-string in `range` (in the subject's units), of the same shape.
    ///
    /// Returns `None` if `range` is out of bounds, or doesn't fall on `char` boundaries for [`Subject::Str`].
    pub fn get(&self, range: Range<usize>) -> Option<Subject<'s>> {
        Some(match *self {
            Subject::Str(s) => Subject::Str(s.get(range)?),
            Subject::Bytes(b) => Subject::Bytes(b.get(range)?),
            Subject::Chars(c) => Subject::Chars(c.get(range)?),
            Subject::Utf16(s) => Subject::Utf16(U16Str::from_slice(s.as_slice().get(range)?)),
            Subject::Utf32(s) => Subject::Utf32(U32Str::from_slice(s.as_slice().get(range)?)),
            Subject::Buffer(b) => Subject::Buffer(b.get(range)?),
        })
    }

    /// Decode the subject as text.
    ///
    /// 8-bit strings are read as UTF-8 if `bytes_utf8`, otherwise as Latin-1. Invalid sequences are replaced with U+FFFD.
    pub fn to_text(&self, bytes_utf8: bool) -> Cow<'s, str> {
        fn bytes_text(b: &[u8], utf8: bool) -> Cow<'_, str> {
            if utf8 {
                String::from_utf8_lossy(b)
            } else {
                match std::str::from_utf8(b) {
                    Ok(s) if ascii::is_ascii(b) => Cow::Borrowed(s),
                    _ => Cow::Owned(b.iter().map(|&b| b as char).collect()),
                }
            }
        }
        fn utf32_text(units: impl Iterator<Item = u32>) -> String {
            units
                .map(|u| char::from_u32(u).unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }

        match *self {
            Subject::Str(s) => Cow::Borrowed(s),
            Subject::Bytes(b) => bytes_text(b, bytes_utf8),
            Subject::Chars(c) => Cow::Owned(c.iter().collect()),
            Subject::Utf16(s) => Cow::Owned(String::from_utf16_lossy(s.as_slice())),
            Subject::Utf32(s) => Cow::Owned(utf32_text(s.as_slice().iter().copied())),
            Subject::Buffer(b) => match b.item_size {
                1 => bytes_text(b.data, bytes_utf8),
                2 => Cow::Owned(char::decode_utf16(b.units16()).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)).collect()),
                _ => Cow::Owned(utf32_text(b.units32())),
            },
        }
    }
}

impl PartialEq<str> for Subject<'_> {
    /// 8-bit strings are compared byte-wise with the UTF-8 bytes of `other`.
    fn eq(&self, other: &str) -> bool {
        match self {
            Subject::Bytes(b) => *b == other.as_bytes(),
            _ => self.to_text(true) == other,
        }
    }
}

impl PartialEq<&str> for Subject<'_> {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl<'s> From<&'s str> for Subject<'s> {
    fn from(s: &'s str) -> Self {
        Subject::Str(s)
    }
}

impl<'s> From<&'s String> for Subject<'s> {
    fn from(s: &'s String) -> Self {
        Subject::Str(s)
    }
}

impl<'s> From<&'s [u8]> for Subject<'s> {
    fn from(b: &'s [u8]) -> Self {
        Subject::Bytes(b)
    }
}

impl<'s, const N: usize> From<&'s [u8; N]> for Subject<'s> {
    fn from(b: &'s [u8; N]) -> Self {
        Subject::Bytes(b)
    }
}

impl<'s> From<&'s Vec<u8>> for Subject<'s> {
    fn from(b: &'s Vec<u8>) -> Self {
        Subject::Bytes(b)
    }
}

impl<'s> From<&'s [char]> for Subject<'s> {
    fn from(c: &'s [char]) -> Self {
        Subject::Chars(c)
    }
}

impl<'s> From<&'s Vec<char>> for Subject<'s> {
    fn from(c: &'s Vec<char>) -> Self {
        Subject::Chars(c)
    }
}

impl<'s> From<&'s U16Str> for Subject<'s> {
    fn from(s: &'s U16Str) -> Self {
        Subject::Utf16(s)
    }
}

impl<'s> From<&'s U16String> for Subject<'s> {
    fn from(s: &'s U16String) -> Self {
        Subject::Utf16(s.as_ustr())
    }
}

impl<'s> From<&'s [u16]> for Subject<'s> {
    fn from(s: &'s [u16]) -> Self {
        Subject::Utf16(U16Str::from_slice(s))
    }
}

impl<'s> From<&'s U32Str> for Subject<'s> {
    fn from(s: &'s U32Str) -> Self {
        Subject::Utf32(s)
    }
}

impl<'s> From<&'s U32String> for Subject<'s> {
    fn from(s: &'s U32String) -> Self {
        Subject::Utf32(s.as_ustr())
    }
}

impl<'s> From<&'s [u32]> for Subject<'s> {
    fn from(s: &'s [u32]) -> Self {
        Subject::Utf32(U32Str::from_slice(s))
    }
}

impl<'s> From<Buffer<'s>> for Subject<'s> {
    fn from(b: Buffer<'s>) -> Self {
        Subject::Buffer(b)
    }
}

/// A subject in the form the engine searches.
#[derive(Clone, Debug)]
pub struct Normalized<'s> {
    /// UTF-8 bytes, borrowed from the subject unless transcoded.
    pub bytes: Cow<'s, [u8]>,
    /// Maps byte offsets of `bytes` to the subject's units.
    pub offsets: OffsetMap,
}

impl<'s> Normalized<'s> {
    fn borrowed(bytes: &'s [u8]) -> Self {
        Self { bytes: Cow::Borrowed(bytes), offsets: OffsetMap::Identity }
    }

    /// Whether `bytes` is a transcoded copy rather than the subject itself.
    pub fn is_transcoded(&self) -> bool {
        matches!(self.bytes, Cow::Owned(_))
    }
}

/// A searched buffer kept by matches. A transcoded copy is shared by all matches of one subject.
#[derive(Clone, Debug)]
pub enum Haystack<'s> {
    Borrowed(&'s [u8]),
    Transcoded(Arc<[u8]>),
}

impl Haystack<'_> {
    pub fn is_transcoded(&self) -> bool {
        matches!(self, Haystack::Transcoded(_))
    }
}

impl<'s> From<Cow<'s, [u8]>> for Haystack<'s> {
    fn from(bytes: Cow<'s, [u8]>) -> Self {
        match bytes {
            Cow::Borrowed(b) => Haystack::Borrowed(b),
            Cow::Owned(v) => Haystack::Transcoded(v.into()),
        }
    }
}

impl Deref for Haystack<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Haystack::Borrowed(b) => b,
            Haystack::Transcoded(v) => v,
        }
    }
}

/// Normalize `subject` into a UTF-8 byte buffer.
///
/// [`Options::UTF8`] in `options` declares 8-bit subjects to be UTF-8 already. [`Options::NO_UTF8_CHECK`] is added to `options` whenever the result is known to be valid UTF-8, so the engine doesn't validate it again.
///
/// ```
/// use ib_pcre::{encoding::{normalize, OffsetMap, Subject}, Options};
///
/// let mut options = Options::empty();
/// let n = normalize(Subject::Bytes(b"caf\xe9"), &mut options)?;
/// assert_eq!(&*n.bytes, "café".as_bytes());
/// assert_eq!(n.offsets, OffsetMap::Scalars);
/// assert!(options.contains(Options::NO_UTF8_CHECK));
/// # Ok::<(), ib_pcre::Error>(())
/// ```
pub fn normalize<'s>(subject: Subject<'s>, options: &mut Options) -> Result<Normalized<'s>> {
    let normalized = match subject {
        Subject::Str(s) => {
            options.insert(Options::NO_UTF8_CHECK);
            Normalized::borrowed(s.as_bytes())
        }
        Subject::Bytes(b) => normalize_bytes(b, options)?,
        Subject::Chars(c) => {
            options.insert(Options::NO_UTF8_CHECK);
            encode(c.len(), c.iter().map(|&c| Ok(c)), OffsetMap::Scalars)?
        }
        Subject::Utf16(s) => {
            options.insert(Options::NO_UTF8_CHECK);
            encode(s.len(), decode_utf16(s.as_slice().iter().copied()), OffsetMap::Utf16)?
        }
        Subject::Utf32(s) => {
            options.insert(Options::NO_UTF8_CHECK);
            encode(s.len(), decode_utf32(s.as_slice().iter().copied()), OffsetMap::Scalars)?
        }
        Subject::Buffer(b) => match b.item_size {
            1 => normalize_bytes(b.data, options)?,
            2 => {
                options.insert(Options::NO_UTF8_CHECK);
                encode(b.len(), decode_utf16(b.units16()), OffsetMap::Utf16)?
            }
            _ => {
                options.insert(Options::NO_UTF8_CHECK);
                encode(b.len(), decode_utf32(b.units32()), OffsetMap::Scalars)?
            }
        },
    };
    trace!(
        "normalized {} units into {} bytes, transcoded: {}, offsets: {:?}",
        subject.len(),
        normalized.bytes.len(),
        normalized.is_transcoded(),
        normalized.offsets
    );
    Ok(normalized)
}

fn normalize_bytes<'s>(bytes: &'s [u8], options: &mut Options) -> Result<Normalized<'s>> {
    if options.contains(Options::UTF8) {
        return Ok(Normalized::borrowed(bytes));
    }
    // Both ASCII and our Latin-1 encoding are valid UTF-8
    options.insert(Options::NO_UTF8_CHECK);
    match ascii::find_non_ascii_byte(bytes) {
        None => Ok(Normalized::borrowed(bytes)),
        Some(i) => {
            let (ascii, rest) = bytes.split_at(i);
            let mut buf = Vec::new();
            buf.try_reserve_exact(ascii.len() + utf8::latin1_len(rest))?;
            buf.extend_from_slice(ascii);
            utf8::push_latin1(&mut buf, rest);
            Ok(Normalized { bytes: Cow::Owned(buf), offsets: OffsetMap::Scalars })
        }
    }
}

/// Encode `chars` as UTF-8. If they are all ASCII, offsets map one to one and `map` is not needed.
fn encode(
    capacity: usize,
    chars: impl Iterator<Item = Result<char>>,
    map: OffsetMap,
) -> Result<Normalized<'static>> {
    let mut buf = Vec::new();
    buf.try_reserve(capacity)?;
    let mut is_ascii = true;
    for c in chars {
        let c = c?;
        is_ascii &= c.is_ascii();
        let mut tmp = [0; 4];
        let encoded = c.encode_utf8(&mut tmp).as_bytes();
        buf.try_reserve(encoded.len())?;
        buf.extend_from_slice(encoded);
    }
    Ok(Normalized {
        bytes: Cow::Owned(buf),
        offsets: if is_ascii { OffsetMap::Identity } else { map },
    })
}

fn decode_utf16(units: impl Iterator<Item = u16>) -> impl Iterator<Item = Result<char>> {
    let mut offset = 0;
    char::decode_utf16(units).map(move |c| match c {
        Ok(c) => {
            offset += c.len_utf16();
            Ok(c)
        }
        Err(_) => Err(Error::BadUtf { offset }),
    })
}

fn decode_utf32(units: impl Iterator<Item = u32>) -> impl Iterator<Item = Result<char>> {
    units
        .enumerate()
        .map(|(offset, u)| char::from_u32(u).ok_or(Error::BadUtf { offset }))
}

#[cfg(test)]
mod tests {
    use widestring::{u16str, u32str};

    use super::*;

    fn norm(subject: Subject) -> (Normalized, Options) {
        let mut options = Options::empty();
        let n = normalize(subject, &mut options).unwrap();
        (n, options)
    }

    #[test]
    fn bytes() {
        let (n, options) = norm(Subject::Bytes(b"plain"));
        assert!(!n.is_transcoded());
        assert_eq!(n.offsets, OffsetMap::Identity);
        assert!(options.contains(Options::NO_UTF8_CHECK));

        let (n, options) = norm(Subject::Bytes(b"na\xefve \xff"));
        assert!(n.is_transcoded());
        assert_eq!(&*n.bytes, "naïve ÿ".as_bytes());
        assert_eq!(n.offsets, OffsetMap::Scalars);
        assert!(options.contains(Options::NO_UTF8_CHECK));

        // Declared UTF-8 is passed through and left to the engine to validate
        let mut options = Options::UTF8;
        let n = normalize(Subject::Bytes("naïve".as_bytes()), &mut options).unwrap();
        assert!(!n.is_transcoded());
        assert!(!options.contains(Options::NO_UTF8_CHECK));
    }

    #[test]
    fn str() {
        let (n, options) = norm(Subject::Str("拼音"));
        assert!(!n.is_transcoded());
        assert_eq!(n.offsets, OffsetMap::Identity);
        assert!(options.contains(Options::NO_UTF8_CHECK));
    }

    #[test]
    fn wide() {
        let chars: Vec<char> = "abc".chars().collect();
        let (n, _) = norm(Subject::Chars(&chars));
        assert!(n.is_transcoded());
        assert_eq!(n.offsets, OffsetMap::Identity);

        let chars: Vec<char> = "añb".chars().collect();
        let (n, _) = norm(Subject::Chars(&chars));
        assert_eq!(&*n.bytes, "añb".as_bytes());
        assert_eq!(n.offsets, OffsetMap::Scalars);

        let (n, _) = norm(Subject::Utf16(u16str!("a😀b")));
        assert_eq!(&*n.bytes, "a😀b".as_bytes());
        assert_eq!(n.offsets, OffsetMap::Utf16);

        let (n, _) = norm(Subject::Utf32(u32str!("a😀b")));
        assert_eq!(&*n.bytes, "a😀b".as_bytes());
        assert_eq!(n.offsets, OffsetMap::Scalars);
    }

    #[test]
    fn invalid_wide() {
        let units = [b'a' as u16, 0xD800, b'b' as u16];
        let mut options = Options::empty();
        assert_eq!(
            normalize(Subject::from(&units[..]), &mut options).unwrap_err(),
            Error::BadUtf { offset: 1 }
        );

        let units = [b'a' as u32, b'b' as u32, 0x11_0000];
        assert_eq!(
            normalize(Subject::from(&units[..]), &mut options).unwrap_err(),
            Error::BadUtf { offset: 2 }
        );
    }

    #[test]
    fn buffer() {
        assert!(matches!(Buffer::new(b"abc", 3, 1), Err(Error::TypeMismatch(_))));
        assert!(matches!(Buffer::new(b"ab", 1, 2), Err(Error::TypeMismatch(_))));
        assert!(matches!(Buffer::new(b"abc", 2, 1), Err(Error::TypeMismatch(_))));

        let data: Vec<u8> = "é😀".encode_utf16().flat_map(|u| u.to_ne_bytes()).collect();
        let buffer = Buffer::new(&data, 2, 1).unwrap();
        assert_eq!(buffer.len(), 3);
        let (n, _) = norm(buffer.into());
        assert_eq!(&*n.bytes, "é😀".as_bytes());
        assert_eq!(n.offsets, OffsetMap::Utf16);

        let data: Vec<u8> = "é😀".chars().flat_map(|c| (c as u32).to_ne_bytes()).collect();
        let (n, _) = norm(Buffer::new(&data, 4, 1).unwrap().into());
        assert_eq!(&*n.bytes, "é😀".as_bytes());
        assert_eq!(n.offsets, OffsetMap::Scalars);

        let (n, _) = norm(Buffer::new(b"caf\xe9", 1, 1).unwrap().into());
        assert_eq!(&*n.bytes, "café".as_bytes());
    }

    #[test]
    fn slice_and_text() {
        let s = Subject::Bytes(b"caf\xe9!");
        assert_eq!(s.get(2..4).unwrap().to_text(false), "fé");
        assert_eq!(s.get(2..9), None);

        let s = Subject::Utf16(u16str!("a😀b"));
        assert_eq!(s.len(), 4);
        assert_eq!(s.get(1..3).unwrap(), "😀");

        assert_eq!(Subject::Str("é").get(0..1), None);
        assert_eq!(Subject::Str("hello"), "hello");
    }
}
