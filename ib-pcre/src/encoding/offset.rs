/*!
Translation between byte offsets in a transcoded UTF-8 buffer and offsets in the caller's original string.

Both directions walk the buffer once from offset 0 and resolve all requested positions in that single pass, so positions must be given in non-decreasing order. An unset span is simply not passed in.

Successive searches over one buffer walk from a [`Cursor`] at the previous match instead, so iterating over all matches stays linear.
*/
use ib_unicode::utf8;

/// How offsets of the caller's string relate to byte offsets of the searched buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OffsetMap {
    /// Byte offsets are the caller's offsets.
    #[default]
    Identity,
    /// One unit per code point (Latin-1 bytes, Unicode scalars, UTF-32 units).
    Scalars,
    /// One unit per code point in the BMP, two for the others (UTF-16 code units).
    Utf16,
}

/// A byte offset into the buffer together with the same offset in the caller's units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Cursor {
    pub byte: usize,
    pub unit: usize,
}

impl OffsetMap {
    #[inline]
    pub fn is_identity(self) -> bool {
        self == OffsetMap::Identity
    }

    #[inline]
    fn units_of(self, bytes: &[u8]) -> usize {
        match self {
            OffsetMap::Identity => bytes.len(),
            OffsetMap::Scalars => utf8::count_chars(bytes),
            OffsetMap::Utf16 => utf8::count_utf16_units(bytes),
        }
    }

    #[inline]
    fn units_of_sequence(self, len: usize) -> usize {
        match self {
            OffsetMap::Utf16 if len == 4 => 2,
            _ => 1,
        }
    }

    /// Translate byte offsets in `buf` to the caller's units, in place.
    ///
    /// Offsets past the end of `buf` are clamped to its end.
    ///
    /// ```
    /// use ib_pcre::encoding::OffsetMap;
    ///
    /// let buf = "é😀a".as_bytes();
    /// let (mut start, mut end) = (2, 6);
    /// OffsetMap::Utf16.byte_to_char(buf, [&mut start, &mut end]);
    /// assert_eq!((start, end), (1, 3));
    /// ```
    pub fn byte_to_char<'a>(self, buf: &[u8], positions: impl IntoIterator<Item = &'a mut usize>) {
        self.byte_to_char_from(buf, Cursor::default(), positions);
    }

    /// [`OffsetMap::byte_to_char()`] walking from `from` instead of the start of `buf`.
    ///
    /// No position may be before `from.byte`.
    ///
    /// ```
    /// use ib_pcre::encoding::{Cursor, OffsetMap};
    ///
    /// let buf = "é😀a".as_bytes();
    /// let mut end = 7;
    /// OffsetMap::Utf16.byte_to_char_from(buf, Cursor { byte: 6, unit: 3 }, [&mut end]);
    /// assert_eq!(end, 4);
    /// ```
    pub fn byte_to_char_from<'a>(
        self,
        buf: &[u8],
        from: Cursor,
        positions: impl IntoIterator<Item = &'a mut usize>,
    ) {
        if self.is_identity() {
            return;
        }
        let Cursor { mut byte, unit: mut units } = from;
        for pos in positions {
            let target = (*pos).min(buf.len());
            debug_assert!(target >= byte, "offsets must be non-decreasing");
            if target > byte {
                units += self.units_of(&buf[byte..target]);
                byte = target;
            }
            *pos = units;
        }
    }

    /// Translate offsets in the caller's units to byte offsets in `buf`, in place.
    ///
    /// Offsets past the end of the string are clamped to `buf.len()`. A UTF-16 offset pointing between the two halves of a surrogate pair resolves to the end of that code point.
    pub fn char_to_byte<'a>(self, buf: &[u8], positions: impl IntoIterator<Item = &'a mut usize>) {
        if self.is_identity() {
            return;
        }
        let mut byte = 0;
        let mut units = 0;
        let mut prev = 0;
        for pos in positions {
            debug_assert!(*pos >= prev, "offsets must be non-decreasing");
            prev = *pos;
            while units < *pos && byte < buf.len() {
                let len = utf8::sequence_len(buf[byte]);
                units += self.units_of_sequence(len);
                byte = (byte + len).min(buf.len());
            }
            *pos = byte;
        }
    }
}
