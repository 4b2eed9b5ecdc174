/*!
UTF-8 byte level helpers.

All functions here operate on bytes and never validate: a byte is a *lead byte* iff its top two bits are not `10`, so counting lead bytes of valid UTF-8 counts code points.
*/

/// Whether `b` starts a UTF-8 sequence (or is ASCII).
#[inline]
pub const fn is_lead_byte(b: u8) -> bool {
    (b & 0xC0) != 0x80
}

/// Length of the UTF-8 sequence started by the lead byte `b`.
///
/// Continuation bytes are treated as sequences of length 1.
#[inline]
pub const fn sequence_len(b: u8) -> usize {
    match b {
        0x00..=0xBF => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xFF => 4,
    }
}

/// Number of code points in `b`, i.e. the number of lead bytes.
///
/// ```
/// use ib_unicode::utf8::count_chars;
///
/// assert_eq!(count_chars("abc".as_bytes()), 3);
/// assert_eq!(count_chars("拼音".as_bytes()), 2);
/// ```
#[inline]
pub fn count_chars(b: &[u8]) -> usize {
    b.iter().filter(|&&b| is_lead_byte(b)).count()
}

/// Number of UTF-16 code units needed for the code points in `b`.
///
/// Code points encoded with 4 bytes are outside the BMP and take a surrogate pair.
///
/// ```
/// use ib_unicode::utf8::count_utf16_units;
///
/// assert_eq!(count_utf16_units("a😀".as_bytes()), 3);
/// ```
#[inline]
pub fn count_utf16_units(b: &[u8]) -> usize {
    b.iter()
        .map(|&b| match b {
            0xF0..=0xFF => 2,
            b if is_lead_byte(b) => 1,
            _ => 0,
        })
        .sum()
}

/// Encode Latin-1 `bytes` as UTF-8 and append them to `out`.
///
/// Bytes below `0x80` are copied; every other byte `c` becomes the two bytes `0xC0 | (c >> 6), 0x80 | (c & 0x3F)`.
///
/// ```
/// use ib_unicode::utf8::push_latin1;
///
/// let mut out = Vec::new();
/// push_latin1(&mut out, b"caf\xe9");
/// assert_eq!(out, "café".as_bytes());
/// ```
pub fn push_latin1(out: &mut Vec<u8>, bytes: &[u8]) {
    for &c in bytes {
        if c < 0x80 {
            out.push(c);
        } else {
            out.push(0xC0 | (c >> 6));
            out.push(0x80 | (c & 0x3F));
        }
    }
}

/// Size of `bytes` after [`push_latin1()`].
#[inline]
pub fn latin1_len(bytes: &[u8]) -> usize {
    bytes.len() + bytes.iter().filter(|&&c| c >= 0x80).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_bytes() {
        let s = "aé拼😀";
        let b = s.as_bytes();
        assert_eq!(count_chars(b), 4);
        assert_eq!(count_utf16_units(b), 5);
        assert_eq!(b.iter().filter(|&&b| is_lead_byte(b)).count(), 4);
        assert_eq!(sequence_len(b[0]), 1);
        assert_eq!(sequence_len(b[1]), 2);
        assert_eq!(sequence_len(b[3]), 3);
        assert_eq!(sequence_len(b[6]), 4);
        assert_eq!(sequence_len(0x80), 1);
    }

    #[test]
    fn latin1() {
        let all: Vec<u8> = (0..=255).collect();
        let mut out = Vec::new();
        push_latin1(&mut out, &all);
        assert_eq!(out.len(), latin1_len(&all));
        let expected: String = all.iter().map(|&b| b as char).collect();
        assert_eq!(out, expected.as_bytes());
    }
}
