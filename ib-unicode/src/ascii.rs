/// Returns the index of the first non-ASCII byte in this byte string (if
/// any such indices exist). Specifically, it returns the index of the
/// first byte with a value greater than or equal to `0x80`.
///
/// # Examples
///
/// Basic usage:
///
/// ```
/// use ib_unicode::ascii::find_non_ascii_byte;
///
/// assert_eq!(Some(3), find_non_ascii_byte(b"abc\xff"));
/// assert_eq!(None, find_non_ascii_byte(b"abcde"));
/// assert_eq!(Some(0), find_non_ascii_byte("😀".as_bytes()));
/// ```
#[cfg_attr(feature = "perf-ascii", inline)]
pub fn find_non_ascii_byte(b: &[u8]) -> Option<usize> {
    #[cfg(not(feature = "perf-ascii"))]
    return b.iter().position(|&b| b > 0x7F);
    #[cfg(feature = "perf-ascii")]
    // sse2 (128) on x86_64, usize chunk on others
    bstr::ByteSlice::find_non_ascii_byte(b)
}

/// Whether every byte is below `0x80`.
#[inline]
pub fn is_ascii(b: &[u8]) -> bool {
    find_non_ascii_byte(b).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_ascii() {
        assert_eq!(find_non_ascii_byte(b""), None);
        assert_eq!(find_non_ascii_byte(&[b'a'; 100]), None);

        let mut long = vec![b'a'; 100];
        long[77] = 0xE9;
        assert_eq!(find_non_ascii_byte(&long), Some(77));
        assert!(!is_ascii(&long));
        assert!(is_ascii(b"plain text\n"));
    }
}
