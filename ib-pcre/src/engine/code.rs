/*!
Byte layout of compiled code.

```text
+------------------------------------------------------------------+
| magic "IBPC" | size u32 | options u32                            |
| capture_count u16 | name_count u16 | name_entry_size u16 | version u16 |
+------------------------------------------------------------------+
| name table: name_count × name_entry_size                         |
|   index u16 (big endian) | name | NUL padding                    |
+------------------------------------------------------------------+
| program: canonical UTF-8 regex                                   |
+------------------------------------------------------------------+
```

Header integers are little endian. Name table records are sorted by name. The program is the compiled pattern printed back as regex syntax, so two sources compiling to the same program produce identical code.
*/
use std::ops::Range;

use itertools::Itertools;

use crate::{
    error::{codes, Error, Result},
    options::Options,
};

pub const MAGIC: [u8; 4] = *b"IBPC";
pub const VERSION: u16 = 1;
pub const HEADER_LEN: usize = 20;
/// Width of the `size` field.
pub const LINK_SIZE: usize = 4;

/// The fixed-size header of compiled code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Total size of the code in bytes, header included.
    pub size: u32,
    /// Effective options.
    pub options: u32,
    pub capture_count: u16,
    pub name_count: u16,
    pub name_entry_size: u16,
    pub version: u16,
}

impl Header {
    /// Read and validate the header of `code`.
    ///
    /// Checks the magic, the version, that `code` holds at least `size` bytes and that the name table lies within `size`. Nothing past the header is interpreted.
    pub fn parse(code: &[u8]) -> Result<Self> {
        let header = code
            .get(..HEADER_LEN)
            .ok_or_else(|| Error::InvalidCode(format!("truncated header: {} bytes", code.len())))?;
        if header[..4] != MAGIC {
            return Err(Error::InvalidCode("bad magic".into()));
        }
        let u16_at = |i: usize| u16::from_le_bytes([header[i], header[i + 1]]);
        let this = Self {
            size: u32::from_le_bytes([header[4], header[5], header[6], header[7]]),
            options: u32::from_le_bytes([header[8], header[9], header[10], header[11]]),
            capture_count: u16_at(12),
            name_count: u16_at(14),
            name_entry_size: u16_at(16),
            version: u16_at(18),
        };
        if this.version != VERSION {
            return Err(Error::InvalidCode(format!(
                "unsupported version {}",
                this.version
            )));
        }
        let size = this.size as usize;
        if size > code.len() {
            return Err(Error::InvalidCode(format!(
                "declared size {size} exceeds {} bytes",
                code.len()
            )));
        }
        if this.name_table().end > size {
            return Err(Error::InvalidCode("name table out of bounds".into()));
        }
        if this.name_count != 0 && this.name_entry_size < 3 {
            return Err(Error::InvalidCode(format!(
                "name entry size {} too small",
                this.name_entry_size
            )));
        }
        Ok(this)
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.options.to_le_bytes());
        out.extend_from_slice(&self.capture_count.to_le_bytes());
        out.extend_from_slice(&self.name_count.to_le_bytes());
        out.extend_from_slice(&self.name_entry_size.to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
    }

    pub fn options(&self) -> Options {
        Options::from_bits_retain(self.options)
    }

    /// Byte range of the name table.
    pub fn name_table(&self) -> Range<usize> {
        HEADER_LEN..HEADER_LEN + self.name_count as usize * self.name_entry_size as usize
    }

    /// Byte range of the program.
    pub fn program(&self) -> Range<usize> {
        self.name_table().end..self.size as usize
    }
}

/// A name table record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameEntry<'c> {
    /// 1-based group index.
    pub index: u16,
    /// Name bytes up to the first NUL.
    pub name: &'c [u8],
}

/// Name table records of `code`, in table order.
pub fn names<'c>(code: &'c [u8], header: &Header) -> impl Iterator<Item = NameEntry<'c>> {
    let table = &code[header.name_table()];
    // An empty table has an entry size of 0
    let entry_size = (header.name_entry_size as usize).max(1);
    table.chunks_exact(entry_size).map(|entry| {
        let name = &entry[2..];
        let len = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        NameEntry {
            index: u16::from_be_bytes([entry[0], entry[1]]),
            name: &name[..len],
        }
    })
}

/// The program text of `code`.
pub fn program<'c>(code: &'c [u8], header: &Header) -> Result<&'c str> {
    std::str::from_utf8(&code[header.program()])
        .map_err(|e| Error::InvalidCode(format!("program is not UTF-8: {e}")))
}

/// Lay out compiled code.
///
/// `names` are `(index, name)` pairs of the named groups.
pub fn build(
    options: Options,
    capture_count: usize,
    names: &[(usize, &str)],
    program: &str,
) -> Result<Box<[u8]>> {
    let too_many = |message: String| Error::Compile {
        code: codes::TOO_MANY_GROUPS,
        message,
        position: 0,
    };
    let capture_count = u16::try_from(capture_count)
        .map_err(|_| too_many(format!("too many capture groups: {capture_count}")))?;
    let name_count = u16::try_from(names.len())
        .map_err(|_| too_many(format!("too many named groups: {}", names.len())))?;
    let name_entry_size = match names.iter().map(|(_, name)| name.len()).max() {
        Some(max) => u16::try_from(2 + max + 1)
            .map_err(|_| too_many(format!("group name too long: {max} bytes")))?,
        None => 0,
    };

    let program_start = HEADER_LEN + name_count as usize * name_entry_size as usize;
    let size = program_start + program.len();
    let header = Header {
        size: u32::try_from(size).map_err(|_| Error::Compile {
            code: codes::TOO_BIG,
            message: format!("compiled code too large: {size} bytes"),
            position: 0,
        })?,
        options: options.bits(),
        capture_count,
        name_count,
        name_entry_size,
        version: VERSION,
    };

    let mut out = Vec::new();
    out.try_reserve_exact(size)?;
    header.write(&mut out);

    for &(index, name) in names.iter().sorted_unstable_by_key(|&&(_, name)| name) {
        // Bounded by capture_count
        out.extend_from_slice(&(index as u16).to_be_bytes());
        out.extend_from_slice(name.as_bytes());
        out.resize(out.len() + name_entry_size as usize - 2 - name.len(), 0);
    }
    out.extend_from_slice(program.as_bytes());
    debug_assert_eq!(out.len(), size);

    Ok(out.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let code = build(
            Options::CASELESS | Options::UCP,
            3,
            &[(1, "year"), (3, "day"), (2, "mo")],
            "a(b)",
        )
        .unwrap();
        let header = Header::parse(&code).unwrap();
        assert_eq!(header.size as usize, code.len());
        assert_eq!(header.options(), Options::CASELESS | Options::UCP);
        assert_eq!(header.capture_count, 3);
        assert_eq!(header.name_count, 3);
        assert_eq!(header.name_entry_size, 2 + 4 + 1);
        assert_eq!(&code[..4], b"IBPC");

        let names: Vec<_> = names(&code, &header).collect();
        assert_eq!(
            names,
            [
                NameEntry { index: 3, name: b"day" },
                NameEntry { index: 2, name: b"mo" },
                NameEntry { index: 1, name: b"year" },
            ]
        );
        assert_eq!(&code[HEADER_LEN..HEADER_LEN + 7], b"\x00\x03day\x00\x00");
        assert_eq!(program(&code, &header).unwrap(), "a(b)");
    }

    #[test]
    fn no_names() {
        let code = build(Options::empty(), 0, &[], "abc").unwrap();
        let header = Header::parse(&code).unwrap();
        assert_eq!(header.name_entry_size, 0);
        assert_eq!(names(&code, &header).count(), 0);
        assert_eq!(code.len(), HEADER_LEN + 3);
    }

    #[test]
    fn invalid() {
        let code = build(Options::empty(), 1, &[(1, "n")], "(?P<n>x)").unwrap();

        assert!(matches!(Header::parse(&code[..10]), Err(Error::InvalidCode(_))));
        assert!(matches!(Header::parse(b"PCRE1234567890123456789"), Err(Error::InvalidCode(_))));

        let mut bad = code.to_vec();
        bad[18] = 9;
        assert!(matches!(Header::parse(&bad), Err(Error::InvalidCode(_))));

        // Truncated body
        assert!(matches!(Header::parse(&code[..code.len() - 1]), Err(Error::InvalidCode(_))));

        let mut bad = code.to_vec();
        bad[14] = 200;
        assert!(matches!(Header::parse(&bad), Err(Error::InvalidCode(_))));

        // Trailing bytes are not part of the code
        let mut long = code.to_vec();
        long.extend_from_slice(b"junk");
        assert_eq!(Header::parse(&long).unwrap().size as usize, code.len());
    }
}
