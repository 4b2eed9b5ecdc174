/*!
Perl-compatible regular expressions over any string encoding, with match offsets in the caller's own units.

## Features
- Subjects of any common shape: UTF-8 [`str`], Latin-1 or UTF-8 bytes, [`char`] slices, UTF-16 and UTF-32 strings, and raw buffers of 1/2/4-byte items. See [`Subject`].
  - Offsets are always reported in the subject's units (bytes, characters or UTF-16 code units), never in the transcoded buffer.
  - Strings that are already UTF-8 or ASCII are searched in place without copying.
- Python `re`-style API: [`Pattern`], [`Match`] with numbered and named groups, [`match_at()`](Pattern::match_at), [`expand()`](Match::expand), [`find_iter()`](Pattern::find_iter), [`split()`](Pattern::split), [`sub()`](Pattern::sub), and one-off shortcuts such as [`search()`] that compile the pattern on each call.
- Compiled code can be [dumped](Pattern::dump) to a byte blob and [loaded](Pattern::load) back without the source.
- Custom result types via [`MatchFactory`](pattern::MatchFactory).

The engine is [`regex-automata`](https://docs.rs/regex-automata/), so searches run in linear time. Backreferences and look-around are not supported.
*/
//! ## Usage
//! ```
//! use ib_pcre::{Options, Pattern};
//! use widestring::u16str;
//!
//! let pattern = Pattern::compile(r"(?P<word>\w+)ß", Options::CASELESS)?;
//!
//! // UTF-8: byte offsets
//! let m = pattern.search("Straße STRASSE").call()?.unwrap();
//! assert_eq!(m.range(), 0..6);
//!
//! // UTF-16: code unit offsets
//! let m = pattern.search(u16str!("😀 Straße")).call()?.unwrap();
//! assert_eq!(m.range(), 3..8);
//! assert_eq!(m.group("word")?.unwrap(), "Stra");
//!
//! // Latin-1
//! let m = pattern.search(b"gro\xdf").call()?.unwrap();
//! assert_eq!(m.range(), 0..4);
//! assert_eq!(m.text(0)?.unwrap(), "groß");
//! # Ok::<(), ib_pcre::Error>(())
//! ```
//!
//! ## Compiled code
//! ```
//! use ib_pcre::Pattern;
//!
//! let blob = Pattern::new(r"(?P<y>\d{4})-(?P<m>\d\d)")?.dump()?;
//! let pattern = Pattern::load(&blob)?;
//! assert_eq!(pattern.group_index()["m"], 2);
//! # Ok::<(), ib_pcre::Error>(())
//! ```
//!
//! ## Logging
//! Compilation, loading and studying are logged at `debug` level, subject normalization at `trace` level, via [`log`](https://docs.rs/log/).
//!
//! ## Performance
//! [`Pattern::study()`] builds a literal prefilter and, with [`StudyOptions::JIT_COMPILE`], a lazy DFA.
//!
//! The following `Cargo.toml` settings are recommended if best performance is desired:
//! ```toml
//! [profile.release]
//! lto = "fat"
//! codegen-units = 1
//! ```
//!
//! ## Crate features
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(feature = "doc", doc = document_features::document_features!())]

pub mod encoding;
pub mod engine;
pub mod error;
pub mod matches;
pub mod ops;
pub mod options;
pub mod pattern;

pub use encoding::{Buffer, Subject};
pub use error::{Error, Result};
pub use matches::Match;
pub use ops::{
    convert_template, escape, find_all, find_iter, is_match, match_at, search, split, sub, subn,
    Replacer,
};
pub use options::{Options, StudyOptions};
pub use pattern::{Group, Pattern};
pub use regex_automata::Span;

#[cfg(test)]
mod tests {
    use widestring::u32str;

    use super::*;

    #[test]
    fn usage() {
        let pattern = Pattern::compile(r"(?P<word>\w+)ß", Options::CASELESS).unwrap();

        let m = pattern.search("Straße STRASSE").call().unwrap().unwrap();
        assert_eq!(m.range(), 0..6);

        let m = pattern.search(u32str!("😀 Straße")).call().unwrap().unwrap();
        assert_eq!(m.range(), 2..7);
        assert_eq!(m.group("word").unwrap().unwrap(), "Stra");

        let m = pattern.search(b"gro\xdf").call().unwrap().unwrap();
        assert_eq!(m.text(0).unwrap().unwrap(), "groß");
    }
}
