/*!
Higher level operations built on [`Pattern::search()`]: iteration, splitting and substitution.

```
use ib_pcre::Pattern;

let pattern = Pattern::new(r"(\d+)")?;
assert_eq!(pattern.find_all("a1b22c333")?, ["1", "22", "333"]);
assert_eq!(pattern.sub("<{1}>", "a1b22", 0)?, "a<1>b<22>");
# Ok::<(), ib_pcre::Error>(())
```
*/
use std::{borrow::Cow, fmt::Write};

use log::trace;

use crate::{
    encoding::{Cursor, Subject},
    error::{Error, Result},
    matches::Match,
    options::Options,
    pattern::{MatchFactory, Pattern, Prepared},
};

/// An iterator over successive non-overlapping matches, created by [`Pattern::find_iter()`].
///
/// The subject is normalized once, on the first step. Each search then continues from the end of the previous match in the same buffer.
#[derive(Debug)]
pub struct Matches<'p, 's, F> {
    pattern: &'p Pattern<F>,
    subject: Subject<'s>,
    prepared: Option<Prepared<'s>>,
    cursor: Cursor,
    last_empty: bool,
    done: bool,
}

impl<'s, F> Matches<'_, 's, F> {
    fn next_match(&mut self) -> Option<Result<Match<'s>>> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(m)) => {
                self.cursor = m.end_cursor();
                self.last_empty = m.range().is_empty();
                Some(Ok(m))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    fn step(&mut self) -> Result<Option<Match<'s>>> {
        let prepared = match &mut self.prepared {
            Some(prepared) => prepared,
            prepared => {
                let mut new = self.pattern.prepare(self.subject, Options::empty())?;
                new.validate()?;
                trace!(
                    "find_iter: {} byte haystack, transcoded: {}",
                    new.haystack.len(),
                    new.haystack.is_transcoded()
                );
                prepared.insert(new)
            }
        };
        // An empty match may not be followed by another one at the same position
        let options = if self.last_empty {
            Options::NOTEMPTY_ATSTART
        } else {
            Options::empty()
        };
        self.pattern.exec_prepared(
            prepared,
            self.cursor,
            self.cursor.byte..prepared.haystack.len(),
            self.cursor.unit..self.subject.len(),
            options,
        )
    }
}

impl<'s, F: MatchFactory> Iterator for Matches<'_, 's, F> {
    type Item = Result<F::Output<'s>>;

    fn next(&mut self) -> Option<Self::Item> {
        let m = self.next_match()?;
        Some(m.and_then(|m| self.pattern.factory().create(m)))
    }
}

/// Builds replacement text for [`Pattern::sub()`].
pub trait Replacer {
    /// Append the replacement for `m` to `dst`.
    fn replace_append(&mut self, m: &Match<'_>, dst: &mut String) -> Result<()>;
}

/// A [`Match::expand()`] template.
impl Replacer for &str {
    fn replace_append(&mut self, m: &Match<'_>, dst: &mut String) -> Result<()> {
        dst.push_str(&m.expand(self)?);
        Ok(())
    }
}

impl Replacer for &String {
    fn replace_append(&mut self, m: &Match<'_>, dst: &mut String) -> Result<()> {
        self.as_str().replace_append(m, dst)
    }
}

impl Replacer for String {
    fn replace_append(&mut self, m: &Match<'_>, dst: &mut String) -> Result<()> {
        self.as_str().replace_append(m, dst)
    }
}

impl<F, T> Replacer for F
where
    F: FnMut(&Match<'_>) -> T,
    T: AsRef<str>,
{
    fn replace_append(&mut self, m: &Match<'_>, dst: &mut String) -> Result<()> {
        dst.push_str((*self)(m).as_ref());
        Ok(())
    }
}

impl<F> Pattern<F> {
    /// Whether the pattern matches anywhere in `subject`.
    pub fn is_match<'s>(&self, subject: impl Into<Subject<'s>>) -> Result<bool> {
        Ok(self.find_at(subject.into(), 0, None, Options::empty())?.is_some())
    }

    /// Successive non-overlapping matches in `subject`.
    ///
    /// Each search starts where the previous match ended. After an empty match, the next match may not be empty at the same position, so iteration always makes progress.
    ///
    /// ```
    /// use ib_pcre::Pattern;
    ///
    /// let pattern = Pattern::new("x*")?;
    /// let ranges: Vec<_> = pattern
    ///     .find_iter("abx")
    ///     .map(|m| m.map(|m| m.range()))
    ///     .collect::<Result<_, _>>()?;
    /// assert_eq!(ranges, [0..0, 1..1, 2..3, 3..3]);
    /// # Ok::<(), ib_pcre::Error>(())
    /// ```
    pub fn find_iter<'p, 's>(&'p self, subject: impl Into<Subject<'s>>) -> Matches<'p, 's, F> {
        Matches {
            pattern: self,
            subject: subject.into(),
            prepared: None,
            cursor: Cursor::default(),
            last_empty: false,
            done: false,
        }
    }

    /// [`Pattern::find_iter()`] without the result factory.
    fn raw_matches<'p, 's>(
        &'p self,
        subject: Subject<'s>,
    ) -> impl Iterator<Item = Result<Match<'s>>> + 'p
    where
        's: 'p,
    {
        let mut matches = self.find_iter(subject);
        std::iter::from_fn(move || matches.next_match())
    }

    /// The whole match of every match in `subject`.
    pub fn find_all<'s>(&self, subject: impl Into<Subject<'s>>) -> Result<Vec<Subject<'s>>> {
        self.raw_matches(subject.into()).map(|m| m.map(|m| m.get())).collect()
    }

    /// Split `subject` by the matches, with the groups of each match between the pieces.
    ///
    /// At most `max_split` splits are done, `0` for no limit. Pieces are always `Some`, groups that didn't participate are `None`.
    ///
    /// ```
    /// use ib_pcre::Pattern;
    ///
    /// let pattern = Pattern::new(r"\s*([,;])\s*")?;
    /// let pieces: Vec<_> = pattern
    ///     .split("a , b;c", 0)?
    ///     .into_iter()
    ///     .map(|s| s.unwrap().to_text(true))
    ///     .collect();
    /// assert_eq!(pieces, ["a", ",", "b", ";", "c"]);
    /// # Ok::<(), ib_pcre::Error>(())
    /// ```
    pub fn split<'s>(
        &self,
        subject: impl Into<Subject<'s>>,
        max_split: usize,
    ) -> Result<Vec<Option<Subject<'s>>>> {
        let subject = subject.into();
        let mut pieces = Vec::new();
        let mut last = 0;
        for (n, m) in self.raw_matches(subject).enumerate() {
            if max_split != 0 && n >= max_split {
                break;
            }
            let m = m?;
            let range = m.range();
            pieces.push(subject.get(last..range.start));
            pieces.extend(m.groups());
            last = range.end;
        }
        pieces.push(subject.get(last..subject.len()));
        Ok(pieces)
    }

    /// Replace the first `count` matches in `subject` (all if `count` is 0).
    ///
    /// See [`Pattern::subn()`].
    pub fn sub<'s>(
        &self,
        replacer: impl Replacer,
        subject: impl Into<Subject<'s>>,
        count: usize,
    ) -> Result<String> {
        Ok(self.subn(replacer, subject, count)?.0)
    }

    /// Replace the first `count` matches in `subject` (all if `count` is 0), returning the new text and the number of replacements.
    ///
    /// The replacer is a [`Match::expand()`] template or a closure:
    /// ```
    /// use ib_pcre::Pattern;
    ///
    /// let pattern = Pattern::new(r"\d+")?;
    /// let (text, n) = pattern.subn(|m: &ib_pcre::Match| {
    ///     let n: u32 = m.text(0).unwrap().unwrap().parse().unwrap();
    ///     (n * 2).to_string()
    /// }, "1 2 3", 2)?;
    /// assert_eq!((text.as_str(), n), ("2 4 3", 2));
    /// # Ok::<(), ib_pcre::Error>(())
    /// ```
    pub fn subn<'s>(
        &self,
        mut replacer: impl Replacer,
        subject: impl Into<Subject<'s>>,
        count: usize,
    ) -> Result<(String, usize)> {
        let subject = subject.into();
        let utf8 = self.bytes_utf8();
        let text = |range| -> Cow<'s, str> {
            subject
                .get(range)
                .map(|s| s.to_text(utf8))
                .unwrap_or_default()
        };

        let mut out = String::new();
        let mut last = 0;
        let mut n = 0;
        for m in self.raw_matches(subject) {
            if count != 0 && n >= count {
                break;
            }
            let m = m?;
            let range = m.range();
            out.push_str(&text(last..range.start));
            replacer.replace_append(&m, &mut out)?;
            last = range.end;
            n += 1;
        }
        out.push_str(&text(last..subject.len()));
        Ok((out, n))
    }
}

/// Compile `pattern` with `options` and call [`Pattern::search()`] on `subject`.
///
/// The shortcuts below each compile `pattern` anew. Compile it once with [`Pattern::compile()`] to reuse it.
///
/// ```
/// use ib_pcre::Options;
///
/// let m = ib_pcre::search(r"o\w", "hello world", Options::empty())?.unwrap();
/// assert_eq!(m.range(), 6..8);
/// assert!(ib_pcre::match_at("b", "ab", Options::empty())?.is_none());
/// assert_eq!(ib_pcre::sub("A", "{0}", "aba", 0, Options::CASELESS)?, "AbA");
/// # Ok::<(), ib_pcre::Error>(())
/// ```
pub fn search<'p, 's>(
    pattern: impl Into<Subject<'p>>,
    subject: impl Into<Subject<'s>>,
    options: Options,
) -> Result<Option<Match<'s>>> {
    Pattern::compile(pattern, options)?.search(subject).call()
}

/// [`search()`] for a match at the start of `subject`.
pub fn match_at<'p, 's>(
    pattern: impl Into<Subject<'p>>,
    subject: impl Into<Subject<'s>>,
    options: Options,
) -> Result<Option<Match<'s>>> {
    Pattern::compile(pattern, options)?.match_at(subject).call()
}

pub fn is_match<'p, 's>(
    pattern: impl Into<Subject<'p>>,
    subject: impl Into<Subject<'s>>,
    options: Options,
) -> Result<bool> {
    Pattern::compile(pattern, options)?.is_match(subject)
}

/// Every match of `pattern` in `subject`. See [`Pattern::find_iter()`].
pub fn find_iter<'p, 's>(
    pattern: impl Into<Subject<'p>>,
    subject: impl Into<Subject<'s>>,
    options: Options,
) -> Result<Vec<Match<'s>>> {
    let pattern = Pattern::compile(pattern, options)?;
    let matches: Result<Vec<_>> = pattern.find_iter(subject).collect();
    matches
}

pub fn find_all<'p, 's>(
    pattern: impl Into<Subject<'p>>,
    subject: impl Into<Subject<'s>>,
    options: Options,
) -> Result<Vec<Subject<'s>>> {
    Pattern::compile(pattern, options)?.find_all(subject)
}

pub fn split<'p, 's>(
    pattern: impl Into<Subject<'p>>,
    subject: impl Into<Subject<'s>>,
    max_split: usize,
    options: Options,
) -> Result<Vec<Option<Subject<'s>>>> {
    Pattern::compile(pattern, options)?.split(subject, max_split)
}

pub fn sub<'p, 's>(
    pattern: impl Into<Subject<'p>>,
    replacer: impl Replacer,
    subject: impl Into<Subject<'s>>,
    count: usize,
    options: Options,
) -> Result<String> {
    Pattern::compile(pattern, options)?.sub(replacer, subject, count)
}

pub fn subn<'p, 's>(
    pattern: impl Into<Subject<'p>>,
    replacer: impl Replacer,
    subject: impl Into<Subject<'s>>,
    count: usize,
    options: Options,
) -> Result<(String, usize)> {
    Pattern::compile(pattern, options)?.subn(replacer, subject, count)
}

/// Escape `text` so that it matches itself literally.
///
/// Every ASCII character but letters and digits is escaped, so the result is literal in [`Options::EXTENDED`] mode too. NUL is written as `\x00` and non-ASCII whitespace as `\x{..}`. `<`, `>` and other non-ASCII characters are always literal and stay as they are.
///
/// ```
/// assert_eq!(ib_pcre::escape("1+1=2?"), r"1\+1\=2\?");
/// assert_eq!(ib_pcre::escape("a_b\0"), r"a\_b\x00");
/// ```
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            '\0' => out.push_str(r"\x00"),
            '<' | '>' => out.push(c),
            c if c.is_ascii_alphanumeric() => out.push(c),
            c if c.is_ascii() => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_whitespace() => {
                _ = write!(out, r"\x{{{:X}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Convert a `\1` / `\g<name>` style template into a [`Match::expand()`] template.
///
/// Only a single digit follows `\`. Other backslashes are kept as they are, and literal braces are doubled.
///
/// ```
/// use ib_pcre::convert_template;
///
/// assert_eq!(convert_template(r"\2-\g<name>{x}")?, "{2}-{name}{{x}}");
/// # Ok::<(), ib_pcre::Error>(())
/// ```
pub fn convert_template(template: &str) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut offset = 0;
    for (i, segment) in template.split('\\').enumerate() {
        let mut rest = segment;
        if i != 0 {
            if segment.starts_with(|c: char| c.is_ascii_digit()) {
                let (digit, tail) = segment.split_at(1);
                _ = write!(out, "{{{digit}}}");
                rest = tail;
            } else if let Some(named) = segment.strip_prefix("g<") {
                let (name, tail) = named.split_once('>').ok_or(Error::InvalidTemplate {
                    position: offset - 1,
                })?;
                _ = write!(out, "{{{name}}}");
                rest = tail;
            } else {
                out.push('\\');
            }
        }
        for c in rest.chars() {
            match c {
                '{' => out.push_str("{{"),
                '}' => out.push_str("}}"),
                c => out.push(c),
            }
        }
        offset += segment.len() + 1;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use widestring::u16str;

    use super::*;

    fn texts(pieces: Vec<Option<Subject>>) -> Vec<Option<String>> {
        pieces
            .into_iter()
            .map(|s| s.map(|s| s.to_text(true).into_owned()))
            .collect()
    }

    fn owned<const N: usize>(pieces: [Option<&str>; N]) -> Vec<Option<String>> {
        pieces.iter().map(|s| s.map(str::to_owned)).collect()
    }

    #[test]
    fn find_iter_empty() {
        let pattern = Pattern::new("").unwrap();
        let ranges: Vec<_> = pattern.find_iter("abc").map(|m| m.unwrap().range()).collect();
        assert_eq!(ranges, [0..0, 1..1, 2..2, 3..3]);

        let pattern = Pattern::new("a|").unwrap();
        let ranges: Vec<_> = pattern.find_iter("bab").map(|m| m.unwrap().range()).collect();
        assert_eq!(ranges, [0..0, 1..2, 2..2, 3..3]);
    }

    #[test]
    fn find_iter_empty_alternative() {
        let pattern = Pattern::new("|a").unwrap();
        let ranges: Vec<_> = pattern.find_iter("a").map(|m| m.unwrap().range()).collect();
        assert_eq!(ranges, [0..0, 0..1, 1..1]);

        for options in [Options::NOTEMPTY, Options::NOTEMPTY_ATSTART] {
            let m = pattern.search("a").options(options).call().unwrap().unwrap();
            assert_eq!(m.range(), 0..1, "{options:?}");
        }
    }

    #[test]
    fn find_iter_wide() {
        let pattern = Pattern::new(r"\w+").unwrap();
        let ranges: Vec<_> = pattern
            .find_iter(u16str!("😀ab 😀 cd"))
            .map(|m| m.unwrap().range())
            .collect();
        assert_eq!(ranges, [2..4, 8..10]);
    }

    #[test]
    fn find_iter_transcoded() {
        // The subject is transcoded once and every match shares the copy
        let pattern = Pattern::new(r"\w+").unwrap();
        let subject = u16str!("😀ab é 😀c");
        let matches: Vec<_> = pattern.find_iter(subject).map(Result::unwrap).collect();
        let ranges: Vec<_> = matches.iter().map(Match::range).collect();
        assert_eq!(ranges, [2..4, 5..6, 9..10]);
        assert!(matches.iter().all(|m| m.is_transcoded()));
        assert!(matches
            .windows(2)
            .all(|w| w[0].haystack().as_ptr() == w[1].haystack().as_ptr()));
        assert_eq!(matches[1].pos(), 4);
        assert_eq!(matches[2].endpos(), subject.len());

        let latin1 = b"\xe9t\xe9 caf\xe9";
        let words: Vec<_> = pattern
            .find_iter(latin1)
            .map(|m| m.unwrap().text(0).unwrap().unwrap().into_owned())
            .collect();
        assert_eq!(words, ["été", "café"]);

        let pattern = Pattern::new("").unwrap();
        let ranges: Vec<_> = pattern
            .find_iter(u16str!("😀é"))
            .map(|m| m.unwrap().range())
            .collect();
        assert_eq!(ranges, [0..0, 2..2, 3..3]);
    }

    #[test]
    fn find_iter_bad_utf8() {
        let pattern = Pattern::compile("a", Options::UTF8).unwrap();
        let mut matches = pattern.find_iter(b"a\xffa".as_slice());
        assert_eq!(
            matches.next().unwrap().unwrap_err(),
            Error::BadUtf { offset: 1 }
        );
        assert!(matches.next().is_none());
    }

    /// Same matches as the `regex` crate on a corpus of patterns.
    #[test]
    fn differential() {
        let hay = "The year 2024 · été, 東京 and São Paulo; x=1, y=22.\nnext line";
        for pattern in [
            r"\w+",
            r"\d+",
            r"(?i)s\w*",
            r"[^\s,;]+",
            r"(\w)(\w)?",
            r"\b",
            r"(?m)^\w+",
            r"\p{Han}+",
            r".",
        ] {
            let ours: Vec<_> = Pattern::new(pattern)
                .unwrap()
                .find_iter(hay)
                .map(|m| m.unwrap().range())
                .collect();
            let theirs: Vec<_> = regex::Regex::new(pattern)
                .unwrap()
                .find_iter(hay)
                .map(|m| m.range())
                .collect();
            assert_eq!(ours, theirs, "{pattern}");
        }
    }

    #[test]
    fn find_all() {
        let pattern = Pattern::new(r"\d+").unwrap();
        assert_eq!(pattern.find_all("a1b22c333").unwrap(), ["1", "22", "333"]);
        assert!(pattern.find_all("none").unwrap().is_empty());
        assert!(pattern.is_match("x9").unwrap());
        assert!(!pattern.is_match("x").unwrap());

        let all = pattern.find_all(b"\xe912\xe934").unwrap();
        assert_eq!(all, [Subject::Bytes(b"12"), Subject::Bytes(b"34")]);
    }

    #[test]
    fn split() {
        let pattern = Pattern::new(r"[,;]").unwrap();
        assert_eq!(
            texts(pattern.split("a,b;c", 0).unwrap()),
            owned([Some("a"), Some("b"), Some("c")])
        );
        assert_eq!(
            texts(pattern.split("a,b;c", 1).unwrap()),
            owned([Some("a"), Some("b;c")])
        );

        let pattern = Pattern::new(r"(-)|(\+)").unwrap();
        assert_eq!(
            texts(pattern.split("1-2+3", 0).unwrap()),
            owned([
                Some("1"),
                Some("-"),
                None,
                Some("2"),
                None,
                Some("+"),
                Some("3"),
            ])
        );

        let pattern = Pattern::new("x").unwrap();
        assert_eq!(texts(pattern.split("abc", 0).unwrap()), owned([Some("abc")]));
    }

    #[test]
    fn sub() {
        let pattern = Pattern::new(r"(?P<k>\w+)=(?P<v>\w+)").unwrap();
        assert_eq!(
            pattern.sub("{v}={k}", "a=1, b=2", 0).unwrap(),
            "1=a, 2=b"
        );
        assert_eq!(
            pattern.subn("{v}={k}", "a=1, b=2", 1).unwrap(),
            ("1=a, b=2".to_owned(), 1)
        );
        let template = super::convert_template(r"\2:\g<k>").unwrap();
        assert_eq!(pattern.sub(&template, "a=1", 0).unwrap(), "1:a");
        assert_eq!(
            pattern.sub("{z}", "a=1", 0).unwrap_err(),
            Error::NoSuchGroup("z".into())
        );

        let upper = Pattern::new(r"\w").unwrap();
        assert_eq!(
            upper
                .sub(|m: &Match| m.text(0).unwrap().unwrap().to_uppercase(), "été ok", 2)
                .unwrap(),
            "ÉTé ok"
        );

        // Latin-1 subject, UTF-8 output
        let pattern = Pattern::new("e").unwrap();
        assert_eq!(
            pattern.subn("E", b"\xe9te", 0).unwrap(),
            ("étE".to_owned(), 1)
        );

        let pattern = Pattern::new("").unwrap();
        assert_eq!(pattern.sub("-", "ab", 0).unwrap(), "-a-b-");
    }

    #[test]
    fn escape() {
        assert_eq!(super::escape("a.b*c"), r"a\.b\*c");
        assert_eq!(super::escape("x_1 y"), r"x\_1\ y");
        assert_eq!(super::escape("a\0b"), r"a\x00b");
        assert_eq!(super::escape("<é>"), "<é>");
        assert_eq!(super::escape("a\u{3000}b"), r"a\x{3000}b");

        let text = "(1+2)*[3]{4}^$|?. #\0=\"'<>~\u{3000}é\n";
        for options in [Options::empty(), Options::EXTENDED, Options::MULTILINE | Options::DOTALL] {
            let pattern = Pattern::compile(&super::escape(text), options).unwrap();
            let m = pattern.search(text).call().unwrap().unwrap();
            assert_eq!(m.range(), 0..text.len(), "{options:?}");
        }
    }

    #[test]
    fn shortcuts() {
        let m = super::search(r"(\d+)", "ab 12", Options::empty()).unwrap().unwrap();
        assert_eq!((m.range(), m.group(1).unwrap().unwrap()), (3..5, Subject::Str("12")));
        assert!(super::match_at(r"\d+", "ab 12", Options::empty()).unwrap().is_none());
        assert_eq!(
            super::match_at(r"\w", "ab", Options::empty()).unwrap().unwrap().range(),
            0..1
        );
        assert!(super::is_match("B", "abc", Options::CASELESS).unwrap());
        let ranges: Vec<_> = super::find_iter("a*", "baa", Options::empty())
            .unwrap()
            .iter()
            .map(Match::range)
            .collect();
        assert_eq!(ranges, [0..0, 1..3, 3..3]);
        assert_eq!(
            super::find_all(r"\d", "1a2", Options::empty()).unwrap(),
            ["1", "2"]
        );
        assert_eq!(
            texts(super::split(",", "a,b,c", 1, Options::empty()).unwrap()),
            owned([Some("a"), Some("b,c")])
        );
        assert_eq!(super::sub("x", "-", "axbx", 0, Options::empty()).unwrap(), "a-b-");
        assert_eq!(
            super::subn("X", "-", "axbx", 1, Options::CASELESS).unwrap(),
            ("a-bx".to_owned(), 1)
        );
        assert!(matches!(
            super::search("(", "", Options::empty()),
            Err(Error::Compile { .. })
        ));
    }

    #[test]
    fn convert_template() {
        assert_eq!(super::convert_template(r"\1\g<id>").unwrap(), "{1}{id}");
        assert_eq!(super::convert_template(r"a\12").unwrap(), "a{1}2");
        assert_eq!(super::convert_template(r"\n{}").unwrap(), r"\n{{}}");
        assert_eq!(super::convert_template(r"\\").unwrap(), r"\\");
        assert_eq!(super::convert_template("plain").unwrap(), "plain");
        assert_eq!(
            super::convert_template(r"ab\g<x").unwrap_err(),
            Error::InvalidTemplate { position: 2 }
        );
    }
}
