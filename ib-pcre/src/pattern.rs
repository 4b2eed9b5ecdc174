use std::{collections::BTreeMap, fmt, ops::Range, sync::Arc};

use bon::bon;
use log::{debug, trace};

use crate::{
    encoding::{self, Cursor, Haystack, OffsetMap, Subject},
    engine::Code,
    error::{codes, Error, Result},
    matches::Match,
    options::{Options, StudyOptions},
    Span,
};

/// A compiled pattern.
///
/// `Pattern` is a cheap handle: clones share the compiled code, and every [`Match`] keeps the pattern it was produced from alive.
///
/// ## Example
/// ```
/// use ib_pcre::Pattern;
///
/// let pattern = Pattern::new(r"(?P<word>[a-z]+)")?;
/// let m = pattern.search("  hello  ").call()?.unwrap();
/// assert_eq!(m.range(), 2..7);
/// assert_eq!(m.group("word")?.unwrap(), "hello");
/// assert_eq!(m.last_group(), Some("word"));
/// # Ok::<(), ib_pcre::Error>(())
/// ```
///
/// ## Result factory
/// Searches hand every [`Match`] to the pattern's [`MatchFactory`], which can wrap it into an application type:
/// ```
/// use ib_pcre::{pattern::MatchFactory, Match, Pattern, Result};
///
/// struct Words;
///
/// impl MatchFactory for Words {
///     type Output<'s> = Vec<String>;
///
///     fn create<'s>(&self, m: Match<'s>) -> Result<Vec<String>> {
///         Ok(m.groups().iter().flatten().map(|g| g.to_text(true).into_owned()).collect())
///     }
/// }
///
/// let pattern = Pattern::new(r"(\w+) (\w+)")?.with_factory(Words);
/// assert_eq!(pattern.search("hello world").call()?.unwrap(), ["hello", "world"]);
/// # Ok::<(), ib_pcre::Error>(())
/// ```
#[derive(Clone)]
pub struct Pattern<F = DefaultMatchFactory> {
    imp: Arc<PatternI>,
    factory: F,
}

#[derive(Clone)]
struct PatternI {
    source: Option<Box<str>>,
    requested: Options,
    group_count: usize,
    group_index: BTreeMap<String, usize>,
    code: Code,
}

/// Builds search results from [`Match`]es.
pub trait MatchFactory {
    type Output<'s>;

    fn create<'s>(&self, m: Match<'s>) -> Result<Self::Output<'s>>;
}

/// Produces [`Match`] itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMatchFactory;

impl MatchFactory for DefaultMatchFactory {
    type Output<'s> = Match<'s>;

    fn create<'s>(&self, m: Match<'s>) -> Result<Match<'s>> {
        Ok(m)
    }
}

/// A capture group, by 0-based index (0 is the whole match) or by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group<'g> {
    Index(usize),
    Name(&'g str),
}

impl From<usize> for Group<'_> {
    fn from(index: usize) -> Self {
        Group::Index(index)
    }
}

/// Negative indices never resolve.
impl From<i32> for Group<'_> {
    fn from(index: i32) -> Self {
        Group::Index(usize::try_from(index).unwrap_or(usize::MAX))
    }
}

impl<'g> From<&'g str> for Group<'g> {
    fn from(name: &'g str) -> Self {
        Group::Name(name)
    }
}

impl<'g> From<&'g String> for Group<'g> {
    fn from(name: &'g String) -> Self {
        Group::Name(name)
    }
}

impl fmt::Display for Group<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Index(i) => write!(f, "{i}"),
            Group::Name(name) => write!(f, "{name:?}"),
        }
    }
}

impl Pattern {
    /// Compile `source` with no options.
    pub fn new<'p>(source: impl Into<Subject<'p>>) -> Result<Self> {
        Self::compile(source, Options::empty())
    }

    /// Compile `source`.
    ///
    /// `source` may be any [`Subject`]: 8-bit sources are Latin-1 unless [`Options::UTF8`] is given. Error positions are in the units of `source`.
    pub fn compile<'p>(source: impl Into<Subject<'p>>, options: Options) -> Result<Self> {
        let source = source.into();
        let mut normalize_options = options;
        let normalized = encoding::normalize(source, &mut normalize_options)?;
        let to_char = |mut position: usize| {
            normalized
                .offsets
                .byte_to_char(&normalized.bytes, [&mut position]);
            position
        };

        let text = std::str::from_utf8(&normalized.bytes).map_err(|e| Error::Compile {
            code: codes::BAD_UTF8,
            message: e.to_string(),
            position: to_char(e.valid_up_to()),
        })?;
        let code = Code::compile(text, options).map_err(|e| match e {
            Error::Compile { code, message, position } => Error::Compile {
                code,
                message,
                position: to_char(position),
            },
            Error::QuantifierOverflow { position } => Error::QuantifierOverflow {
                position: to_char(position),
            },
            e => e,
        })?;

        Self::with_code(code, Some(text.into()), options)
    }

    /// Reconstruct a pattern from a blob returned by [`Pattern::dump()`].
    ///
    /// The source is unknown and the requested options are the effective ones.
    pub fn load(blob: &[u8]) -> Result<Self> {
        let code = Code::load(blob)?;
        let options = code.options();
        Self::with_code(code, None, options)
    }

    fn with_code(code: Code, source: Option<Box<str>>, requested: Options) -> Result<Self> {
        let group_count = code.capture_count();
        let mut group_index = BTreeMap::new();
        for entry in code.names() {
            let name = std::str::from_utf8(entry.name).map_err(|_| {
                Error::GroupName(format!(
                    "{} is not UTF-8",
                    String::from_utf8_lossy(entry.name)
                ))
            })?;
            if name.is_empty() {
                return Err(Error::GroupName(format!(
                    "empty name for group {}",
                    entry.index
                )));
            }
            let index = entry.index as usize;
            if index == 0 || index > group_count {
                return Err(Error::InvalidCode(format!(
                    "group {name:?} has index {index} of {group_count}"
                )));
            }
            if group_index.insert(name.to_owned(), index).is_some() {
                return Err(Error::GroupName(format!("duplicate name {name:?}")));
            }
        }
        debug!("pattern: {group_count} groups, names {group_index:?}");

        Ok(Self {
            imp: Arc::new(PatternI {
                source,
                requested,
                group_count,
                group_index,
                code,
            }),
            factory: DefaultMatchFactory,
        })
    }
}

#[bon]
impl<F: MatchFactory> Pattern<F> {
    /// Search `subject` for the first match within `start..end`.
    ///
    /// - `start` and `end` are in the units of `subject` and clamped to its length. `end` defaults to the length. If `start > end` there is no match.
    /// - Only the [`Options::EXEC`] bits of `options` are consumed. 8-bit subjects are UTF-8 if `options` or the compile options contain [`Options::UTF8`].
    ///
    /// Returns `Ok(None)` if there is no match, otherwise the [factory's](MatchFactory) output.
    ///
    /// ```
    /// use ib_pcre::{Options, Pattern};
    ///
    /// let pattern = Pattern::new("b+")?;
    /// let m = pattern.search(&['a', 'b', 'b', 'c'][..]).start(1).call()?.unwrap();
    /// assert_eq!(m.range(), 1..3);
    /// assert!(pattern.search("abc").end(1).call()?.is_none());
    /// assert!(pattern.search("abc").options(Options::ANCHORED).call()?.is_none());
    /// # Ok::<(), ib_pcre::Error>(())
    /// ```
    #[builder]
    pub fn search<'s>(
        &self,
        #[builder(start_fn, into)] subject: Subject<'s>,
        #[builder(default)] start: usize,
        end: Option<usize>,
        #[builder(default)] options: Options,
    ) -> Result<Option<F::Output<'s>>> {
        match self.find_at(subject, start, end, options)? {
            Some(m) => self.factory.create(m).map(Some),
            None => Ok(None),
        }
    }

    /// [`Pattern::search()`] for a match that starts exactly at `start`.
    ///
    /// ```
    /// use ib_pcre::Pattern;
    ///
    /// let pattern = Pattern::new(r"\d+")?;
    /// assert!(pattern.match_at("a12").call()?.is_none());
    /// assert_eq!(pattern.match_at("a12").start(1).call()?.unwrap().range(), 1..3);
    /// # Ok::<(), ib_pcre::Error>(())
    /// ```
    #[builder]
    pub fn match_at<'s>(
        &self,
        #[builder(start_fn, into)] subject: Subject<'s>,
        #[builder(default)] start: usize,
        end: Option<usize>,
        #[builder(default)] options: Options,
    ) -> Result<Option<F::Output<'s>>> {
        match self.find_at(subject, start, end, options | Options::ANCHORED)? {
            Some(m) => self.factory.create(m).map(Some),
            None => Ok(None),
        }
    }
}

/// A subject normalized once for any number of searches.
#[derive(Clone, Debug)]
pub(crate) struct Prepared<'s> {
    pub subject: Subject<'s>,
    pub haystack: Haystack<'s>,
    pub offsets: OffsetMap,
    /// Exec options, including [`Options::NO_UTF8_CHECK`] once `haystack` is known to be valid.
    pub options: Options,
    pub bytes_utf8: bool,
}

impl Prepared<'_> {
    /// Check the whole haystack up front so later searches can skip the check.
    pub fn validate(&mut self) -> Result<()> {
        if !self.options.contains(Options::NO_UTF8_CHECK) {
            if let Err(e) = std::str::from_utf8(&self.haystack) {
                return Err(Error::BadUtf { offset: e.valid_up_to() });
            }
            self.options |= Options::NO_UTF8_CHECK;
        }
        Ok(())
    }
}

impl<F> Pattern<F> {
    /// Search without the factory. `start` and `end` are clamped as in [`Pattern::search()`].
    pub(crate) fn find_at<'s>(
        &self,
        subject: Subject<'s>,
        start: usize,
        end: Option<usize>,
        options: Options,
    ) -> Result<Option<Match<'s>>> {
        let len = subject.len();
        let start = start.min(len);
        let end = end.map_or(len, |end| end.min(len));
        if start > end {
            trace!("empty search range {start}..{end}");
            return Ok(None);
        }

        let prepared = self.prepare(subject, options)?;
        let (mut byte_start, mut byte_end) = (start, end);
        prepared
            .offsets
            .char_to_byte(&prepared.haystack, [&mut byte_start, &mut byte_end]);
        self.exec_prepared(
            &prepared,
            Cursor::default(),
            byte_start..byte_end,
            start..end,
            Options::empty(),
        )
    }

    /// Normalize `subject` for searches with `options`.
    pub(crate) fn prepare<'s>(
        &self,
        subject: Subject<'s>,
        options: Options,
    ) -> Result<Prepared<'s>> {
        let mut options = options & Options::EXEC;
        if self.imp.requested.contains(Options::UTF8) {
            options |= Options::UTF8;
        }
        let bytes_utf8 = options.contains(Options::UTF8);
        let normalized = encoding::normalize(subject, &mut options)?;
        Ok(Prepared {
            subject,
            haystack: normalized.bytes.into(),
            offsets: normalized.offsets,
            options,
            bytes_utf8,
        })
    }

    /// Search `prepared.haystack[bytes]`, with `options` on top of the prepared ones.
    ///
    /// Match offsets are translated by walking from `from`, which must not be after `bytes.start`. `bounds` is the search range in subject units.
    pub(crate) fn exec_prepared<'s>(
        &self,
        prepared: &Prepared<'s>,
        from: Cursor,
        bytes: Range<usize>,
        bounds: Range<usize>,
        options: Options,
    ) -> Result<Option<Match<'s>>> {
        let mut spans: Vec<Option<Span>> = Vec::new();
        spans.try_reserve_exact(self.imp.group_count + 1)?;
        spans.resize(self.imp.group_count + 1, None);
        let options = prepared.options | (options & Options::EXEC);
        if !self
            .imp
            .code
            .exec(&prepared.haystack, bytes.start, bytes.end, options, &mut spans)?
        {
            return Ok(None);
        }
        Ok(Some(Match::new(self.baseline(), prepared, from, spans, bounds)))
    }

    /// A handle to the same compiled pattern with the default factory.
    pub(crate) fn baseline(&self) -> Pattern {
        Pattern {
            imp: self.imp.clone(),
            factory: DefaultMatchFactory,
        }
    }

    /// Rebind the result factory.
    pub fn with_factory<G: MatchFactory>(self, factory: G) -> Pattern<G> {
        Pattern { imp: self.imp, factory }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// The pattern text as supplied, or `None` if loaded from a blob.
    pub fn source(&self) -> Option<&str> {
        self.imp.source.as_deref()
    }

    /// Options requested at compile time.
    pub fn requested_options(&self) -> Options {
        self.imp.requested
    }

    /// Effective options of the compiled code.
    pub fn options(&self) -> Options {
        self.imp.code.options()
    }

    /// Number of capture groups, not counting the whole match.
    pub fn group_count(&self) -> usize {
        self.imp.group_count
    }

    /// Group names and their 1-based indices.
    pub fn group_index(&self) -> &BTreeMap<String, usize> {
        &self.imp.group_index
    }

    /// Resolve `group` to its index.
    pub fn resolve_group<'g>(&self, group: impl Into<Group<'g>>) -> Result<usize> {
        match group.into() {
            Group::Index(i) if i <= self.imp.group_count => Ok(i),
            Group::Name(name) => self
                .imp
                .group_index
                .get(name)
                .copied()
                .ok_or_else(|| Error::NoSuchGroup(name.to_owned())),
            group => Err(Error::NoSuchGroup(group.to_string())),
        }
    }

    /// Whether 8-bit subjects are UTF-8 by default.
    pub(crate) fn bytes_utf8(&self) -> bool {
        self.imp.requested.contains(Options::UTF8)
    }

    /// Copy of the compiled code, loadable with [`Pattern::load()`].
    pub fn dump(&self) -> Result<Vec<u8>> {
        let bytes = self.imp.code.bytes();
        let mut blob = Vec::new();
        blob.try_reserve_exact(bytes.len())?;
        blob.extend_from_slice(bytes);
        Ok(blob)
    }

    pub fn code(&self) -> &Code {
        &self.imp.code
    }

    /// Build accelerator data for later searches, replacing any previous data.
    ///
    /// Returns whether any was produced. Matches created before keep the code they were produced from.
    pub fn study(&mut self, options: StudyOptions) -> Result<bool> {
        Arc::make_mut(&mut self.imp).code.study(options)
    }

    pub fn is_studied(&self) -> bool {
        self.imp.code.is_studied()
    }
}

impl<F, G> PartialEq<Pattern<G>> for Pattern<F> {
    /// Equal iff the compiled code is identical.
    fn eq(&self, other: &Pattern<G>) -> bool {
        self.imp.code.bytes() == other.imp.code.bytes()
    }
}

impl<F> Eq for Pattern<F> {}

impl<F> fmt::Debug for Pattern<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.imp.source)
            .field("options", &self.options())
            .field("group_count", &self.imp.group_count)
            .field("group_index", &self.imp.group_index)
            .field("studied", &self.is_studied())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use widestring::u16str;

    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn group_count() {
        init();
        assert_eq!(Pattern::new("(a)(b)").unwrap().group_count(), 2);
        assert_eq!(Pattern::new("(?:a)(b)").unwrap().group_count(), 1);
        assert_eq!(Pattern::new("abc").unwrap().group_count(), 0);
    }

    #[test]
    fn word() {
        init();
        let pattern = Pattern::new("(?P<word>[a-z]+)").unwrap();
        let m = pattern.search("  hello  ").call().unwrap().unwrap();
        assert_eq!(m.span(0).unwrap(), Some(Span { start: 2, end: 7 }));
        assert_eq!(m.group("word").unwrap().unwrap(), "hello");
        assert_eq!(m.last_group(), Some("word"));

        assert!(Pattern::new("x").unwrap().search("abc").call().unwrap().is_none());
    }

    #[test]
    fn duplicate_name() {
        assert!(matches!(
            Pattern::new("(?P<n>a)(?P<n>b)"),
            Err(Error::GroupName(_))
        ));
    }

    #[test]
    fn char_offsets() {
        init();
        let pattern = Pattern::new("b+").unwrap();

        // Latin-1
        let m = pattern.search(b"\xe9\xe9bb").call().unwrap().unwrap();
        assert_eq!(m.range(), 2..4);
        assert!(m.is_transcoded());
        assert_eq!(m.byte_span(0).unwrap(), Some(Span { start: 4, end: 6 }));

        // UTF-8 bytes
        let m = pattern
            .search("éébb".as_bytes())
            .options(Options::UTF8)
            .call()
            .unwrap()
            .unwrap();
        assert_eq!(m.range(), 4..6);

        // UTF-16 with a surrogate pair
        let m = pattern.search(u16str!("😀ébb")).call().unwrap().unwrap();
        assert_eq!(m.range(), 3..5);

        let chars: Vec<char> = "😀ébb".chars().collect();
        let m = pattern.search(&chars).call().unwrap().unwrap();
        assert_eq!(m.range(), 2..4);
        assert_eq!(m.group(0).unwrap().unwrap(), "bb");

        // Bounds are in characters too
        let m = pattern.search(&chars).start(3).call().unwrap().unwrap();
        assert_eq!(m.range(), 3..4);
        assert_eq!((m.pos(), m.endpos()), (3, 4));
    }

    #[test]
    fn bounds() {
        let pattern = Pattern::new("a").unwrap();
        assert!(pattern.search("aaa").start(5).call().unwrap().is_none());
        assert!(pattern.search("aaa").start(2).end(1).call().unwrap().is_none());
        let m = pattern.search("aaa").start(1).end(99).call().unwrap().unwrap();
        assert_eq!((m.range(), m.endpos()), (1..2, 3));
    }

    #[test]
    fn match_at() {
        let pattern = Pattern::new(r"\d+").unwrap();
        assert!(pattern.match_at("a12").call().unwrap().is_none());
        let m = pattern.match_at("a12").start(1).call().unwrap().unwrap();
        assert_eq!((m.range(), m.pos()), (1..3, 1));
        assert!(pattern.match_at("a12").start(1).end(1).call().unwrap().is_none());

        // Offsets stay in subject units
        let m = pattern.match_at(u16str!("😀42")).start(2).call().unwrap().unwrap();
        assert_eq!(m.range(), 2..4);

        let pattern = Pattern::new("|b").unwrap();
        let m = pattern
            .match_at("b")
            .options(Options::NOTEMPTY)
            .call()
            .unwrap()
            .unwrap();
        assert_eq!(m.range(), 0..1);
    }

    #[test]
    fn compile_error_position() {
        let chars: Vec<char> = "éé(".chars().collect();
        let Err(Error::Compile { position, .. }) = Pattern::new(&chars) else {
            panic!("expected compile error");
        };
        assert_eq!(position, 2);
        // Native strings count bytes
        let Err(Error::Compile { position, .. }) = Pattern::new("éé(") else {
            panic!("expected compile error");
        };
        assert_eq!(position, 4);

        let Err(Error::QuantifierOverflow { position }) = Pattern::new(u16str!("😀a{99999}")) else {
            panic!("expected quantifier overflow");
        };
        assert_eq!(position, 3);

        let Err(Error::Compile { code, position, .. }) =
            Pattern::compile(b"ab\xff".as_slice(), Options::UTF8)
        else {
            panic!("expected compile error");
        };
        assert_eq!((code, position), (codes::BAD_UTF8, 2));
    }

    #[test]
    fn latin1_source() {
        let pattern = Pattern::new(b"caf\xe9").unwrap();
        assert_eq!(pattern.source(), Some("café"));
        assert!(pattern.search(b"un caf\xe9").call().unwrap().is_some());
        assert!(pattern.search("un café").call().unwrap().is_some());
    }

    #[test]
    fn dump_load() {
        init();
        let pattern =
            Pattern::compile(r"(?P<y>\d+)-(?P<m>\d+)|(x)", Options::CASELESS).unwrap();
        let blob = pattern.dump().unwrap();
        let loaded = Pattern::load(&blob).unwrap();
        assert_eq!(loaded.dump().unwrap(), blob);
        assert_eq!(loaded, pattern);
        assert_eq!(loaded.group_count(), 3);
        assert_eq!(loaded.group_index(), pattern.group_index());
        assert_eq!(loaded.options(), pattern.options());
        assert_eq!(loaded.requested_options(), pattern.options());
        assert_eq!(loaded.source(), None);

        let m = loaded.search("on 2024-05").call().unwrap().unwrap();
        assert_eq!(m.group("m").unwrap().unwrap(), "05");

        assert!(matches!(Pattern::load(b"garbage"), Err(Error::InvalidCode(_))));
    }

    #[test]
    fn load_mismatched_capture_count() {
        let mut blob = Pattern::new("(a)(b)").unwrap().dump().unwrap();
        // capture_count
        blob[12] = 1;
        let pattern = Pattern::load(&blob).unwrap();
        assert_eq!(pattern.group_count(), 1);
        assert_eq!(
            pattern.search("ab").call().unwrap_err(),
            Error::VectorOverflow
        );
    }

    #[test]
    fn study() {
        init();
        let mut pattern = Pattern::new("hello|world").unwrap();
        let before = pattern.search("say hello").call().unwrap().unwrap();
        assert!(pattern.study(StudyOptions::JIT_COMPILE).unwrap());
        assert!(pattern.is_studied());
        let after = pattern.search("say hello").call().unwrap().unwrap();
        assert_eq!(before.range(), after.range());
        // The match still holds the pattern it came from
        assert!(!before.pattern().is_studied());
        assert_eq!(before.pattern(), &pattern);
    }

    #[test]
    fn resolve_group() {
        let pattern = Pattern::new("(?P<a>x)(y)").unwrap();
        assert_eq!(pattern.resolve_group(0).unwrap(), 0);
        assert_eq!(pattern.resolve_group(2).unwrap(), 2);
        assert_eq!(pattern.resolve_group("a").unwrap(), 1);
        assert_eq!(
            pattern.resolve_group(3).unwrap_err(),
            Error::NoSuchGroup("3".into())
        );
        assert_eq!(
            pattern.resolve_group("b").unwrap_err(),
            Error::NoSuchGroup("b".into())
        );
    }

    #[test]
    fn factory() {
        struct Spans;

        impl MatchFactory for Spans {
            type Output<'s> = (usize, usize);

            fn create<'s>(&self, m: Match<'s>) -> Result<(usize, usize)> {
                Ok((m.range().start, m.range().end))
            }
        }

        let pattern = Pattern::new("b").unwrap().with_factory(Spans);
        assert_eq!(pattern.search("abc").call().unwrap(), Some((1, 2)));
    }

    #[test]
    fn send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pattern>();
        assert_send_sync::<Match<'static>>();
    }
}
