/*!
The matching engine: compiled [`Code`] and the operations on it.

Patterns are parsed with [`regex_syntax`] and run by [`regex_automata::meta::Regex`]. Compiled code stores the parsed program printed back as canonical regex syntax, so it can be [loaded](Code::load) without the caller's source.

Supported syntax is that of [`regex_syntax`]: backreferences and look-around are compile errors ([`codes::UNSUPPORTED`]).

[`Options::NOTBOL`], [`Options::NOTEOL`] and [`Options::NOTEMPTY`] have no counterpart in the engine. They run programs rewritten from the compiled one, built the first time a search asks for them. `\A` and `\z` are not affected by `NOTBOL` / `NOTEOL`, except in a pattern that also has a multi-line anchor on the same side, where they never match under the option.
*/
use std::sync::OnceLock;

use log::{debug, trace};
use regex_automata::{
    meta::{self, BuildError},
    util::prefilter::Prefilter,
    Anchored, Input, MatchKind, PatternID, Span,
};
use regex_syntax::{
    ast::{self, Ast},
    hir::{self, translate::TranslatorBuilder, Hir, Look},
};

use crate::{
    error::{codes, Error, Result},
    options::{Options, StudyOptions},
};

pub mod code;
mod config;
mod rewrite;

pub use code::Header;
pub use config::{config, init, limits, ConfigValue, Limits};

/// Compiled code: the serialized program together with the engines built from it.
#[derive(Clone, Debug)]
pub struct Code {
    bytes: Box<[u8]>,
    header: Header,
    hir: Hir,
    study: Option<Study>,
    /// Engines indexed by the `NOTBOL` and `NOTEOL` bits of a search, built on first use.
    programs: [OnceLock<Program>; 4],
}

/// Accelerator data built by [`Code::study()`].
#[derive(Clone, Debug)]
struct Study {
    prefilter: Option<Prefilter>,
    jit: bool,
    options: StudyOptions,
}

/// The engine for one rewrite of the program.
#[derive(Clone, Debug)]
struct Program {
    hir: Hir,
    regex: meta::Regex,
    /// Matches of at least one character, tried after an empty match was rejected.
    non_empty: OnceLock<meta::Regex>,
    /// Whether the haystack needs a sentinel byte before / after the subject.
    prefix: bool,
    suffix: bool,
}

impl Program {
    fn new(hir: Hir, notbol: bool, noteol: bool, study: Option<&Study>) -> Result<Self> {
        let looks = hir.properties().look_set();
        let prefix = notbol && (looks.contains(Look::StartLF) || looks.contains(Look::StartCRLF));
        let suffix = noteol && (looks.contains(Look::EndLF) || looks.contains(Look::EndCRLF));
        let regex = build(&hir, study.map(|s| (s.prefilter.clone(), s.jit)))?;
        Ok(Self { hir, regex, non_empty: OnceLock::new(), prefix, suffix })
    }

    fn non_empty(&self) -> Result<&meta::Regex> {
        if let Some(regex) = self.non_empty.get() {
            return Ok(regex);
        }
        let hir = rewrite::non_empty(&self.hir);
        trace!("non-empty program {hir}");
        let regex = build(&hir, None)?;
        Ok(self.non_empty.get_or_init(|| regex))
    }
}

impl Code {
    /// Compile `pattern`.
    ///
    /// Only the [`Options::COMPILE`] bits of `options` are consumed. Error positions are byte offsets into `pattern`.
    pub fn compile(pattern: &str, options: Options) -> Result<Self> {
        let options = options & Options::COMPILE;
        let limits = limits();

        let mut ast = ast::parse::ParserBuilder::new()
            .ignore_whitespace(options.contains(Options::EXTENDED))
            .nest_limit(limits.nest_limit)
            .build()
            .parse(pattern)
            .map_err(ast_error)?;
        ast::visit(&ast, RepetitionLimit)?;
        rewrite::mark_line_edges(&mut ast, &mut options.contains(Options::MULTILINE));

        let hir = TranslatorBuilder::new()
            .unicode(true)
            .utf8(true)
            .case_insensitive(options.contains(Options::CASELESS))
            .multi_line(options.contains(Options::MULTILINE))
            .dot_matches_new_line(options.contains(Options::DOTALL))
            .swap_greed(options.contains(Options::UNGREEDY))
            .build()
            .translate(pattern, &ast)
            .map_err(hir_error)?;

        let program = Program::new(hir.clone(), false, false, None)?;

        let mut effective = options | Options::UCP;
        if hir.properties().look_set_prefix().contains(Look::Start) {
            effective |= Options::ANCHORED;
        }

        let info = program.regex.group_info();
        let capture_count = info.group_len(PatternID::ZERO).saturating_sub(1);
        let names: Vec<(usize, &str)> = info
            .pattern_names(PatternID::ZERO)
            .enumerate()
            .filter_map(|(i, name)| Some((i, name?)))
            .collect();
        let text = hir.to_string();
        let bytes = code::build(effective, capture_count, &names, &text)?;
        let header = Header::parse(&bytes)?;
        debug!(
            "compiled {pattern:?} into {} bytes: {effective:?}, {capture_count} groups, program {text:?}",
            bytes.len()
        );

        Ok(Self::with_program(bytes, header, hir, program))
    }

    fn with_program(bytes: Box<[u8]>, header: Header, hir: Hir, program: Program) -> Self {
        let mut programs: [OnceLock<Program>; 4] = Default::default();
        programs[0] = OnceLock::from(program);
        Self { bytes, header, hir, study: None, programs }
    }

    /// Load code previously returned by [`Code::bytes()`].
    ///
    /// The blob is copied verbatim up to its declared size. Only the header is validated: a program that doesn't agree with the header's capture count shows up at search time as [`Error::VectorOverflow`].
    pub fn load(blob: &[u8]) -> Result<Self> {
        let header = Header::parse(blob)?;
        let blob = &blob[..header.size as usize];
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(blob.len())?;
        bytes.extend_from_slice(blob);
        let bytes = bytes.into_boxed_slice();

        let text = code::program(&bytes, &header)?;
        let hir = parse_program(text).map_err(|e| Error::InvalidCode(format!("bad program: {e}")))?;
        let program = Program::new(hir.clone(), false, false, None)
            .map_err(|e| Error::InvalidCode(e.to_string()))?;
        debug!("loaded {} bytes: {:?}", bytes.len(), header);

        Ok(Self::with_program(bytes, header, hir, program))
    }

    /// The serialized code.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Effective options.
    pub fn options(&self) -> Options {
        self.header.options()
    }

    pub fn capture_count(&self) -> usize {
        self.header.capture_count as usize
    }

    /// Name table records.
    pub fn names(&self) -> impl Iterator<Item = code::NameEntry<'_>> {
        code::names(&self.bytes, &self.header)
    }

    pub fn is_studied(&self) -> bool {
        self.study.is_some()
    }

    /// Build accelerator data, replacing any previous data.
    ///
    /// Returns whether there is any: a literal prefilter for the pattern's prefixes, or the lazy DFA with [`StudyOptions::JIT_COMPILE`].
    pub fn study(&mut self, options: StudyOptions) -> Result<bool> {
        if !StudyOptions::all().contains(options) {
            return Err(Error::Study(format!(
                "unknown study options {:#x}",
                options.bits()
            )));
        }
        self.study = None;
        self.programs = Default::default();

        let prefilter = Prefilter::from_hir_prefix(MatchKind::LeftmostFirst, &self.hir);
        let jit = options.contains(StudyOptions::JIT_COMPILE);
        if prefilter.is_none() && !jit {
            debug!("study: nothing to accelerate");
            return Ok(false);
        }

        debug!("study: prefilter {}, jit {jit}", prefilter.is_some());
        let study = Study { prefilter, jit, options };
        let program = Program::new(self.hir.clone(), false, false, Some(&study))
            .map_err(|e| Error::Study(e.to_string()))?;
        self.programs[0] = OnceLock::from(program);
        self.study = Some(study);
        Ok(true)
    }

    /// Options [`Code::study()`] was last called with, if it produced accelerator data.
    pub fn study_options(&self) -> Option<StudyOptions> {
        self.study.as_ref().map(|s| s.options)
    }

    /// The engine for a search with `NOTBOL` / `NOTEOL`.
    ///
    /// Programs without anchors share the plain engine.
    fn program(&self, notbol: bool, noteol: bool) -> Result<&Program> {
        let (notbol, noteol) = if self.hir.properties().look_set().contains_anchor() {
            (notbol, noteol)
        } else {
            (false, false)
        };
        let cell = &self.programs[notbol as usize | (noteol as usize) << 1];
        if let Some(program) = cell.get() {
            return Ok(program);
        }
        let hir = if notbol || noteol {
            rewrite::line_edges(&self.hir, notbol, noteol)
        } else {
            self.hir.clone()
        };
        trace!("program for notbol {notbol}, noteol {noteol}: {hir}");
        let program = Program::new(hir, notbol, noteol, self.study.as_ref())?;
        Ok(cell.get_or_init(|| program))
    }

    /// Search `hay[start..end]`.
    ///
    /// Only the [`Options::EXEC`] bits of `options` are consumed. On a match, `spans[i]` is set to the span of group `i` (`None` if it didn't participate) and the remaining slots are cleared.
    ///
    /// Offsets are byte offsets into `hay`. Unless [`Options::NO_UTF8_CHECK`] is set, `hay[..end]` is validated as UTF-8 first.
    pub fn exec(
        &self,
        hay: &[u8],
        start: usize,
        end: usize,
        options: Options,
        spans: &mut [Option<Span>],
    ) -> Result<bool> {
        let options = options & Options::EXEC;
        let program = self.program(
            options.contains(Options::NOTBOL),
            options.contains(Options::NOTEOL),
        )?;
        let group_len = program.regex.group_info().group_len(PatternID::ZERO);
        if group_len > spans.len() {
            return Err(Error::VectorOverflow);
        }

        let hay = &hay[..end.min(hay.len())];
        let end = hay.len();
        let start = start.min(end);
        if !options.contains(Options::NO_UTF8_CHECK) {
            if let Err(e) = std::str::from_utf8(hay) {
                return Err(Error::BadUtf { offset: e.valid_up_to() });
            }
        }
        if start < end && !ib_unicode::utf8::is_lead_byte(hay[start]) {
            return Err(Error::BadUtf { offset: start });
        }

        // NUL sentinels so that the subject edges are not line edges for multi-line anchors
        let shift = program.prefix as usize;
        let hay: std::borrow::Cow<[u8]> = if program.prefix || program.suffix {
            let mut buf = Vec::new();
            buf.try_reserve_exact(hay.len() + 2)?;
            if program.prefix {
                buf.push(0);
            }
            buf.extend_from_slice(hay);
            if program.suffix {
                buf.push(0);
            }
            buf.into()
        } else {
            hay.into()
        };

        let anchored = options.contains(Options::ANCHORED)
            || self.options().contains(Options::ANCHORED);
        let notempty = options.contains(Options::NOTEMPTY);
        let notempty_atstart = options.contains(Options::NOTEMPTY_ATSTART);

        let mut caps = program.regex.create_captures();
        let mut at = start;
        loop {
            let input = Input::new(&*hay)
                .span(at + shift..end + shift)
                .anchored(if anchored { Anchored::Yes } else { Anchored::No });
            program.regex.search_captures(&input, &mut caps);
            let Some(m) = caps.get_match() else {
                return Ok(false);
            };
            let rejected = m.is_empty()
                && (notempty || (notempty_atstart && m.start() == start + shift));
            if !rejected {
                break;
            }

            // A non-empty match at the same position is preferred over moving on
            let non_empty = program.non_empty()?;
            let input = Input::new(&*hay)
                .span(m.start()..end + shift)
                .anchored(Anchored::Yes);
            let mut non_empty_caps = non_empty.create_captures();
            non_empty.search_captures(&input, &mut non_empty_caps);
            if non_empty_caps.is_match() {
                caps = non_empty_caps;
                break;
            }

            let next = m.start() - shift;
            if anchored || next >= end {
                return Ok(false);
            }
            at = next + ib_unicode::utf8::sequence_len(hay[next + shift]);
            at = at.min(end);
            trace!("rejected empty match at {next}, retrying at {at}");
        }

        for (i, span) in spans.iter_mut().enumerate() {
            *span = caps.get_group(i).map(|s| Span {
                start: s.start - shift,
                end: s.end - shift,
            });
        }
        Ok(true)
    }
}

/// Parse a program printed by [`Code::compile()`].
fn parse_program(text: &str) -> std::result::Result<Hir, regex_syntax::Error> {
    regex_syntax::ParserBuilder::new()
        // Printed programs nest deeper than their sources
        .nest_limit(u32::MAX)
        .build()
        .parse(text)
}

/// Build the engine for `hir`.
///
/// `study` is the prefilter and whether to enable the lazy DFA. Without it the program runs without acceleration.
fn build(hir: &Hir, study: Option<(Option<Prefilter>, bool)>) -> Result<meta::Regex> {
    let limits = limits();
    let (prefilter, hybrid) = study.unwrap_or((None, false));
    meta::Builder::new()
        .configure(
            meta::Config::new()
                .match_kind(MatchKind::LeftmostFirst)
                .auto_prefilter(false)
                .prefilter(prefilter)
                .nfa_size_limit(Some(limits.size_limit))
                .hybrid(hybrid)
                .hybrid_cache_capacity(limits.cache_capacity)
                .dfa(false),
        )
        .build_from_hir(hir)
        .map_err(build_error)
}

fn build_error(e: BuildError) -> Error {
    let code = if e.size_limit().is_some() {
        codes::TOO_BIG
    } else {
        codes::OTHER
    };
    Error::Compile { code, message: e.to_string(), position: 0 }
}

fn ast_error(e: ast::Error) -> Error {
    use ast::ErrorKind::*;

    let position = e.span().start.offset;
    let message = e.kind().to_string();
    let code = match e.kind() {
        DecimalInvalid => return Error::QuantifierOverflow { position },
        GroupNameDuplicate { .. } | GroupNameEmpty => return Error::GroupName(message),
        EscapeHexEmpty | EscapeHexInvalid | EscapeHexInvalidDigit | EscapeUnexpectedEof
        | EscapeUnrecognized | ClassEscapeInvalid => codes::ESCAPE,
        ClassRangeInvalid | ClassRangeLiteral | ClassUnclosed => codes::CLASS,
        DecimalEmpty | RepetitionCountInvalid | RepetitionCountDecimalEmpty
        | RepetitionCountUnclosed | RepetitionMissing => codes::REPETITION,
        GroupNameInvalid | GroupNameUnexpectedEof | GroupUnclosed | GroupUnopened => codes::GROUP,
        CaptureLimitExceeded => codes::TOO_MANY_GROUPS,
        FlagDanglingNegation | FlagDuplicate { .. } | FlagRepeatedNegation { .. }
        | FlagUnexpectedEof | FlagUnrecognized => codes::FLAG,
        NestLimitExceeded(_) => codes::NEST_LIMIT,
        UnicodeClassInvalid => codes::UNICODE,
        UnsupportedBackreference | UnsupportedLookAround => codes::UNSUPPORTED,
        _ => codes::OTHER,
    };
    Error::Compile { code, message, position }
}

fn hir_error(e: hir::Error) -> Error {
    use hir::ErrorKind::*;

    let code = match e.kind() {
        InvalidUtf8 => codes::BAD_UTF8,
        UnicodeNotAllowed
        | UnicodePropertyNotFound
        | UnicodePropertyValueNotFound
        | UnicodePerlClassNotFound
        | UnicodeCaseUnavailable => codes::UNICODE,
        _ => codes::OTHER,
    };
    Error::Compile {
        code,
        message: e.kind().to_string(),
        position: e.span().start.offset,
    }
}

/// Rejects `{n,m}` counts above [`codes::MAX_REPEAT`].
struct RepetitionLimit;

impl ast::Visitor for RepetitionLimit {
    type Output = ();
    type Err = Error;

    fn finish(self) -> Result<()> {
        Ok(())
    }

    fn visit_pre(&mut self, ast: &Ast) -> Result<()> {
        use ast::RepetitionRange::*;

        if let Ast::Repetition(rep) = ast {
            if let ast::RepetitionKind::Range(range) = &rep.op.kind {
                let max = match *range {
                    Exactly(n) | AtLeast(n) => n,
                    Bounded(m, n) => m.max(n),
                };
                if max > codes::MAX_REPEAT {
                    return Err(Error::QuantifierOverflow {
                        position: rep.op.span.start.offset,
                    });
                }
            }
        }
        Ok(())
    }
}
