use std::{borrow::Cow, collections::BTreeMap, ops::Range};

use crate::{
    encoding::{Cursor, Haystack, Subject},
    error::{Error, Result},
    pattern::{Group, Pattern, Prepared},
    Span,
};

/// A successful search.
///
/// Spans are in the units of the subject (see [`Subject`]), except for [`Match::byte_span()`]. A group that didn't participate in the match has no span.
#[derive(Clone, Debug)]
pub struct Match<'s> {
    pattern: Pattern,
    subject: Subject<'s>,
    haystack: Haystack<'s>,
    byte_spans: Vec<Option<Span>>,
    spans: Vec<Option<Span>>,
    last_index: Option<usize>,
    bytes_utf8: bool,
    pos: usize,
    endpos: usize,
}

impl<'s> Match<'s> {
    /// `byte_spans` are offsets into `prepared.haystack`, none of them before `from.byte`. `bounds` are the clamped search bounds.
    pub(crate) fn new(
        pattern: Pattern,
        prepared: &Prepared<'s>,
        from: Cursor,
        byte_spans: Vec<Option<Span>>,
        bounds: Range<usize>,
    ) -> Self {
        let mut spans = byte_spans.clone();
        if !prepared.offsets.is_identity() {
            // One pass over the buffer for every boundary
            let mut positions: Vec<&mut usize> = spans
                .iter_mut()
                .flatten()
                .flat_map(|s| [&mut s.start, &mut s.end])
                .collect();
            positions.sort_unstable_by_key(|p| **p);
            prepared
                .offsets
                .byte_to_char_from(&prepared.haystack, from, positions);
        }
        let last_index = spans
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .find(|(_, s)| s.is_some())
            .map(|(i, _)| i);

        Self {
            pattern,
            subject: prepared.subject,
            haystack: prepared.haystack.clone(),
            byte_spans,
            spans,
            last_index,
            bytes_utf8: prepared.bytes_utf8,
            pos: bounds.start,
            endpos: bounds.end,
        }
    }

    /// End of the whole match in both the haystack and the subject.
    pub(crate) fn end_cursor(&self) -> Cursor {
        let range = self.range();
        Cursor {
            byte: self.byte_spans[0].map_or(range.end, |s| s.end),
            unit: range.end,
        }
    }

    /// The pattern that produced this match.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn subject(&self) -> Subject<'s> {
        self.subject
    }

    /// The UTF-8 buffer that was searched.
    pub fn haystack(&self) -> &[u8] {
        &self.haystack
    }

    /// Whether [`Match::haystack()`] is a transcoded copy of the subject.
    pub fn is_transcoded(&self) -> bool {
        self.haystack.is_transcoded()
    }

    /// Start of the searched range.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// End of the searched range.
    pub fn endpos(&self) -> usize {
        self.endpos
    }

    /// Index of the highest numbered group that participated in the match.
    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    /// Name of the [`Match::last_index()`] group, if it has one.
    pub fn last_group(&self) -> Option<&str> {
        let last = self.last_index?;
        self.pattern
            .group_index()
            .iter()
            .find(|&(_, &i)| i == last)
            .map(|(name, _)| name.as_str())
    }

    /// Range of the whole match.
    pub fn range(&self) -> Range<usize> {
        self.spans[0].map_or(self.pos..self.pos, |s| s.range())
    }

    /// The whole match.
    pub fn get(&self) -> Subject<'s> {
        let range = self.range();
        self.subject.get(range).unwrap_or(self.subject)
    }

    /// Span of `group`.
    pub fn span<'g>(&self, group: impl Into<Group<'g>>) -> Result<Option<Span>> {
        Ok(self.spans[self.pattern.resolve_group(group)?])
    }

    pub fn start<'g>(&self, group: impl Into<Group<'g>>) -> Result<Option<usize>> {
        Ok(self.span(group)?.map(|s| s.start))
    }

    pub fn end<'g>(&self, group: impl Into<Group<'g>>) -> Result<Option<usize>> {
        Ok(self.span(group)?.map(|s| s.end))
    }

    /// Span of `group` in [`Match::haystack()`].
    pub fn byte_span<'g>(&self, group: impl Into<Group<'g>>) -> Result<Option<Span>> {
        Ok(self.byte_spans[self.pattern.resolve_group(group)?])
    }

    /// The part of the subject matched by `group`.
    ///
    /// ```
    /// use ib_pcre::Pattern;
    ///
    /// let m = Pattern::new(r"(\w+)@(\w+)?")?.search("name@").call()?.unwrap();
    /// assert_eq!(m.group(1)?.unwrap(), "name");
    /// assert_eq!(m.group(2)?, None);
    /// assert!(m.group(3).is_err());
    /// # Ok::<(), ib_pcre::Error>(())
    /// ```
    pub fn group<'g>(&self, group: impl Into<Group<'g>>) -> Result<Option<Subject<'s>>> {
        Ok(self.span(group)?.and_then(|s| self.subject.get(s.range())))
    }

    pub fn group_many<'g, G: Into<Group<'g>>>(
        &self,
        groups: impl IntoIterator<Item = G>,
    ) -> Result<Vec<Option<Subject<'s>>>> {
        groups.into_iter().map(|g| self.group(g)).collect()
    }

    /// Groups `1..=group_count`.
    pub fn groups(&self) -> Vec<Option<Subject<'s>>> {
        self.spans[1..]
            .iter()
            .map(|s| s.and_then(|s| self.subject.get(s.range())))
            .collect()
    }

    /// Every named group.
    pub fn group_dict(&self) -> BTreeMap<&str, Option<Subject<'s>>> {
        self.pattern
            .group_index()
            .iter()
            .map(|(name, &i)| {
                let group = self.spans[i].and_then(|s| self.subject.get(s.range()));
                (name.as_str(), group)
            })
            .collect()
    }

    /// `group` decoded as text.
    pub fn text<'g>(&self, group: impl Into<Group<'g>>) -> Result<Option<Cow<'s, str>>> {
        Ok(self.group(group)?.map(|s| s.to_text(self.bytes_utf8)))
    }

    /// Expand a template with the groups of this match.
    ///
    /// `{0}` is the whole match, `{n}` group `n`, `{name}` a named group, and `{{` / `}}` are literal braces. Groups that didn't participate expand to nothing. Error positions are byte offsets into `template`.
    ///
    /// ```
    /// use ib_pcre::Pattern;
    ///
    /// let m = Pattern::new(r"(?P<k>\w+)=(\w+)(;)?")?.search("lang=rust").call()?.unwrap();
    /// assert_eq!(m.expand("{2} is {{{k}}}{3}")?, "rust is {lang}");
    /// # Ok::<(), ib_pcre::Error>(())
    /// ```
    pub fn expand(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(i) = rest.find(['{', '}']) {
            out.push_str(&rest[..i]);
            let position = template.len() - rest.len() + i;
            let tail = &rest[i + 1..];
            match (rest.as_bytes()[i], tail.as_bytes().first()) {
                (b'{', Some(b'{')) => {
                    out.push('{');
                    rest = &tail[1..];
                }
                (b'}', Some(b'}')) => {
                    out.push('}');
                    rest = &tail[1..];
                }
                (b'{', _) => {
                    let close = tail
                        .find(['{', '}'])
                        .filter(|&j| tail.as_bytes()[j] == b'}')
                        .ok_or(Error::InvalidTemplate { position })?;
                    let id = &tail[..close];
                    let group = match id.parse::<usize>() {
                        Ok(index) => Group::Index(index),
                        Err(_) if !id.is_empty() => Group::Name(id),
                        Err(_) => return Err(Error::InvalidTemplate { position }),
                    };
                    if let Some(text) = self.text(group)? {
                        out.push_str(&text);
                    }
                    rest = &tail[close + 1..];
                }
                _ => return Err(Error::InvalidTemplate { position }),
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}
