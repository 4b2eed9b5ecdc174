/*!
Syntax tree rewrites behind the exec options the automata engine has no native mode for.

- `^` and `$` outside multi-line mode are [marked](mark_line_edges) at compile time so they stay distinct from `\A` and `\z` in the printed program. [`line_edges()`] then turns them off for [`NOTBOL`](crate::Options::NOTBOL) and [`NOTEOL`](crate::Options::NOTEOL).
- [`non_empty()`] derives the program used after an empty match was rejected by [`NOTEMPTY`](crate::Options::NOTEMPTY).
*/
use regex_syntax::{
    ast::{self, Ast},
    hir::{self, Hir, HirKind, Look},
};

/// Rewrite `^` and `$` that are not in multi-line mode into `\A(?m-R:^)` and `(?m-R:$)\z`.
///
/// Both forms match the same positions, but the printed program keeps the pair, so a loaded program can still tell them from `\A` and `\z`. `multi_line` is the flag state at `ast`, updated by inline flags the same way translation does.
pub fn mark_line_edges(ast: &mut Ast, multi_line: &mut bool) {
    match ast {
        Ast::Flags(set) => {
            if let Some(state) = set.flags.flag_state(ast::Flag::MultiLine) {
                *multi_line = state;
            }
        }
        Ast::Assertion(assertion) if !*multi_line => {
            let span = assertion.span;
            let (text, start) = match assertion.kind {
                ast::AssertionKind::StartLine => (ast::AssertionKind::StartText, true),
                ast::AssertionKind::EndLine => (ast::AssertionKind::EndText, false),
                _ => return,
            };
            let item = |kind| ast::FlagsItem { span, kind };
            let line = Ast::group(ast::Group {
                span,
                kind: ast::GroupKind::NonCapturing(ast::Flags {
                    span,
                    items: vec![
                        item(ast::FlagsItemKind::Flag(ast::Flag::MultiLine)),
                        item(ast::FlagsItemKind::Negation),
                        item(ast::FlagsItemKind::Flag(ast::Flag::CRLF)),
                    ],
                }),
                ast: Box::new(Ast::assertion(ast::Assertion {
                    span,
                    kind: assertion.kind.clone(),
                })),
            });
            let text = Ast::assertion(ast::Assertion { span, kind: text });
            let asts = if start { vec![text, line] } else { vec![line, text] };
            *ast = Ast::concat(ast::Concat { span, asts });
        }
        Ast::Group(group) => {
            let mut multi_line = group
                .flags()
                .and_then(|flags| flags.flag_state(ast::Flag::MultiLine))
                .unwrap_or(*multi_line);
            mark_line_edges(&mut group.ast, &mut multi_line);
        }
        Ast::Repetition(rep) => mark_line_edges(&mut rep.ast, multi_line),
        Ast::Alternation(alt) => {
            for ast in &mut alt.asts {
                mark_line_edges(ast, multi_line);
            }
        }
        Ast::Concat(concat) => {
            for ast in &mut concat.asts {
                mark_line_edges(ast, multi_line);
            }
        }
        _ => {}
    }
}

fn look_of(hir: &Hir) -> Option<Look> {
    match hir.kind() {
        HirKind::Look(look) => Some(*look),
        _ => None,
    }
}

fn first_look(hir: &Hir) -> Option<Look> {
    match hir.kind() {
        HirKind::Concat(subs) => subs.first().and_then(look_of),
        _ => look_of(hir),
    }
}

/// Rewrite marked `^` (with `notbol`) and `$` (with `noteol`) into a failure. Unset ones are unmarked.
///
/// Multi-line anchors are kept: they are turned off at the subject edges by a sentinel byte around the haystack instead.
pub fn line_edges(hir: &Hir, notbol: bool, noteol: bool) -> Hir {
    match hir.kind() {
        HirKind::Concat(subs) => {
            let mut out = Vec::with_capacity(subs.len());
            let mut i = 0;
            while i < subs.len() {
                let (partner, off) = match look_of(&subs[i]) {
                    Some(Look::Start) => (Look::StartLF, notbol),
                    Some(Look::EndLF) => (Look::End, noteol),
                    _ => {
                        out.push(line_edges(&subs[i], notbol, noteol));
                        i += 1;
                        continue;
                    }
                };
                let Some(next) = subs.get(i + 1) else {
                    out.push(subs[i].clone());
                    break;
                };
                if look_of(next) == Some(partner) {
                    out.push(match off {
                        true => Hir::fail(),
                        false if partner == Look::StartLF => Hir::look(Look::Start),
                        false => Hir::look(Look::End),
                    });
                    i += 2;
                    continue;
                }
                match next.kind() {
                    // A common prefix lifted out of alternation branches can split a pair
                    HirKind::Alternation(alts)
                        if alts.iter().any(|alt| first_look(alt) == Some(partner)) =>
                    {
                        out.push(Hir::alternation(
                            alts.iter()
                                .map(|alt| {
                                    let branch = Hir::concat(vec![subs[i].clone(), alt.clone()]);
                                    line_edges(&branch, notbol, noteol)
                                })
                                .collect(),
                        ));
                        i += 2;
                    }
                    _ => {
                        out.push(subs[i].clone());
                        i += 1;
                    }
                }
            }
            Hir::concat(out)
        }
        HirKind::Alternation(alts) => {
            Hir::alternation(alts.iter().map(|h| line_edges(h, notbol, noteol)).collect())
        }
        HirKind::Capture(cap) => Hir::capture(hir::Capture {
            index: cap.index,
            name: cap.name.clone(),
            sub: Box::new(line_edges(&cap.sub, notbol, noteol)),
        }),
        HirKind::Repetition(rep) => Hir::repetition(hir::Repetition {
            sub: Box::new(line_edges(&rep.sub, notbol, noteol)),
            ..rep.clone()
        }),
        _ => hir.clone(),
    }
}

fn can_be_empty(hir: &Hir) -> bool {
    hir.properties().minimum_len() == Some(0)
}

fn only_empty(hir: &Hir) -> bool {
    hir.properties().maximum_len() == Some(0)
}

/// Rewrite `hir` to match only its non-empty matches, keeping their order of preference.
///
/// Capture indices are kept. Groups that can only take part in empty matches may disappear, and a group inside a split concatenation may appear twice; the engine accepts both.
pub fn non_empty(hir: &Hir) -> Hir {
    let props = hir.properties();
    if props.minimum_len().map_or(true, |len| len > 0) {
        return hir.clone();
    }
    if only_empty(hir) {
        return Hir::fail();
    }
    match hir.kind() {
        HirKind::Capture(cap) => Hir::capture(hir::Capture {
            index: cap.index,
            name: cap.name.clone(),
            sub: Box::new(non_empty(&cap.sub)),
        }),
        HirKind::Alternation(alts) => Hir::alternation(alts.iter().map(non_empty).collect()),
        // The first iteration consumes, the others are as before
        HirKind::Repetition(rep) => Hir::concat(vec![
            non_empty(&rep.sub),
            Hir::repetition(hir::Repetition {
                min: rep.min.saturating_sub(1),
                max: rep.max.map(|max| max.saturating_sub(1)),
                greedy: rep.greedy,
                sub: rep.sub.clone(),
            }),
        ]),
        HirKind::Concat(subs) => {
            let Some((first, rest)) = subs.split_first() else {
                return Hir::fail();
            };
            let rest = Hir::concat(rest.to_vec());
            let empty = Hir::concat(vec![empty_only(first), non_empty(&rest)]);
            if only_empty(first) {
                return empty;
            }
            let consuming = Hir::concat(vec![non_empty(first), rest]);
            if prefers_empty(first) {
                Hir::alternation(vec![empty, consuming])
            } else {
                Hir::alternation(vec![consuming, empty])
            }
        }
        _ => Hir::fail(),
    }
}

/// Rewrite `hir` to match only its empty matches.
fn empty_only(hir: &Hir) -> Hir {
    if !can_be_empty(hir) {
        return Hir::fail();
    }
    if only_empty(hir) {
        return hir.clone();
    }
    match hir.kind() {
        HirKind::Capture(cap) => Hir::capture(hir::Capture {
            index: cap.index,
            name: cap.name.clone(),
            sub: Box::new(empty_only(&cap.sub)),
        }),
        HirKind::Alternation(alts) => Hir::alternation(alts.iter().map(empty_only).collect()),
        HirKind::Concat(subs) => Hir::concat(subs.iter().map(empty_only).collect()),
        HirKind::Repetition(rep) if rep.min == 0 => Hir::empty(),
        HirKind::Repetition(rep) => empty_only(&rep.sub),
        _ => Hir::empty(),
    }
}

/// Whether the first match `hir` tries is an empty one.
fn prefers_empty(hir: &Hir) -> bool {
    if only_empty(hir) {
        return true;
    }
    if !can_be_empty(hir) {
        return false;
    }
    match hir.kind() {
        HirKind::Capture(cap) => prefers_empty(&cap.sub),
        HirKind::Repetition(rep) if rep.min == 0 => !rep.greedy,
        HirKind::Repetition(rep) => prefers_empty(&rep.sub),
        HirKind::Alternation(alts) => alts
            .iter()
            .find(|alt| alt.properties().minimum_len().is_some())
            .is_some_and(prefers_empty),
        HirKind::Concat(subs) => subs.iter().all(prefers_empty),
        _ => false,
    }
}
