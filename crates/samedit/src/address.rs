//! # Address expressions
//!
//! ## Overview
//!
//! An address is an expression that evaluates, per cursor, to a byte range
//! over the active file: `5,10`, `#3;'m`, `/beta/`, `.,+2`. Parsing
//! consumes zero, one, or two sides around an optional combining delimiter;
//! evaluation resolves each side against the file and the cursor's current
//! range, then combines them.

use regex::Regex;

use crate::editing::marks::{mark_from_char, MarkId};
use crate::editing::FileRange;
use crate::editor::{Editor, File};
use crate::lex::{Token, TokenKind, TokenStream};

/// One side of an [Address].
#[derive(Clone, Debug, Default)]
pub enum AddressSide {
    /// An omitted side.
    #[default]
    Invalid,

    /// Absolute byte position `#n`.
    Byte(usize),

    /// One of the character sides `$` (end of file), `.` (current range),
    /// or `%` (whole file).
    Character(char),

    /// A 1-based line number; line 0 is the empty range.
    Line(usize),

    /// A mark side `'m`, resolved per selection ordinal.
    Mark(MarkId),

    /// `/re/`: the first match at or after the current range's end.
    RegexForward(Regex),

    /// `?re?`: the last match before the current range's start.
    RegexBackward(Regex),
}

impl AddressSide {
    /// Whether this side was written at all.
    pub fn is_present(&self) -> bool {
        !matches!(self, AddressSide::Invalid)
    }
}

/// A parsed address: two optional sides around an optional combiner.
#[derive(Clone, Debug, Default)]
pub struct Address {
    /// The side before the delimiter.
    pub left: AddressSide,

    /// The combining delimiter, when written explicitly.
    pub delim: Option<char>,

    /// The side after the delimiter.
    pub right: AddressSide,
}

impl Address {
    /// Whether any part of an address was written.
    pub fn is_present(&self) -> bool {
        self.left.is_present() || self.delim.is_some() || self.right.is_present()
    }
}

fn side_opens_left(b: u8) -> bool {
    matches!(b, b'#' | b'\'' | b'.' | b'%')
}

fn side_opens_right(b: u8) -> bool {
    matches!(b, b'#' | b'\'' | b'/' | b'?' | b'$' | b'.' | b'%')
}

fn parse_side(ed: &mut Editor, sts: &mut TokenStream, tok: Token) -> AddressSide {
    if tok.kind == TokenKind::Number {
        let n = sts.number_value(tok).unwrap_or(0);
        return AddressSide::Line(n.max(0) as usize);
    }

    match sts.delim_byte(tok) {
        b'#' => {
            if sts.peek().kind == TokenKind::Number {
                let value = sts.pop();
                let n = sts.number_value(value).unwrap_or(0);
                AddressSide::Byte(n.max(0) as usize)
            } else {
                ed.report(sts, sts.peek().start, "expected byte position");
                AddressSide::Invalid
            }
        },
        b'\'' => {
            if sts.peek().kind == TokenKind::Mark {
                let name = sts.pop();
                match sts.text(name).chars().next().and_then(mark_from_char) {
                    Some(mark) => AddressSide::Mark(mark),
                    None => {
                        ed.report(sts, name.start, "invalid mark");
                        AddressSide::Invalid
                    },
                }
            } else {
                ed.report(sts, sts.peek().start, "expected mark");
                AddressSide::Invalid
            }
        },
        b'/' | b'?' => {
            let forward = sts.delim_byte(tok) == b'/';
            let pattern = sts.delimited_from(tok);
            let pattern = crate::commands::parse::unescape(sts.text(pattern), sts.delim_byte(tok));
            match ed.compile_regex(&pattern) {
                Some(re) if forward => AddressSide::RegexForward(re),
                Some(re) => AddressSide::RegexBackward(re),
                None => {
                    ed.report(sts, tok.start, "expected regular expression");
                    AddressSide::Invalid
                },
            }
        },
        b'$' | b'.' | b'%' => AddressSide::Character(sts.delim_byte(tok) as char),
        _ => AddressSide::Invalid,
    }
}

/// Parse an optional address at the cursor of `sts`.
pub fn parse_address(ed: &mut Editor, sts: &mut TokenStream) -> Address {
    let mut result = Address::default();

    let test = sts.peek();
    let left_ok = test.kind == TokenKind::Number
        || (test.kind == TokenKind::Delimiter && side_opens_left(sts.delim_byte(test)));
    if left_ok {
        let tok = sts.pop();
        result.left = parse_side(ed, sts, tok);
    }

    let test = sts.peek();
    if sts.is_address_delim(test) {
        let tok = sts.pop();
        result.delim = Some(sts.delim_byte(tok) as char);
    }

    let test = sts.peek();
    let right_ok = test.kind == TokenKind::Number
        || (test.kind == TokenKind::Delimiter && side_opens_right(sts.delim_byte(test)));
    if right_ok {
        let tok = sts.pop();
        result.right = parse_side(ed, sts, tok);
    }

    result
}

fn evaluate_side(
    side: &AddressSide,
    file: &File,
    ordinal: usize,
    range: FileRange,
) -> Option<FileRange> {
    let text = &file.text;
    match side {
        AddressSide::Invalid => None,
        AddressSide::Byte(n) => Some(FileRange::empty_at((*n).min(text.size()))),
        AddressSide::Character(c) => match c {
            '$' => Some(FileRange::empty_at(text.size())),
            '.' => Some(range),
            '%' => Some(FileRange { start: 0, end: text.size() }),
            _ => None,
        },
        AddressSide::Line(0) => Some(FileRange::empty_at(0)),
        AddressSide::Line(n) => {
            let start = text.line_start(*n);
            Some(FileRange { start, end: text.line_next(start) })
        },
        AddressSide::Mark(mark) => {
            let pos = file.marks.get(*mark, ordinal)?;
            Some(FileRange::empty_at(pos))
        },
        AddressSide::RegexForward(re) => text.search_forward(re, range.end),
        AddressSide::RegexBackward(re) => text.search_backward(re, range.start),
    }
}

fn evaluate_line_offset(
    addr: &Address,
    file: &File,
    range: FileRange,
) -> Option<FileRange> {
    let text = &file.text;
    let forward = addr.delim == Some('+');

    // a regex side under +/- searches in that direction
    match &addr.right {
        AddressSide::RegexForward(re) | AddressSide::RegexBackward(re) => {
            return if forward {
                text.search_forward(re, range.end)
            } else {
                text.search_backward(re, range.start)
            };
        },
        _ => {},
    }

    let offset = match addr.right {
        AddressSide::Invalid => 1,
        AddressSide::Line(n) => n,
        _ => return None,
    };

    let pos = if forward {
        let mut end = range.end;
        if range.start < end && text.byte_at(end - 1) == Some(b'\n') {
            end -= 1;
        }
        let line = text.lineno_at(end);
        text.line_start(line + offset)
    } else {
        let line = text.lineno_at(range.start);
        if offset < line {
            text.line_start(line - offset)
        } else {
            0
        }
    };

    Some(FileRange { start: pos, end: text.line_next(pos) })
}

/// Evaluate an address against a file, a selection ordinal, and the
/// current range. Returns `None` when no side produced a usable range.
pub fn evaluate_address(
    addr: &Address,
    file: &File,
    ordinal: usize,
    range: FileRange,
) -> Option<FileRange> {
    match addr.delim {
        Some('+') | Some('-') => evaluate_line_offset(addr, file, range),
        Some(delim) => {
            let left = evaluate_side(&addr.left, file, ordinal, range);
            let base = match (delim, left) {
                (';', Some(l)) => l,
                _ => range,
            };
            let size = file.text.size();
            let right = if addr.right.is_present() {
                evaluate_side(&addr.right, file, ordinal, base)
            } else {
                Some(FileRange::empty_at(size))
            };
            let left = left.or_else(|| {
                if addr.left.is_present() {
                    None
                } else {
                    Some(FileRange::empty_at(0))
                }
            });
            match (left, right) {
                (Some(l), Some(r)) => Some(l.union(&r)),
                (Some(l), None) => Some(l),
                (None, Some(r)) => Some(r),
                (None, None) => None,
            }
        },
        None => match (addr.left.is_present(), addr.right.is_present()) {
            (true, false) => evaluate_side(&addr.left, file, ordinal, range),
            (false, true) => evaluate_side(&addr.right, file, ordinal, range),
            (true, true) => {
                let left = evaluate_side(&addr.left, file, ordinal, range)?;
                evaluate_side(&addr.right, file, ordinal, left)
            },
            (false, false) => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Editor;

    fn fixture() -> (Editor, crate::editor::WindowId) {
        let mut ed = Editor::new();
        let win = ed.open_scratch("test", "alpha\nbeta\ngamma\n");
        (ed, win)
    }

    fn parse(ed: &mut Editor, line: &str) -> (Address, TokenStream) {
        let mut sts = TokenStream::lex(line);
        let addr = parse_address(ed, &mut sts);
        (addr, sts)
    }

    fn eval(ed: &Editor, win: crate::editor::WindowId, addr: &Address, range: FileRange) -> Option<FileRange> {
        let file = ed.file_of(win);
        evaluate_address(addr, file, 0, range)
    }

    #[test]
    fn test_parse_stops_at_command() {
        let (mut ed, _) = fixture();
        let (addr, sts) = parse(&mut ed, "1,2d");
        assert!(addr.is_present());
        assert_eq!(addr.delim, Some(','));
        assert_eq!(sts.text(sts.peek()), "d");
    }

    #[test]
    fn test_line_pair() {
        let (mut ed, win) = fixture();
        let (addr, _) = parse(&mut ed, "1,2d");
        let r = eval(&ed, win, &addr, FileRange::empty_at(0)).unwrap();
        assert_eq!(r, FileRange { start: 0, end: 11 });
    }

    #[test]
    fn test_whole_file_comma() {
        let (mut ed, win) = fixture();
        let (addr, _) = parse(&mut ed, ",d");
        assert!(addr.is_present());
        let r = eval(&ed, win, &addr, FileRange::empty_at(3)).unwrap();
        assert_eq!(r, FileRange { start: 0, end: 17 });
    }

    #[test]
    fn test_lone_regex_is_just_the_match() {
        let (mut ed, win) = fixture();
        let (addr, _) = parse(&mut ed, "/beta/p");
        let r = eval(&ed, win, &addr, FileRange::empty_at(0)).unwrap();
        assert_eq!(r, FileRange { start: 6, end: 10 });
    }

    #[test]
    fn test_backward_regex() {
        let (mut ed, win) = fixture();
        let (addr, _) = parse(&mut ed, "?a?");
        let r = eval(&ed, win, &addr, FileRange::empty_at(17)).unwrap();
        assert_eq!(r, FileRange { start: 15, end: 16 });
    }

    #[test]
    fn test_byte_side() {
        let (mut ed, win) = fixture();
        let (addr, _) = parse(&mut ed, "#6");
        let r = eval(&ed, win, &addr, FileRange::empty_at(0)).unwrap();
        assert_eq!(r, FileRange::empty_at(6));
    }

    #[test]
    fn test_byte_pair() {
        let (mut ed, win) = fixture();
        let (addr, _) = parse(&mut ed, "#0,#5");
        let r = eval(&ed, win, &addr, FileRange::empty_at(0)).unwrap();
        assert_eq!(r, FileRange { start: 0, end: 5 });
    }

    #[test]
    fn test_plus_lines() {
        let (mut ed, win) = fixture();
        let (addr, _) = parse(&mut ed, "+2");
        // from line 1 forward two lines lands on gamma
        let r = eval(&ed, win, &addr, FileRange { start: 0, end: 6 }).unwrap();
        assert_eq!(r, FileRange { start: 11, end: 17 });
    }

    #[test]
    fn test_minus_saturates() {
        let (mut ed, win) = fixture();
        let (addr, _) = parse(&mut ed, "-99");
        let r = eval(&ed, win, &addr, FileRange { start: 11, end: 17 }).unwrap();
        assert_eq!(r, FileRange { start: 0, end: 6 });
    }

    #[test]
    fn test_mark_side() {
        let (mut ed, win) = fixture();
        let m = mark_from_char('m').unwrap();
        ed.file_of_mut(win).marks.set(m, 0, 7);

        let (addr, _) = parse(&mut ed, "'m");
        let r = eval(&ed, win, &addr, FileRange::empty_at(0)).unwrap();
        assert_eq!(r, FileRange::empty_at(7));
    }

    #[test]
    fn test_semicolon_rebases_right() {
        let (mut ed, win) = fixture();
        // find the first "a" after line 2's start
        let (addr, _) = parse(&mut ed, "2;/a/");
        let r = eval(&ed, win, &addr, FileRange::empty_at(0)).unwrap();
        // line 2 [6,11) unioned with the match of "a" from 11 → "a" of gamma
        assert_eq!(r, FileRange { start: 6, end: 13 });
    }

    #[test]
    fn test_dollar_and_percent() {
        let (mut ed, win) = fixture();
        let (addr, _) = parse(&mut ed, "$");
        assert_eq!(eval(&ed, win, &addr, FileRange::empty_at(0)), Some(FileRange::empty_at(17)));

        let (addr, _) = parse(&mut ed, "%");
        assert_eq!(
            eval(&ed, win, &addr, FileRange::empty_at(3)),
            Some(FileRange { start: 0, end: 17 })
        );
    }

    #[test]
    fn test_line_zero_is_empty() {
        let (mut ed, win) = fixture();
        let (addr, _) = parse(&mut ed, "0");
        assert_eq!(eval(&ed, win, &addr, FileRange::empty_at(5)), Some(FileRange::empty_at(0)));
    }
}
