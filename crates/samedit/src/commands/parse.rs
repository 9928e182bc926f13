//! # Command argument parsing
//!
//! ## Overview
//!
//! Once the executor has resolved a [CommandDef](super::CommandDef), the
//! arguments are consumed from the token stream per its flags, in a fixed
//! order: force, text, shell, count, regex, argv, then a nested
//! sub-command. Argv splitting groups quoted values so names with spaces
//! survive.

use crate::editing::registers::Register;
use crate::editor::Editor;
use crate::errors::SamError;
use crate::lex::{TokenKind, TokenStream};

use super::{exec, select_def, Command, CommandFlags};

/// An inclusive iteration interval `[start, end]`, or the `%n` form where
/// a command runs on every n-th iteration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Count {
    /// First iteration the command runs on.
    pub start: i64,

    /// Last iteration the command runs on.
    pub end: i64,

    /// Whether this is the `%n` form (`start == end == n`).
    pub is_mod: bool,
}

impl Default for Count {
    fn default() -> Self {
        Count { start: 0, end: i64::MAX, is_mod: false }
    }
}

impl Count {
    /// Whether the command runs on the given 1-based iteration.
    pub fn evaluate(&self, iteration: i64) -> bool {
        if self.is_mod {
            if self.start != 0 {
                iteration % self.start == 0
            } else {
                true
            }
        } else {
            self.start <= iteration && iteration <= self.end
        }
    }

    /// Whether either bound still needs resolving against a match total.
    pub fn is_negative(&self) -> bool {
        self.start < 0 || self.end < 0
    }
}

/// Reset a command's iteration counter and resolve negative count bounds
/// against the match total.
pub(crate) fn count_init(cmd: &mut Command, max: i64) {
    cmd.iteration = 0;
    if cmd.count.start < 0 {
        cmd.count.start += max;
    }
    if cmd.count.end < 0 {
        cmd.count.end += max;
    }
}

/// Consume an optional repeat count, defaulting to 1. Out-of-range values
/// are reported and ignored.
pub(crate) fn check_count(ed: &mut Editor, sts: &mut TokenStream) -> i64 {
    if let Some(tok) = sts.try_pop_number() {
        match sts.number_value(tok) {
            Some(n) if n > 0 && n <= i32::MAX as i64 => return n,
            _ => ed.report(sts, tok.start, &SamError::Count.to_string()),
        }
    }
    1
}

/// Undo the lexer-level escapes of a delimited string: `\n` and `\t`
/// become the control characters, an escaped delimiter becomes the
/// delimiter, and any other backslash sequence is kept verbatim (insertion
/// text needs `\1`…`\9` and `\\` intact for register substitution).
pub fn unescape(src: &str, delim: u8) -> String {
    let mut out = String::with_capacity(src.len());
    let mut it = src.chars().peekable();

    while let Some(c) = it.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match it.peek().copied() {
            Some('n') => {
                out.push('\n');
                it.next();
            },
            Some('t') => {
                out.push('\t');
                it.next();
            },
            Some(d) if d == delim as char => {
                out.push(d);
                it.next();
            },
            _ => out.push('\\'),
        }
    }
    out
}

/// Consume tokens up to the end of the line (or the enclosing group) as a
/// whitespace-separated argv, honouring single and double quote grouping
/// for values containing spaces.
pub(crate) fn tokens_to_argv(sts: &mut TokenStream) -> Vec<String> {
    let mut argv = Vec::new();

    loop {
        let tok = sts.peek();
        if tok.is_invalid() || matches!(tok.kind, TokenKind::GroupStart | TokenKind::GroupEnd) {
            break;
        }

        if sts.delim_is(tok, b'\'') {
            if let Some(content) = sts.delimited_string() {
                argv.push(sts.text(content).to_string());
                continue;
            }
        }

        let word = sts.join_until_space();
        if word.is_invalid() {
            break;
        }
        let text = sts.text(word).to_string();

        if text.len() > 1 && text.starts_with('"') && text.ends_with('"') {
            argv.push(text[1..text.len() - 1].to_string());
        } else if text.starts_with('"') {
            // a double quote groups words until the word carrying the
            // closing quote
            let mut joined = text[1..].to_string();
            loop {
                let next = sts.join_until_space();
                if next.is_invalid() {
                    break;
                }
                let part = sts.text(next);
                joined.push(' ');
                if let Some(stripped) = part.strip_suffix('"') {
                    joined.push_str(stripped);
                    break;
                }
                joined.push_str(part);
            }
            argv.push(joined);
        } else {
            argv.push(text);
        }
    }
    argv
}

/// Consume a command's arguments according to its definition flags.
/// Diagnostics go to the error log; returns false when parsing cannot
/// continue.
pub(crate) fn parse_arguments(ed: &mut Editor, cmd: &mut Command, sts: &mut TokenStream) -> bool {
    use CommandFlags as F;

    let flags = cmd.def.flags;

    if flags.contains(F::FORCE) {
        cmd.force = sts.check_pop_force();
    }

    if flags.contains(F::TEXT) {
        cmd.count.start = check_count(ed, sts);
        match sts.delimited_string() {
            Some(tok) => {
                let delim = sts.raw().as_bytes()[tok.start - 1];
                cmd.text = Some(unescape(sts.text(tok), delim));
            },
            None => {
                ed.report(sts, sts.peek().start, "expected delimited string");
                return false;
            },
        }
    }

    if flags.contains(F::SHELL) {
        let at = sts.peek().start;
        if !sts.is_exhausted() {
            let rest = sts.drain_to_end().to_string();
            ed.registers.put(Register::Shell, rest.clone());
            cmd.shell = Some(rest);
        } else {
            cmd.shell = ed.registers.get(Register::Shell).map(String::from);
        }
        if cmd.shell.as_deref().map_or(true, str::is_empty) {
            ed.report(sts, at, &SamError::Shell.to_string());
            return false;
        }
    }

    if flags.contains(F::COUNT) {
        let tok = sts.peek();
        if sts.delim_is(tok, b'%') {
            sts.pop();
            let number = sts.try_pop_number().and_then(|t| sts.number_value(t));
            match number {
                Some(n) if n > 0 => {
                    cmd.count = Count { start: n, end: n, is_mod: true };
                },
                _ => {
                    ed.report(sts, sts.peek().start, &SamError::Count.to_string());
                    return false;
                },
            }
        } else if let Some(tok) = sts.try_pop_number() {
            let start = sts.number_value(tok).unwrap_or(0);
            let mut end;
            if sts.delim_is(sts.peek(), b',') {
                sts.pop();
                end = sts
                    .try_pop_number()
                    .and_then(|t| sts.number_value(t))
                    .unwrap_or(i64::MAX);
            } else {
                end = if start != 0 { start } else { i64::MAX };
            }
            if end == 0 {
                end = i64::MAX;
            }
            cmd.count = Count { start, end, is_mod: false };
        }
    }

    if flags.contains(F::REGEX) {
        if sts.peek().kind == TokenKind::Delimiter {
            let open = sts.pop();
            let delim = sts.delim_byte(open);
            let tok = sts.delimited_from(open);
            let pattern = unescape(sts.text(tok), delim);
            match ed.compile_regex(&pattern) {
                Some(re) => cmd.regex = Some(re),
                None => {
                    ed.report(sts, open.start, &SamError::Regex.to_string());
                    return false;
                },
            }
        }
        if cmd.regex.is_none() && !flags.intersects(F::REGEX_DEFAULT | F::COUNT) {
            ed.report(sts, sts.peek().start, &SamError::Regex.to_string());
            return false;
        }
    }

    if flags.contains(F::ARGV) {
        cmd.argv = tokens_to_argv(sts);
    }

    if flags.contains(F::CMD) {
        let tok = sts.peek();
        match tok.kind {
            TokenKind::GroupStart => {
                sts.pop();
                match exec::parse_group(ed, sts) {
                    Some(group) => cmd.sub = Some(Box::new(group)),
                    None => return false,
                }
            },
            TokenKind::String => {
                let tok = sts.pop();
                let name = sts.join_command_name(tok);
                let def = match ed.registry.lookup(sts.text(name)) {
                    Some(def) => def,
                    None => {
                        ed.report(sts, name.start, &SamError::Command.to_string());
                        return false;
                    },
                };
                if def.flags.contains(F::DESTRUCTIVE) {
                    ed.report(sts, name.start, &SamError::LoopInvalidCmd.to_string());
                    return false;
                }
                let mut sub = Command::new(def);
                if !parse_arguments(ed, &mut sub, sts) {
                    return false;
                }
                cmd.sub = Some(Box::new(sub));
            },
            _ => match cmd.def.default_sub.and_then(|name| ed.registry.lookup(name)) {
                Some(def) => cmd.sub = Some(Box::new(Command::new(def))),
                None => {
                    ed.report(sts, tok.start, &SamError::Command.to_string());
                    return false;
                },
            },
        }

        // file iteration composes with selection creation through a hidden
        // per-selection wrapper
        if matches!(&*cmd.def.name, "X" | "Y") {
            let mut select = Command::new(select_def());
            select.sub = cmd.sub.take();
            cmd.sub = Some(Box::new(select));
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_forms() {
        let c = Count::default();
        assert!(c.evaluate(1));
        assert!(c.evaluate(1_000_000));

        let c = Count { start: 2, end: 4, is_mod: false };
        assert!(!c.evaluate(1));
        assert!(c.evaluate(2));
        assert!(c.evaluate(4));
        assert!(!c.evaluate(5));

        let c = Count { start: 3, end: 3, is_mod: true };
        assert!(!c.evaluate(1));
        assert!(c.evaluate(3));
        assert!(c.evaluate(6));
        assert!(!c.evaluate(7));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a\\nb", b'/'), "a\nb");
        assert_eq!(unescape("a\\tb", b'/'), "a\tb");
        assert_eq!(unescape("a\\/b", b'/'), "a/b");
        // register references survive for later substitution
        assert_eq!(unescape("\\1 and \\\\", b'/'), "\\1 and \\\\");
    }

    #[test]
    fn test_tokens_to_argv() {
        let mut sts = crate::lex::TokenStream::lex("a b  c");
        assert_eq!(tokens_to_argv(&mut sts), vec!["a", "b", "c"]);

        let mut sts = crate::lex::TokenStream::lex("'my file' rest");
        assert_eq!(tokens_to_argv(&mut sts), vec!["my file", "rest"]);

        let mut sts = crate::lex::TokenStream::lex("\"my file\" x");
        assert_eq!(tokens_to_argv(&mut sts), vec!["my file", "x"]);

        // argv stops at the enclosing group
        let mut sts = crate::lex::TokenStream::lex("one two }");
        assert_eq!(tokens_to_argv(&mut sts), vec!["one", "two"]);
        assert_eq!(sts.peek().kind, TokenKind::GroupEnd);

        let mut sts = crate::lex::TokenStream::lex("");
        assert_eq!(tokens_to_argv(&mut sts), Vec::<String>::new());
    }
}
