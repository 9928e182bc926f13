//! # Command execution
//!
//! ## Overview
//!
//! The executor drives a validated token stream: it parses the single
//! top-level address, then consumes tokens to build and immediately execute
//! commands. Commands requiring a window fan out over the active view's
//! selections, each with its own default range; groups run their children
//! in sequence over the same range. Once a loop-class command has executed,
//! destructive commands are rejected for the rest of the line.

use crate::address::{evaluate_address, parse_address};
use crate::editing::text::TextBuffer;
use crate::editing::FileRange;
use crate::editor::{Editor, WindowId};
use crate::errors::SamError;
use crate::lex::{TokenKind, TokenStream};

use super::parse::{count_init, parse_arguments};
use super::{group_def, Command, CommandFlags};

fn is_loop_class(flags: CommandFlags) -> bool {
    flags.intersects(CommandFlags::LOOP | CommandFlags::CMD)
}

/// Execute a whole command line from its token stream. Errors land in the
/// editor's log; execution stops at the first failing command. Returns
/// false when execution was aborted before the stream was fully consumed.
pub(crate) fn execute_stream(ed: &mut Editor, sts: &mut TokenStream) -> bool {
    let address = parse_address(ed, sts);
    let address = if address.is_present() { Some(address) } else { None };

    let mut did_loop = false;
    let mut should_exit = false;

    while !sts.is_exhausted() && !should_exit {
        let tok = sts.pop();
        match tok.kind {
            TokenKind::GroupStart => match parse_group(ed, sts) {
                Some(mut group) => {
                    group.address = address.clone();
                    let loops = group.group.iter().any(|c| is_loop_class(c.def.flags));
                    if !execute_command(ed, &mut group, sts) {
                        should_exit = true;
                    }
                    did_loop |= loops;
                },
                None => should_exit = true,
            },
            TokenKind::String => {
                let name = sts.join_command_name(tok);
                let def = match ed.registry.lookup(sts.text(name)) {
                    Some(def) => def,
                    None => {
                        ed.report(sts, name.start, &SamError::Command.to_string());
                        should_exit = true;
                        continue;
                    },
                };

                if did_loop && def.flags.contains(CommandFlags::DESTRUCTIVE) {
                    ed.report(sts, name.start, &SamError::LoopInvalidCmd.to_string());
                    should_exit = true;
                    continue;
                }

                did_loop |= is_loop_class(def.flags);

                let mut cmd = Command::new(def);
                cmd.address = address.clone();
                if cmd.def.flags.contains(CommandFlags::ADDRESS_NONE) && cmd.address.is_some() {
                    ed.report(sts, name.start, &SamError::NoAddress.to_string());
                    should_exit = true;
                } else if !parse_arguments(ed, &mut cmd, sts) {
                    should_exit = true;
                } else if !execute_command(ed, &mut cmd, sts) {
                    should_exit = true;
                }
            },
            _ => {
                ed.report(sts, tok.start, "unexpected token");
                should_exit = true;
            },
        }
    }

    if !sts.is_exhausted() {
        ed.report(sts, sts.peek().start, "extra tokens at end of command");
    }
    !should_exit
}

/// Parse a `{…}` group whose opening brace has been consumed. Destructive
/// commands are rejected inside groups.
pub(crate) fn parse_group(ed: &mut Editor, sts: &mut TokenStream) -> Option<Command> {
    let mut group = Command::new(group_def());

    loop {
        let tok = sts.peek();
        match tok.kind {
            TokenKind::GroupEnd => {
                sts.pop();
                break;
            },
            TokenKind::GroupStart => {
                sts.pop();
                group.group.push(parse_group(ed, sts)?);
            },
            TokenKind::String => {
                let tok = sts.pop();
                let name = sts.join_command_name(tok);
                let def = match ed.registry.lookup(sts.text(name)) {
                    Some(def) => def,
                    None => {
                        ed.report(sts, name.start, &SamError::Command.to_string());
                        return None;
                    },
                };
                if def.flags.contains(CommandFlags::DESTRUCTIVE) {
                    ed.report(sts, name.start, &SamError::GroupInvalidCmd.to_string());
                    return None;
                }
                let mut child = Command::new(def);
                if !parse_arguments(ed, &mut child, sts) {
                    return None;
                }
                group.group.push(child);
            },
            TokenKind::Invalid => {
                ed.report(sts, tok.start, &SamError::UnmatchedBrace.to_string());
                return None;
            },
            _ => {
                ed.report(sts, tok.start, "unexpected token in group");
                return None;
            },
        }
    }

    Some(group)
}

/// The range a command observes when no address was given (or the base
/// range an address is evaluated against).
pub(crate) fn default_range(
    cmd: &Command,
    text: &TextBuffer,
    pos: usize,
    multiple_cursors: bool,
) -> FileRange {
    use CommandFlags as F;

    let flags = cmd.def.flags;
    if cmd.address.is_some() || flags.contains(F::ADDRESS_POS) {
        FileRange::empty_at(pos)
    } else if flags.contains(F::ADDRESS_LINE) {
        text.line_range(pos)
    } else if flags.contains(F::ADDRESS_AFTER) {
        FileRange::empty_at(text.line_next(pos))
    } else if flags.contains(F::ADDRESS_ALL)
        || (!multiple_cursors && flags.contains(F::ADDRESS_ALL_1CURSOR))
    {
        FileRange { start: 0, end: text.size() }
    } else {
        FileRange { start: pos, end: text.char_next(pos) }
    }
}

/// Fan a command out over the active window's selections (or run it once
/// without a window), evaluating the address per cursor.
pub(crate) fn execute_command(ed: &mut Editor, cmd: &mut Command, sts: &mut TokenStream) -> bool {
    let win = ed.current_window();
    let win_id = match win {
        Some(w) => w,
        None => {
            if cmd.def.flags.contains(CommandFlags::WIN) {
                ed.info("Command requires an active window");
                return false;
            }
            let mut range = FileRange::default();
            return sam_execute(ed, None, cmd, sts, None, &mut range);
        },
    };

    let visual = ed.mode.is_visual();
    let (count, ids) = {
        let view = &ed.win(win_id).view;
        (view.count(), view.alive_ids())
    };
    let multiple = count > 1;

    if visual {
        count_init(cmd, count as i64 + 1);
    }

    let mut result = true;
    for id in ids {
        // a destructive handler may have closed the window
        if ed.try_win(win_id).is_none() {
            break;
        }
        let sel = match ed.win(win_id).view.get(id) {
            Some(s) if !s.dead => *s,
            _ => continue,
        };

        let mut range = if visual {
            sel.range()
        } else {
            default_range(cmd, &ed.file_of(win_id).text, sel.cursor(), multiple)
        };

        if let Some(addr) = cmd.address.clone() {
            let ordinal = ed.win(win_id).view.ordinal(id).unwrap_or(0);
            match evaluate_address(&addr, ed.file_of(win_id), ordinal, range) {
                Some(r) => range = r,
                None => {
                    ed.report(sts, sts.peek().start, &SamError::Address.to_string());
                    result = false;
                    break;
                },
            }
        }

        result = sam_execute(ed, Some(win_id), cmd, sts, Some(id), &mut range);
        if !result || cmd.def.flags.contains(CommandFlags::ONCE) {
            break;
        }
    }
    result
}

/// Execute a parsed command (or group) under one selection and range.
pub(crate) fn sam_execute(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    sts: &mut TokenStream,
    sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    cmd.iteration += 1;

    if cmd.is_group() {
        let mut ret = true;
        for i in 0..cmd.group.len() {
            if !ret {
                break;
            }
            ret = sam_execute(ed, win, &mut cmd.group[i], sts, None, range);
        }
        // the iteration context selection has served its purpose
        if let (Some(w), Some(s)) = (win, sel) {
            if let Some(wref) = ed.try_win_mut(w) {
                wref.view.dispose(s);
            }
        }
        return ret;
    }

    let handler = cmd.def.handler;
    handler(ed, win, cmd, sts, sel, range)
}
