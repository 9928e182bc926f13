//! # Sam command handlers
//!
//! ## Overview
//!
//! The bodies of the classic sam commands. Handlers observe the text and
//! selections through the editing collaborators and restrict their effects
//! to enqueuing changes on the file's transcript, updating selections, or
//! performing I/O through the pipe and save collaborators. Text is never
//! mutated inline; the conflict detector depends on every change still
//! being expressed as a range over the pre-state.

use std::fs;
use std::path::{Path, PathBuf};

use crate::editing::process;
use crate::editing::registers::Register;
use crate::editing::text::{FileStat, TextSave};
use crate::editing::FileRange;
use crate::editor::{Editor, WindowId};
use crate::errors::SamError;
use crate::lex::TokenStream;
use crate::transcript::{Change, ChangeKind};

use super::exec::{default_range, sam_execute};
use super::{Command, CommandFlags};

fn enqueue(
    ed: &mut Editor,
    win: WindowId,
    kind: ChangeKind,
    sel: Option<usize>,
    range: FileRange,
    data: String,
    count: usize,
) -> bool {
    let change = Change { kind, win, sel, range, data, count };
    ed.file_of_mut(win).transcript.insert(change)
}

pub(crate) fn sam_insert(
    ed: &mut Editor,
    win: WindowId,
    sel: Option<usize>,
    pos: usize,
    data: String,
    count: usize,
) -> bool {
    enqueue(ed, win, ChangeKind::Insert, sel, FileRange::empty_at(pos), data, count)
}

pub(crate) fn sam_delete(
    ed: &mut Editor,
    win: WindowId,
    sel: Option<usize>,
    range: FileRange,
) -> bool {
    enqueue(ed, win, ChangeKind::Delete, sel, range, String::new(), 0)
}

pub(crate) fn sam_change(
    ed: &mut Editor,
    win: WindowId,
    sel: Option<usize>,
    range: FileRange,
    data: String,
    count: usize,
) -> bool {
    enqueue(ed, win, ChangeKind::Change, sel, range, data, count)
}

/// Substitute register references in insertion text: `&` reads `$0`,
/// `\1`…`\9` read the capture registers, `\\` and `\&` escape to literals.
pub(crate) fn expand_text(ed: &Editor, src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut it = src.chars().peekable();

    while let Some(c) = it.next() {
        match c {
            '&' => out.push_str(ed.registers.get(Register::Capture(0)).unwrap_or("")),
            '\\' => match it.peek().copied() {
                Some(d @ '1'..='9') => {
                    it.next();
                    let reg = Register::Capture(d as u8 - b'0');
                    out.push_str(ed.registers.get(reg).unwrap_or(""));
                },
                Some(d @ ('\\' | '&')) => {
                    it.next();
                    out.push(d);
                },
                _ => out.push('\\'),
            },
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn command_noop(
    _ed: &mut Editor,
    _win: Option<WindowId>,
    _cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    true
}

pub(crate) fn command_insert(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };
    let data = expand_text(ed, cmd.text.as_deref().unwrap_or(""));
    sam_insert(ed, w, sel, range.start, data, cmd.count.start.max(1) as usize)
}

pub(crate) fn command_append(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };
    let data = expand_text(ed, cmd.text.as_deref().unwrap_or(""));
    sam_insert(ed, w, sel, range.end, data, cmd.count.start.max(1) as usize)
}

pub(crate) fn command_change(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };
    let data = expand_text(ed, cmd.text.as_deref().unwrap_or(""));
    sam_change(ed, w, sel, *range, data, cmd.count.start.max(1) as usize)
}

pub(crate) fn command_delete(
    ed: &mut Editor,
    win: Option<WindowId>,
    _cmd: &mut Command,
    _sts: &mut TokenStream,
    sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };
    sam_delete(ed, w, sel, *range)
}

pub(crate) fn command_print(
    ed: &mut Editor,
    win: Option<WindowId>,
    _cmd: &mut Command,
    _sts: &mut TokenStream,
    sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };
    let view = &mut ed.win_mut(w).view;
    let id = match sel {
        Some(id) => id,
        None => view.new_selection(range.start),
    };
    if !range.is_empty() {
        view.set_range(id, *range, true);
    } else {
        view.cursors_to(id, range.start);
    }
    true
}

pub(crate) fn command_guard(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    sts: &mut TokenStream,
    sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };

    let matched = match &cmd.regex {
        None => true,
        Some(re) => {
            let file = ed.file_of(w);
            match file.text.search_forward(re, range.start) {
                Some(m) => m.start < range.end,
                None => false,
            }
        },
    };

    let is_v = cmd.def.name == "v";
    if (cmd.count.evaluate(cmd.iteration) && matched) != is_v {
        return match cmd.sub {
            Some(ref mut sub) => sam_execute(ed, win, sub, sts, sel, range),
            None => true,
        };
    }

    if let Some(id) = sel {
        ed.win_mut(w).view.dispose(id);
    }
    true
}

fn extract(
    ed: &mut Editor,
    w: WindowId,
    cmd: &mut Command,
    sts: &mut TokenStream,
    sel: Option<usize>,
    range: FileRange,
    simulate: bool,
) -> (bool, i64) {
    let mut ret = true;
    let mut count = 0i64;
    let is_x = cmd.def.name == "x";

    if let Some(re) = cmd.regex.clone() {
        let mut start = range.start;
        let end = range.end;
        let mut last_start = if is_x { None } else { Some(start) };

        while start <= end {
            let found = ed.file_of(w).text.captures_in(&re, start, end);
            let mut r = None;

            match &found {
                Some(caps) => {
                    let (ms, me) = match caps.first().copied().flatten() {
                        Some(span) => span,
                        None => break,
                    };
                    if is_x {
                        r = Some(FileRange { start: ms, end: me });
                    } else {
                        r = last_start.map(|ls| FileRange { start: ls, end: ms });
                    }
                    if ms == me {
                        if last_start == Some(ms) {
                            start += 1;
                            continue;
                        }
                        // with multi-line patterns ^ matches the zero-length
                        // string right after a trailing newline; drop that
                        // final match at the end of the range
                        if ms == end
                            && start > range.start
                            && end > 0
                            && ed.file_of(w).text.byte_at(end - 1) == Some(b'\n')
                        {
                            break;
                        }
                        start = me + 1;
                    } else {
                        start = me;
                    }
                },
                None => {
                    if !is_x {
                        r = Some(FileRange { start: start.min(end), end });
                    }
                    start = end + 1;
                },
            }

            if let Some(r) = r {
                if let Some(caps) = &found {
                    let content = ed.file_of(w).text.content();
                    for (i, span) in caps.iter().take(10).enumerate() {
                        let text = span.map(|(a, b)| &content[a..b]);
                        ed.registers.put_capture(i as u8, text);
                    }
                    if let Some((_, me)) = caps.first().copied().flatten() {
                        last_start = Some(me);
                    }
                } else {
                    last_start = Some(start.min(end));
                }

                if simulate {
                    count += 1;
                } else if let Some(sub) = cmd.sub.as_mut() {
                    let mut rr = r;
                    ret &= sam_execute(ed, Some(w), sub, sts, None, &mut rr);
                }
            }
        }
    } else {
        // no pattern: iterate line by line
        let mut start = range.start;
        let end = range.end;
        while start < end {
            let mut next = ed.file_of(w).text.line_next(start);
            if next > end {
                next = end;
            }
            if start == next {
                break;
            }
            let r = FileRange { start, end: next };
            if simulate {
                count += 1;
            } else if let Some(sub) = cmd.sub.as_mut() {
                let mut rr = r;
                ret = sam_execute(ed, Some(w), sub, sts, None, &mut rr);
            }
            start = next;
        }
    }

    if !simulate {
        if let Some(id) = sel {
            ed.win_mut(w).view.dispose(id);
        }
    }

    (ret, count)
}

pub(crate) fn command_extract(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    sts: &mut TokenStream,
    sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };

    let negative = cmd.sub.as_ref().map_or(false, |s| s.count.is_negative());
    let mut matches = 0;
    if negative {
        let (_, n) = extract(ed, w, cmd, sts, sel, *range, true);
        matches = n;
    }
    if let Some(sub) = cmd.sub.as_mut() {
        super::parse::count_init(sub, matches + 1);
    }

    let (ret, _) = extract(ed, w, cmd, sts, sel, *range, false);
    ret
}

pub(crate) fn command_files(
    ed: &mut Editor,
    _win: Option<WindowId>,
    cmd: &mut Command,
    sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    let is_y = cmd.def.name == "Y";
    let mut result = true;

    for w in ed.window_ids() {
        // a window can be closed while its siblings execute
        if ed.try_win(w).is_none() {
            continue;
        }
        let matched = {
            let file = ed.file_of(w);
            if file.internal {
                continue;
            }
            match &cmd.regex {
                None => true,
                Some(re) => match &file.name {
                    Some(name) => re.is_match(&name.to_string_lossy()),
                    None => false,
                },
            }
        };
        if matched != is_y {
            if let Some(sub) = cmd.sub.as_mut() {
                let mut range = FileRange::default();
                result = sam_execute(ed, Some(w), sub, sts, None, &mut range);
            }
        }
    }
    result
}

pub(crate) fn command_select(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };
    let sub = match cmd.sub.as_mut() {
        Some(sub) => sub,
        None => return true,
    };

    let visual = ed.mode.is_visual();
    let (count, ids) = {
        let view = &ed.win(w).view;
        (view.count(), view.alive_ids())
    };
    let multiple = count > 1;

    let mut result = true;
    for id in ids {
        if ed.try_win(w).is_none() {
            break;
        }
        let sel = match ed.win(w).view.get(id) {
            Some(s) if !s.dead => *s,
            _ => continue,
        };
        let mut range = if visual {
            sel.range()
        } else {
            default_range(sub, &ed.file_of(w).text, sel.cursor(), multiple)
        };
        result = sam_execute(ed, Some(w), sub, sts, Some(id), &mut range);
        if !result || sub.def.flags.contains(CommandFlags::ONCE) {
            break;
        }
    }
    result
}

pub(crate) fn command_substitute(
    ed: &mut Editor,
    _win: Option<WindowId>,
    _cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    ed.info("Use :x/pattern/ c/replacement/ instead");
    false
}

pub(crate) fn command_filter(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };
    let shellcmd = cmd.shell.clone().unwrap_or_default();
    let input = ed.file_of(w).text.content_range(*range);

    match process::pipe(&ed.shell, &shellcmd, Some(&input)) {
        Err(err) => {
            ed.info(&format!("Command failed: {err}"));
            false
        },
        Ok(out) => {
            if ed.interrupted {
                ed.info("Command cancelled");
                false
            } else if out.status == 0 {
                sam_change(ed, w, sel, *range, out.stdout, 1);
                true
            } else {
                ed.info(&format!("Command failed: {}", out.stderr.trim_end()));
                false
            }
        },
    }
}

pub(crate) fn command_launch(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    if win.is_none() {
        return false;
    }
    let shellcmd = cmd.shell.clone().unwrap_or_default();

    match process::pipe(&ed.shell, &shellcmd, None) {
        Err(err) => {
            ed.info(&format!("Command failed: {err}"));
            false
        },
        Ok(out) => {
            if ed.interrupted {
                ed.info("Command cancelled");
                false
            } else if out.status != 0 {
                ed.info(&format!("Command failed: {}", out.stderr.trim_end()));
                false
            } else {
                true
            }
        },
    }
}

pub(crate) fn command_pipein(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    sts: &mut TokenStream,
    sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };
    let mut out_range = FileRange::empty_at(range.end);
    if !command_filter(ed, win, cmd, sts, sel, &mut out_range) {
        return false;
    }
    sam_delete(ed, w, None, *range)
}

pub(crate) fn command_pipeout(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };
    let shellcmd = cmd.shell.clone().unwrap_or_default();
    let input = ed.file_of(w).text.content_range(*range);

    match process::pipe(&ed.shell, &shellcmd, Some(&input)) {
        Err(err) => {
            ed.info(&format!("Command failed: {err}"));
            false
        },
        Ok(out) => {
            if ed.interrupted {
                ed.info("Command cancelled");
                false
            } else if out.status != 0 {
                ed.info(&format!("Command failed: {}", out.stderr.trim_end()));
                false
            } else {
                true
            }
        },
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    }
}

/// `w` stores the file's contents and emits pre/post save events. When the
/// range covers the whole file it is re-read after the pre-save hook,
/// because the hook may have mutated the text.
pub(crate) fn command_write(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };

    if ed
        .file_of_mut(w)
        .transcript
        .error_if_changing(SamError::WriteConflict)
        .is_some()
    {
        return false;
    }

    let write_entire_file = {
        let text = &ed.file_of(w).text;
        *range == FileRange { start: 0, end: text.size() }
    };

    let filename_is_arg = !cmd.argv.is_empty();
    let filename = if filename_is_arg {
        Some(PathBuf::from(&cmd.argv[0]))
    } else {
        ed.file_of(w).name.clone()
    };
    let filename = match filename {
        Some(f) => f,
        None => {
            ed.info("Filename expected");
            return false;
        },
    };

    if !filename_is_arg && !cmd.force {
        if ed.mode.is_visual() {
            ed.info("WARNING: file will be reduced to active selection");
            return false;
        }
        if !write_entire_file {
            ed.info("WARNING: file will be reduced to provided range");
            return false;
        }
    }

    let path = absolute_path(&filename);
    let disk = FileStat::of(&path);
    let existing_file = disk.is_some();
    let same_file = match (&disk, &ed.file_of(w).stat, &ed.file_of(w).name) {
        (Some(d), Some(s), Some(_)) => d.dev == s.dev && d.ino == s.ino,
        _ => false,
    };

    if !cmd.force {
        let stale = match (&disk, &ed.file_of(w).stat) {
            (Some(d), Some(s)) => match (d.mtime, s.mtime) {
                (Some(dm), Some(sm)) => sm < dm,
                _ => false,
            },
            _ => false,
        };
        if same_file && stale {
            ed.info("WARNING: file has been changed since reading it");
            return false;
        }
        if existing_file && !same_file {
            ed.info("WARNING: file exists");
            return false;
        }
    }

    if !ed.emit_pre_save(w, Some(&path)) && !cmd.force {
        ed.info(&format!("Rejected write to `{}' by pre-save hook", path.display()));
        return false;
    }
    if write_entire_file {
        *range = FileRange { start: 0, end: ed.file_of(w).text.size() };
    }

    let method = ed.file_of(w).save_method;
    let mut save = match TextSave::begin(&path, method) {
        Ok(save) => save,
        Err(err) => {
            ed.info(&format!("Can't write `{}': {err}", path.display()));
            return false;
        },
    };

    let visual = ed.mode.is_visual();
    let ranges: Vec<FileRange> = if visual {
        ed.win(w).view.alive().map(|s| s.range()).collect()
    } else {
        vec![*range]
    };
    for r in ranges {
        if let Err(err) = save.write_range(&ed.file_of(w).text, r) {
            save.cancel();
            ed.info(&format!("Can't write `{}': {err}", path.display()));
            return false;
        }
    }
    if let Err(err) = save.commit() {
        ed.info(&format!("Can't write `{}': {err}", path.display()));
        return false;
    }

    {
        let file = ed.file_of_mut(w);
        if file.name.is_none() {
            file.name = Some(path.clone());
        }
        if same_file || (!existing_file && file.name.as_deref() == Some(path.as_path())) {
            file.stat = FileStat::of(&path);
        }
        file.text.set_saved();
    }
    ed.emit_post_save(w, Some(&path));
    true
}

pub(crate) fn command_read(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };

    let pattern = match cmd.argv.first() {
        Some(name) => name.clone(),
        None => {
            ed.info("Filename expected");
            return false;
        },
    };
    let name = match ed.pick_file(&pattern) {
        Some(name) => name,
        None => return false,
    };

    match fs::read_to_string(&name) {
        Ok(data) => sam_insert(ed, w, sel, range.end, data, 1),
        Err(err) => {
            ed.info(&format!("Could not read `{name}': {err}"));
            false
        },
    }
}

pub(crate) fn command_edit(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    let oldwin = match win {
        Some(w) => w,
        None => return false,
    };

    if !cmd.force && !ed.window_closable(oldwin) {
        ed.info("No write since last change (add ! to override)");
        return false;
    }

    if cmd.argv.is_empty() {
        if ed.file_of(oldwin).refcount > 1 {
            ed.info("Can not reload file with multiple views");
            return false;
        }
        return ed.window_reload(oldwin);
    }

    if cmd.argv.len() > 1 {
        ed.info("Only 1 filename allowed");
        return false;
    }
    let pattern = cmd.argv[0].clone();

    let name = match ed.pick_file(&pattern) {
        Some(name) => name,
        None => return false,
    };
    let newwin = match ed.window_new(Some(Path::new(&name))) {
        Some(w) => w,
        None => {
            ed.info(&format!("Could not open: {name}"));
            return false;
        },
    };

    ed.window_swap(oldwin, newwin);
    ed.window_close(oldwin);
    ed.focus(newwin);
    true
}

pub(crate) fn command_quit(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    if let Some(w) = win {
        if !cmd.force && !ed.window_closable(w) {
            ed.info("No write since last change (add ! to override)");
            return false;
        }
        ed.window_close(w);
    }

    if !ed.has_windows() {
        let code = cmd.argv.first().and_then(|a| a.parse().ok()).unwrap_or(0);
        ed.request_exit(code);
    }
    true
}

pub(crate) fn command_cd(
    ed: &mut Editor,
    _win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    let dir = match cmd.argv.first() {
        Some(dir) => dir.clone(),
        None => match std::env::var("HOME") {
            Ok(home) => home,
            Err(_) => return false,
        },
    };
    std::env::set_current_dir(&dir).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::registers::Register;

    #[test]
    fn test_expand_text() {
        let mut ed = Editor::new();
        ed.registers.put(Register::Capture(0), "WHOLE".into());
        ed.registers.put(Register::Capture(2), "two".into());

        assert_eq!(expand_text(&ed, "x&y"), "xWHOLEy");
        assert_eq!(expand_text(&ed, "a\\2b"), "atwob");
        assert_eq!(expand_text(&ed, "\\&"), "&");
        assert_eq!(expand_text(&ed, "\\\\1"), "\\1");
        assert_eq!(expand_text(&ed, "\\9"), "");
        assert_eq!(expand_text(&ed, "plain"), "plain");
    }
}
