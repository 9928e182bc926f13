//! # Editor command handlers
//!
//! ## Overview
//!
//! The `:`-style commands layered over the sam core: window management,
//! option handling, key binding tables, help, and time travel through the
//! text's snapshot history.

use std::path::Path;
use std::time::Duration;

use crate::editing::ui::Layout;
use crate::editing::FileRange;
use crate::editor::{keymap_mode_from, Editor, WindowId};
use crate::lex::TokenStream;
use crate::options;

use super::{Command, CommandFlags};

fn openfiles(ed: &mut Editor, names: &[String]) -> bool {
    for pattern in names {
        let name = match ed.pick_file(pattern) {
            Some(name) => name,
            None => return false,
        };
        if ed.window_new(Some(Path::new(&name))).is_none() {
            ed.info(&format!("Failed to open: {name}"));
            return false;
        }
    }
    true
}

pub(crate) fn command_open(
    ed: &mut Editor,
    _win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    if !cmd.argv.is_empty() {
        let names = cmd.argv.clone();
        openfiles(ed, &names)
    } else {
        ed.window_new(None).is_some()
    }
}

fn split_with(ed: &mut Editor, win: Option<WindowId>, cmd: &Command, layout: Layout) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };
    let opts = ed.win(w).options;
    ed.ui.arrange(layout);
    if !cmd.argv.is_empty() {
        let result = openfiles(ed, &cmd.argv);
        if result {
            if let Some(cur) = ed.current_window() {
                ed.win_mut(cur).options = opts;
            }
        }
        result
    } else {
        ed.window_split(w).is_some()
    }
}

pub(crate) fn command_split(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    split_with(ed, win, cmd, Layout::Horizontal)
}

pub(crate) fn command_vsplit(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    split_with(ed, win, cmd, Layout::Vertical)
}

pub(crate) fn command_new(
    ed: &mut Editor,
    _win: Option<WindowId>,
    _cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    ed.ui.arrange(Layout::Horizontal);
    ed.window_new(None).is_some()
}

pub(crate) fn command_vnew(
    ed: &mut Editor,
    _win: Option<WindowId>,
    _cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    ed.ui.arrange(Layout::Vertical);
    ed.window_new(None).is_some()
}

pub(crate) fn command_qall(
    ed: &mut Editor,
    _win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    for w in ed.window_ids() {
        let close = match ed.try_win(w) {
            Some(_) => {
                let file = ed.file_of(w);
                !file.internal && (!file.text.modified() || cmd.force)
            },
            None => false,
        };
        if close {
            ed.window_close(w);
        }
    }

    if !ed.has_windows() {
        let code = cmd.argv.first().and_then(|a| a.parse().ok()).unwrap_or(0);
        ed.request_exit(code);
        true
    } else {
        ed.info("No write since last change (add ! to override)");
        false
    }
}

pub(crate) fn command_wq(
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
    let unmodified = {
        let file = ed.file_of(w);
        file.name.is_none() && !file.text.modified()
    };
    if unmodified || super::sam::command_write(ed, win, cmd, sts, sel, range) {
        super::sam::command_quit(ed, win, cmd, sts, sel, range)
    } else {
        false
    }
}

pub(crate) fn command_set(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    options::set_command(ed, win, &cmd.argv)
}

pub(crate) fn command_earlier_later(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    let w = match win {
        Some(w) => w,
        None => return false,
    };
    let earlier = cmd.def.name.starts_with('e');
    let arg = cmd.argv.first().cloned().unwrap_or_default();

    let digits: String = arg.chars().take_while(|c| c.is_ascii_digit()).collect();
    let unit = arg[digits.len()..].trim().to_string();
    let count: i64 = if digits.is_empty() {
        if arg.is_empty() {
            1
        } else {
            ed.info("Invalid number");
            return false;
        }
    } else {
        match digits.parse() {
            Ok(n) => n,
            Err(_) => {
                ed.info("Invalid number");
                return false;
            },
        }
    };

    let pos = if !unit.is_empty() {
        let seconds = match unit.as_str() {
            "d" => count * 24 * 60 * 60,
            "h" => count * 60 * 60,
            "m" => count * 60,
            "s" => count,
            _ => {
                ed.info("Unknown time specifier (use: s,m,h or d)");
                return false;
            },
        };
        let now = ed.file_of(w).text.state_time();
        let target = if earlier {
            now.checked_sub(Duration::from_secs(seconds.max(0) as u64))
        } else {
            now.checked_add(Duration::from_secs(seconds.max(0) as u64))
        };
        match target {
            Some(t) => ed.file_of_mut(w).text.restore(t),
            None => None,
        }
    } else {
        let mut pos = None;
        for _ in 0..count.max(0) {
            pos = if earlier {
                ed.file_of_mut(w).text.earlier()
            } else {
                ed.file_of_mut(w).text.later()
            };
        }
        pos
    };

    let state = ed.file_of(w).text.state_time();
    if let Ok(since) = state.duration_since(std::time::UNIX_EPOCH) {
        let secs = since.as_secs();
        ed.info(&format!("State from {:02}:{:02}", (secs / 3600) % 24, (secs / 60) % 60));
    }

    pos.is_some()
}

fn cmd_usage(def: &super::CommandDef) -> String {
    use CommandFlags as F;

    let is_s = def.name == "s";
    format!(
        "{}{}{}{}{}{}{}",
        def.name,
        if def.flags.contains(F::FORCE) { "[!]" } else { "" },
        if def.flags.contains(F::TEXT) { "/text/" } else { "" },
        if def.flags.contains(F::REGEX) { "/regexp/" } else { "" },
        if def.flags.contains(F::CMD) { " command" } else { "" },
        if def.flags.contains(F::SHELL) {
            if is_s {
                "/regexp/text/"
            } else {
                " shell-command"
            }
        } else {
            ""
        },
        if def.flags.contains(F::ARGV) { " [args...]" } else { "" },
    )
}

pub(crate) fn command_help(
    ed: &mut Editor,
    _win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    let w = match ed.window_new(None) {
        Some(w) => w,
        None => return false,
    };

    let mut txt = String::new();
    txt.push_str(&format!("samedit {}\n\n", env!("CARGO_PKG_VERSION")));

    txt.push_str(" :-Commands\n\n");
    txt.push_str(&format!("  {:<30} {}\n", "{", "Start of command group"));
    txt.push_str(&format!("  {:<30} {}\n", "}", "End of command group"));
    for def in ed.registry.defs() {
        txt.push_str(&format!("  {:<30} {}\n", cmd_usage(&def), def.help));
    }

    txt.push_str("\n Marks\n\n  a-z General purpose marks\n");

    txt.push_str(
        "\n Registers\n\n  $0-$9 Match and sub-expression captures of `x` and `y`\n  \
         One dedicated register holds the last shell command\n",
    );

    txt.push_str("\n :set command options\n\n");
    for opt in ed.options.defs() {
        let mut desc = opt.names.join("|");
        if opt.flags.contains(crate::options::OptionFlags::TYPE_BOOL) {
            desc.push_str(" on|off");
        }
        if opt.flags.contains(crate::options::OptionFlags::TYPE_NUMBER) {
            desc.push_str(" nn");
        }
        txt.push_str(&format!("  {:<30} {}\n", desc, opt.help));
    }

    let pos = cmd
        .argv
        .first()
        .and_then(|needle| txt.find(needle))
        .unwrap_or(0);
    {
        let file = ed.file_of_mut(w);
        file.text.insert(0, &txt);
        file.text.set_saved();
    }
    let primary = ed.win(w).view.primary_id();
    ed.win_mut(w).view.cursors_to(primary, pos);
    true
}

pub(crate) fn command_map(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    let local = cmd.def.name.contains('-');
    let name = cmd.def.name.to_string();

    if local && win.is_none() {
        ed.info(&format!("Invalid window for :{name}"));
        return false;
    }

    let mode = cmd.argv.first().map(|s| keymap_mode_from(s));
    let (mode, lhs, rhs) = match (mode, cmd.argv.get(1), cmd.argv.get(2)) {
        (Some(Some(mode)), Some(lhs), Some(rhs)) => (mode, lhs.clone(), rhs.clone()),
        _ => {
            ed.info(&format!("usage: {name} mode lhs rhs"));
            return false;
        },
    };

    let mapped = if local {
        match win {
            Some(w) => ed.win_mut(w).bindings.map(mode, cmd.force, &lhs, &rhs),
            None => false,
        }
    } else {
        ed.keymap.map(mode, cmd.force, &lhs, &rhs)
    };

    if !mapped {
        ed.info(&format!(
            "Failed to map `{lhs}' in {} mode, mapping already exists, override with `!'",
            cmd.argv[0]
        ));
    }
    mapped
}

pub(crate) fn command_unmap(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    let name = cmd.def.name.to_string();
    let mode_name = cmd.argv.first().cloned().unwrap_or_default();
    let lhs = cmd.argv.get(1).cloned().unwrap_or_default();

    let mode = keymap_mode_from(&mode_name);
    match (mode, lhs.is_empty()) {
        (Some(mode), false) => {
            let window_local = name.len() > 5;
            let result = if window_local {
                match win {
                    Some(w) => ed.win_mut(w).bindings.unmap(mode, &lhs),
                    None => false,
                }
            } else {
                ed.keymap.unmap(mode, &lhs)
            };
            if !result {
                ed.info(&format!("failed to unmap `{lhs}` in {mode_name} mode"));
            }
            result
        },
        _ => {
            ed.info(&format!("usage: {name} mode lhs"));
            false
        },
    }
}

pub(crate) fn command_langmap(
    ed: &mut Editor,
    _win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    _sel: Option<usize>,
    _range: &mut FileRange,
) -> bool {
    let nonlatin = cmd.argv.first().cloned().unwrap_or_default();
    let latin = cmd.argv.get(1).cloned().unwrap_or_default();

    if nonlatin.is_empty() || latin.is_empty() {
        ed.info("usage: langmap <non-latin keys> <latin keys>");
        return false;
    }

    let mut mapped = true;
    for (from, to) in nonlatin.chars().zip(latin.chars()) {
        mapped &= ed.langmap_add(from.to_string(), to.to_string());
    }
    mapped
}

pub(crate) fn command_user(
    ed: &mut Editor,
    win: Option<WindowId>,
    cmd: &mut Command,
    _sts: &mut TokenStream,
    sel: Option<usize>,
    range: &mut FileRange,
) -> bool {
    let func = match ed.registry.user_fn(&cmd.def.name) {
        Some(func) => func,
        None => return false,
    };
    let call = super::UserCall {
        force: cmd.force,
        argv: &cmd.argv,
        selection: sel,
        range: *range,
    };
    func(ed, win, &call)
}
