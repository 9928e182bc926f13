//! # Option handling
//!
//! ## Overview
//!
//! `:set` options are described by a name list (the first name is primary,
//! the rest are aliases), a value kind, and flags. Builtins dispatch into
//! the editor and window state directly; user-registered options invoke
//! their handler with the parsed value. Both `:set foo!` and `:set !foo`
//! toggle a boolean option.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use bitflags::bitflags;
use radix_trie::{Trie, TrieCommon};

use crate::editing::text::{LoadMethod, SaveMethod};
use crate::editing::ui::Layout;
use crate::editor::{Editor, UiOptions, WindowId};

bitflags! {
    /// Option type and behaviour flags.
    pub struct OptionFlags: u32 {
        /// The option takes a boolean value.
        const TYPE_BOOL      = 1 << 0;

        /// The option takes a non-negative number.
        const TYPE_NUMBER    = 1 << 1;

        /// The option takes a string value.
        const TYPE_STRING    = 1 << 2;

        /// The value may be omitted.
        const VALUE_OPTIONAL = 1 << 3;

        /// The option needs an active window.
        const NEED_WINDOW    = 1 << 4;

        /// Using the option prints a deprecation notice.
        const DEPRECATED     = 1 << 5;
    }
}

/// A parsed option value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OptionValue {
    /// A boolean value.
    Bool(bool),

    /// A non-negative number.
    Number(i64),

    /// A string value.
    Str(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum BuiltinOption {
    Shell,
    EscDelay,
    AutoIndent,
    ExpandTab,
    TabWidth,
    ShowSpaces,
    ShowTabs,
    ShowNewlines,
    ShowEof,
    StatusBar,
    Numbers,
    RelativeNumbers,
    CursorLine,
    ColorColumn,
    SaveMethod,
    LoadMethod,
    Layout,
    IgnoreCase,
    BreakAt,
    WrapColumn,
}

/// Handler signature for user-registered options.
pub type UserOptionFn =
    Rc<dyn Fn(&mut Editor, Option<WindowId>, bool, &str, &OptionValue) -> bool>;

/// Description of one option: names, kind, and dispatch target.
pub struct OptionDef {
    /// Option names; the first is primary, the rest are aliases.
    pub names: Vec<String>,

    /// Type and behaviour flags.
    pub flags: OptionFlags,

    /// Short, one-line help text.
    pub help: String,

    pub(crate) builtin: Option<BuiltinOption>,
    pub(crate) handler: Option<UserOptionFn>,
}

fn builtin(
    names: &[&str],
    flags: OptionFlags,
    help: &str,
    which: BuiltinOption,
) -> OptionDef {
    OptionDef {
        names: names.iter().map(|s| s.to_string()).collect(),
        flags,
        help: help.to_string(),
        builtin: Some(which),
        handler: None,
    }
}

fn builtin_options() -> Vec<OptionDef> {
    use BuiltinOption as B;
    use OptionFlags as F;

    vec![
        builtin(&["shell"], F::TYPE_STRING, "Shell to use for external commands", B::Shell),
        builtin(
            &["escdelay"],
            F::TYPE_NUMBER,
            "Milliseconds to wait to distinguish <Escape> from terminal escape sequences",
            B::EscDelay,
        ),
        builtin(
            &["autoindent", "ai"],
            F::TYPE_BOOL,
            "Copy leading white space from previous line",
            B::AutoIndent,
        ),
        builtin(
            &["expandtab", "et"],
            F::TYPE_BOOL | F::NEED_WINDOW,
            "Replace entered <Tab> with `tabwidth` spaces",
            B::ExpandTab,
        ),
        builtin(
            &["tabwidth", "tw"],
            F::TYPE_NUMBER | F::NEED_WINDOW,
            "Number of spaces to display (and insert if `expandtab` is enabled) for a tab",
            B::TabWidth,
        ),
        builtin(
            &["showspaces"],
            F::TYPE_BOOL | F::NEED_WINDOW,
            "Display replacement symbol instead of a space",
            B::ShowSpaces,
        ),
        builtin(
            &["showtabs"],
            F::TYPE_BOOL | F::NEED_WINDOW,
            "Display replacement symbol for tabs",
            B::ShowTabs,
        ),
        builtin(
            &["shownewlines"],
            F::TYPE_BOOL | F::NEED_WINDOW,
            "Display replacement symbol for newlines",
            B::ShowNewlines,
        ),
        builtin(
            &["showeof"],
            F::TYPE_BOOL | F::NEED_WINDOW,
            "Display replacement symbol for lines after the end of the file",
            B::ShowEof,
        ),
        builtin(
            &["statusbar", "sb"],
            F::TYPE_BOOL | F::NEED_WINDOW,
            "Display status bar",
            B::StatusBar,
        ),
        builtin(
            &["numbers", "nu"],
            F::TYPE_BOOL | F::NEED_WINDOW,
            "Display absolute line numbers",
            B::Numbers,
        ),
        builtin(
            &["relativenumbers", "rnu"],
            F::TYPE_BOOL | F::NEED_WINDOW,
            "Display relative line numbers",
            B::RelativeNumbers,
        ),
        builtin(
            &["cursorline", "cul"],
            F::TYPE_BOOL | F::NEED_WINDOW,
            "Highlight current cursor line",
            B::CursorLine,
        ),
        builtin(
            &["colorcolumn", "cc"],
            F::TYPE_NUMBER | F::NEED_WINDOW,
            "Highlight a fixed column",
            B::ColorColumn,
        ),
        builtin(
            &["savemethod"],
            F::TYPE_STRING | F::NEED_WINDOW,
            "Save method to use for current file 'auto', 'atomic' or 'inplace'",
            B::SaveMethod,
        ),
        builtin(
            &["loadmethod"],
            F::TYPE_STRING,
            "How to load existing files 'auto', 'read' or 'mmap'",
            B::LoadMethod,
        ),
        builtin(&["layout"], F::TYPE_STRING, "Vertical or horizontal window layout", B::Layout),
        builtin(
            &["ignorecase", "ic"],
            F::TYPE_BOOL,
            "Ignore case when searching",
            B::IgnoreCase,
        ),
        builtin(
            &["breakat", "brk"],
            F::TYPE_STRING | F::NEED_WINDOW,
            "Characters which might cause a word wrap",
            B::BreakAt,
        ),
        builtin(
            &["wrapcolumn", "wc"],
            F::TYPE_NUMBER | F::NEED_WINDOW,
            "Wrap lines at minimum of window width and wrapcolumn",
            B::WrapColumn,
        ),
    ]
}

/// Option lookup table with closest-prefix resolution.
pub struct OptionRegistry {
    options: Trie<String, Arc<OptionDef>>,
    user: HashMap<String, Vec<String>>,
}

impl OptionRegistry {
    /// A registry holding the builtin options.
    pub fn new() -> Self {
        let mut options = Trie::new();
        for def in builtin_options() {
            let def = Arc::new(def);
            for name in &def.names {
                options.insert(name.clone(), def.clone());
            }
        }
        OptionRegistry { options, user: HashMap::new() }
    }

    /// Resolve a (possibly abbreviated) option name.
    pub fn lookup(&self, name: &str) -> Option<Arc<OptionDef>> {
        if let Some(def) = self.options.get(name) {
            return Some(def.clone());
        }
        let sub = self.options.get_raw_descendant(name)?;
        sub.values().next().cloned()
    }

    /// Register a user option under all its names; fails when any name is
    /// already taken, registering nothing in that case.
    pub fn register_user(
        &mut self,
        names: &[&str],
        flags: OptionFlags,
        help: &str,
        handler: UserOptionFn,
    ) -> bool {
        if names.is_empty() || names.iter().any(|n| self.options.get(*n).is_some()) {
            return false;
        }
        let def = Arc::new(OptionDef {
            names: names.iter().map(|s| s.to_string()).collect(),
            flags,
            help: help.to_string(),
            builtin: None,
            handler: Some(handler),
        });
        for name in names {
            self.options.insert(name.to_string(), def.clone());
        }
        self.user
            .insert(names[0].to_string(), names.iter().map(|s| s.to_string()).collect());
        true
    }

    /// Unregister a user option and all its aliases; all entries go or
    /// none do.
    pub fn unregister_user(&mut self, name: &str) -> bool {
        let primary = match self.lookup(name) {
            Some(def) if def.builtin.is_none() => def.names[0].clone(),
            _ => return false,
        };
        let aliases = match self.user.remove(&primary) {
            Some(aliases) => aliases,
            None => return false,
        };
        for alias in aliases {
            self.options.remove(&alias);
        }
        true
    }

    /// All known definitions, one entry per option, for the help printer.
    pub fn defs(&self) -> Vec<Arc<OptionDef>> {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for def in self.options.values() {
            if !seen.contains(&def.names[0]) {
                seen.push(def.names[0].clone());
                out.push(def.clone());
            }
        }
        out
    }
}

impl Default for OptionRegistry {
    fn default() -> Self {
        OptionRegistry::new()
    }
}

/// Parse a human-readable boolean value.
pub fn parse_bool(s: &str) -> Option<bool> {
    const TRUE: &[&str] = &["1", "true", "yes", "on"];
    const FALSE: &[&str] = &["0", "false", "no", "off"];

    if TRUE.iter().any(|t| t.eq_ignore_ascii_case(s)) {
        Some(true)
    } else if FALSE.iter().any(|f| f.eq_ignore_ascii_case(s)) {
        Some(false)
    } else {
        None
    }
}

fn window_flag(which: BuiltinOption) -> UiOptions {
    match which {
        BuiltinOption::ShowSpaces => UiOptions::SYMBOL_SPACE,
        BuiltinOption::ShowTabs => UiOptions::SYMBOL_TAB | UiOptions::SYMBOL_TAB_FILL,
        BuiltinOption::ShowNewlines => UiOptions::SYMBOL_EOL,
        BuiltinOption::ShowEof => UiOptions::SYMBOL_EOF,
        BuiltinOption::StatusBar => UiOptions::STATUSBAR,
        _ => UiOptions::empty(),
    }
}

fn apply_builtin(
    ed: &mut Editor,
    win: Option<WindowId>,
    which: BuiltinOption,
    toggle: bool,
    value: &OptionValue,
) -> bool {
    use BuiltinOption as B;

    let bool_value = |current: bool| match value {
        OptionValue::Bool(b) => {
            if toggle {
                !current
            } else {
                *b
            }
        },
        _ => current,
    };
    let num_value = || match value {
        OptionValue::Number(n) => *n,
        _ => 0,
    };
    let str_value = || match value {
        OptionValue::Str(s) => s.clone(),
        _ => String::new(),
    };

    // editor-level options first; everything else needs the window that
    // set_command has already checked for
    match which {
        B::Shell => {
            ed.shell = str_value();
            return true;
        },
        B::EscDelay => {
            ed.ui.set_key_wait(num_value());
            return true;
        },
        B::AutoIndent => {
            ed.autoindent = bool_value(ed.autoindent);
            return true;
        },
        B::IgnoreCase => {
            ed.ignorecase = bool_value(ed.ignorecase);
            return true;
        },
        B::LoadMethod => {
            ed.load_method = match str_value().as_str() {
                "auto" => LoadMethod::Auto,
                "read" => LoadMethod::Read,
                "mmap" => LoadMethod::Mmap,
                other => {
                    ed.info(&format!(
                        "Invalid load method `{other}', expected 'auto', 'read' or 'mmap'"
                    ));
                    return false;
                },
            };
            return true;
        },
        B::Layout => {
            match str_value().as_str() {
                "h" => ed.ui.arrange(Layout::Horizontal),
                "v" => ed.ui.arrange(Layout::Vertical),
                other => {
                    ed.info(&format!("Invalid layout `{other}', expected 'h' or 'v'"));
                    return false;
                },
            }
            return true;
        },
        _ => {},
    }

    let w = match win {
        Some(w) => w,
        None => return false,
    };

    match which {
        B::ExpandTab => {
            let cur = ed.win(w).expandtab;
            ed.win_mut(w).expandtab = bool_value(cur);
        },
        B::TabWidth => ed.win_mut(w).tabwidth = num_value(),
        B::ShowSpaces | B::ShowTabs | B::ShowNewlines | B::ShowEof | B::StatusBar => {
            let flag = window_flag(which);
            let mut flags = ed.win(w).options;
            let on = match value {
                OptionValue::Bool(b) => *b || (toggle && !flags.contains(flag)),
                _ => false,
            };
            if on {
                flags |= flag;
            } else {
                flags &= !flag;
            }
            ed.win_mut(w).options = flags;
        },
        B::Numbers => {
            let mut flags = ed.win(w).options;
            let on = match value {
                OptionValue::Bool(b) => {
                    *b || (toggle && !flags.contains(UiOptions::LINE_NUMBERS_ABSOLUTE))
                },
                _ => false,
            };
            if on {
                flags &= !UiOptions::LINE_NUMBERS_RELATIVE;
                flags |= UiOptions::LINE_NUMBERS_ABSOLUTE;
            } else {
                flags &= !UiOptions::LINE_NUMBERS_ABSOLUTE;
            }
            ed.win_mut(w).options = flags;
        },
        B::RelativeNumbers => {
            let mut flags = ed.win(w).options;
            let on = match value {
                OptionValue::Bool(b) => {
                    *b || (toggle && !flags.contains(UiOptions::LINE_NUMBERS_RELATIVE))
                },
                _ => false,
            };
            if on {
                flags &= !UiOptions::LINE_NUMBERS_ABSOLUTE;
                flags |= UiOptions::LINE_NUMBERS_RELATIVE;
            } else {
                flags &= !UiOptions::LINE_NUMBERS_RELATIVE;
            }
            ed.win_mut(w).options = flags;
        },
        B::CursorLine => {
            let mut flags = ed.win(w).options;
            let on = match value {
                OptionValue::Bool(b) => *b || (toggle && !flags.contains(UiOptions::CURSOR_LINE)),
                _ => false,
            };
            if on {
                flags |= UiOptions::CURSOR_LINE;
            } else {
                flags &= !UiOptions::CURSOR_LINE;
            }
            ed.win_mut(w).options = flags;
        },
        B::ColorColumn => ed.win_mut(w).colorcolumn = num_value(),
        B::WrapColumn => ed.win_mut(w).wrapcolumn = num_value(),
        B::BreakAt => ed.win_mut(w).breakat = str_value(),
        B::SaveMethod => {
            let method = match str_value().as_str() {
                "auto" => SaveMethod::Auto,
                "atomic" => SaveMethod::Atomic,
                "inplace" => SaveMethod::Inplace,
                other => {
                    ed.info(&format!(
                        "Invalid save method `{other}', expected 'auto', 'atomic' or 'inplace'"
                    ));
                    return false;
                },
            };
            ed.file_of_mut(w).save_method = method;
        },
        B::Shell | B::EscDelay | B::AutoIndent | B::IgnoreCase | B::LoadMethod | B::Layout => {},
    }
    true
}

/// The body of the `set` command: toggle markers (both `:set foo!` and
/// `:set !foo`), closest-prefix name lookup, value parsing per kind, then
/// builtin or user dispatch.
pub(crate) fn set_command(ed: &mut Editor, win: Option<WindowId>, argv: &[String]) -> bool {
    let mut name = match argv.first() {
        Some(name) => name.as_str(),
        None => {
            ed.info("Expecting option name");
            return false;
        },
    };
    let mut toggle = false;
    if let Some(stripped) = name.strip_prefix('!') {
        toggle = true;
        name = stripped;
    }
    if let Some(stripped) = name.strip_suffix('!') {
        toggle = true;
        name = stripped;
    }
    if name.is_empty() {
        ed.info("Expecting option name");
        return false;
    }
    let value_arg = argv.get(1);

    let opt = match ed.options.lookup(name) {
        Some(opt) => opt,
        None => {
            ed.info(&format!("Unknown option: `{name}'"));
            return false;
        },
    };

    if opt.flags.contains(OptionFlags::DEPRECATED) {
        ed.info(&format!("{name} is deprecated and will be removed in the next release"));
    }

    if win.is_none() && opt.flags.contains(OptionFlags::NEED_WINDOW) {
        ed.info(&format!("Need active window for `:set {name}'"));
        return false;
    }

    if toggle {
        if !opt.flags.contains(OptionFlags::TYPE_BOOL) {
            ed.info("Only boolean options can be toggled");
            return false;
        }
        if value_arg.is_some() {
            ed.info("Can not specify option value when toggling");
            return false;
        }
    }

    let value = if opt.flags.contains(OptionFlags::TYPE_STRING) {
        match value_arg {
            Some(s) => OptionValue::Str(s.clone()),
            None => {
                if !opt.flags.contains(OptionFlags::VALUE_OPTIONAL) {
                    ed.info("Expecting string option value");
                    return false;
                }
                OptionValue::Str(String::new())
            },
        }
    } else if opt.flags.contains(OptionFlags::TYPE_BOOL) {
        match value_arg {
            None => OptionValue::Bool(!toggle),
            Some(s) => match parse_bool(s) {
                Some(b) => OptionValue::Bool(b),
                None => {
                    ed.info(&format!("Expecting boolean option value not: `{s}'"));
                    return false;
                },
            },
        }
    } else if opt.flags.contains(OptionFlags::TYPE_NUMBER) {
        match value_arg.and_then(|s| s.parse::<i64>().ok()) {
            None => {
                ed.info("Expecting number");
                return false;
            },
            Some(n) if n < 0 => {
                ed.info("Expecting positive number");
                return false;
            },
            Some(n) if n > i32::MAX as i64 => {
                ed.info("Number overflow");
                return false;
            },
            Some(n) => OptionValue::Number(n),
        }
    } else {
        return false;
    };

    match opt.builtin {
        Some(which) => apply_builtin(ed, win, which, toggle, &value),
        None => match &opt.handler {
            Some(handler) => {
                let handler = handler.clone();
                handler(ed, win, toggle, name, &value)
            },
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        for s in ["1", "true", "YES", "On"] {
            assert_eq!(parse_bool(s), Some(true));
        }
        for s in ["0", "false", "NO", "Off"] {
            assert_eq!(parse_bool(s), Some(false));
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_lookup_aliases_and_prefix() {
        let reg = OptionRegistry::new();
        assert_eq!(reg.lookup("tabwidth").unwrap().names[0], "tabwidth");
        assert_eq!(reg.lookup("tw").unwrap().names[0], "tabwidth");
        assert_eq!(reg.lookup("tabw").unwrap().names[0], "tabwidth");
        assert_eq!(reg.lookup("ignorec").unwrap().names[0], "ignorecase");
        assert!(reg.lookup("nosuch").is_none());
    }

    #[test]
    fn test_register_user_atomic() {
        let mut reg = OptionRegistry::new();
        let handler: UserOptionFn = Rc::new(|_, _, _, _, _| true);

        // clashing alias registers nothing
        assert!(!reg.register_user(&["myopt", "tw"], OptionFlags::TYPE_BOOL, "", handler.clone()));
        assert!(reg.lookup("myopt").is_none());

        assert!(reg.register_user(&["myopt", "mo"], OptionFlags::TYPE_BOOL, "", handler));
        assert!(reg.lookup("mo").is_some());

        assert!(reg.unregister_user("myopt"));
        assert!(reg.lookup("myopt").is_none());
        assert!(reg.lookup("mo").is_none());
    }
}
