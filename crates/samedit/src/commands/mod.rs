//! # Command definitions and registry
//!
//! ## Overview
//!
//! Every command the engine knows is described by a static [CommandDef]:
//! its name, one-line help, handler, and the flag set controlling which
//! arguments the parser consumes and how the executor treats it. The
//! [CommandRegistry] maps names to definitions — builtins plus commands
//! registered at runtime — and resolves abbreviations by closest-prefix
//! lookup, so `q` finds `quit`-style names the way users expect.

pub(crate) mod editor;
pub(crate) mod exec;
pub mod parse;
pub(crate) mod sam;

use std::borrow::Cow;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use bitflags::bitflags;
use radix_trie::{Trie, TrieCommon};
use regex::Regex;

use crate::address::Address;
use crate::editing::FileRange;
use crate::editor::{Editor, WindowId};
use crate::lex::TokenStream;
use self::parse::Count;

bitflags! {
    /// Flags controlling a command's argument shape and execution.
    pub struct CommandFlags: u32 {
        /// The command takes a nested sub/target command.
        const CMD           = 1 << 0;

        /// A regex argument follows the command name.
        const REGEX         = 1 << 1;

        /// The regex is optional.
        const REGEX_DEFAULT = 1 << 2;

        /// The command supports a count (`n`, `n,m`, or `%n`).
        const COUNT         = 1 << 3;

        /// The command takes a delimited text argument.
        const TEXT          = 1 << 4;

        /// It is an error to give the command an address.
        const ADDRESS_NONE  = 1 << 5;

        /// No address implies an empty range at the cursor.
        const ADDRESS_POS   = 1 << 6;

        /// No address implies the current line.
        const ADDRESS_LINE  = 1 << 7;

        /// No address implies an empty range at the start of the next line.
        const ADDRESS_AFTER = 1 << 8;

        /// No address implies the whole file, regardless of cursor count.
        const ADDRESS_ALL   = 1 << 9;

        /// No address implies the whole file when only one cursor exists.
        const ADDRESS_ALL_1CURSOR = 1 << 10;

        /// The command takes a shell command as its argument.
        const SHELL         = 1 << 11;

        /// The command can be forced with a trailing `!`.
        const FORCE         = 1 << 12;

        /// Shell-like argument splitting is desired.
        const ARGV          = 1 << 13;

        /// Execute once, not per selection.
        const ONCE          = 1 << 14;

        /// A looping construct like `x` and `y`.
        const LOOP          = 1 << 15;

        /// The command potentially destroys the window.
        const DESTRUCTIVE   = 1 << 16;

        /// The command requires an active window.
        const WIN           = 1 << 17;
    }
}

/// Handler signature shared by all builtin commands.
pub(crate) type CmdFn = fn(
    &mut Editor,
    Option<WindowId>,
    &mut Command,
    &mut TokenStream,
    Option<usize>,
    &mut FileRange,
) -> bool;

/// The static description of one command.
pub struct CommandDef {
    /// Command name.
    pub name: Cow<'static, str>,

    /// Short, one-line help text.
    pub help: Cow<'static, str>,

    /// Flags controlling arguments and execution.
    pub flags: CommandFlags,

    pub(crate) handler: CmdFn,
    pub(crate) default_sub: Option<&'static str>,
}

/// One parsed command invocation, possibly with nested sub-commands.
pub(crate) struct Command {
    pub(crate) def: Arc<CommandDef>,
    pub(crate) address: Option<Address>,
    pub(crate) count: Count,
    pub(crate) regex: Option<Regex>,
    pub(crate) text: Option<String>,
    pub(crate) shell: Option<String>,
    pub(crate) argv: Vec<String>,
    pub(crate) force: bool,
    pub(crate) sub: Option<Box<Command>>,
    pub(crate) group: Vec<Command>,
    pub(crate) iteration: i64,
}

impl Command {
    pub(crate) fn new(def: Arc<CommandDef>) -> Self {
        Command {
            def,
            address: None,
            count: Count::default(),
            regex: None,
            text: None,
            shell: None,
            argv: Vec::new(),
            force: false,
            sub: None,
            group: Vec::new(),
            iteration: 0,
        }
    }

    pub(crate) fn is_group(&self) -> bool {
        self.def.name == "{"
    }
}

/// Context handed to a user-registered command when it runs.
pub struct UserCall<'a> {
    /// Whether the invocation carried a `!`.
    pub force: bool,

    /// Whitespace-split arguments, with quote grouping applied.
    pub argv: &'a [String],

    /// The selection the command runs under, if any.
    pub selection: Option<usize>,

    /// The range the command runs over.
    pub range: FileRange,
}

/// Handler signature for user-registered commands.
pub type UserCommandFn = Rc<dyn Fn(&mut Editor, Option<WindowId>, &UserCall<'_>) -> bool>;

/// Immutable builtin table plus the mutable user-command map.
pub struct CommandRegistry {
    commands: Trie<String, Arc<CommandDef>>,
    user: HashMap<String, UserCommandFn>,
}

fn builtin(
    name: &'static str,
    help: &'static str,
    handler: CmdFn,
    flags: CommandFlags,
) -> CommandDef {
    CommandDef {
        name: Cow::Borrowed(name),
        help: Cow::Borrowed(help),
        flags,
        handler,
        default_sub: None,
    }
}

fn builtin_defs() -> Vec<CommandDef> {
    use CommandFlags as F;

    let mut defs = vec![
        builtin("a", "Append text after range", sam::command_append, F::TEXT | F::WIN),
        builtin("c", "Change text in range", sam::command_change, F::TEXT | F::WIN),
        builtin("d", "Delete text in range", sam::command_delete, F::WIN),
        builtin(
            "g",
            "If range contains regexp, run command",
            sam::command_guard,
            F::COUNT | F::REGEX | F::CMD | F::WIN,
        ),
        builtin("i", "Insert text before range", sam::command_insert, F::TEXT | F::WIN),
        builtin("p", "Create selection covering range", sam::command_print, F::WIN),
        builtin(
            "s",
            "Substitute: use x/pattern/ c/replacement/ instead",
            sam::command_substitute,
            F::SHELL,
        ),
        builtin(
            "v",
            "If range does not contain regexp, run command",
            sam::command_guard,
            F::COUNT | F::REGEX | F::CMD,
        ),
        builtin(
            "x",
            "Set range and run command on each match",
            sam::command_extract,
            F::CMD | F::REGEX | F::REGEX_DEFAULT | F::ADDRESS_ALL_1CURSOR | F::LOOP | F::WIN,
        ),
        builtin(
            "y",
            "As `x` but select unmatched text",
            sam::command_extract,
            F::CMD | F::REGEX | F::ADDRESS_ALL_1CURSOR | F::LOOP | F::WIN,
        ),
        builtin(
            "X",
            "Run command on files whose name matches",
            sam::command_files,
            F::CMD | F::REGEX | F::REGEX_DEFAULT | F::ADDRESS_NONE | F::ONCE,
        ),
        builtin(
            "Y",
            "As `X` but select unmatched files",
            sam::command_files,
            F::CMD | F::REGEX | F::ADDRESS_NONE | F::ONCE,
        ),
        builtin(
            ">",
            "Send range to stdin of command",
            sam::command_pipeout,
            F::SHELL | F::ADDRESS_LINE | F::WIN,
        ),
        builtin(
            "<",
            "Replace range by stdout of command",
            sam::command_pipein,
            F::SHELL | F::ADDRESS_POS | F::WIN,
        ),
        builtin("|", "Pipe range through command", sam::command_filter, F::SHELL | F::WIN),
        builtin(
            "!",
            "Run the command",
            sam::command_launch,
            F::SHELL | F::ONCE | F::ADDRESS_NONE | F::WIN,
        ),
        builtin(
            "w",
            "Write range to named file",
            sam::command_write,
            F::ARGV | F::FORCE | F::ONCE | F::ADDRESS_ALL | F::WIN,
        ),
        builtin(
            "r",
            "Insert contents of file after range",
            sam::command_read,
            F::ARGV | F::ADDRESS_AFTER | F::WIN,
        ),
        builtin(
            "e",
            "Edit file",
            sam::command_edit,
            F::ARGV | F::FORCE | F::ONCE | F::ADDRESS_NONE | F::DESTRUCTIVE | F::WIN,
        ),
        builtin(
            "q",
            "Quit the current window",
            sam::command_quit,
            F::ARGV | F::FORCE | F::ONCE | F::ADDRESS_NONE | F::DESTRUCTIVE,
        ),
        builtin("cd", "Change directory", sam::command_cd, F::ARGV | F::ONCE | F::ADDRESS_NONE),
        // vi(m) related commands
        builtin("help", "Show this help", editor::command_help, F::ARGV | F::ONCE | F::ADDRESS_NONE),
        builtin(
            "map",
            "Map key binding `:map <mode> <lhs> <rhs>`",
            editor::command_map,
            F::ARGV | F::FORCE | F::ONCE | F::ADDRESS_NONE,
        ),
        builtin(
            "map-window",
            "As `map` but window local",
            editor::command_map,
            F::ARGV | F::FORCE | F::ONCE | F::ADDRESS_NONE,
        ),
        builtin(
            "unmap",
            "Unmap key binding `:unmap <mode> <lhs>`",
            editor::command_unmap,
            F::ARGV | F::ONCE | F::ADDRESS_NONE,
        ),
        builtin(
            "unmap-window",
            "`unmap` for window local bindings",
            editor::command_unmap,
            F::ARGV | F::ONCE | F::ADDRESS_NONE | F::WIN,
        ),
        builtin(
            "langmap",
            "Map keyboard layout `:langmap <locale-keys> <latin-keys>`",
            editor::command_langmap,
            F::ARGV | F::FORCE | F::ONCE | F::ADDRESS_NONE,
        ),
        builtin("new", "Create new window", editor::command_new, F::ARGV | F::ONCE | F::ADDRESS_NONE),
        builtin("open", "Open file", editor::command_open, F::ARGV | F::ONCE | F::ADDRESS_NONE),
        builtin(
            "qall",
            "Exit the editor",
            editor::command_qall,
            F::ARGV | F::FORCE | F::ONCE | F::ADDRESS_NONE | F::DESTRUCTIVE,
        ),
        builtin("set", "Set option", editor::command_set, F::ARGV | F::ONCE | F::ADDRESS_NONE),
        builtin(
            "split",
            "Horizontally split window",
            editor::command_split,
            F::ARGV | F::ONCE | F::ADDRESS_NONE | F::WIN,
        ),
        builtin(
            "vnew",
            "As `:new` but split vertically",
            editor::command_vnew,
            F::ARGV | F::ONCE | F::ADDRESS_NONE,
        ),
        builtin(
            "vsplit",
            "Vertically split window",
            editor::command_vsplit,
            F::ARGV | F::ONCE | F::ADDRESS_NONE | F::WIN,
        ),
        builtin(
            "wq",
            "Write file and quit",
            editor::command_wq,
            F::ARGV | F::FORCE | F::ONCE | F::ADDRESS_ALL | F::DESTRUCTIVE | F::WIN,
        ),
        builtin(
            "earlier",
            "Go to older text state",
            editor::command_earlier_later,
            F::ARGV | F::ONCE | F::ADDRESS_NONE | F::WIN,
        ),
        builtin(
            "later",
            "Go to newer text state",
            editor::command_earlier_later,
            F::ARGV | F::ONCE | F::ADDRESS_NONE | F::WIN,
        ),
    ];

    for def in defs.iter_mut() {
        if matches!(&*def.name, "g" | "v" | "x" | "y") {
            def.default_sub = Some("p");
        }
    }
    defs
}

pub(crate) fn group_def() -> Arc<CommandDef> {
    Arc::new(builtin("{", "Start of command group", sam::command_noop, CommandFlags::WIN))
}

pub(crate) fn select_def() -> Arc<CommandDef> {
    Arc::new(builtin("select", "Run command per selection", sam::command_select, CommandFlags::CMD))
}

impl CommandRegistry {
    /// A registry holding the builtin commands.
    pub fn new() -> Self {
        let mut commands = Trie::new();
        for def in builtin_defs() {
            commands.insert(def.name.to_string(), Arc::new(def));
        }
        CommandRegistry { commands, user: HashMap::new() }
    }

    /// Resolve a (possibly abbreviated) command name: an exact match wins,
    /// otherwise the first name having the input as a prefix.
    pub fn lookup(&self, name: &str) -> Option<Arc<CommandDef>> {
        if let Some(def) = self.commands.get(name) {
            return Some(def.clone());
        }
        let sub = self.commands.get_raw_descendant(name)?;
        sub.values().next().cloned()
    }

    /// Register a user command visible to lookup and help. Fails when the
    /// name is empty or already taken.
    pub fn register_user(
        &mut self,
        name: &str,
        help: Option<&str>,
        func: UserCommandFn,
    ) -> bool {
        use CommandFlags as F;

        if name.is_empty() || self.commands.get(name).is_some() {
            return false;
        }

        let def = CommandDef {
            name: Cow::Owned(name.to_string()),
            help: Cow::Owned(help.unwrap_or("").to_string()),
            flags: F::ARGV | F::FORCE | F::ONCE | F::ADDRESS_ALL,
            handler: editor::command_user,
            default_sub: None,
        };
        self.commands.insert(name.to_string(), Arc::new(def));
        self.user.insert(name.to_string(), func);
        true
    }

    /// Remove a user command from lookup and help; both entries go or
    /// neither does.
    pub fn unregister_user(&mut self, name: &str) -> bool {
        if !self.user.contains_key(name) {
            return false;
        }
        if self.commands.remove(name).is_none() {
            return false;
        }
        self.user.remove(name);
        true
    }

    pub(crate) fn user_fn(&self, name: &str) -> Option<UserCommandFn> {
        self.user.get(name).cloned()
    }

    /// All known definitions in name order, for the help printer.
    pub fn defs(&self) -> Vec<Arc<CommandDef>> {
        self.commands.values().cloned().collect()
    }

    /// Completion candidates for a command-name prefix.
    pub fn complete(&self, prefix: &str) -> Vec<String> {
        match self.commands.get_raw_descendant(prefix) {
            Some(sub) => sub.keys().cloned().collect(),
            None => Vec::new(),
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        CommandRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_exact_and_prefix() {
        let reg = CommandRegistry::new();

        assert_eq!(reg.lookup("d").unwrap().name, "d");
        assert_eq!(reg.lookup("q").unwrap().name, "q");
        assert_eq!(reg.lookup("se").unwrap().name, "set");
        assert_eq!(reg.lookup("spl").unwrap().name, "split");
        assert_eq!(reg.lookup("unmap-w").unwrap().name, "unmap-window");
        assert!(reg.lookup("zz").is_none());
    }

    #[test]
    fn test_prefix_prefers_first_in_order() {
        let reg = CommandRegistry::new();
        // "map" and "map-window" share the prefix; the exact key wins
        assert_eq!(reg.lookup("map").unwrap().name, "map");
        assert_eq!(reg.lookup("ma").unwrap().name, "map");
    }

    #[test]
    fn test_register_unregister_user() {
        let mut reg = CommandRegistry::new();
        let func: UserCommandFn = Rc::new(|_, _, _| true);

        assert!(reg.register_user("frob", Some("Frobnicate"), func.clone()));
        assert_eq!(reg.lookup("frob").unwrap().help, "Frobnicate");

        // names cannot be taken twice
        assert!(!reg.register_user("frob", None, func.clone()));
        assert!(!reg.register_user("d", None, func));

        assert!(reg.unregister_user("frob"));
        assert!(reg.lookup("frob").is_none());
        assert!(!reg.unregister_user("frob"));
    }

    #[test]
    fn test_complete() {
        let reg = CommandRegistry::new();
        let mut names = reg.complete("ma");
        names.sort();
        assert_eq!(names, vec!["map".to_string(), "map-window".to_string()]);
    }
}
