//! # The editor context
//!
//! ## Overview
//!
//! [Editor] is the explicit context threaded through every handler: files,
//! windows, the command and option registries, registers, key binding
//! tables, the mode flag, and the hooks to the hosting application. There
//! is no ambient state.
//!
//! [Editor::sam_cmd] is the engine's entry point: it lexes and validates
//! the line, executes it, then applies each file's transcript atomically,
//! re-anchoring selections against the shifted positions and switching the
//! mode based on whether any selection remains anchored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};

use crate::commands::{exec, CommandRegistry};
use crate::editing::marks::MarkSet;
use crate::editing::registers::RegisterStore;
use crate::editing::text::{FileStat, LoadMethod, SaveMethod, TextBuffer};
use crate::editing::ui::{CapturingUi, Ui};
use crate::editing::view::View;
use crate::editing::{FileRange, Mode};
use crate::errors::{ErrorLog, SamError};
use crate::lex::TokenStream;
use crate::options::OptionRegistry;
use crate::transcript::{ChangeKind, Transcript};

use bitflags::bitflags;

/// Identifier of an open window.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct WindowId(pub usize);

/// Identifier of an open file.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FileId(pub usize);

bitflags! {
    /// Per-window display options toggled through `:set`.
    pub struct UiOptions: u32 {
        /// Show a replacement symbol for spaces.
        const SYMBOL_SPACE          = 1 << 0;

        /// Show a replacement symbol for tabs.
        const SYMBOL_TAB            = 1 << 1;

        /// Fill the remaining tab width with a symbol.
        const SYMBOL_TAB_FILL       = 1 << 2;

        /// Show a replacement symbol for newlines.
        const SYMBOL_EOL            = 1 << 3;

        /// Show a replacement symbol past the end of the file.
        const SYMBOL_EOF            = 1 << 4;

        /// Show the status bar.
        const STATUSBAR             = 1 << 5;

        /// Show absolute line numbers.
        const LINE_NUMBERS_ABSOLUTE = 1 << 6;

        /// Show relative line numbers.
        const LINE_NUMBERS_RELATIVE = 1 << 7;

        /// Highlight the cursor line.
        const CURSOR_LINE           = 1 << 8;
    }
}

impl Default for UiOptions {
    fn default() -> Self {
        UiOptions::STATUSBAR
    }
}

/// The mode a key binding applies in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeymapMode {
    /// Normal mode.
    Normal,

    /// Operator pending mode.
    OperatorPending,

    /// Visual (and visual-line) mode.
    Visual,

    /// Insert mode.
    Insert,

    /// Replace mode.
    Replace,
}

/// Resolve a mode name as given to `map`/`unmap`.
pub fn keymap_mode_from(name: &str) -> Option<KeymapMode> {
    match name {
        "normal" => Some(KeymapMode::Normal),
        "operator-pending" => Some(KeymapMode::OperatorPending),
        "visual" | "visual-line" => Some(KeymapMode::Visual),
        "insert" => Some(KeymapMode::Insert),
        "replace" => Some(KeymapMode::Replace),
        _ => None,
    }
}

/// Alias bindings per mode, as managed by `map` and `unmap`.
#[derive(Clone, Debug, Default)]
pub struct Keymap {
    bindings: HashMap<KeymapMode, HashMap<String, String>>,
}

impl Keymap {
    /// Bind `lhs` to `rhs` in `mode`; an existing binding is only replaced
    /// with `force`.
    pub fn map(&mut self, mode: KeymapMode, force: bool, lhs: &str, rhs: &str) -> bool {
        let table = self.bindings.entry(mode).or_default();
        if table.contains_key(lhs) && !force {
            return false;
        }
        table.insert(lhs.to_string(), rhs.to_string());
        true
    }

    /// Remove the binding of `lhs` in `mode`.
    pub fn unmap(&mut self, mode: KeymapMode, lhs: &str) -> bool {
        self.bindings.get_mut(&mode).map_or(false, |t| t.remove(lhs).is_some())
    }

    /// Look up the binding of `lhs` in `mode`.
    pub fn get(&self, mode: KeymapMode, lhs: &str) -> Option<&str> {
        self.bindings.get(&mode)?.get(lhs).map(String::as_str)
    }
}

/// An open file: its text, marks, and per-invocation transcript.
pub struct File {
    /// The file's path, if it has one.
    pub name: Option<PathBuf>,

    /// The text contents.
    pub text: TextBuffer,

    /// Named positions, stored per selection ordinal.
    pub marks: MarkSet,

    /// Whether the file is internal (help output and the like); internal
    /// files are excluded from transcripts and `X`/`Y` iteration.
    pub internal: bool,

    /// How many windows view this file.
    pub refcount: usize,

    /// Save method used by `w`.
    pub save_method: SaveMethod,

    /// Identity of the backing file as of the last load/save.
    pub stat: Option<FileStat>,

    pub(crate) transcript: Transcript,
}

impl File {
    fn empty(name: Option<PathBuf>) -> Self {
        File {
            name,
            text: TextBuffer::new(""),
            marks: MarkSet::default(),
            internal: false,
            refcount: 1,
            save_method: SaveMethod::default(),
            stat: None,
            transcript: Transcript::default(),
        }
    }
}

/// A window: a view onto a file plus its display options.
pub struct Window {
    /// The viewed file.
    pub file: FileId,

    /// Selection state.
    pub view: View,

    /// Display option bitmask.
    pub options: UiOptions,

    /// Tab display width.
    pub tabwidth: i64,

    /// Whether typed tabs are expanded to spaces.
    pub expandtab: bool,

    /// Highlighted column, 0 for none.
    pub colorcolumn: i64,

    /// Wrap column, 0 for none.
    pub wrapcolumn: i64,

    /// Characters eligible for word wrapping.
    pub breakat: String,

    pub(crate) bindings: Keymap,
    order: usize,
}

type PreSaveHook = Box<dyn FnMut(&mut File, Option<&Path>) -> bool>;
type PostSaveHook = Box<dyn FnMut(&mut File, Option<&Path>)>;
type FilePicker = Box<dyn FnMut(&str) -> Option<String>>;

#[derive(Default)]
struct EventHooks {
    pre_save: Option<PreSaveHook>,
    post_save: Option<PostSaveHook>,
    file_picker: Option<FilePicker>,
}

/// The editor: all engine state, passed explicitly to handlers.
pub struct Editor {
    files: Vec<Option<File>>,
    windows: Vec<Option<Window>>,
    current: Option<WindowId>,

    /// Builtin and user commands.
    pub registry: CommandRegistry,

    /// Builtin and user options.
    pub options: OptionRegistry,

    /// Register storage.
    pub registers: RegisterStore,

    /// Global key bindings managed by `map`/`unmap`.
    pub keymap: Keymap,

    /// Shell used for pipe commands.
    pub shell: String,

    /// The current editor mode.
    pub mode: Mode,

    /// Copy leading whitespace from the previous line.
    pub autoindent: bool,

    /// Compile patterns case-insensitively.
    pub ignorecase: bool,

    /// How files are loaded.
    pub load_method: LoadMethod,

    /// Set by the host when the user interrupts a blocking pipe; handlers
    /// observe it after the pipe returns.
    pub interrupted: bool,

    /// The hosting UI.
    pub ui: Box<dyn Ui>,

    langmap: HashMap<String, String>,
    hooks: EventHooks,
    log: ErrorLog,
    last_regex: Option<Regex>,
    jumplist: Vec<(WindowId, usize)>,
    exit: Option<i32>,
    next_order: usize,
}

impl Editor {
    /// An editor with a capturing UI and no windows.
    pub fn new() -> Self {
        Editor::with_ui(Box::<CapturingUi>::default())
    }

    /// An editor hosted by the given UI.
    pub fn with_ui(ui: Box<dyn Ui>) -> Self {
        Editor {
            files: Vec::new(),
            windows: Vec::new(),
            current: None,
            registry: CommandRegistry::new(),
            options: OptionRegistry::new(),
            registers: RegisterStore::default(),
            keymap: Keymap::default(),
            shell: std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()),
            mode: Mode::Normal,
            autoindent: false,
            ignorecase: false,
            load_method: LoadMethod::default(),
            interrupted: false,
            ui,
            langmap: HashMap::new(),
            hooks: EventHooks::default(),
            log: ErrorLog::default(),
            last_regex: None,
            jumplist: Vec::new(),
            exit: None,
            next_order: 0,
        }
    }

    /// The diagnostics accumulated by parsers and the executor.
    pub fn log(&self) -> &ErrorLog {
        &self.log
    }

    /// Clear accumulated diagnostics.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Exit code requested by `q`/`qall` once no window remains.
    pub fn exit_status(&self) -> Option<i32> {
        self.exit
    }

    pub(crate) fn request_exit(&mut self, code: i32) {
        self.exit = Some(code);
    }

    /// Positions recorded in the jump list, oldest first.
    pub fn jumplist(&self) -> &[(WindowId, usize)] {
        &self.jumplist
    }

    /// Show a one-line message through the UI.
    pub fn info(&mut self, msg: &str) {
        self.ui.info_show(msg);
    }

    pub(crate) fn report(&mut self, sts: &TokenStream, at: usize, msg: &str) {
        self.log.report(sts, at, msg);
    }

    /// Compile a pattern with the editor's case settings. An empty pattern
    /// reuses the most recent regex.
    pub fn compile_regex(&mut self, pattern: &str) -> Option<Regex> {
        if pattern.is_empty() {
            return self.last_regex.clone();
        }
        match RegexBuilder::new(pattern)
            .multi_line(true)
            .case_insensitive(self.ignorecase)
            .build()
        {
            Ok(re) => {
                self.last_regex = Some(re.clone());
                Some(re)
            },
            Err(_) => None,
        }
    }

    /// Install the hook consulted before a file is written; returning
    /// false vetoes the write unless forced.
    pub fn set_pre_save_hook(&mut self, hook: PreSaveHook) {
        self.hooks.pre_save = Some(hook);
    }

    /// Install the hook notified after a successful write.
    pub fn set_post_save_hook(&mut self, hook: PostSaveHook) {
        self.hooks.post_save = Some(hook);
    }

    /// Install the hook that resolves file name arguments (a fuzzy picker,
    /// for instance) before windows are opened.
    pub fn set_file_picker(&mut self, picker: FilePicker) {
        self.hooks.file_picker = Some(picker);
    }

    /// Register a binding in the langmap table.
    pub fn langmap_add(&mut self, from: String, to: String) -> bool {
        self.langmap.insert(from, to);
        true
    }

    /// Look up a langmap binding.
    pub fn langmap_get(&self, from: &str) -> Option<&str> {
        self.langmap.get(from).map(String::as_str)
    }

    pub(crate) fn pick_file(&mut self, pattern: &str) -> Option<String> {
        match self.hooks.file_picker.take() {
            Some(mut picker) => {
                let result = picker(pattern);
                self.hooks.file_picker = Some(picker);
                result
            },
            None => Some(pattern.to_string()),
        }
    }

    pub(crate) fn emit_pre_save(&mut self, win: WindowId, path: Option<&Path>) -> bool {
        match self.hooks.pre_save.take() {
            Some(mut hook) => {
                let ok = hook(self.file_of_mut(win), path);
                self.hooks.pre_save = Some(hook);
                ok
            },
            None => true,
        }
    }

    pub(crate) fn emit_post_save(&mut self, win: WindowId, path: Option<&Path>) {
        if let Some(mut hook) = self.hooks.post_save.take() {
            hook(self.file_of_mut(win), path);
            self.hooks.post_save = Some(hook);
        }
    }

    // window and file management

    /// The focused window.
    pub fn current_window(&self) -> Option<WindowId> {
        self.current
    }

    /// Focus a window.
    pub fn focus(&mut self, win: WindowId) {
        if self.try_win(win).is_some() {
            self.current = Some(win);
        }
    }

    /// The window behind an id; panics on a closed window (see
    /// [try_win](Self::try_win)).
    pub fn win(&self, win: WindowId) -> &Window {
        match self.windows.get(win.0).and_then(Option::as_ref) {
            Some(w) => w,
            None => panic!("window {} is closed", win.0),
        }
    }

    /// Mutable access to a window.
    pub fn win_mut(&mut self, win: WindowId) -> &mut Window {
        match self.windows.get_mut(win.0).and_then(Option::as_mut) {
            Some(w) => w,
            None => panic!("window {} is closed", win.0),
        }
    }

    /// The window behind an id, if it is still open.
    pub fn try_win(&self, win: WindowId) -> Option<&Window> {
        self.windows.get(win.0).and_then(Option::as_ref)
    }

    /// Mutable access to a window, if it is still open.
    pub fn try_win_mut(&mut self, win: WindowId) -> Option<&mut Window> {
        self.windows.get_mut(win.0).and_then(Option::as_mut)
    }

    /// The file viewed by a window.
    pub fn file_of(&self, win: WindowId) -> &File {
        let fid = self.win(win).file;
        match self.files.get(fid.0).and_then(Option::as_ref) {
            Some(f) => f,
            None => panic!("file {} is closed", fid.0),
        }
    }

    /// Mutable access to the file viewed by a window.
    pub fn file_of_mut(&mut self, win: WindowId) -> &mut File {
        let fid = self.win(win).file;
        match self.files.get_mut(fid.0).and_then(Option::as_mut) {
            Some(f) => f,
            None => panic!("file {} is closed", fid.0),
        }
    }

    /// Ids of all open windows, in layout order.
    pub fn window_ids(&self) -> Vec<WindowId> {
        let mut ids: Vec<WindowId> = self
            .windows
            .iter()
            .enumerate()
            .filter_map(|(i, w)| w.as_ref().map(|_| WindowId(i)))
            .collect();
        ids.sort_by_key(|id| self.win(*id).order);
        ids
    }

    /// Whether any non-internal window remains open.
    pub fn has_windows(&self) -> bool {
        self.window_ids().iter().any(|w| !self.file_of(*w).internal)
    }

    fn add_file(&mut self, file: File) -> FileId {
        for (i, slot) in self.files.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(file);
                return FileId(i);
            }
        }
        self.files.push(Some(file));
        FileId(self.files.len() - 1)
    }

    fn add_window(&mut self, file: FileId) -> WindowId {
        let order = self.next_order;
        self.next_order += 1;
        let window = Window {
            file,
            view: View::new(0),
            options: UiOptions::default(),
            tabwidth: 8,
            expandtab: false,
            colorcolumn: 0,
            wrapcolumn: 0,
            breakat: " \t".to_string(),
            bindings: Keymap::default(),
            order,
        };
        for (i, slot) in self.windows.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(window);
                return WindowId(i);
            }
        }
        self.windows.push(Some(window));
        WindowId(self.windows.len() - 1)
    }

    /// Open a window onto an in-memory buffer, mainly for embedding and
    /// tests.
    pub fn open_scratch(&mut self, name: &str, content: &str) -> WindowId {
        let mut file = File::empty(Some(PathBuf::from(name)));
        file.text = TextBuffer::new(content);
        let fid = self.add_file(file);
        let win = self.add_window(fid);
        self.current = Some(win);
        win
    }

    /// Open a window onto `path` (or an unnamed buffer), focusing it. An
    /// already-open path is shared rather than re-read.
    pub fn window_new(&mut self, path: Option<&Path>) -> Option<WindowId> {
        let fid = match path {
            None => self.add_file(File::empty(None)),
            Some(p) => {
                let existing = self.files.iter().enumerate().find_map(|(i, f)| {
                    f.as_ref()
                        .filter(|f| f.name.as_deref() == Some(p))
                        .map(|_| FileId(i))
                });
                match existing {
                    Some(fid) => {
                        if let Some(file) = self.files[fid.0].as_mut() {
                            file.refcount += 1;
                        }
                        fid
                    },
                    None => {
                        let mut file = File::empty(Some(p.to_path_buf()));
                        if p.exists() {
                            match TextBuffer::load(p) {
                                Ok(text) => file.text = text,
                                Err(err) => {
                                    self.info(&format!("Could not read `{}': {err}", p.display()));
                                    return None;
                                },
                            }
                            file.stat = FileStat::of(p);
                        }
                        self.add_file(file)
                    },
                }
            },
        };
        let win = self.add_window(fid);
        self.current = Some(win);
        Some(win)
    }

    /// Open another window onto the same file.
    pub fn window_split(&mut self, win: WindowId) -> Option<WindowId> {
        let fid = self.try_win(win)?.file;
        if let Some(file) = self.files.get_mut(fid.0).and_then(Option::as_mut) {
            file.refcount += 1;
        }
        let opts = self.win(win).options;
        let new = self.add_window(fid);
        self.win_mut(new).options = opts;
        self.current = Some(new);
        Some(new)
    }

    /// Close a window, dropping its file when no other window views it.
    pub fn window_close(&mut self, win: WindowId) {
        let fid = match self.try_win(win) {
            Some(w) => w.file,
            None => return,
        };
        self.windows[win.0] = None;

        let drop_file = match self.files.get_mut(fid.0).and_then(Option::as_mut) {
            Some(file) => {
                file.refcount = file.refcount.saturating_sub(1);
                file.refcount == 0
            },
            None => false,
        };
        if drop_file {
            self.files[fid.0] = None;
        }

        if self.current == Some(win) {
            self.current = self.window_ids().first().copied();
        }
    }

    /// Re-read a window's file from disk.
    pub fn window_reload(&mut self, win: WindowId) -> bool {
        let path = match self.file_of(win).name.clone() {
            Some(p) => p,
            None => return false,
        };
        match TextBuffer::load(&path) {
            Ok(text) => {
                let stat = FileStat::of(&path);
                let file = self.file_of_mut(win);
                file.text = text;
                file.stat = stat;
                true
            },
            Err(err) => {
                self.info(&format!("Could not read `{}': {err}", path.display()));
                false
            },
        }
    }

    /// Exchange the layout positions of two windows.
    pub fn window_swap(&mut self, a: WindowId, b: WindowId) {
        if a == b || self.try_win(a).is_none() || self.try_win(b).is_none() {
            return;
        }
        let oa = self.win(a).order;
        let ob = self.win(b).order;
        self.win_mut(a).order = ob;
        self.win_mut(b).order = oa;
    }

    /// Whether a window may close without losing unsaved changes.
    pub fn window_closable(&self, win: WindowId) -> bool {
        let file = self.file_of(win);
        file.refcount > 1 || !file.text.modified()
    }

    // the engine entry point

    /// Execute one sam command line against the editor.
    ///
    /// Returns the first error recorded by a file transcript (or the
    /// validation error for a malformed line); detailed diagnostics are in
    /// [log](Self::log).
    pub fn sam_cmd(&mut self, line: &str) -> Result<(), SamError> {
        let mut sts = TokenStream::lex(line);
        if !sts.validate() {
            if sts.tokens().is_empty() {
                return Ok(());
            }
            return Err(SamError::UnmatchedBrace);
        }

        for file in self.files.iter_mut().flatten() {
            if !file.internal {
                file.transcript = Transcript::default();
            }
        }

        let visual = self.mode.is_visual();
        let primary = self.current.map(|w| {
            let view = &self.win(w).view;
            (w, view.primary_pos())
        });

        let completed_line = exec::execute_stream(self, &mut sts);
        if !completed_line {
            // aborted executions discard what the current file had queued
            if let Some(w) = self.current {
                self.file_of_mut(w).transcript.error_if_changing(SamError::Execute);
            }
        }

        let err = self.apply_transcripts(visual);

        for win in self.windows.iter_mut().flatten() {
            win.view.normalize();
        }

        if let Some(w) = self.current {
            // put the primary cursor back where it started if every
            // selection was disposed along the way
            if let Some((pw, Some(pos))) = primary {
                if pw == w && self.win_mut(w).view.take_fabricated() {
                    let cur = self.win(w).view.primary_id();
                    let clamped = pos.min(self.file_of(w).text.size());
                    self.win_mut(w).view.cursors_to(cur, clamped);
                }
            }
            if let Some(first) = self.win(w).view.alive_ids().first().copied() {
                self.win_mut(w).view.set_primary(first);
            }
            if let Some(pos) = self.win(w).view.primary_pos() {
                self.jumplist.push((w, pos));
            }
            let completed = !self.win(w).view.any_anchored();
            self.mode = if completed { Mode::Normal } else { Mode::Visual };
        }

        err
    }

    fn apply_transcripts(&mut self, visual: bool) -> Result<(), SamError> {
        let mut err = Ok(());

        for fid in 0..self.files.len() {
            let changes = match self.files[fid].as_mut() {
                Some(file) if !file.internal => {
                    if let Some(e) = file.transcript.error() {
                        err = Err(e);
                        file.transcript.take();
                        continue;
                    }
                    file.transcript.take()
                },
                _ => continue,
            };
            if changes.is_empty() {
                continue;
            }

            if let Some(file) = self.files[fid].as_mut() {
                file.text.snapshot();
            }

            let mut delta: i64 = 0;
            for c in changes {
                let start = (c.range.start as i64 + delta).max(0) as usize;
                let end = (c.range.end as i64 + delta).max(0) as usize;
                let range = FileRange { start, end };

                if c.kind.has_delete() {
                    if let Some(file) = self.files[fid].as_mut() {
                        file.text.delete_range(range);
                    }
                    delta -= range.size() as i64;
                    if c.kind == ChangeKind::Delete {
                        if let Some(sel) = c.sel {
                            if let Some(win) = self.windows.get_mut(c.win.0).and_then(Option::as_mut) {
                                if visual {
                                    win.view.dispose(sel);
                                } else {
                                    win.view.cursors_to(sel, range.start);
                                }
                            }
                        }
                    }
                }

                if c.kind.has_insert() {
                    if let Some(file) = self.files[fid].as_mut() {
                        for _ in 0..c.count {
                            file.text.insert(range.start, &c.data);
                            delta += c.data.len() as i64;
                        }
                    }
                    let inserted = FileRange {
                        start: range.start,
                        end: range.start + c.data.len() * c.count,
                    };
                    if let Some(win) = self.windows.get_mut(c.win.0).and_then(Option::as_mut) {
                        if let Some(sel) = c.sel {
                            if visual {
                                win.view.set_range(sel, inserted, true);
                            } else if c.data.contains('\n') {
                                win.view.cursors_to(sel, inserted.start);
                            } else {
                                win.view.cursors_to(sel, inserted.end);
                            }
                        } else if visual {
                            let id = win.view.new_selection(inserted.start);
                            win.view.set_range(id, inserted, true);
                        }
                    }
                }
            }

            if let Some(file) = self.files[fid].as_mut() {
                file.text.snapshot();
            }
        }

        err
    }
}

impl Default for Editor {
    fn default() -> Self {
        Editor::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{UserCall, UserCommandFn};
    use crate::editing::FileRange;
    use std::rc::Rc;

    fn fixture() -> (Editor, WindowId) {
        let mut ed = Editor::new();
        let win = ed.open_scratch("alpha.txt", "alpha\nbeta\ngamma\n");
        (ed, win)
    }

    fn content(ed: &Editor, win: WindowId) -> String {
        ed.file_of(win).text.content()
    }

    #[test]
    fn test_line_pair_delete() {
        let (mut ed, win) = fixture();

        assert_eq!(ed.sam_cmd("1,2d"), Ok(()));
        assert_eq!(content(&ed, win), "gamma\n");
        assert_eq!(ed.win(win).view.primary_pos(), Some(0));
        assert_eq!(ed.mode, Mode::Normal);
    }

    #[test]
    fn test_extract_change_every_match() {
        let (mut ed, win) = fixture();

        assert_eq!(ed.sam_cmd(",x/a/ c/A/"), Ok(()));
        assert_eq!(content(&ed, win), "AlphA\nbetA\ngAmmA\n");
        assert_eq!(ed.mode, Mode::Normal);
    }

    #[test]
    fn test_regex_address_print() {
        let (mut ed, win) = fixture();

        assert_eq!(ed.sam_cmd("/beta/ p"), Ok(()));
        assert_eq!(ed.mode, Mode::Visual);

        let view = &ed.win(win).view;
        let sel: Vec<_> = view.alive().collect();
        assert_eq!(sel.len(), 1);
        assert_eq!(sel[0].range(), FileRange { start: 6, end: 10 });
        assert!(sel[0].anchored);
    }

    #[test]
    fn test_group_conflict_leaves_file_untouched() {
        let (mut ed, win) = fixture();

        assert_eq!(ed.sam_cmd("#0,#5 { a/X/ d }"), Err(SamError::Conflict));
        assert_eq!(content(&ed, win), "alpha\nbeta\ngamma\n");
        assert!(!ed.file_of(win).text.modified());
    }

    #[test]
    fn test_write_clears_modified() {
        let (mut ed, win) = fixture();
        let path = std::env::temp_dir().join(format!("samedit-w-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);

        assert_eq!(ed.sam_cmd(",c/changed\n/"), Ok(()));
        assert!(ed.file_of(win).text.modified());

        assert_eq!(ed.sam_cmd(&format!("w {}", path.display())), Ok(()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "changed\n");
        assert!(!ed.file_of(win).text.modified());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_pipe_out_leaves_buffer_alone() {
        let (mut ed, win) = fixture();

        assert_eq!(ed.sam_cmd("x/beta/ > wc -l"), Ok(()));
        assert_eq!(content(&ed, win), "alpha\nbeta\ngamma\n");
        assert_eq!(ed.exit_status(), None);
    }

    #[test]
    fn test_extract_default_selects_matches() {
        let (mut ed, win) = fixture();

        assert_eq!(ed.sam_cmd(",x/beta/"), Ok(()));
        assert_eq!(ed.mode, Mode::Visual);
        let ranges: Vec<FileRange> = ed.win(win).view.alive().map(|s| s.range()).collect();
        assert_eq!(ranges, vec![FileRange { start: 6, end: 10 }]);
    }

    #[test]
    fn test_extract_complement_counts() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "aba");
        assert_eq!(ed.sam_cmd(",x/a/"), Ok(()));
        assert_eq!(ed.win(win).view.count(), 2);

        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "aba");
        assert_eq!(ed.sam_cmd(",y/a/"), Ok(()));
        let ranges: Vec<FileRange> = ed.win(win).view.alive().map(|s| s.range()).collect();
        assert_eq!(ranges, vec![
            FileRange { start: 0, end: 0 },
            FileRange { start: 1, end: 2 },
            FileRange { start: 3, end: 3 },
        ]);
    }

    #[test]
    fn test_guard_count_interval() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "a a a");

        assert_eq!(ed.sam_cmd(",x/a/ g2 c/X/"), Ok(()));
        assert_eq!(content(&ed, win), "a X a");
    }

    #[test]
    fn test_guard_count_negative_resolves_to_last() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "a a a");

        assert_eq!(ed.sam_cmd(",x/a/ g-1 c/X/"), Ok(()));
        assert_eq!(content(&ed, win), "a a X");
    }

    #[test]
    fn test_guard_modulo() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "a a a a");

        assert_eq!(ed.sam_cmd(",x/a/ g%2 c/X/"), Ok(()));
        assert_eq!(content(&ed, win), "a X a X");
    }

    #[test]
    fn test_guard_pattern_filters() {
        let (mut ed, win) = fixture();

        // change only the line containing "et"
        assert_eq!(ed.sam_cmd(",x/.*\\n/ g/et/ c/HIT\\n/"), Ok(()));
        assert_eq!(content(&ed, win), "alpha\nHIT\ngamma\n");
    }

    #[test]
    fn test_guard_complement() {
        let (mut ed, win) = fixture();

        assert_eq!(ed.sam_cmd(",x/.*\\n/ v/et/ c/MISS\\n/"), Ok(()));
        assert_eq!(content(&ed, win), "MISS\nbeta\nMISS\n");
    }

    #[test]
    fn test_capture_registers_in_replacement() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "one two\n");

        assert_eq!(ed.sam_cmd(",x/(o[a-z]+) (t[a-z]+)/ c/\\2 \\1/"), Ok(()));
        assert_eq!(content(&ed, win), "two one\n");
    }

    #[test]
    fn test_ampersand_reads_whole_match() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "ab\n");

        assert_eq!(ed.sam_cmd(",x/ab/ c/<&>/"), Ok(()));
        assert_eq!(content(&ed, win), "<ab>\n");
    }

    #[test]
    fn test_per_line_extract_without_pattern() {
        let (mut ed, win) = fixture();

        assert_eq!(ed.sam_cmd(",x i/> /"), Ok(()));
        assert_eq!(content(&ed, win), "> alpha\n> beta\n> gamma\n");
    }

    #[test]
    fn test_write_conflict_while_changing() {
        let (mut ed, win) = fixture();
        let path = std::env::temp_dir().join(format!("samedit-wc-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let line = format!("#0,#5 {{ d w {} }}", path.display());
        assert_eq!(ed.sam_cmd(&line), Err(SamError::WriteConflict));
        assert_eq!(content(&ed, win), "alpha\nbeta\ngamma\n");
        assert!(!path.exists());
    }

    #[test]
    fn test_destructive_after_loop_rejected() {
        let (mut ed, win) = fixture();

        // the whole line is abandoned: q does not run, and the loop's
        // queued changes are discarded
        assert_eq!(ed.sam_cmd(",x/a/ c/A/ q"), Err(SamError::Execute));
        assert!(ed.try_win(win).is_some());
        assert_eq!(content(&ed, win), "alpha\nbeta\ngamma\n");
        assert!(ed.log().contents().contains("Destructive command in looping construct"));
    }

    #[test]
    fn test_destructive_inside_group_rejected() {
        let (mut ed, _win) = fixture();

        ed.sam_cmd("{ q }").unwrap();
        assert!(ed.log().contents().contains("Destructive command in group"));
    }

    #[test]
    fn test_unknown_command_reports_caret() {
        let (mut ed, win) = fixture();

        assert_eq!(ed.sam_cmd("zzz"), Ok(()));
        assert_eq!(content(&ed, win), "alpha\nbeta\ngamma\n");
        assert!(ed.log().contents().contains("Unknown command"));
    }

    #[test]
    fn test_unbalanced_group_is_rejected() {
        let (mut ed, _) = fixture();
        assert_eq!(ed.sam_cmd("{ d"), Err(SamError::UnmatchedBrace));
    }

    #[test]
    fn test_empty_line_is_a_no_op() {
        let (mut ed, win) = fixture();
        assert_eq!(ed.sam_cmd(""), Ok(()));
        assert_eq!(ed.sam_cmd("   "), Ok(()));
        assert_eq!(content(&ed, win), "alpha\nbeta\ngamma\n");
    }

    #[test]
    fn test_insert_append_with_count() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "x");

        assert_eq!(ed.sam_cmd("#0,#1 a 3/!/"), Ok(()));
        assert_eq!(content(&ed, win), "x!!!");
    }

    #[test]
    fn test_filter_replaces_range() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "b\na\n");

        assert_eq!(ed.sam_cmd(", | sort"), Ok(()));
        assert_eq!(content(&ed, win), "a\nb\n");
    }

    #[test]
    fn test_pipe_in_replaces_with_stdout() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "old\n");

        assert_eq!(ed.sam_cmd(", < echo new"), Ok(()));
        assert_eq!(content(&ed, win), "new\n");
    }

    #[test]
    fn test_shell_register_reused() {
        let mut ed = Editor::new();
        let _win = ed.open_scratch("t", "one\ntwo\n");

        assert_eq!(ed.sam_cmd("1 > wc -l"), Ok(()));
        assert_eq!(
            ed.registers.get(crate::editing::registers::Register::Shell),
            Some("wc -l")
        );
        // a bare > reuses the stored command
        assert_eq!(ed.sam_cmd("1 >"), Ok(()));
    }

    #[test]
    fn test_read_inserts_file_after_range() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "first\nlast\n");
        let path = std::env::temp_dir().join(format!("samedit-r-{}", std::process::id()));
        std::fs::write(&path, "middle\n").unwrap();

        assert_eq!(ed.sam_cmd(&format!("1r {}", path.display())), Ok(()));
        assert_eq!(content(&ed, win), "first\nmiddle\nlast\n");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_quit_carries_exit_code() {
        let (mut ed, win) = fixture();

        assert_eq!(ed.sam_cmd("q"), Ok(()));
        assert!(ed.try_win(win).is_none());
        assert_eq!(ed.exit_status(), Some(0));
    }

    #[test]
    fn test_quit_refuses_unsaved() {
        let (mut ed, win) = fixture();
        ed.sam_cmd(",c/dirty\n/").unwrap();

        ed.sam_cmd("q").unwrap();
        assert!(ed.try_win(win).is_some());

        ed.sam_cmd("q!").unwrap();
        assert!(ed.try_win(win).is_none());
    }

    #[test]
    fn test_edit_swaps_window() {
        let (mut ed, oldwin) = fixture();
        let path = std::env::temp_dir().join(format!("samedit-e-{}", std::process::id()));
        std::fs::write(&path, "fresh\n").unwrap();

        assert_eq!(ed.sam_cmd(&format!("e {}", path.display())), Ok(()));
        assert!(ed.try_win(oldwin).is_none());
        let cur = ed.current_window().unwrap();
        assert_eq!(content(&ed, cur), "fresh\n");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_files_iteration_matches_names() {
        let mut ed = Editor::new();
        let a = ed.open_scratch("notes.txt", "na\n");
        let b = ed.open_scratch("code.rs", "ca\n");
        ed.focus(b);

        assert_eq!(ed.sam_cmd("X/txt/ x c/X\\n/"), Ok(()));
        assert_eq!(content(&ed, a), "X\n");
        assert_eq!(content(&ed, b), "ca\n");
    }

    #[test]
    fn test_files_iteration_complement() {
        let mut ed = Editor::new();
        let a = ed.open_scratch("notes.txt", "na\n");
        let b = ed.open_scratch("code.rs", "ca\n");
        ed.focus(b);

        assert_eq!(ed.sam_cmd("Y/txt/ x c/Y\\n/"), Ok(()));
        assert_eq!(content(&ed, a), "na\n");
        assert_eq!(content(&ed, b), "Y\n");
    }

    #[test]
    fn test_set_number_option() {
        let (mut ed, win) = fixture();

        assert_eq!(ed.sam_cmd("set tabwidth 4"), Ok(()));
        assert_eq!(ed.win(win).tabwidth, 4);

        // abbreviated name
        assert_eq!(ed.sam_cmd("set tw 2"), Ok(()));
        assert_eq!(ed.win(win).tabwidth, 2);
    }

    #[test]
    fn test_set_bool_toggles_both_spellings() {
        let (mut ed, win) = fixture();

        ed.sam_cmd("set numbers").unwrap();
        assert!(ed.win(win).options.contains(UiOptions::LINE_NUMBERS_ABSOLUTE));

        ed.sam_cmd("set numbers!").unwrap();
        assert!(!ed.win(win).options.contains(UiOptions::LINE_NUMBERS_ABSOLUTE));

        ed.sam_cmd("set !numbers").unwrap();
        assert!(ed.win(win).options.contains(UiOptions::LINE_NUMBERS_ABSOLUTE));
    }

    #[test]
    fn test_set_string_option() {
        let (mut ed, _win) = fixture();

        ed.sam_cmd("set shell /bin/dash").unwrap();
        assert_eq!(ed.shell, "/bin/dash");

        ed.sam_cmd("set savemethod inplace").unwrap();
        assert_eq!(ed.file_of(ed.current_window().unwrap()).save_method, SaveMethod::Inplace);
    }

    #[test]
    fn test_map_and_unmap() {
        let (mut ed, _win) = fixture();

        ed.sam_cmd("map normal gd :goto-def").unwrap();
        assert_eq!(ed.keymap.get(KeymapMode::Normal, "gd"), Some(":goto-def"));

        // remapping requires force
        ed.sam_cmd("map normal gd :other").unwrap();
        assert_eq!(ed.keymap.get(KeymapMode::Normal, "gd"), Some(":goto-def"));
        ed.sam_cmd("map! normal gd :other").unwrap();
        assert_eq!(ed.keymap.get(KeymapMode::Normal, "gd"), Some(":other"));

        ed.sam_cmd("unmap normal gd").unwrap();
        assert_eq!(ed.keymap.get(KeymapMode::Normal, "gd"), None);
    }

    #[test]
    fn test_user_command_receives_argv() {
        use std::cell::RefCell;

        let (mut ed, _win) = fixture();
        let seen: Rc<RefCell<Vec<String>>> = Rc::default();
        let inner = seen.clone();
        let func: UserCommandFn = Rc::new(move |_ed, _win, call: &UserCall<'_>| {
            inner.borrow_mut().extend(call.argv.iter().cloned());
            true
        });
        assert!(ed.registry.register_user("frob", Some("Frobnicate"), func));

        ed.sam_cmd("frob one 'two three'").unwrap();
        assert_eq!(&*seen.borrow(), &["one".to_string(), "two three".to_string()]);
    }

    #[test]
    fn test_earlier_later_walk_history() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "one");

        ed.sam_cmd(",c/two/").unwrap();
        assert_eq!(content(&ed, win), "two");

        ed.sam_cmd("earlier").unwrap();
        assert_eq!(content(&ed, win), "one");

        ed.sam_cmd("later").unwrap();
        assert_eq!(content(&ed, win), "two");
    }

    #[test]
    fn test_visual_mode_selections_drive_commands() {
        let (mut ed, win) = fixture();

        // select "beta" then change the selection
        ed.sam_cmd("/beta/ p").unwrap();
        assert_eq!(ed.mode, Mode::Visual);

        ed.sam_cmd("c/BETA/").unwrap();
        assert_eq!(content(&ed, win), "alpha\nBETA\ngamma\n");
        // the changed selection is re-anchored over the insertion
        assert_eq!(ed.mode, Mode::Visual);
        let ranges: Vec<FileRange> = ed.win(win).view.alive().map(|s| s.range()).collect();
        assert_eq!(ranges, vec![FileRange { start: 6, end: 10 }]);
    }

    #[test]
    fn test_multi_cursor_fan_out() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "abc");
        ed.win_mut(win).view.new_selection(2);

        // without an address each cursor observes one character
        assert_eq!(ed.sam_cmd("c/X/"), Ok(()));
        assert_eq!(content(&ed, win), "XbX");
        assert_eq!(ed.win(win).view.count(), 2);
    }

    #[test]
    fn test_help_opens_saved_window() {
        let (mut ed, _win) = fixture();

        ed.sam_cmd("help").unwrap();
        let cur = ed.current_window().unwrap();
        let text = content(&ed, cur);
        assert!(text.contains(":-Commands"));
        assert!(text.contains("tabwidth"));
        assert!(!ed.file_of(cur).text.modified());
    }

    #[test]
    fn test_interrupted_pipe_abandons_change() {
        let mut ed = Editor::new();
        let win = ed.open_scratch("t", "data\n");
        ed.interrupted = true;

        assert_eq!(ed.sam_cmd(", | cat"), Ok(()));
        assert_eq!(content(&ed, win), "data\n");
    }

    #[test]
    fn test_user_option_dispatch() {
        use crate::options::{OptionFlags, OptionValue, UserOptionFn};
        use std::cell::RefCell;

        let (mut ed, _win) = fixture();
        let seen: Rc<RefCell<Option<(bool, OptionValue)>>> = Rc::default();
        let inner = seen.clone();
        let handler: UserOptionFn = Rc::new(move |_ed, _win, toggle, _name, value| {
            *inner.borrow_mut() = Some((toggle, value.clone()));
            true
        });
        assert!(ed.options.register_user(
            &["gadget", "gd"],
            OptionFlags::TYPE_BOOL,
            "Enable the gadget",
            handler
        ));

        ed.sam_cmd("set gadget on").unwrap();
        assert_eq!(&*seen.borrow(), &Some((false, OptionValue::Bool(true))));

        ed.sam_cmd("set gadget!").unwrap();
        assert_eq!(&*seen.borrow(), &Some((true, OptionValue::Bool(false))));
    }

    #[test]
    fn test_mark_address_delete() {
        use crate::editing::marks::mark_from_char;

        let (mut ed, win) = fixture();
        let m = mark_from_char('m').unwrap();
        ed.file_of_mut(win).marks.set(m, 0, 6);

        // from the mark to the end of beta's line
        assert_eq!(ed.sam_cmd("'m,2d"), Ok(()));
        assert_eq!(content(&ed, win), "alpha\ngamma\n");
    }
}
