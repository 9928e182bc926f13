//! # Byte-indexed text buffer
//!
//! ## Overview
//!
//! [TextBuffer] wraps a [ropey::Rope] behind a byte-indexed API, the shape
//! the command engine works in: addresses, changes and selections are all
//! byte ranges. It also carries the snapshot history used by the transcript
//! applier and by `earlier`/`later`, and the begin/write/commit/cancel save
//! protocol used by `w`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::Regex;
use ropey::Rope;

use super::FileRange;

/// How a buffer is written back to disk.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SaveMethod {
    /// Pick a method based on the target (currently the same as atomic).
    #[default]
    Auto,

    /// Write to a temporary file and rename it over the target.
    Atomic,

    /// Write directly into the target file.
    Inplace,
}

/// How files are read into a buffer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LoadMethod {
    /// Pick a method based on the file.
    #[default]
    Auto,

    /// Plain read(2)-style loading.
    Read,

    /// Memory-mapped loading.
    Mmap,
}

/// Identity and freshness of the on-disk file backing a buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FileStat {
    /// Device number of the file.
    pub dev: u64,

    /// Inode number of the file.
    pub ino: u64,

    /// Last modification time.
    pub mtime: Option<SystemTime>,
}

impl FileStat {
    /// Stat a path, if it exists.
    pub fn of(path: &Path) -> Option<FileStat> {
        let meta = fs::metadata(path).ok()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Some(FileStat {
                dev: meta.dev(),
                ino: meta.ino(),
                mtime: meta.modified().ok(),
            })
        }
        #[cfg(not(unix))]
        {
            Some(FileStat { dev: 0, ino: 0, mtime: meta.modified().ok() })
        }
    }
}

struct Snapshot {
    rope: Rope,
    time: SystemTime,
}

/// A rope-backed text buffer with byte addressing and snapshot history.
pub struct TextBuffer {
    rope: Rope,
    history: Vec<Snapshot>,
    state: usize,
    revision: u64,
    saved_revision: u64,
}

impl TextBuffer {
    /// Create a buffer holding `content`.
    pub fn new(content: &str) -> Self {
        let rope = Rope::from_str(content);
        TextBuffer {
            history: vec![Snapshot { rope: rope.clone(), time: SystemTime::now() }],
            rope,
            state: 0,
            revision: 0,
            saved_revision: 0,
        }
    }

    /// Load a buffer from a file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(TextBuffer::new(&content))
    }

    /// Size of the text in bytes.
    pub fn size(&self) -> usize {
        self.rope.len_bytes()
    }

    /// The byte at `pos`, if in bounds.
    pub fn byte_at(&self, pos: usize) -> Option<u8> {
        if pos < self.size() {
            Some(self.rope.byte(pos))
        } else {
            None
        }
    }

    /// The whole text as a string.
    pub fn content(&self) -> String {
        self.rope.to_string()
    }

    /// The text covered by `range`.
    pub fn content_range(&self, range: FileRange) -> String {
        let start = self.floor_char(range.start.min(self.size()));
        let end = self.floor_char(range.end.min(self.size()));
        self.rope.byte_slice(start..end.max(start)).to_string()
    }

    fn floor_char(&self, pos: usize) -> usize {
        self.rope.char_to_byte(self.rope.byte_to_char(pos))
    }

    /// Byte position of the start of 1-based line `lineno`. Positions past
    /// the last line clamp to the end of the text.
    pub fn line_start(&self, lineno: usize) -> usize {
        if lineno == 0 {
            return 0;
        }
        let idx = lineno - 1;
        if idx >= self.rope.len_lines() {
            self.size()
        } else {
            self.rope.line_to_byte(idx)
        }
    }

    /// 1-based line number containing byte `pos`.
    pub fn lineno_at(&self, pos: usize) -> usize {
        self.rope.byte_to_line(pos.min(self.size())) + 1
    }

    /// Start of the line after the one containing `pos` (the end of the
    /// text when there is none).
    pub fn line_next(&self, pos: usize) -> usize {
        let line = self.rope.byte_to_line(pos.min(self.size()));
        if line + 1 >= self.rope.len_lines() {
            self.size()
        } else {
            self.rope.line_to_byte(line + 1)
        }
    }

    /// The full range of the line containing `pos`.
    pub fn line_range(&self, pos: usize) -> FileRange {
        let line = self.rope.byte_to_line(pos.min(self.size()));
        FileRange {
            start: self.rope.line_to_byte(line),
            end: self.line_next(pos),
        }
    }

    /// Byte position one character past `pos`.
    pub fn char_next(&self, pos: usize) -> usize {
        if pos >= self.size() {
            return self.size();
        }
        let c = self.rope.byte_to_char(pos);
        if c + 1 >= self.rope.len_chars() {
            self.size()
        } else {
            self.rope.char_to_byte(c + 1)
        }
    }

    /// Insert `data` at byte `pos`.
    pub fn insert(&mut self, pos: usize, data: &str) {
        let c = self.rope.byte_to_char(pos.min(self.size()));
        self.rope.insert(c, data);
        self.revision += 1;
    }

    /// Remove the bytes covered by `range`.
    pub fn delete_range(&mut self, range: FileRange) {
        let a = self.rope.byte_to_char(range.start.min(self.size()));
        let b = self.rope.byte_to_char(range.end.min(self.size()));
        self.rope.remove(a..b);
        self.revision += 1;
    }

    /// First match of `re` at or after `from`, bounded by the end of text.
    pub fn search_forward(&self, re: &Regex, from: usize) -> Option<FileRange> {
        let text = self.content();
        let from = self.floor_char(from.min(text.len()));
        let m = re.find_at(&text, from)?;
        Some(FileRange { start: m.start(), end: m.end() })
    }

    /// Capture spans of the first match of `re` at or after `from`,
    /// bounded so the match cannot extend past `to`.
    pub fn captures_in(
        &self,
        re: &Regex,
        from: usize,
        to: usize,
    ) -> Option<Vec<Option<(usize, usize)>>> {
        let text = self.content();
        let to = self.floor_char(to.min(text.len()));
        let from = self.floor_char(from.min(to));
        let mut locs = re.capture_locations();
        re.captures_read_at(&mut locs, &text[..to], from)?;
        Some((0..locs.len()).map(|i| locs.get(i)).collect())
    }

    /// Last match of `re` ending at or before `to`.
    pub fn search_backward(&self, re: &Regex, to: usize) -> Option<FileRange> {
        let text = self.content();
        let to = self.floor_char(to.min(text.len()));
        let m = re.find_iter(&text[..to]).last()?;
        Some(FileRange { start: m.start(), end: m.end() })
    }

    /// Whether the buffer differs from its last saved state.
    pub fn modified(&self) -> bool {
        self.revision != self.saved_revision
    }

    /// Mark the current contents as saved.
    pub fn set_saved(&mut self) {
        self.saved_revision = self.revision;
    }

    /// Record the current contents in the snapshot history.
    pub fn snapshot(&mut self) {
        if let Some(last) = self.history.get(self.state) {
            if last.rope == self.rope {
                return;
            }
        }
        self.history.truncate(self.state + 1);
        self.history.push(Snapshot { rope: self.rope.clone(), time: SystemTime::now() });
        self.state = self.history.len() - 1;
    }

    /// Timestamp of the current snapshot state.
    pub fn state_time(&self) -> SystemTime {
        self.history[self.state].time
    }

    /// Step back one snapshot. Returns the restored cursor anchor.
    pub fn earlier(&mut self) -> Option<usize> {
        if self.state == 0 {
            return None;
        }
        self.state -= 1;
        self.rope = self.history[self.state].rope.clone();
        self.revision += 1;
        Some(0)
    }

    /// Step forward one snapshot. Returns the restored cursor anchor.
    pub fn later(&mut self) -> Option<usize> {
        if self.state + 1 >= self.history.len() {
            return None;
        }
        self.state += 1;
        self.rope = self.history[self.state].rope.clone();
        self.revision += 1;
        Some(0)
    }

    /// Restore the snapshot whose timestamp is closest to `target`.
    pub fn restore(&mut self, target: SystemTime) -> Option<usize> {
        let mut best = self.state;
        let mut best_diff = None;
        for (i, snap) in self.history.iter().enumerate() {
            let diff = match snap.time.duration_since(target) {
                Ok(d) => d,
                Err(e) => e.duration(),
            };
            if best_diff.map_or(true, |b| diff < b) {
                best_diff = Some(diff);
                best = i;
            }
        }
        self.state = best;
        self.rope = self.history[self.state].rope.clone();
        self.revision += 1;
        Some(0)
    }
}

/// An in-progress save of buffer content to a path.
pub struct TextSave {
    out: fs::File,
    tmp: Option<PathBuf>,
    path: PathBuf,
    written: usize,
}

impl TextSave {
    /// Open a save session for `path` with the given method.
    pub fn begin(path: &Path, method: SaveMethod) -> io::Result<TextSave> {
        match method {
            SaveMethod::Inplace => {
                let out = fs::File::create(path)?;
                Ok(TextSave { out, tmp: None, path: path.to_path_buf(), written: 0 })
            },
            SaveMethod::Auto | SaveMethod::Atomic => {
                let mut tmp = path.as_os_str().to_os_string();
                tmp.push(".sam-tmp");
                let tmp = PathBuf::from(tmp);
                let out = fs::File::create(&tmp)?;
                Ok(TextSave {
                    out,
                    tmp: Some(tmp),
                    path: path.to_path_buf(),
                    written: 0,
                })
            },
        }
    }

    /// Append the bytes of `range` to the save target. Returns the number
    /// of bytes written.
    pub fn write_range(&mut self, text: &TextBuffer, range: FileRange) -> io::Result<usize> {
        let chunk = text.content_range(range);
        self.out.write_all(chunk.as_bytes())?;
        self.written += chunk.len();
        Ok(chunk.len())
    }

    /// Flush and (for atomic saves) rename into place.
    pub fn commit(mut self) -> io::Result<()> {
        self.out.flush()?;
        if let Some(tmp) = self.tmp.take() {
            fs::rename(tmp, &self.path)?;
        }
        Ok(())
    }

    /// Abandon the save, removing any temporary file.
    pub fn cancel(mut self) {
        if let Some(tmp) = self.tmp.take() {
            let _ = fs::remove_file(tmp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_addressing() {
        let t = TextBuffer::new("alpha\nbeta\ngamma\n");

        assert_eq!(t.size(), 17);
        assert_eq!(t.line_start(1), 0);
        assert_eq!(t.line_start(2), 6);
        assert_eq!(t.line_start(3), 11);
        assert_eq!(t.line_start(99), 17);
        assert_eq!(t.lineno_at(0), 1);
        assert_eq!(t.lineno_at(6), 2);
        assert_eq!(t.line_next(0), 6);
        assert_eq!(t.line_next(12), 17);
        assert_eq!(t.line_range(7), FileRange { start: 6, end: 11 });
    }

    #[test]
    fn test_edit_and_modified() {
        let mut t = TextBuffer::new("abc");
        assert!(!t.modified());

        t.insert(1, "XY");
        assert_eq!(t.content(), "aXYbc");
        assert!(t.modified());

        t.delete_range(FileRange { start: 0, end: 3 });
        assert_eq!(t.content(), "bc");

        t.set_saved();
        assert!(!t.modified());
    }

    #[test]
    fn test_search() {
        let t = TextBuffer::new("alpha\nbeta\ngamma\n");
        let re = Regex::new("a+").unwrap();

        assert_eq!(t.search_forward(&re, 0), Some(FileRange { start: 0, end: 1 }));
        assert_eq!(t.search_forward(&re, 1), Some(FileRange { start: 4, end: 5 }));
        assert_eq!(t.search_backward(&re, 5), Some(FileRange { start: 4, end: 5 }));
        assert_eq!(t.search_backward(&re, 1), Some(FileRange { start: 0, end: 1 }));

        let re = Regex::new("zebra").unwrap();
        assert_eq!(t.search_forward(&re, 0), None);
    }

    #[test]
    fn test_snapshots() {
        let mut t = TextBuffer::new("one");
        t.insert(3, " two");
        t.snapshot();
        t.insert(7, " three");
        t.snapshot();

        assert_eq!(t.earlier(), Some(0));
        assert_eq!(t.content(), "one two");
        assert_eq!(t.earlier(), Some(0));
        assert_eq!(t.content(), "one");
        assert_eq!(t.earlier(), None);
        assert_eq!(t.later(), Some(0));
        assert_eq!(t.content(), "one two");
    }

    #[test]
    fn test_save_atomic() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("samedit-test-{}", std::process::id()));
        let t = TextBuffer::new("payload\n");

        let mut save = TextSave::begin(&path, SaveMethod::Atomic).unwrap();
        save.write_range(&t, FileRange { start: 0, end: t.size() }).unwrap();
        save.commit().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "payload\n");
        let _ = fs::remove_file(&path);
    }
}
