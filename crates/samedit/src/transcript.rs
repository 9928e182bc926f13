//! # Transcripts
//!
//! ## Overview
//!
//! Handlers never mutate text inline; they enqueue [Change]s into the
//! file's [Transcript]. The transcript keeps changes strictly ordered by
//! range start and rejects overlapping edits while they are still expressed
//! as ranges over the pre-state — once anything has been applied, overlap
//! could no longer be detected. The apply phase walks the ordered list with
//! a running byte offset (see the editor module).

use crate::editing::FileRange;
use crate::editor::WindowId;
use crate::errors::SamError;

/// The kind of mutation a [Change] performs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeKind {
    /// Insert `data` at the (empty) range.
    Insert,

    /// Delete the range.
    Delete,

    /// Delete the range, then insert `data` in its place.
    Change,
}

impl ChangeKind {
    /// Whether applying this change deletes bytes.
    pub fn has_delete(&self) -> bool {
        matches!(self, ChangeKind::Delete | ChangeKind::Change)
    }

    /// Whether applying this change inserts bytes.
    pub fn has_insert(&self) -> bool {
        matches!(self, ChangeKind::Insert | ChangeKind::Change)
    }
}

/// A deferred, range-scoped mutation queued into a [Transcript].
#[derive(Clone, Debug)]
pub struct Change {
    /// What the change does.
    pub kind: ChangeKind,

    /// Window in which the changed file is being displayed.
    pub win: WindowId,

    /// Selection associated with this change, if any.
    pub sel: Option<usize>,

    /// The affected byte range over the pre-state; inserts use an empty
    /// range.
    pub range: FileRange,

    /// Bytes to insert (`count` times).
    pub data: String,

    /// How often `data` is inserted.
    pub count: usize,
}

/// The pending changes of one file for one `sam_cmd` invocation.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    changes: Vec<Change>,
    latest: Option<usize>,
    error: Option<SamError>,
}

fn point_at_end(ins: &Change, del: &Change) -> bool {
    ins.kind == ChangeKind::Insert
        && del.kind.has_delete()
        && !del.range.is_empty()
        && ins.range.start == del.range.end
}

fn conflicts(a: &Change, b: &Change) -> bool {
    a.range.overlaps(&b.range) || point_at_end(a, b) || point_at_end(b, a)
}

impl Transcript {
    /// Queue a change, keeping the list ordered by range start. On overlap
    /// the transcript is marked with [SamError::Conflict], the change is
    /// dropped, and `false` is returned.
    pub fn insert(&mut self, change: Change) -> bool {
        if self.error.is_some() {
            return false;
        }

        let mut idx = match self.latest {
            Some(l) if self.changes[l].range.end <= change.range.start => l + 1,
            _ => 0,
        };
        while idx < self.changes.len() && self.changes[idx].range.end <= change.range.start {
            idx += 1;
        }

        let clash = self.changes.get(idx).map_or(false, |next| conflicts(next, &change))
            || idx
                .checked_sub(1)
                .and_then(|i| self.changes.get(i))
                .map_or(false, |prev| conflicts(prev, &change));
        if clash {
            self.error = Some(SamError::Conflict);
            return false;
        }

        self.changes.insert(idx, change);
        self.latest = Some(idx);
        true
    }

    /// The queued changes in ascending range order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Whether any change has been queued.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// The recorded error, if any.
    pub fn error(&self) -> Option<SamError> {
        self.error.clone()
    }

    /// Record `error` if the transcript already holds changes; returns the
    /// transcript's error state afterwards.
    pub fn error_if_changing(&mut self, error: SamError) -> Option<SamError> {
        if !self.changes.is_empty() && self.error.is_none() {
            self.error = Some(error);
        }
        self.error.clone()
    }

    /// Drop all state, returning the queued changes.
    pub fn take(&mut self) -> Vec<Change> {
        self.latest = None;
        self.error = None;
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ins(pos: usize, data: &str) -> Change {
        Change {
            kind: ChangeKind::Insert,
            win: WindowId(0),
            sel: None,
            range: FileRange::empty_at(pos),
            data: data.into(),
            count: 1,
        }
    }

    fn del(start: usize, end: usize) -> Change {
        Change {
            kind: ChangeKind::Delete,
            win: WindowId(0),
            sel: None,
            range: FileRange { start, end },
            data: String::new(),
            count: 0,
        }
    }

    fn chg(start: usize, end: usize, data: &str) -> Change {
        Change {
            kind: ChangeKind::Change,
            win: WindowId(0),
            sel: None,
            range: FileRange { start, end },
            data: data.into(),
            count: 1,
        }
    }

    #[test]
    fn test_ordering_by_start() {
        let mut t = Transcript::default();
        assert!(t.insert(del(10, 12)));
        assert!(t.insert(del(0, 2)));
        assert!(t.insert(del(5, 6)));

        let starts: Vec<usize> = t.changes().iter().map(|c| c.range.start).collect();
        assert_eq!(starts, vec![0, 5, 10]);
        assert!(t.error().is_none());
    }

    #[test]
    fn test_overlap_conflicts() {
        let mut t = Transcript::default();
        assert!(t.insert(del(0, 5)));
        assert!(!t.insert(del(3, 8)));
        assert_eq!(t.error(), Some(SamError::Conflict));
    }

    #[test]
    fn test_adjacent_deletes_allowed() {
        let mut t = Transcript::default();
        assert!(t.insert(chg(0, 1, "A")));
        assert!(t.insert(chg(1, 2, "B")));
        assert!(t.error().is_none());
    }

    #[test]
    fn test_insert_at_end_of_delete_conflicts() {
        // { a/x/ d } over the same range
        let mut t = Transcript::default();
        assert!(t.insert(ins(5, "x")));
        assert!(!t.insert(del(0, 5)));
        assert_eq!(t.error(), Some(SamError::Conflict));

        // and in the other enqueue order
        let mut t = Transcript::default();
        assert!(t.insert(del(0, 5)));
        assert!(!t.insert(ins(5, "x")));
        assert_eq!(t.error(), Some(SamError::Conflict));
    }

    #[test]
    fn test_insert_at_start_of_delete_allowed() {
        // { i/x/ d } composes into a replacement
        let mut t = Transcript::default();
        assert!(t.insert(ins(0, "x")));
        assert!(t.insert(del(0, 5)));
        assert!(t.error().is_none());
    }

    #[test]
    fn test_change_insert_at_end_allowed() {
        // the `<` handler queues an empty-range change at range.end plus a
        // delete of the range
        let mut t = Transcript::default();
        assert!(t.insert(chg(5, 5, "out")));
        assert!(t.insert(del(0, 5)));
        assert!(t.error().is_none());
    }

    #[test]
    fn test_same_point_inserts_compose() {
        let mut t = Transcript::default();
        assert!(t.insert(ins(5, "x")));
        assert!(t.insert(ins(5, "y")));
        assert_eq!(t.changes().len(), 2);
        assert!(t.error().is_none());
    }

    #[test]
    fn test_error_if_changing() {
        let mut t = Transcript::default();
        assert_eq!(t.error_if_changing(SamError::WriteConflict), None);

        t.insert(del(0, 1));
        assert_eq!(t.error_if_changing(SamError::WriteConflict), Some(SamError::WriteConflict));
    }
}
