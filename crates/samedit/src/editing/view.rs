//! # Views and selections
//!
//! ## Overview
//!
//! A [View] is the selection state of one window: a position-ordered list of
//! [Selection]s, one of which is primary. Selections referenced from queued
//! changes are disposed lazily (tombstoned) so that the transcript applier
//! can still resolve them; [View::normalize] purges the dead and merges
//! overlapping survivors after the apply phase.

use super::FileRange;

/// One cursor or anchored range inside a view.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Selection {
    /// Stable identifier within the owning view.
    pub id: usize,

    /// First byte covered.
    pub start: usize,

    /// One past the last byte covered; equals `start` for a bare cursor.
    pub end: usize,

    /// Whether the selection covers a range rather than a position.
    pub anchored: bool,

    pub(crate) dead: bool,
}

impl Selection {
    /// The covered byte range.
    pub fn range(&self) -> FileRange {
        FileRange { start: self.start, end: self.end }
    }

    /// The cursor position.
    pub fn cursor(&self) -> usize {
        if self.anchored {
            self.end
        } else {
            self.start
        }
    }
}

/// The selections of one window.
#[derive(Clone, Debug)]
pub struct View {
    selections: Vec<Selection>,
    next_id: usize,
    primary: usize,
    fabricated: bool,
}

impl View {
    /// A view with a single cursor at `pos`.
    pub fn new(pos: usize) -> Self {
        View {
            selections: vec![Selection { id: 0, start: pos, end: pos, anchored: false, dead: false }],
            next_id: 1,
            primary: 0,
            fabricated: false,
        }
    }

    /// Whether the last [normalize](Self::normalize) had to fabricate a
    /// cursor because every selection had been disposed. Reading resets the
    /// flag.
    pub fn take_fabricated(&mut self) -> bool {
        std::mem::take(&mut self.fabricated)
    }

    /// Iterate the live selections in position order.
    pub fn alive(&self) -> impl Iterator<Item = &Selection> {
        self.selections.iter().filter(|s| !s.dead)
    }

    /// The ids of the live selections in position order.
    pub fn alive_ids(&self) -> Vec<usize> {
        self.alive().map(|s| s.id).collect()
    }

    /// Number of live selections.
    pub fn count(&self) -> usize {
        self.alive().count()
    }

    /// Resolve a selection id, live or tombstoned.
    pub fn get(&self, id: usize) -> Option<&Selection> {
        self.selections.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: usize) -> Option<&mut Selection> {
        self.selections.iter_mut().find(|s| s.id == id)
    }

    /// The ordinal of a live selection among its live peers.
    pub fn ordinal(&self, id: usize) -> Option<usize> {
        self.alive().position(|s| s.id == id)
    }

    /// Create a new cursor at `pos`, keeping the list position-ordered.
    pub fn new_selection(&mut self, pos: usize) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        let sel = Selection { id, start: pos, end: pos, anchored: false, dead: false };
        let at = self.selections.partition_point(|s| s.start <= pos);
        self.selections.insert(at, sel);
        id
    }

    /// Tombstone a selection; it stays resolvable until [normalize](Self::normalize).
    pub fn dispose(&mut self, id: usize) {
        if let Some(sel) = self.get_mut(id) {
            sel.dead = true;
        }
    }

    /// Whether the selection has been disposed (or never existed).
    pub fn is_disposed(&self, id: usize) -> bool {
        self.get(id).map_or(true, |s| s.dead)
    }

    /// Collapse a selection to a cursor at `pos`.
    pub fn cursors_to(&mut self, id: usize, pos: usize) {
        if let Some(sel) = self.get_mut(id) {
            sel.start = pos;
            sel.end = pos;
            sel.anchored = false;
        }
    }

    /// Reshape a selection to cover `range`.
    pub fn set_range(&mut self, id: usize, range: FileRange, anchored: bool) {
        if let Some(sel) = self.get_mut(id) {
            sel.start = range.start;
            sel.end = range.end;
            sel.anchored = anchored;
        }
    }

    /// Drop a selection's anchor, keeping the cursor at the range start.
    pub fn clear_anchor(&mut self, id: usize) {
        if let Some(sel) = self.get_mut(id) {
            sel.end = sel.start;
            sel.anchored = false;
        }
    }

    /// The primary selection's id.
    pub fn primary_id(&self) -> usize {
        self.primary
    }

    /// Make `id` the primary selection.
    pub fn set_primary(&mut self, id: usize) {
        self.primary = id;
    }

    /// The primary selection's cursor position, if it is still live.
    pub fn primary_pos(&self) -> Option<usize> {
        let sel = self.get(self.primary)?;
        if sel.dead {
            None
        } else {
            Some(sel.cursor())
        }
    }

    /// Whether any live selection is anchored.
    pub fn any_anchored(&self) -> bool {
        self.alive().any(|s| s.anchored)
    }

    /// Purge tombstones, re-sort, and merge overlapping or duplicate
    /// selections. A view always keeps at least one cursor.
    pub fn normalize(&mut self) {
        self.fabricated = false;
        self.selections.retain(|s| !s.dead);
        self.selections.sort_by_key(|s| (s.start, s.end));

        let mut merged: Vec<Selection> = Vec::with_capacity(self.selections.len());
        for sel in self.selections.drain(..) {
            if let Some(prev) = merged.last_mut() {
                let dup = prev.start == sel.start && prev.end == sel.end;
                let overlap = sel.start < prev.end;
                if dup || overlap {
                    prev.end = prev.end.max(sel.end);
                    prev.anchored |= sel.anchored;
                    if sel.id == self.primary {
                        self.primary = prev.id;
                    }
                    continue;
                }
            }
            merged.push(sel);
        }
        self.selections = merged;

        if self.selections.is_empty() {
            let id = self.next_id;
            self.next_id += 1;
            self.selections.push(Selection { id, start: 0, end: 0, anchored: false, dead: false });
            self.primary = id;
            self.fabricated = true;
        } else if self.get(self.primary).is_none() {
            self.primary = self.selections[0].id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_selection_ordering() {
        let mut v = View::new(5);
        v.new_selection(1);
        v.new_selection(9);

        let starts: Vec<usize> = v.alive().map(|s| s.start).collect();
        assert_eq!(starts, vec![1, 5, 9]);
        assert_eq!(v.count(), 3);
    }

    #[test]
    fn test_dispose_and_normalize() {
        let mut v = View::new(0);
        let b = v.new_selection(4);
        v.dispose(b);
        assert_eq!(v.count(), 1);
        assert!(v.is_disposed(b));
        // tombstones stay resolvable until normalize purges them
        assert!(v.get(b).is_some());

        v.normalize();
        assert_eq!(v.count(), 1);
        assert!(v.get(b).is_none());
    }

    #[test]
    fn test_normalize_merges_overlaps() {
        let mut v = View::new(0);
        let a = v.primary_id();
        let b = v.new_selection(3);
        v.set_range(a, FileRange { start: 0, end: 5 }, true);
        v.set_range(b, FileRange { start: 3, end: 8 }, true);

        v.normalize();
        assert_eq!(v.count(), 1);
        let sel = v.alive().next().unwrap();
        assert_eq!(sel.range(), FileRange { start: 0, end: 8 });
    }

    #[test]
    fn test_normalize_never_empty() {
        let mut v = View::new(7);
        let id = v.primary_id();
        v.dispose(id);
        v.normalize();
        assert_eq!(v.count(), 1);
        assert_eq!(v.primary_pos(), Some(0));
    }

    #[test]
    fn test_ordinal_skips_dead() {
        let mut v = View::new(0);
        let b = v.new_selection(4);
        let c = v.new_selection(8);
        v.dispose(b);

        assert_eq!(v.ordinal(c), Some(1));
    }
}
