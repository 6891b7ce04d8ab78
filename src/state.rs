//! Shared application state of a display instance
//!
//! The entry list and the selection live behind a single lock. Callers only
//! ever get copies out; the two mutators return a [`StateSnapshot`] taken
//! under the same lock so the display layer sees exactly what the mutation
//! produced.

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::entry::{sorted_insert_position, ContentEntry};

/// Copy of the state taken right after a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub entries: Vec<ContentEntry>,
    /// Index of the entry the mutation touched
    pub index: usize,
    /// Selection after the mutation
    pub current: usize,
}

#[derive(Debug)]
struct Inner {
    entries: Vec<ContentEntry>,
    current: usize,
}

impl Inner {
    /// Insert keeping name order; returns the new entry's index.
    fn insert_sorted(&mut self, entry: ContentEntry) -> usize {
        let pos = sorted_insert_position(&self.entries, &entry.name);
        self.entries.insert(pos, entry);
        // Keep the previously selected entry selected
        if self.entries.len() > 1 && pos <= self.current {
            self.current += 1;
        }
        pos
    }
}

/// Entry list plus current selection, safe to share between connection tasks
#[derive(Debug)]
pub struct AppState {
    inner: RwLock<Inner>,
}

impl AppState {
    /// Create state holding the initial entry, selected.
    pub fn new(initial: ContentEntry) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: vec![initial],
                current: 0,
            }),
        }
    }

    /// Create state with no entries at all.
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: Vec::new(),
                current: 0,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an entry in name order. The selection keeps pointing at the entry
    /// it pointed at before; the snapshot index is the new entry's position.
    pub fn append(&self, entry: ContentEntry) -> StateSnapshot {
        let mut inner = self.write();
        let index = inner.insert_sorted(entry);
        StateSnapshot {
            entries: inner.entries.clone(),
            index,
            current: inner.current,
        }
    }

    /// Replace the content of the entry backed by `path` and select it, or add
    /// a new selected entry when no entry has that path.
    ///
    /// An empty `name` keeps the existing entry's name. An empty `path` never
    /// matches, so path-less content always becomes a new entry.
    pub fn replace_or_append(&self, path: &str, content: &str, name: &str) -> StateSnapshot {
        let mut inner = self.write();
        let existing = if path.is_empty() {
            None
        } else {
            inner.entries.iter().position(|e| e.path == path)
        };

        let index = match existing {
            Some(i) => {
                let entry = &mut inner.entries[i];
                entry.content = content.to_string();
                if !name.is_empty() {
                    entry.name = name.to_string();
                }
                // A rename can break name order; re-sort and follow the entry.
                if !name.is_empty() {
                    let updated = inner.entries.remove(i);
                    let pos = sorted_insert_position(&inner.entries, &updated.name);
                    inner.entries.insert(pos, updated);
                    pos
                } else {
                    i
                }
            }
            None => inner.insert_sorted(ContentEntry::new(name, path, content)),
        };
        inner.current = index;

        StateSnapshot {
            entries: inner.entries.clone(),
            index,
            current: index,
        }
    }

    /// Select the entry at `index` and return its content.
    pub fn select(&self, index: usize) -> Option<String> {
        let mut inner = self.write();
        let content = inner.entries.get(index)?.content.clone();
        inner.current = index;
        Some(content)
    }

    /// Content of the selected entry, empty when there is none.
    pub fn current_content(&self) -> String {
        let inner = self.read();
        inner
            .entries
            .get(inner.current)
            .map(|e| e.content.clone())
            .unwrap_or_default()
    }

    /// Directory of the selected entry's backing file.
    pub fn current_base_dir(&self) -> Option<PathBuf> {
        let inner = self.read();
        inner.entries.get(inner.current).and_then(|e| e.base_dir())
    }

    pub fn entries(&self) -> Vec<ContentEntry> {
        self.read().entries.clone()
    }

    pub fn current_index(&self) -> usize {
        self.read().current
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }
}
