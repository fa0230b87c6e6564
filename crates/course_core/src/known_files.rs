use std::collections::HashSet;

use crate::FileEntry;

/// Paths already reported for the current task.
///
/// Grows monotonically; a fresh set is created for every new task.
#[derive(Debug, Clone, Default)]
pub struct KnownFiles {
    paths: HashSet<String>,
}

impl KnownFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `files` and return the ones whose path was not known before,
    /// in listing order. A path repeated within one listing is reported once.
    pub fn observe(&mut self, files: &[FileEntry]) -> Vec<FileEntry> {
        files
            .iter()
            .filter(|file| self.paths.insert(file.path.clone()))
            .cloned()
            .collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
