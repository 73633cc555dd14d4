use crate::config::Config;
use crate::file::FileRecord;
use crate::pipeline::CancelFlag;
use ignore::{Walk, WalkBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Walks the filesystem and yields candidate file records.
///
/// The walk is lazy: records are produced one at a time so a downstream
/// consumer can stop without the whole tree being visited. Directory entries
/// are visited in lexical order for deterministic output, and the walker's
/// loop detection keeps followed-symlink cycles from recursing forever.
pub(crate) struct Scanner {
    root_dir: PathBuf,
    follow_symlinks: bool,
    respect_gitignore: bool,
    cancel: CancelFlag,
    errors: Arc<AtomicUsize>,
}

impl Scanner {
    /// Creates a new scanner from configuration.
    pub(crate) fn new(config: &Config, cancel: CancelFlag) -> Self {
        Self {
            root_dir: config.root_dir.clone(),
            follow_symlinks: config.follow_symlinks,
            respect_gitignore: config.respect_gitignore,
            cancel,
            errors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns a lazy iterator over the records of the scanned tree.
    ///
    /// Unreadable entries are logged at `warn` and skipped; they never abort
    /// the walk. The number of such skips is available from
    /// [`Scanner::error_count`] once the iterator has been drained.
    pub(crate) fn records(&self) -> ScanIter {
        debug!("Starting scan of {}", self.root_dir.display());

        let walk = WalkBuilder::new(&self.root_dir)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .git_global(false)
            .require_git(false)
            .ignore(false)
            .parents(false)
            .hidden(false)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        ScanIter {
            walk,
            root: self.root_dir.clone(),
            cancel: self.cancel.clone(),
            errors: Arc::clone(&self.errors),
        }
    }

    /// Number of entries skipped because of read errors.
    pub(crate) fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Lazy iterator over scanned [`FileRecord`]s.
pub(crate) struct ScanIter {
    walk: Walk,
    root: PathBuf,
    cancel: CancelFlag,
    errors: Arc<AtomicUsize>,
}

impl Iterator for ScanIter {
    type Item = FileRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cancel.is_cancelled() {
                debug!("Scan cancelled");
                return None;
            }

            match self.walk.next()? {
                Ok(entry) if entry.file_type().is_some_and(|ft| ft.is_file()) => {
                    match FileRecord::from_path(entry.path(), &self.root) {
                        Ok(record) => return Some(record),
                        Err(e) => {
                            warn!("Failed to read {}: {}", entry.path().display(), e);
                            self.errors.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Walk error: {}", e);
                    self.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}
