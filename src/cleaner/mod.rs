use crate::audit::{AuditLogger, EntryKind, ItemResult};
use crate::clock::{Clock, SystemClock};
use crate::scanner::{FileEntry, Scanner};
use crate::utils::format_size;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files untouched for longer than this many days are removed by default
pub const DEFAULT_OLDER_THAN_DAYS: u32 = 10;

/// Options for cleaning operations
#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Remove files whose age exceeds this many whole days
    pub older_than_days: u32,

    /// Remove directories left empty after the file pass
    pub clean_empty_dirs: bool,

    /// Dry run mode - don't actually delete
    pub dry_run: bool,

    /// Show verbose output
    pub verbose: bool,

    /// Show a progress bar while removing files
    pub progress: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            older_than_days: DEFAULT_OLDER_THAN_DAYS,
            clean_empty_dirs: true,
            dry_run: false,
            verbose: false,
            progress: false,
        }
    }
}

/// Result of a cleaning pass
#[derive(Debug, Default, Clone, Serialize)]
pub struct CleanOutcome {
    /// Number of files removed (or that would be, in dry run)
    pub files_removed: usize,

    /// Number of empty directories removed
    pub directories_removed: usize,

    /// Total size of removed files in bytes
    pub bytes_freed: u64,

    /// Number of entries that could not be removed
    pub failed_count: usize,

    /// Error messages
    pub errors: Vec<String>,

    pub dry_run: bool,

    /// Audit run id, when the pass was logged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl CleanOutcome {
    /// (files removed, directories removed)
    pub fn counts(&self) -> (usize, usize) {
        (self.files_removed, self.directories_removed)
    }

    /// Returns a human-readable size string
    pub fn size_freed_human(&self) -> String {
        format_size(self.bytes_freed)
    }
}

/// Removes stale files below a root and prunes the directories they leave empty
pub struct TemporaryCleaner<C: Clock = SystemClock> {
    options: CleanOptions,
    clock: C,
    audit: Option<AuditLogger>,
}

impl TemporaryCleaner<SystemClock> {
    /// Create a new cleaner with default options
    pub fn new() -> Self {
        Self::with_options(CleanOptions::default())
    }

    /// Create a cleaner with custom options
    pub fn with_options(options: CleanOptions) -> Self {
        Self {
            options,
            clock: SystemClock,
            audit: None,
        }
    }
}

impl Default for TemporaryCleaner<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> TemporaryCleaner<C> {
    /// Replace the time source used for age calculations
    pub fn clock<D: Clock>(self, clock: D) -> TemporaryCleaner<D> {
        TemporaryCleaner {
            options: self.options,
            clock,
            audit: self.audit,
        }
    }

    /// Record every removal and the run summary in an audit log
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn older_than_days(mut self, days: u32) -> Self {
        self.options.older_than_days = days;
        self
    }

    pub fn clean_empty_dirs(mut self, clean: bool) -> Self {
        self.options.clean_empty_dirs = clean;
        self
    }

    /// Set dry run mode
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.options.dry_run = dry_run;
        self
    }

    /// Set verbose mode
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.options.verbose = verbose;
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.options.progress = progress;
        self
    }

    pub fn options(&self) -> &CleanOptions {
        &self.options
    }

    /// Clean `root`. A missing root yields an empty outcome.
    ///
    /// Failures to remove an entry are recorded in the outcome and the pass
    /// continues; an entry that disappeared before removal is skipped.
    pub fn clean<P: AsRef<Path>>(&self, root: P) -> CleanOutcome {
        let root = root.as_ref();
        let now = self.clock.now();

        let mut run = Run {
            outcome: CleanOutcome {
                dry_run: self.options.dry_run,
                ..CleanOutcome::default()
            },
            removed: HashSet::new(),
            audit: None,
        };

        if let Some(audit) = &self.audit {
            if let Ok(run_id) = audit.start_run(root, self.options.dry_run) {
                run.outcome.run_id = Some(run_id.clone());
                run.audit = Some((audit, run_id));
            }
        }

        let (_, files) = Scanner::new(root)
            .hide_directories(false)
            .with_metadata(true)
            .separate(true)
            .scan()
            .into_parts();
        self.remove_expired_files(files, now, &mut run);

        if self.options.clean_empty_dirs {
            self.remove_empty_dirs(root, &mut run);
        }

        if let Some((audit, run_id)) = &run.audit {
            let outcome = &run.outcome;
            let _ = audit.finish_run(
                run_id,
                outcome.files_removed,
                outcome.directories_removed,
                outcome.failed_count,
                outcome.bytes_freed,
            );
        }

        run.outcome
    }

    /// True when the age in whole days (rounded down) exceeds the threshold
    pub fn is_expired(&self, modified: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.exceeds_threshold((now - modified).num_days())
    }

    fn exceeds_threshold(&self, age_days: i64) -> bool {
        age_days > i64::from(self.options.older_than_days)
    }

    fn remove_expired_files(
        &self,
        files: Vec<FileEntry>,
        now: DateTime<Utc>,
        run: &mut Run<'_>,
    ) {
        let expired: Vec<FileEntry> = files
            .into_iter()
            .filter(|file| {
                file.age_days(now)
                    .map_or(false, |age| self.exceeds_threshold(age))
            })
            .collect();

        if expired.is_empty() {
            return;
        }

        let pb = self.progress_bar(expired.len() as u64);

        for file in expired {
            let size = file.size();
            pb.set_message(file.path.display().to_string());

            match self.remove(&file.path, EntryKind::File) {
                Ok(true) => {
                    run.outcome.files_removed += 1;
                    run.outcome.bytes_freed += size;
                    run.log(&file.path, EntryKind::File, self.removed_result(), size, None);
                    run.removed.insert(file.path.clone());

                    if self.options.verbose {
                        println!(
                            "{} {} ({})",
                            self.removed_marker(),
                            file.path.display(),
                            format_size(size)
                        );
                    }
                }
                Ok(false) => {}
                Err(err) => run.fail(&file.path, EntryKind::File, &err, self.options.verbose),
            }

            pb.inc(1);
        }

        pb.finish_and_clear();
    }

    fn remove_empty_dirs(&self, root: &Path, run: &mut Run<'_>) {
        let (mut directories, _) = Scanner::new(root)
            .hide_directories(false)
            .with_metadata(false)
            .separate(true)
            .scan()
            .into_parts();

        // Deepest first; the sort is stable so siblings keep scan order
        directories.sort_by_key(|dir| Reverse(dir.components().count()));

        for dir in directories {
            if !is_left_empty(&dir, &run.removed) {
                continue;
            }

            match self.remove(&dir, EntryKind::Directory) {
                Ok(true) => {
                    run.outcome.directories_removed += 1;
                    run.log(&dir, EntryKind::Directory, self.removed_result(), 0, None);

                    if self.options.verbose {
                        println!("{} {}/", self.removed_marker(), dir.display());
                    }
                    run.removed.insert(dir);
                }
                Ok(false) => {}
                Err(err) => run.fail(&dir, EntryKind::Directory, &err, self.options.verbose),
            }
        }
    }

    /// Ok(true) when removed, Ok(false) when the entry was already gone
    fn remove(&self, path: &Path, kind: EntryKind) -> io::Result<bool> {
        if self.options.dry_run {
            return Ok(true);
        }

        let removed = match kind {
            EntryKind::File => fs::remove_file(path),
            EntryKind::Directory => fs::remove_dir(path),
        };

        match removed {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn removed_result(&self) -> ItemResult {
        if self.options.dry_run {
            ItemResult::WouldRemove
        } else {
            ItemResult::Removed
        }
    }

    fn removed_marker(&self) -> &'static str {
        if self.options.dry_run {
            "[DRY RUN] Would remove:"
        } else {
            "✓ Removed"
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.options.progress || self.options.verbose {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg}\n{bar:40.cyan/blue} {pos}/{len} files")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb
    }
}

/// True when every direct child of `dir` was removed earlier in the pass.
/// A directory that cannot be listed counts as not empty.
fn is_left_empty(dir: &Path, removed: &HashSet<PathBuf>) -> bool {
    match fs::read_dir(dir) {
        Ok(mut children) => children.all(|child| {
            child.map_or(false, |child| removed.contains(&child.path()))
        }),
        Err(_) => false,
    }
}

/// Mutable state of a single cleaning pass
struct Run<'a> {
    outcome: CleanOutcome,

    /// Paths removed so far (or that would be, in dry run)
    removed: HashSet<PathBuf>,

    audit: Option<(&'a AuditLogger, String)>,
}

impl Run<'_> {
    fn log(
        &self,
        path: &Path,
        kind: EntryKind,
        result: ItemResult,
        bytes: u64,
        reason: Option<String>,
    ) {
        if let Some((audit, run_id)) = &self.audit {
            let _ = audit.log_item(run_id, path, kind, result, bytes, reason);
        }
    }

    fn fail(&mut self, path: &Path, kind: EntryKind, err: &io::Error, verbose: bool) {
        self.outcome.failed_count += 1;
        let error_msg = format!("Failed to remove {}: {}", path.display(), err);
        self.outcome.errors.push(error_msg.clone());
        self.log(path, kind, ItemResult::Failed, 0, Some(err.to_string()));

        if verbose {
            eprintln!("✗ {}", error_msg);
        }
    }
}
