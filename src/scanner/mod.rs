mod walker;

pub use walker::Scanner;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Metadata captured for a file when the scan asks for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMeta {
    /// Last modification time (of the link itself for symlinks)
    pub modified: DateTime<Utc>,

    /// Canonicalized path, or the scanned path when it cannot be resolved
    pub real_path: PathBuf,

    /// Size in bytes
    pub size: u64,
}

/// A non-directory entry found by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub path: PathBuf,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<FileMeta>,
}

impl FileEntry {
    /// Returns how many whole days passed between modification and `now`
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.meta
            .as_ref()
            .map(|meta| (now - meta.modified).num_days())
    }

    pub fn size(&self) -> u64 {
        self.meta.as_ref().map_or(0, |meta| meta.size)
    }
}

/// A single scan entry, classified as exactly one of file or directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entry {
    File(FileEntry),
    Directory(PathBuf),
}

impl Entry {
    pub fn path(&self) -> &Path {
        match self {
            Entry::File(file) => &file.path,
            Entry::Directory(path) => path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Entry::Directory(_))
    }
}

/// Result of a scan, either flat or split into directories and files
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ScanResult {
    /// All directories followed by all files
    Flat(Vec<Entry>),

    Separated {
        directories: Vec<PathBuf>,
        files: Vec<FileEntry>,
    },
}

impl ScanResult {
    /// Empty result in the requested shape
    pub fn empty(separate: bool) -> Self {
        if separate {
            ScanResult::Separated {
                directories: Vec::new(),
                files: Vec::new(),
            }
        } else {
            ScanResult::Flat(Vec::new())
        }
    }

    pub(crate) fn from_parts(
        directories: Vec<PathBuf>,
        files: Vec<FileEntry>,
        separate: bool,
    ) -> Self {
        if separate {
            ScanResult::Separated { directories, files }
        } else {
            ScanResult::Flat(
                directories
                    .into_iter()
                    .map(Entry::Directory)
                    .chain(files.into_iter().map(Entry::File))
                    .collect(),
            )
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ScanResult::Flat(entries) => entries.len(),
            ScanResult::Separated { directories, files } => directories.len() + files.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a single sequence, directories first
    pub fn into_flat(self) -> Vec<Entry> {
        match self {
            ScanResult::Flat(entries) => entries,
            separated => {
                let (directories, files) = separated.into_parts();
                directories
                    .into_iter()
                    .map(Entry::Directory)
                    .chain(files.into_iter().map(Entry::File))
                    .collect()
            }
        }
    }

    /// Split into (directories, files), preserving order within each
    pub fn into_parts(self) -> (Vec<PathBuf>, Vec<FileEntry>) {
        match self {
            ScanResult::Separated { directories, files } => (directories, files),
            ScanResult::Flat(entries) => {
                let mut directories = Vec::new();
                let mut files = Vec::new();
                for entry in entries {
                    match entry {
                        Entry::Directory(path) => directories.push(path),
                        Entry::File(file) => files.push(file),
                    }
                }
                (directories, files)
            }
        }
    }
}

/// Convert SystemTime to DateTime<Utc>
pub(crate) fn system_time_to_datetime(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn file(path: &str) -> FileEntry {
        FileEntry {
            path: PathBuf::from(path),
            meta: None,
        }
    }

    #[test]
    fn test_flat_puts_directories_first() {
        let result = ScanResult::from_parts(
            vec![PathBuf::from("/t/a")],
            vec![file("/t/x.txt"), file("/t/a/y.txt")],
            false,
        );

        let paths: Vec<_> = result
            .into_flat()
            .iter()
            .map(|e| e.path().to_path_buf())
            .collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/t/a"),
                PathBuf::from("/t/x.txt"),
                PathBuf::from("/t/a/y.txt")
            ]
        );
    }

    #[test]
    fn test_into_parts_from_flat() {
        let flat = ScanResult::from_parts(vec![PathBuf::from("/t/a")], vec![file("/t/x")], false);
        let (dirs, files) = flat.into_parts();
        assert_eq!(dirs, vec![PathBuf::from("/t/a")]);
        assert_eq!(files, vec![file("/t/x")]);
    }

    #[test]
    fn test_empty_shapes() {
        assert!(ScanResult::empty(true).is_empty());
        assert!(matches!(ScanResult::empty(false), ScanResult::Flat(_)));
        assert!(matches!(ScanResult::empty(true), ScanResult::Separated { .. }));
    }

    #[test]
    fn test_age_days() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap();
        let entry = FileEntry {
            path: PathBuf::from("/t/old.log"),
            meta: Some(FileMeta {
                modified: now - Duration::days(3) - Duration::hours(5),
                real_path: PathBuf::from("/t/old.log"),
                size: 10,
            }),
        };
        assert_eq!(entry.age_days(now), Some(3));
        assert_eq!(file("/t/bare").age_days(now), None);
    }
}
