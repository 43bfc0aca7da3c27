use super::{system_time_to_datetime, FileEntry, FileMeta, ScanResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directory scanner producing files and directories below a root
///
/// Children are visited in file-name order, so scanning an unchanged tree
/// twice yields the same result. Symlinks are never followed and are
/// reported as files. Special files (sockets, FIFOs, devices) are skipped.
#[derive(Debug, Clone)]
pub struct Scanner {
    /// Root path to scan
    root: PathBuf,

    /// Descend into subdirectories
    recursive: bool,

    /// Leave directories out of the result (they are still descended into)
    hide_directories: bool,

    /// Attach modification time, real path and size to each file
    with_metadata: bool,

    /// Return directories and files as two sequences
    separate: bool,
}

impl Scanner {
    /// Create a new scanner for the given root path
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            recursive: true,
            hide_directories: true,
            with_metadata: true,
            separate: false,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn hide_directories(mut self, hide: bool) -> Self {
        self.hide_directories = hide;
        self
    }

    pub fn with_metadata(mut self, with_metadata: bool) -> Self {
        self.with_metadata = with_metadata;
        self
    }

    pub fn separate(mut self, separate: bool) -> Self {
        self.separate = separate;
        self
    }

    /// Scan the root. A missing root or a root that is not a directory
    /// yields an empty result; unreadable entries are skipped.
    pub fn scan(&self) -> ScanResult {
        if !self.root.is_dir() {
            return ScanResult::empty(self.separate);
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name();

        let mut directories = Vec::new();
        let mut files = Vec::new();

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            let file_type = entry.file_type();
            if file_type.is_dir() {
                if !self.hide_directories {
                    directories.push(entry.into_path());
                }
                continue;
            }

            // Sockets, FIFOs and device nodes are neither files nor directories
            if !file_type.is_file() && !file_type.is_symlink() {
                continue;
            }

            let meta = if self.with_metadata {
                match read_meta(&entry) {
                    Some(meta) => Some(meta),
                    // Vanished between listing and stat
                    None => continue,
                }
            } else {
                None
            };

            files.push(FileEntry {
                path: entry.into_path(),
                meta,
            });
        }

        ScanResult::from_parts(directories, files, self.separate)
    }
}

fn read_meta(entry: &DirEntry) -> Option<FileMeta> {
    let metadata = entry.metadata().ok()?;
    let modified = metadata.modified().ok()?;
    let real_path = fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());

    Some(FileMeta {
        modified: system_time_to_datetime(modified),
        real_path,
        size: metadata.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Entry;
    use tempfile::TempDir;

    fn build_tree(root: &Path) {
        fs::create_dir_all(root.join("b").join("deep")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("z.txt"), "z").unwrap();
        fs::write(root.join("a").join("one.txt"), "1").unwrap();
        fs::write(root.join("b").join("two.txt"), "22").unwrap();
        fs::write(root.join("b").join("deep").join("three.txt"), "333").unwrap();
    }

    #[test]
    fn test_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");

        assert!(Scanner::new(&missing).scan().is_empty());
        assert!(matches!(
            Scanner::new(&missing).separate(true).scan(),
            ScanResult::Separated { .. }
        ));
    }

    #[test]
    fn test_file_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        assert!(Scanner::new(&file).scan().is_empty());
    }

    #[test]
    fn test_recursive_separated_order() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        build_tree(root);

        let (dirs, files) = Scanner::new(root)
            .hide_directories(false)
            .with_metadata(false)
            .separate(true)
            .scan()
            .into_parts();

        assert_eq!(
            dirs,
            vec![root.join("a"), root.join("b"), root.join("b").join("deep")]
        );
        let file_paths: Vec<_> = files.into_iter().map(|f| f.path).collect();
        assert_eq!(
            file_paths,
            vec![
                root.join("a").join("one.txt"),
                root.join("b").join("deep").join("three.txt"),
                root.join("b").join("two.txt"),
                root.join("z.txt"),
            ]
        );
    }

    #[test]
    fn test_hidden_directories_are_still_descended() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        build_tree(root);

        let entries = Scanner::new(root).with_metadata(false).scan().into_flat();

        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| !e.is_dir()));
    }

    #[test]
    fn test_non_recursive_lists_direct_children() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        build_tree(root);

        let entries = Scanner::new(root)
            .recursive(false)
            .hide_directories(false)
            .with_metadata(false)
            .scan()
            .into_flat();

        let paths: Vec<_> = entries.iter().map(|e| e.path().to_path_buf()).collect();
        assert_eq!(paths, vec![root.join("a"), root.join("b"), root.join("z.txt")]);
    }

    #[test]
    fn test_metadata_is_attached() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        build_tree(root);

        let (_, files) = Scanner::new(root).separate(true).scan().into_parts();
        let three = files
            .iter()
            .find(|f| f.path.ends_with("three.txt"))
            .unwrap();
        let meta = three.meta.as_ref().unwrap();

        assert_eq!(meta.size, 3);
        assert_eq!(meta.real_path, fs::canonicalize(&three.path).unwrap());
    }

    #[test]
    fn test_scan_is_repeatable() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        build_tree(root);

        let scanner = Scanner::new(root).hide_directories(false);
        assert_eq!(scanner.scan(), scanner.scan());
    }

    #[test]
    fn test_separated_partitions_flat_result() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        build_tree(root);

        let scanner = Scanner::new(root).hide_directories(false).with_metadata(false);
        let flat = scanner.scan().into_flat();
        let (dirs, files) = scanner.clone().separate(true).scan().into_parts();

        assert_eq!(flat.len(), dirs.len() + files.len());
        for entry in &flat {
            match entry {
                Entry::Directory(path) => {
                    assert!(dirs.contains(path));
                    assert!(!files.iter().any(|f| &f.path == path));
                }
                Entry::File(file) => {
                    assert!(files.contains(file));
                    assert!(!dirs.contains(&file.path));
                }
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_files_and_not_followed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let outside = temp.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let entries = Scanner::new(&root).hide_directories(false).scan().into_flat();

        assert_eq!(entries.len(), 1);
        assert!(!entries[0].is_dir());
        assert_eq!(entries[0].path(), root.join("link"));
    }

    #[cfg(unix)]
    #[test]
    fn test_special_files_are_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("plain.txt"), "p").unwrap();
        let _listener = std::os::unix::net::UnixListener::bind(root.join("app.sock")).unwrap();

        let entries = Scanner::new(root).with_metadata(false).scan().into_flat();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path(), root.join("plain.txt"));
    }
}
