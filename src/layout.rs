//! Standard directories of a web project and helpers for the temporary one.
//!
//! The layout follows the usual kernel conventions:
//!
//! ```text
//! <project>/src
//! <project>/var/cache
//! <project>/var/log
//! <project>/var/<temporary>     (default: var/temp)
//! <project>/<libraries>         (default: libraries)
//! <project>/<public>            (default: public)
//! ```

use crate::cleaner::{CleanOutcome, TemporaryCleaner};
use crate::clock::Clock;
use crate::config::{Config, DirectoryNames};
use anyhow::{Context, Result};
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};
use std::time::SystemTime;

/// Give up on finding a free temporary file name after this many collisions
const MAX_NAME_ATTEMPTS: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    project_dir: PathBuf,
    source_dir: PathBuf,
    cache_dir: PathBuf,
    logs_dir: PathBuf,
    libraries_dir: PathBuf,
    temporary_dir: PathBuf,
    public_dir: PathBuf,
}

impl DirectoryLayout {
    /// Layout with the default directory names
    pub fn new<P: AsRef<Path>>(project_dir: P) -> Self {
        Self::with_names(project_dir, &DirectoryNames::default())
    }

    pub fn with_names<P: AsRef<Path>>(project_dir: P, names: &DirectoryNames) -> Self {
        let project_dir = project_dir.as_ref().to_path_buf();
        let var_dir = project_dir.join("var");

        Self {
            source_dir: project_dir.join("src"),
            cache_dir: var_dir.join("cache"),
            logs_dir: var_dir.join("log"),
            libraries_dir: project_dir.join(&names.libraries),
            temporary_dir: var_dir.join(&names.temporary),
            public_dir: project_dir.join(&names.public),
            project_dir,
        }
    }

    /// Layout for the configured project, or the current directory
    pub fn from_config(config: &Config) -> Result<Self> {
        let project_dir = match &config.project_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to resolve current directory")?,
        };

        Ok(Self::with_names(project_dir, &config.directories))
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn libraries_dir(&self) -> &Path {
        &self.libraries_dir
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Temporary directory path without touching the filesystem
    pub fn temporary_dir(&self) -> &Path {
        &self.temporary_dir
    }

    /// Temporary directory (or `child` below it), created if missing
    pub fn temporary_directory(&self, child: Option<&str>) -> Result<PathBuf> {
        let path = match child.filter(|c| !c.is_empty()) {
            Some(child) => self.temporary_dir.join(child),
            None => self.temporary_dir.clone(),
        };

        create_directory(&path)
    }

    /// Create an empty, uniquely named file in the temporary directory
    pub fn create_temporary_file(&self, child: Option<&str>, prefix: &str) -> Result<PathBuf> {
        let directory = self.temporary_directory(child)?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let mut name = unique_id(prefix);
            if attempt > 0 {
                name.push_str(&attempt.to_string());
            }
            let path = directory.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(path),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("Failed to create temporary file: {}", path.display())
                    })
                }
            }
        }

        anyhow::bail!(
            "No free temporary file name in {} after {} attempts",
            directory.display(),
            MAX_NAME_ATTEMPTS
        )
    }

    /// Run `cleaner` over the temporary directory, creating it first if needed
    pub fn clean_temporary_directory<C: Clock>(
        &self,
        cleaner: &TemporaryCleaner<C>,
    ) -> Result<CleanOutcome> {
        let temporary_dir = self.temporary_directory(None)?;
        Ok(cleaner.clean(temporary_dir))
    }
}

/// Join `parts` with the platform separator, with a trailing separator
/// unless `trim` is set
pub fn generate_path<I, S>(parts: I, trim: bool) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    generate_path_with(parts, trim, MAIN_SEPARATOR_STR)
}

pub fn generate_path_with<I, S>(parts: I, trim: bool, separator: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut generated = parts
        .into_iter()
        .map(|part| part.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(separator);

    if !trim {
        generated.push_str(separator);
    }
    generated
}

/// Create `path` and its parents (mode 0775 on unix) if missing
pub fn create_directory<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(path.to_path_buf());
    }

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o775);
    }

    builder
        .create(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;

    Ok(path.to_path_buf())
}

/// Replace the contents of `path`
pub fn write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    fs::write(path.as_ref(), content)
        .with_context(|| format!("Failed to write file: {}", path.as_ref().display()))
}

/// Canonical form of `path`, or None when it does not resolve
pub fn real_path<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
    fs::canonicalize(path).ok()
}

/// `prefix` followed by 8 hex digits of seconds and 5 of microseconds
fn unique_id(prefix: &str) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}{:08x}{:05x}", prefix, now.as_secs(), now.subsec_micros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_default_layout() {
        let layout = DirectoryLayout::new("/srv/app");

        assert_eq!(layout.project_dir(), Path::new("/srv/app"));
        assert_eq!(layout.source_dir(), Path::new("/srv/app/src"));
        assert_eq!(layout.cache_dir(), Path::new("/srv/app/var/cache"));
        assert_eq!(layout.logs_dir(), Path::new("/srv/app/var/log"));
        assert_eq!(layout.libraries_dir(), Path::new("/srv/app/libraries"));
        assert_eq!(layout.temporary_dir(), Path::new("/srv/app/var/temp"));
        assert_eq!(layout.public_dir(), Path::new("/srv/app/public"));
    }

    #[test]
    fn test_layout_from_config_names() {
        let config = Config {
            project_dir: Some(PathBuf::from("/srv/app")),
            directories: DirectoryNames {
                temporary: String::from("tmp"),
                libraries: String::from("lib"),
                public: String::from("web"),
            },
            ..Default::default()
        };

        let layout = DirectoryLayout::from_config(&config).unwrap();
        assert_eq!(layout.temporary_dir(), Path::new("/srv/app/var/tmp"));
        assert_eq!(layout.libraries_dir(), Path::new("/srv/app/lib"));
        assert_eq!(layout.public_dir(), Path::new("/srv/app/web"));
    }

    #[test]
    fn test_temporary_directory_is_created() {
        let temp = TempDir::new().unwrap();
        let layout = DirectoryLayout::new(temp.path());

        let root = layout.temporary_directory(None).unwrap();
        assert!(root.is_dir());

        let child = layout.temporary_directory(Some("pdf")).unwrap();
        assert_eq!(child, temp.path().join("var").join("temp").join("pdf"));
        assert!(child.is_dir());

        assert_eq!(layout.temporary_directory(Some("")).unwrap(), root);
    }

    #[test]
    fn test_create_temporary_file_is_unique() {
        let temp = TempDir::new().unwrap();
        let layout = DirectoryLayout::new(temp.path());

        let first = layout.create_temporary_file(Some("mail"), "msg_").unwrap();
        let second = layout.create_temporary_file(Some("mail"), "msg_").unwrap();

        assert_ne!(first, second);
        assert!(first.is_file());
        assert!(second.is_file());
        assert_eq!(fs::metadata(&first).unwrap().len(), 0);
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("msg_"));
        assert_eq!(first.parent().unwrap(), layout.temporary_dir().join("mail"));
    }

    #[test]
    fn test_generate_path() {
        assert_eq!(generate_path_with(["var", "temp"], false, "/"), "var/temp/");
        assert_eq!(generate_path_with(["var", "temp"], true, "/"), "var/temp");
        assert_eq!(
            generate_path(["a", "b"], true),
            format!("a{}b", MAIN_SEPARATOR_STR)
        );
    }

    #[test]
    fn test_create_directory_and_write_file() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("x").join("y");

        let created = create_directory(&nested).unwrap();
        assert_eq!(created, nested);
        assert!(nested.is_dir());
        // Existing directories are returned as is
        assert_eq!(create_directory(&nested).unwrap(), nested);

        let file = nested.join("note.txt");
        write_file(&file, "hello").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello");
        assert_eq!(real_path(&file), Some(fs::canonicalize(&file).unwrap()));
        assert_eq!(real_path(nested.join("missing")), None);
    }

    #[test]
    fn test_clean_temporary_directory() {
        let temp = TempDir::new().unwrap();
        let layout = DirectoryLayout::new(temp.path());
        let file = layout.create_temporary_file(None, "").unwrap();
        layout.temporary_directory(Some("empty")).unwrap();

        let now = Utc::now() + Duration::days(30);
        let cleaner = TemporaryCleaner::new().clock(FixedClock(now));
        let outcome = layout.clean_temporary_directory(&cleaner).unwrap();

        assert_eq!(outcome.counts(), (1, 1));
        assert!(!file.exists());
        assert!(layout.temporary_dir().is_dir());
    }
}
