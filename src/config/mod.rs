use crate::cleaner::{CleanOptions, DEFAULT_OLDER_THAN_DAYS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for temp-sweeper
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Project root the layout is derived from (defaults to the current directory)
    #[serde(default)]
    pub project_dir: Option<PathBuf>,

    /// Names of the project subdirectories
    #[serde(default)]
    pub directories: DirectoryNames,

    /// Defaults for the `clean` command
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Audit configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryNames {
    /// Temporary directory, created under `<project>/var`
    #[serde(default = "default_temporary_name")]
    pub temporary: String,

    #[serde(default = "default_libraries_name")]
    pub libraries: String,

    #[serde(default = "default_public_name")]
    pub public: String,
}

impl Default for DirectoryNames {
    fn default() -> Self {
        Self {
            temporary: default_temporary_name(),
            libraries: default_libraries_name(),
            public: default_public_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Remove files older than this many days
    #[serde(default = "default_older_than_days")]
    pub older_than_days: u32,

    /// Remove directories left empty
    #[serde(default = "default_true")]
    pub clean_empty_dirs: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            older_than_days: default_older_than_days(),
            clean_empty_dirs: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_older_than_days() -> u32 {
    DEFAULT_OLDER_THAN_DAYS
}

fn default_temporary_name() -> String {
    String::from("temp")
}

fn default_libraries_name() -> String {
    String::from("libraries")
}

fn default_public_name() -> String {
    String::from("public")
}

impl Config {
    /// Load config from file, or create default if not exists
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;

        Ok(config)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Cleaner options seeded from the `[cleanup]` table
    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions {
            older_than_days: self.cleanup.older_than_days,
            clean_empty_dirs: self.cleanup.clean_empty_dirs,
            ..CleanOptions::default()
        }
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("temp-sweeper").join("config.toml")
        } else {
            PathBuf::from(".temp-sweeper.toml")
        }
    }

    /// Create config directory if it doesn't exist
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_path = Self::default_path();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_save_load() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");

        let config = Config {
            project_dir: Some(PathBuf::from("/srv/app")),
            cleanup: CleanupConfig {
                older_than_days: 3,
                clean_empty_dirs: false,
            },
            ..Default::default()
        };

        config.save(&config_path).unwrap();

        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded.project_dir, Some(PathBuf::from("/srv/app")));
        assert_eq!(loaded.cleanup.older_than_days, 3);
        assert!(!loaded.cleanup.clean_empty_dirs);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[cleanup]\nolder_than_days = 30\n").unwrap();

        assert_eq!(config.cleanup.older_than_days, 30);
        assert!(config.cleanup.clean_empty_dirs);
        assert_eq!(config.directories.temporary, "temp");
        assert!(config.audit.enabled);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        let options = config.clean_options();

        assert_eq!(options.older_than_days, 10);
        assert!(options.clean_empty_dirs);
        assert!(!options.dry_run);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_or_default(temp.path().join("absent.toml")).unwrap();
        assert!(config.project_dir.is_none());
    }
}
