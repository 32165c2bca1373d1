//! File system paths for the session client.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Directory under the home directory holding config, tokens, and logs.
const BASE_DIR_NAME: &str = ".iam-session";

/// Manages file system paths for the session client.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.iam-session)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.iam-session`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.iam-session/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the token storage directory (~/.iam-session/storage).
    pub fn storage_dir(&self) -> PathBuf {
        self.base_dir.join("storage")
    }

    /// Get the token store file for an origin.
    ///
    /// Every origin gets its own file, so tokens issued for one identity
    /// service are never visible to another.
    pub fn token_store_file(&self, origin: &str) -> PathBuf {
        self.storage_dir()
            .join(format!("{}.json", sanitize_origin(origin)))
    }

    /// Ensure the base and storage directories exist. The storage directory
    /// holds tokens and is created owner-only.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;

        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(self.storage_dir())?;
        Ok(())
    }
}

fn sanitize_origin(origin: &str) -> String {
    let sanitized: String = origin
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();

    if sanitized.is_empty() {
        "default".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_layout() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/iam"));
        assert_eq!(paths.base_dir(), &PathBuf::from("/tmp/iam"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/iam/config.json"));
        assert_eq!(paths.storage_dir(), PathBuf::from("/tmp/iam/storage"));
    }

    #[test]
    fn test_token_store_file_is_origin_scoped() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/iam"));
        let a = paths.token_store_file("http://127.0.0.1:8000");
        let b = paths.token_store_file("https://iam.example.com");

        assert_ne!(a, b);
        assert_eq!(a, PathBuf::from("/tmp/iam/storage/http___127.0.0.1_8000.json"));
    }

    #[test]
    fn test_sanitize_origin_never_escapes_storage_dir() {
        assert_eq!(sanitize_origin("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_origin("   "), "default");
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("nested"));
        paths.ensure_dirs().unwrap();
        assert!(paths.storage_dir().is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(paths.storage_dir())
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o077, 0);
        }
    }
}
