//! File-backed storage, one JSON document per origin.
//!
//! Every write rewrites the whole document into a sibling temp file and
//! renames it over the previous file, so a reader sees either the old or the new
//! document, never a torn one.

use crate::{KeyValueStorage, StorageError, StorageResult, StorageWrite};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

type Document = BTreeMap<String, String>;

/// Origin-scoped file storage.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Create storage backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> StorageResult<Document> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        if content.trim().is_empty() {
            return Ok(Document::new());
        }

        match serde_json::from_str(&content) {
            Ok(document) => Ok(document),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Token storage file is corrupt, treating as empty"
                );
                Ok(Document::new())
            }
        }
    }

    fn write_document(&self, document: &Document) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            create_private_dir(parent)?;
        }

        let content = serde_json::to_string_pretty(document)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(FILE_MODE);
        }

        let mut file = options.open(&tmp_path)?;
        // A temp file left over from a crash keeps its old mode.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(FILE_MODE))?;
        }
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), keys = document.len(), "Token storage written");
        Ok(())
    }
}

/// Owner read/write only.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Owner only.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(dir)
}

impl KeyValueStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.apply(&[StorageWrite::set(key, value)])
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_document()?.remove(key))
    }

    fn get_many(&self, keys: &[&str]) -> StorageResult<Vec<Option<String>>> {
        let mut document = self.read_document()?;
        Ok(keys.iter().map(|key| document.remove(*key)).collect())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.write_lock.lock();
        let mut document = self.read_document()?;
        if document.remove(key).is_none() {
            return Ok(false);
        }
        self.write_document(&document)?;
        Ok(true)
    }

    fn apply(&self, writes: &[StorageWrite]) -> StorageResult<()> {
        let _guard = self.write_lock.lock();
        let mut document = self.read_document()?;
        let before = document.clone();

        for write in writes {
            match write {
                StorageWrite::Set { key, value } => {
                    document.insert(key.clone(), value.clone());
                }
                StorageWrite::Delete { key } => {
                    document.remove(key);
                }
            }
        }

        if document == before {
            return Ok(());
        }
        self.write_document(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("origin.json"));
        assert_eq!(storage.get("token").unwrap(), None);
        assert!(!storage.delete("token").unwrap());
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_values_survive_new_instance() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage").join("origin.json");

        FileStorage::new(&path).set("token", "abc").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get("token").unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_batch_is_single_document_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("origin.json");
        let storage = FileStorage::new(&path);

        storage
            .apply(&[
                StorageWrite::set("token", "a"),
                StorageWrite::set("refreshToken", "r"),
                StorageWrite::set("tokenExpiry", "2030-01-01T00:00:00.000Z"),
            ])
            .unwrap();

        let raw: Document =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 3);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_get_many_keeps_key_order() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("origin.json"));
        storage
            .apply(&[StorageWrite::set("token", "a"), StorageWrite::set("tokenExpiry", "e")])
            .unwrap();

        let values = storage
            .get_many(&["tokenExpiry", "refreshToken", "token"])
            .unwrap();
        assert_eq!(
            values,
            vec![Some("e".to_string()), None, Some("a".to_string())]
        );
    }

    #[test]
    fn test_corrupt_file_reads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("origin.json");
        std::fs::write(&path, "{{{ definitely not json").unwrap();

        let storage = FileStorage::new(&path);
        assert_eq!(storage.get("token").unwrap(), None);

        storage.set("token", "fresh").unwrap();
        assert_eq!(storage.get("token").unwrap().as_deref(), Some("fresh"));
    }

    #[test]
    fn test_delete_removes_key() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("origin.json"));
        storage.set("token", "abc").unwrap();
        storage.set("refreshToken", "def").unwrap();

        assert!(storage.delete("token").unwrap());
        assert_eq!(storage.get("token").unwrap(), None);
        assert_eq!(storage.get("refreshToken").unwrap().as_deref(), Some("def"));
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let storage_dir = dir.path().join("storage");
        let path = storage_dir.join("origin.json");
        let storage = FileStorage::new(&path);

        storage.set("refreshToken", "secret").unwrap();

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
        let dir_mode = std::fs::metadata(&storage_dir).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o077, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_temp_file_does_not_leak_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("origin.json");
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, "leftover").unwrap();
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o644)).unwrap();

        FileStorage::new(&path).set("token", "abc").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }
}
