use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub type CacheMap = BTreeMap<String, String>;

/// Flat string-to-string JSON files kept under one directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Returns `Ok(None)` when the file does not exist. A file that exists but
    /// cannot be read or parsed is an error.
    pub fn load(&self, key: &str) -> Result<Option<CacheMap>> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        let parsed: CacheMap = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse cache file {}", path.display()))?;
        Ok(Some(parsed))
    }

    /// Like [`CacheStore::load`] but treats a missing file as an empty map.
    pub fn load_or_default(&self, key: &str) -> Result<CacheMap> {
        Ok(self.load(key)?.unwrap_or_default())
    }

    pub fn save(&self, key: &str, map: &CacheMap) -> Result<()> {
        let path = self.path_for(key);
        if !self.dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.dir)
                .with_context(|| format!("failed to create {}", self.dir.display()))?;
        }
        let rendered =
            serde_json::to_string_pretty(map).context("failed to serialize cache JSON")?;

        let temp_path = self.path_for(&format!(".{key}.tmp"));
        fs::write(&temp_path, rendered)
            .with_context(|| format!("failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &path).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                temp_path.display(),
                path.display()
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{CacheMap, CacheStore};

    #[test]
    fn load_reports_missing_file_as_none() {
        let temp = tempdir().expect("tempdir");
        let store = CacheStore::new(temp.path());
        assert!(store.load("absent.json").expect("load").is_none());
        assert!(store.load_or_default("absent.json").expect("load").is_empty());
    }

    #[test]
    fn save_then_load_preserves_entries() {
        let temp = tempdir().expect("tempdir");
        let store = CacheStore::new(temp.path().join("nested"));
        let mut map = CacheMap::new();
        map.insert("3001".to_string(), "771344".to_string());
        map.insert("3020".to_string(), "394584".to_string());

        store.save("parts.json", &map).expect("save");
        let loaded = store.load("parts.json").expect("load").expect("present");
        assert_eq!(loaded, map);
        assert!(!store.path_for(".parts.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let store = CacheStore::new(temp.path());
        fs::write(store.path_for("colors.json"), "{\"red\": ").expect("write");

        let error = store.load("colors.json").expect_err("must fail");
        assert!(error.to_string().contains("failed to parse cache file"));
    }

    #[test]
    fn non_string_values_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let store = CacheStore::new(temp.path());
        fs::write(store.path_for("colors.json"), "{\"red\": 5}").expect("write");
        assert!(store.load("colors.json").is_err());
    }
}
