use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// A local key/value store of text values.
///
/// Keys are `/`-separated paths such as `flicksy3/slot0`.
pub trait StorageBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    /// Store `value` under `key`, replacing any prior value.
    fn write(&mut self, key: &str, value: &str) -> io::Result<()>;

    /// Remove `key`. Returns false if it did not exist.
    fn remove(&mut self, key: &str) -> io::Result<bool>;

    /// All keys, in ascending order.
    fn keys(&self) -> io::Result<Vec<String>>;
}

/// In-memory backend, for tests and throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: BTreeMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> io::Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// Directory-backed store: one `<key>.json` file per key.
///
/// Layout:
/// ```text
/// <root>/
///   flicksy3/
///     slot0.json
///     slot1.json
/// ```
/// Writes land in a `.tmp` sibling first and are renamed into place.
#[derive(Debug, Clone)]
pub struct DirBackend {
    root: PathBuf,
}

impl DirBackend {
    /// Open (creating if needed) a store rooted at `path`.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        let invalid = || {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key {key:?}"),
            )
        };
        let segments: Vec<&str> = key.split('/').collect();
        let Some((last, dirs)) = segments.split_last() else {
            return Err(invalid());
        };
        let mut path = self.root.clone();
        for segment in &segments {
            if segment.is_empty()
                || *segment == "."
                || *segment == ".."
                || segment.contains(|c: char| c == '\\' || c == ':')
            {
                return Err(invalid());
            }
        }
        for dir in dirs {
            path.push(dir);
        }
        path.push(format!("{last}.json"));
        Ok(path)
    }

    fn collect_keys(dir: &Path, prefix: &str, keys: &mut Vec<String>) -> io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if entry.file_type()?.is_dir() {
                Self::collect_keys(&path, &format!("{prefix}{name}/"), keys)?;
            } else if let Some(stem) = name.strip_suffix(".json") {
                keys.push(format!("{prefix}{stem}"));
            }
        }
        Ok(())
    }
}

impl StorageBackend for DirBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)?) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!(path = %path.display(), bytes = value.len(), "slot written");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<bool> {
        match std::fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn keys(&self) -> io::Result<Vec<String>> {
        let mut keys = Vec::new();
        Self::collect_keys(&self.root, "", &mut keys)?;
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(backend: &mut impl StorageBackend) {
        assert_eq!(backend.read("fam/a").unwrap(), None);
        backend.write("fam/a", "one").unwrap();
        backend.write("fam/b", "two").unwrap();
        backend.write("other/a", "three").unwrap();
        backend.write("fam/a", "uno").unwrap();

        assert_eq!(backend.read("fam/a").unwrap().as_deref(), Some("uno"));
        assert_eq!(
            backend.keys().unwrap(),
            vec!["fam/a".to_string(), "fam/b".into(), "other/a".into()]
        );
        assert!(backend.remove("fam/b").unwrap());
        assert!(!backend.remove("fam/b").unwrap());
        assert_eq!(backend.read("fam/b").unwrap(), None);
    }

    #[test]
    fn memory_backend_basics() {
        exercise(&mut MemoryBackend::new());
    }

    #[test]
    fn dir_backend_basics() {
        let tmp = tempfile::tempdir().unwrap();
        let mut backend = DirBackend::open(tmp.path().join("store")).unwrap();
        exercise(&mut backend);
        assert!(backend.root().join("fam").join("a.json").is_file());
    }

    #[test]
    fn dir_backend_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut backend = DirBackend::open(tmp.path()).unwrap();
        backend.write("fam/slot0", "{}").unwrap();
        let names: Vec<_> = std::fs::read_dir(tmp.path().join("fam"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("slot0.json")]);
    }

    #[test]
    fn dir_backend_rejects_escaping_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let mut backend = DirBackend::open(tmp.path()).unwrap();
        for key in ["../x", "fam//x", "", "fam/..", "c:/x"] {
            let err = backend.write(key, "{}").unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "key {key:?}");
        }
    }

    #[test]
    fn dir_backend_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut backend = DirBackend::open(tmp.path()).unwrap();
            backend.write("fam/slot0", "saved").unwrap();
        }
        let backend = DirBackend::open(tmp.path()).unwrap();
        assert_eq!(backend.read("fam/slot0").unwrap().as_deref(), Some("saved"));
    }
}
