//! JSON file store.
//!
//! The whole document lives in one JSON file, and the file is the only
//! copy of the state. Every access takes an advisory lock on a sibling
//! `<file>.lock`: shared for reads, exclusive for mutations. A mutation
//! reloads the document under the exclusive lock, applies the change,
//! writes it to a temporary file in the same directory and renames it over
//! the original. Two handles on one path, in one process or several,
//! therefore serialize their compare-and-set and never lose a write.

use crate::config::StoreConfig;
use crate::document::Document;
use crate::error::StoreError;
use crate::store::{GoldenStore, TraceStore};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use vigil_core::{CallRecord, ExecutionId, GoldenKey, TraceId, VigilResult};
use vigil_integrity::GoldenReference;

/// Store backed by a JSON document on disk
#[derive(Debug)]
pub struct FileStore {
    config: StoreConfig,
}

impl FileStore {
    /// Open the store at `config.path`; a missing file is an empty store
    ///
    /// # Errors
    ///
    /// `Storage` if the file cannot be read, `Encoding` if it is malformed
    pub fn open(config: StoreConfig) -> VigilResult<Self> {
        let store = Self { config };
        let records = store.read(|doc| doc.list().len())?;
        tracing::debug!(path = %store.config.path.display(), records, "opened file store");
        Ok(store)
    }

    /// Store file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Sibling lock file guarding the store file
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .config
            .path
            .file_name()
            .map_or_else(|| OsString::from("store"), OsString::from);
        name.push(".lock");
        self.config.path.with_file_name(name)
    }

    fn open_lock(&self) -> Result<fd_lock::RwLock<File>, StoreError> {
        let path = self.lock_path();
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(store_dir(&self.config.path)).map_err(io_err)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(io_err)?;
        Ok(fd_lock::RwLock::new(file))
    }

    fn read<T>(&self, f: impl FnOnce(&Document) -> T) -> VigilResult<T> {
        if !self.config.path.exists() {
            return Ok(f(&Document::new()));
        }
        let lock = self.open_lock()?;
        let _shared = lock.read().map_err(|source| StoreError::Lock {
            path: self.lock_path(),
            source,
        })?;
        let doc = load(&self.config.path)?;
        Ok(f(&doc))
    }

    /// Reload under the exclusive lock, apply `f`, persist the result
    fn update<T>(&self, f: impl FnOnce(&mut Document) -> VigilResult<T>) -> VigilResult<T> {
        let mut lock = self.open_lock()?;
        let _exclusive = lock.write().map_err(|source| StoreError::Lock {
            path: self.lock_path(),
            source,
        })?;
        let mut doc = load(&self.config.path)?;
        let out = f(&mut doc)?;
        persist(&self.config, &doc)?;
        Ok(out)
    }
}

fn store_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn load(path: &Path) -> Result<Document, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

fn persist(config: &StoreConfig, doc: &Document) -> Result<(), StoreError> {
    let path = &config.path;
    let io_err = |source| StoreError::Io {
        path: path.clone(),
        source,
    };

    let dir = store_dir(path);
    fs::create_dir_all(&dir).map_err(io_err)?;

    let encoded = if config.pretty {
        serde_json::to_vec_pretty(doc)
    } else {
        serde_json::to_vec(doc)
    };
    let bytes = encoded.map_err(|source| StoreError::Malformed {
        path: path.clone(),
        source,
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(&bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|source| StoreError::Persist {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

impl TraceStore for FileStore {
    fn get(&self, trace_id: &TraceId) -> VigilResult<CallRecord> {
        self.read(|doc| doc.get(trace_id))?
    }

    fn list_by_execution(&self, execution_id: &ExecutionId) -> VigilResult<Vec<CallRecord>> {
        self.read(|doc| doc.list_by_execution(execution_id))?
    }

    fn put(&self, record: CallRecord) -> VigilResult<()> {
        tracing::debug!(trace_id = %record.trace_id, execution_id = %record.execution_id, "stored record");
        self.update(|doc| {
            doc.put(record);
            Ok(())
        })
    }

    fn delete(&self, trace_id: &TraceId) -> VigilResult<bool> {
        if !self.read(|doc| doc.get(trace_id).is_ok())? {
            return Ok(false);
        }
        self.update(|doc| Ok(doc.delete(trace_id)))
    }

    fn list(&self) -> VigilResult<Vec<CallRecord>> {
        self.read(Document::list)
    }

    fn list_executions(&self) -> VigilResult<Vec<ExecutionId>> {
        self.read(Document::list_executions)
    }
}

impl GoldenStore for FileStore {
    fn golden(&self, key: &GoldenKey) -> VigilResult<Option<GoldenReference>> {
        self.read(|doc| doc.golden(key))
    }

    fn goldens(&self) -> VigilResult<Vec<GoldenReference>> {
        self.read(Document::goldens)
    }

    fn insert_golden(
        &self,
        golden: GoldenReference,
        force: bool,
    ) -> VigilResult<Option<GoldenReference>> {
        self.update(|doc| doc.insert_golden(golden, force))
    }

    fn remove_golden(&self, key: &GoldenKey) -> VigilResult<GoldenReference> {
        self.update(|doc| doc.remove_golden(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::bless_trace;
    use vigil_core::{ErrorCode, NodeId, Request, Response, TokenUsage, Verdict};

    fn record(trace: &str) -> CallRecord {
        CallRecord::new(
            ExecutionId::from("exec"),
            NodeId::from(trace),
            Request::new("openai", "gpt-4o-mini"),
            Response::new("ok", 5, TokenUsage::new(1, 2)),
        )
        .with_trace_id(trace)
        .with_verdict(Verdict::pass())
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(StoreConfig::at(dir.path().join("absent.json"))).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        {
            let store = FileStore::open(StoreConfig::at(&path)).unwrap();
            store.put(record("b")).unwrap();
            store.put(record("a")).unwrap();
            bless_trace(&store, &TraceId::from("a"), false).unwrap();
        }
        let store = FileStore::open(StoreConfig::at(&path)).unwrap();
        let order: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|r| r.trace_id.into_inner())
            .collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(store.goldens().unwrap().len(), 1);
        assert!(store.get(&TraceId::from("a")).unwrap().is_golden);
    }

    #[test]
    fn test_rejected_update_leaves_disk_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(StoreConfig::at(&path)).unwrap();
        store.put(record("a")).unwrap();
        bless_trace(&store, &TraceId::from("a"), false).unwrap();
        let before = fs::read(&path).unwrap();

        let err = bless_trace(&store, &TraceId::from("a"), false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::GoldenAlreadyExists);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_malformed_file_is_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();
        let err = FileStore::open(StoreConfig::at(&path)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Encoding);
    }

    #[test]
    fn test_second_handle_sees_golden_and_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let first = FileStore::open(StoreConfig::at(&path)).unwrap();
        let second = FileStore::open(StoreConfig::at(&path)).unwrap();
        first.put(record("a")).unwrap();
        second.put(record("b")).unwrap();

        bless_trace(&first, &TraceId::from("a"), false).unwrap();
        let err = bless_trace(&second, &TraceId::from("b"), false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::GoldenAlreadyExists);

        let reopened = FileStore::open(StoreConfig::at(&path)).unwrap();
        let goldens = reopened.goldens().unwrap();
        assert_eq!(goldens.len(), 1);
        assert_eq!(goldens[0].trace_id, TraceId::from("a"));
    }

    #[test]
    fn test_puts_through_two_handles_both_land() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let first = FileStore::open(StoreConfig::at(&path)).unwrap();
        let second = FileStore::open(StoreConfig::at(&path)).unwrap();
        first.put(record("x")).unwrap();
        second.put(record("y")).unwrap();

        assert!(first.get(&TraceId::from("y")).is_ok());
        assert!(second.get(&TraceId::from("x")).is_ok());
        assert_eq!(first.list().unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_bless_from_separate_handles_has_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let seed = FileStore::open(StoreConfig::at(&path)).unwrap();
        for i in 0..6 {
            seed.put(record(&format!("t{i}"))).unwrap();
        }

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = FileStore::open(StoreConfig::at(&path)).unwrap();
                    bless_trace(&store, &TraceId::from(format!("t{i}")), false).is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(seed.goldens().unwrap().len(), 1);
        assert_eq!(seed.list().unwrap().len(), 6);
    }

    #[test]
    fn test_lock_file_sits_next_to_store() {
        let store = FileStore::open(StoreConfig::at("/tmp/vigil-unused/store.json")).unwrap();
        assert_eq!(store.lock_path(), PathBuf::from("/tmp/vigil-unused/store.json.lock"));
    }

    #[test]
    fn test_delete_absent_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(StoreConfig::at(&path)).unwrap();
        assert!(!store.delete(&TraceId::from("x")).unwrap());
        assert!(!path.exists());
    }
}
