use std::{io::Write, path::PathBuf};

use serde::{de::DeserializeOwned, Serialize};

/// Flat key-value space. Keys are namespaced by the caller (`meta_`, `chunk_`, ...).
pub trait StorageManager: Send + Sync {
    fn write(&self, key: &str, data: &[u8]) -> std::io::Result<()>;
    fn read(&self, key: &str) -> std::io::Result<Vec<u8>>;
    fn exists(&self, key: &str) -> bool;
    fn delete(&self, key: &str) -> std::io::Result<()>;
    fn list(&self) -> Vec<String>;
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("io error on key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record at key {key}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read and decode a JSON record. A missing key is `Ok(None)`.
pub fn read_json<T: DeserializeOwned>(
    store: &dyn StorageManager,
    key: &str,
) -> Result<Option<T>, StoreError> {
    if !store.exists(key) {
        return Ok(None);
    }

    let bytes = match store.read(key) {
        Ok(bytes) => bytes,
        // deleted between exists() and read()
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                key: key.to_string(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Json {
            key: key.to_string(),
            source,
        })
}

pub fn write_json<T: Serialize>(
    store: &dyn StorageManager,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(value).map_err(|source| StoreError::Json {
        key: key.to_string(),
        source,
    })?;

    store.write(key, &bytes).map_err(|source| StoreError::Io {
        key: key.to_string(),
        source,
    })
}

pub fn delete_key(store: &dyn StorageManager, key: &str) -> Result<(), StoreError> {
    match store.delete(key) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::Io {
            key: key.to_string(),
            source,
        }),
    }
}

/// One file per key under `base_dir`.
#[derive(Clone)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(storage_dir: &str) -> std::io::Result<Self> {
        let path = PathBuf::from(storage_dir);
        std::fs::create_dir_all(&path)?;
        Ok(BackendLocal { base_dir: path })
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }
}

impl StorageManager for BackendLocal {
    fn exists(&self, key: &str) -> bool {
        std::fs::metadata(self.path_of(key)).is_ok()
    }

    fn read(&self, key: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path_of(key))
    }

    fn write(&self, key: &str, data: &[u8]) -> std::io::Result<()> {
        // temp file in the same directory so the rename stays atomic
        let mut temp = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(&self.base_dir)?;
        temp.write_all(data)?;
        temp.persist(self.path_of(key)).map_err(|err| err.error)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.path_of(key))
    }

    fn list(&self) -> Vec<String> {
        std::fs::read_dir(&self.base_dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter_map(|entry| {
                        let path = entry.path();
                        if path.is_file() {
                            path.file_name()
                                .and_then(|name| name.to_str())
                                .filter(|name| !name.starts_with(".tmp-"))
                                .map(|s| s.to_string())
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub use memory::BackendMemory;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_backend_roundtrip_and_list() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(tmp.path().to_str().unwrap()).unwrap();

        store.write("meta_abc", b"{}").unwrap();
        store.write("chunk_abc_0", b"{}").unwrap();
        store.write("meta_abc", b"{\"title\":\"x\"}").unwrap();

        assert!(store.exists("meta_abc"));
        assert_eq!(store.read("meta_abc").unwrap(), b"{\"title\":\"x\"}");

        let mut keys = store.list();
        keys.sort();
        assert_eq!(keys, vec!["chunk_abc_0".to_string(), "meta_abc".to_string()]);

        store.delete("chunk_abc_0").unwrap();
        assert!(!store.exists("chunk_abc_0"));
    }

    #[test]
    fn test_read_json_missing_key_is_none() {
        let store = BackendMemory::new();
        let value: Option<Vec<String>> = read_json(&store, "urlIndex").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_read_json_malformed_is_error() {
        let store = BackendMemory::new();
        store.write("urlIndex", b"not json").unwrap();
        let result: Result<Option<Vec<String>>, _> = read_json(&store, "urlIndex");
        assert!(matches!(result, Err(StoreError::Json { .. })));
    }

    #[test]
    fn test_delete_missing_key_is_ok() {
        let store = BackendMemory::new();
        assert!(delete_key(&store, "chunk_nope_0").is_ok());
    }
}
