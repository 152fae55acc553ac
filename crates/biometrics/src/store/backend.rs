//! Raw record persistence under the secure store.
//!
//! Backends move opaque envelope bytes; sealing and policy checks happen one
//! layer up in [`super::EncryptedStore`].

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use biokey_crypto::SealingKey;
use tracing::{info, warn};

use crate::error::{BiometricsError, BiometricsResult};

/// File holding the device sealing key inside a store directory.
const SEALING_KEY_FILE: &str = "device.key";

const RECORD_EXTENSION: &str = "record";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Byte-level record storage keyed by record name.
pub trait RecordBackend: Send + Sync {
    /// Write `bytes` under `name`, replacing any existing value.
    fn put(&self, name: &str, bytes: &[u8]) -> BiometricsResult<()>;

    fn get(&self, name: &str) -> BiometricsResult<Option<Vec<u8>>>;

    /// Remove `name`. Returns whether anything was removed.
    fn remove(&self, name: &str) -> BiometricsResult<bool>;

    fn exists(&self, name: &str) -> BiometricsResult<bool>;
}

/// Process-lifetime backend; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordBackend for MemoryBackend {
    fn put(&self, name: &str, bytes: &[u8]) -> BiometricsResult<()> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, name: &str) -> BiometricsResult<Option<Vec<u8>>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned())
    }

    fn remove(&self, name: &str) -> BiometricsResult<bool> {
        Ok(self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some())
    }

    fn exists(&self, name: &str) -> BiometricsResult<bool> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name))
    }
}

/// One file per record in a device-local directory.
///
/// Record names are hex-encoded into file names. Writes land in a temporary
/// file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) a store directory.
    pub fn open(dir: impl AsRef<Path>) -> BiometricsResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", hex::encode(name.as_bytes()), RECORD_EXTENSION))
    }

    /// Scratch path unique to this process and call.
    fn temp_path(&self, stem: &str) -> PathBuf {
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!("{stem}.{}.{seq}.tmp", std::process::id()))
    }

    /// Load the device sealing key, generating and persisting one on first use.
    pub fn load_or_create_sealing_key(&self) -> BiometricsResult<SealingKey> {
        let path = self.dir.join(SEALING_KEY_FILE);
        match fs::read(&path) {
            Ok(raw) => {
                let raw = zeroize::Zeroizing::new(raw);
                Ok(SealingKey::from_bytes(&raw)?)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.create_sealing_key(&path),
            Err(e) => Err(e.into()),
        }
    }

    /// Publish a fresh key without replacing one that appeared concurrently.
    ///
    /// The key is written in full to a scratch file and hard-linked into
    /// place; the link fails if `path` exists, in which case the winner's key
    /// is read back.
    fn create_sealing_key(&self, path: &Path) -> BiometricsResult<SealingKey> {
        let key = SealingKey::generate()?;
        let tmp = self.temp_path(SEALING_KEY_FILE);
        write_private(&tmp, key.as_bytes())?;

        let linked = fs::hard_link(&tmp, path);
        if let Err(cleanup) = fs::remove_file(&tmp) {
            warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temporary key file");
        }

        match linked {
            Ok(()) => {
                info!(path = %path.display(), "Generated device sealing key");
                Ok(key)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let raw = zeroize::Zeroizing::new(fs::read(path)?);
                Ok(SealingKey::from_bytes(&raw)?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl RecordBackend for FileBackend {
    fn put(&self, name: &str, bytes: &[u8]) -> BiometricsResult<()> {
        let path = self.record_path(name);
        let tmp = self.temp_path(&hex::encode(name.as_bytes()));
        write_private(&tmp, bytes)?;
        fs::rename(&tmp, &path).map_err(|e| {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temporary record");
            }
            BiometricsError::Store(format!("failed to commit record '{name}': {e}"))
        })
    }

    fn get(&self, name: &str) -> BiometricsResult<Option<Vec<u8>>> {
        match fs::read(self.record_path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, name: &str) -> BiometricsResult<bool> {
        match fs::remove_file(self.record_path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> BiometricsResult<bool> {
        Ok(self.record_path(name).try_exists()?)
    }
}

/// Write a file readable only by the owning user.
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_basics() {
        let backend = MemoryBackend::new();
        assert!(backend.is_empty());
        backend.put("a", b"1").unwrap();
        assert_eq!(backend.get("a").unwrap().unwrap(), b"1");
        assert!(backend.exists("a").unwrap());
        assert!(backend.remove("a").unwrap());
        assert!(!backend.remove("a").unwrap());
        assert!(backend.get("a").unwrap().is_none());
    }

    #[test]
    fn test_file_backend_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend.put("privateKey", b"envelope").unwrap();
        }
        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.get("privateKey").unwrap().unwrap(), b"envelope");
        assert!(backend.exists("privateKey").unwrap());
    }

    #[test]
    fn test_file_backend_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert!(backend.get("publicKey").unwrap().is_none());
        assert!(!backend.remove("publicKey").unwrap());
        assert!(!backend.exists("publicKey").unwrap());
    }

    #[test]
    fn test_record_names_are_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.put("../escape", b"x").unwrap();
        assert!(backend.exists("../escape").unwrap());
        assert!(!dir.path().parent().unwrap().join("escape").exists());
    }

    #[test]
    fn test_sealing_key_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        let first = backend.load_or_create_sealing_key().unwrap();
        let second = backend.load_or_create_sealing_key().unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn test_sealing_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.load_or_create_sealing_key().unwrap();
        let mode = fs::metadata(dir.path().join(SEALING_KEY_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_concurrent_first_opens_agree_on_sealing_key() {
        let dir = tempfile::tempdir().unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    let backend = FileBackend::open(&path).unwrap();
                    backend.load_or_create_sealing_key().unwrap().as_bytes().to_vec()
                })
            })
            .collect();
        let keys: Vec<Vec<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let on_disk = fs::read(dir.path().join(SEALING_KEY_FILE)).unwrap();
        for key in &keys {
            assert_eq!(key, &on_disk);
        }
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_corrupt_sealing_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SEALING_KEY_FILE), b"short").unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert!(backend.load_or_create_sealing_key().is_err());
    }
}
