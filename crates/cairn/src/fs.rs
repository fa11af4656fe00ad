//! File-system abstraction used by the store.
//!
//! The store only needs five primitives. [`TokioFileSystem`] maps them onto
//! `tokio::fs`; [`MemoryFileSystem`] keeps everything in process memory, which
//! suits volatile stores and failure-injection tests.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

use async_trait::async_trait;
use tokio::fs as tokio_fs;

/// Asynchronous file-system operations the store relies on.
#[async_trait]
pub trait FileSystem: fmt::Debug + Send + Sync {
    /// Reads a whole file as UTF-8.
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Creates or truncates a file and writes `contents` to it.
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Creates a directory and all missing parents.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Removes a directory and everything below it.
    async fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The real file system, through `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFileSystem;

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> { tokio_fs::read_to_string(path).await }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> { tokio_fs::write(path, contents).await }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> { tokio_fs::create_dir_all(path).await }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> { tokio_fs::remove_dir_all(path).await }
}

/// An in-memory file system.
///
/// Directories must exist before files are written into them, mirroring the
/// behaviour of a real disk. Writes can be switched off with
/// [`MemoryFileSystem::set_read_only`].
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    dirs:      Mutex<BTreeSet<PathBuf>>,
    files:     Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    read_only: AtomicBool,
}

impl MemoryFileSystem {
    pub fn new() -> Self { Self::default() }

    /// When enabled, every mutating operation fails with `PermissionDenied`.
    pub fn set_read_only(&self, read_only: bool) { self.read_only.store(read_only, Ordering::SeqCst); }

    /// Names of all files currently held, for inspection.
    pub fn files(&self) -> Vec<PathBuf> { lock(&self.files).keys().cloned().collect() }

    fn check_writable(&self, path: &Path) -> io::Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is on a read-only file system", path.display()),
            ));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = lock(&self.files)
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.check_writable(path)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) &&
            !lock(&self.dirs).contains(parent)
        {
            return Err(not_found(parent));
        }
        lock(&self.files).insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.check_writable(path)?;
        let mut dirs = lock(&self.dirs);
        for ancestor in path.ancestors().filter(|p| !p.as_os_str().is_empty()) {
            dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.check_writable(path)?;
        let mut dirs = lock(&self.dirs);
        if !dirs.contains(path) {
            return Err(not_found(path));
        }
        dirs.retain(|dir| !dir.starts_with(path));
        lock(&self.files).retain(|file, _| !file.starts_with(path));
        Ok(())
    }
}
