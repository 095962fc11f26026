//! Key-value blob backends the contact store persists into.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BlobError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        BlobError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Key-value substrate. A write replaces the whole value for its key.
pub trait BlobStore {
    fn read(&self, key: &str) -> Result<Option<String>, BlobError>;

    fn write(&mut self, key: &str, value: &str) -> Result<(), BlobError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    File,
}

#[derive(Debug, Error)]
#[error("invalid backend '{0}', expected one of: sqlite, file")]
pub struct UnknownBackend(String);

impl FromStr for Backend {
    type Err = UnknownBackend;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "file" => Ok(Backend::File),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

pub fn open_backend(backend: Backend, path: &Path) -> Result<Box<dyn BlobStore>, BlobError> {
    match backend {
        Backend::Sqlite => Ok(Box::new(SqliteBlobStore::open(path)?)),
        Backend::File => Ok(Box::new(FileBlobStore::new(path))),
    }
}

// =============================================================================
// SQLite
// =============================================================================

pub struct SqliteBlobStore {
    conn: Connection,
}

impl SqliteBlobStore {
    pub fn open(path: &Path) -> Result<Self, BlobError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| BlobError::io("failed to create directory", parent, e))?;
        }
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.setup()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, BlobError> {
        let mut store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.setup()?;
        Ok(store)
    }

    fn setup(&mut self) -> Result<(), BlobError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "FULL")?;
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS blobs (
              key   TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }
}

impl BlobStore for SqliteBlobStore {
    fn read(&self, key: &str) -> Result<Option<String>, BlobError> {
        let value = self
            .conn
            .query_row("SELECT value FROM blobs WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), BlobError> {
        self.conn.execute(
            r#"
            INSERT INTO blobs (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
            params![key, value],
        )?;
        Ok(())
    }
}

// =============================================================================
// Files
// =============================================================================

/// One `<key>.json` file per key inside `dir`.
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, key: &str) -> Result<Option<String>, BlobError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BlobError::io("failed to read", &path, e)),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), BlobError> {
        write_atomic(&self.path_for(key), value.as_bytes())
    }
}

pub fn write_atomic(target: &Path, data: &[u8]) -> Result<(), BlobError> {
    use std::fs::OpenOptions;
    use std::io::Write;

    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|e| BlobError::io("failed to create directory", parent, e))?;

    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("contacthub");

    let mut counter: u32 = 0;
    let temp_path = loop {
        let candidate = if counter == 0 {
            parent.join(format!(".{file_name}.tmp"))
        } else {
            parent.join(format!(".{file_name}.{counter}.tmp"))
        };
        if !candidate.exists() {
            break candidate;
        }
        counter += 1;
    };

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|e| BlobError::io("failed to create temporary file", &temp_path, e))?;

        file.write_all(data)
            .map_err(|e| BlobError::io("failed to write temporary file", &temp_path, e))?;
        file.sync_all()
            .map_err(|e| BlobError::io("failed to sync temporary file", &temp_path, e))?;
    }

    if let Err(e) = fs::rename(&temp_path, target) {
        let _ = fs::remove_file(&temp_path);
        return Err(BlobError::io("failed to replace", target, e));
    }

    if let Ok(dir_file) = fs::File::open(parent) {
        let _ = dir_file.sync_all();
    }

    Ok(())
}

// =============================================================================
// Memory (tests)
// =============================================================================

#[cfg(test)]
pub use memory::MemoryBlobStore;
