use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

use super::document::{UserDocument, UserRecord};

/// Store operation, carried in errors for context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    List,
    Get,
    Create,
    Update,
    Delete,
    Init,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreOp::List => "list users",
            StoreOp::Get => "get user",
            StoreOp::Create => "create user",
            StoreOp::Update => "update user",
            StoreOp::Delete => "delete user",
            StoreOp::Init => "initialize store",
        })
    }
}

/// Failures of the JSON document store. Messages never include file paths.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{op} failed: user {id} not found")]
    NotFound { op: StoreOp, id: u64 },

    #[error("{op} failed: storage i/o error")]
    Io {
        op: StoreOp,
        #[source]
        source: io::Error,
    },

    #[error("{op} failed: stored document is malformed")]
    Decode {
        op: StoreOp,
        #[source]
        source: serde_json::Error,
    },

    #[error("{op} failed: no user ids left")]
    IdSpaceExhausted { op: StoreOp },

    #[error("{op} failed: document could not be encoded")]
    Encode {
        op: StoreOp,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn op(&self) -> StoreOp {
        match self {
            StoreError::NotFound { op, .. }
            | StoreError::Io { op, .. }
            | StoreError::Decode { op, .. }
            | StoreError::IdSpaceExhausted { op }
            | StoreError::Encode { op, .. } => *op,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type Clock = fn() -> DateTime<Utc>;

/// File-backed users collection.
///
/// Every mutation is a whole-document read → modify → write cycle under
/// `write_lock`. Writes go to a temp file in the same directory that is then
/// renamed over the target, so lock-free readers only ever see a complete
/// document. The lock is per instance; a second process writing the same
/// file is not supported.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    clock: Clock,
}

impl fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Utc::now)
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Clock) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the empty document if the file does not exist yet.
    pub fn ensure_document(&self) -> Result<(), StoreError> {
        let guard = self.write_lock.lock();
        self.load_or_init(StoreOp::Init, &guard).map(|_| ())
    }

    /// Full document snapshot. Does not create a missing file.
    pub fn list(&self) -> Result<UserDocument, StoreError> {
        match read_document(&self.path, StoreOp::List)? {
            Some(doc) => Ok(doc),
            None => Err(StoreError::Io {
                op: StoreOp::List,
                source: io::Error::from(io::ErrorKind::NotFound),
            }),
        }
    }

    pub fn get(&self, id: u64) -> Result<UserRecord, StoreError> {
        let doc = match read_document(&self.path, StoreOp::Get)? {
            Some(doc) => doc,
            None => {
                let guard = self.write_lock.lock();
                self.load_or_init(StoreOp::Get, &guard)?
            }
        };
        doc.get(id)
            .cloned()
            .ok_or(StoreError::NotFound { op: StoreOp::Get, id })
    }

    pub fn create(&self, display_name: &str, email: &str) -> Result<UserRecord, StoreError> {
        let guard = self.write_lock.lock();
        let mut doc = self.load_or_init(StoreOp::Create, &guard)?;

        let record = doc
            .insert_new(display_name, email, (self.clock)())
            .ok_or(StoreError::IdSpaceExhausted { op: StoreOp::Create })?;
        self.persist(&doc, StoreOp::Create, &guard)?;

        info!(user_id = record.id, "user record created");
        Ok(record)
    }

    pub fn update(&self, id: u64, display_name: &str) -> Result<UserRecord, StoreError> {
        let guard = self.write_lock.lock();
        let mut doc = self.load_or_init(StoreOp::Update, &guard)?;

        let now = (self.clock)();
        let record = doc
            .get_mut(id)
            .ok_or(StoreError::NotFound { op: StoreOp::Update, id })?;
        record.display_name = display_name.to_owned();
        record.touch(now);
        let record = record.clone();

        self.persist(&doc, StoreOp::Update, &guard)?;

        info!(user_id = id, "user record updated");
        Ok(record)
    }

    pub fn delete(&self, id: u64) -> Result<(), StoreError> {
        let guard = self.write_lock.lock();
        let mut doc = self.load_or_init(StoreOp::Delete, &guard)?;

        if doc.remove(id).is_none() {
            return Err(StoreError::NotFound { op: StoreOp::Delete, id });
        }
        self.persist(&doc, StoreOp::Delete, &guard)?;

        info!(user_id = id, "user record deleted");
        Ok(())
    }

    // Caller must hold `write_lock`; the guard parameter proves it.
    fn load_or_init(
        &self,
        op: StoreOp,
        guard: &MutexGuard<'_, ()>,
    ) -> Result<UserDocument, StoreError> {
        if let Some(doc) = read_document(&self.path, op)? {
            return Ok(doc);
        }

        info!(path = %self.path.display(), "users document missing, initializing");
        let doc = UserDocument::default();
        self.persist(&doc, op, guard)?;
        Ok(doc)
    }

    fn persist(
        &self,
        doc: &UserDocument,
        op: StoreOp,
        _guard: &MutexGuard<'_, ()>,
    ) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec_pretty(doc).map_err(|source| StoreError::Encode { op, source })?;
        write_atomically(&self.path, &bytes).map_err(|source| StoreError::Io { op, source })?;
        debug!(
            path = %self.path.display(),
            records = doc.len(),
            increment = doc.increment,
            "users document written"
        );
        Ok(())
    }
}

/// `Ok(None)` only when the file does not exist; any other failure is an error.
fn read_document(path: &Path, op: StoreOp) -> Result<Option<UserDocument>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(StoreError::Io { op, source }),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Decode { op, source })
}

fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
