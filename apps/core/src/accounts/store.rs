//! Raw readers for browser local storage.
//!
//! Both readers only look up the two keys Discord keeps its session in and
//! return the values untouched. A missing key is not an error.
//!
//! Profile files are never written. SQLite is opened read-only; a LevelDB
//! store is copied to a temp dir and the copy is opened.

use rusqlite::{types::ValueRef, ErrorCode, OpenFlags};
use rusty_leveldb::{Options, Status, StatusCode, DB};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

/// Local storage key holding the account email.
pub const EMAIL_KEY: &str = "email_cache";
/// Local storage key holding the session token.
pub const TOKEN_KEY: &str = "token";

/// Chromium LevelDB keys: origin, NUL, Latin-1 marker, then the key.
pub const LEVELDB_EMAIL_KEY: &[u8] = b"_https://discordapp.com\x00\x01email_cache";
pub const LEVELDB_TOKEN_KEY: &[u8] = b"_https://discordapp.com\x00\x01token";

/// Values found for the two session keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntries {
    pub email: Option<Vec<u8>>,
    pub token: Option<Vec<u8>>,
}

/// Failure to read one profile's store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is held by a running browser.
    #[error("database is locked: {}", path.display())]
    Locked { path: PathBuf },

    /// Missing, corrupt or not the expected schema.
    #[error("cannot read database {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
}

impl StoreError {
    fn unreadable(path: &Path, reason: impl ToString) -> Self {
        Self::Unreadable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    fn from_sqlite(path: &Path, err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::Locked {
                path: path.to_path_buf(),
            },
            _ => Self::unreadable(path, err),
        }
    }

    fn from_leveldb(path: &Path, status: Status) -> Self {
        match status.code {
            StatusCode::LockError => Self::Locked {
                path: path.to_path_buf(),
            },
            _ => Self::unreadable(path, status),
        }
    }
}

/// Read the session keys from a Firefox `data.sqlite` file.
pub fn read_sqlite_store(path: &Path) -> Result<RawEntries, StoreError> {
    if !path.is_file() {
        return Err(StoreError::unreadable(path, "file not found"));
    }

    let db = rusqlite::Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| StoreError::from_sqlite(path, e))?;
    // Report a locked profile at once instead of waiting on it
    db.busy_timeout(Duration::ZERO)
        .map_err(|e| StoreError::from_sqlite(path, e))?;

    let mut stmt = db
        .prepare("SELECT key, value FROM data WHERE key = ?1 OR key = ?2")
        .map_err(|e| StoreError::from_sqlite(path, e))?;

    let rows = stmt
        .query_map([EMAIL_KEY, TOKEN_KEY], |row| {
            let key: String = row.get(0)?;
            // Firefox writes BLOBs, older profiles may hold TEXT
            let value = match row.get_ref(1)? {
                ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Some(bytes.to_vec()),
                _ => None,
            };
            Ok((key, value))
        })
        .map_err(|e| StoreError::from_sqlite(path, e))?;

    let mut entries = RawEntries::default();
    for row in rows {
        let (key, value) = row.map_err(|e| StoreError::from_sqlite(path, e))?;
        match key.as_str() {
            EMAIL_KEY => entries.email = value,
            TOKEN_KEY => entries.token = value,
            _ => {}
        }
    }

    Ok(entries)
}

/// File a running LevelDB owner keeps locked.
const LEVELDB_LOCK_FILE: &str = "LOCK";

/// Read the session keys from a Chromium `Local Storage/leveldb` directory.
///
/// Fails with [`StoreError::Locked`] while a browser holds the store.
pub fn read_leveldb_store(path: &Path) -> Result<RawEntries, StoreError> {
    if !path.is_dir() {
        return Err(StoreError::unreadable(path, "directory not found"));
    }

    let lock_path = path.join(LEVELDB_LOCK_FILE);
    match lock::is_held(&lock_path) {
        Ok(true) => {
            return Err(StoreError::Locked {
                path: path.to_path_buf(),
            })
        }
        Ok(false) => {}
        Err(e) => return Err(StoreError::unreadable(path, e)),
    }

    let snapshot = snapshot_leveldb(path)?;
    debug!(
        "Reading copy of {} from {}",
        path.display(),
        snapshot.path().display()
    );

    let mut options = Options::default();
    options.create_if_missing = false;
    let mut db =
        DB::open(snapshot.path(), options).map_err(|s| StoreError::from_leveldb(path, s))?;

    Ok(RawEntries {
        email: db.get(LEVELDB_EMAIL_KEY),
        token: db.get(LEVELDB_TOKEN_KEY),
    })
}

/// Copy the store's files, minus its lock, into a fresh temp dir.
fn snapshot_leveldb(path: &Path) -> Result<TempDir, StoreError> {
    let snapshot = TempDir::new().map_err(|e| StoreError::unreadable(path, e))?;
    let entries = std::fs::read_dir(path).map_err(|e| StoreError::unreadable(path, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| StoreError::unreadable(path, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| StoreError::unreadable(path, e))?
            .is_file();
        if !is_file || entry.file_name() == *LEVELDB_LOCK_FILE {
            continue;
        }
        std::fs::copy(entry.path(), snapshot.path().join(entry.file_name()))
            .map_err(|e| StoreError::unreadable(path, e))?;
    }

    Ok(snapshot)
}

/// Detection of POSIX record locks, the kind LevelDB takes on `LOCK`.
#[cfg(target_os = "linux")]
mod lock {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    /// Whether any other owner holds a lock on `path`.
    ///
    /// Uses an open file description query, so locks taken by this
    /// process through other descriptors count too.
    pub fn is_held(path: &Path) -> io::Result<bool> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        // SAFETY: `flock` is plain old data; all-zero is a valid value and
        // means "whole file" for start and length.
        let mut query: libc::flock = unsafe { std::mem::zeroed() };
        query.l_type = libc::F_WRLCK as libc::c_short;
        query.l_whence = libc::SEEK_SET as libc::c_short;

        // SAFETY: the descriptor is open for the duration of the call and
        // `query` is a valid, exclusively borrowed `flock`.
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_OFD_GETLK, &mut query) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(query.l_type != libc::F_UNLCK as libc::c_short)
    }
}

#[cfg(not(target_os = "linux"))]
mod lock {
    use std::io;
    use std::path::Path;

    pub fn is_held(_path: &Path) -> io::Result<bool> {
        Ok(false)
    }
}
