//! Credential decoding.
//!
//! Each browser stores its local storage values inside a small envelope:
//! - Firefox (SQLite): the JSON-encoded string, i.e. one quote on each side.
//! - Chromium (LevelDB): one encoding byte, then the JSON-encoded string.
//!
//! Stripping is done on characters, not bytes, so a multi-byte character
//! can never be split.

use super::store::RawEntries;
use std::fmt;

/// Leading characters of a Firefox value (`"`).
pub const SQLITE_PREFIX_LEN: usize = 1;
/// Trailing characters of a Firefox value (`"`).
pub const SQLITE_SUFFIX_LEN: usize = 1;
/// Leading characters of a Chromium value (encoding byte + `"`).
pub const LEVELDB_PREFIX_LEN: usize = 2;
/// Trailing characters of a Chromium value (`"`).
pub const LEVELDB_SUFFIX_LEN: usize = 1;

/// On-disk format a credential was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    /// Row-store (Firefox `data.sqlite`).
    Sqlite,
    /// Log-structured store (Chromium `Local Storage/leveldb`).
    LevelDb,
}

impl StoreFormat {
    /// Envelope size as `(prefix, suffix)` in characters.
    pub fn envelope(self) -> (usize, usize) {
        match self {
            Self::Sqlite => (SQLITE_PREFIX_LEN, SQLITE_SUFFIX_LEN),
            Self::LevelDb => (LEVELDB_PREFIX_LEN, LEVELDB_SUFFIX_LEN),
        }
    }

    /// Decode a raw value into a plain string.
    ///
    /// Returns `None` for invalid UTF-8 or a value too short to carry the
    /// envelope. Malformed values mean "no session", never an error.
    pub fn decode(self, raw: &[u8]) -> Option<String> {
        let text = std::str::from_utf8(raw).ok()?;
        let (prefix, suffix) = self.envelope();
        let len = text.chars().count();
        if len < prefix + suffix {
            return None;
        }
        Some(text.chars().skip(prefix).take(len - prefix - suffix).collect())
    }
}

/// An active session found in a browser profile.
///
/// Equality covers all three fields, so the same account found in two
/// different browsers is kept twice.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Credential {
    pub email: String,
    pub token: String,
    /// Where the credential came from (e.g. "Firefox")
    pub source: String,
}

impl Credential {
    pub fn new(email: impl Into<String>, token: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            token: token.into(),
            source: source.into(),
        }
    }

    /// Label shown when picking an account.
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.email, self.source)
    }
}

// Keep tokens out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Turn the raw store values into a credential.
///
/// Both keys must be present and both decoded values non-empty.
pub fn extract_credential(raw: &RawEntries, format: StoreFormat, source: &str) -> Option<Credential> {
    let email = format.decode(raw.email.as_deref()?)?;
    let token = format.decode(raw.token.as_deref()?)?;
    if email.is_empty() || token.is_empty() {
        return None;
    }
    Some(Credential::new(email, token, source))
}
