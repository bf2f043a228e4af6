//! Accounts module - Find logged-in Discord sessions in browser profiles.
//!
//! Supported sources (Linux only):
//! - Firefox: `~/.mozilla/firefox/*/storage/default/https+++discord.com/ls/data.sqlite`
//! - Chromium: `~/.config/chromium/*/Local Storage/leveldb`
//!
//! Profiles are opened read-only. A profile that cannot be read (browser
//! running, corrupt store) is logged and skipped.

pub mod credential;
pub mod store;

pub use credential::{extract_credential, Credential, StoreFormat};
pub use store::{RawEntries, StoreError};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure to set up account discovery at all.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Host OS has no known profile layout.
    #[error("Your system is currently not supported ({0})")]
    UnsupportedSystem(String),

    /// No home directory to look for profiles in.
    #[error("Cannot determine the home directory")]
    NoHomeDirectory,
}

/// Browser families that keep Discord sessions in local storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    Firefox,
    Chromium,
}

impl BrowserFamily {
    /// All families, in scan order.
    pub const ALL: [BrowserFamily; 2] = [BrowserFamily::Firefox, BrowserFamily::Chromium];

    /// Source label attached to credentials.
    pub fn label(self) -> &'static str {
        match self {
            Self::Firefox => "Firefox",
            Self::Chromium => "Chromium",
        }
    }

    pub fn format(self) -> StoreFormat {
        match self {
            Self::Firefox => StoreFormat::Sqlite,
            Self::Chromium => StoreFormat::LevelDb,
        }
    }

    /// Directory holding one sub-directory per profile.
    pub fn profiles_root(self, home: &Path) -> PathBuf {
        match self {
            Self::Firefox => home.join(".mozilla").join("firefox"),
            Self::Chromium => home.join(".config").join("chromium"),
        }
    }

    /// Store location relative to a profile directory.
    pub fn store_subpath(self) -> &'static str {
        match self {
            Self::Firefox => "storage/default/https+++discord.com/ls/data.sqlite",
            Self::Chromium => "Local Storage/leveldb",
        }
    }
}

/// Scans browser profiles for Discord credentials.
#[derive(Debug, Clone)]
pub struct AccountFinder {
    home: PathBuf,
}

impl AccountFinder {
    /// Create a finder for the current user.
    ///
    /// Fails before any scanning if the host OS is not supported.
    pub fn new() -> Result<Self, DiscoveryError> {
        Self::for_os(std::env::consts::OS, dirs::home_dir())
    }

    /// Create a finder rooted at an explicit home directory.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    fn for_os(os: &str, home: Option<PathBuf>) -> Result<Self, DiscoveryError> {
        if os != "linux" {
            return Err(DiscoveryError::UnsupportedSystem(os.to_string()));
        }
        let home = home.ok_or(DiscoveryError::NoHomeDirectory)?;
        Ok(Self::with_home(home))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Scan every supported browser and return the distinct credentials.
    pub fn find_accounts(&self) -> BTreeSet<Credential> {
        let mut accounts = BTreeSet::new();
        for family in BrowserFamily::ALL {
            accounts.extend(self.scan_family(family));
        }
        // The desktop app keeps its session in the same LevelDB layout, but
        // tokens read from it are currently rejected with 401.
        accounts
    }

    /// Scan all profiles of one browser family.
    pub fn scan_family(&self, family: BrowserFamily) -> BTreeSet<Credential> {
        info!("Searching for accounts in {}", family.label());

        let mut accounts = BTreeSet::new();
        for store_path in self.find_stores(family) {
            match scan_store(family, &store_path) {
                Ok(Some(credential)) => {
                    debug!("Found {} session in {}", family.label(), store_path.display());
                    accounts.insert(credential);
                }
                Ok(None) => debug!("No session in {}", store_path.display()),
                Err(StoreError::Locked { path }) => warn!(
                    "{} is running, please close it and try again ({})",
                    family.label(),
                    path.display()
                ),
                Err(err) => warn!("Error while reading {} database: {}", family.label(), err),
            }
        }
        accounts
    }

    /// List existing store paths for a family, one per profile.
    pub fn find_stores(&self, family: BrowserFamily) -> Vec<PathBuf> {
        let root = family.profiles_root(&self.home);
        let Ok(entries) = std::fs::read_dir(&root) else {
            debug!("No {} profiles at {}", family.label(), root.display());
            return Vec::new();
        };

        let mut stores: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path().join(family.store_subpath()))
            .filter(|path| path.exists())
            .collect();
        stores.sort();
        stores
    }
}

/// Read and decode the session of a single profile store.
pub fn scan_store(family: BrowserFamily, path: &Path) -> Result<Option<Credential>, StoreError> {
    let raw = match family.format() {
        StoreFormat::Sqlite => store::read_sqlite_store(path)?,
        StoreFormat::LevelDb => store::read_leveldb_store(path)?,
    };
    Ok(extract_credential(&raw, family.format(), family.label()))
}
