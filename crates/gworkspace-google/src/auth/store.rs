//! Token persistence
//!
//! One plain JSON file per service, readable only by the owner.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::TokenRecord;
use crate::common::paths::token_path;
use crate::{GoogleError, Service};

pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `<token_dir>/<service>_auth_token.json`
    pub fn for_service(token_dir: &Path, service: Service) -> Self {
        Self::new(token_path(token_dir, service))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored token, `None` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<TokenRecord>, GoogleError> {
        if !self.path.exists() {
            debug!("No token file at {:?}", self.path);
            return Ok(None);
        }
        let raw = fs::read(&self.path)?;
        let record: TokenRecord = serde_json::from_slice(&raw)?;
        Ok(Some(record))
    }

    /// Write the token atomically (temp file + rename) with 0600 permissions.
    pub fn save(&self, record: &TokenRecord) -> Result<(), GoogleError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(record)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = open_private(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        info!("Saved token to {:?}", self.path);
        Ok(())
    }

    /// Delete the token file. Returns whether a file was removed.
    pub fn remove(&self) -> Result<bool, GoogleError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed token file {:?}", self.path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create(true).truncate(true).open(path)
}
