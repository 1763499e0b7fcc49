//! Plain alias stores for MFA devices and IAM roles.
//!
//! Pure convenience indirection from short names to ARNs. The maps never
//! contain credentials, so they stay unencrypted JSON.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::error::CloudCtlError;

/// A `name -> ARN` map backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct AliasStore {
    path: PathBuf,
}

impl AliasStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn save(&self, name: &str, arn: &str) -> Result<(), CloudCtlError> {
        let mut aliases = self.list()?;
        aliases.insert(name.to_string(), arn.to_string());
        self.write(&aliases)
    }

    pub fn get(&self, name: &str) -> Result<Option<String>, CloudCtlError> {
        Ok(self.list()?.get(name).cloned())
    }

    pub fn list(&self) -> Result<BTreeMap<String, String>, CloudCtlError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|_| CloudCtlError::CorruptStoreFile {
            path: self.path.clone(),
        })
    }

    pub fn remove(&self, name: &str) -> Result<(), CloudCtlError> {
        let mut aliases = self.list()?;
        if aliases.remove(name).is_none() {
            return Err(CloudCtlError::AliasNotFound {
                name: name.to_string(),
            });
        }
        self.write(&aliases)
    }

    /// Replace the whole map. Used by `import` after merging.
    pub fn save_all(&self, aliases: &BTreeMap<String, String>) -> Result<(), CloudCtlError> {
        self.write(aliases)
    }

    pub fn clear_all(&self) -> Result<(), CloudCtlError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, aliases: &BTreeMap<String, String>) -> Result<(), CloudCtlError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = open_private(&tmp)?;
            file.write_all(serde_json::to_string_pretty(aliases)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &std::path::Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &std::path::Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
