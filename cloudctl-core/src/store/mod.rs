//! Encrypted session storage.
//!
//! Sessions live in a single JSON envelope mapping profile names to
//! per-field ciphertexts:
//!
//! ```json
//! { "<profile>": { "<field>": "<base64 of nonce||sealed value>" } }
//! ```
//!
//! The envelope itself stays unencrypted so profiles can be enumerated
//! without the secret. Every mutation re-serializes the whole document in
//! memory and lands it with a tempfile-plus-rename, so the file is never
//! partially rewritten.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::crypto;
use crate::error::CloudCtlError;
use crate::model::{Secret, Session};

pub mod alias;

pub use alias::AliasStore;

const FIELD_ACCESS_KEY: &str = "AccessKey";
const FIELD_SECRET_KEY: &str = "SecretKey";
const FIELD_SESSION_TOKEN: &str = "SessionToken";
const FIELD_EXPIRATION: &str = "Expiration";
const FIELD_ROLE_ARN: &str = "RoleArn";
const FIELD_SESSION_NAME: &str = "SessionName";
const FIELD_SOURCE_PROFILE: &str = "SourceProfile";
const FIELD_REGION: &str = "Region";
const FIELD_MFA_ARN: &str = "MfaArn";
const FIELD_DURATION: &str = "Duration";
const FIELD_REVOKED: &str = "Revoked";

type Envelope = BTreeMap<String, BTreeMap<String, String>>;

/// Typed CRUD over the encrypted credentials envelope.
///
/// The store is the sole mutator of the envelope file; callers receive
/// owned copies of decrypted records.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The envelope file location.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Encrypt and persist a session, replacing any entry with the same
    /// profile.
    ///
    /// If the existing envelope is not valid JSON this refuses with
    /// [`CloudCtlError::CorruptStoreFile`] and leaves the file untouched;
    /// overwriting would destroy every other profile.
    pub fn save(&self, session: &Session, secret: &Secret) -> Result<(), CloudCtlError> {
        let mut envelope = self.read_envelope()?.unwrap_or_default();
        envelope.insert(session.profile.clone(), self.seal_entry(session, secret)?);
        self.write_envelope(&envelope)
    }

    /// Load and decrypt a single session.
    pub fn load(&self, profile: &str, secret: &Secret) -> Result<Session, CloudCtlError> {
        let envelope = self.read_envelope()?.ok_or_else(|| CloudCtlError::ProfileNotFound {
            profile: profile.to_string(),
        })?;
        let entry = envelope
            .get(profile)
            .ok_or_else(|| CloudCtlError::ProfileNotFound {
                profile: profile.to_string(),
            })?;
        open_entry(profile, entry, secret)
    }

    /// Decrypt every stored session.
    ///
    /// A single decrypt failure aborts the whole listing: mixed secrets in
    /// one envelope indicate corruption, not a partial result.
    pub fn list_all(&self, secret: &Secret) -> Result<Vec<Session>, CloudCtlError> {
        let Some(envelope) = self.read_envelope()? else {
            return Ok(Vec::new());
        };
        envelope
            .iter()
            .map(|(profile, entry)| open_entry(profile, entry, secret))
            .collect()
    }

    /// Enumerate profile names without the secret.
    pub fn list_profiles(&self) -> Result<Vec<String>, CloudCtlError> {
        let Some(envelope) = self.read_envelope()? else {
            return Ok(Vec::new());
        };
        Ok(envelope.keys().cloned().collect())
    }

    /// Delete one profile; removes the envelope file when it becomes empty.
    pub fn remove(&self, profile: &str) -> Result<(), CloudCtlError> {
        let mut envelope = self.read_envelope()?.ok_or_else(|| CloudCtlError::ProfileNotFound {
            profile: profile.to_string(),
        })?;
        if envelope.remove(profile).is_none() {
            return Err(CloudCtlError::ProfileNotFound {
                profile: profile.to_string(),
            });
        }
        if envelope.is_empty() {
            fs::remove_file(&self.path)?;
            return Ok(());
        }
        self.write_envelope(&envelope)
    }

    /// Remove the whole envelope. A missing file is not an error.
    pub fn clear_all(&self) -> Result<(), CloudCtlError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn seal_entry(
        &self,
        session: &Session,
        secret: &Secret,
    ) -> Result<BTreeMap<String, String>, CloudCtlError> {
        let expiration = session
            .expiration
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut entry = BTreeMap::new();
        let mut seal = |field: &str, value: &str| -> Result<(), CloudCtlError> {
            let sealed = crypto::encrypt(value.as_bytes(), secret.expose())?;
            entry.insert(field.to_string(), BASE64.encode(sealed));
            Ok(())
        };

        seal(FIELD_ACCESS_KEY, &session.access_key)?;
        seal(FIELD_SECRET_KEY, &session.secret_key)?;
        seal(FIELD_SESSION_TOKEN, &session.session_token)?;
        seal(FIELD_EXPIRATION, &expiration)?;
        seal(FIELD_ROLE_ARN, session.stored_role_arn())?;
        seal(FIELD_SESSION_NAME, &session.profile)?;
        seal(FIELD_SOURCE_PROFILE, &session.source_profile)?;
        seal(FIELD_REGION, &session.region)?;
        seal(FIELD_MFA_ARN, &session.mfa_arn)?;
        seal(FIELD_DURATION, &session.duration_seconds.to_string())?;

        // Carries no secret, so it stays readable without the key.
        if session.revoked {
            entry.insert(FIELD_REVOKED.to_string(), "true".to_string());
        }

        Ok(entry)
    }

    /// Read the envelope; `Ok(None)` when the file does not exist.
    fn read_envelope(&self) -> Result<Option<Envelope>, CloudCtlError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|_| CloudCtlError::CorruptStoreFile {
                path: self.path.clone(),
            })
    }

    fn write_envelope(&self, envelope: &Envelope) -> Result<(), CloudCtlError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
            restrict_dir(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = open_private(&tmp)?;
            file.write_all(serde_json::to_string_pretty(envelope)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn open_entry(
    profile: &str,
    entry: &BTreeMap<String, String>,
    secret: &Secret,
) -> Result<Session, CloudCtlError> {
    let open = |field: &str| -> Result<String, CloudCtlError> {
        let Some(encoded) = entry.get(field) else {
            return Ok(String::new());
        };
        let sealed = BASE64
            .decode(encoded)
            .map_err(|_| CloudCtlError::InvalidSecretOrCorruptCiphertext)?;
        let plain = crypto::decrypt(&sealed, secret.expose())?;
        String::from_utf8(plain).map_err(|_| CloudCtlError::InvalidSecretOrCorruptCiphertext)
    };

    let expiration_raw = open(FIELD_EXPIRATION)?;
    let expiration = if expiration_raw.is_empty() {
        DateTime::UNIX_EPOCH
    } else {
        DateTime::parse_from_rfc3339(&expiration_raw)
            .map_err(|_| CloudCtlError::InvalidSecretOrCorruptCiphertext)?
            .with_timezone(&Utc)
    };

    let (kind, role_arn) = Session::kind_from_stored(&open(FIELD_ROLE_ARN)?);
    let duration_seconds = open(FIELD_DURATION)?.parse().unwrap_or(0);
    let revoked = entry.get(FIELD_REVOKED).map(String::as_str) == Some("true");

    Ok(Session {
        profile: profile.to_string(),
        access_key: open(FIELD_ACCESS_KEY)?,
        secret_key: open(FIELD_SECRET_KEY)?,
        session_token: open(FIELD_SESSION_TOKEN)?,
        expiration,
        kind,
        role_arn,
        source_profile: open(FIELD_SOURCE_PROFILE)?,
        region: open(FIELD_REGION)?,
        mfa_arn: open(FIELD_MFA_ARN)?,
        duration_seconds,
        revoked,
    })
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

#[cfg(unix)]
fn restrict_dir(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn restrict_dir(_path: &std::path::Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionKind;
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_secret() -> Secret {
        Secret::new("1234567890ABCDEF1234567890ABCDEF")
    }

    fn test_store() -> (SessionStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("credentials.json"));
        (store, dir)
    }

    fn test_session(profile: &str) -> Session {
        Session {
            profile: profile.to_string(),
            access_key: "AKIATEST1234".to_string(),
            secret_key: "SecretKey1234".to_string(),
            session_token: "Token1234".to_string(),
            expiration: Utc::now() + Duration::hours(1),
            kind: SessionKind::RoleAssumed,
            role_arn: "arn:aws:iam::123:role/TestRole".to_string(),
            source_profile: "default".to_string(),
            region: "ap-southeast-1".to_string(),
            mfa_arn: String::new(),
            duration_seconds: 3600,
            revoked: false,
        }
    }

    #[test]
    fn corrupt_envelope_is_never_overwritten() {
        let (store, dir) = test_store();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{ invalid json...").unwrap();

        let before = fs::read(&path).unwrap();
        let result = store.save(&test_session("new"), &test_secret());

        assert!(matches!(result, Err(CloudCtlError::CorruptStoreFile { .. })));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn removing_last_profile_deletes_the_file() {
        let (store, dir) = test_store();
        let secret = test_secret();

        store.save(&test_session("only"), &secret).unwrap();
        store.remove("only").unwrap();

        assert!(!dir.path().join("credentials.json").exists());
        assert!(store.list_profiles().unwrap().is_empty());
    }

    #[test]
    fn listing_profiles_needs_no_secret() {
        let (store, _dir) = test_store();
        let secret = test_secret();

        store.save(&test_session("a"), &secret).unwrap();
        store.save(&test_session("b"), &secret).unwrap();

        assert_eq!(store.list_profiles().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn listing_with_wrong_secret_fails_whole_call() {
        let (store, _dir) = test_store();
        store.save(&test_session("a"), &test_secret()).unwrap();

        let result = store.list_all(&Secret::new("wrong-secret"));
        assert!(matches!(
            result,
            Err(CloudCtlError::InvalidSecretOrCorruptCiphertext)
        ));
    }

    #[test]
    fn removing_unknown_profile_errors() {
        let (store, _dir) = test_store();
        store.save(&test_session("a"), &test_secret()).unwrap();

        let result = store.remove("missing");
        assert!(matches!(result, Err(CloudCtlError::ProfileNotFound { .. })));
    }

    #[test]
    fn clear_all_tolerates_missing_file() {
        let (store, _dir) = test_store();
        store.clear_all().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn envelope_and_directory_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let root = dir.path().join("store");
        let store = SessionStore::new(root.join("credentials.json"));
        store.save(&test_session("a"), &test_secret()).unwrap();

        let file_mode = fs::metadata(root.join("credentials.json"))
            .unwrap()
            .permissions()
            .mode();
        let dir_mode = fs::metadata(&root).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
        assert_eq!(dir_mode & 0o777, 0o700);
    }
}
