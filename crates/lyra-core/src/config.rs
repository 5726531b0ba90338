//! Run-scoped storage configuration.
//!
//! Configuration is an explicit value passed into the pipeline entry point,
//! consumed once at startup. Nothing here is global mutable state, so two
//! runs in one process cannot leak settings into each other.
//!
//! Credentials load from an INI-style key/value file:
//!
//! ```text
//! [credentials]
//! access_key_id = AKIA...
//! secret_access_key = ...
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::storage::{LocalFsBackend, MemoryBackend, StorageBackend};

/// Which storage backend a URL refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Local filesystem directory.
    Local,
    /// In-memory backend (tests and dry runs).
    Memory,
}

/// Access credentials for a remote storage backend.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key identifier.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Storage configuration for one location (input or output) of a run.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Backend kind for this location.
    pub kind: BackendKind,
    /// Root path of the backend. Object keys resolve beneath it.
    pub root: String,
    /// Credentials, when the backend requires them.
    pub credentials: Option<Credentials>,
}

impl StorageConfig {
    /// Creates a local filesystem configuration rooted at `root`.
    #[must_use]
    pub fn local(root: impl Into<String>) -> Self {
        Self {
            kind: BackendKind::Local,
            root: root.into(),
            credentials: None,
        }
    }

    /// Creates an in-memory configuration (tests and dry runs).
    #[must_use]
    pub fn memory() -> Self {
        Self {
            kind: BackendKind::Memory,
            root: String::new(),
            credentials: None,
        }
    }

    /// Constructs the storage backend this configuration describes.
    ///
    /// `root` is the local filesystem root for [`BackendKind::Local`] and
    /// is ignored for [`BackendKind::Memory`].
    #[must_use]
    pub fn build_backend(&self) -> Arc<dyn StorageBackend> {
        match self.kind {
            BackendKind::Local => Arc::new(LocalFsBackend::new(self.root.as_str())),
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
        }
    }

    /// Attaches credentials loaded from an INI-style file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if the file is unreadable or does not
    /// contain both keys under a `[credentials]` section.
    pub fn with_credentials_file(mut self, path: &Path) -> Result<Self> {
        self.credentials = Some(load_credentials(path)?);
        Ok(self)
    }
}

/// Parses the `[credentials]` section of an INI-style key/value file.
fn load_credentials(path: &Path) -> Result<Credentials> {
    let text = std::fs::read_to_string(path).map_err(|e| CoreError::Config {
        message: format!("cannot read credentials file {}: {e}", path.display()),
    })?;

    let mut in_section = false;
    let mut access_key_id = None;
    let mut secret_access_key = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = section.trim().eq_ignore_ascii_case("credentials");
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "access_key_id" => access_key_id = Some(value),
                "secret_access_key" => secret_access_key = Some(value),
                _ => {}
            }
        }
    }

    match (access_key_id, secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => Ok(Credentials {
            access_key_id,
            secret_access_key,
        }),
        _ => Err(CoreError::config(format!(
            "credentials file {} is missing access_key_id or secret_access_key",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn parses_credentials_section() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "# storage access\n[credentials]\naccess_key_id = AKIAEXAMPLE\nsecret_access_key = shhh"
        )
        .expect("write");

        let creds = load_credentials(file.path()).expect("parse");
        assert_eq!(creds.access_key_id, "AKIAEXAMPLE");
        assert_eq!(creds.secret_access_key, "shhh");
    }

    #[test]
    fn missing_keys_are_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[credentials]\naccess_key_id = AKIAEXAMPLE").expect("write");

        let err = load_credentials(file.path()).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn debug_redacts_secret() {
        let creds = Credentials {
            access_key_id: "AKIA".into(),
            secret_access_key: "topsecret".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("topsecret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn local_config_builds_filesystem_backend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig::local(dir.path().display().to_string());
        assert_eq!(config.kind, BackendKind::Local);

        let backend = config.build_backend();
        backend
            .put("t/file.txt", bytes::Bytes::from("payload"))
            .await
            .expect("put should succeed");
        // The object must land under the configured root on disk.
        assert!(dir.path().join("t/file.txt").is_file());
    }

    #[tokio::test]
    async fn memory_config_builds_in_memory_backend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = StorageConfig::memory();
        config.root = dir.path().display().to_string();
        assert_eq!(config.kind, BackendKind::Memory);

        let backend = config.build_backend();
        backend
            .put("t/file.txt", bytes::Bytes::from("payload"))
            .await
            .expect("put should succeed");
        let got = backend.get("t/file.txt").await.expect("get should succeed");
        assert_eq!(got, bytes::Bytes::from("payload"));
        // An in-memory backend must not touch the filesystem.
        assert!(!dir.path().join("t/file.txt").exists());
    }

    #[test]
    fn keys_outside_section_are_ignored() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "access_key_id = WRONG\n[credentials]\naccess_key_id = RIGHT\nsecret_access_key = s"
        )
        .expect("write");

        let creds = load_credentials(file.path()).expect("parse");
        assert_eq!(creds.access_key_id, "RIGHT");
    }
}
