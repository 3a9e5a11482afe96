//! Token persistence
//!
//! The captured token is kept as a url-encoded record in `<storage>/.auth_token`.
//! Setting `MAILSYNC_CLIENT_TOKEN` overrides the file.

use crate::token::{CapturedToken, StoredToken};
use crate::{AuthError, AuthResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Environment variable that takes precedence over the stored file
pub const ENV_TOKEN: &str = "MAILSYNC_CLIENT_TOKEN";

/// File name of the stored record inside the storage folder
pub const TOKEN_FILE: &str = ".auth_token";

/// Destination for a freshly captured token
pub trait TokenSink: Send + Sync {
    fn deliver(&self, token: &CapturedToken) -> AuthResult<()>;
}

/// Token record on disk
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage folder
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the record file
    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    /// Write the record, creating the folder; the file is private to the user
    pub fn store(&self, token: &CapturedToken) -> AuthResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            AuthError::StorageError(format!("unable to create {}: {}", self.dir.display(), e))
        })?;

        let path = self.path();
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(&path)
            .map_err(|e| AuthError::StorageError(format!("{}: {}", path.display(), e)))?;
        file.write_all(token.encode().as_bytes())
            .map_err(|e| AuthError::StorageError(format!("{}: {}", path.display(), e)))?;

        info!("Stored auth token at {}", path.display());
        Ok(())
    }

    /// Load the token, preferring `MAILSYNC_CLIENT_TOKEN`
    pub fn load(&self) -> AuthResult<StoredToken> {
        self.load_with_override(std::env::var(ENV_TOKEN).ok())
    }

    pub(crate) fn load_with_override(&self, env_value: Option<String>) -> AuthResult<StoredToken> {
        let raw = match env_value.filter(|v| !v.trim().is_empty()) {
            Some(value) => {
                debug!("Using token from {}", ENV_TOKEN);
                value
            }
            None => {
                let path = self.path();
                std::fs::read_to_string(&path)
                    .map_err(|_| AuthError::TokenNotFound(path.display().to_string()))?
            }
        };

        let token = StoredToken::parse(&raw)?;
        if token.is_expired() {
            // No refresh; the server decides whether it is still accepted
            warn!("Auth token has expired, run the auth command to log in again");
        }
        Ok(token)
    }
}

impl TokenSink for TokenStore {
    fn deliver(&self, token: &CapturedToken) -> AuthResult<()> {
        self.store(token)
    }
}

/// Prints an `export` line for the token instead of storing it
pub struct ExportHint {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ExportHint {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

impl TokenSink for ExportHint {
    fn deliver(&self, token: &CapturedToken) -> AuthResult<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| AuthError::StorageError("output lock poisoned".to_string()))?;
        write!(
            out,
            "\nTo use the token, run:\nexport {}={}\n",
            ENV_TOKEN, token.access_token
        )?;
        out.flush()?;
        Ok(())
    }
}
