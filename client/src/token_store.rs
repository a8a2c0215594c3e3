use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Debug;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

/// Expected structure for $DEALA_HOME/auth.json. The `access`/`refresh` key
/// names are part of the storage contract and survive page-reload-equivalent
/// process restarts.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct AuthDotJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<DateTime<Utc>>,
}

pub fn get_auth_file(deala_home: &Path) -> PathBuf {
    deala_home.join("auth.json")
}

pub(crate) trait TokenStorageBackend: Debug + Send + Sync {
    fn load(&self) -> std::io::Result<Option<AuthDotJson>>;
    fn save(&self, auth: &AuthDotJson) -> std::io::Result<()>;
    fn delete(&self) -> std::io::Result<bool>;
}

#[derive(Clone, Debug)]
struct FileTokenStorage {
    deala_home: PathBuf,
}

impl FileTokenStorage {
    fn try_read_auth_json(&self, auth_file: &Path) -> std::io::Result<AuthDotJson> {
        let mut file = File::open(auth_file)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let auth_dot_json: AuthDotJson = serde_json::from_str(&contents)?;
        Ok(auth_dot_json)
    }
}

impl TokenStorageBackend for FileTokenStorage {
    fn load(&self) -> std::io::Result<Option<AuthDotJson>> {
        let auth_file = get_auth_file(&self.deala_home);
        match self.try_read_auth_json(&auth_file) {
            Ok(auth) => Ok(Some(auth)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn save(&self, auth_dot_json: &AuthDotJson) -> std::io::Result<()> {
        let auth_file = get_auth_file(&self.deala_home);

        if let Some(parent) = auth_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json_data = serde_json::to_string_pretty(auth_dot_json)?;
        let mut options = OpenOptions::new();
        options.truncate(true).write(true).create(true);
        #[cfg(unix)]
        {
            options.mode(0o600);
        }
        let mut file = options.open(auth_file)?;
        file.write_all(json_data.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn delete(&self) -> std::io::Result<bool> {
        let auth_file = get_auth_file(&self.deala_home);
        match std::fs::remove_file(&auth_file) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// In-process storage with the same contract as the file backend. Used by
/// tests that must not touch the filesystem.
#[derive(Debug, Default)]
struct MemoryTokenStorage {
    auth: Mutex<Option<AuthDotJson>>,
}

impl TokenStorageBackend for MemoryTokenStorage {
    fn load(&self) -> std::io::Result<Option<AuthDotJson>> {
        Ok(self.lock().clone())
    }

    fn save(&self, auth: &AuthDotJson) -> std::io::Result<()> {
        *self.lock() = Some(auth.clone());
        Ok(())
    }

    fn delete(&self) -> std::io::Result<bool> {
        Ok(self.lock().take().is_some())
    }
}

impl MemoryTokenStorage {
    fn lock(&self) -> std::sync::MutexGuard<'_, Option<AuthDotJson>> {
        self.auth.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Persistence for the access/refresh token pair. Reads on every outgoing
/// request, written by login and refresh, cleared on logout or an
/// unrecoverable refresh failure. No network I/O happens here.
#[derive(Clone, Debug)]
pub struct TokenStore {
    backend: Arc<dyn TokenStorageBackend>,
}

impl TokenStore {
    /// File-backed store rooted at the given Deala home directory.
    pub fn with_deala_home(deala_home: PathBuf) -> Self {
        Self {
            backend: Arc::new(FileTokenStorage { deala_home }),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(MemoryTokenStorage::default()),
        }
    }

    pub fn access_token(&self) -> std::io::Result<Option<String>> {
        Ok(self
            .backend
            .load()?
            .and_then(|auth| auth.access)
            .filter(|token| !token.is_empty()))
    }

    pub fn refresh_token(&self) -> std::io::Result<Option<String>> {
        Ok(self
            .backend
            .load()?
            .and_then(|auth| auth.refresh)
            .filter(|token| !token.is_empty()))
    }

    /// Persists a new access token. The refresh token is only replaced when
    /// the server rotated it; otherwise the stored one is kept.
    pub fn set_tokens(&self, access: &str, refresh: Option<&str>) -> std::io::Result<()> {
        let mut auth = self.backend.load()?.unwrap_or_default();
        auth.access = Some(access.to_string());
        if let Some(refresh) = refresh {
            auth.refresh = Some(refresh.to_string());
        }
        auth.last_refresh = Some(Utc::now());
        self.backend.save(&auth)
    }

    /// Removes both values. Returns true if anything was stored.
    pub fn clear(&self) -> std::io::Result<bool> {
        self.backend.delete()
    }

    /// Presence check only: true iff both tokens are stored and non-empty.
    /// Says nothing about expiry or server-side validity.
    pub fn has_valid_tokens(&self) -> bool {
        matches!(
            self.backend.load(),
            Ok(Some(AuthDotJson {
                access: Some(access),
                refresh: Some(refresh),
                ..
            })) if !access.is_empty() && !refresh.is_empty()
        )
    }
}
