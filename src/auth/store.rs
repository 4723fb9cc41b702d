use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::config::{AuthConfig, IndexInfo, OFFICIAL_INDEX_KEY};

/// Credential store shared between the retry gate and the login flow.
pub type SharedCredentials = Arc<RwLock<CredentialStore>>;

/// File-backed registry credentials keyed by index server address.
///
/// The file layout is the familiar `{"auths": {"<server>": {"auth": ...}}}`
/// document, where `auth` is base64 of `user:password`.
#[derive(Debug)]
pub struct CredentialStore {
    auths: HashMap<String, AuthConfig>,
    file_path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    auths: BTreeMap<String, StoredAuth>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredAuth {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    auth: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    email: String,
    #[serde(
        default,
        rename = "identitytoken",
        skip_serializing_if = "String::is_empty"
    )]
    identity_token: String,
}

impl CredentialStore {
    /// Opens the store at the default location (`~/.hyper/config.json`).
    pub fn new() -> io::Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Could not find home directory")
        })?;
        Self::open(home_dir.join(".hyper").join("config.json"))
    }

    /// Opens the store at `file_path`, loading any existing credentials.
    pub fn open(file_path: impl Into<PathBuf>) -> io::Result<Self> {
        let file_path = file_path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut store = CredentialStore {
            auths: HashMap::new(),
            file_path,
        };
        store.load()?;
        Ok(store)
    }

    pub fn into_shared(self) -> SharedCredentials {
        Arc::new(RwLock::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Key the credentials for `index` are stored under.
    pub fn key(&self, index: &IndexInfo) -> String {
        if index.official {
            OFFICIAL_INDEX_KEY.to_string()
        } else {
            index.name.clone()
        }
    }

    /// Resolves the credentials for `index`.
    ///
    /// An exact key match wins; otherwise entries are compared by hostname so
    /// that `https://registry.example.com/v1/` serves `registry.example.com`.
    /// Unknown indexes resolve to anonymous credentials.
    pub fn resolve(&self, index: &IndexInfo) -> AuthConfig {
        let key = self.key(index);
        if let Some(found) = self.auths.get(&key) {
            return found.clone();
        }

        let wanted = hostname(&key);
        self.auths
            .iter()
            .find(|(stored, _)| hostname(stored) == wanted)
            .map(|(_, found)| found.clone())
            .unwrap_or_else(|| AuthConfig::anonymous(key))
    }

    /// Stores credentials under `key` and persists the file.
    pub fn set(&mut self, key: &str, mut auth: AuthConfig) -> io::Result<()> {
        auth.server_address = key.to_string();
        self.auths.insert(key.to_string(), auth);
        self.save()
    }

    /// Removes the credentials stored under `key`.
    pub fn delete(&mut self, key: &str) -> io::Result<()> {
        self.auths.remove(key);
        self.save()
    }

    fn load(&mut self) -> io::Result<()> {
        match File::open(&self.file_path) {
            Ok(mut file) => {
                let mut contents = String::new();
                file.read_to_string(&mut contents)?;
                if contents.trim().is_empty() {
                    return Ok(());
                }
                let parsed: CredentialFile = serde_json::from_str(&contents)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
                self.auths = parsed
                    .auths
                    .into_iter()
                    .map(|(key, stored)| decode_entry(&key, stored).map(|auth| (key, auth)))
                    .collect::<io::Result<_>>()?;
                Ok(())
            }
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn save(&self) -> io::Result<()> {
        let file = CredentialFile {
            auths: self
                .auths
                .iter()
                .map(|(key, auth)| (key.clone(), encode_entry(auth)))
                .collect(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        let mut handle = create_private(&self.file_path)?;
        handle.write_all(contents.as_bytes())?;
        restrict_permissions(&self.file_path)
    }
}

fn decode_entry(key: &str, stored: StoredAuth) -> io::Result<AuthConfig> {
    let mut auth = AuthConfig::anonymous(key);
    auth.email = stored.email;
    if !stored.identity_token.is_empty() {
        auth.identity_token = Some(SecretString::new(stored.identity_token));
    }
    if stored.auth.is_empty() {
        return Ok(auth);
    }

    let invalid = |msg: String| io::Error::new(io::ErrorKind::InvalidData, msg);
    let decoded = STANDARD
        .decode(stored.auth.as_bytes())
        .map_err(|err| invalid(format!("invalid auth for {key}: {err}")))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|err| invalid(format!("invalid auth for {key}: {err}")))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| invalid(format!("invalid auth for {key}: missing ':' separator")))?;

    auth.username = username.to_string();
    auth.password = Some(SecretString::new(password.to_string()));
    auth.auth = Some(SecretString::new(stored.auth));
    Ok(auth)
}

fn encode_entry(auth: &AuthConfig) -> StoredAuth {
    let password = auth
        .password
        .as_ref()
        .map(|p| p.expose_secret().as_str())
        .unwrap_or_default();
    let encoded = if auth.username.is_empty() && password.is_empty() {
        String::new()
    } else {
        STANDARD.encode(format!("{}:{}", auth.username, password))
    };
    StoredAuth {
        auth: encoded,
        email: auth.email.clone(),
        identity_token: auth
            .identity_token
            .as_ref()
            .map(|t| t.expose_secret().clone())
            .unwrap_or_default(),
    }
}

fn hostname(address: &str) -> &str {
    let stripped = address
        .strip_prefix("https://")
        .or_else(|| address.strip_prefix("http://"))
        .unwrap_or(address);
    stripped.split('/').next().unwrap_or(stripped)
}

/// Opens `path` for writing; a new file is created readable by the owner
/// only, before any secret is written to it.
fn create_private(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Tightens a file that already existed with looser permissions.
fn restrict_permissions(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        if perms.mode() & 0o077 != 0 {
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::open(dir.path().join("config.json")).unwrap()
    }

    #[test]
    fn missing_file_resolves_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let auth = store.resolve(&IndexInfo::official());
        assert!(auth.is_anonymous());
        assert_eq!(auth.server_address, OFFICIAL_INDEX_KEY);
    }

    #[test]
    fn set_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let auth = AuthConfig::with_password(
            "alice",
            SecretString::new("pw".to_string()),
            OFFICIAL_INDEX_KEY,
        );
        store.set(OFFICIAL_INDEX_KEY, auth).unwrap();

        let reopened = store_in(&dir);
        let resolved = reopened.resolve(&IndexInfo::official());
        assert_eq!(resolved.username, "alice");
        assert_eq!(resolved.password.unwrap().expose_secret(), "pw");

        let raw = fs::read_to_string(dir.path().join("config.json")).unwrap();
        assert!(raw.contains(&STANDARD.encode("alice:pw")));
        assert!(!raw.contains("\"pw\""));
    }

    #[test]
    fn resolves_by_hostname() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            format!(
                r#"{{"auths": {{"https://registry.example.com/v1/": {{"auth": "{}"}}}}}}"#,
                STANDARD.encode("bob:hunter2")
            ),
        )
        .unwrap();
        let store = store_in(&dir);

        let resolved = store.resolve(&IndexInfo::new("registry.example.com"));
        assert_eq!(resolved.username, "bob");
    }

    #[test]
    fn rejects_malformed_auth() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            format!(
                r#"{{"auths": {{"registry.example.com": {{"auth": "{}"}}}}}}"#,
                STANDARD.encode("no-separator")
            ),
        )
        .unwrap();

        let err = CredentialStore::open(dir.path().join("config.json")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn delete_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let index = IndexInfo::new("registry.example.com");
        let key = store.key(&index);
        store
            .set(
                &key,
                AuthConfig::with_password("carol", SecretString::new("pw".into()), ""),
            )
            .unwrap();
        store.delete(&key).unwrap();

        assert!(store_in(&dir).resolve(&index).is_anonymous());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut store = store_in(&dir);
        store
            .set(
                OFFICIAL_INDEX_KEY,
                AuthConfig::with_password("alice", SecretString::new("pw".into()), ""),
            )
            .unwrap();
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        store.delete(OFFICIAL_INDEX_KEY).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn new_file_is_created_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.json");
        drop(create_private(&path).unwrap());
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);
    }
}
