use std::io::{self, BufRead, Write};
use std::sync::Arc;

use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use secrecy::{ExposeSecret, SecretString};

use super::config::AuthConfig;
use super::store::SharedCredentials;
use crate::error::SessionError;

/// Interactive login flow invoked when the daemon asks for credentials.
#[async_trait]
pub trait Login: Send + Sync {
    /// Obtains credentials for the index stored under `key` and makes them
    /// available to the credential store.
    async fn login(&self, key: &str) -> Result<(), SessionError>;
}

/// Username and password entered by the user.
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Source of user-entered credentials.
pub trait CredentialPrompt: Send + Sync {
    fn ask(&self, server: &str) -> io::Result<Credentials>;
}

/// Reads the username from stdin and the password from the terminal with
/// echo disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn ask(&self, server: &str) -> io::Result<Credentials> {
        let mut out = io::stderr();
        writeln!(out, "Login with your credentials for {server}")?;
        write!(out, "Username: ")?;
        out.flush()?;

        let mut username = String::new();
        io::stdin().lock().read_line(&mut username)?;

        write!(out, "Password: ")?;
        out.flush()?;
        let password = read_hidden_line()?;
        writeln!(out)?;

        Ok(Credentials {
            username: username.trim().to_string(),
            password: SecretString::new(password),
        })
    }
}

fn read_hidden_line() -> io::Result<String> {
    terminal::enable_raw_mode()?;
    let entered = read_keys_until_enter();
    terminal::disable_raw_mode()?;
    entered
}

fn read_keys_until_enter() -> io::Result<String> {
    let mut line = String::new();
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }
        match code {
            KeyCode::Enter => return Ok(line),
            KeyCode::Backspace => {
                line.pop();
            }
            KeyCode::Char('c') | KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "login cancelled"));
            }
            KeyCode::Char(c) => line.push(c),
            _ => {}
        }
    }
}

/// Login flow that prompts for a username and password and saves them to
/// the credential store.
pub struct PromptLogin {
    credentials: SharedCredentials,
    prompt: Arc<dyn CredentialPrompt>,
}

impl PromptLogin {
    pub fn new(credentials: SharedCredentials, prompt: Arc<dyn CredentialPrompt>) -> Self {
        Self {
            credentials,
            prompt,
        }
    }

    /// Login flow reading from the controlling terminal.
    pub fn terminal(credentials: SharedCredentials) -> Self {
        Self::new(credentials, Arc::new(TerminalPrompt))
    }
}

#[async_trait]
impl Login for PromptLogin {
    async fn login(&self, key: &str) -> Result<(), SessionError> {
        let prompt = Arc::clone(&self.prompt);
        let server = key.to_string();
        let entered = tokio::task::spawn_blocking(move || prompt.ask(&server))
            .await
            .map_err(|err| SessionError::Auth(err.to_string()))?
            .map_err(|err| SessionError::Auth(err.to_string()))?;

        if entered.username.is_empty() {
            return Err(SessionError::Auth("username is required".to_string()));
        }
        if entered.password.expose_secret().is_empty() {
            return Err(SessionError::Auth("password is required".to_string()));
        }

        let auth = AuthConfig::with_password(entered.username, entered.password, key);
        self.credentials
            .write()
            .await
            .set(key, auth)
            .map_err(|err| SessionError::Auth(format!("saving credentials: {err}")))?;
        log::debug!("stored credentials for {key}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialStore, IndexInfo, OFFICIAL_INDEX_KEY};

    struct FixedPrompt(&'static str, &'static str);

    impl CredentialPrompt for FixedPrompt {
        fn ask(&self, _server: &str) -> io::Result<Credentials> {
            Ok(Credentials {
                username: self.0.to_string(),
                password: SecretString::new(self.1.to_string()),
            })
        }
    }

    struct BrokenPrompt;

    impl CredentialPrompt for BrokenPrompt {
        fn ask(&self, _server: &str) -> io::Result<Credentials> {
            Err(io::Error::new(io::ErrorKind::Interrupted, "login cancelled"))
        }
    }

    fn shared_store(dir: &tempfile::TempDir) -> SharedCredentials {
        CredentialStore::open(dir.path().join("config.json"))
            .unwrap()
            .into_shared()
    }

    #[tokio::test]
    async fn login_saves_entered_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = shared_store(&dir);
        let login = PromptLogin::new(store.clone(), Arc::new(FixedPrompt("alice", "pw")));

        login.login(OFFICIAL_INDEX_KEY).await.unwrap();

        let resolved = store.read().await.resolve(&IndexInfo::official());
        assert_eq!(resolved.username, "alice");
    }

    #[tokio::test]
    async fn empty_username_fails() {
        let dir = tempfile::tempdir().unwrap();
        let login = PromptLogin::new(shared_store(&dir), Arc::new(FixedPrompt("", "pw")));

        let err = login.login(OFFICIAL_INDEX_KEY).await.unwrap_err();
        assert!(matches!(err, SessionError::Auth(_)));
    }

    #[tokio::test]
    async fn prompt_failure_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let login = PromptLogin::new(shared_store(&dir), Arc::new(BrokenPrompt));

        let err = login.login(OFFICIAL_INDEX_KEY).await.unwrap_err();
        assert!(err.to_string().contains("login cancelled"));
    }
}
