//! Registry credentials and the login-then-retry gate around privileged
//! daemon operations.

#[path = "auth/config.rs"]
mod config;

#[path = "auth/store.rs"]
mod store;

#[path = "auth/login.rs"]
mod login;

#[path = "auth/retry.rs"]
mod retry;

pub use config::{AuthConfig, IndexInfo, OFFICIAL_INDEX_KEY, REGISTRY_AUTH_HEADER};
pub use login::{CredentialPrompt, Credentials, Login, PromptLogin, TerminalPrompt};
pub use retry::AuthRetryGate;
pub use store::{CredentialStore, SharedCredentials};
