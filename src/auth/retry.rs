use std::future::Future;
use std::sync::Arc;

use reqwest::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::config::{AuthConfig, IndexInfo};
use super::login::Login;
use super::store::SharedCredentials;
use crate::error::SessionError;
use crate::stream::StreamEnvelope;

/// Runs a privileged operation, logging in and retrying it once when the
/// daemon answers "unauthorized".
pub struct AuthRetryGate {
    credentials: SharedCredentials,
    login: Arc<dyn Login>,
}

impl AuthRetryGate {
    pub fn new(credentials: SharedCredentials, login: Arc<dyn Login>) -> Self {
        Self { credentials, login }
    }

    pub fn credentials(&self) -> &SharedCredentials {
        &self.credentials
    }

    /// Invokes `op` with the credentials resolved for `index`.
    ///
    /// On an unauthorized outcome a prompt naming `tag` is written to
    /// `notice`, the login flow runs, and `op` is invoked exactly once more
    /// with freshly resolved credentials. The second outcome is returned
    /// without inspection. A failed login is returned as
    /// [`SessionError::Auth`] and `op` is not invoked again.
    pub async fn perform<F, Fut, W>(
        &self,
        index: &IndexInfo,
        mut op: F,
        tag: &str,
        notice: &mut W,
    ) -> Result<StreamEnvelope, SessionError>
    where
        F: FnMut(AuthConfig) -> Fut,
        Fut: Future<Output = Result<StreamEnvelope, SessionError>>,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let outcome = op(self.resolve(index).await).await;
        if !is_unauthorized(&outcome) {
            return outcome;
        }
        drop(outcome);

        notice
            .write_all(format!("\nPlease login prior to {tag}:\n").as_bytes())
            .await?;
        notice.flush().await?;

        let key = self.credentials.read().await.key(index);
        self.login.login(&key).await.map_err(|err| match err {
            SessionError::Auth(_) => err,
            other => SessionError::Auth(other.to_string()),
        })?;

        log::debug!("retrying {tag} after login to {key}");
        op(self.resolve(index).await).await
    }

    async fn resolve(&self, index: &IndexInfo) -> AuthConfig {
        self.credentials.read().await.resolve(index)
    }
}

fn is_unauthorized(outcome: &Result<StreamEnvelope, SessionError>) -> bool {
    match outcome {
        Ok(envelope) => envelope.status == StatusCode::UNAUTHORIZED,
        Err(err) => err.is_unauthorized(),
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
