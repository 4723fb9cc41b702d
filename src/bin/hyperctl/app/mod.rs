mod commands;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hyperctl::auth::{CredentialStore, PromptLogin, SharedCredentials};
use hyperctl::{DaemonClient, SessionClient};

use crate::args::{CliArgs, Command};
use crate::config::{load_config, ClientConfig};
use crate::logging::init_logging;

pub async fn run() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let mut loaded = load_config(args.config.clone())?;
    let _logger = init_logging(&loaded.config.logging, &loaded.paths)?;
    if let Some(host) = args.host {
        loaded.config.host = host;
    }
    log::debug!("using daemon at {}", loaded.config.host);

    let credentials = CredentialStore::open(&loaded.paths.credentials_file)?.into_shared();
    match args.command {
        Command::Config { save } => commands::show_config(&loaded, save),
        Command::Login { server } => commands::login(credentials, server.as_deref()).await,
        Command::Logout { server } => commands::logout(credentials, server.as_deref()).await,
        Command::Pull { image } => {
            let client = session_client(&loaded.config, credentials)?;
            commands::pull(&client, &image).await
        }
        Command::Push { image } => {
            let client = session_client(&loaded.config, credentials)?;
            commands::push(&client, &image).await
        }
        Command::Logs(logs) => {
            let client = session_client(&loaded.config, credentials)?;
            commands::logs(&client, &logs).await
        }
        Command::AttachResize { container, tag } => {
            let client = session_client(&loaded.config, credentials)?;
            commands::attach_resize(&client, &container, tag).await
        }
    }
}

fn session_client(
    config: &ClientConfig,
    credentials: SharedCredentials,
) -> anyhow::Result<SessionClient> {
    let daemon = DaemonClient::new(&config.host, config.timeout_seconds.map(Duration::from_secs))?;
    let login = Arc::new(PromptLogin::terminal(credentials.clone()));
    Ok(SessionClient::new(daemon, credentials, login))
}
