use hyperctl::auth::{IndexInfo, Login, PromptLogin, SharedCredentials};
use hyperctl::{random_tag, LogsOptions, Session, SessionClient};
use tokio::io::AsyncWriteExt;

use crate::args::LogsArgs;
use crate::config::{render_config, save_config, LoadedConfig};

pub async fn pull(client: &SessionClient, image: &str) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    client
        .pull_image(image, Some(&mut stdout), Some(&mut stderr))
        .await?;
    stdout.flush().await?;
    Ok(())
}

pub async fn push(client: &SessionClient, image: &str) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    client
        .push_image(image, Some(&mut stdout), Some(&mut stderr))
        .await?;
    stdout.flush().await?;
    Ok(())
}

pub async fn logs(client: &SessionClient, args: &LogsArgs) -> anyhow::Result<()> {
    let options = LogsOptions {
        follow: args.follow,
        timestamps: args.timestamps,
        tail: args.tail.clone(),
        ..LogsOptions::default()
    };
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    match &args.tag {
        Some(tag) => {
            let envelope = client.daemon().container_logs(&args.container, &options).await?;
            let session = Session::new(args.container.as_str(), tag.as_str());
            client
                .interactive(&session, envelope, Some(&mut stdout), Some(&mut stderr))
                .await?;
        }
        None => {
            client
                .container_logs(
                    &args.container,
                    &options,
                    args.tty,
                    Some(&mut stdout),
                    Some(&mut stderr),
                )
                .await?;
        }
    }
    stdout.flush().await?;
    stderr.flush().await?;
    Ok(())
}

pub async fn attach_resize(
    client: &SessionClient,
    container: &str,
    tag: Option<String>,
) -> anyhow::Result<()> {
    let session = Session::new(container, tag.unwrap_or_else(random_tag));
    let sync = client.attach_resize(&session).await?;
    println!("Syncing terminal size to {session}, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    sync.stop().await;
    Ok(())
}

pub async fn login(credentials: SharedCredentials, server: Option<&str>) -> anyhow::Result<()> {
    let key = credentials.read().await.key(&index(server));
    PromptLogin::terminal(credentials).login(&key).await?;
    println!("Login Succeeded");
    Ok(())
}

pub async fn logout(credentials: SharedCredentials, server: Option<&str>) -> anyhow::Result<()> {
    let mut store = credentials.write().await;
    let key = store.key(&index(server));
    store.delete(&key)?;
    println!("Removed login credentials for {key}");
    Ok(())
}

pub fn show_config(loaded: &LoadedConfig, save: bool) -> anyhow::Result<()> {
    print!("{}", render_config(&loaded.config)?);
    if save {
        save_config(&loaded.config, &loaded.paths)?;
        println!("# written to {}", loaded.paths.config_file.display());
    }
    Ok(())
}

fn index(server: Option<&str>) -> IndexInfo {
    server.map(IndexInfo::new).unwrap_or_else(IndexInfo::official)
}
