#[path = "hyperctl/app/mod.rs"]
mod app;
#[path = "hyperctl/args.rs"]
mod args;
#[path = "hyperctl/config/mod.rs"]
mod config;
#[path = "hyperctl/logging.rs"]
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await
}
