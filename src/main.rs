use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use gorun::config::{CliArgs, resolve_port};
use gorun::web_server::build_server;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config()?;

    let env_port = std::env::var("PORT").ok();
    let port = resolve_port(env_port.as_deref(), config.server.bind_port)?;

    let server =
        build_server(config, port, PathBuf::from(".")).context("Failed to build server")?;
    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Ctrl-c received, shutting down...");
        }
        res_server = server_task => {
            log::error!("Server terminated unexpectedly: {:?}", res_server);
        }
    }

    server_handle.stop(true).await;

    log::info!("Shutdown complete");
    Ok(())
}
