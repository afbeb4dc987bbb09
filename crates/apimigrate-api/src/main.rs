use anyhow::Context;
use apimigrate_api::Server;
use apimigrate_core::ConfigManager;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "apimigrate-api", version, about = "Apigee Edge to Apigee X migration service")]
struct Cli {
    /// Directory holding default.toml / {env}.toml / local.toml
    #[arg(long, env = "APIMIGRATE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Environment name used to pick the override file
    #[arg(long)]
    env: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Reload configuration when files in the config directory change
    #[arg(long)]
    watch_config: bool,
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{level},tower_http=info").into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.watch_config {
        ConfigManager::new_watching(cli.config_dir, cli.env)?
    } else {
        ConfigManager::load(cli.config_dir, cli.env)?
    };

    let addr = {
        let mut settings = config.settings().write().await;
        if let Some(host) = cli.host {
            settings.server.host = host;
        }
        if let Some(port) = cli.port {
            settings.server.port = port;
        }
        init_tracing(&settings.logging.level, settings.logging.json);

        let ip: IpAddr = settings
            .server
            .host
            .parse()
            .with_context(|| format!("invalid server.host {:?}", settings.server.host))?;
        SocketAddr::new(ip, settings.server.port)
    };

    let server = Server::new(addr, config).await?;
    server.run().await
}
