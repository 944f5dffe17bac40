use clap::Parser;
use scribe_core::ScribeConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "scribe.toml")]
    config: String,

    /// Print the resolved configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match ScribeConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let level = config
        .service
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    if args.check_config {
        println!("✅ Config loaded from {}", args.config);
        println!("   HTTP:       {}:{} (enabled: {})", config.http.host, config.http.port, config.http.enabled);
        println!("   Generative: {} (enabled: {})", config.generative.model, config.generative.enabled);
        println!(
            "   {}: {}",
            config.generative.api_key_env,
            if config.generative.api_key().is_some() { "set" } else { "missing" }
        );
        println!(
            "   {}: {}",
            config.relay.api_key_env,
            if config.relay.api_key().is_some() { "set" } else { "missing" }
        );
        return Ok(());
    }

    if !config.http.enabled {
        tracing::warn!("HTTP surface disabled in config, nothing to serve");
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    scribe_server::http::start_http_server(config, tx.subscribe()).await?;

    Ok(())
}
