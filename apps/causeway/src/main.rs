use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use causeway::cli::{self, Cli, Commands};
use causeway::config::Config;
use causeway::hub::Hub;
use causeway::routes;

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let args = Cli::parse();
    if let Some(Commands::Peers { url, name, pin }) = args.command {
        if let Err(e) = cli::run_peers_client(url, name, pin).await {
            error!("peers client error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = Config::from_env();
    info!("starting causeway hub on port {}", config.port);
    if config.pin.is_some() {
        info!("registration pin required");
    }

    let hub = Arc::new(Hub::new(config.pin.clone()));
    let app = routes::router(hub);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!("causeway listening on {}", addr);

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
