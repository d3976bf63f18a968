use farmified_messaging::libs::server::{config::Config, start_server};
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(err) = start_server(Config::load()).await {
        error!("Server failed: {err}");
        std::process::exit(1);
    }
}
