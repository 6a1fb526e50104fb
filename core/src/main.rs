/// Whisperly client - serves the messenger API for an external renderer
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;
use whisperly_core::messenger_api::start_messenger_api;
use whisperly_core::seed::SeedSnapshot;
use whisperly_core::session_store::SessionStore;
use whisperly_core::transport::DeliverySimulator;
use whisperly_core::{Client, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    // Parse configuration
    let args: Vec<String> = env::args().collect();
    let config = Config::from_args(&args)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    std::fs::create_dir_all(&config.data_dir)?;
    let session = SessionStore::open(&config.data_dir)
        .map_err(|e| anyhow::anyhow!("Session store error: {}", e))?;

    let seed = match &config.seed_file {
        Some(path) => SeedSnapshot::load(path)
            .map_err(|e| anyhow::anyhow!("Seed error: {}", e))?,
        None => SeedSnapshot::builtin(),
    };

    let client = Client::new(seed, session, &config.user_id)
        .map_err(|e| anyhow::anyhow!("Client error: {}", e))?;
    info!("🔐 Starting Whisperly client");
    info!("   User: {}", config.user_id);
    info!("   Data dir: {:?}", config.data_dir);

    let simulator = config
        .simulate_delivery
        .then(|| DeliverySimulator::new(config.delivery_step).start(client.clone()));

    // Serve until Ctrl+C
    tokio::select! {
        res = start_messenger_api(client, config.api_addr) => {
            res.map_err(|e| anyhow::anyhow!("Messenger API error: {}", e))?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
        }
    }

    if let Some(handle) = simulator {
        handle.abort();
    }
    Ok(())
}
