/// Configuration management
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_PORT: u16 = 17482;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the session DB
    pub data_dir: PathBuf,

    /// Local messenger API address
    pub api_addr: SocketAddr,

    /// Seed snapshot file (built-in demo data when unset)
    pub seed_file: Option<PathBuf>,

    /// Id of the local user, used as sender/reactor
    pub user_id: String,

    /// Run the simulated transport
    pub simulate_delivery: bool,

    /// Mean gap between simulated acknowledgments
    pub delivery_step: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".whisperly"),
            api_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_API_PORT)),
            seed_file: None,
            user_id: "me".to_string(),
            simulate_delivery: true,
            delivery_step: Duration::from_millis(800),
        }
    }
}

impl Config {
    /// Create config from command line arguments
    pub fn from_args(args: &[String]) -> Result<Self> {
        let usage = || {
            format!(
                "Usage: {} [--data-dir <path>] [--api-port <port>] [--seed <file>] [--user <id>] [--no-delivery-sim]",
                args.first().map(|s| s.as_str()).unwrap_or("whisperly")
            )
        };

        let mut config = Config::default();
        let mut api_port: Option<u16> = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--data-dir" => {
                    let path = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--data-dir requires a path argument".to_string())
                    })?;
                    config.data_dir = PathBuf::from(path);
                    i += 2;
                }
                "--api-port" => {
                    let p = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--api-port requires a port argument".to_string())
                    })?;
                    api_port = Some(p.parse::<u16>().map_err(|_| {
                        ChatError::Config("--api-port must be a valid number (0-65535)".to_string())
                    })?);
                    i += 2;
                }
                "--seed" => {
                    let path = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--seed requires a file argument".to_string())
                    })?;
                    config.seed_file = Some(PathBuf::from(path));
                    i += 2;
                }
                "--user" => {
                    let id = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--user requires an id argument".to_string())
                    })?;
                    if id.trim().is_empty() {
                        return Err(ChatError::Config("--user must not be empty".to_string()));
                    }
                    config.user_id = id.clone();
                    i += 2;
                }
                "--no-delivery-sim" => {
                    config.simulate_delivery = false;
                    i += 1;
                }
                other => {
                    return Err(ChatError::Config(format!(
                        "Unknown argument: {}\n{}",
                        other,
                        usage()
                    )));
                }
            }
        }

        // Env overrides (nice for scripts)
        if let Some(p) = std::env::var("WHISPERLY_API_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
        {
            api_port = Some(p);
        }
        if let Ok(dir) = std::env::var("WHISPERLY_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if std::env::var("WHISPERLY_NO_DELIVERY_SIM").is_ok() {
            config.simulate_delivery = false;
        }

        if let Some(p) = api_port {
            config.api_addr.set_port(p);
        }
        Ok(config)
    }
}
