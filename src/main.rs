mod handlers;

use axum::{Router, routing};
use chef_deploy_hook::error::HookError;
use chef_deploy_hook::job::JobStore;
use chef_deploy_hook::logging::init_logging;
use chef_deploy_hook::mailer::SmtpMailer;
use chef_deploy_hook::{AppState, Binaries, Config};
use chrono::Utc;
use handlers::{get_job, handle_deploy_hook, root, status};
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "chefdeploy.toml";
const DEFAULT_MAX_JOBS: usize = 24;

/// Load and parse the configuration file
fn load_config(path: &str) -> Result<Config, HookError> {
    let config_str = fs::read_to_string(path).map_err(|e| {
        HookError::ConfigError(format!("Failed to read config file '{}': {}", path, e))
    })?;

    let config: Config = toml::from_str(&config_str).map_err(|e| {
        HookError::ConfigError(format!("Failed to parse config file '{}': {}", path, e))
    })?;

    Ok(config)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config_path =
        std::env::var("CHEFDEPLOY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config: Config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Ok(bind) = std::env::var("BIND_ADDRESS") {
        config.server.bind = bind;
    }

    // Refuse to start without the external tools
    let binaries = match Binaries::resolve(&config.deploy) {
        Ok(binaries) => binaries,
        Err(e) => {
            eprintln!("{}, exiting.", e);
            std::process::exit(1);
        }
    };

    let mailer = match SmtpMailer::from_config(&config.mail) {
        Ok(mailer) => mailer,
        Err(e) => {
            eprintln!("Mail configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let _log_guard = match init_logging(&config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Logging setup error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Using config at {:?}", config_path);
    info!(
        "Using git at {} and knife at {}",
        binaries.git.display(),
        binaries.knife.display()
    );

    let bind_address = config.server.bind.clone();
    let state = Arc::new(AppState {
        deploy_lock: Mutex::new(()),
        job_store: Mutex::new(JobStore::new(DEFAULT_MAX_JOBS)),
        config,
        binaries,
        mailer,
        start_time: Instant::now(),
        started_at: Utc::now(),
    });

    let app = Router::new()
        .route("/", routing::get(root))
        .route("/chefdeploy", routing::post(handle_deploy_hook))
        .route("/status", routing::get(status))
        .route("/job/{id}", routing::get(get_job))
        .with_state(state);

    info!("Listening on {}", bind_address);
    let listener = tokio::net::TcpListener::bind(bind_address).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
