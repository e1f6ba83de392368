use std::process::ExitCode;

use tracing::{error, info, warn};

use filehost::file::{FileService, FileStorage, UploadPolicy};
use filehost::web::{AppState, WebServer};
use filehost::{Config, Database};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    // Initialize logging
    if let Err(e) = filehost::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        filehost::logging::init_console_only(&config.logging.level);
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("filehost stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> filehost::Result<()> {
    info!("filehost - Minimal file hosting service");

    let db = Database::open(&config.database.path).await?;
    let storage = FileStorage::new(&config.files.upload_dir)?;
    info!("Upload directory: {}", config.files.upload_dir);

    let service =
        FileService::new(db.clone(), storage).with_policy(UploadPolicy::from_config(&config.files));

    if config.files.reconcile_on_startup {
        let report = service.reconcile().await?;
        if !report.missing_files.is_empty() {
            warn!(
                "{} record(s) have no backing file",
                report.missing_files.len()
            );
        }
        info!(
            removed = report.removed_files.len(),
            missing = report.missing_files.len(),
            "Reconciliation complete"
        );
    }

    info!("Serving {} recorded file(s)", service.count().await?);

    let state = AppState::new(service, config.files.max_upload_size_bytes());
    WebServer::new(&config.server, state).run().await?;

    db.close().await;
    info!("filehost stopped");
    Ok(())
}
