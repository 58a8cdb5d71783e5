//! dutprov - Entry Point
//!
//! One-shot provisioning agent: drives a single Android DUT to a desired
//! (OS build, package set) target through its associated host, or fails
//! cleanly with a classified status.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use dutprov::cancel::cancel_channel;
use dutprov::config::ProvisionConfig;
use dutprov::engine::machine::Engine;
use dutprov::filesys::file::File;
use dutprov::logs::{init_logging, LogLevel, LogOptions};
use dutprov::models::request::ProvisionRequest;
use dutprov::models::response::{
    Failure, Outcome, ProvisionResponse, ProvisionStatus,
};
use dutprov::registry::client::RegistryClient;
use dutprov::remote::host::HostExecutor;
use dutprov::service::context::ProvisionContext;
use dutprov::service::workspace::Workspace;
use dutprov::storage::client::BucketClient;
use dutprov::utils::version_info;

const DEFAULT_REGISTRY_URL: &str = "http://127.0.0.1:8070/registry/v1";
const DEFAULT_STORAGE_URL: &str = "http://127.0.0.1:8071/storage/v1";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        println!(
            "{}",
            serde_json::to_string_pretty(&version_info()).unwrap()
        );
        return;
    }

    let Some(input) = cli_args.get("input") else {
        eprintln!("Usage: dutprov --input=<request.json> --output=<response.json>");
        eprintln!("Optional: --workspace= --log-dir= --log-level= --registry-url= --storage-url=");
        std::process::exit(2);
    };
    let Some(output) = cli_args.get("output") else {
        eprintln!("--output=<response.json> is required");
        std::process::exit(2);
    };
    let output_file = File::new(output);

    // Initialize logging
    let log_options = LogOptions {
        log_level: cli_args
            .get("log-level")
            .and_then(|level| level.parse().ok())
            .unwrap_or(LogLevel::Info),
        log_dir: cli_args.get("log-dir").map(PathBuf::from),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    // Read the provisioning request
    let request: ProvisionRequest = match File::new(input).read_json().await {
        Ok(request) => request,
        Err(e) => {
            error!("Unable to read provisioning request: {}", e);
            let response = failure_response(
                ProvisionStatus::InvalidRequest,
                format!("malformed provisioning request: {e}"),
            );
            write_response(&output_file, &response).await;
            std::process::exit(1);
        }
    };
    info!(
        "Provisioning device {} ({} package(s), os_image={})",
        request.device.serial_number,
        request.packages.len(),
        request.os_image.is_some()
    );

    // Wire operator interrupts to the run's cancellation signal
    let (cancel_source, cancel_token) = cancel_channel();
    tokio::spawn(async move {
        await_shutdown_signal().await;
        cancel_source.cancel();
    });

    // Collaborator adapters
    let config = Arc::new(ProvisionConfig::default());
    let registry_url = cli_args
        .get("registry-url")
        .map(String::as_str)
        .unwrap_or(DEFAULT_REGISTRY_URL);
    let storage_url = cli_args
        .get("storage-url")
        .map(String::as_str)
        .unwrap_or(DEFAULT_STORAGE_URL);

    let setup = || -> Result<Engine, dutprov::errors::ProvisionError> {
        let registry = Arc::new(RegistryClient::new(registry_url)?);
        let image_store = Arc::new(BucketClient::new(storage_url, &config.image_bucket)?);
        let package_store = Arc::new(BucketClient::new(storage_url, &config.package_bucket)?);
        Ok(Engine::new(registry, image_store, package_store, config.clone()))
    };
    let engine = match setup() {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to set up collaborators: {}", e);
            let response = failure_response(
                ProvisionStatus::PreProvisionSetupFailed,
                format!("collaborator setup failed: {e}"),
            );
            write_response(&output_file, &response).await;
            std::process::exit(1);
        }
    };

    // Workspace: explicit path enables download reuse across runs
    let workspace = match cli_args.get("workspace") {
        Some(path) => Workspace::new(path),
        None => Workspace::ephemeral(),
    };
    if let Err(e) = workspace.setup().await {
        error!("Failed to set up workspace: {}", e);
        let response = failure_response(
            ProvisionStatus::PreProvisionSetupFailed,
            format!("workspace setup failed: {e}"),
        );
        write_response(&output_file, &response).await;
        std::process::exit(1);
    }

    let host = match HostExecutor::new() {
        Ok(host) => Arc::new(host),
        Err(e) => {
            error!("Failed to create host executor: {}", e);
            let response = failure_response(
                ProvisionStatus::PreProvisionSetupFailed,
                format!("host executor setup failed: {e}"),
            );
            write_response(&output_file, &response).await;
            std::process::exit(1);
        }
    };

    // Run the state machine
    let mut ctx = ProvisionContext::new(request, host, cancel_token, workspace);
    let result = engine.run(&mut ctx).await;

    let outcome = match &result {
        Ok(()) => Outcome::Success,
        Err(failure) => Outcome::Failure(Failure {
            status: failure.status,
            message: failure.message.clone(),
        }),
    };
    let response = ProvisionResponse {
        outcome,
        build_info: ctx.build_snapshot(),
        packages: ctx.updated_packages(),
        finished_at: chrono::Utc::now(),
    };
    write_response(&output_file, &response).await;

    match result {
        Ok(()) => info!("Provisioning complete"),
        Err(failure) => {
            error!("Provisioning failed: {}", failure);
            std::process::exit(1);
        }
    }
}

fn failure_response(status: ProvisionStatus, message: String) -> ProvisionResponse {
    ProvisionResponse {
        outcome: Outcome::Failure(Failure { status, message }),
        build_info: None,
        packages: Vec::new(),
        finished_at: chrono::Utc::now(),
    }
}

async fn write_response(output_file: &File, response: &ProvisionResponse) {
    if let Err(e) = output_file.write_json(response).await {
        error!("Failed to write response to {:?}: {}", output_file.path(), e);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();
        let mut sigint = signal(SignalKind::interrupt()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, cancelling run...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, cancelling run...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, cancelling run...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, cancelling run...");
    }
}
