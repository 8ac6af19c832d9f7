use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use crate::api::{start_server, AppState};
use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::version;
use crate::vision::{ClassificationService, ModelLoader};

/// Eco classifier service
#[derive(Parser, Debug)]
#[command(name = "eco-classifier")]
#[command(version)]
#[command(about = "HTTP service classifying waste images with YOLO models", long_about = None)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(long, short, global = true, env = "ECO_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve(ServeArgs),

    /// Validate the config file and print the model catalog
    CheckConfig,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Bind address, overrides [server].host
    #[arg(long, env = "ECO_HOST")]
    pub host: Option<String>,

    /// Bind port, overrides [server].port
    #[arg(long, env = "ECO_PORT")]
    pub port: Option<u16>,

    /// Upload staging directory, overrides [server].temp_dir
    #[arg(long, env = "ECO_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(temp_dir) = &self.temp_dir {
            config.server.temp_dir = Some(temp_dir.clone());
        }
    }
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        None => serve(&cli.config, ServeArgs::default()).await,
        Some(Commands::Serve(args)) => serve(&cli.config, args).await,
        Some(Commands::CheckConfig) => check_config(&cli.config),
    }
}

/// Load the config file, falling back to built-in defaults when it is absent
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(AppConfig::default());
    }

    let config = AppConfig::load(path)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Build the shared request handler from config
pub fn build_service(config: &AppConfig) -> Result<ClassificationService> {
    let loader = Arc::new(ModelLoader::new(
        config.models.clone(),
        config.inference.clone(),
    ));

    let temp_dir = config.server.temp_dir();
    std::fs::create_dir_all(&temp_dir)
        .with_context(|| format!("Cannot create temp dir {}", temp_dir.display()))?;

    let service = ClassificationService::new(loader, temp_dir);
    Ok(attach_background_remover(service, config))
}

#[cfg(feature = "onnx")]
fn attach_background_remover(
    service: ClassificationService,
    config: &AppConfig,
) -> ClassificationService {
    let Some(model_path) = config.background_removal.model_path.as_deref() else {
        return service;
    };

    match crate::vision::OnnxBackgroundRemover::load(
        model_path,
        config.background_removal.input_size,
        config.inference.intra_threads,
    ) {
        Ok(remover) => {
            service.with_background_remover(Arc::new(remover), config.background_removal.enabled)
        }
        Err(e) => {
            warn!("⚠️ Background removal disabled: {}", e);
            service
        }
    }
}

#[cfg(not(feature = "onnx"))]
fn attach_background_remover(
    service: ClassificationService,
    config: &AppConfig,
) -> ClassificationService {
    if config.background_removal.model_path.is_some() {
        warn!("⚠️ Background removal needs the onnx feature; continuing without it");
    }
    service
}

async fn serve(config_path: &Path, args: ServeArgs) -> Result<()> {
    info!("🚀 Starting {}", version::get_version_string());

    let mut config = load_config(config_path)?;
    args.apply(&mut config);
    config.validate()?;

    let service = build_service(&config)?;
    info!(
        "Model catalog: {:?} (default '{}')",
        config.models.keys(),
        config.models.default
    );

    if config.inference.preload_default {
        let loader = service.loader().clone();
        match tokio::task::spawn_blocking(move || loader.preload()).await {
            Ok(Ok(model)) => info!("✅ Preloaded model '{}'", model.key()),
            Ok(Err(e)) => warn!("⚠️ Failed to preload default model: {}", e),
            Err(e) => warn!("⚠️ Preload task failed: {}", e),
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid bind address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    start_server(AppState::new(service), addr).await
}

fn check_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;

    println!("Config OK: {}", config_path.display());
    println!("Default model: {}", config.models.default);
    for model in config.models.iter() {
        let status = if model.weights_path.exists() {
            "found"
        } else {
            "MISSING"
        };
        println!(
            "  {:<16} {:<40} {} ({})",
            model.key,
            model.display_name,
            model.weights_path.display(),
            status
        );
    }
    Ok(())
}
