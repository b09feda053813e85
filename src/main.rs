//! Function host (v1)
//!
//! Runs a demo webhook handler behind the Lambda Runtime API, or behind a
//! local `POST /invoke` server when `LOCAL_LAMBDA_SERVER_ENABLED=true`.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                    FUNCTION HOST                      │
//!                 │                                                       │
//!   Runtime API   │  ┌───────────┐    ┌────────────┐    ┌─────────────┐  │
//!   or /invoke ───┼─▶│  runtime  │───▶│  handler   │───▶│ user handler│──┼──▶ outbound
//!                 │  │event loop │◀───│  adapter   │◀───│             │  │    HTTP
//!                 │  └─────┬─────┘    └────────────┘    └──────┬──────┘  │
//!                 │        │ cancel                            │ borrow  │
//!                 │  ┌─────┴──────────────┐            ┌───────┴──────┐  │
//!                 │  │ lifecycle          │  release   │  resource    │  │
//!                 │  │ coordinator +      │───────────▶│ shared HTTP  │  │
//!                 │  │ orchestrator       │  (once)    │ client       │  │
//!                 │  └─────▲──────────────┘            └──────────────┘  │
//!                 │        │ SIGTERM / SIGINT                             │
//!                 └────────┴──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use function_host::config::{
    env_config, load_config, read_config, validate_config, ConfigError, HostConfig,
};
use function_host::handler::{Handler, HandlerContext, HandlerError};
use function_host::observability::{logging, metrics};
use function_host::runtime::{GatewayRequest, GatewayResponse, InvocationMetadata};
use function_host::FunctionHost;

const DEMO_URL: &str = "https://example.com";
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Parser)]
#[command(name = "function-host")]
#[command(about = "Hosts a webhook handler with a shared HTTP client", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults plus environment when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve POST /invoke locally instead of polling the Runtime API
    #[arg(long)]
    local: bool,
}

/// Fetches a fixed page with the shared client and returns its body.
struct DemoHandler;

impl Handler for DemoHandler {
    async fn handle(
        &self,
        context: &HandlerContext,
        request: GatewayRequest,
        metadata: &InvocationMetadata,
    ) -> Result<GatewayResponse, HandlerError> {
        tracing::info!(
            request_id = %metadata.request_id,
            method = request.method(),
            path = %request.raw_path,
            "Received event"
        );

        let client = context.http_client()?;
        let response = client
            .get(DEMO_URL)
            .timeout(Duration::from_secs(5))
            .send()
            .await?;

        let body = read_capped(response, MAX_BODY_BYTES).await?;
        tracing::info!(url = DEMO_URL, bytes = body.len(), "Fetched upstream body");

        Ok(GatewayResponse::new(200, String::from_utf8_lossy(&body).into_owned()))
    }
}

/// Read a response body chunk by chunk, failing once it would exceed `cap` bytes.
async fn read_capped(mut response: reqwest::Response, cap: usize) -> Result<Vec<u8>, HandlerError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > cap {
            return Err(HandlerError::other(format!("upstream body exceeds {cap} bytes")));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Read the configuration, apply command-line overrides, then validate.
fn load(cli: &Cli) -> Result<HostConfig, ConfigError> {
    if let (Some(path), false) = (&cli.config, cli.local) {
        return load_config(path);
    }
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => env_config(),
    };
    if cli.local {
        config.local.enabled = true;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("function-host: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(name = %config.name, "function-host v0.1.0 starting");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    match FunctionHost::new(config, DemoHandler).run().await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) if e.is_fatal() => {
            tracing::error!(error = %e, "Function host failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::warn!(error = %e, "Function host stopped with teardown errors");
            ExitCode::SUCCESS
        }
    }
}
