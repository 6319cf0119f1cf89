//! image-gate - On-the-fly image resizing behind signed URLs.
//!
//! This binary starts the HTTP server or prints signed URLs.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_gate::{
    config::{Cli, Command, ServeConfig, SignConfig, SignOutputFormat},
    server::{create_router, ImageMiddleware, RouterConfig, Signature, UrlBuilder},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Sign(config) => run_sign(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let middleware = match config.to_options().and_then(ImageMiddleware::new) {
        Ok(middleware) => middleware,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let options = middleware.options();
    info!("image-gate v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Source: {}", options.source.display());
    info!("  Cache: {}", options.cache.display());
    info!("  Base URL: {}", options.base_url);
    match &options.cache_time {
        Some(cache_time) => info!("  Cache time: {}", cache_time),
        None => info!("  Cache time: disabled"),
    }

    if config.signing_enabled() {
        info!("  Signed URLs: required");
    } else {
        warn!("  Signed URLs: DISABLED - any size of any image can be requested");
        warn!("               Enable for production: --sign-key=<secret>");
    }

    let router = create_router(middleware.clone(), build_router_config(&config));
    let addr = config.bind_address();

    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("    curl http://{}/health", addr);
    info!(
        "    curl http://{}{}",
        addr,
        middleware.url_builder().url("example.jpg", &[("w", "200")])
    );
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_gate=debug,tower_http=debug"
    } else {
        "image_gate=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new();

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Sign Command
// =============================================================================

fn run_sign(config: SignConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let params = match config.parse_params() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let params_ref: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let builder = UrlBuilder::new(&config.base_url, Some(Signature::new(&config.sign_key)));
    let signed_url = builder.url(&config.path, &params_ref);

    match config.format {
        SignOutputFormat::Url => {
            println!("{}", signed_url);
        }
        SignOutputFormat::Json => {
            let signature = signed_url
                .split_once('?')
                .and_then(|(_, query)| {
                    url::form_urlencoded::parse(query.as_bytes())
                        .find(|(key, _)| key == "s")
                        .map(|(_, value)| value.into_owned())
                })
                .unwrap_or_default();

            let json = serde_json::json!({
                "url": signed_url,
                "signature": signature,
                "path": config.path,
                "base_url": config.base_url,
                "params": params
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect::<serde_json::Map<_, _>>(),
            });
            match serde_json::to_string_pretty(&json) {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}
