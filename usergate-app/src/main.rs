//! # Usergate Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize logging and optional OpenTelemetry export
//! - Initialize the repository adapter
//! - Create the account service and the gates
//! - Start the HTTP server and close the pool once it stops

mod config;

use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use usergate_hex::{
    AccountService, JwtService,
    inbound::{HttpServer, RateLimiterState, ServiceKeyGate},
};
use usergate_repo::{PoolSettings, build_repo};

use config::Config;

fn init_tracer(endpoint: &str) -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("usergate-service"), provider))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    if !config::is_production_env() {
        dotenvy::dotenv().ok();
    }

    let config = Config::from_env()?;

    // Initialize OpenTelemetry tracing when an endpoint is configured
    let (telemetry, otel_provider) = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let (tracer, provider) = init_tracer(endpoint)?;
            (
                Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                Some(provider),
            )
        }
        None => (None, None),
    };

    // Initialize tracing subscriber
    let production = config.is_production();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,usergate_app=debug,usergate_hex=debug".into()),
        )
        .with(production.then(|| fmt::layer().json()))
        .with((!production).then(fmt::layer))
        .with(telemetry)
        .init();

    tracing::info!(
        env = %config.app_env,
        port = config.port,
        otlp = config.otlp_endpoint.is_some(),
        "Starting usergate server"
    );

    // Build repository (handles connection and migration)
    let repo = build_repo(
        &config.database_url,
        PoolSettings {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            max_lifetime: config.db_conn_max_lifetime,
            query_timeout: config.db_query_timeout,
            ..PoolSettings::default()
        },
    )
    .await?;
    let pool = repo.clone();

    let jwt = JwtService::new(
        config.jwt_secret.as_bytes(),
        config.jwt_access_ttl,
        config.jwt_refresh_ttl,
    );
    let service = AccountService::new(repo, jwt, config.upload_root.clone())
        .with_demo_stats(config.demo_stats);

    let service_key = ServiceKeyGate::from_hex(&config.service_key_hex, &config.service_iv_hex)?
        .with_dev_bypass(config.service_key_dev_bypass.clone())
        .with_public_paths(config.service_key_public_paths.clone());
    if config.service_key_dev_bypass.is_some() {
        tracing::warn!("service key dev bypass is enabled");
    }

    // Create and run the HTTP server
    let server = HttpServer::with_rate_limit(
        service,
        service_key,
        RateLimiterState::new(config.rate_limit_requests, config.rate_limit_window),
    );
    let addr = format!("0.0.0.0:{}", config.port);

    let outcome = server.run(&addr, config.shutdown_grace).await;

    pool.close().await;
    tracing::info!("Database connection closed");

    // Ensure traces are flushed before exit
    if let Some(provider) = otel_provider {
        let _ = provider.shutdown();
    }
    outcome
}
