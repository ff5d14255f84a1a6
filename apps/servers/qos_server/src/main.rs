mod config;
mod routes;

use std::sync::Arc;

use anyhow::Result;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use prometheus::Registry;
use qos_gate::{admission_middleware, AdmissionScheduler};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::config::Config;
use crate::routes::{healthz, metrics_handler, work};

#[tokio::main]
async fn main() -> Result<()> {
	dotenv::dotenv().ok();
	let config = Config::parse();
	init_tracing(&config);

	let registry = Arc::new(Registry::new());
	let scheduler = Arc::new(AdmissionScheduler::new(config.qos.clone(), &registry)?);

	let gated_routes = Router::new()
		.route("/work", get(work))
		.route("/healthz", get(healthz))
		.layer(from_fn_with_state(Arc::clone(&scheduler), admission_middleware));

	let public_routes = Router::new().route("/metrics", get(metrics_handler)).with_state(Arc::clone(&registry));

	let app = Router::new()
		.merge(gated_routes)
		.merge(public_routes)
		.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

	let listener = TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
	tracing::info!("listening on {}", listener.local_addr()?);
	axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

	Ok(())
}

async fn shutdown_signal() {
	let _ = tokio::signal::ctrl_c().await;
	tracing::info!("received shutdown signal");
}

fn init_tracing(config: &Config) {
	// Queue waits and rejections are the interesting events here, so the
	// gate logs at debug unless RUST_LOG says otherwise.
	let filter = config.rust_log.as_deref().map_or_else(|| EnvFilter::new("info,qos_gate=debug"), EnvFilter::new);

	if config.log_json {
		tracing_subscriber::registry()
			.with(tracing_subscriber::fmt::layer().json().flatten_event(true).with_filter(filter))
			.init();
	} else {
		tracing_subscriber::registry()
			.with(tracing_subscriber::fmt::layer().pretty().with_filter(filter))
			.init();
	}
}
