use clap::Parser;
use cli::CliOpts;
use color_eyre::{eyre::WrapErr, Result};
use config::RuntimeConfig;
use std::time::Duration;
use tracing::{error, info, span, warn, Level, Subscriber};
use tracing_subscriber::{
	fmt::format::{self},
	EnvFilter, FmtSubscriber,
};
use trainswarm_core::{
	bootstrap::Coordinator,
	directory::HttpDirectory,
	network::{DhtSession, P2pTransport},
	shutdown::Controller,
	types::{SecretKey, BOOTNODE_SENTINEL},
	utils::spawn_in_span,
};
use uuid::Uuid;

mod cli;
mod config;

const ROUTING_TABLE_LOG_INTERVAL: Duration = Duration::from_secs(60);

pub fn json_subscriber(log_level: Level) -> impl Subscriber + Send + Sync {
	FmtSubscriber::builder()
		.json()
		.with_env_filter(EnvFilter::new(format!(
			"trainswarm_client={log_level},trainswarm_core={log_level}"
		)))
		.with_span_events(format::FmtSpan::CLOSE)
		.finish()
}

pub fn default_subscriber(log_level: Level) -> impl Subscriber + Send + Sync {
	FmtSubscriber::builder()
		.with_env_filter(EnvFilter::new(format!(
			"trainswarm_client={log_level},trainswarm_core={log_level}"
		)))
		.with_span_events(format::FmtSpan::CLOSE)
		.finish()
}

pub fn load_runtime_config(opts: &CliOpts) -> Result<RuntimeConfig> {
	let mut cfg: RuntimeConfig = if let Some(cfg_path) = &opts.config {
		confy::load_path(cfg_path)
			.wrap_err(format!("Failed to load configuration from: {cfg_path}"))?
	} else {
		RuntimeConfig::default()
	};

	cfg.log_format_json = opts.logs_json || cfg.log_format_json;
	cfg.log_level = opts.verbosity.unwrap_or(cfg.log_level);

	if !opts.bootstrap_peers.is_empty() {
		cfg.bootstrap_peers = opts.bootstrap_peers.clone();
	}

	if opts.bootnode {
		cfg.bootstrap_peers = vec![BOOTNODE_SENTINEL.to_string()];
	}

	if let Some(port) = opts.port {
		cfg.dht.port = port;
	}

	if let Some(secret_key) = &opts.private_key {
		cfg.dht.secret_key = Some(SecretKey::Key {
			key: secret_key.to_string(),
		});
	}

	if let Some(seed) = &opts.seed {
		cfg.dht.secret_key = Some(SecretKey::Seed {
			seed: seed.to_string(),
		})
	}

	if let Some(endpoint) = &opts.directory_endpoint {
		cfg.directory.endpoint = endpoint.clone();
	}

	if let Some(contract_address) = &opts.contract_address {
		cfg.directory.contract_address = contract_address.clone();
	}

	Ok(cfg)
}

async fn run(cfg: RuntimeConfig, shutdown: Controller<String>) -> Result<DhtSession> {
	let version = clap::crate_version!();
	info!(version, "Running {}", clap::crate_name!());
	info!("Using config: {cfg:?}");

	let directory = HttpDirectory::new(&cfg.directory)?;
	let transport = P2pTransport::new(cfg.dht.clone());
	let coordinator = Coordinator::new(directory, transport);

	let session = coordinator
		.bootstrap(&cfg.bootstrap_peers)
		.await
		.wrap_err("Unable to join the swarm")?;
	info!(peer_id = %session.peer_id, "Swarm session established");

	let client = session.client.clone();
	spawn_in_span(shutdown.with_cancel(async move {
		let mut interval = tokio::time::interval(ROUTING_TABLE_LOG_INTERVAL);
		interval.tick().await;
		loop {
			interval.tick().await;
			match client.count_dht_entries().await {
				Ok(entries) => info!(entries, "DHT routing table size"),
				Err(error) => warn!("Unable to count DHT entries: {error:#}"),
			}
		}
	}));

	Ok(session)
}

#[tokio::main]
async fn main() -> Result<()> {
	let shutdown = Controller::<String>::new();
	let opts = CliOpts::parse();
	let cfg = load_runtime_config(&opts)?;

	if cfg.log_format_json {
		tracing::subscriber::set_global_default(json_subscriber(cfg.log_level))?;
	} else {
		tracing::subscriber::set_global_default(default_subscriber(cfg.log_level))?;
	};

	let execution_id = Uuid::new_v4();
	let span = span!(
		Level::INFO,
		"run",
		execution_id = execution_id.to_string()
	);
	// Do not enter span if logs format is not JSON
	let _enter = if cfg.log_format_json {
		Some(span.enter())
	} else {
		None
	};

	// watch for ctrl-c signals from user to trigger the shutdown
	spawn_in_span(shutdown.on_user_signal("User signaled shutdown".to_string()));

	let session = match run(cfg, shutdown.clone()).await {
		Ok(session) => session,
		Err(error) => {
			error!("{error:#}");
			return Err(error.wrap_err("Starting swarm client failed"));
		},
	};

	let reason = shutdown.triggered_shutdown().await;
	info!("Shutting down: {reason}");
	session
		.controller
		.trigger_shutdown(format!("Client shutdown: {reason}"));

	Ok(())
}
