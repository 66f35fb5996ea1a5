use serde::{Deserialize, Serialize};
use tracing::Level;
use trainswarm_core::{
	directory::DirectoryConfig,
	types::{tracing_level_format, DhtConfig},
};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
	/// Bootstrap peer multiaddresses. An empty list triggers on-chain discovery;
	/// the single entry "BOOT" starts the node as a founding bootnode.
	pub bootstrap_peers: Vec<String>,
	/// Log level, default is `INFO`. See `<https://docs.rs/log/0.4.14/log/enum.LevelFilter.html>`
	/// for possible log level values. (default: `INFO`).
	#[serde(with = "tracing_level_format")]
	pub log_level: Level,
	/// If set to true, logs are displayed in JSON format, which is used for structured
	/// logging. Otherwise, plain text format is used (default: false).
	pub log_format_json: bool,
	#[serde(flatten)]
	pub dht: DhtConfig,
	pub directory: DirectoryConfig,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		RuntimeConfig {
			bootstrap_peers: vec![],
			log_level: Level::INFO,
			log_format_json: false,
			dht: Default::default(),
			directory: Default::default(),
		}
	}
}
