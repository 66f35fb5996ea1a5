use clap::{command, Parser};
use tracing::Level;

#[derive(Parser)]
#[command(version)]
pub struct CliOpts {
	/// Path to the toml configuration file
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<String>,
	/// P2P port
	#[arg(short, long)]
	pub port: Option<u16>,
	/// Bootstrap peer multiaddress, overriding the configured list. Repeatable.
	#[arg(long = "bootstrap-peer", value_name = "MULTIADDR")]
	pub bootstrap_peers: Vec<String>,
	/// Start as a founding bootnode, skipping peer discovery
	#[arg(long)]
	pub bootnode: bool,
	/// Seed string for libp2p keypair generation
	#[arg(long)]
	pub seed: Option<String>,
	/// ed25519 private key for libp2p keypair generation
	#[arg(long)]
	pub private_key: Option<String>,
	/// Swarm directory gateway URL
	#[arg(long)]
	pub directory_endpoint: Option<String>,
	/// Swarm coordinator contract address
	#[arg(long)]
	pub contract_address: Option<String>,
	/// Log level
	#[arg(long)]
	pub verbosity: Option<Level>,
	/// Set logs format to JSON
	#[arg(long)]
	pub logs_json: bool,
}
