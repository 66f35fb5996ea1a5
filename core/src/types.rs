//! Shared swarm client structs and serde helpers.

use color_eyre::{eyre::eyre, Report};
use libp2p::{multiaddr::Protocol, Multiaddr, PeerId};
use serde::{Deserialize, Serialize};
use std::{
	fmt::{self, Display, Formatter},
	net::Ipv4Addr,
	str::FromStr,
	time::Duration,
};

/// Single-element bootstrap peer list with this literal as its only entry
/// explicitly requests founding bootnode mode.
pub const BOOTNODE_SENTINEL: &str = "BOOT";

/// Network address of a swarm peer: a multiaddress carrying a trailing
/// `/p2p/<peer id>` component.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress {
	peer_id: PeerId,
	multiaddr: Multiaddr,
}

impl PeerAddress {
	pub fn peer_id(&self) -> PeerId {
		self.peer_id
	}

	pub fn multiaddr(&self) -> &Multiaddr {
		&self.multiaddr
	}
}

impl FromStr for PeerAddress {
	type Err = Report;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		let multiaddr = Multiaddr::from_str(value)?;
		let Some(Protocol::P2p(peer_id)) = multiaddr.iter().last() else {
			return Err(eyre!(
				"Multiaddress `{value}` is missing the /p2p/<peer-id> component"
			));
		};
		Ok(PeerAddress { peer_id, multiaddr })
	}
}

impl TryFrom<String> for PeerAddress {
	type Error = Report;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<PeerAddress> for String {
	fn from(value: PeerAddress) -> Self {
		value.multiaddr.to_string()
	}
}

impl From<&PeerAddress> for (PeerId, Multiaddr) {
	fn from(value: &PeerAddress) -> Self {
		(value.peer_id, value.multiaddr.clone())
	}
}

impl Display for PeerAddress {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		self.multiaddr.fmt(f)
	}
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum SecretKey {
	Seed { seed: String },
	Key { key: String },
}

/// DHT transport configuration (see client `RuntimeConfig` for defaults).
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DhtConfig {
	/// P2P TCP listener port (default: 39000).
	pub port: u16,
	/// Secret key used to generate the libp2p keypair. Can be set to a seed string or a
	/// hex-encoded ed25519 private key. A random identity is generated when omitted.
	pub secret_key: Option<SecretKey>,
	/// Kademlia protocol name negotiated with swarm peers.
	pub protocol_name: String,
	/// Identify protocol version.
	pub protocol_version: String,
	/// Agent version advertised through the identify protocol.
	pub agent_version: String,
	/// Kademlia query timeout, in seconds (default: 60).
	#[serde(with = "duration_seconds_format")]
	pub query_timeout: Duration,
	/// Interval between periodic Kademlia bootstraps after the startup one, in seconds
	/// (default: 300).
	#[serde(with = "duration_seconds_format")]
	pub bootstrap_interval: Duration,
}

impl Default for DhtConfig {
	fn default() -> Self {
		DhtConfig {
			port: 39000,
			secret_key: None,
			protocol_name: "/trainswarm/kad/1.0.0".to_string(),
			protocol_version: "/trainswarm/1.0.0".to_string(),
			agent_version: format!("trainswarm-client/{}", env!("CARGO_PKG_VERSION")),
			query_timeout: Duration::from_secs(60),
			bootstrap_interval: Duration::from_secs(300),
		}
	}
}

impl DhtConfig {
	pub fn tcp_multiaddress(&self) -> Multiaddr {
		Multiaddr::empty()
			.with(Protocol::from(Ipv4Addr::UNSPECIFIED))
			.with(Protocol::Tcp(self.port))
	}
}

pub mod tracing_level_format {
	use serde::{self, Deserialize, Deserializer, Serializer};
	use std::str::FromStr;
	use tracing::Level;

	pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&level.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;
		Level::from_str(&value).map_err(serde::de::Error::custom)
	}
}

pub mod duration_seconds_format {
	use serde::{self, Deserialize, Deserializer, Serializer};
	use std::time::Duration;

	pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(duration.as_secs())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = u64::deserialize(deserializer)?;
		Ok(Duration::from_secs(value))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const ADDRESS: &str =
		"/ip4/127.0.0.1/tcp/39000/p2p/12D3KooWStAKPADXqJ7cngPYXd2mSANpdgh1xQ34aouufHA2xShz";

	#[test]
	fn peer_address_parses_trailing_peer_id() {
		let address = PeerAddress::from_str(ADDRESS).unwrap();
		assert_eq!(
			address.peer_id().to_string(),
			"12D3KooWStAKPADXqJ7cngPYXd2mSANpdgh1xQ34aouufHA2xShz"
		);
		assert_eq!(address.to_string(), ADDRESS);
	}

	#[test]
	fn peer_address_requires_peer_id_component() {
		let result = PeerAddress::from_str("/ip4/127.0.0.1/tcp/39000");
		assert!(result.is_err());
	}

	#[test]
	fn peer_address_rejects_garbage() {
		assert!(PeerAddress::from_str("not-a-multiaddress").is_err());
		assert!(PeerAddress::from_str(BOOTNODE_SENTINEL).is_err());
	}

	#[test]
	fn peer_address_serde_round_trip() {
		let json = format!("\"{ADDRESS}\"");
		let address: PeerAddress = serde_json::from_str(&json).unwrap();
		assert_eq!(serde_json::to_string(&address).unwrap(), json);
	}

	#[test]
	fn dht_config_defaults() {
		let cfg: DhtConfig = serde_json::from_str("{}").unwrap();
		assert_eq!(cfg.port, 39000);
		assert_eq!(cfg.query_timeout, Duration::from_secs(60));
		assert_eq!(cfg.tcp_multiaddress().to_string(), "/ip4/0.0.0.0/tcp/39000");
	}
}
