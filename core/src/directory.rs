//! Swarm directory: the on-chain registry of bootstrap peers.
//!
//! The coordinator contract itself is opaque to this client; it is reached
//! through an HTTP gateway that exposes the bootnode list and peer
//! registration per contract address.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use libp2p::PeerId;
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::types::PeerAddress;

#[derive(Debug, Error)]
pub enum DirectoryError {
	/// Bootnode listing failed. Fatal for the current bootstrap run.
	#[error("swarm directory unavailable: {0}")]
	Unavailable(String),
	/// Self-registration failed after a successful join. Advisory only.
	#[error("peer registration rejected: {0}")]
	Registration(String),
}

#[automock]
#[async_trait]
pub trait SwarmDirectory {
	/// Returns the bootstrap peers currently registered on chain. May be empty.
	async fn bootstrap_peers(&self) -> Result<Vec<PeerAddress>, DirectoryError>;

	/// Registers the local node under the given peer ID so that future
	/// joiners can discover it.
	async fn register_peer(&self, peer_id: &PeerId) -> Result<(), DirectoryError>;
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DirectoryConfig {
	/// Swarm directory gateway URL.
	pub endpoint: String,
	/// Coordinator contract address the node registers against.
	pub contract_address: String,
	/// EOA wallet private key. Mutually exclusive with `org_id`.
	pub wallet_private_key: Option<String>,
	/// Managed organization ID. Mutually exclusive with `wallet_private_key`.
	pub org_id: Option<String>,
}

impl Default for DirectoryConfig {
	fn default() -> Self {
		DirectoryConfig {
			endpoint: "http://127.0.0.1:8545".to_string(),
			contract_address: "".to_string(),
			wallet_private_key: None,
			org_id: None,
		}
	}
}

#[derive(Debug, Clone)]
enum Credential {
	Wallet(String),
	Org(String),
}

impl DirectoryConfig {
	fn credential(&self) -> Result<Option<Credential>> {
		match (&self.wallet_private_key, &self.org_id) {
			(Some(_), Some(_)) => Err(eyre!(
				"wallet_private_key and org_id are mutually exclusive"
			)),
			(Some(key), None) => Ok(Some(Credential::Wallet(key.clone()))),
			(None, Some(org)) => Ok(Some(Credential::Org(org.clone()))),
			(None, None) => Ok(None),
		}
	}
}

/// HTTP gateway client for the swarm coordinator contract.
pub struct HttpDirectory {
	client: reqwest::Client,
	endpoint: String,
	contract_address: String,
	credential: Option<Credential>,
}

impl HttpDirectory {
	pub fn new(cfg: &DirectoryConfig) -> Result<Self> {
		Ok(HttpDirectory {
			client: reqwest::Client::new(),
			endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
			contract_address: cfg.contract_address.clone(),
			credential: cfg.credential()?,
		})
	}

	fn url(&self, suffix: &str) -> String {
		format!(
			"{}/api/v1/contracts/{}/{suffix}",
			self.endpoint, self.contract_address
		)
	}

	fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
		match &self.credential {
			Some(Credential::Wallet(key)) => request.header("X-Wallet-Key", key),
			Some(Credential::Org(org)) => request.header("X-Org-Id", org),
			None => request,
		}
	}
}

#[derive(Serialize, Deserialize, Debug)]
struct RegisterPeer {
	peer_id: String,
}

#[async_trait]
impl SwarmDirectory for HttpDirectory {
	async fn bootstrap_peers(&self) -> Result<Vec<PeerAddress>, DirectoryError> {
		let response = self
			.authorize(self.client.get(self.url("bootnodes")))
			.send()
			.await
			.and_then(|response| response.error_for_status())
			.map_err(|error| DirectoryError::Unavailable(error.to_string()))?;

		let addresses: Vec<String> = response
			.json()
			.await
			.map_err(|error| DirectoryError::Unavailable(error.to_string()))?;

		let mut peers = Vec::with_capacity(addresses.len());
		for address in addresses {
			match PeerAddress::from_str(&address) {
				Ok(peer) => peers.push(peer),
				// Stale or malformed chain entries must not poison the whole list
				Err(error) => warn!(%address, "Skipping unusable bootnode entry: {error}"),
			}
		}
		Ok(peers)
	}

	async fn register_peer(&self, peer_id: &PeerId) -> Result<(), DirectoryError> {
		let record = RegisterPeer {
			peer_id: peer_id.to_string(),
		};
		self.authorize(self.client.post(self.url("peers")))
			.json(&record)
			.send()
			.await
			.and_then(|response| response.error_for_status())
			.map_err(|error| DirectoryError::Registration(error.to_string()))?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn credentials_are_mutually_exclusive() {
		let cfg = DirectoryConfig {
			wallet_private_key: Some("0xdeadbeef".to_string()),
			org_id: Some("org-1".to_string()),
			..Default::default()
		};
		assert!(HttpDirectory::new(&cfg).is_err());
	}

	#[test]
	fn single_credential_is_accepted() {
		let wallet_only = DirectoryConfig {
			wallet_private_key: Some("0xdeadbeef".to_string()),
			..Default::default()
		};
		assert!(HttpDirectory::new(&wallet_only).is_ok());

		let org_only = DirectoryConfig {
			org_id: Some("org-1".to_string()),
			..Default::default()
		};
		assert!(HttpDirectory::new(&org_only).is_ok());

		assert!(HttpDirectory::new(&DirectoryConfig::default()).is_ok());
	}

	#[test]
	fn gateway_urls_are_scoped_to_the_contract() {
		let cfg = DirectoryConfig {
			endpoint: "http://gateway.example/".to_string(),
			contract_address: "0xabc".to_string(),
			..Default::default()
		};
		let directory = HttpDirectory::new(&cfg).unwrap();
		assert_eq!(
			directory.url("bootnodes"),
			"http://gateway.example/api/v1/contracts/0xabc/bootnodes"
		);
	}

	#[test]
	fn register_payload_carries_the_peer_id() {
		let peer_id = PeerId::random();
		let record = RegisterPeer {
			peer_id: peer_id.to_string(),
		};
		let json = serde_json::to_value(&record).unwrap();
		assert_eq!(json["peer_id"], peer_id.to_string());
	}
}
