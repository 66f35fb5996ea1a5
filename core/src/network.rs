//! DHT transport boundary.
//!
//! [`DhtTransport`] is the seam the bootstrap coordinator drives; its error
//! type separates "no seed peer was reachable" from every other failure,
//! because only the former is eligible for the fallback-to-bootnode retry.

use async_trait::async_trait;
use color_eyre::Report;
use libp2p::PeerId;
use mockall::automock;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
	shutdown::Controller,
	types::{DhtConfig, PeerAddress},
	utils::spawn_in_span,
};

pub mod p2p;

#[derive(Debug, Error)]
pub enum TransportError {
	/// None of the provided seed peers could be reached during bootstrap.
	/// The only failure kind eligible for the fallback-to-bootnode retry.
	#[error("DHT bootstrap failed: none of the {dialed} seed peers are reachable")]
	DialFailure { dialed: usize },
	/// Any other transport failure. Never retried.
	#[error("DHT transport failure: {0}")]
	Internal(String),
}

impl TransportError {
	pub fn is_dial_failure(&self) -> bool {
		matches!(self, TransportError::DialFailure { .. })
	}
}

/// A live DHT session. Ownership passes to the caller only on a successful
/// join; a failed attempt shuts its event loop down internally.
pub struct DhtSession {
	pub client: p2p::Client,
	pub peer_id: PeerId,
	/// Controls the session's event loop; trigger it to leave the swarm.
	pub controller: Controller<String>,
}

#[automock]
#[async_trait]
pub trait DhtTransport {
	/// Drives one attempt to join the swarm. An empty seed set is legal and
	/// starts the node as the sole founding member.
	async fn connect(&self, seeds: &[PeerAddress]) -> Result<DhtSession, TransportError>;
}

/// libp2p Kademlia transport. Every connect attempt gets a fresh swarm,
/// identity and event loop.
pub struct P2pTransport {
	cfg: DhtConfig,
}

impl P2pTransport {
	pub fn new(cfg: DhtConfig) -> Self {
		P2pTransport { cfg }
	}

	async fn establish(
		&self,
		client: &p2p::Client,
		seeds: &[PeerAddress],
	) -> Result<(), TransportError> {
		client
			.start_listening(self.cfg.tcp_multiaddress())
			.await
			.map_err(internal)?;
		info!("TCP listener started on port {}", self.cfg.port);

		if seeds.is_empty() {
			info!("No seed peers, starting DHT as a founding bootnode");
			return Ok(());
		}

		let mut reachable = 0;
		for (peer, addr) in seeds.iter().map(Into::into) {
			if let Err(error) = client.dial_peer(peer, addr.clone()).await {
				warn!(%peer, "Failed to dial seed peer: {error:#}");
				continue;
			}
			if let Err(error) = client.add_address(peer, addr).await {
				warn!(%peer, "Failed to add seed peer to the routing table: {error:#}");
				continue;
			}
			reachable += 1;
		}

		if reachable == 0 {
			return Err(TransportError::DialFailure {
				dialed: seeds.len(),
			});
		}

		client.bootstrap().await.map_err(|error| {
			warn!("DHT bootstrap query failed: {error:#}");
			TransportError::DialFailure {
				dialed: seeds.len(),
			}
		})?;

		info!(reachable, "DHT bootstrap complete");
		Ok(())
	}
}

#[async_trait]
impl DhtTransport for P2pTransport {
	async fn connect(&self, seeds: &[PeerAddress]) -> Result<DhtSession, TransportError> {
		let (id_keys, peer_id) = p2p::keypair(&self.cfg.secret_key).map_err(internal)?;
		let (client, event_loop) = p2p::init(&self.cfg, id_keys).map_err(internal)?;

		let controller = Controller::<String>::new();
		let event_loop_task = spawn_in_span(controller.with_cancel(event_loop.run()));

		match self.establish(&client, seeds).await {
			Ok(()) => Ok(DhtSession {
				client,
				peer_id,
				controller,
			}),
			Err(error) => {
				// the partially established session must not outlive the attempt
				controller.trigger_shutdown(format!("Connect attempt failed: {error}"));
				_ = event_loop_task.await;
				Err(error)
			},
		}
	}
}

fn internal(error: Report) -> TransportError {
	TransportError::Internal(format!("{error:#}"))
}
