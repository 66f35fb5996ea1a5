//! Bootstrap coordinator.
//!
//! Decides how the node joins the swarm: with configured seed peers, with
//! peers discovered through the swarm directory, or as a founding bootnode.
//! A seeded attempt that fails because no seed peer was reachable is retried
//! exactly once with an empty seed set; every other failure is fatal.

use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

use crate::{
	directory::{DirectoryError, SwarmDirectory},
	network::{DhtSession, DhtTransport, TransportError},
	types::{PeerAddress, BOOTNODE_SENTINEL},
};

/// Terminal failure of a bootstrap run, carrying the last attempt's cause.
#[derive(Debug, Error)]
pub enum BootstrapFatal {
	#[error("swarm directory lookup failed")]
	Directory(#[source] DirectoryError),
	#[error("invalid bootstrap peer address `{address}`: {reason}")]
	InvalidPeer { address: String, reason: String },
	#[error("could not join the swarm")]
	Transport(#[source] TransportError),
}

/// Where the effective seed peer set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
	/// Caller-supplied peer list.
	Configured,
	/// Caller requested bootnode mode through the sentinel entry.
	ExplicitBootnode,
	/// Peers discovered through the swarm directory.
	Chain,
	/// Directory had no peers registered; the node becomes the first bootnode.
	ChainEmpty,
}

fn is_bootnode_sentinel(configured: &[String]) -> bool {
	matches!(configured, [only] if only.as_str() == BOOTNODE_SENTINEL)
}

/// Drives the join sequence against its owned directory and transport.
pub struct Coordinator<D, T> {
	directory: D,
	transport: T,
}

impl<D: SwarmDirectory, T: DhtTransport> Coordinator<D, T> {
	pub fn new(directory: D, transport: T) -> Self {
		Coordinator {
			directory,
			transport,
		}
	}

	/// Computes the effective seed peer set. The sentinel check comes first:
	/// explicitly requested bootnode mode never consults the directory.
	async fn resolve_seeds(
		&self,
		configured: &[String],
	) -> Result<(Vec<PeerAddress>, SeedSource), BootstrapFatal> {
		if is_bootnode_sentinel(configured) {
			info!("Proceeding as bootnode");
			return Ok((vec![], SeedSource::ExplicitBootnode));
		}

		if !configured.is_empty() {
			let seeds = configured
				.iter()
				.map(|address| {
					PeerAddress::from_str(address).map_err(|error| BootstrapFatal::InvalidPeer {
						address: address.clone(),
						reason: error.to_string(),
					})
				})
				.collect::<Result<Vec<_>, _>>()?;
			return Ok((seeds, SeedSource::Configured));
		}

		let peers = self
			.directory
			.bootstrap_peers()
			.await
			.map_err(BootstrapFatal::Directory)?;

		if peers.is_empty() {
			info!("No bootnodes found on chain, starting as bootnode");
			Ok((peers, SeedSource::ChainEmpty))
		} else {
			info!(count = peers.len(), "Retrieved initial peers from chain");
			Ok((peers, SeedSource::Chain))
		}
	}

	/// One attempt to join: connect, then register the fresh peer ID with the
	/// directory. Registration is advisory; its failure never undoes a join.
	async fn connect_and_register(
		&self,
		seeds: &[PeerAddress],
	) -> Result<DhtSession, TransportError> {
		let session = self.transport.connect(seeds).await?;

		info!(peer_id = %session.peer_id, "Registering self with swarm directory");
		if let Err(error) = self.directory.register_peer(&session.peer_id).await {
			warn!("Peer registration failed: {error}");
		}

		Ok(session)
	}

	/// Runs the full bootstrap sequence and yields a live session or the
	/// fatal cause of the last attempt.
	pub async fn bootstrap(&self, configured: &[String]) -> Result<DhtSession, BootstrapFatal> {
		let (seeds, source) = self.resolve_seeds(configured).await?;
		info!(?source, seeds = seeds.len(), "Resolved seed peers");

		match self.connect_and_register(&seeds).await {
			Ok(session) => Ok(session),
			Err(error) if error.is_dial_failure() && !seeds.is_empty() => {
				warn!("Failed to connect to seed peers: {error}");
				info!("Retrying as bootstrap node");
				self.connect_and_register(&[])
					.await
					.map_err(BootstrapFatal::Transport)
			},
			Err(error) => Err(BootstrapFatal::Transport(error)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		directory::MockSwarmDirectory,
		network::{p2p, MockDhtTransport},
		shutdown::Controller,
	};
	use libp2p::PeerId;
	use mockall::Sequence;
	use test_case::test_case;
	use tokio::sync::mpsc;

	fn test_session() -> DhtSession {
		let (command_sender, _) = mpsc::channel(8);
		DhtSession {
			client: p2p::Client::new(command_sender),
			peer_id: PeerId::random(),
			controller: Controller::new(),
		}
	}

	fn test_address() -> String {
		format!("/ip4/127.0.0.1/tcp/39000/p2p/{}", PeerId::random())
	}

	fn directory_returning(peers: Vec<String>) -> MockSwarmDirectory {
		let mut directory = MockSwarmDirectory::new();
		directory.expect_bootstrap_peers().times(1).returning(move || {
			let peers = peers
				.iter()
				.map(|address| address.parse().unwrap())
				.collect();
			Ok(peers)
		});
		directory
	}

	#[tokio::test]
	async fn configured_peers_skip_the_directory() {
		let mut directory = MockSwarmDirectory::new();
		directory.expect_bootstrap_peers().never();
		directory.expect_register_peer().times(1).returning(|_| Ok(()));

		let mut transport = MockDhtTransport::new();
		transport
			.expect_connect()
			.times(1)
			.withf(|seeds| seeds.len() == 1)
			.returning(|_| Ok(test_session()));

		let coordinator = Coordinator::new(directory, transport);
		let result = coordinator.bootstrap(&[test_address()]).await;
		assert!(result.is_ok());
	}

	#[tokio::test]
	async fn sentinel_starts_directly_as_bootnode() {
		let mut directory = MockSwarmDirectory::new();
		directory.expect_bootstrap_peers().never();
		directory.expect_register_peer().times(1).returning(|_| Ok(()));

		let mut transport = MockDhtTransport::new();
		transport
			.expect_connect()
			.times(1)
			.withf(|seeds| seeds.is_empty())
			.returning(|_| Ok(test_session()));

		let coordinator = Coordinator::new(directory, transport);
		let configured = vec![BOOTNODE_SENTINEL.to_string()];
		assert!(coordinator.bootstrap(&configured).await.is_ok());
	}

	// Scenario: empty configuration, peers discovered on chain, join succeeds
	#[tokio::test]
	async fn chain_peers_are_used_once_discovered() {
		let mut directory = directory_returning(vec![test_address(), test_address()]);
		directory.expect_register_peer().times(1).returning(|_| Ok(()));

		let mut transport = MockDhtTransport::new();
		transport
			.expect_connect()
			.times(1)
			.withf(|seeds| seeds.len() == 2)
			.returning(|_| Ok(test_session()));

		let coordinator = Coordinator::new(directory, transport);
		assert!(coordinator.bootstrap(&[]).await.is_ok());
	}

	// Scenario: empty configuration and empty chain, node becomes the first bootnode
	#[tokio::test]
	async fn empty_chain_starts_as_bootnode() {
		let mut directory = directory_returning(vec![]);
		directory.expect_register_peer().times(1).returning(|_| Ok(()));

		let mut transport = MockDhtTransport::new();
		transport
			.expect_connect()
			.times(1)
			.withf(|seeds| seeds.is_empty())
			.returning(|_| Ok(test_session()));

		let coordinator = Coordinator::new(directory, transport);
		assert!(coordinator.bootstrap(&[]).await.is_ok());
	}

	// Scenario: unreachable configured peer, fallback to bootnode succeeds
	#[tokio::test]
	async fn dial_failure_falls_back_to_bootnode() {
		let mut directory = MockSwarmDirectory::new();
		directory.expect_bootstrap_peers().never();
		directory.expect_register_peer().times(1).returning(|_| Ok(()));

		let mut transport = MockDhtTransport::new();
		let mut sequence = Sequence::new();
		transport
			.expect_connect()
			.times(1)
			.in_sequence(&mut sequence)
			.withf(|seeds| !seeds.is_empty())
			.returning(|_| Err(TransportError::DialFailure { dialed: 1 }));
		transport
			.expect_connect()
			.times(1)
			.in_sequence(&mut sequence)
			.withf(|seeds| seeds.is_empty())
			.returning(|_| Ok(test_session()));

		let coordinator = Coordinator::new(directory, transport);
		assert!(coordinator.bootstrap(&[test_address()]).await.is_ok());
	}

	// Fallback fires at most once: two dial failures end the run after
	// exactly two connect attempts
	#[tokio::test]
	async fn second_dial_failure_is_fatal() {
		let mut directory = MockSwarmDirectory::new();
		directory.expect_bootstrap_peers().never();
		directory.expect_register_peer().never();

		let mut transport = MockDhtTransport::new();
		transport
			.expect_connect()
			.times(2)
			.returning(|_| Err(TransportError::DialFailure { dialed: 1 }));

		let coordinator = Coordinator::new(directory, transport);
		let result = coordinator.bootstrap(&[test_address()]).await;
		assert!(matches!(
			result,
			Err(BootstrapFatal::Transport(TransportError::DialFailure { .. }))
		));
	}

	// Scenario: internal transport failure is not eligible for fallback
	#[tokio::test]
	async fn internal_failure_is_immediately_fatal() {
		let mut directory = MockSwarmDirectory::new();
		directory.expect_bootstrap_peers().never();
		directory.expect_register_peer().never();

		let mut transport = MockDhtTransport::new();
		transport
			.expect_connect()
			.times(1)
			.returning(|_| Err(TransportError::Internal("broken".to_string())));

		let coordinator = Coordinator::new(directory, transport);
		let result = coordinator.bootstrap(&[test_address()]).await;
		assert!(matches!(
			result,
			Err(BootstrapFatal::Transport(TransportError::Internal(_)))
		));
	}

	// A dial failure with nothing to fall back from is fatal, not retried
	#[tokio::test]
	async fn bootnode_dial_failure_is_not_retried() {
		let mut directory = directory_returning(vec![]);
		directory.expect_register_peer().never();

		let mut transport = MockDhtTransport::new();
		transport
			.expect_connect()
			.times(1)
			.withf(|seeds| seeds.is_empty())
			.returning(|_| Err(TransportError::DialFailure { dialed: 0 }));

		let coordinator = Coordinator::new(directory, transport);
		assert!(coordinator.bootstrap(&[]).await.is_err());
	}

	#[tokio::test]
	async fn registration_failure_still_joins() {
		let mut directory = MockSwarmDirectory::new();
		directory.expect_bootstrap_peers().never();
		directory
			.expect_register_peer()
			.times(1)
			.returning(|_| Err(DirectoryError::Registration("rejected".to_string())));

		let mut transport = MockDhtTransport::new();
		transport
			.expect_connect()
			.times(1)
			.returning(|_| Ok(test_session()));

		let coordinator = Coordinator::new(directory, transport);
		assert!(coordinator.bootstrap(&[test_address()]).await.is_ok());
	}

	#[tokio::test]
	async fn directory_failure_is_fatal() {
		let mut directory = MockSwarmDirectory::new();
		directory
			.expect_bootstrap_peers()
			.times(1)
			.returning(|| Err(DirectoryError::Unavailable("gateway down".to_string())));
		directory.expect_register_peer().never();

		let transport = MockDhtTransport::new();

		let coordinator = Coordinator::new(directory, transport);
		let result = coordinator.bootstrap(&[]).await;
		assert!(matches!(result, Err(BootstrapFatal::Directory(_))));
	}

	#[tokio::test]
	async fn invalid_configured_address_is_fatal() {
		let mut directory = MockSwarmDirectory::new();
		directory.expect_bootstrap_peers().never();

		let transport = MockDhtTransport::new();

		let coordinator = Coordinator::new(directory, transport);
		let result = coordinator.bootstrap(&["not-a-multiaddr".to_string()]).await;
		assert!(matches!(result, Err(BootstrapFatal::InvalidPeer { .. })));
	}

	#[test_case(&[] => false)]
	#[test_case(&["BOOT"] => true)]
	#[test_case(&["BOOT", "BOOT"] => false)]
	#[test_case(&["/ip4/127.0.0.1/tcp/1"] => false)]
	fn sentinel_detection(configured: &[&str]) -> bool {
		let configured: Vec<String> = configured.iter().map(|s| s.to_string()).collect();
		is_bootnode_sentinel(&configured)
	}
}
