use color_eyre::{eyre::WrapErr, Result};
use libp2p::{
	identify,
	identity::{self, Keypair},
	kad::{self, store::MemoryStore, Mode},
	noise, ping,
	swarm::NetworkBehaviour,
	tcp, yamux, PeerId, StreamProtocol, SwarmBuilder,
};
use multihash::Hasher;
use tokio::sync::mpsc;
use tracing::info;

mod client;
mod event_loop;

pub use client::{Client, Command};
use event_loop::EventLoop;

use crate::types::{DhtConfig, SecretKey};

#[derive(NetworkBehaviour)]
pub struct Behaviour {
	kademlia: kad::Behaviour<MemoryStore>,
	identify: identify::Behaviour,
	ping: ping::Behaviour,
}

pub fn init(cfg: &DhtConfig, id_keys: Keypair) -> Result<(Client, EventLoop)> {
	let local_peer_id = PeerId::from(id_keys.public());
	info!("Local peer ID: {local_peer_id}");

	let identify_cfg = identify::Config::new(cfg.protocol_version.clone(), id_keys.public())
		.with_agent_version(cfg.agent_version.clone());

	let kad_protocol = StreamProtocol::try_from_owned(cfg.protocol_name.clone())
		.wrap_err("Invalid Kademlia protocol name")?;
	let kad_store = MemoryStore::new(local_peer_id);
	let mut kad_cfg = kad::Config::new(kad_protocol);
	kad_cfg.set_query_timeout(cfg.query_timeout);

	let behaviour = |key: &identity::Keypair| {
		Ok(Behaviour {
			kademlia: kad::Behaviour::with_config(key.public().to_peer_id(), kad_store, kad_cfg),
			identify: identify::Behaviour::new(identify_cfg),
			ping: ping::Behaviour::new(ping::Config::new()),
		})
	};

	let mut swarm = SwarmBuilder::with_existing_identity(id_keys)
		.with_tokio()
		.with_tcp(
			tcp::Config::default().nodelay(false),
			noise::Config::new,
			yamux::Config::default,
		)?
		.with_dns()?
		.with_behaviour(behaviour)?
		.build();

	// every swarm member serves DHT records
	swarm.behaviour_mut().kademlia.set_mode(Some(Mode::Server));

	let (command_sender, command_receiver) = mpsc::channel::<Command>(1000);

	Ok((
		Client::new(command_sender),
		EventLoop::new(swarm, command_receiver, cfg.bootstrap_interval),
	))
}

pub fn keypair(secret_key: &Option<SecretKey>) -> Result<(Keypair, PeerId)> {
	let keypair = match secret_key {
		// if seed is provided, generate secret key from seed
		Some(SecretKey::Seed { seed }) => {
			let digest = multihash::Sha3_256::digest(seed.as_bytes());
			Keypair::ed25519_from_bytes(digest)
				.wrap_err("Error generating secret key from seed")?
		},
		// import secret key, if provided
		Some(SecretKey::Key { key }) => {
			let mut decoded_key = [0u8; 32];
			hex::decode_to_slice(key.as_bytes(), &mut decoded_key)
				.wrap_err("Error decoding secret key from config")?;
			Keypair::ed25519_from_bytes(decoded_key).wrap_err("Error importing secret key")?
		},
		// generate a random identity otherwise
		None => Keypair::generate_ed25519(),
	};

	let peer_id = PeerId::from(keypair.public());
	Ok((keypair, peer_id))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keypair_from_seed_is_deterministic() {
		let secret = Some(SecretKey::Seed {
			seed: "1".to_string(),
		});
		let (_, first) = keypair(&secret).unwrap();
		let (_, second) = keypair(&secret).unwrap();
		assert_eq!(first, second);
	}

	#[test]
	fn keypair_rejects_invalid_hex_key() {
		let secret = Some(SecretKey::Key {
			key: "not-hex".to_string(),
		});
		assert!(keypair(&secret).is_err());
	}

	#[test]
	fn random_keypairs_differ() {
		let (_, first) = keypair(&None).unwrap();
		let (_, second) = keypair(&None).unwrap();
		assert_ne!(first, second);
	}
}
