use color_eyre::{eyre::WrapErr, Result};
use libp2p::{Multiaddr, PeerId};
use tokio::sync::{mpsc, oneshot};

/// Handle for driving the swarm event loop through its command channel.
#[derive(Clone)]
pub struct Client {
	command_sender: mpsc::Sender<Command>,
}

impl Client {
	pub fn new(command_sender: mpsc::Sender<Command>) -> Self {
		Self { command_sender }
	}

	pub async fn start_listening(&self, addr: Multiaddr) -> Result<()> {
		let (response_sender, response_receiver) = oneshot::channel();
		self.command_sender
			.send(Command::StartListening {
				addr,
				response_sender,
			})
			.await
			.wrap_err("Command receiver should not be dropped")?;
		response_receiver
			.await
			.wrap_err("Sender should not be dropped")?
	}

	/// Dials a seed peer, resolving once the first connection is established
	/// or the dial has failed.
	pub async fn dial_peer(&self, peer_id: PeerId, peer_address: Multiaddr) -> Result<()> {
		let (response_sender, response_receiver) = oneshot::channel();
		self.command_sender
			.send(Command::DialPeer {
				peer_id,
				peer_address,
				response_sender,
			})
			.await
			.wrap_err("Command receiver should not be dropped")?;
		response_receiver
			.await
			.wrap_err("Sender should not be dropped")?
	}

	/// Adds a peer address to the Kademlia routing table, resolving once the
	/// routing table has been updated.
	pub async fn add_address(&self, peer_id: PeerId, multiaddr: Multiaddr) -> Result<()> {
		let (response_sender, response_receiver) = oneshot::channel();
		self.command_sender
			.send(Command::AddAddress {
				peer_id,
				multiaddr,
				response_sender,
			})
			.await
			.wrap_err("Command receiver should not be dropped")?;
		response_receiver
			.await
			.wrap_err("Sender should not be dropped")?
	}

	/// Runs a Kademlia bootstrap query against the routing table, resolving
	/// once the query has fully completed.
	pub async fn bootstrap(&self) -> Result<()> {
		let (response_sender, response_receiver) = oneshot::channel();
		self.command_sender
			.send(Command::Bootstrap { response_sender })
			.await
			.wrap_err("Command receiver should not be dropped")?;
		response_receiver
			.await
			.wrap_err("Sender should not be dropped")?
	}

	pub async fn count_dht_entries(&self) -> Result<usize> {
		let (response_sender, response_receiver) = oneshot::channel();
		self.command_sender
			.send(Command::CountDHTPeers { response_sender })
			.await
			.wrap_err("Command receiver should not be dropped")?;
		response_receiver
			.await
			.wrap_err("Sender should not be dropped")
	}
}

#[derive(Debug)]
pub enum Command {
	StartListening {
		addr: Multiaddr,
		response_sender: oneshot::Sender<Result<()>>,
	},
	DialPeer {
		peer_id: PeerId,
		peer_address: Multiaddr,
		response_sender: oneshot::Sender<Result<()>>,
	},
	AddAddress {
		peer_id: PeerId,
		multiaddr: Multiaddr,
		response_sender: oneshot::Sender<Result<()>>,
	},
	Bootstrap {
		response_sender: oneshot::Sender<Result<()>>,
	},
	CountDHTPeers {
		response_sender: oneshot::Sender<usize>,
	},
}
