use color_eyre::{eyre::eyre, Result};
use futures::StreamExt;
use libp2p::{
	identify::{Event as IdentifyEvent, Info},
	kad::{self, BootstrapOk, QueryId, QueryResult},
	multiaddr::Protocol,
	swarm::SwarmEvent,
	PeerId, Swarm,
};
use std::{
	collections::{hash_map, HashMap},
	time::Duration,
};
use tokio::{
	sync::{mpsc, oneshot},
	time::{interval_at, Instant, Interval},
};
use tracing::{debug, trace};

use super::{Behaviour, BehaviourEvent, Command};

pub struct EventLoop {
	swarm: Swarm<Behaviour>,
	command_receiver: mpsc::Receiver<Command>,
	pending_bootstraps: HashMap<QueryId, oneshot::Sender<Result<()>>>,
	pending_routing: HashMap<PeerId, oneshot::Sender<Result<()>>>,
	pending_dials: HashMap<PeerId, oneshot::Sender<Result<()>>>,
	// the periodic bootstrap timer only fires after the startup bootstrap is done
	startup_bootstrap_done: bool,
	bootstrap_timer: Interval,
}

impl EventLoop {
	pub fn new(
		swarm: Swarm<Behaviour>,
		command_receiver: mpsc::Receiver<Command>,
		bootstrap_interval: Duration,
	) -> Self {
		Self {
			swarm,
			command_receiver,
			pending_bootstraps: Default::default(),
			pending_routing: Default::default(),
			pending_dials: Default::default(),
			startup_bootstrap_done: false,
			bootstrap_timer: interval_at(Instant::now() + bootstrap_interval, bootstrap_interval),
		}
	}

	pub async fn run(mut self) {
		loop {
			tokio::select! {
				event = self.swarm.next() => self.handle_event(event.expect("Swarm stream should be infinite")),
				command = self.command_receiver.recv() => match command {
					Some(cmd) => self.handle_command(cmd),
					// command channel closed, shutting down the event loop
					None => return,
				},
				_ = self.bootstrap_timer.tick() => self.handle_periodic_bootstrap(),
			}
		}
	}

	fn handle_event(&mut self, event: SwarmEvent<BehaviourEvent>) {
		match event {
			SwarmEvent::Behaviour(BehaviourEvent::Kademlia(kad_event)) => match kad_event {
				kad::Event::RoutingUpdated { peer, is_new_peer, .. } => {
					trace!("Routing updated. Peer: {peer:?}. Is new peer: {is_new_peer:?}.");
					if let Some(ch) = self.pending_routing.remove(&peer) {
						_ = ch.send(Ok(()));
					}
				},
				kad::Event::OutboundQueryProgressed {
					id,
					result: QueryResult::Bootstrap(bootstrap_result),
					..
				} => match bootstrap_result {
					Ok(BootstrapOk {
						peer,
						num_remaining,
					}) => {
						trace!("Bootstrap step done. Peer: {peer:?}. Remaining: {num_remaining}.");
						if num_remaining == 0 {
							if let Some(ch) = self.pending_bootstraps.remove(&id) {
								_ = ch.send(Ok(()));
							}
							self.startup_bootstrap_done = true;
						}
					},
					Err(error) => {
						trace!("Bootstrap query failed: {error:?}.");
						if let Some(ch) = self.pending_bootstraps.remove(&id) {
							_ = ch.send(Err(error.into()));
						}
					},
				},
				_ => {},
			},
			SwarmEvent::Behaviour(BehaviourEvent::Identify(IdentifyEvent::Received {
				peer_id,
				info: Info {
					listen_addrs,
					protocols,
					..
				},
				..
			})) => {
				trace!("Identify received from {peer_id:?} on {listen_addrs:?}.");
				let kad_protocol = self.swarm.behaviour_mut().kademlia.protocol_names()[0].clone();
				if protocols.contains(&kad_protocol) {
					for addr in listen_addrs {
						self.swarm
							.behaviour_mut()
							.kademlia
							.add_address(&peer_id, addr);
					}
				} else {
					// peers from other swarms have no place in the routing table
					debug!("Removing non-swarm peer {peer_id} from the routing table.");
					self.swarm.behaviour_mut().kademlia.remove_peer(&peer_id);
				}
			},
			SwarmEvent::ConnectionEstablished {
				peer_id, endpoint, ..
			} => {
				if endpoint.is_dialer() {
					if let Some(ch) = self.pending_dials.remove(&peer_id) {
						_ = ch.send(Ok(()));
					}
				}
			},
			SwarmEvent::OutgoingConnectionError {
				peer_id: Some(peer_id),
				error,
				..
			} => {
				trace!("Outgoing connection error. Peer: {peer_id}. Error: {error}.");
				if let Some(ch) = self.pending_dials.remove(&peer_id) {
					_ = ch.send(Err(eyre!(error)));
				}
			},
			SwarmEvent::NewListenAddr { address, .. } => {
				let local_peer_id = *self.swarm.local_peer_id();
				debug!(
					"Local node is listening on: {:?}",
					address.with(Protocol::P2p(local_peer_id))
				);
			},
			_ => {},
		}
	}

	fn handle_command(&mut self, command: Command) {
		match command {
			Command::StartListening {
				addr,
				response_sender,
			} => {
				_ = match self.swarm.listen_on(addr) {
					Ok(_) => response_sender.send(Ok(())),
					Err(error) => response_sender.send(Err(error.into())),
				}
			},
			Command::DialPeer {
				peer_id,
				peer_address,
				response_sender,
			} => {
				if let hash_map::Entry::Vacant(entry) = self.pending_dials.entry(peer_id) {
					match self.swarm.dial(peer_address) {
						Ok(()) => {
							entry.insert(response_sender);
						},
						Err(error) => {
							_ = response_sender.send(Err(eyre!(error)));
						},
					}
				} else {
					_ = response_sender.send(Err(eyre!("Already dialing peer {peer_id}")));
				}
			},
			Command::AddAddress {
				peer_id,
				multiaddr,
				response_sender,
			} => {
				self.swarm
					.behaviour_mut()
					.kademlia
					.add_address(&peer_id, multiaddr);
				self.pending_routing.insert(peer_id, response_sender);
			},
			Command::Bootstrap { response_sender } => {
				match self.swarm.behaviour_mut().kademlia.bootstrap() {
					Ok(query_id) => {
						self.pending_bootstraps.insert(query_id, response_sender);
					},
					// no known peers to bootstrap against
					Err(error) => {
						_ = response_sender.send(Err(eyre!(error)));
					},
				}
			},
			Command::CountDHTPeers { response_sender } => {
				let mut total_peers: usize = 0;
				for bucket in self.swarm.behaviour_mut().kademlia.kbuckets() {
					total_peers += bucket.num_entries();
				}
				_ = response_sender.send(total_peers);
			},
		}
	}

	fn handle_periodic_bootstrap(&mut self) {
		// periodic bootstraps only make sense after the startup one has completed
		if self.startup_bootstrap_done {
			debug!("Starting periodic bootstrap.");
			_ = self.swarm.behaviour_mut().kademlia.bootstrap();
		}
	}
}
