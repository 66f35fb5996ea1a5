//! Core library for the training swarm node.
//!
//! Provides the swarm directory client (on-chain bootstrap peer registry),
//! the Kademlia DHT transport, and the bootstrap coordinator that decides
//! how a node joins the swarm: with discovered seed peers, or as a founding
//! bootnode when none are configured, found, or reachable.

pub mod bootstrap;
pub mod directory;
pub mod network;
pub mod shutdown;
pub mod types;
pub mod utils;
