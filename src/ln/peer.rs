// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The channel core's view of a peer and of the transport used to reach it.

use bitcoin::secp256k1::PublicKey;

use crate::ln::msgs::Message;

/// How far along the connection to a peer is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PeerConnectionState {
	/// The transport handshake or `init` exchange has not completed yet.
	Connecting,
	/// The peer is connected and has exchanged `init` with us. Only now may channels be opened.
	Ready,
	/// The peer is not connected.
	Disconnected,
}

/// A peer as known to the channel core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
	/// The peer's node id.
	pub node_id: PublicKey,
	/// The state of our connection to the peer.
	pub state: PeerConnectionState,
}

impl Peer {
	/// Creates a peer in the given connection state.
	pub fn new(node_id: PublicKey, state: PeerConnectionState) -> Self {
		Peer { node_id, state }
	}

	/// Whether the peer is connected and initialized.
	pub fn is_ready(&self) -> bool {
		self.state == PeerConnectionState::Ready
	}
}

/// Hands messages to the transport layer.
///
/// Implementations should queue the message and return immediately. Delivery is best effort: a
/// message to a peer that has since disconnected may be dropped.
pub trait MessageSender {
	/// Queues `msg` for delivery to `their_node_id`.
	fn send_message(&self, their_node_id: &PublicKey, msg: Message);
}
