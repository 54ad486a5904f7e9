// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Inbound events and the dispatcher feeding them to a [`ChannelManager`].
//!
//! The transport and chain source push [`InboundEvent`]s into a single queue. The dispatcher
//! handles them one at a time, only taking the next event once the previous one has fully
//! settled, so a channel never sees two events at once.
//!
//! [`ChannelManager`]: crate::ln::channelmanager::ChannelManager

use crate::chain::ConnectedBlock;
use crate::ln::channel_logic::ChannelLogic;
use crate::ln::channelmanager::ChannelManager;
use crate::ln::msgs;
use crate::ln::peer::{MessageSender, Peer};
use crate::ln::types::ChannelId;
use crate::util::errors::TransitionError;
use crate::util::logger::{Logger, WithContext};
use crate::util::persist::ChannelStore;

use core::ops::Deref;
use tokio::sync::mpsc;

/// Something that happened outside the channel core which one or more channels react to.
#[derive(Clone, Debug)]
pub enum InboundEvent {
	/// `accept_channel` arrived from `peer`.
	AcceptChannel {
		/// The sender.
		peer: Peer,
		/// The message.
		msg: msgs::AcceptChannel,
	},
	/// `funding_signed` arrived from `peer`.
	FundingSigned {
		/// The sender.
		peer: Peer,
		/// The message.
		msg: msgs::FundingSigned,
	},
	/// `channel_ready` arrived from `peer`.
	ChannelReady {
		/// The sender.
		peer: Peer,
		/// The message.
		msg: msgs::ChannelReady,
	},
	/// A block was connected to the best chain.
	BlockConnected(ConnectedBlock),
	/// The user wants to drop a channel with `peer`. The peer's connection state decides whether
	/// it is told.
	AbandonChannel {
		/// The counterparty, in its current connection state.
		peer: Peer,
		/// The temporary or permanent id of the channel.
		channel_id: ChannelId,
	},
}

impl InboundEvent {
	fn peer(&self) -> Option<&Peer> {
		match self {
			InboundEvent::AcceptChannel { peer, .. }
			| InboundEvent::FundingSigned { peer, .. }
			| InboundEvent::ChannelReady { peer, .. }
			| InboundEvent::AbandonChannel { peer, .. } => Some(peer),
			InboundEvent::BlockConnected(_) => None,
		}
	}
}

/// Hands one event to the manager.
pub async fn process_inbound_event<CL: Deref, MS: Deref, ST: Deref, L: Deref>(
	manager: &ChannelManager<CL, MS, ST, L>, event: &InboundEvent,
) -> Result<(), TransitionError>
where
	CL::Target: ChannelLogic,
	MS::Target: MessageSender,
	ST::Target: ChannelStore,
	L::Target: Logger,
{
	match event {
		InboundEvent::AcceptChannel { peer, msg } => {
			manager.on_accept_channel_message(peer, msg).await
		},
		InboundEvent::FundingSigned { peer, msg } => {
			manager.on_funding_signed_message(peer, msg).await
		},
		InboundEvent::ChannelReady { peer, msg } => {
			manager.on_channel_ready_message(peer, msg).await
		},
		InboundEvent::BlockConnected(block) => manager.on_block_connected(block).await,
		InboundEvent::AbandonChannel { peer, channel_id } => {
			manager.abandon_channel(peer, *channel_id).await
		},
	}
}

/// Processes events from `receiver` in order until every sender is dropped.
///
/// An error only aborts the event that caused it. It is logged and the next event is processed
/// as usual.
pub async fn process_inbound_events<CL: Deref, MS: Deref, ST: Deref, L: Deref>(
	manager: &ChannelManager<CL, MS, ST, L>, mut receiver: mpsc::UnboundedReceiver<InboundEvent>,
) where
	CL::Target: ChannelLogic,
	MS::Target: MessageSender,
	ST::Target: ChannelStore,
	L::Target: Logger,
{
	while let Some(event) = receiver.recv().await {
		if let Err(e) = process_inbound_event(manager, &event).await {
			let logger =
				WithContext::from(manager.logger(), event.peer().map(|peer| peer.node_id), None);
			log_error!(logger, "Failed to process inbound event: {}", e);
		}
	}
	log_debug!(manager.logger(), "Inbound event queue closed");
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ln::channel_logic::OpenChannelRequest;
	use crate::ln::msgs::Message;
	use crate::ln::peer::PeerConnectionState;
	use crate::util::test_utils::{TestCounterparty, TestHarness, TestStoreMode};

	#[tokio::test]
	async fn test_dispatcher_survives_fatal_errors() {
		let harness = TestHarness::new(&[1; 32]);
		let counterparty = TestCounterparty::new(&[2; 32], 3);
		let peer = counterparty.peer(PeerConnectionState::Ready);
		let manager = &harness.manager;
		let channel = manager.open_channel(&peer, OpenChannelRequest::new(100_000)).await.unwrap();
		let temporary_channel_id = channel.temporary_channel_id();
		let open = match harness.messages.get_and_clear_sent().pop() {
			Some((_, Message::OpenChannel(msg))) => msg,
			msg => panic!("Unexpected message {:?}", msg),
		};
		let accept = counterparty.accept_channel(&open);

		let (sender, receiver) = mpsc::unbounded_channel();
		// Unknown channel.
		sender
			.send(InboundEvent::AbandonChannel { peer: peer.clone(), channel_id: ChannelId([7; 32]) })
			.unwrap();
		// The store fails while AwaitingFundingSigned is persisted.
		sender.send(InboundEvent::AcceptChannel { peer: peer.clone(), msg: accept.clone() }).unwrap();
		sender.send(InboundEvent::BlockConnected(ConnectedBlock::new(1, Vec::new()))).unwrap();
		sender
			.send(InboundEvent::AbandonChannel { peer: peer.clone(), channel_id: temporary_channel_id })
			.unwrap();
		drop(sender);

		harness.store.set_mode(TestStoreMode::FailNext);
		process_inbound_events(manager, receiver).await;

		harness.logger.assert_log_regex(
			"lightning_channel::events",
			regex::Regex::new(r"^Failed to process inbound event: No such channel [0-9a-f]{64}$")
				.unwrap(),
			1,
		);
		harness.logger.assert_log_contains(
			"lightning_channel::events",
			"Failed to process inbound event: Failed to persist channel: test store failure",
			1,
		);
		harness.logger.assert_log_context_contains(
			"lightning_channel::events",
			Some(counterparty.node_id()),
			None,
			2,
		);
		// The state change itself went through before the store failed, and later events for
		// the same channel are still processed: the channel was abandoned and dropped.
		assert!(manager.channel(temporary_channel_id).await.is_none());
		assert_eq!(harness.store.persisted_state(&temporary_channel_id), None);
		assert_eq!(harness.store.remove_count(), 1);
		match harness.messages.get_and_clear_sent().pop() {
			Some((_, Message::Error(msg))) => assert_eq!(msg.channel_id, temporary_channel_id),
			msg => panic!("Unexpected message {:?}", msg),
		}
		harness.logger.assert_log_contains("lightning_channel::events", "queue closed", 1);
	}
}
