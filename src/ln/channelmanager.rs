// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The top-level channel management and state machine driver lives here.
//!
//! [`ChannelManager`] tracks every channel we open, feeds it peer messages and blocks, and runs
//! its transitions. Each channel sits behind its own async lock which is held for a whole
//! transition chain, so at most one event is in flight per channel while different channels
//! proceed independently.

use bitcoin::secp256k1::PublicKey;

use crate::chain::ConnectedBlock;
use crate::ln::channel::Channel;
use crate::ln::channel_logic::{ChannelLogic, OpenChannelRequest};
use crate::ln::channel_state::{
	build_channel_state_tree, ChannelEvent, ChannelStateId, ChannelStateTree,
};
use crate::ln::msgs::{self, Message};
use crate::ln::peer::{MessageSender, Peer};
use crate::ln::transitions::{self, TransitionContext};
use crate::ln::types::ChannelId;
use crate::util::errors::{OpeningError, TransitionError};
use crate::util::hash_tables::{new_hash_map, HashMap};
use crate::util::logger::{Logger, WithContext};
use crate::util::persist::ChannelStore;

use core::ops::Deref;
use std::sync::{Arc, Mutex};

/// Manager which keeps track of the channels we open and drives them through the channel state
/// tree.
///
/// Channels are keyed by their temporary channel id, which never changes. Once a channel's
/// funding transaction exists, messages addressed by the permanent id are routed to it as well.
pub struct ChannelManager<CL: Deref, MS: Deref, ST: Deref, L: Deref>
where
	CL::Target: ChannelLogic,
	MS::Target: MessageSender,
	ST::Target: ChannelStore,
	L::Target: Logger,
{
	logic: CL,
	message_sender: MS,
	store: ST,
	logger: L,
	state_tree: ChannelStateTree,
	channels: Mutex<HashMap<ChannelId, Arc<tokio::sync::Mutex<Channel>>>>,
	/// Permanent channel id to temporary channel id.
	channel_aliases: Mutex<HashMap<ChannelId, ChannelId>>,
}

impl<CL: Deref, MS: Deref, ST: Deref, L: Deref> ChannelManager<CL, MS, ST, L>
where
	CL::Target: ChannelLogic,
	MS::Target: MessageSender,
	ST::Target: ChannelStore,
	L::Target: Logger,
{
	/// Constructs a new `ChannelManager` with no channels.
	pub fn new(logic: CL, message_sender: MS, store: ST, logger: L) -> Self {
		ChannelManager {
			logic,
			message_sender,
			store,
			logger,
			state_tree: build_channel_state_tree()
				.expect("channel states are registered once each"),
			channels: Mutex::new(new_hash_map()),
			channel_aliases: Mutex::new(new_hash_map()),
		}
	}

	fn context(&self) -> TransitionContext<'_, CL::Target, MS::Target, ST::Target, L::Target> {
		TransitionContext {
			logic: &*self.logic,
			messages: &*self.message_sender,
			store: &*self.store,
			logger: &*self.logger,
		}
	}

	pub(crate) fn logger(&self) -> &L {
		&self.logger
	}

	/// The state tree channels are driven through.
	pub fn state_tree(&self) -> &ChannelStateTree {
		&self.state_tree
	}

	/// Opens a channel to `peer`, sending `open_channel`.
	///
	/// On success the channel is stored and waits for `accept_channel`. The returned [`Channel`]
	/// is a snapshot; use [`ChannelManager::channel`] to follow its progress.
	pub async fn open_channel(
		&self, peer: &Peer, request: OpenChannelRequest,
	) -> Result<Channel, OpeningError> {
		if !peer.is_ready() {
			return Err(OpeningError::PeerNotReady);
		}
		let mut channel = self.logic.create_channel(peer.node_id, &request).await?;
		let open_channel = self.logic.create_open_channel_message(&channel)?;

		// Negotiating starts out in AwaitingAcceptChannel. The peer only hears of the channel
		// once it is stored and tracked.
		transitions::transition_state(
			&self.state_tree,
			&self.context(),
			&mut channel,
			ChannelStateId::Negotiating,
		)
		.await
		.map_err(|e| OpeningError::PersistenceFailed { err: e.to_string() })?;
		self.channels
			.lock()
			.unwrap()
			.insert(channel.temporary_channel_id(), Arc::new(tokio::sync::Mutex::new(channel.clone())));

		let logger = WithContext::from(
			&self.logger,
			Some(peer.node_id),
			Some(channel.temporary_channel_id()),
		);
		log_info!(
			logger,
			"Opening channel {} of {} sat with {}",
			channel.temporary_channel_id(),
			channel.funding_satoshis(),
			log_pubkey!(peer.node_id)
		);
		self.message_sender.send_message(&peer.node_id, Message::OpenChannel(open_channel));
		Ok(channel)
	}

	/// Handles `accept_channel` from `peer`.
	pub async fn on_accept_channel_message(
		&self, peer: &Peer, msg: &msgs::AcceptChannel,
	) -> Result<(), TransitionError> {
		self.handle_channel_event(&peer.node_id, msg.temporary_channel_id, ChannelEvent::AcceptChannel(msg))
			.await
	}

	/// Handles `funding_signed` from `peer`.
	pub async fn on_funding_signed_message(
		&self, peer: &Peer, msg: &msgs::FundingSigned,
	) -> Result<(), TransitionError> {
		self.handle_channel_event(&peer.node_id, msg.channel_id, ChannelEvent::FundingSigned(msg)).await
	}

	/// Handles `channel_ready` from `peer`.
	pub async fn on_channel_ready_message(
		&self, peer: &Peer, msg: &msgs::ChannelReady,
	) -> Result<(), TransitionError> {
		self.handle_channel_event(&peer.node_id, msg.channel_id, ChannelEvent::ChannelReady(msg)).await
	}

	/// Delivers a newly connected block to every channel.
	///
	/// A failure on one channel does not stop the others from seeing the block. Every failure is
	/// logged and the first one is returned.
	pub async fn on_block_connected(&self, block: &ConnectedBlock) -> Result<(), TransitionError> {
		let channels: Vec<_> = self.channels.lock().unwrap().values().cloned().collect();
		let mut first_err = None;
		for channel in channels {
			let mut channel = channel.lock().await;
			let res = transitions::handle_event(
				&self.state_tree,
				&self.context(),
				&mut channel,
				ChannelEvent::BlockConnected(block),
			)
			.await;
			self.update_index(&channel);
			if let Err(e) = res {
				let logger = WithContext::from(
					&self.logger,
					Some(channel.counterparty_node_id()),
					Some(channel.channel_id()),
				);
				log_error!(logger, "Failed to process block {}: {}", block.height(), e);
				first_err.get_or_insert(e);
			}
		}
		match first_err {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}

	/// Drops a channel we no longer want. If `peer` is connected it is told with an `error`.
	/// The channel is removed from storage and no longer tracked.
	///
	/// Only channels which are still negotiating, funding or failing can be abandoned.
	pub async fn abandon_channel(
		&self, peer: &Peer, channel_id: ChannelId,
	) -> Result<(), TransitionError> {
		let event = if peer.is_ready() {
			ChannelEvent::ShutdownConnected
		} else {
			ChannelEvent::ShutdownDisconnected
		};
		self.handle_channel_event(&peer.node_id, channel_id, event).await
	}

	/// Moves a channel straight to `target`, running the same hooks as an event would.
	pub async fn transition_state(
		&self, channel_id: ChannelId, target: ChannelStateId,
	) -> Result<(), TransitionError> {
		let channel = self.lookup(channel_id)?;
		let mut channel = channel.lock().await;
		let res =
			transitions::transition_state(&self.state_tree, &self.context(), &mut channel, target)
				.await;
		self.update_index(&channel);
		res
	}

	/// A snapshot of the channel with the given temporary or permanent id.
	pub async fn channel(&self, channel_id: ChannelId) -> Option<Channel> {
		let channel = self.lookup(channel_id).ok()?;
		let channel = channel.lock().await;
		Some(channel.clone())
	}

	/// Snapshots of all tracked channels. Abandoned channels are no longer tracked.
	pub async fn list_channels(&self) -> Vec<Channel> {
		let channels: Vec<_> = self.channels.lock().unwrap().values().cloned().collect();
		let mut res = Vec::with_capacity(channels.len());
		for channel in channels {
			res.push(channel.lock().await.clone());
		}
		res
	}

	fn lookup(&self, channel_id: ChannelId) -> Result<Arc<tokio::sync::Mutex<Channel>>, TransitionError> {
		let temporary_channel_id =
			self.channel_aliases.lock().unwrap().get(&channel_id).copied().unwrap_or(channel_id);
		self.channels
			.lock()
			.unwrap()
			.get(&temporary_channel_id)
			.cloned()
			.ok_or(TransitionError::UnknownChannel(channel_id))
	}

	/// Records the permanent id of `channel` once it has one, and forgets the channel entirely
	/// once it is abandoned.
	fn update_index(&self, channel: &Channel) {
		let permanent_channel_id = channel.permanent_channel_id();
		if channel.state() == ChannelStateId::Abandoned {
			self.channels.lock().unwrap().remove(&channel.temporary_channel_id());
			if let Some(channel_id) = permanent_channel_id {
				self.channel_aliases.lock().unwrap().remove(&channel_id);
			}
			let logger = WithContext::from(
				&self.logger,
				Some(channel.counterparty_node_id()),
				Some(channel.channel_id()),
			);
			log_debug!(logger, "Dropped abandoned channel {}", channel.temporary_channel_id());
		} else if let Some(channel_id) = permanent_channel_id {
			self.channel_aliases.lock().unwrap().insert(channel_id, channel.temporary_channel_id());
		}
	}

	async fn handle_channel_event(
		&self, counterparty_node_id: &PublicKey, channel_id: ChannelId, event: ChannelEvent<'_>,
	) -> Result<(), TransitionError> {
		let channel = self.lookup(channel_id)?;
		let mut channel = channel.lock().await;
		// Another peer may not drive our channel by guessing its id.
		if channel.counterparty_node_id() != *counterparty_node_id {
			return Err(TransitionError::UnknownChannel(channel_id));
		}
		let res =
			transitions::handle_event(&self.state_tree, &self.context(), &mut channel, event).await;
		self.update_index(&channel);
		res
	}
}
