// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The states a channel moves through while it is being opened, and the tree they form.
//!
//! ```text
//! Channel
//! ├── Negotiating
//! │   ├── AwaitingAcceptChannel
//! │   └── AwaitingFundingSigned
//! ├── Funding
//! │   ├── AwaitingFundingDepth
//! │   └── AwaitingChannelReady
//! ├── Normal
//! ├── Failing
//! └── Abandoned
//! ```

use crate::chain::ConnectedBlock;
use crate::ln::msgs;
use crate::util::errors::StateTreeError;
use crate::util::state_machine::{StateId, StateTree};

/// A node of the channel state tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelStateId {
	/// The root. A freshly created channel sits here until it is handed to the state machine.
	Channel,
	/// Parent of the states before the funding transaction is broadcast.
	Negotiating,
	/// We sent `open_channel` and wait for `accept_channel`.
	AwaitingAcceptChannel,
	/// We sent `funding_created` and wait for `funding_signed`.
	AwaitingFundingSigned,
	/// Parent of the states after the funding transaction is broadcast.
	Funding,
	/// The funding transaction is broadcast and not yet deep enough.
	AwaitingFundingDepth,
	/// We sent `channel_ready` and wait for the counterparty's.
	AwaitingChannelReady,
	/// The channel is usable.
	Normal,
	/// Negotiation failed. If funds were committed on chain the channel has to be closed.
	Failing,
	/// The channel was dropped before any funds were committed.
	Abandoned,
}

impl StateId for ChannelStateId {
	fn name(&self) -> &'static str {
		match self {
			ChannelStateId::Channel => "Channel",
			ChannelStateId::Negotiating => "Negotiating",
			ChannelStateId::AwaitingAcceptChannel => "AwaitingAcceptChannel",
			ChannelStateId::AwaitingFundingSigned => "AwaitingFundingSigned",
			ChannelStateId::Funding => "Funding",
			ChannelStateId::AwaitingFundingDepth => "AwaitingFundingDepth",
			ChannelStateId::AwaitingChannelReady => "AwaitingChannelReady",
			ChannelStateId::Normal => "Normal",
			ChannelStateId::Failing => "Failing",
			ChannelStateId::Abandoned => "Abandoned",
		}
	}
}

impl core::fmt::Display for ChannelStateId {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
		f.write_str(self.name())
	}
}

/// The kinds of event a channel reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelEventKind {
	/// The counterparty sent `accept_channel`.
	AcceptChannel,
	/// The counterparty sent `funding_signed`.
	FundingSigned,
	/// The counterparty sent `channel_ready`.
	ChannelReady,
	/// A block was connected to the best chain.
	BlockConnected,
	/// The channel is to be dropped while the peer is connected.
	ShutdownConnected,
	/// The channel is to be dropped while the peer is not connected.
	ShutdownDisconnected,
}

/// An event delivered to one channel.
#[derive(Clone, Copy, Debug)]
pub enum ChannelEvent<'a> {
	/// See [`ChannelEventKind::AcceptChannel`].
	AcceptChannel(&'a msgs::AcceptChannel),
	/// See [`ChannelEventKind::FundingSigned`].
	FundingSigned(&'a msgs::FundingSigned),
	/// See [`ChannelEventKind::ChannelReady`].
	ChannelReady(&'a msgs::ChannelReady),
	/// See [`ChannelEventKind::BlockConnected`].
	BlockConnected(&'a ConnectedBlock),
	/// See [`ChannelEventKind::ShutdownConnected`].
	ShutdownConnected,
	/// See [`ChannelEventKind::ShutdownDisconnected`].
	ShutdownDisconnected,
}

impl<'a> ChannelEvent<'a> {
	/// The kind of this event, used to look up its handler.
	pub fn kind(&self) -> ChannelEventKind {
		match self {
			ChannelEvent::AcceptChannel(_) => ChannelEventKind::AcceptChannel,
			ChannelEvent::FundingSigned(_) => ChannelEventKind::FundingSigned,
			ChannelEvent::ChannelReady(_) => ChannelEventKind::ChannelReady,
			ChannelEvent::BlockConnected(_) => ChannelEventKind::BlockConnected,
			ChannelEvent::ShutdownConnected => ChannelEventKind::ShutdownConnected,
			ChannelEvent::ShutdownDisconnected => ChannelEventKind::ShutdownDisconnected,
		}
	}
}

/// Names a piece of transition code. Handlers run for events, hooks on entering or leaving a
/// state. The code itself lives in [`crate::ln::transitions`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelAction {
	/// Validate `accept_channel`, build the funding and remote commitment transactions and send
	/// `funding_created`.
	AcceptChannel,
	/// Check the signature on our commitment and broadcast the funding transaction.
	FundingSigned,
	/// Look for the funding transaction and send `channel_ready` once it is deep enough.
	BlockConnected,
	/// Record the counterparty's `channel_ready`.
	ChannelReady,
	/// Drop the channel and tell the peer.
	ShutdownConnected,
	/// Drop the channel.
	ShutdownDisconnected,
	/// Note that the channel is usable.
	LogUsable,
	/// Tell the peer why the channel failed, and abandon it if nothing was broadcast.
	FailChannel,
	/// Note that the channel was abandoned.
	LogAbandoned,
	/// Continue straight on to the given state.
	Redirect(ChannelStateId),
}

/// The state tree channels are driven through.
pub type ChannelStateTree = StateTree<ChannelStateId, ChannelEventKind, ChannelAction>;

/// Builds the channel state tree.
pub fn build_channel_state_tree() -> Result<ChannelStateTree, StateTreeError> {
	use self::ChannelAction as A;
	use self::ChannelEventKind as E;
	use self::ChannelStateId as S;

	let mut tree = StateTree::new(S::Channel);
	tree.add_sub_state(S::Channel, S::Negotiating)?
		.add_sub_state(S::Negotiating, S::AwaitingAcceptChannel)?
		.add_sub_state(S::Negotiating, S::AwaitingFundingSigned)?
		.add_sub_state(S::Channel, S::Funding)?
		.add_sub_state(S::Funding, S::AwaitingFundingDepth)?
		.add_sub_state(S::Funding, S::AwaitingChannelReady)?
		.add_sub_state(S::Channel, S::Normal)?
		.add_sub_state(S::Channel, S::Failing)?
		.add_sub_state(S::Channel, S::Abandoned)?;

	tree.on(S::AwaitingAcceptChannel, E::AcceptChannel, A::AcceptChannel)?
		.on(S::AwaitingFundingSigned, E::FundingSigned, A::FundingSigned)?
		.on(S::AwaitingFundingDepth, E::BlockConnected, A::BlockConnected)?
		.on(S::AwaitingFundingDepth, E::ChannelReady, A::ChannelReady)?
		.on(S::AwaitingChannelReady, E::ChannelReady, A::ChannelReady)?;

	// Nothing is broadcast before Funding, so abandoning is always safe there. Once funding is
	// broadcast, a shutdown only drops our record of a channel the peer may never lock in.
	for state in [S::Negotiating, S::Funding, S::Failing] {
		tree.on(state, E::ShutdownConnected, A::ShutdownConnected)?
			.on(state, E::ShutdownDisconnected, A::ShutdownDisconnected)?;
	}

	tree.on_enter(S::Negotiating, A::Redirect(S::AwaitingAcceptChannel))?
		.on_enter(S::Funding, A::Redirect(S::AwaitingFundingDepth))?
		.on_enter(S::Normal, A::LogUsable)?
		.on_enter(S::Failing, A::FailChannel)?
		.on_enter(S::Abandoned, A::LogAbandoned)?
		.set_persist(S::Abandoned, false)?;
	Ok(tree)
}
