// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The code behind the [`ChannelAction`]s of the channel state tree, and the loop which moves a
//! channel from state to state.
//!
//! Event handlers never fail on bad input from the counterparty: a rejected message or a wrong
//! funding output sends the channel to [`ChannelStateId::Failing`]. Only collaborator failures
//! that leave us unable to record what happened (storage errors) and a broken state tree
//! surface as [`TransitionError`]s.

use crate::chain::ConnectedBlock;
use crate::ln::channel::Channel;
use crate::ln::channel_logic::ChannelLogic;
use crate::ln::channel_state::{ChannelAction, ChannelEvent, ChannelStateId, ChannelStateTree};
use crate::ln::msgs::{self, Message};
use crate::ln::peer::MessageSender;
use crate::util::errors::{OpeningError, TransitionError};
use crate::util::logger::{Logger, WithContext};
use crate::util::persist::ChannelStore;
use crate::util::state_machine::StateId;

/// The most states a single call to [`transition_state`] may pass through.
pub const MAX_TRANSITION_HOPS: usize = 16;

/// The collaborators transition code runs against.
pub struct TransitionContext<'a, CL: ?Sized, MS: ?Sized, ST: ?Sized, L: ?Sized> {
	/// Validation, construction and signing.
	pub logic: &'a CL,
	/// Outbound messages.
	pub messages: &'a MS,
	/// Channel storage.
	pub store: &'a ST,
	/// Where to log.
	pub logger: &'a L,
}

impl<'a, CL: ?Sized, MS: ?Sized, ST: ?Sized, L: ?Sized> TransitionContext<'a, CL, MS, ST, L>
where
	CL: ChannelLogic,
	MS: MessageSender,
	ST: ChannelStore,
	L: Logger,
{
	fn logger_for(&self, channel: &Channel) -> WithContext<'_, &'a L> {
		WithContext::from(
			&self.logger,
			Some(channel.counterparty_node_id()),
			Some(channel.channel_id()),
		)
	}

	fn send(&self, channel: &Channel, msg: Message) {
		log_debug!(
			self.logger_for(channel),
			"Sending {} to {}",
			msg.type_name(),
			log_pubkey!(channel.counterparty_node_id())
		);
		self.messages.send_message(&channel.counterparty_node_id(), msg);
	}
}

/// Moves `channel` to `target`, running exit and enter hooks and persisting along the way.
///
/// For each hop the current state's exit hook runs, the state changes, the channel is persisted
/// (unless the new state is flagged otherwise) and then the new state's enter hook runs. An
/// enter hook may name a further target, in which case the loop continues. Nothing happens when
/// the channel already is in `target`.
///
/// Revisiting a state, or running past [`MAX_TRANSITION_HOPS`], returns
/// [`TransitionError::StateCycle`] with the channel left in the last state reached.
pub async fn transition_state<CL: ?Sized, MS: ?Sized, ST: ?Sized, L: ?Sized>(
	tree: &ChannelStateTree, ctx: &TransitionContext<'_, CL, MS, ST, L>, channel: &mut Channel,
	target: ChannelStateId,
) -> Result<(), TransitionError>
where
	CL: ChannelLogic,
	MS: MessageSender,
	ST: ChannelStore,
	L: Logger,
{
	let mut target = resolve(tree, target)?;
	let mut visited = vec![channel.state()];
	while target != channel.state() {
		if visited.contains(&target) || visited.len() > MAX_TRANSITION_HOPS {
			return Err(TransitionError::StateCycle { state: target.name() });
		}
		visited.push(target);

		let from = channel.state();
		if let Some(action) = tree.exit_action(from) {
			// Exit hooks cannot redirect.
			run_hook(ctx, channel, from, action).await?;
		}
		channel.set_state(target);
		log_debug!(ctx.logger_for(channel), "Channel moved from {} to {}", from, target);
		if tree.persists(target) {
			ctx.store.persist_channel(channel).await?;
		}
		if let Some(action) = tree.enter_action(target) {
			if let Some(next) = run_hook(ctx, channel, target, action).await? {
				target = resolve(tree, next)?;
			}
		}
	}
	Ok(())
}

/// Whether an event handler changed what is stored about the channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Update {
	Changed,
	Unchanged,
}

fn resolve(
	tree: &ChannelStateTree, target: ChannelStateId,
) -> Result<ChannelStateId, TransitionError> {
	tree.find_state(target.name()).ok_or(TransitionError::UnknownState(target.name()))
}

/// Delivers `event` to the channel: the handler registered on its state or nearest ancestor
/// runs and the channel moves to the state it returns. Events no state handles are dropped.
///
/// A handler that updates the channel without moving it (a funding confirmation short of the
/// required depth, an early `channel_ready`) still has the channel persisted.
pub async fn handle_event<CL: ?Sized, MS: ?Sized, ST: ?Sized, L: ?Sized>(
	tree: &ChannelStateTree, ctx: &TransitionContext<'_, CL, MS, ST, L>, channel: &mut Channel,
	event: ChannelEvent<'_>,
) -> Result<(), TransitionError>
where
	CL: ChannelLogic,
	MS: MessageSender,
	ST: ChannelStore,
	L: Logger,
{
	let (handler_state, action) = match tree.handler_for(channel.state(), event.kind()) {
		Some(handler) => handler,
		None => {
			log_trace!(
				ctx.logger_for(channel),
				"Ignoring {:?} in state {}",
				event.kind(),
				channel.state()
			);
			return Ok(());
		},
	};
	let (next, update) = run_handler(ctx, channel, handler_state, action, event).await?;
	if next == channel.state() {
		if update == Update::Changed && tree.persists(next) {
			ctx.store.persist_channel(channel).await?;
		}
		return Ok(());
	}
	transition_state(tree, ctx, channel, next).await
}

async fn run_handler<CL: ?Sized, MS: ?Sized, ST: ?Sized, L: ?Sized>(
	ctx: &TransitionContext<'_, CL, MS, ST, L>, channel: &mut Channel,
	handler_state: ChannelStateId, action: ChannelAction, event: ChannelEvent<'_>,
) -> Result<(ChannelStateId, Update), TransitionError>
where
	CL: ChannelLogic,
	MS: MessageSender,
	ST: ChannelStore,
	L: Logger,
{
	let result = match (action, event) {
		(ChannelAction::AcceptChannel, ChannelEvent::AcceptChannel(msg)) => {
			on_accept_channel(ctx, channel, msg).await.map(|next| (next, Update::Changed))
		},
		(ChannelAction::FundingSigned, ChannelEvent::FundingSigned(msg)) => {
			on_funding_signed(ctx, channel, msg).await.map(|next| (next, Update::Changed))
		},
		(ChannelAction::BlockConnected, ChannelEvent::BlockConnected(block)) => {
			on_block_connected(ctx, channel, block).await
		},
		(ChannelAction::ChannelReady, ChannelEvent::ChannelReady(msg)) => {
			on_channel_ready(ctx, channel, msg)
		},
		(ChannelAction::ShutdownConnected, _) => {
			return Ok((on_shutdown(ctx, channel, true).await?, Update::Changed));
		},
		(ChannelAction::ShutdownDisconnected, _) => {
			return Ok((on_shutdown(ctx, channel, false).await?, Update::Changed));
		},
		_ => return Err(TransitionError::UnexpectedEvent { state: handler_state.name() }),
	};
	Ok(match result {
		Ok(outcome) => outcome,
		Err(e) => {
			log_error!(
				ctx.logger_for(channel),
				"Failing channel in state {}: {}",
				channel.state(),
				e
			);
			channel.set_failure_reason(e.to_string());
			(ChannelStateId::Failing, Update::Changed)
		},
	})
}

fn required<T>(value: Option<T>, name: &'static str) -> Result<T, OpeningError> {
	value.ok_or(OpeningError::MissingParameter { name })
}

async fn on_accept_channel<CL: ?Sized, MS: ?Sized, ST: ?Sized, L: ?Sized>(
	ctx: &TransitionContext<'_, CL, MS, ST, L>, channel: &mut Channel, msg: &msgs::AcceptChannel,
) -> Result<ChannelStateId, OpeningError>
where
	CL: ChannelLogic,
	MS: MessageSender,
	ST: ChannelStore,
	L: Logger,
{
	ctx.logic.validate_accept_channel(channel, msg)?;
	channel.attach_accept_channel(msg);

	let funding = ctx.logic.create_funding_tx(channel).await?;
	channel.attach_funding_tx(funding.transaction, funding.outpoint, funding.redeemscript);

	let remote_commitment = ctx.logic.create_remote_commitment_tx(channel)?;
	let signature = ctx.logic.sign_commitment_tx(channel, &remote_commitment).await?;
	channel.attach_remote_commitment_signature(signature);

	let funding_created = ctx.logic.create_funding_created_message(channel, signature)?;
	ctx.send(channel, Message::FundingCreated(funding_created));
	Ok(ChannelStateId::AwaitingFundingSigned)
}

async fn on_funding_signed<CL: ?Sized, MS: ?Sized, ST: ?Sized, L: ?Sized>(
	ctx: &TransitionContext<'_, CL, MS, ST, L>, channel: &mut Channel, msg: &msgs::FundingSigned,
) -> Result<ChannelStateId, OpeningError>
where
	CL: ChannelLogic,
	MS: MessageSender,
	ST: ChannelStore,
	L: Logger,
{
	ctx.logic.validate_funding_signed_message(channel, msg)?;
	channel.attach_funding_signed(msg);

	let unsigned = required(channel.funding_tx().cloned(), "funding transaction")?;
	let signed = ctx.logic.sign_funding_tx(unsigned).await?;
	ctx.logic.broadcast_tx(&signed).await;
	channel.attach_signed_funding_tx(signed);
	channel.mark_funding_broadcast();
	Ok(ChannelStateId::AwaitingFundingDepth)
}

async fn on_block_connected<CL: ?Sized, MS: ?Sized, ST: ?Sized, L: ?Sized>(
	ctx: &TransitionContext<'_, CL, MS, ST, L>, channel: &mut Channel, block: &ConnectedBlock,
) -> Result<(ChannelStateId, Update), OpeningError>
where
	CL: ChannelLogic,
	MS: MessageSender,
	ST: ChannelStore,
	L: Logger,
{
	let height = block.height();
	let mut update = Update::Unchanged;
	match channel.funding_confirmed_height() {
		Some(confirmed_height) if height < confirmed_height => {
			log_debug!(
				ctx.logger_for(channel),
				"Ignoring block {} below funding confirmation height {}",
				height,
				confirmed_height
			);
			return Ok((channel.state(), update));
		},
		Some(_) => {},
		None => {
			let outpoint = required(channel.funding_outpoint(), "funding outpoint")?;
			let funding_tx =
				match block.transactions().iter().find(|tx| tx.compute_txid() == outpoint.txid) {
					Some(tx) => tx,
					None => return Ok((channel.state(), update)),
				};
			let redeemscript = required(channel.funding_redeemscript(), "funding redeemscript")?;
			let pays_channel = outpoint.find_output(funding_tx).map_or(false, |output| {
				output.script_pubkey == redeemscript.to_p2wsh()
					&& output.value.to_sat() == channel.funding_satoshis()
			});
			if !pays_channel {
				return Err(OpeningError::InvalidFundingTransaction {
					err: format!("confirmed output {} does not pay the channel", outpoint),
				});
			}
			channel.mark_funding_confirmed(height);
			update = Update::Changed;
			log_info!(
				ctx.logger_for(channel),
				"Funding transaction {} confirmed at height {}, ready at height {}",
				outpoint.txid,
				height,
				channel.ready_height().unwrap_or(height)
			);
		},
	}

	match channel.ready_height() {
		Some(ready_height) if height >= ready_height => {},
		_ => return Ok((channel.state(), update)),
	}
	if !channel.channel_ready_sent() {
		let channel_ready = ctx.logic.create_channel_ready_message(channel)?;
		ctx.send(channel, Message::ChannelReady(channel_ready));
		channel.mark_channel_ready_sent();
		update = Update::Changed;
	}
	if channel.channel_ready_received() {
		Ok((ChannelStateId::Normal, update))
	} else {
		Ok((ChannelStateId::AwaitingChannelReady, update))
	}
}

fn on_channel_ready<CL: ?Sized, MS: ?Sized, ST: ?Sized, L: ?Sized>(
	ctx: &TransitionContext<'_, CL, MS, ST, L>, channel: &mut Channel, msg: &msgs::ChannelReady,
) -> Result<(ChannelStateId, Update), OpeningError>
where
	CL: ChannelLogic,
	MS: MessageSender,
	ST: ChannelStore,
	L: Logger,
{
	ctx.logic.validate_channel_ready_message(channel, msg)?;
	channel.attach_channel_ready(msg);
	// Before our own channel_ready, the funding depth handler finishes the job.
	match channel.state() {
		ChannelStateId::AwaitingChannelReady => Ok((ChannelStateId::Normal, Update::Changed)),
		state => Ok((state, Update::Changed)),
	}
}

async fn on_shutdown<CL: ?Sized, MS: ?Sized, ST: ?Sized, L: ?Sized>(
	ctx: &TransitionContext<'_, CL, MS, ST, L>, channel: &mut Channel, peer_connected: bool,
) -> Result<ChannelStateId, TransitionError>
where
	CL: ChannelLogic,
	MS: MessageSender,
	ST: ChannelStore,
	L: Logger,
{
	if peer_connected {
		let error = ctx.logic.create_error_message(channel, "Channel abandoned");
		ctx.send(channel, Message::Error(error));
	}
	ctx.store.remove_channel(channel).await?;
	Ok(ChannelStateId::Abandoned)
}

async fn run_hook<CL: ?Sized, MS: ?Sized, ST: ?Sized, L: ?Sized>(
	ctx: &TransitionContext<'_, CL, MS, ST, L>, channel: &mut Channel, state: ChannelStateId,
	action: ChannelAction,
) -> Result<Option<ChannelStateId>, TransitionError>
where
	CL: ChannelLogic,
	MS: MessageSender,
	ST: ChannelStore,
	L: Logger,
{
	match action {
		ChannelAction::Redirect(target) => Ok(Some(target)),
		ChannelAction::LogUsable => {
			log_info!(
				ctx.logger_for(channel),
				"Channel with {} is ready for use",
				log_pubkey!(channel.counterparty_node_id())
			);
			Ok(None)
		},
		ChannelAction::LogAbandoned => {
			log_info!(ctx.logger_for(channel), "Channel abandoned in state {}", state);
			Ok(None)
		},
		ChannelAction::FailChannel => {
			let reason = channel.failure_reason().unwrap_or("Channel failed").to_owned();
			let error = ctx.logic.create_error_message(channel, &reason);
			ctx.send(channel, Message::Error(error));
			if channel.funding_broadcast() {
				log_warn!(
					ctx.logger_for(channel),
					"Funding transaction was broadcast, the channel has to be closed on chain"
				);
				Ok(None)
			} else {
				ctx.store.remove_channel(channel).await?;
				Ok(Some(ChannelStateId::Abandoned))
			}
		},
		_ => Err(TransitionError::UnexpectedEvent { state: state.name() }),
	}
}
