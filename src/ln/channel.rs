// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The per-channel record driven through the channel state machine.
//!
//! A [`Channel`] is only mutated by the transition functions in [`crate::ln::transitions`]; all
//! other code gets read access through its getters.

use bitcoin::script::ScriptBuf;
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::PublicKey;
use bitcoin::transaction::Transaction;

use crate::chain::transaction::OutPoint;
use crate::ln::chan_utils::ChannelPublicKeys;
use crate::ln::channel_state::ChannelStateId;
use crate::ln::commitment_number::CommitmentNumber;
use crate::ln::msgs;
use crate::ln::types::ChannelId;
use crate::sign::ChannelKeys;

/// Maximum number of HTLCs either side may have pending on a commitment transaction.
pub const MAX_HTLCS: u16 = 483;

/// The longest `to_self_delay` a counterparty may impose on us by default. Two weeks of blocks.
pub const MAX_LOCAL_BREAKDOWN_TIMEOUT: u16 = 2016;

/// The smallest dust limit a counterparty may use. Below this, outputs a peer considers non-dust
/// may be non-standard and never relay.
pub const MIN_CHAN_DUST_LIMIT_SATOSHIS: u64 = 354;

/// One party's negotiated limits and commitment state within a channel.
///
/// Fields start unset and are filled as the relevant messages arrive. Once set they do not change,
/// apart from the commitment number and point pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelSide {
	pub(crate) dust_limit_satoshis: Option<u64>,
	pub(crate) channel_reserve_satoshis: Option<u64>,
	pub(crate) max_htlc_value_in_flight_msat: Option<u64>,
	pub(crate) htlc_minimum_msat: Option<u64>,
	pub(crate) max_accepted_htlcs: Option<u16>,
	pub(crate) to_self_delay: Option<u16>,
	pub(crate) pubkeys: Option<ChannelPublicKeys>,
	pub(crate) commitment_number: Option<CommitmentNumber>,
	pub(crate) next_commitment_number: Option<CommitmentNumber>,
	pub(crate) commitment_point: Option<PublicKey>,
	pub(crate) next_commitment_point: Option<PublicKey>,
	pub(crate) commitment_signature: Option<Signature>,
	pub(crate) balance_msat: u64,
	pub(crate) next_htlc_id: u64,
}

impl ChannelSide {
	/// The threshold below which this party omits outputs from its commitment transactions.
	pub fn dust_limit_satoshis(&self) -> Option<u64> {
		self.dust_limit_satoshis
	}

	/// The reserve this party requires the other to keep.
	pub fn channel_reserve_satoshis(&self) -> Option<u64> {
		self.channel_reserve_satoshis
	}

	/// The most HTLC value this party accepts in flight.
	pub fn max_htlc_value_in_flight_msat(&self) -> Option<u64> {
		self.max_htlc_value_in_flight_msat
	}

	/// The smallest HTLC this party accepts.
	pub fn htlc_minimum_msat(&self) -> Option<u64> {
		self.htlc_minimum_msat
	}

	/// The most HTLCs this party accepts at once.
	pub fn max_accepted_htlcs(&self) -> Option<u16> {
		self.max_accepted_htlcs
	}

	/// The delay this party imposes on the other's outputs.
	pub fn to_self_delay(&self) -> Option<u16> {
		self.to_self_delay
	}

	/// This party's channel basepoints.
	pub fn pubkeys(&self) -> Option<&ChannelPublicKeys> {
		self.pubkeys.as_ref()
	}

	/// The number of this party's current commitment transaction.
	pub fn commitment_number(&self) -> Option<CommitmentNumber> {
		self.commitment_number
	}

	/// The number of this party's next commitment transaction.
	pub fn next_commitment_number(&self) -> Option<CommitmentNumber> {
		self.next_commitment_number
	}

	/// The per-commitment point of this party's current commitment transaction.
	pub fn commitment_point(&self) -> Option<PublicKey> {
		self.commitment_point
	}

	/// The per-commitment point of this party's next commitment transaction.
	pub fn next_commitment_point(&self) -> Option<PublicKey> {
		self.next_commitment_point
	}

	/// The other party's signature on this party's current commitment transaction.
	pub fn commitment_signature(&self) -> Option<&Signature> {
		self.commitment_signature.as_ref()
	}

	/// This party's balance, excluding HTLCs.
	pub fn balance_msat(&self) -> u64 {
		self.balance_msat
	}

	/// The id this party will give its next HTLC.
	pub fn next_htlc_id(&self) -> u64 {
		self.next_htlc_id
	}
}

/// A channel we opened, from `open_channel` onwards.
#[derive(Clone, Debug)]
pub struct Channel {
	temporary_channel_id: ChannelId,
	channel_id: Option<ChannelId>,
	counterparty_node_id: PublicKey,
	is_funder: bool,
	funding_satoshis: u64,
	push_msat: u64,
	feerate_per_kw: u32,
	announce_channel: bool,
	minimum_depth: Option<u32>,
	keys: ChannelKeys,
	state: ChannelStateId,
	our_side: ChannelSide,
	their_side: ChannelSide,
	funding_tx: Option<Transaction>,
	funding_outpoint: Option<OutPoint>,
	funding_redeemscript: Option<ScriptBuf>,
	funding_confirmed_height: Option<u32>,
	ready_height: Option<u32>,
	funding_broadcast: bool,
	channel_ready_sent: bool,
	channel_ready_received: bool,
	failure_reason: Option<String>,
}

impl Channel {
	/// Creates a channel in the root state. `our_side` must already hold our limits, basepoints
	/// and first two commitment points.
	pub(crate) fn new(
		temporary_channel_id: ChannelId, counterparty_node_id: PublicKey, is_funder: bool,
		funding_satoshis: u64, push_msat: u64, feerate_per_kw: u32, announce_channel: bool,
		keys: ChannelKeys, our_side: ChannelSide,
	) -> Self {
		let their_side = ChannelSide { balance_msat: push_msat, ..Default::default() };
		Channel {
			temporary_channel_id,
			channel_id: None,
			counterparty_node_id,
			is_funder,
			funding_satoshis,
			push_msat,
			feerate_per_kw,
			announce_channel,
			minimum_depth: None,
			keys,
			state: ChannelStateId::Channel,
			our_side,
			their_side,
			funding_tx: None,
			funding_outpoint: None,
			funding_redeemscript: None,
			funding_confirmed_height: None,
			ready_height: None,
			funding_broadcast: false,
			channel_ready_sent: false,
			channel_ready_received: false,
			failure_reason: None,
		}
	}

	/// The id the channel was opened under. It never changes.
	pub fn temporary_channel_id(&self) -> ChannelId {
		self.temporary_channel_id
	}

	/// The funding-derived channel id, once the funding transaction exists.
	pub fn permanent_channel_id(&self) -> Option<ChannelId> {
		self.channel_id
	}

	/// The permanent id if known, else the temporary one.
	pub fn channel_id(&self) -> ChannelId {
		self.channel_id.unwrap_or(self.temporary_channel_id)
	}

	/// The peer the channel is with.
	pub fn counterparty_node_id(&self) -> PublicKey {
		self.counterparty_node_id
	}

	/// Whether we fund the channel (and pay the commitment fee).
	pub fn is_funder(&self) -> bool {
		self.is_funder
	}

	/// The channel value.
	pub fn funding_satoshis(&self) -> u64 {
		self.funding_satoshis
	}

	/// The amount given to the counterparty on open.
	pub fn push_msat(&self) -> u64 {
		self.push_msat
	}

	/// The commitment transaction fee rate.
	pub fn feerate_per_kw(&self) -> u32 {
		self.feerate_per_kw
	}

	/// Whether the channel is to be announced to the network.
	pub fn announce_channel(&self) -> bool {
		self.announce_channel
	}

	/// The confirmations the counterparty asked for, never less than one.
	pub fn minimum_depth(&self) -> Option<u32> {
		self.minimum_depth
	}

	/// Our key material for this channel.
	pub fn keys(&self) -> &ChannelKeys {
		&self.keys
	}

	/// The current node of the channel state tree.
	pub fn state(&self) -> ChannelStateId {
		self.state
	}

	/// Our negotiated parameters and commitment state.
	pub fn our_side(&self) -> &ChannelSide {
		&self.our_side
	}

	/// The counterparty's negotiated parameters and commitment state.
	pub fn their_side(&self) -> &ChannelSide {
		&self.their_side
	}

	/// The funding transaction. Signed once it has been broadcast.
	pub fn funding_tx(&self) -> Option<&Transaction> {
		self.funding_tx.as_ref()
	}

	/// The funding output.
	pub fn funding_outpoint(&self) -> Option<OutPoint> {
		self.funding_outpoint
	}

	/// The 2-of-2 script locking the funding output.
	pub fn funding_redeemscript(&self) -> Option<&ScriptBuf> {
		self.funding_redeemscript.as_ref()
	}

	/// The height of the block the funding transaction confirmed in.
	pub fn funding_confirmed_height(&self) -> Option<u32> {
		self.funding_confirmed_height
	}

	/// The height at which the funding is deep enough to send `channel_ready`.
	pub fn ready_height(&self) -> Option<u32> {
		self.ready_height
	}

	/// Whether the funding transaction was handed to the broadcaster.
	pub fn funding_broadcast(&self) -> bool {
		self.funding_broadcast
	}

	/// Whether we sent `channel_ready`.
	pub fn channel_ready_sent(&self) -> bool {
		self.channel_ready_sent
	}

	/// Whether we received the counterparty's `channel_ready`.
	pub fn channel_ready_received(&self) -> bool {
		self.channel_ready_received
	}

	/// Why the channel failed, if it did.
	pub fn failure_reason(&self) -> Option<&str> {
		self.failure_reason.as_deref()
	}

	pub(crate) fn set_state(&mut self, state: ChannelStateId) {
		self.state = state;
	}

	/// Records the counterparty's parameters from a validated `accept_channel`.
	pub(crate) fn attach_accept_channel(&mut self, msg: &msgs::AcceptChannel) {
		let their_side = &mut self.their_side;
		their_side.dust_limit_satoshis = Some(msg.dust_limit_satoshis);
		their_side.channel_reserve_satoshis = Some(msg.channel_reserve_satoshis);
		their_side.max_htlc_value_in_flight_msat = Some(msg.max_htlc_value_in_flight_msat);
		their_side.htlc_minimum_msat = Some(msg.htlc_minimum_msat);
		their_side.max_accepted_htlcs = Some(msg.max_accepted_htlcs);
		their_side.to_self_delay = Some(msg.to_self_delay);
		their_side.pubkeys = Some(ChannelPublicKeys {
			funding_pubkey: msg.funding_pubkey,
			revocation_basepoint: msg.revocation_basepoint,
			payment_point: msg.payment_basepoint,
			delayed_payment_basepoint: msg.delayed_payment_basepoint,
			htlc_basepoint: msg.htlc_basepoint,
		});
		their_side.commitment_number = Some(CommitmentNumber::zero());
		their_side.commitment_point = Some(msg.first_per_commitment_point);
		// A zero-conf request is treated as needing one confirmation.
		self.minimum_depth = Some(core::cmp::max(msg.minimum_depth, 1));
	}

	/// Records the (unsigned) funding transaction, which fixes the permanent channel id.
	pub(crate) fn attach_funding_tx(
		&mut self, funding_tx: Transaction, funding_outpoint: OutPoint, redeemscript: ScriptBuf,
	) {
		self.channel_id = Some(ChannelId::v1_from_funding_outpoint(funding_outpoint));
		self.funding_tx = Some(funding_tx);
		self.funding_outpoint = Some(funding_outpoint);
		self.funding_redeemscript = Some(redeemscript);
	}

	/// Records our signature on the counterparty's first commitment transaction.
	pub(crate) fn attach_remote_commitment_signature(&mut self, signature: Signature) {
		self.their_side.commitment_signature = Some(signature);
	}

	/// Records the counterparty's signature on our first commitment transaction.
	pub(crate) fn attach_funding_signed(&mut self, msg: &msgs::FundingSigned) {
		self.our_side.commitment_signature = Some(msg.signature);
	}

	/// Swaps in the wallet-signed funding transaction. The txid is unchanged.
	pub(crate) fn attach_signed_funding_tx(&mut self, funding_tx: Transaction) {
		self.funding_tx = Some(funding_tx);
	}

	/// Records the counterparty's `channel_ready`.
	pub(crate) fn attach_channel_ready(&mut self, msg: &msgs::ChannelReady) {
		self.their_side.next_commitment_number = CommitmentNumber::zero().next();
		self.their_side.next_commitment_point = Some(msg.next_per_commitment_point);
		self.channel_ready_received = true;
	}

	/// Records the funding confirmation height and the height at which it becomes deep enough.
	pub(crate) fn mark_funding_confirmed(&mut self, height: u32) {
		self.funding_confirmed_height = Some(height);
		let depth = self.minimum_depth.unwrap_or(1);
		self.ready_height = Some(height.saturating_add(depth));
	}

	pub(crate) fn mark_funding_broadcast(&mut self) {
		self.funding_broadcast = true;
	}

	pub(crate) fn mark_channel_ready_sent(&mut self) {
		self.channel_ready_sent = true;
	}

	pub(crate) fn set_failure_reason(&mut self, reason: String) {
		self.failure_reason = Some(reason);
	}
}
