// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The validation, construction and signing steps of opening a channel.
//!
//! [`ChannelLogic`] is what the state machine calls into. None of its methods change a
//! [`Channel`]; they compute things from it, and the transition code decides what to record.
//! [`DefaultChannelLogic`] is the implementation backed by our keys, wallet, broadcaster and fee
//! estimator.

use bitcoin::absolute::LockTime;
use bitcoin::constants::ChainHash;
use bitcoin::network::Network;
use bitcoin::script::ScriptBuf;
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{self, PublicKey, Secp256k1};
use bitcoin::transaction::{self, Transaction, TxIn, TxOut};
use bitcoin::{Amount, Sequence, Witness};

use crate::chain::chaininterface::{
	BroadcasterInterface, ConfirmationTarget, FeeEstimator, LowerBoundedFeeEstimator,
	FEERATE_FLOOR_SATS_PER_KW,
};
use crate::chain::transaction::OutPoint;
use crate::ln::chan_utils::{make_funding_redeemscript, TxCreationKeys};
use crate::ln::channel::{Channel, ChannelSide, MAX_HTLCS, MAX_LOCAL_BREAKDOWN_TIMEOUT};
use crate::ln::commitment_number::CommitmentNumber;
use crate::ln::commitment_tx::{
	commit_tx_fee_sat, CommitmentParameters, CommitmentTransaction, Htlc,
};
use crate::ln::msgs;
use crate::ln::types::ChannelId;
use crate::sign::{verify_commitment_signature, EntropySource, SignerProvider};
use crate::util::config::UserConfig;
use crate::util::errors::OpeningError;
use crate::util::logger::{Logger, WithContext};
use crate::util::transaction_utils::{
	P2WPKH_TXOUT_WEIGHT, P2WSH_TXOUT_WEIGHT, SEGWIT_TX_BASE_WEIGHT,
};
use crate::util::wallet_utils::{select_utxos_largest_first, WalletSource};

use core::cmp;
use core::future::Future;
use core::ops::Deref;

/// `channel_flags` bit asking for the channel to be announced.
const ANNOUNCE_CHANNEL_FLAG: u8 = 1;

/// What the user asks for when opening a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenChannelRequest {
	/// The channel value.
	pub funding_satoshis: u64,
	/// Millisatoshis given to the counterparty on open.
	pub push_msat: u64,
	/// The commitment fee rate. `None` uses the fee estimator.
	pub feerate_per_kw: Option<u32>,
	/// Whether to announce the channel once it is usable.
	pub announce_channel: bool,
	/// An opaque id, mixed into the channel's key derivation.
	pub user_channel_id: u128,
}

impl OpenChannelRequest {
	/// A request for an unannounced channel of `funding_satoshis`, with nothing pushed and the
	/// estimated fee rate.
	pub fn new(funding_satoshis: u64) -> Self {
		OpenChannelRequest {
			funding_satoshis,
			push_msat: 0,
			feerate_per_kw: None,
			announce_channel: false,
			user_channel_id: 0,
		}
	}
}

/// An unsigned funding transaction and where the channel's output sits in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundingTransaction {
	/// The unsigned transaction.
	pub transaction: Transaction,
	/// The 2-of-2 output funding the channel.
	pub outpoint: OutPoint,
	/// The witness script of that output.
	pub redeemscript: ScriptBuf,
}

/// The per-step behavior of opening a channel.
///
/// The asynchronous methods reach out to the wallet, the signer or the network. The synchronous
/// ones are pure functions of the channel and a message.
pub trait ChannelLogic {
	/// Validates the request and builds a channel with our side's parameters, keys and first two
	/// commitment points filled in.
	fn create_channel<'a>(
		&'a self, counterparty_node_id: PublicKey, request: &'a OpenChannelRequest,
	) -> impl Future<Output = Result<Channel, OpeningError>> + Send + 'a;

	/// Builds our `open_channel` from the channel.
	fn create_open_channel_message(
		&self, channel: &Channel,
	) -> Result<msgs::OpenChannel, OpeningError>;

	/// Checks the counterparty's `accept_channel` against our policy.
	fn validate_accept_channel(
		&self, channel: &Channel, msg: &msgs::AcceptChannel,
	) -> Result<(), OpeningError>;

	/// Selects coins and builds the unsigned funding transaction.
	fn create_funding_tx<'a>(
		&'a self, channel: &'a Channel,
	) -> impl Future<Output = Result<FundingTransaction, OpeningError>> + Send + 'a;

	/// Builds the counterparty's first commitment transaction.
	fn create_remote_commitment_tx(
		&self, channel: &Channel,
	) -> Result<CommitmentTransaction, OpeningError>;

	/// Builds our first commitment transaction.
	fn create_local_commitment_tx(
		&self, channel: &Channel,
	) -> Result<CommitmentTransaction, OpeningError>;

	/// Signs a commitment transaction with our funding key.
	fn sign_commitment_tx<'a>(
		&'a self, channel: &'a Channel, commitment_tx: &'a CommitmentTransaction,
	) -> impl Future<Output = Result<Signature, OpeningError>> + Send + 'a;

	/// Builds `funding_created` carrying our signature on the remote commitment.
	fn create_funding_created_message(
		&self, channel: &Channel, signature: Signature,
	) -> Result<msgs::FundingCreated, OpeningError>;

	/// Checks `funding_signed` signs our first commitment transaction.
	fn validate_funding_signed_message(
		&self, channel: &Channel, msg: &msgs::FundingSigned,
	) -> Result<(), OpeningError>;

	/// Has the wallet sign the funding transaction. The txid must not change.
	fn sign_funding_tx<'a>(
		&'a self, funding_tx: Transaction,
	) -> impl Future<Output = Result<Transaction, OpeningError>> + Send + 'a;

	/// Hands a transaction to the network.
	fn broadcast_tx<'a>(&'a self, tx: &'a Transaction) -> impl Future<Output = ()> + Send + 'a;

	/// Builds our `channel_ready`.
	fn create_channel_ready_message(
		&self, channel: &Channel,
	) -> Result<msgs::ChannelReady, OpeningError>;

	/// Checks the counterparty's `channel_ready` belongs to the channel.
	fn validate_channel_ready_message(
		&self, channel: &Channel, msg: &msgs::ChannelReady,
	) -> Result<(), OpeningError>;

	/// Builds an `error` for the channel.
	fn create_error_message(&self, channel: &Channel, reason: &str) -> msgs::ErrorMessage;
}

fn required<T>(value: Option<T>, name: &'static str) -> Result<T, OpeningError> {
	value.ok_or(OpeningError::MissingParameter { name })
}

/// The weight of a funding transaction before any inputs: the funding output and a change output.
fn funding_tx_base_weight() -> u64 {
	SEGWIT_TX_BASE_WEIGHT + P2WSH_TXOUT_WEIGHT + P2WPKH_TXOUT_WEIGHT
}

/// [`ChannelLogic`] backed by a [`KeysManager`]-like signer, a [`WalletSource`], a
/// [`BroadcasterInterface`] and a [`FeeEstimator`].
///
/// [`KeysManager`]: crate::sign::KeysManager
pub struct DefaultChannelLogic<K: Deref, W: Deref, B: Deref, F: Deref, L: Deref>
where
	K::Target: EntropySource + SignerProvider,
	W::Target: WalletSource,
	B::Target: BroadcasterInterface,
	F::Target: FeeEstimator,
	L::Target: Logger,
{
	keys_manager: K,
	wallet: W,
	broadcaster: B,
	fee_estimator: LowerBoundedFeeEstimator<F>,
	config: UserConfig,
	chain_hash: ChainHash,
	logger: L,
	secp_ctx: Secp256k1<secp256k1::All>,
}

impl<K: Deref, W: Deref, B: Deref, F: Deref, L: Deref> DefaultChannelLogic<K, W, B, F, L>
where
	K::Target: EntropySource + SignerProvider,
	W::Target: WalletSource,
	B::Target: BroadcasterInterface,
	F::Target: FeeEstimator,
	L::Target: Logger,
{
	/// Constructs a new `DefaultChannelLogic` opening channels on `network`.
	pub fn new(
		keys_manager: K, wallet: W, broadcaster: B, fee_estimator: F, config: UserConfig,
		network: Network, logger: L,
	) -> Self {
		DefaultChannelLogic {
			keys_manager,
			wallet,
			broadcaster,
			fee_estimator: LowerBoundedFeeEstimator::new(fee_estimator),
			config,
			chain_hash: ChainHash::using_genesis_block(network),
			logger,
			secp_ctx: Secp256k1::new(),
		}
	}

	/// The configuration channels are opened and checked with.
	pub fn config(&self) -> &UserConfig {
		&self.config
	}

	/// Builds our (`local`) or the counterparty's commitment transaction at the channel's
	/// current commitment number, carrying `htlcs`.
	///
	/// HTLC directions are given as seen from our own commitment transaction and are flipped on
	/// the counterparty's.
	pub fn build_commitment_tx(
		&self, channel: &Channel, local: bool, htlcs: &[Htlc],
	) -> Result<CommitmentTransaction, OpeningError> {
		let htlcs: Vec<Htlc> =
			if local { htlcs.to_vec() } else { htlcs.iter().map(Htlc::mirrored).collect() };
		let our_keys = channel.keys().pubkeys();
		let their_keys = required(channel.their_side().pubkeys(), "counterparty basepoints")?;
		let funding_outpoint = required(channel.funding_outpoint(), "funding outpoint")?;

		let (broadcaster, countersignatory) = if local {
			(channel.our_side(), channel.their_side())
		} else {
			(channel.their_side(), channel.our_side())
		};
		let (broadcaster_keys, countersignatory_keys) =
			if local { (our_keys, their_keys) } else { (their_keys, our_keys) };
		let (open_payment_basepoint, accept_payment_basepoint) = if channel.is_funder() {
			(&our_keys.payment_point, &their_keys.payment_point)
		} else {
			(&their_keys.payment_point, &our_keys.payment_point)
		};

		let per_commitment_point = required(broadcaster.commitment_point(), "commitment point")?;
		let keys = TxCreationKeys::from_channel_static_keys(
			&per_commitment_point,
			broadcaster_keys,
			countersignatory_keys,
			&self.secp_ctx,
		);
		let params = CommitmentParameters {
			funding_outpoint,
			commitment_number: required(broadcaster.commitment_number(), "commitment number")?,
			open_payment_basepoint,
			accept_payment_basepoint,
			broadcaster_is_funder: local == channel.is_funder(),
			to_broadcaster_value_msat: broadcaster.balance_msat(),
			to_countersignatory_value_msat: countersignatory.balance_msat(),
			feerate_per_kw: channel.feerate_per_kw(),
			dust_limit_satoshis: required(broadcaster.dust_limit_satoshis(), "dust limit")?,
			// The delay on the broadcaster's output is chosen by the countersignatory.
			contest_delay: required(countersignatory.to_self_delay(), "to_self_delay")?,
			keys: &keys,
			countersignatory_payment_point: &countersignatory_keys.payment_point,
			htlcs: &htlcs,
		};
		Ok(CommitmentTransaction::build(&params))
	}
}

impl<K: Deref + Sync, W: Deref + Sync, B: Deref + Sync, F: Deref + Sync, L: Deref + Sync>
	ChannelLogic for DefaultChannelLogic<K, W, B, F, L>
where
	K::Target: EntropySource + SignerProvider + Sync,
	W::Target: WalletSource + Sync,
	B::Target: BroadcasterInterface + Sync,
	F::Target: FeeEstimator + Sync,
	L::Target: Logger + Sync,
{
	fn create_channel<'a>(
		&'a self, counterparty_node_id: PublicKey, request: &'a OpenChannelRequest,
	) -> impl Future<Output = Result<Channel, OpeningError>> + Send + 'a {
		async move {
			let limits = &self.config.channel_handshake_limits;
			let handshake = &self.config.channel_handshake_config;
			let funding_satoshis = request.funding_satoshis;

			if funding_satoshis < limits.min_funding_satoshis {
				return Err(OpeningError::FundingAmountTooLow {
					funding_satoshis,
					min_funding_satoshis: limits.min_funding_satoshis,
				});
			}
			if funding_satoshis > limits.max_funding_satoshis {
				return Err(OpeningError::FundingAmountTooHigh {
					funding_satoshis,
					max_funding_satoshis: limits.max_funding_satoshis,
				});
			}
			let funding_msat = funding_satoshis * 1000;
			if request.push_msat > funding_msat {
				return Err(OpeningError::PushAmountTooHigh {
					push_msat: request.push_msat,
					funding_msat,
				});
			}
			let feerate_per_kw = match request.feerate_per_kw {
				Some(feerate) => feerate,
				None => self
					.fee_estimator
					.bounded_sat_per_1000_weight(ConfirmationTarget::NonAnchorChannelFee),
			};
			if feerate_per_kw < FEERATE_FLOOR_SATS_PER_KW {
				return Err(OpeningError::FeeRateTooLow { feerate_per_kw });
			}

			// Fail early rather than after the counterparty has committed resources to us.
			let utxos = self
				.wallet
				.list_confirmed_utxos()
				.await
				.map_err(|()| OpeningError::WalletUnavailable)?;
			let funding_feerate =
				self.fee_estimator.bounded_sat_per_1000_weight(ConfirmationTarget::ChannelFunding);
			select_utxos_largest_first(
				utxos,
				funding_satoshis,
				funding_feerate,
				funding_tx_base_weight(),
			)
			.map_err(|(needed_sats, available_sats)| OpeningError::FundsNotAvailable {
				needed_sats,
				available_sats,
			})?;

			let temporary_channel_id = ChannelId::temporary_from_entropy_source(&self.keys_manager);
			let keys_id = self.keys_manager.generate_channel_keys_id(
				false,
				funding_satoshis,
				request.user_channel_id,
			);
			let keys = self.keys_manager.derive_channel_keys(funding_satoshis, keys_id);

			let commitment_number = CommitmentNumber::zero();
			let next_commitment_number = commitment_number.next();
			let our_side = ChannelSide {
				dust_limit_satoshis: Some(handshake.effective_dust_limit_satoshis()),
				channel_reserve_satoshis: Some(
					handshake.their_channel_reserve_satoshis(funding_satoshis),
				),
				max_htlc_value_in_flight_msat: Some(
					handshake.max_htlc_value_in_flight_msat(funding_satoshis),
				),
				htlc_minimum_msat: Some(cmp::max(handshake.our_htlc_minimum_msat, 1)),
				max_accepted_htlcs: Some(handshake.effective_max_accepted_htlcs()),
				to_self_delay: Some(handshake.our_to_self_delay),
				pubkeys: Some(keys.pubkeys().clone()),
				commitment_number: Some(commitment_number),
				next_commitment_number,
				commitment_point: Some(keys.per_commitment_point(commitment_number, &self.secp_ctx)),
				next_commitment_point: next_commitment_number
					.map(|n| keys.per_commitment_point(n, &self.secp_ctx)),
				commitment_signature: None,
				balance_msat: funding_msat - request.push_msat,
				next_htlc_id: 0,
			};

			let logger =
				WithContext::from(&self.logger, Some(counterparty_node_id), Some(temporary_channel_id));
			log_debug!(
				logger,
				"Created channel {} for {} sat, pushing {} msat, at {} sat/kW",
				temporary_channel_id,
				funding_satoshis,
				request.push_msat,
				feerate_per_kw
			);
			Ok(Channel::new(
				temporary_channel_id,
				counterparty_node_id,
				true,
				funding_satoshis,
				request.push_msat,
				feerate_per_kw,
				request.announce_channel,
				keys,
				our_side,
			))
		}
	}

	fn create_open_channel_message(
		&self, channel: &Channel,
	) -> Result<msgs::OpenChannel, OpeningError> {
		let our_side = channel.our_side();
		let pubkeys = required(our_side.pubkeys(), "basepoints")?;
		Ok(msgs::OpenChannel {
			chain_hash: self.chain_hash,
			temporary_channel_id: channel.temporary_channel_id(),
			funding_satoshis: channel.funding_satoshis(),
			push_msat: channel.push_msat(),
			dust_limit_satoshis: required(our_side.dust_limit_satoshis(), "dust limit")?,
			max_htlc_value_in_flight_msat: required(
				our_side.max_htlc_value_in_flight_msat(),
				"max_htlc_value_in_flight_msat",
			)?,
			channel_reserve_satoshis: required(
				our_side.channel_reserve_satoshis(),
				"channel reserve",
			)?,
			htlc_minimum_msat: required(our_side.htlc_minimum_msat(), "htlc_minimum_msat")?,
			feerate_per_kw: channel.feerate_per_kw(),
			to_self_delay: required(our_side.to_self_delay(), "to_self_delay")?,
			max_accepted_htlcs: required(our_side.max_accepted_htlcs(), "max_accepted_htlcs")?,
			funding_pubkey: pubkeys.funding_pubkey,
			revocation_basepoint: pubkeys.revocation_basepoint,
			payment_basepoint: pubkeys.payment_point,
			delayed_payment_basepoint: pubkeys.delayed_payment_basepoint,
			htlc_basepoint: pubkeys.htlc_basepoint,
			first_per_commitment_point: required(our_side.commitment_point(), "commitment point")?,
			channel_flags: if channel.announce_channel() { ANNOUNCE_CHANNEL_FLAG } else { 0 },
			shutdown_scriptpubkey: None,
		})
	}

	fn validate_accept_channel(
		&self, channel: &Channel, msg: &msgs::AcceptChannel,
	) -> Result<(), OpeningError> {
		let limits = &self.config.channel_handshake_limits;
		let our_side = channel.our_side();
		let funding_satoshis = channel.funding_satoshis();

		if msg.temporary_channel_id != channel.temporary_channel_id() {
			return Err(OpeningError::ChannelIdMismatch {
				expected: channel.temporary_channel_id(),
				actual: msg.temporary_channel_id,
			});
		}

		if msg.dust_limit_satoshis < limits.min_dust_limit_satoshis {
			return Err(OpeningError::DustLimitTooLow {
				dust_limit_satoshis: msg.dust_limit_satoshis,
				min_dust_limit_satoshis: limits.min_dust_limit_satoshis,
			});
		}
		// Their dust limit may not exceed the reserve we require of them, or they could hold an
		// unpunishable balance.
		let our_required_reserve =
			required(our_side.channel_reserve_satoshis(), "channel reserve")?;
		let max_dust_limit_satoshis = cmp::min(limits.max_dust_limit_satoshis, our_required_reserve);
		if msg.dust_limit_satoshis > max_dust_limit_satoshis {
			return Err(OpeningError::DustLimitTooHigh {
				dust_limit_satoshis: msg.dust_limit_satoshis,
				max_dust_limit_satoshis,
			});
		}

		if msg.channel_reserve_satoshis > funding_satoshis {
			return Err(OpeningError::ChannelReserveTooHigh {
				channel_reserve_satoshis: msg.channel_reserve_satoshis,
				max_channel_reserve_satoshis: funding_satoshis,
			});
		}
		if msg.channel_reserve_satoshis > limits.max_channel_reserve_satoshis {
			return Err(OpeningError::ChannelReserveTooHigh {
				channel_reserve_satoshis: msg.channel_reserve_satoshis,
				max_channel_reserve_satoshis: limits.max_channel_reserve_satoshis,
			});
		}
		let our_dust_limit = required(our_side.dust_limit_satoshis(), "dust limit")?;
		if msg.channel_reserve_satoshis < our_dust_limit {
			return Err(OpeningError::ChannelReserveTooLow {
				channel_reserve_satoshis: msg.channel_reserve_satoshis,
				dust_limit_satoshis: our_dust_limit,
			});
		}
		let our_balance_satoshis = (funding_satoshis * 1000 - channel.push_msat()) / 1000;
		let our_balance_satoshis = our_balance_satoshis
			.saturating_sub(commit_tx_fee_sat(channel.feerate_per_kw(), 0));
		if our_balance_satoshis < msg.channel_reserve_satoshis {
			return Err(OpeningError::ChannelReserveUnreachable {
				channel_reserve_satoshis: msg.channel_reserve_satoshis,
				our_balance_satoshis,
			});
		}

		let full_channel_value_msat =
			(funding_satoshis - msg.channel_reserve_satoshis) * 1000;
		if msg.htlc_minimum_msat >= full_channel_value_msat
			|| msg.htlc_minimum_msat > limits.max_htlc_minimum_msat
		{
			return Err(OpeningError::HtlcMinimumTooHigh {
				htlc_minimum_msat: msg.htlc_minimum_msat,
			});
		}
		if msg.max_htlc_value_in_flight_msat < limits.min_max_htlc_value_in_flight_msat {
			return Err(OpeningError::MaxHtlcValueInFlightTooLow {
				max_htlc_value_in_flight_msat: msg.max_htlc_value_in_flight_msat,
			});
		}
		if msg.max_accepted_htlcs < cmp::max(1, limits.min_max_accepted_htlcs) {
			return Err(OpeningError::MaxAcceptedHtlcsTooLow {
				max_accepted_htlcs: msg.max_accepted_htlcs,
			});
		}
		if msg.max_accepted_htlcs > MAX_HTLCS {
			return Err(OpeningError::MaxAcceptedHtlcsTooHigh {
				max_accepted_htlcs: msg.max_accepted_htlcs,
			});
		}
		let max_to_self_delay = cmp::min(limits.their_to_self_delay, MAX_LOCAL_BREAKDOWN_TIMEOUT);
		if msg.to_self_delay > max_to_self_delay {
			return Err(OpeningError::ToSelfDelayTooHigh {
				to_self_delay: msg.to_self_delay,
				max_to_self_delay,
			});
		}
		if msg.minimum_depth > limits.max_minimum_depth {
			return Err(OpeningError::MinimumDepthTooHigh {
				minimum_depth: msg.minimum_depth,
				max_minimum_depth: limits.max_minimum_depth,
			});
		}
		Ok(())
	}

	fn create_funding_tx<'a>(
		&'a self, channel: &'a Channel,
	) -> impl Future<Output = Result<FundingTransaction, OpeningError>> + Send + 'a {
		async move {
			let their_pubkeys = required(channel.their_side().pubkeys(), "counterparty basepoints")?;
			let redeemscript = make_funding_redeemscript(
				&channel.keys().pubkeys().funding_pubkey,
				&their_pubkeys.funding_pubkey,
			);
			let funding_satoshis = channel.funding_satoshis();

			let utxos = self
				.wallet
				.list_confirmed_utxos()
				.await
				.map_err(|()| OpeningError::WalletUnavailable)?;
			let feerate =
				self.fee_estimator.bounded_sat_per_1000_weight(ConfirmationTarget::ChannelFunding);
			let selection = select_utxos_largest_first(
				utxos,
				funding_satoshis,
				feerate,
				funding_tx_base_weight(),
			)
			.map_err(|(needed_sats, available_sats)| OpeningError::FundsNotAvailable {
				needed_sats,
				available_sats,
			})?;

			let mut output = vec![TxOut {
				value: Amount::from_sat(funding_satoshis),
				script_pubkey: redeemscript.to_p2wsh(),
			}];
			let dust_limit = self.config.channel_handshake_config.effective_dust_limit_satoshis();
			if selection.change_satoshis >= dust_limit {
				let change_script = self
					.wallet
					.get_change_script()
					.await
					.map_err(|()| OpeningError::WalletUnavailable)?;
				output.push(TxOut {
					value: Amount::from_sat(selection.change_satoshis),
					script_pubkey: change_script,
				});
			}
			let input = selection
				.confirmed_utxos
				.iter()
				.map(|utxo| TxIn {
					previous_output: utxo.outpoint,
					script_sig: ScriptBuf::new(),
					sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
					witness: Witness::new(),
				})
				.collect();
			let transaction = Transaction {
				version: transaction::Version::TWO,
				lock_time: LockTime::ZERO,
				input,
				output,
			};
			let outpoint = OutPoint { txid: transaction.compute_txid(), index: 0 };

			let logger = WithContext::from(
				&self.logger,
				Some(channel.counterparty_node_id()),
				Some(channel.temporary_channel_id()),
			);
			log_debug!(
				logger,
				"Built funding transaction {} spending {} inputs with {} sat in fees",
				outpoint.txid,
				selection.confirmed_utxos.len(),
				selection.fee_satoshis
			);
			Ok(FundingTransaction { transaction, outpoint, redeemscript })
		}
	}

	fn create_remote_commitment_tx(
		&self, channel: &Channel,
	) -> Result<CommitmentTransaction, OpeningError> {
		self.build_commitment_tx(channel, false, &[])
	}

	fn create_local_commitment_tx(
		&self, channel: &Channel,
	) -> Result<CommitmentTransaction, OpeningError> {
		self.build_commitment_tx(channel, true, &[])
	}

	fn sign_commitment_tx<'a>(
		&'a self, channel: &'a Channel, commitment_tx: &'a CommitmentTransaction,
	) -> impl Future<Output = Result<Signature, OpeningError>> + Send + 'a {
		async move {
			let their_pubkeys = required(channel.their_side().pubkeys(), "counterparty basepoints")?;
			channel
				.keys()
				.sign_commitment(commitment_tx, &their_pubkeys.funding_pubkey, &self.secp_ctx)
				.map_err(|()| OpeningError::SigningFailed {
					err: format!("cannot sign commitment {}", commitment_tx.txid()),
				})
		}
	}

	fn create_funding_created_message(
		&self, channel: &Channel, signature: Signature,
	) -> Result<msgs::FundingCreated, OpeningError> {
		let funding_outpoint = required(channel.funding_outpoint(), "funding outpoint")?;
		Ok(msgs::FundingCreated {
			temporary_channel_id: channel.temporary_channel_id(),
			funding_txid: funding_outpoint.txid,
			funding_output_index: funding_outpoint.index,
			signature,
		})
	}

	fn validate_funding_signed_message(
		&self, channel: &Channel, msg: &msgs::FundingSigned,
	) -> Result<(), OpeningError> {
		let channel_id = required(channel.permanent_channel_id(), "funding outpoint")?;
		if msg.channel_id != channel_id {
			return Err(OpeningError::ChannelIdMismatch { expected: channel_id, actual: msg.channel_id });
		}
		let their_pubkeys = required(channel.their_side().pubkeys(), "counterparty basepoints")?;
		let redeemscript = required(channel.funding_redeemscript(), "funding redeemscript")?;
		let local_commitment = self.create_local_commitment_tx(channel)?;
		if !verify_commitment_signature(
			&self.secp_ctx,
			local_commitment.transaction(),
			redeemscript,
			channel.funding_satoshis(),
			&msg.signature,
			&their_pubkeys.funding_pubkey,
		) {
			return Err(OpeningError::InvalidCommitmentSig);
		}
		Ok(())
	}

	fn sign_funding_tx<'a>(
		&'a self, funding_tx: Transaction,
	) -> impl Future<Output = Result<Transaction, OpeningError>> + Send + 'a {
		async move {
			let txid = funding_tx.compute_txid();
			let signed = self
				.wallet
				.sign_transaction(funding_tx)
				.await
				.map_err(|()| OpeningError::WalletUnavailable)?;
			let signed_txid = signed.compute_txid();
			if signed_txid != txid {
				return Err(OpeningError::InvalidFundingTransaction {
					err: format!("wallet changed txid from {} to {}", txid, signed_txid),
				});
			}
			Ok(signed)
		}
	}

	fn broadcast_tx<'a>(&'a self, tx: &'a Transaction) -> impl Future<Output = ()> + Send + 'a {
		async move {
			log_info!(self.logger, "Broadcasting transaction {}", tx.compute_txid());
			self.broadcaster.broadcast_transactions(&[tx]);
		}
	}

	fn create_channel_ready_message(
		&self, channel: &Channel,
	) -> Result<msgs::ChannelReady, OpeningError> {
		Ok(msgs::ChannelReady {
			channel_id: required(channel.permanent_channel_id(), "funding outpoint")?,
			next_per_commitment_point: required(
				channel.our_side().next_commitment_point(),
				"next commitment point",
			)?,
		})
	}

	fn validate_channel_ready_message(
		&self, channel: &Channel, msg: &msgs::ChannelReady,
	) -> Result<(), OpeningError> {
		let channel_id = required(channel.permanent_channel_id(), "funding outpoint")?;
		if msg.channel_id != channel_id {
			return Err(OpeningError::ChannelIdMismatch { expected: channel_id, actual: msg.channel_id });
		}
		Ok(())
	}

	fn create_error_message(&self, channel: &Channel, reason: &str) -> msgs::ErrorMessage {
		msgs::ErrorMessage { channel_id: channel.channel_id(), data: reason.to_owned() }
	}
}
