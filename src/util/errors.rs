// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Error types live here.

use crate::ln::types::ChannelId;

use core::fmt;
use std::io;

/// Indicates why opening a channel, or one of the negotiation steps that follow, was refused.
///
/// These are returned (never panicked on) from validation-shaped operations. Inside the channel
/// state machine any of them sends the channel to the failing state rather than being surfaced to
/// the caller.
#[derive(Clone, PartialEq, Eq)]
pub enum OpeningError {
	/// The peer we were asked to open a channel with is not connected and initialized.
	PeerNotReady,
	/// Our wallet cannot cover the funding amount plus fees.
	FundsNotAvailable {
		/// Satoshis we needed, including the funding transaction fee.
		needed_sats: u64,
		/// Satoshis the wallet could offer.
		available_sats: u64,
	},
	/// The requested channel value is below our configured minimum.
	FundingAmountTooLow {
		/// The requested channel value.
		funding_satoshis: u64,
		/// The smallest value we accept.
		min_funding_satoshis: u64,
	},
	/// The requested channel value is above our configured maximum.
	FundingAmountTooHigh {
		/// The requested channel value.
		funding_satoshis: u64,
		/// The largest value we accept.
		max_funding_satoshis: u64,
	},
	/// The amount pushed to the counterparty exceeds the channel value.
	PushAmountTooHigh {
		/// The requested push amount.
		push_msat: u64,
		/// The channel value, in millisatoshis.
		funding_msat: u64,
	},
	/// The fee rate for the commitment transaction is below the network floor.
	FeeRateTooLow {
		/// The fee rate, in satoshis per 1000 weight units.
		feerate_per_kw: u32,
	},
	/// The counterparty's dust limit is below our policy floor.
	DustLimitTooLow {
		/// The dust limit they proposed.
		dust_limit_satoshis: u64,
		/// Our floor.
		min_dust_limit_satoshis: u64,
	},
	/// The counterparty's dust limit is above our policy ceiling or above the reserve we require.
	DustLimitTooHigh {
		/// The dust limit they proposed.
		dust_limit_satoshis: u64,
		/// The largest value we would have taken.
		max_dust_limit_satoshis: u64,
	},
	/// The reserve the counterparty asks of us is smaller than our own dust limit.
	ChannelReserveTooLow {
		/// The reserve they proposed.
		channel_reserve_satoshis: u64,
		/// Our dust limit.
		dust_limit_satoshis: u64,
	},
	/// The reserve the counterparty asks of us is larger than we accept.
	ChannelReserveTooHigh {
		/// The reserve they proposed.
		channel_reserve_satoshis: u64,
		/// The largest reserve we accept.
		max_channel_reserve_satoshis: u64,
	},
	/// Our initial balance cannot meet the reserve the counterparty requires of us.
	ChannelReserveUnreachable {
		/// The reserve they proposed.
		channel_reserve_satoshis: u64,
		/// Our initial balance after the commitment fee.
		our_balance_satoshis: u64,
	},
	/// The counterparty's minimum HTLC value is unusably large.
	HtlcMinimumTooHigh {
		/// The minimum they proposed.
		htlc_minimum_msat: u64,
	},
	/// The counterparty's in-flight cap is below our configured minimum.
	MaxHtlcValueInFlightTooLow {
		/// The cap they proposed.
		max_htlc_value_in_flight_msat: u64,
	},
	/// The counterparty's HTLC count limit is zero or below our configured minimum.
	MaxAcceptedHtlcsTooLow {
		/// The limit they proposed.
		max_accepted_htlcs: u16,
	},
	/// The counterparty's HTLC count limit is above the protocol maximum.
	MaxAcceptedHtlcsTooHigh {
		/// The limit they proposed.
		max_accepted_htlcs: u16,
	},
	/// The counterparty wants our funds locked for longer than we accept.
	ToSelfDelayTooHigh {
		/// The delay they proposed.
		to_self_delay: u16,
		/// The longest delay we accept.
		max_to_self_delay: u16,
	},
	/// The counterparty wants more funding confirmations than we accept.
	MinimumDepthTooHigh {
		/// The depth they proposed.
		minimum_depth: u32,
		/// The deepest we accept.
		max_minimum_depth: u32,
	},
	/// The counterparty's signature does not sign our commitment transaction.
	InvalidCommitmentSig,
	/// A message referenced a different channel than the one it was routed to.
	ChannelIdMismatch {
		/// The channel id we expected.
		expected: ChannelId,
		/// The channel id in the message.
		actual: ChannelId,
	},
	/// The funding transaction is malformed or changed txid when signed.
	InvalidFundingTransaction {
		/// A human-readable error message
		err: String,
	},
	/// We failed to produce a signature.
	SigningFailed {
		/// A human-readable error message
		err: String,
	},
	/// The wallet failed to answer a request.
	WalletUnavailable,
	/// The channel lacks a value the operation needs, usually because it ran out of order.
	MissingParameter {
		/// What was missing.
		name: &'static str,
	},
	/// The new channel could not be stored.
	PersistenceFailed {
		/// A human-readable error message
		err: String,
	},
}

impl fmt::Debug for OpeningError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			OpeningError::PeerNotReady => f.write_str("Peer is not connected and ready"),
			OpeningError::FundsNotAvailable { needed_sats, available_sats } => write!(
				f,
				"Insufficient wallet funds: needed {} sat, only {} sat available",
				needed_sats, available_sats
			),
			OpeningError::FundingAmountTooLow { funding_satoshis, min_funding_satoshis } => write!(
				f,
				"Funding amount {} sat is below the minimum of {} sat",
				funding_satoshis, min_funding_satoshis
			),
			OpeningError::FundingAmountTooHigh { funding_satoshis, max_funding_satoshis } => write!(
				f,
				"Funding amount {} sat exceeds the maximum of {} sat",
				funding_satoshis, max_funding_satoshis
			),
			OpeningError::PushAmountTooHigh { push_msat, funding_msat } => write!(
				f,
				"Push amount {} msat exceeds the channel value of {} msat",
				push_msat, funding_msat
			),
			OpeningError::FeeRateTooLow { feerate_per_kw } => {
				write!(f, "Fee rate {} sat/kW is below the network floor", feerate_per_kw)
			},
			OpeningError::DustLimitTooLow { dust_limit_satoshis, min_dust_limit_satoshis } => {
				write!(
					f,
					"dust_limit_satoshis {} is less than the implementation limit {}",
					dust_limit_satoshis, min_dust_limit_satoshis
				)
			},
			OpeningError::DustLimitTooHigh { dust_limit_satoshis, max_dust_limit_satoshis } => {
				write!(
					f,
					"dust_limit_satoshis {} is greater than the limit {}",
					dust_limit_satoshis, max_dust_limit_satoshis
				)
			},
			OpeningError::ChannelReserveTooLow { channel_reserve_satoshis, dust_limit_satoshis } => {
				write!(
					f,
					"channel_reserve_satoshis {} is less than our dust limit {}",
					channel_reserve_satoshis, dust_limit_satoshis
				)
			},
			OpeningError::ChannelReserveTooHigh {
				channel_reserve_satoshis,
				max_channel_reserve_satoshis,
			} => write!(
				f,
				"channel_reserve_satoshis {} is higher than we accept ({})",
				channel_reserve_satoshis, max_channel_reserve_satoshis
			),
			OpeningError::ChannelReserveUnreachable {
				channel_reserve_satoshis,
				our_balance_satoshis,
			} => write!(
				f,
				"Our balance of {} sat can never meet the required reserve of {} sat",
				our_balance_satoshis, channel_reserve_satoshis
			),
			OpeningError::HtlcMinimumTooHigh { htlc_minimum_msat } => {
				write!(f, "htlc_minimum_msat {} is unusably large", htlc_minimum_msat)
			},
			OpeningError::MaxHtlcValueInFlightTooLow { max_htlc_value_in_flight_msat } => write!(
				f,
				"max_htlc_value_in_flight_msat {} is below our minimum",
				max_htlc_value_in_flight_msat
			),
			OpeningError::MaxAcceptedHtlcsTooLow { max_accepted_htlcs } => {
				write!(f, "max_accepted_htlcs {} is too small", max_accepted_htlcs)
			},
			OpeningError::MaxAcceptedHtlcsTooHigh { max_accepted_htlcs } => {
				write!(f, "max_accepted_htlcs {} is greater than 483", max_accepted_htlcs)
			},
			OpeningError::ToSelfDelayTooHigh { to_self_delay, max_to_self_delay } => write!(
				f,
				"They wanted our payments to be delayed by {} blocks, we accept at most {}",
				to_self_delay, max_to_self_delay
			),
			OpeningError::MinimumDepthTooHigh { minimum_depth, max_minimum_depth } => write!(
				f,
				"We consider minimum_depth {} unreasonably large, we accept at most {}",
				minimum_depth, max_minimum_depth
			),
			OpeningError::InvalidCommitmentSig => {
				f.write_str("Invalid funding_signed signature from peer")
			},
			OpeningError::ChannelIdMismatch { ref expected, ref actual } => {
				write!(f, "Message for channel {} arrived on channel {}", actual, expected)
			},
			OpeningError::InvalidFundingTransaction { ref err } => {
				write!(f, "Invalid funding transaction: {}", err)
			},
			OpeningError::SigningFailed { ref err } => write!(f, "Signing failed: {}", err),
			OpeningError::WalletUnavailable => f.write_str("Wallet did not answer"),
			OpeningError::MissingParameter { name } => write!(f, "Channel has no {} yet", name),
			OpeningError::PersistenceFailed { ref err } => {
				write!(f, "Failed to persist channel: {}", err)
			},
		}
	}
}

impl fmt::Display for OpeningError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

impl std::error::Error for OpeningError {}

/// An unexpected failure while moving a channel between states.
///
/// Unlike [`OpeningError`]s these are not turned into channel state. They abort processing of the
/// event that caused them and are reported to whoever drives the [`ChannelManager`].
///
/// [`ChannelManager`]: crate::ln::channelmanager::ChannelManager
#[derive(Debug)]
pub enum TransitionError {
	/// The storage collaborator failed to persist or remove a channel.
	Persistence(io::Error),
	/// A state name did not resolve to any node of the state tree.
	UnknownState(&'static str),
	/// A chain of transitions revisited a state or ran past the hop cap.
	StateCycle {
		/// The state at which the loop was detected.
		state: &'static str,
	},
	/// No channel with the given id is tracked for the peer.
	UnknownChannel(ChannelId),
	/// A handler was registered against an event it cannot process.
	UnexpectedEvent {
		/// The state whose handler was invoked.
		state: &'static str,
	},
}

impl fmt::Display for TransitionError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			TransitionError::Persistence(ref e) => write!(f, "Failed to persist channel: {}", e),
			TransitionError::UnknownState(name) => write!(f, "No state named {}", name),
			TransitionError::StateCycle { state } => {
				write!(f, "State transitions looped at {}", state)
			},
			TransitionError::UnknownChannel(ref channel_id) => {
				write!(f, "No such channel {}", channel_id)
			},
			TransitionError::UnexpectedEvent { state } => {
				write!(f, "Handler registered on {} cannot process this event", state)
			},
		}
	}
}

impl std::error::Error for TransitionError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			TransitionError::Persistence(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for TransitionError {
	fn from(e: io::Error) -> Self {
		TransitionError::Persistence(e)
	}
}

/// A problem building a state tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateTreeError {
	/// A state with the same name already exists somewhere in the tree.
	DuplicateState(&'static str),
	/// The parent (or state) referenced is not part of the tree.
	UnknownParent(&'static str),
}

impl fmt::Display for StateTreeError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			StateTreeError::DuplicateState(name) => write!(f, "State {} registered twice", name),
			StateTreeError::UnknownParent(name) => write!(f, "State {} is not in the tree", name),
		}
	}
}

impl std::error::Error for StateTreeError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_opening_error_display() {
		let err = OpeningError::DustLimitTooLow {
			dust_limit_satoshis: 100,
			min_dust_limit_satoshis: 354,
		};
		assert_eq!(
			err.to_string(),
			"dust_limit_satoshis 100 is less than the implementation limit 354"
		);
		assert_eq!(format!("{:?}", OpeningError::PeerNotReady), "Peer is not connected and ready");
	}

	#[test]
	fn test_transition_error_source() {
		use std::error::Error;
		let err: TransitionError = io::Error::new(io::ErrorKind::Other, "disk full").into();
		assert!(err.source().is_some());
		assert!(err.to_string().contains("disk full"));
		assert!(TransitionError::StateCycle { state: "Failing" }.source().is_none());
	}
}
