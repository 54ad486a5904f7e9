// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Various user-configurable channel limits and settings which ChannelManager
//! applies for you.

use crate::ln::channel::{MAX_HTLCS, MAX_LOCAL_BREAKDOWN_TIMEOUT, MIN_CHAN_DUST_LIMIT_SATOSHIS};

/// Configuration we set when applicable.
///
/// Default::default() provides sane defaults.
#[derive(Copy, Clone, Debug)]
pub struct ChannelHandshakeConfig {
	/// Confirmations we will wait for before considering the channel locked in.
	/// Applied only for inbound channels (see [`ChannelHandshakeLimits::max_minimum_depth`] for
	/// the equivalent limit applied to outbound channels).
	///
	/// Default value: 6.
	pub minimum_depth: u32,
	/// Set to the number of blocks we require our counterparty to wait to claim their money (ie
	/// the number of blocks we have to punish our counterparty if they broadcast a revoked
	/// transaction).
	///
	/// Default value: 144, or roughly one day and only applies to outbound channels.
	pub our_to_self_delay: u16,
	/// Set to the smallest value HTLC we will accept to process.
	///
	/// Default value: 1. Any value less than 1 will be treated as 1 instead.
	pub our_htlc_minimum_msat: u64,
	/// The dust limit we announce for our own commitment transactions.
	///
	/// Default value: 546. Values below [`MIN_CHAN_DUST_LIMIT_SATOSHIS`] are raised to it.
	pub our_dust_limit_satoshis: u64,
	/// Sets the percentage of the channel value we will cap the total value of outstanding
	/// inbound HTLCs to.
	///
	/// Default value: 10. Values above 100 are treated as 100, values below 1 as 1.
	pub max_inbound_htlc_value_in_flight_percent_of_channel: u8,
	/// The maximum number of HTLCs we allow our counterparty to have pending towards us.
	///
	/// Default value: 50. Capped at [`MAX_HTLCS`].
	pub our_max_accepted_htlcs: u16,
	/// The proportion of the channel value our counterparty must keep as a reserve, in millionths.
	/// The resulting reserve never drops below 1000 satoshis.
	///
	/// Default value: 10_000 (1%).
	pub their_channel_reserve_proportional_millionths: u32,
	/// Set to announce the channel publicly once it is usable.
	///
	/// Default value: false.
	pub announce_for_forwarding: bool,
}

impl Default for ChannelHandshakeConfig {
	fn default() -> ChannelHandshakeConfig {
		ChannelHandshakeConfig {
			minimum_depth: 6,
			our_to_self_delay: 6 * 24,
			our_htlc_minimum_msat: 1,
			our_dust_limit_satoshis: 546,
			max_inbound_htlc_value_in_flight_percent_of_channel: 10,
			our_max_accepted_htlcs: 50,
			their_channel_reserve_proportional_millionths: 10_000,
			announce_for_forwarding: false,
		}
	}
}

/// Optional channel limits which are applied during channel creation.
///
/// These limits are only applied to our counterparty's limits, not our own.
///
/// Use 0/`<type>::max_value()` as appropriate to skip checking.
///
/// Provides sane defaults for most configurations.
#[derive(Copy, Clone, Debug)]
pub struct ChannelHandshakeLimits {
	/// The smallest dust limit we accept from our counterparty. Outputs below this are
	/// non-standard and would make their commitment transaction unrelayable.
	///
	/// Default value: [`MIN_CHAN_DUST_LIMIT_SATOSHIS`].
	pub min_dust_limit_satoshis: u64,
	/// The largest dust limit we accept from our counterparty.
	///
	/// Default value: 10_920.
	pub max_dust_limit_satoshis: u64,
	/// Minimum allowed satoshis when a channel is funded.
	///
	/// Default value: 1000.
	pub min_funding_satoshis: u64,
	/// Maximum allowed satoshis when a channel is funded. Channels larger than 2^24 satoshis
	/// require `option_support_large_channel`, which we never negotiate.
	///
	/// Default value: 2^24 - 1.
	pub max_funding_satoshis: u64,
	/// The remote node sets a limit on the minimum size of HTLCs we can send to them. This allows
	/// you to limit the maximum minimum-size they can require.
	///
	/// Default value: u64::max_value.
	pub max_htlc_minimum_msat: u64,
	/// The remote node sets a limit on the maximum value of pending HTLCs to them at any given
	/// time to limit their funds exposure to HTLCs. This allows you to set a minimum such value.
	///
	/// Default value: 0.
	pub min_max_htlc_value_in_flight_msat: u64,
	/// The remote node will require we keep a certain amount in direct payment to ourselves at all
	/// time, ensuring that we are able to be punished if we broadcast an old state. This allows to
	/// you limit the amount which we will have to keep to ourselves (and cannot use for HTLCs).
	///
	/// Default value: u64::max_value.
	pub max_channel_reserve_satoshis: u64,
	/// The remote node sets a limit on the maximum number of pending HTLCs to them at any given
	/// time. This allows you to set a minimum such value.
	///
	/// Default value: 0.
	pub min_max_accepted_htlcs: u16,
	/// Before a channel is usable the funding transaction will need to be confirmed by at least a
	/// certain number of blocks, specified by the node which is not the funder (as the funder can
	/// assume they aren't going to double-spend themselves).
	/// This config allows you to set a limit on the maximum amount of time to wait.
	///
	/// Default value: 144, or roughly one day.
	pub max_minimum_depth: u32,
	/// Set to the amount of time we're willing to wait to claim money back to us.
	///
	/// Not checking this value would be a security issue, as our peer would be able to set it to
	/// max relative lock-time (a year) and we would "lose" money as it would be locked for a long time.
	///
	/// Default value: [`MAX_LOCAL_BREAKDOWN_TIMEOUT`] (2016).
	pub their_to_self_delay: u16,
}

impl Default for ChannelHandshakeLimits {
	fn default() -> Self {
		ChannelHandshakeLimits {
			min_dust_limit_satoshis: MIN_CHAN_DUST_LIMIT_SATOSHIS,
			max_dust_limit_satoshis: 2 * 546 * 10,
			min_funding_satoshis: 1000,
			max_funding_satoshis: (1 << 24) - 1,
			max_htlc_minimum_msat: <u64>::max_value(),
			min_max_htlc_value_in_flight_msat: 0,
			max_channel_reserve_satoshis: <u64>::max_value(),
			min_max_accepted_htlcs: 0,
			max_minimum_depth: 144,
			their_to_self_delay: MAX_LOCAL_BREAKDOWN_TIMEOUT,
		}
	}
}

/// Top-level config which holds ChannelHandshakeLimits and ChannelHandshakeConfig.
///
/// Default::default() provides sane defaults for most configurations
/// (but currently with 0 relay fees!)
#[derive(Copy, Clone, Debug, Default)]
pub struct UserConfig {
	/// Channel handshake config that we propose to our counterparty.
	pub channel_handshake_config: ChannelHandshakeConfig,
	/// Limits applied to our counterparty's proposed channel handshake config settings.
	pub channel_handshake_limits: ChannelHandshakeLimits,
}

impl ChannelHandshakeConfig {
	/// The dust limit we actually use, never below the network floor.
	pub(crate) fn effective_dust_limit_satoshis(&self) -> u64 {
		core::cmp::max(self.our_dust_limit_satoshis, MIN_CHAN_DUST_LIMIT_SATOSHIS)
	}

	/// The HTLC count we actually announce.
	pub(crate) fn effective_max_accepted_htlcs(&self) -> u16 {
		core::cmp::min(core::cmp::max(self.our_max_accepted_htlcs, 1), MAX_HTLCS)
	}

	/// The in-flight cap, in millisatoshis, for a channel of the given value.
	pub(crate) fn max_htlc_value_in_flight_msat(&self, channel_value_satoshis: u64) -> u64 {
		let percent =
			self.max_inbound_htlc_value_in_flight_percent_of_channel.clamp(1, 100) as u64;
		channel_value_satoshis * 10 * percent
	}

	/// The reserve we require of our counterparty for a channel of the given value.
	pub(crate) fn their_channel_reserve_satoshis(&self, channel_value_satoshis: u64) -> u64 {
		let calculated = channel_value_satoshis
			* self.their_channel_reserve_proportional_millionths as u64
			/ 1_000_000;
		core::cmp::min(channel_value_satoshis, core::cmp::max(calculated, 1000))
	}
}
