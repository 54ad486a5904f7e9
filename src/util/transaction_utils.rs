// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use bitcoin::transaction::TxOut;

use core::cmp::Ordering;

/// Sorts outputs BIP 69 style (value, then script bytes), falling back to `tie_breaker` on the
/// payload attached to each output.
pub(crate) fn sort_outputs<T, C: Fn(&T, &T) -> Ordering>(
	outputs: &mut Vec<(TxOut, T)>, tie_breaker: C,
) {
	outputs.sort_unstable_by(|a, b| {
		a.0.value.cmp(&b.0.value).then_with(|| {
			a.0.script_pubkey[..].cmp(&b.0.script_pubkey[..]).then_with(|| tie_breaker(&a.1, &b.1))
		})
	});
}

/// Weight of a transaction's fixed fields (version, locktime, in/out counts) plus the segwit
/// marker and flag.
pub(crate) const SEGWIT_TX_BASE_WEIGHT: u64 = (4 + 4 + 1 + 1) * 4 + 2;
/// Non-witness weight of a single input (outpoint, empty script_sig, sequence).
pub(crate) const TXIN_BASE_WEIGHT: u64 = (32 + 4 + 1 + 4) * 4;
/// Weight of a P2WSH output.
pub(crate) const P2WSH_TXOUT_WEIGHT: u64 = (8 + 1 + 34) * 4;
/// Weight of a P2WPKH output.
pub(crate) const P2WPKH_TXOUT_WEIGHT: u64 = (8 + 1 + 22) * 4;

/// Fee in satoshis for the given weight at the given rate, rounded down.
pub(crate) fn fee_for_weight(feerate_per_kw: u32, weight: u64) -> u64 {
	feerate_per_kw as u64 * weight / 1000
}
