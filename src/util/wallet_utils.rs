// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The wallet interface used to fund channels, and the coin selection run over it.

use core::future::Future;

use bitcoin::amount::Amount;
use bitcoin::constants::WITNESS_SCALE_FACTOR;
use bitcoin::{OutPoint, ScriptBuf, Transaction, TxOut, WPubkeyHash};

use crate::util::transaction_utils::{fee_for_weight, TXIN_BASE_WEIGHT};

/// The weight of an empty `script_sig` (its length byte).
pub const EMPTY_SCRIPT_SIG_WEIGHT: u64 = 1 /* length */ * WITNESS_SCALE_FACTOR as u64;

/// The witness weight of a P2WPKH spend: item count, signature and compressed public key.
pub const P2WPKH_WITNESS_WEIGHT: u64 = 1 /* num stack items */ +
	1 /* sig length */ +
	73 /* sig including sighash flag */ +
	1 /* pubkey length */ +
	33 /* pubkey */;

/// An unspent transaction output the wallet can contribute to a funding transaction.
#[derive(Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct Utxo {
	/// The unique identifier of the output.
	pub outpoint: OutPoint,
	/// The output to spend.
	pub output: TxOut,
	/// The upper-bound weight consumed by the input's full `script_sig` and `witness`, each
	/// with their lengths included, required to satisfy the output's script.
	pub satisfaction_weight: u64,
}

impl Utxo {
	/// Returns a `Utxo` with the `satisfaction_weight` estimate for a SegWit v0 P2WPKH output.
	pub fn new_v0_p2wpkh(outpoint: OutPoint, value: Amount, pubkey_hash: &WPubkeyHash) -> Self {
		Self {
			outpoint,
			output: TxOut { value, script_pubkey: ScriptBuf::new_p2wpkh(pubkey_hash) },
			satisfaction_weight: EMPTY_SCRIPT_SIG_WEIGHT + P2WPKH_WITNESS_WEIGHT,
		}
	}

	/// The weight this UTXO adds to a transaction when spent.
	pub fn input_weight(&self) -> u64 {
		TXIN_BASE_WEIGHT + self.satisfaction_weight
	}
}

/// A source of on-chain funds used to fund the channels we open.
///
/// The channel core runs its own largest-first selection over
/// [`WalletSource::list_confirmed_utxos`] and hands the assembled transaction back for signing.
pub trait WalletSource {
	/// Returns all UTXOs, with at least 1 confirmation each, that are available to spend.
	fn list_confirmed_utxos<'a>(
		&'a self,
	) -> impl Future<Output = Result<Vec<Utxo>, ()>> + Send + 'a;

	/// Returns a script to use for change above dust resulting from a successful coin selection
	/// attempt.
	fn get_change_script<'a>(&'a self) -> impl Future<Output = Result<ScriptBuf, ()>> + Send + 'a;

	/// Signs and provides the full `script_sig` and `witness` for all inputs within the
	/// transaction known to the wallet (i.e., any provided via
	/// [`WalletSource::list_confirmed_utxos`]). Nothing else about the transaction may change.
	fn sign_transaction<'a>(
		&'a self, tx: Transaction,
	) -> impl Future<Output = Result<Transaction, ()>> + Send + 'a;
}

/// The result of a successful coin selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoinSelection {
	/// The UTXOs to spend, largest first.
	pub confirmed_utxos: Vec<Utxo>,
	/// The total fee for the resulting transaction, assuming it carries a change output.
	pub fee_satoshis: u64,
	/// The value left over for change. Below the dust limit it should be added to the fee.
	pub change_satoshis: u64,
}

/// Picks UTXOs largest-first until `target_value` plus the fee for a transaction of
/// `base_weight` (outputs included) plus the selected inputs is covered.
///
/// On failure returns the amount needed, fee included, and the total the UTXOs could offer.
pub fn select_utxos_largest_first(
	mut utxos: Vec<Utxo>, target_value: u64, feerate_per_kw: u32, base_weight: u64,
) -> Result<CoinSelection, (u64, u64)> {
	utxos.sort_by(|a, b| b.output.value.cmp(&a.output.value).then(a.outpoint.cmp(&b.outpoint)));
	let available: u64 = utxos.iter().map(|utxo| utxo.output.value.to_sat()).sum();

	let mut selected = Vec::new();
	let mut selected_value = 0u64;
	let mut weight = base_weight;
	for utxo in utxos {
		let fee = fee_for_weight(feerate_per_kw, weight);
		if selected_value >= target_value + fee {
			break;
		}
		selected_value += utxo.output.value.to_sat();
		weight += utxo.input_weight();
		selected.push(utxo);
	}

	let fee_satoshis = fee_for_weight(feerate_per_kw, weight);
	if selected.is_empty() || selected_value < target_value + fee_satoshis {
		return Err((target_value + fee_satoshis, available));
	}
	Ok(CoinSelection {
		confirmed_utxos: selected,
		fee_satoshis,
		change_satoshis: selected_value - target_value - fee_satoshis,
	})
}
