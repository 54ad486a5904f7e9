// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Construction of (non-anchor) commitment transactions and the second-stage HTLC transactions
//! which spend from them.

use bitcoin::absolute::LockTime;
use bitcoin::hash_types::Txid;
use bitcoin::script::ScriptBuf;
use bitcoin::secp256k1::PublicKey;
use bitcoin::transaction::{self, OutPoint as BitcoinOutPoint, Transaction, TxIn, TxOut};
use bitcoin::{Amount, Sequence, Witness};

use crate::chain::transaction::OutPoint;
use crate::ln::chan_utils::{
	get_htlc_redeemscript, get_revokeable_redeemscript, get_to_countersignatory_script,
	TxCreationKeys, COMMITMENT_TX_BASE_WEIGHT, COMMITMENT_TX_WEIGHT_PER_HTLC,
	HTLC_SUCCESS_TX_WEIGHT, HTLC_TIMEOUT_TX_WEIGHT,
};
use crate::ln::commitment_number::CommitmentNumber;
use crate::ln::types::PaymentHash;
use crate::util::transaction_utils::{fee_for_weight, sort_outputs};

use core::cmp;

/// Which way an HTLC flows, as seen from the holder (broadcaster) of a commitment transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HtlcDirection {
	/// The holder offered the HTLC and reclaims it after expiry with an HTLC-Timeout transaction.
	Offered,
	/// The holder received the HTLC and claims it with the preimage through an HTLC-Success
	/// transaction.
	Accepted,
}

/// An HTLC as it is placed in one commitment transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Htlc {
	/// The value, in msat, of the HTLC. The value as it appears in the commitment transaction is
	/// this divided by 1000.
	pub amount_msat: u64,
	/// The hash of the preimage which unlocks this HTLC.
	pub payment_hash: PaymentHash,
	/// The CLTV lock-time at which this HTLC expires.
	pub cltv_expiry: u32,
	/// The direction relative to the commitment's holder.
	pub direction: HtlcDirection,
}

impl Htlc {
	/// The same HTLC as it appears on the counterparty's commitment transaction.
	pub fn mirrored(&self) -> Htlc {
		let direction = match self.direction {
			HtlcDirection::Offered => HtlcDirection::Accepted,
			HtlcDirection::Accepted => HtlcDirection::Offered,
		};
		Htlc { direction, ..self.clone() }
	}

	/// Whether the holder offered this HTLC.
	pub fn offered(&self) -> bool {
		self.direction == HtlcDirection::Offered
	}

	/// Weight of the second-stage transaction that claims this HTLC for the holder.
	pub fn claim_tx_weight(&self) -> u64 {
		match self.direction {
			HtlcDirection::Offered => HTLC_TIMEOUT_TX_WEIGHT,
			HtlcDirection::Accepted => HTLC_SUCCESS_TX_WEIGHT,
		}
	}

	/// Whether this HTLC, after paying for its claiming transaction, would be below the dust
	/// limit and so must be left out of the commitment transaction.
	pub fn is_dust(&self, feerate_per_kw: u32, dust_limit_satoshis: u64) -> bool {
		let claim_fee = fee_for_weight(feerate_per_kw, self.claim_tx_weight());
		self.amount_msat / 1000 < dust_limit_satoshis + claim_fee
	}
}

/// Information about an HTLC as it appears in a commitment transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HtlcInCommitment {
	/// The HTLC itself.
	pub htlc: Htlc,
	/// The position within the commitment transactions' outputs. This is None if the value is
	/// below the dust limit (in which case no output appears in the commitment transaction and the
	/// value is spent to additional transaction fees).
	pub transaction_output_index: Option<u32>,
}

/// Everything needed to build one party's commitment transaction.
///
/// "Broadcaster" is the party holding (and able to broadcast) the transaction, "countersignatory"
/// the other one.
pub struct CommitmentParameters<'a> {
	/// The funding output the commitment spends.
	pub funding_outpoint: OutPoint,
	/// The commitment's number, obscured into the transaction's lock-time and sequence.
	pub commitment_number: CommitmentNumber,
	/// The payment basepoint of the party that opened the channel.
	pub open_payment_basepoint: &'a PublicKey,
	/// The payment basepoint of the party that accepted the channel.
	pub accept_payment_basepoint: &'a PublicKey,
	/// Whether the broadcaster funded the channel and so pays the commitment fee.
	pub broadcaster_is_funder: bool,
	/// The broadcaster's balance, excluding HTLCs.
	pub to_broadcaster_value_msat: u64,
	/// The countersignatory's balance, excluding HTLCs.
	pub to_countersignatory_value_msat: u64,
	/// The commitment fee rate.
	pub feerate_per_kw: u32,
	/// The broadcaster's dust limit.
	pub dust_limit_satoshis: u64,
	/// The relative delay imposed on the broadcaster's own outputs.
	pub contest_delay: u16,
	/// The per-commitment keys of this transaction.
	pub keys: &'a TxCreationKeys,
	/// The countersignatory's static payment point, receiving its balance.
	pub countersignatory_payment_point: &'a PublicKey,
	/// The HTLCs, with directions relative to the broadcaster.
	pub htlcs: &'a [Htlc],
}

/// The fee, in satoshis, of a commitment transaction with the given number of non-dust HTLCs.
pub fn commit_tx_fee_sat(feerate_per_kw: u32, num_htlcs: usize) -> u64 {
	fee_for_weight(
		feerate_per_kw,
		COMMITMENT_TX_BASE_WEIGHT + num_htlcs as u64 * COMMITMENT_TX_WEIGHT_PER_HTLC,
	)
}

/// An unsigned commitment transaction together with what went into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentTransaction {
	commitment_number: CommitmentNumber,
	to_broadcaster_value_sat: u64,
	to_countersignatory_value_sat: u64,
	fee_sat: u64,
	feerate_per_kw: u32,
	contest_delay: u16,
	htlcs: Vec<HtlcInCommitment>,
	keys: TxCreationKeys,
	transaction: Transaction,
	txid: Txid,
}

impl CommitmentTransaction {
	/// Builds the commitment transaction described by `params`.
	///
	/// HTLCs which are dust once their claiming fee is accounted for are trimmed (their value
	/// goes to fees). The base fee is charged to the funder's balance only, never below zero, and
	/// balances that end up below the dust limit get no output. Outputs are ordered by value, then
	/// script, then descending HTLC expiry.
	pub fn build(params: &CommitmentParameters) -> CommitmentTransaction {
		let mut htlcs: Vec<HtlcInCommitment> = params
			.htlcs
			.iter()
			.map(|htlc| HtlcInCommitment { htlc: htlc.clone(), transaction_output_index: None })
			.collect();
		let non_dust: Vec<usize> = htlcs
			.iter()
			.enumerate()
			.filter(|(_, h)| !h.htlc.is_dust(params.feerate_per_kw, params.dust_limit_satoshis))
			.map(|(idx, _)| idx)
			.collect();

		let fee_sat = commit_tx_fee_sat(params.feerate_per_kw, non_dust.len());
		let mut to_broadcaster_value_sat = params.to_broadcaster_value_msat / 1000;
		let mut to_countersignatory_value_sat = params.to_countersignatory_value_msat / 1000;
		if params.broadcaster_is_funder {
			to_broadcaster_value_sat = to_broadcaster_value_sat.saturating_sub(fee_sat);
		} else {
			to_countersignatory_value_sat = to_countersignatory_value_sat.saturating_sub(fee_sat);
		}

		let mut txouts: Vec<(TxOut, Option<usize>)> = Vec::with_capacity(non_dust.len() + 2);

		if to_countersignatory_value_sat >= params.dust_limit_satoshis {
			txouts.push((
				TxOut {
					script_pubkey: get_to_countersignatory_script(
						params.countersignatory_payment_point,
					),
					value: Amount::from_sat(to_countersignatory_value_sat),
				},
				None,
			));
		}

		if to_broadcaster_value_sat >= params.dust_limit_satoshis {
			let redeem_script = get_revokeable_redeemscript(
				&params.keys.revocation_key,
				params.contest_delay,
				&params.keys.broadcaster_delayed_payment_key,
			);
			txouts.push((
				TxOut {
					script_pubkey: redeem_script.to_p2wsh(),
					value: Amount::from_sat(to_broadcaster_value_sat),
				},
				None,
			));
		}

		for &idx in non_dust.iter() {
			let htlc = &htlcs[idx].htlc;
			let script = get_htlc_redeemscript(
				htlc.offered(),
				&htlc.payment_hash,
				htlc.cltv_expiry,
				params.keys,
			);
			txouts.push((
				TxOut {
					script_pubkey: script.to_p2wsh(),
					value: Amount::from_sat(htlc.amount_msat / 1000),
				},
				Some(idx),
			));
		}

		// Sort output in BIP-69 order (amount, scriptPubkey). Outputs sharing both are HTLCs with
		// the same payment hash and direction, the one expiring last goes first.
		let htlc_view: &Vec<HtlcInCommitment> = &htlcs;
		sort_outputs(&mut txouts, |a, b| match (a, b) {
			(Some(a_idx), Some(b_idx)) => {
				let (a_htlc, b_htlc) = (&htlc_view[*a_idx].htlc, &htlc_view[*b_idx].htlc);
				b_htlc.cltv_expiry.cmp(&a_htlc.cltv_expiry).then(a_idx.cmp(b_idx))
			},
			_ => cmp::Ordering::Equal,
		});

		let mut outputs = Vec::with_capacity(txouts.len());
		let mut assigned = Vec::new();
		for (output_index, (txout, htlc_idx)) in txouts.into_iter().enumerate() {
			if let Some(idx) = htlc_idx {
				assigned.push((idx, output_index as u32));
			}
			outputs.push(txout);
		}
		for (idx, output_index) in assigned {
			htlcs[idx].transaction_output_index = Some(output_index);
		}

		let obscured = params
			.commitment_number
			.obscure(params.open_payment_basepoint, params.accept_payment_basepoint);
		let transaction = Transaction {
			version: transaction::Version::TWO,
			lock_time: LockTime::from_consensus(obscured.lock_time()),
			input: vec![TxIn {
				previous_output: params.funding_outpoint.into_bitcoin_outpoint(),
				script_sig: ScriptBuf::new(),
				sequence: Sequence(obscured.sequence()),
				witness: Witness::new(),
			}],
			output: outputs,
		};
		let txid = transaction.compute_txid();

		CommitmentTransaction {
			commitment_number: params.commitment_number,
			to_broadcaster_value_sat,
			to_countersignatory_value_sat,
			fee_sat,
			feerate_per_kw: params.feerate_per_kw,
			contest_delay: params.contest_delay,
			htlcs,
			keys: params.keys.clone(),
			transaction,
			txid,
		}
	}

	/// The commitment number of this transaction.
	pub fn commitment_number(&self) -> CommitmentNumber {
		self.commitment_number
	}

	/// The broadcaster's balance after fees, in satoshis. It has no output if below dust.
	pub fn to_broadcaster_value_sat(&self) -> u64 {
		self.to_broadcaster_value_sat
	}

	/// The countersignatory's balance after fees, in satoshis. It has no output if below dust.
	pub fn to_countersignatory_value_sat(&self) -> u64 {
		self.to_countersignatory_value_sat
	}

	/// The base fee charged to the funder, in satoshis. Trimmed HTLC value comes on top of it.
	pub fn fee_sat(&self) -> u64 {
		self.fee_sat
	}

	/// The fee rate this transaction was built at.
	pub fn feerate_per_kw(&self) -> u32 {
		self.feerate_per_kw
	}

	/// All HTLCs given to the builder, with their output index if they were not trimmed.
	pub fn htlcs(&self) -> &[HtlcInCommitment] {
		&self.htlcs
	}

	/// The per-commitment keys the transaction was built with.
	pub fn keys(&self) -> &TxCreationKeys {
		&self.keys
	}

	/// The unsigned transaction.
	pub fn transaction(&self) -> &Transaction {
		&self.transaction
	}

	/// The transaction's txid.
	pub fn txid(&self) -> Txid {
		self.txid
	}

	/// Builds the second-stage transaction claiming the given HTLC for the broadcaster, or `None`
	/// if the HTLC was trimmed.
	pub fn build_htlc_transaction(&self, htlc: &HtlcInCommitment) -> Option<Transaction> {
		let output_index = htlc.transaction_output_index?;
		let build = match htlc.htlc.direction {
			HtlcDirection::Offered => build_htlc_timeout_transaction,
			HtlcDirection::Accepted => build_htlc_success_transaction,
		};
		Some(build(
			&self.txid,
			output_index,
			&htlc.htlc,
			self.feerate_per_kw,
			self.contest_delay,
			&self.keys.broadcaster_delayed_payment_key,
			&self.keys.revocation_key,
		))
	}
}

fn build_htlc_transaction(
	commitment_txid: &Txid, output_index: u32, htlc: &Htlc, weight: u64, lock_time: u32,
	feerate_per_kw: u32, contest_delay: u16, broadcaster_delayed_payment_key: &PublicKey,
	revocation_key: &PublicKey,
) -> Transaction {
	let input = TxIn {
		previous_output: BitcoinOutPoint { txid: *commitment_txid, vout: output_index },
		script_sig: ScriptBuf::new(),
		sequence: Sequence::ZERO,
		witness: Witness::new(),
	};
	let value_sat =
		(htlc.amount_msat / 1000).saturating_sub(fee_for_weight(feerate_per_kw, weight));
	let output = TxOut {
		script_pubkey: get_revokeable_redeemscript(
			revocation_key,
			contest_delay,
			broadcaster_delayed_payment_key,
		)
		.to_p2wsh(),
		value: Amount::from_sat(value_sat),
	};
	Transaction {
		version: transaction::Version::TWO,
		lock_time: LockTime::from_consensus(lock_time),
		input: vec![input],
		output: vec![output],
	}
}

/// Builds an unsigned HTLC-Timeout transaction, spending an offered HTLC output of the
/// broadcaster's commitment once `cltv_expiry` has passed.
pub fn build_htlc_timeout_transaction(
	commitment_txid: &Txid, output_index: u32, htlc: &Htlc, feerate_per_kw: u32,
	contest_delay: u16, broadcaster_delayed_payment_key: &PublicKey, revocation_key: &PublicKey,
) -> Transaction {
	build_htlc_transaction(
		commitment_txid,
		output_index,
		htlc,
		HTLC_TIMEOUT_TX_WEIGHT,
		htlc.cltv_expiry,
		feerate_per_kw,
		contest_delay,
		broadcaster_delayed_payment_key,
		revocation_key,
	)
}

/// Builds an unsigned HTLC-Success transaction, spending a received HTLC output of the
/// broadcaster's commitment with the payment preimage.
pub fn build_htlc_success_transaction(
	commitment_txid: &Txid, output_index: u32, htlc: &Htlc, feerate_per_kw: u32,
	contest_delay: u16, broadcaster_delayed_payment_key: &PublicKey, revocation_key: &PublicKey,
) -> Transaction {
	build_htlc_transaction(
		commitment_txid,
		output_index,
		htlc,
		HTLC_SUCCESS_TX_WEIGHT,
		0,
		feerate_per_kw,
		contest_delay,
		broadcaster_delayed_payment_key,
		revocation_key,
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ln::chan_utils::get_htlc_redeemscript;
	use bitcoin::hex::{DisplayHex, FromHex};
	use bitcoin::secp256k1::PublicKey;
	use core::str::FromStr;

	fn pubkey(s: &str) -> PublicKey {
		PublicKey::from_slice(&<Vec<u8>>::from_hex(s).unwrap()).unwrap()
	}

	struct Fixture {
		keys: TxCreationKeys,
		local_payment_basepoint: PublicKey,
		remote_payment_basepoint: PublicKey,
		remotepubkey: PublicKey,
		funding_outpoint: OutPoint,
	}

	// Key material from BOLT 3 Appendix C.
	fn bolt3_fixture() -> Fixture {
		Fixture {
			keys: TxCreationKeys {
				per_commitment_point: pubkey(
					"025f7117a78150fe2ef97db7cfc83bd57b2e2c0d0dd25eaf467a4a1c2a45ce1486",
				),
				revocation_key: pubkey(
					"0212a140cd0c6539d07cd08dfe09984dec3251ea808b892efeac3ede9402bf2b19",
				),
				broadcaster_htlc_key: pubkey(
					"030d417a46946384f88d5f3337267c5e579765875dc4daca813e21734b140639e7",
				),
				countersignatory_htlc_key: pubkey(
					"0394854aa6eab5b2a8122cc726e9dded053a2184d88256816826d6231c068d4a5b",
				),
				broadcaster_delayed_payment_key: pubkey(
					"03fd5960528dc152014952efdb702a88f71e3c1653b2314431701ec77e57fde83c",
				),
			},
			local_payment_basepoint: pubkey(
				"034f355bdcb7cc0af728ef3cceb9615d90684bb5b2ca5f859ab0f0b704075871aa",
			),
			remote_payment_basepoint: pubkey(
				"032c0b7cf95324a07d05398b240174dc0c2be444d96b159aa6c7f7b1e668680991",
			),
			remotepubkey: pubkey(
				"0394854aa6eab5b2a8122cc726e9dded053a2184d88256816826d6231c068d4a5b",
			),
			funding_outpoint: OutPoint {
				txid: Txid::from_str(
					"8984484a580b825b9972d7adb15050b3ab624ccd731946b3eeddb92f4e7ef6be",
				)
				.unwrap(),
				index: 0,
			},
		}
	}

	fn params<'a>(
		fixture: &'a Fixture, htlcs: &'a [Htlc], feerate_per_kw: u32, to_local_msat: u64,
		to_remote_msat: u64, broadcaster_is_funder: bool,
	) -> CommitmentParameters<'a> {
		CommitmentParameters {
			funding_outpoint: fixture.funding_outpoint,
			commitment_number: CommitmentNumber::new(42).unwrap(),
			open_payment_basepoint: &fixture.local_payment_basepoint,
			accept_payment_basepoint: &fixture.remote_payment_basepoint,
			broadcaster_is_funder,
			to_broadcaster_value_msat: to_local_msat,
			to_countersignatory_value_msat: to_remote_msat,
			feerate_per_kw,
			dust_limit_satoshis: 546,
			contest_delay: 144,
			keys: &fixture.keys,
			countersignatory_payment_point: &fixture.remotepubkey,
			htlcs,
		}
	}

	#[test]
	fn test_bolt3_simple_commitment_outputs() {
		// "simple commitment tx with no HTLCs"
		let fixture = bolt3_fixture();
		let tx = CommitmentTransaction::build(&params(
			&fixture,
			&[],
			15000,
			7000000000,
			3000000000,
			true,
		));
		let btc_tx = tx.transaction();
		assert_eq!(tx.fee_sat(), 10860);
		assert_eq!(btc_tx.output.len(), 2);
		assert_eq!(btc_tx.output[0].value.to_sat(), 3000000);
		assert_eq!(
			btc_tx.output[0].script_pubkey.as_bytes().to_lower_hex_string(),
			"0014cc1b07838e387deacd0e5232e1e8b49f4c29e484"
		);
		assert_eq!(btc_tx.output[1].value.to_sat(), 6989140);
		assert_eq!(
			btc_tx.output[1].script_pubkey.as_bytes().to_lower_hex_string(),
			"00204adb4e2f00643db396dd120d4e7dc17625f5f2c11a40d857accc862d6b7dd80e"
		);
		assert_eq!(btc_tx.lock_time.to_consensus_u32(), 542251326);
		assert_eq!(btc_tx.input.len(), 1);
		assert_eq!(btc_tx.input[0].sequence.0, 2150346808);
		assert_eq!(btc_tx.input[0].previous_output, fixture.funding_outpoint.into_bitcoin_outpoint());
		assert_eq!(
			CommitmentNumber::reveal(
				btc_tx.lock_time.to_consensus_u32(),
				btc_tx.input[0].sequence.0,
				&fixture.local_payment_basepoint,
				&fixture.remote_payment_basepoint,
			),
			tx.commitment_number()
		);
	}

	#[test]
	fn test_fee_charged_to_funder_only() {
		let fixture = bolt3_fixture();
		let funder = CommitmentTransaction::build(&params(
			&fixture,
			&[],
			15000,
			7000000000,
			3000000000,
			true,
		));
		assert_eq!(funder.to_broadcaster_value_sat(), 7000000 - 10860);
		assert_eq!(funder.to_countersignatory_value_sat(), 3000000);

		let fundee = CommitmentTransaction::build(&params(
			&fixture,
			&[],
			15000,
			7000000000,
			3000000000,
			false,
		));
		assert_eq!(fundee.to_broadcaster_value_sat(), 7000000);
		assert_eq!(fundee.to_countersignatory_value_sat(), 3000000 - 10860);
	}

	#[test]
	fn test_fee_clamped_and_dust_balances_dropped() {
		let fixture = bolt3_fixture();
		// The funder's 5000 sat cannot cover a 10860 sat fee.
		let tx = CommitmentTransaction::build(&params(
			&fixture,
			&[],
			15000,
			5_000_000,
			3_000_000_000,
			true,
		));
		assert_eq!(tx.to_broadcaster_value_sat(), 0);
		assert_eq!(tx.transaction().output.len(), 1);
		assert!(tx.transaction().output[0].script_pubkey.is_p2wpkh());

		// A 500 sat remote balance is below the 546 sat dust limit.
		let tx = CommitmentTransaction::build(&params(
			&fixture,
			&[],
			253,
			1_000_000_000,
			500_000,
			true,
		));
		assert_eq!(tx.transaction().output.len(), 1);
		assert!(tx.transaction().output[0].script_pubkey.is_p2wsh());
	}

	#[test]
	fn test_htlc_trimming_uses_claim_weight() {
		let fixture = bolt3_fixture();
		let offered = Htlc {
			amount_msat: 1_200_000,
			payment_hash: PaymentHash([1; 32]),
			cltv_expiry: 500,
			direction: HtlcDirection::Offered,
		};
		let accepted = Htlc {
			amount_msat: 1_200_000,
			payment_hash: PaymentHash([2; 32]),
			cltv_expiry: 501,
			direction: HtlcDirection::Accepted,
		};
		// At 1000 sat/kW: an offered HTLC needs 546 + 663 = 1209 sat, an accepted one
		// 546 + 703 = 1249 sat. 1200 sat is dust either way.
		assert!(offered.is_dust(1000, 546));
		assert!(accepted.is_dust(1000, 546));
		// At 900 sat/kW: 546 + 596 = 1142 vs 546 + 632 = 1178, both kept.
		assert!(!offered.is_dust(900, 546));
		assert!(!accepted.is_dust(900, 546));
		// At 950 sat/kW: 546 + 629 = 1175 keeps the offered one, 546 + 667 = 1213 trims the
		// accepted one.
		assert!(!offered.is_dust(950, 546));
		assert!(accepted.is_dust(950, 546));

		let htlcs = [offered.clone(), accepted.clone()];
		let tx = CommitmentTransaction::build(&params(
			&fixture,
			&htlcs,
			950,
			7_000_000_000,
			3_000_000_000,
			true,
		));
		assert_eq!(tx.fee_sat(), commit_tx_fee_sat(950, 1));
		assert_eq!(tx.transaction().output.len(), 3);
		assert!(tx.htlcs()[0].transaction_output_index.is_some());
		assert!(tx.htlcs()[1].transaction_output_index.is_none());

		// Mirrored, the trimmed HTLC is the other one.
		let mirrored: Vec<Htlc> = htlcs.iter().map(|h| h.mirrored()).collect();
		let tx = CommitmentTransaction::build(&params(
			&fixture,
			&mirrored,
			950,
			3_000_000_000,
			7_000_000_000,
			false,
		));
		assert!(tx.htlcs()[0].transaction_output_index.is_none());
		assert!(tx.htlcs()[1].transaction_output_index.is_some());
	}

	#[test]
	fn test_equal_outputs_ordered_by_descending_cltv() {
		let fixture = bolt3_fixture();
		let payment_hash = PaymentHash([3; 32]);
		let early = Htlc {
			amount_msat: 5_000_000,
			payment_hash,
			cltv_expiry: 500_000,
			direction: HtlcDirection::Offered,
		};
		let late = Htlc { cltv_expiry: 500_144, ..early.clone() };
		let htlcs = [early.clone(), late.clone()];
		let tx = CommitmentTransaction::build(&params(
			&fixture,
			&htlcs,
			253,
			7_000_000_000,
			3_000_000_000,
			true,
		));

		let early_idx = tx.htlcs()[0].transaction_output_index.unwrap();
		let late_idx = tx.htlcs()[1].transaction_output_index.unwrap();
		assert!(late_idx < early_idx);
		assert_eq!(late_idx + 1, early_idx);
		let outputs = &tx.transaction().output;
		assert_eq!(outputs[late_idx as usize], outputs[early_idx as usize]);
		assert_eq!(
			outputs[late_idx as usize].script_pubkey,
			get_htlc_redeemscript(true, &payment_hash, 500_144, tx.keys()).to_p2wsh()
		);

		// Input order must not matter.
		let reversed = [late, early];
		let tx2 = CommitmentTransaction::build(&params(
			&fixture,
			&reversed,
			253,
			7_000_000_000,
			3_000_000_000,
			true,
		));
		assert_eq!(tx2.txid(), tx.txid());
		assert_eq!(tx2.htlcs()[0].transaction_output_index, Some(late_idx));
	}

	#[test]
	fn test_outputs_sorted_by_value_then_script() {
		let fixture = bolt3_fixture();
		let htlcs = [
			Htlc {
				amount_msat: 2_000_000,
				payment_hash: PaymentHash([4; 32]),
				cltv_expiry: 600,
				direction: HtlcDirection::Accepted,
			},
			Htlc {
				amount_msat: 3_000_000,
				payment_hash: PaymentHash([5; 32]),
				cltv_expiry: 601,
				direction: HtlcDirection::Offered,
			},
		];
		let tx = CommitmentTransaction::build(&params(
			&fixture,
			&htlcs,
			253,
			7_000_000_000,
			3_000_000_000,
			true,
		));
		let values: Vec<u64> = tx.transaction().output.iter().map(|o| o.value.to_sat()).collect();
		let mut sorted = values.clone();
		sorted.sort();
		assert_eq!(values, sorted);
		assert_eq!(tx.htlcs()[0].transaction_output_index, Some(0));
		assert_eq!(tx.htlcs()[1].transaction_output_index, Some(1));
	}

	#[test]
	fn test_htlc_second_stage_transactions() {
		let fixture = bolt3_fixture();
		let htlcs = [
			Htlc {
				amount_msat: 2_000_000,
				payment_hash: PaymentHash([6; 32]),
				cltv_expiry: 502,
				direction: HtlcDirection::Offered,
			},
			Htlc {
				amount_msat: 3_000_000,
				payment_hash: PaymentHash([7; 32]),
				cltv_expiry: 503,
				direction: HtlcDirection::Accepted,
			},
		];
		let tx = CommitmentTransaction::build(&params(
			&fixture,
			&htlcs,
			1000,
			7_000_000_000,
			3_000_000_000,
			true,
		));

		let timeout = tx.build_htlc_transaction(&tx.htlcs()[0]).unwrap();
		assert_eq!(timeout.lock_time.to_consensus_u32(), 502);
		assert_eq!(timeout.output[0].value.to_sat(), 2000 - 663);
		assert_eq!(timeout.input[0].previous_output.txid, tx.txid());
		assert_eq!(
			timeout.input[0].previous_output.vout,
			tx.htlcs()[0].transaction_output_index.unwrap()
		);
		assert_eq!(timeout.input[0].sequence, Sequence::ZERO);

		let success = tx.build_htlc_transaction(&tx.htlcs()[1]).unwrap();
		assert_eq!(success.lock_time.to_consensus_u32(), 0);
		assert_eq!(success.output[0].value.to_sat(), 3000 - 703);

		// Both pay to the broadcaster's delayed, revocable output.
		assert_eq!(timeout.output[0].script_pubkey, success.output[0].script_pubkey);
		assert_eq!(
			success.output[0].script_pubkey,
			get_revokeable_redeemscript(
				&fixture.keys.revocation_key,
				144,
				&fixture.keys.broadcaster_delayed_payment_key
			)
			.to_p2wsh()
		);
	}

	#[test]
	fn test_trimmed_htlc_has_no_second_stage() {
		let fixture = bolt3_fixture();
		let htlcs = [Htlc {
			amount_msat: 600_000,
			payment_hash: PaymentHash([8; 32]),
			cltv_expiry: 10,
			direction: HtlcDirection::Offered,
		}];
		let tx = CommitmentTransaction::build(&params(
			&fixture,
			&htlcs,
			253,
			7_000_000_000,
			3_000_000_000,
			true,
		));
		assert!(tx.build_htlc_transaction(&tx.htlcs()[0]).is_none());
	}

	#[test]
	fn test_mirrored_direction() {
		let htlc = Htlc {
			amount_msat: 1,
			payment_hash: PaymentHash([0; 32]),
			cltv_expiry: 1,
			direction: HtlcDirection::Offered,
		};
		assert_eq!(htlc.mirrored().direction, HtlcDirection::Accepted);
		assert_eq!(htlc.mirrored().mirrored(), htlc);
		assert_eq!(htlc.claim_tx_weight(), 663);
		assert_eq!(htlc.mirrored().claim_tx_weight(), 703);
	}
}
