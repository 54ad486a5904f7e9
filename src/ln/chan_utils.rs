// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Various utilities for building scripts and deriving keys related to channels. These are
//! largely of interest for those implementing the [`ChannelLogic`] signing hooks by hand.
//!
//! [`ChannelLogic`]: crate::ln::channel_logic::ChannelLogic

use bitcoin::hashes::ripemd160::Hash as Ripemd160;
use bitcoin::hashes::sha256::Hash as Sha256;
use bitcoin::hashes::{Hash, HashEngine};
use bitcoin::opcodes;
use bitcoin::script::{Builder, ScriptBuf};
use bitcoin::{PubkeyHash, WPubkeyHash};

use bitcoin::secp256k1::{self, PublicKey, Scalar, Secp256k1, SecretKey};

use crate::ln::types::PaymentHash;

/// The weight of an HTLC-Timeout transaction, as spent from an offered HTLC output.
pub const HTLC_TIMEOUT_TX_WEIGHT: u64 = 663;
/// The weight of an HTLC-Success transaction, as spent from a received HTLC output.
pub const HTLC_SUCCESS_TX_WEIGHT: u64 = 703;
/// The weight of a commitment transaction without any HTLC outputs.
pub const COMMITMENT_TX_BASE_WEIGHT: u64 = 724;
/// The weight each non-dust HTLC output adds to a commitment transaction.
pub const COMMITMENT_TX_WEIGHT_PER_HTLC: u64 = 172;

/// The number of bits of a commitment index, and so the depth of the secret chain.
pub(crate) const COMMITMENT_INDEX_BITS: u8 = 48;

// Various functions for key derivation and transaction creation for use within channels.

/// Walks the per-commitment secret chain from `secret` (which sits at a node whose lowest `bits`
/// bits are still free) down to `idx`, flipping and hashing for each set bit from high to low.
#[inline]
pub(crate) fn derive_secret(secret: [u8; 32], bits: u8, idx: u64) -> [u8; 32] {
	let mut res: [u8; 32] = secret;
	for i in 0..bits {
		let bitpos = bits - 1 - i;
		if idx & (1 << bitpos) == (1 << bitpos) {
			res[(bitpos / 8) as usize] ^= 1 << (bitpos & 7);
			res = Sha256::hash(&res).to_byte_array();
		}
	}
	res
}

/// Build the commitment secret from the seed and the commitment number
pub fn build_commitment_secret(commitment_seed: &[u8; 32], idx: u64) -> [u8; 32] {
	derive_secret(*commitment_seed, COMMITMENT_INDEX_BITS, idx)
}

/// Implements the per-commitment secret storage scheme from
/// [BOLT 3](https://github.com/lightning/bolts/blob/dcbf8583976df087c79c3ce0b535311212e6812d/03-transactions.md#efficient-per-commitment-secret-storage).
///
/// Allows us to keep track of all of the revocation secrets of our counterparty in just 50*32 bytes
/// or so.
#[derive(Clone, PartialEq, Eq)]
pub struct CounterpartyCommitmentSecrets {
	old_secrets: [([u8; 32], u64); 49],
}

impl CounterpartyCommitmentSecrets {
	/// Creates a new empty `CounterpartyCommitmentSecrets` structure.
	pub fn new() -> Self {
		Self { old_secrets: [([0; 32], 1 << 48); 49] }
	}

	#[inline]
	fn place_secret(idx: u64) -> u8 {
		for i in 0..48 {
			if idx & (1 << i) == (1 << i) {
				return i;
			}
		}
		48
	}

	/// Returns the minimum index of all stored secrets. Note that indexes start
	/// at 1 << 48 and get decremented by one for each new secret.
	pub fn get_min_seen_secret(&self) -> u64 {
		self.old_secrets.iter().map(|&(_, idx)| idx).min().unwrap_or(1 << 48)
	}

	/// Inserts the `secret` at `idx`. Returns `Ok(())` if the secret
	/// was generated in accordance with BOLT 3 and is consistent with previous secrets.
	pub fn provide_secret(&mut self, idx: u64, secret: [u8; 32]) -> Result<(), ()> {
		let pos = Self::place_secret(idx);
		for i in 0..pos {
			let (old_secret, old_idx) = self.old_secrets[i as usize];
			if derive_secret(secret, pos, old_idx) != old_secret {
				return Err(());
			}
		}
		if self.get_min_seen_secret() <= idx {
			return Ok(());
		}
		self.old_secrets[pos as usize] = (secret, idx);
		Ok(())
	}

	/// Returns the secret at `idx`.
	/// Returns `None` if `idx` is < [`CounterpartyCommitmentSecrets::get_min_seen_secret`].
	pub fn get_secret(&self, idx: u64) -> Option<[u8; 32]> {
		for i in 0..self.old_secrets.len() {
			if (idx & (!((1 << i) - 1))) == self.old_secrets[i].1 {
				return Some(derive_secret(self.old_secrets[i].0, i as u8, idx));
			}
		}
		None
	}
}

/// Derives a per-commitment-transaction private key (eg an htlc key or delayed_payment key)
/// from the base secret and the per_commitment_point.
pub fn derive_private_key<T: secp256k1::Signing>(
	secp_ctx: &Secp256k1<T>, per_commitment_point: &PublicKey, base_secret: &SecretKey,
) -> SecretKey {
	let mut sha = Sha256::engine();
	sha.input(&per_commitment_point.serialize());
	sha.input(&PublicKey::from_secret_key(&secp_ctx, &base_secret).serialize());
	let res = Sha256::from_engine(sha).to_byte_array();

	base_secret.clone().add_tweak(&Scalar::from_be_bytes(res).unwrap())
		.expect("Addition only fails if the tweak is the inverse of the key. This is not possible when the tweak contains the hash of the key.")
}

/// Derives a per-commitment-transaction public key (eg an htlc key or a delayed_payment key)
/// from the base point and the per_commitment_key. This is the public equivalent of
/// derive_private_key - using only public keys to derive a public key instead of private keys.
pub fn derive_public_key<T: secp256k1::Signing>(
	secp_ctx: &Secp256k1<T>, per_commitment_point: &PublicKey, base_point: &PublicKey,
) -> PublicKey {
	let mut sha = Sha256::engine();
	sha.input(&per_commitment_point.serialize());
	sha.input(&base_point.serialize());
	let res = Sha256::from_engine(sha).to_byte_array();

	let hashkey = PublicKey::from_secret_key(
		&secp_ctx,
		&SecretKey::from_slice(&res)
			.expect("Hashes should always be valid keys unless SHA-256 is broken"),
	);
	base_point.combine(&hashkey)
		.expect("Addition only fails if the tweak is the inverse of the key. This is not possible when the tweak contains the hash of the key.")
}

fn revocation_hash_keys(
	revocation_base_point: &PublicKey, per_commitment_point: &PublicKey,
) -> ([u8; 32], [u8; 32]) {
	let rev_append_commit_hash_key = {
		let mut sha = Sha256::engine();
		sha.input(&revocation_base_point.serialize());
		sha.input(&per_commitment_point.serialize());

		Sha256::from_engine(sha).to_byte_array()
	};
	let commit_append_rev_hash_key = {
		let mut sha = Sha256::engine();
		sha.input(&per_commitment_point.serialize());
		sha.input(&revocation_base_point.serialize());

		Sha256::from_engine(sha).to_byte_array()
	};
	(rev_append_commit_hash_key, commit_append_rev_hash_key)
}

/// Derives a per-commitment-transaction revocation key from its constituent parts.
///
/// Only the cheating participant owns a valid witness to propagate a revoked
/// commitment transaction, thus per_commitment_secret always come from cheater
/// and revocation_base_secret always come from punisher, which is the broadcaster
/// of the transaction spending with this key knowledge.
pub fn derive_private_revocation_key<T: secp256k1::Signing>(
	secp_ctx: &Secp256k1<T>, per_commitment_secret: &SecretKey,
	countersignatory_revocation_base_secret: &SecretKey,
) -> SecretKey {
	let countersignatory_revocation_base_point =
		PublicKey::from_secret_key(&secp_ctx, &countersignatory_revocation_base_secret);
	let per_commitment_point = PublicKey::from_secret_key(&secp_ctx, &per_commitment_secret);

	let (rev_append_commit_hash_key, commit_append_rev_hash_key) =
		revocation_hash_keys(&countersignatory_revocation_base_point, &per_commitment_point);

	let countersignatory_contrib = countersignatory_revocation_base_secret.clone().mul_tweak(&Scalar::from_be_bytes(rev_append_commit_hash_key).unwrap())
		.expect("Multiplying a secret key by a hash is expected to never fail per secp256k1 docs");
	let broadcaster_contrib = per_commitment_secret.clone().mul_tweak(&Scalar::from_be_bytes(commit_append_rev_hash_key).unwrap())
		.expect("Multiplying a secret key by a hash is expected to never fail per secp256k1 docs");
	countersignatory_contrib.add_tweak(&Scalar::from_be_bytes(broadcaster_contrib.secret_bytes()).unwrap())
		.expect("Addition only fails if the tweak is the inverse of the key. This is not possible when the tweak commits to the key.")
}

/// Derives a per-commitment-transaction revocation public key from its constituent parts. This is
/// the public equivalent of derive_private_revocation_key - using only public keys to derive a
/// public key instead of private keys.
///
/// Only the cheating participant owns a valid witness to propagate a revoked
/// commitment transaction, thus per_commitment_point always come from cheater
/// and revocation_base_point always come from punisher, which is the broadcaster
/// of the transaction spending with this key knowledge.
///
/// Note that this is infallible iff we trust that at least one of the two input keys are randomly
/// generated (ie our own).
pub fn derive_public_revocation_key<T: secp256k1::Verification>(
	secp_ctx: &Secp256k1<T>, per_commitment_point: &PublicKey,
	countersignatory_revocation_base_point: &PublicKey,
) -> PublicKey {
	let (rev_append_commit_hash_key, commit_append_rev_hash_key) =
		revocation_hash_keys(countersignatory_revocation_base_point, per_commitment_point);

	let countersignatory_contrib = countersignatory_revocation_base_point.clone().mul_tweak(&secp_ctx, &Scalar::from_be_bytes(rev_append_commit_hash_key).unwrap())
		.expect("Multiplying a valid public key by a hash is expected to never fail per secp256k1 docs");
	let broadcaster_contrib = per_commitment_point.clone().mul_tweak(&secp_ctx, &Scalar::from_be_bytes(commit_append_rev_hash_key).unwrap())
		.expect("Multiplying a valid public key by a hash is expected to never fail per secp256k1 docs");
	countersignatory_contrib.combine(&broadcaster_contrib)
		.expect("Addition only fails if the tweak is the inverse of the key. This is not possible when the tweak commits to the key.")
}

/// One counterparty's public keys which do not change over the life of a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelPublicKeys {
	/// The public key which is used to sign all commitment transactions, as it appears in the
	/// on-chain channel lock-in 2-of-2 multisig output.
	pub funding_pubkey: PublicKey,
	/// The base point which is used (with derive_public_revocation_key) to derive per-commitment
	/// revocation keys. This is combined with the per-commitment-secret generated by the
	/// counterparty to create a secret which the counterparty can reveal to revoke previous
	/// states.
	pub revocation_basepoint: PublicKey,
	/// The public key on which the non-broadcaster (ie the countersignatory) receives an immediately
	/// spendable primary channel balance on the broadcaster's commitment transaction. This key is
	/// static across every commitment transaction.
	pub payment_point: PublicKey,
	/// The base point which is used (with derive_public_key) to derive a per-commitment payment
	/// public key which receives non-HTLC-encumbered funds which are only available for spending
	/// after some delay (or can be claimed via the revocation path).
	pub delayed_payment_basepoint: PublicKey,
	/// The base point which is used (with derive_public_key) to derive a per-commitment public key
	/// which is used to encumber HTLC-in-flight outputs.
	pub htlc_basepoint: PublicKey,
}

/// The set of public keys which are used in the creation of one commitment transaction.
/// These are derived from the channel base keys and per-commitment data.
///
/// A broadcaster key is provided from potential broadcaster of the computed transaction.
/// A countersignatory key is coming from a protocol participant unable to broadcast the
/// transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxCreationKeys {
	/// The broadcaster's per-commitment public key which was used to derive the other keys.
	pub per_commitment_point: PublicKey,
	/// The revocation key which is used to allow the broadcaster of the commitment
	/// transaction to provide their counterparty the ability to punish them if they broadcast
	/// an old state.
	pub revocation_key: PublicKey,
	/// Broadcaster's HTLC Key
	pub broadcaster_htlc_key: PublicKey,
	/// Countersignatory's HTLC Key
	pub countersignatory_htlc_key: PublicKey,
	/// Broadcaster's Payment Key (which isn't allowed to be spent from for some delay)
	pub broadcaster_delayed_payment_key: PublicKey,
}

impl TxCreationKeys {
	/// Create per-state keys from channel base points and the per-commitment point.
	/// Key set is asymmetric and can't be used as part of counter-signatory set of transactions.
	pub fn derive_new<T: secp256k1::Signing + secp256k1::Verification>(
		secp_ctx: &Secp256k1<T>, per_commitment_point: &PublicKey,
		broadcaster_delayed_payment_base: &PublicKey, broadcaster_htlc_base: &PublicKey,
		countersignatory_revocation_base: &PublicKey, countersignatory_htlc_base: &PublicKey,
	) -> TxCreationKeys {
		TxCreationKeys {
			per_commitment_point: per_commitment_point.clone(),
			revocation_key: derive_public_revocation_key(
				&secp_ctx,
				&per_commitment_point,
				&countersignatory_revocation_base,
			),
			broadcaster_htlc_key: derive_public_key(
				&secp_ctx,
				&per_commitment_point,
				&broadcaster_htlc_base,
			),
			countersignatory_htlc_key: derive_public_key(
				&secp_ctx,
				&per_commitment_point,
				&countersignatory_htlc_base,
			),
			broadcaster_delayed_payment_key: derive_public_key(
				&secp_ctx,
				&per_commitment_point,
				&broadcaster_delayed_payment_base,
			),
		}
	}

	/// Generate per-state keys from channel static keys.
	/// Key set is asymmetric and can't be used as part of counter-signatory set of transactions.
	pub fn from_channel_static_keys<T: secp256k1::Signing + secp256k1::Verification>(
		per_commitment_point: &PublicKey, broadcaster_keys: &ChannelPublicKeys,
		countersignatory_keys: &ChannelPublicKeys, secp_ctx: &Secp256k1<T>,
	) -> TxCreationKeys {
		TxCreationKeys::derive_new(
			&secp_ctx,
			&per_commitment_point,
			&broadcaster_keys.delayed_payment_basepoint,
			&broadcaster_keys.htlc_basepoint,
			&countersignatory_keys.revocation_basepoint,
			&countersignatory_keys.htlc_basepoint,
		)
	}
}

/// The maximum length of a script returned by get_revokeable_redeemscript.
// Calculated as 6 bytes of opcodes, 1 byte push plus 2 bytes for contest_delay, and two public
// keys of 33 bytes (+ 1 push).
pub const REVOKEABLE_REDEEMSCRIPT_MAX_LENGTH: usize = 6 + 3 + 34 * 2;

/// A script either spendable by the revocation
/// key or the broadcaster_delayed_payment_key and satisfying the relative-locktime OP_CSV constrain.
/// Encumbering a `to_holder` output on a commitment transaction or 2nd-stage HTLC transactions.
pub fn get_revokeable_redeemscript(
	revocation_key: &PublicKey, contest_delay: u16, broadcaster_delayed_payment_key: &PublicKey,
) -> ScriptBuf {
	let res = Builder::new()
		.push_opcode(opcodes::all::OP_IF)
		.push_slice(revocation_key.serialize())
		.push_opcode(opcodes::all::OP_ELSE)
		.push_int(contest_delay as i64)
		.push_opcode(opcodes::all::OP_CSV)
		.push_opcode(opcodes::all::OP_DROP)
		.push_slice(broadcaster_delayed_payment_key.serialize())
		.push_opcode(opcodes::all::OP_ENDIF)
		.push_opcode(opcodes::all::OP_CHECKSIG)
		.into_script();
	debug_assert!(res.len() <= REVOKEABLE_REDEEMSCRIPT_MAX_LENGTH);
	res
}

/// Gets the witness redeemscript for an HTLC output in a commitment transaction.
///
/// `offered` is relative to the broadcaster of the commitment transaction: an offered HTLC is
/// claimed back by the broadcaster after `cltv_expiry` through an HTLC-Timeout transaction,
/// a received one is claimed by the broadcaster with the preimage through an HTLC-Success
/// transaction.
pub fn get_htlc_redeemscript(
	offered: bool, payment_hash: &PaymentHash, cltv_expiry: u32, keys: &TxCreationKeys,
) -> ScriptBuf {
	let payment_hash160 = Ripemd160::hash(&payment_hash.0[..]).to_byte_array();
	let revocation_key_hash = PubkeyHash::hash(&keys.revocation_key.serialize());
	let bldr = Builder::new()
		.push_opcode(opcodes::all::OP_DUP)
		.push_opcode(opcodes::all::OP_HASH160)
		.push_slice(revocation_key_hash)
		.push_opcode(opcodes::all::OP_EQUAL)
		.push_opcode(opcodes::all::OP_IF)
		.push_opcode(opcodes::all::OP_CHECKSIG)
		.push_opcode(opcodes::all::OP_ELSE)
		.push_slice(keys.countersignatory_htlc_key.serialize())
		.push_opcode(opcodes::all::OP_SWAP)
		.push_opcode(opcodes::all::OP_SIZE)
		.push_int(32)
		.push_opcode(opcodes::all::OP_EQUAL);
	let bldr = if offered {
		bldr.push_opcode(opcodes::all::OP_NOTIF)
			.push_opcode(opcodes::all::OP_DROP)
			.push_int(2)
			.push_opcode(opcodes::all::OP_SWAP)
			.push_slice(keys.broadcaster_htlc_key.serialize())
			.push_int(2)
			.push_opcode(opcodes::all::OP_CHECKMULTISIG)
			.push_opcode(opcodes::all::OP_ELSE)
			.push_opcode(opcodes::all::OP_HASH160)
			.push_slice(payment_hash160)
			.push_opcode(opcodes::all::OP_EQUALVERIFY)
			.push_opcode(opcodes::all::OP_CHECKSIG)
			.push_opcode(opcodes::all::OP_ENDIF)
	} else {
		bldr.push_opcode(opcodes::all::OP_IF)
			.push_opcode(opcodes::all::OP_HASH160)
			.push_slice(payment_hash160)
			.push_opcode(opcodes::all::OP_EQUALVERIFY)
			.push_int(2)
			.push_opcode(opcodes::all::OP_SWAP)
			.push_slice(keys.broadcaster_htlc_key.serialize())
			.push_int(2)
			.push_opcode(opcodes::all::OP_CHECKMULTISIG)
			.push_opcode(opcodes::all::OP_ELSE)
			.push_opcode(opcodes::all::OP_DROP)
			.push_int(cltv_expiry as i64)
			.push_opcode(opcodes::all::OP_CLTV)
			.push_opcode(opcodes::all::OP_DROP)
			.push_opcode(opcodes::all::OP_CHECKSIG)
			.push_opcode(opcodes::all::OP_ENDIF)
	};
	bldr.push_opcode(opcodes::all::OP_ENDIF).into_script()
}

/// Gets the redeemscript for a funding output from the two funding public keys.
/// Note that the order of funding public keys does not matter.
pub fn make_funding_redeemscript(broadcaster: &PublicKey, countersignatory: &PublicKey) -> ScriptBuf {
	let broadcaster_funding_key = broadcaster.serialize();
	let countersignatory_funding_key = countersignatory.serialize();

	let builder = Builder::new().push_opcode(opcodes::all::OP_PUSHNUM_2);
	if broadcaster_funding_key[..] < countersignatory_funding_key[..] {
		builder.push_slice(broadcaster_funding_key).push_slice(countersignatory_funding_key)
	} else {
		builder.push_slice(countersignatory_funding_key).push_slice(broadcaster_funding_key)
	}
	.push_opcode(opcodes::all::OP_PUSHNUM_2)
	.push_opcode(opcodes::all::OP_CHECKMULTISIG)
	.into_script()
}

/// Gets the script_pubkey paying the countersignatory's balance on a (non-anchor,
/// `option_static_remotekey`) commitment transaction.
pub fn get_to_countersignatory_script(payment_point: &PublicKey) -> ScriptBuf {
	ScriptBuf::new_p2wpkh(&WPubkeyHash::hash(&payment_point.serialize()))
}
