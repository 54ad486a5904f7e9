// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Provides keys to the channel core and defines the signing primitives used on commitment
//! transactions.
//!
//! The provided output descriptors follow a custom rust-lightning format, but the keys themselves
//! are plain secp256k1 keys derived from a single 32-byte seed.

use bitcoin::bip32::{ChildNumber, Xpriv};
use bitcoin::hashes::sha256::Hash as Sha256;
use bitcoin::hashes::sha256::HashEngine as Sha256State;
use bitcoin::hashes::{Hash, HashEngine};
use bitcoin::network::Network;
use bitcoin::script::Script;
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{self, Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Transaction;
use bitcoin::Amount;

use crate::ln::chan_utils::{build_commitment_secret, make_funding_redeemscript, ChannelPublicKeys};
use crate::ln::commitment_number::CommitmentNumber;
use crate::ln::commitment_tx::CommitmentTransaction;
use crate::util::logger::DebugBytes;

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

/// A trait that describes a source of entropy.
pub trait EntropySource {
	/// Gets a unique, cryptographically-secure, random 32-byte value. This method must return a
	/// different value each time it is called.
	fn get_secure_random_bytes(&self) -> [u8; 32];
}

/// A trait that can return the per-channel key material for new channels.
pub trait SignerProvider {
	/// Generates a unique `channel_keys_id` that can be used to obtain a [`ChannelKeys`] through
	/// [`SignerProvider::derive_channel_keys`]. The `user_channel_id` is provided to allow
	/// implementations of [`SignerProvider`] to maintain a mapping between itself and the
	/// generated `channel_keys_id`.
	///
	/// This method must return a different value each time it is called.
	fn generate_channel_keys_id(
		&self, inbound: bool, channel_value_satoshis: u64, user_channel_id: u128,
	) -> [u8; 32];

	/// Derives the private key material backing a channel.
	///
	/// To derive a new channel, a fresh `channel_keys_id` should be obtained through
	/// [`SignerProvider::generate_channel_keys_id`]. Otherwise, an existing `channel_keys_id` may
	/// be re-derived from its original value.
	fn derive_channel_keys(
		&self, channel_value_satoshis: u64, channel_keys_id: [u8; 32],
	) -> ChannelKeys;
}

/// The private key material of one channel, kept in memory.
///
/// Each secret is used for exactly one channel. The matching public keys are computed once on
/// construction.
#[derive(Clone)]
pub struct ChannelKeys {
	/// Holder secret key in the 2-of-2 multisig script of a channel. This key also backs the
	/// holder's signatures on the counterparty's commitment transactions.
	pub funding_key: SecretKey,
	/// Holder secret key for blinded revocation pubkey.
	pub revocation_base_key: SecretKey,
	/// Holder secret key used for our balance in counterparty-broadcasted commitment
	/// transactions.
	pub payment_key: SecretKey,
	/// Holder secret key used in an HTLC transaction.
	pub delayed_payment_base_key: SecretKey,
	/// Holder HTLC secret key used in commitment transaction HTLC outputs.
	pub htlc_base_key: SecretKey,
	/// Commitment seed.
	pub commitment_seed: [u8; 32],
	holder_channel_pubkeys: ChannelPublicKeys,
	channel_value_satoshis: u64,
	channel_keys_id: [u8; 32],
}

impl fmt::Debug for ChannelKeys {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ChannelKeys")
			.field("holder_channel_pubkeys", &self.holder_channel_pubkeys)
			.field("channel_value_satoshis", &self.channel_value_satoshis)
			.field("channel_keys_id", &format_args!("{}", DebugBytes(&self.channel_keys_id)))
			.finish_non_exhaustive()
	}
}

impl ChannelKeys {
	/// Creates a new [`ChannelKeys`].
	pub fn new<C: secp256k1::Signing>(
		secp_ctx: &Secp256k1<C>, funding_key: SecretKey, revocation_base_key: SecretKey,
		payment_key: SecretKey, delayed_payment_base_key: SecretKey, htlc_base_key: SecretKey,
		commitment_seed: [u8; 32], channel_value_satoshis: u64, channel_keys_id: [u8; 32],
	) -> ChannelKeys {
		let holder_channel_pubkeys = ChannelPublicKeys {
			funding_pubkey: PublicKey::from_secret_key(secp_ctx, &funding_key),
			revocation_basepoint: PublicKey::from_secret_key(secp_ctx, &revocation_base_key),
			payment_point: PublicKey::from_secret_key(secp_ctx, &payment_key),
			delayed_payment_basepoint: PublicKey::from_secret_key(
				secp_ctx,
				&delayed_payment_base_key,
			),
			htlc_basepoint: PublicKey::from_secret_key(secp_ctx, &htlc_base_key),
		};
		ChannelKeys {
			funding_key,
			revocation_base_key,
			payment_key,
			delayed_payment_base_key,
			htlc_base_key,
			commitment_seed,
			holder_channel_pubkeys,
			channel_value_satoshis,
			channel_keys_id,
		}
	}

	/// The public keys matching our secrets, as sent in `open_channel`.
	pub fn pubkeys(&self) -> &ChannelPublicKeys {
		&self.holder_channel_pubkeys
	}

	/// The id these keys were derived from.
	pub fn channel_keys_id(&self) -> [u8; 32] {
		self.channel_keys_id
	}

	/// The channel value the keys were derived for.
	pub fn channel_value_satoshis(&self) -> u64 {
		self.channel_value_satoshis
	}

	/// Gets the secret for the given commitment. Revealing it to the counterparty revokes that
	/// commitment.
	pub fn per_commitment_secret(&self, commitment_number: CommitmentNumber) -> [u8; 32] {
		build_commitment_secret(&self.commitment_seed, commitment_number.secret_index())
	}

	/// Gets the per-commitment point for the given commitment.
	pub fn per_commitment_point<T: secp256k1::Signing>(
		&self, commitment_number: CommitmentNumber, secp_ctx: &Secp256k1<T>,
	) -> PublicKey {
		let commitment_secret =
			SecretKey::from_slice(&self.per_commitment_secret(commitment_number))
				.expect("SHA-256 output is a valid secret key");
		PublicKey::from_secret_key(secp_ctx, &commitment_secret)
	}

	/// Signs a commitment transaction (ours or theirs) spending the channel's funding output.
	pub fn sign_commitment<T: secp256k1::Signing>(
		&self, commitment_tx: &CommitmentTransaction, counterparty_funding_pubkey: &PublicKey,
		secp_ctx: &Secp256k1<T>,
	) -> Result<Signature, ()> {
		let funding_redeemscript = make_funding_redeemscript(
			&self.holder_channel_pubkeys.funding_pubkey,
			counterparty_funding_pubkey,
		);
		sign_commitment_transaction(
			secp_ctx,
			commitment_tx.transaction(),
			&funding_redeemscript,
			self.channel_value_satoshis,
			&self.funding_key,
		)
	}
}

fn commitment_sighash(
	tx: &Transaction, funding_redeemscript: &Script, channel_value_satoshis: u64,
) -> Result<Message, ()> {
	let sighash = SighashCache::new(tx)
		.p2wsh_signature_hash(
			0,
			funding_redeemscript,
			Amount::from_sat(channel_value_satoshis),
			EcdsaSighashType::All,
		)
		.map_err(|_| ())?;
	Ok(Message::from_digest(sighash.to_byte_array()))
}

/// Signs the single funding input of a commitment transaction with `funding_key`.
pub fn sign_commitment_transaction<T: secp256k1::Signing>(
	secp_ctx: &Secp256k1<T>, tx: &Transaction, funding_redeemscript: &Script,
	channel_value_satoshis: u64, funding_key: &SecretKey,
) -> Result<Signature, ()> {
	let msg = commitment_sighash(tx, funding_redeemscript, channel_value_satoshis)?;
	Ok(secp_ctx.sign_ecdsa(&msg, funding_key))
}

/// Checks `sig` is a valid signature by `funding_pubkey` on a commitment transaction's funding
/// input.
pub fn verify_commitment_signature<T: secp256k1::Verification>(
	secp_ctx: &Secp256k1<T>, tx: &Transaction, funding_redeemscript: &Script,
	channel_value_satoshis: u64, sig: &Signature, funding_pubkey: &PublicKey,
) -> bool {
	match commitment_sighash(tx, funding_redeemscript, channel_value_satoshis) {
		Ok(msg) => secp_ctx.verify_ecdsa(&msg, sig, funding_pubkey).is_ok(),
		Err(()) => false,
	}
}

/// Simple implementation of [`EntropySource`] and [`SignerProvider`] that takes a 32-byte seed
/// for its master key and derives all channel keys from it.
///
/// A single `KeysManager` must not be started twice with the same seed and starting time, or
/// channels would end up sharing keys.
pub struct KeysManager {
	secp_ctx: Secp256k1<secp256k1::All>,
	channel_master_key: Xpriv,
	channel_child_index: AtomicUsize,
	rand_bytes_unique_start: Sha256State,
	rand_bytes_index: AtomicUsize,
	seed: [u8; 32],
	starting_time_secs: u64,
	starting_time_nanos: u32,
}

impl KeysManager {
	/// Constructs a `KeysManager` from a 32-byte seed. If the seed is in some way biased (e.g.,
	/// your CSRNG is busted) this may panic (but more importantly, you will possibly lose funds).
	/// `starting_time` isn't strictly required to actually be a time, but it must absolutely,
	/// without a doubt, be unique to this instance. I.e., if you start multiple times with the
	/// same `seed`, `starting_time` must be unique to each run.
	pub fn new(seed: &[u8; 32], starting_time_secs: u64, starting_time_nanos: u32) -> Self {
		let secp_ctx = Secp256k1::new();
		// Note that when we aren't serializing the key, network doesn't matter
		match Xpriv::new_master(Network::Bitcoin, seed) {
			Ok(master_key) => {
				let channel_master_key = master_key
					.derive_priv(&secp_ctx, &[ChildNumber::from_hardened_idx(3).unwrap()])
					.expect("Your RNG is busted");

				let mut rand_bytes_unique_start = Sha256::engine();
				rand_bytes_unique_start.input(&starting_time_secs.to_be_bytes());
				rand_bytes_unique_start.input(&starting_time_nanos.to_be_bytes());
				rand_bytes_unique_start.input(seed);

				KeysManager {
					secp_ctx,
					channel_master_key,
					channel_child_index: AtomicUsize::new(0),
					rand_bytes_unique_start,
					rand_bytes_index: AtomicUsize::new(0),
					seed: *seed,
					starting_time_secs,
					starting_time_nanos,
				}
			},
			Err(_) => panic!("Your rng is busted"),
		}
	}

	/// Derive an old [`ChannelKeys`] containing per-channel secrets based on a key derivation
	/// parameters.
	pub fn derive_channel_keys(
		&self, channel_value_satoshis: u64, params: &[u8; 32],
	) -> ChannelKeys {
		// Only the low 31 bits select the hardened child. The full id is hashed in below.
		let chan_id = u32::from_be_bytes([params[0], params[1], params[2], params[3]]) & 0x7fff_ffff;
		let mut unique_start = Sha256::engine();
		unique_start.input(params);
		unique_start.input(&self.seed);

		// We only seriously intend to rely on the channel_master_key for true secure
		// entropy, everything else just ensures uniqueness. We rely on the unique_start (ie
		// starting_time provided in the constructor) to be unique.
		let child_privkey = self
			.channel_master_key
			.derive_priv(
				&self.secp_ctx,
				&[ChildNumber::Hardened { index: chan_id }],
			)
			.expect("Your RNG is busted");
		unique_start.input(&child_privkey.private_key[..]);

		let seed = Sha256::from_engine(unique_start).to_byte_array();

		let commitment_seed = {
			let mut sha = Sha256::engine();
			sha.input(&seed);
			sha.input(&b"commitment seed"[..]);
			Sha256::from_engine(sha).to_byte_array()
		};
		macro_rules! key_step {
			($info: expr, $prev_key: expr) => {{
				let mut sha = Sha256::engine();
				sha.input(&seed);
				sha.input(&$prev_key[..]);
				sha.input(&$info[..]);
				SecretKey::from_slice(&Sha256::from_engine(sha).to_byte_array())
					.expect("SHA-256 is busted")
			}};
		}
		let funding_key = key_step!(b"funding key", commitment_seed);
		let revocation_base_key = key_step!(b"revocation base key", funding_key);
		let payment_key = key_step!(b"payment key", revocation_base_key);
		let delayed_payment_base_key = key_step!(b"delayed payment base key", payment_key);
		let htlc_base_key = key_step!(b"HTLC base key", delayed_payment_base_key);

		ChannelKeys::new(
			&self.secp_ctx,
			funding_key,
			revocation_base_key,
			payment_key,
			delayed_payment_base_key,
			htlc_base_key,
			commitment_seed,
			channel_value_satoshis,
			*params,
		)
	}
}

impl EntropySource for KeysManager {
	fn get_secure_random_bytes(&self) -> [u8; 32] {
		let mut sha = self.rand_bytes_unique_start.clone();

		let child_ix = self.rand_bytes_index.fetch_add(1, Ordering::AcqRel);
		sha.input(&(child_ix as u64).to_be_bytes());

		Sha256::from_engine(sha).to_byte_array()
	}
}

impl SignerProvider for KeysManager {
	fn generate_channel_keys_id(
		&self, _inbound: bool, _channel_value_satoshis: u64, user_channel_id: u128,
	) -> [u8; 32] {
		let child_idx = self.channel_child_index.fetch_add(1, Ordering::AcqRel);
		// `child_idx` is the only thing guaranteed to make each channel unique without a restart
		// (though `user_channel_id` should help, depending on user behavior). If it manages to
		// roll over, we may generate duplicate keys for two different channels, which could
		// result in loss of funds. Because we only support 32-bit+ systems, assert that our
		// `AtomicUsize` doesn't reach `u32::MAX`.
		assert!(child_idx < core::u32::MAX as usize, "2^32 channels opened without restart");
		let mut id = [0; 32];
		id[0..4].copy_from_slice(&(child_idx as u32).to_be_bytes());
		id[4..8].copy_from_slice(&self.starting_time_nanos.to_be_bytes());
		id[8..16].copy_from_slice(&self.starting_time_secs.to_be_bytes());
		id[16..32].copy_from_slice(&user_channel_id.to_be_bytes());
		id
	}

	fn derive_channel_keys(
		&self, channel_value_satoshis: u64, channel_keys_id: [u8; 32],
	) -> ChannelKeys {
		KeysManager::derive_channel_keys(self, channel_value_satoshis, &channel_keys_id)
	}
}
