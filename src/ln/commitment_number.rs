// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Commitment numbers and their obscured encoding in commitment transactions.
//!
//! Each commitment transaction carries its 48-bit commitment number XOR-ed with a factor only the
//! two channel parties can compute. The upper 24 bits of the result go in the input's
//! `nSequence`, the lower 24 bits in `nLockTime`.

use bitcoin::hashes::sha256::Hash as Sha256;
use bitcoin::hashes::{Hash, HashEngine};
use bitcoin::secp256k1::PublicKey;

use core::fmt;

/// The largest commitment number a channel may reach, 2^48 - 1.
pub const MAX_COMMITMENT_NUMBER: u64 = (1 << 48) - 1;

/// A channel's commitment counter. Starts at zero and grows by one per commitment transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitmentNumber(u64);

impl CommitmentNumber {
	/// The number of the first commitment transaction of a channel.
	pub fn zero() -> Self {
		CommitmentNumber(0)
	}

	/// Wraps `n`, failing if it does not fit in 48 bits.
	pub fn new(n: u64) -> Option<Self> {
		if n > MAX_COMMITMENT_NUMBER {
			None
		} else {
			Some(CommitmentNumber(n))
		}
	}

	/// The raw counter value.
	pub fn value(&self) -> u64 {
		self.0
	}

	/// The number of the following commitment, or `None` once the counter is exhausted.
	pub fn next(&self) -> Option<Self> {
		Self::new(self.0 + 1)
	}

	/// The index of this commitment's per-commitment secret in the secret chain. Secrets are
	/// consumed from the top of the chain downwards.
	pub fn secret_index(&self) -> u64 {
		MAX_COMMITMENT_NUMBER - self.0
	}

	/// Masks this number with the channel's obscure factor.
	pub fn obscure(
		&self, open_payment_basepoint: &PublicKey, accept_payment_basepoint: &PublicKey,
	) -> ObscuredCommitmentNumber {
		let factor = get_commitment_transaction_number_obscure_factor(
			open_payment_basepoint,
			accept_payment_basepoint,
		);
		ObscuredCommitmentNumber(self.0 ^ factor)
	}

	/// Recovers the commitment number from a commitment transaction's `nLockTime` and its input's
	/// `nSequence`.
	pub fn reveal(
		lock_time: u32, sequence: u32, open_payment_basepoint: &PublicKey,
		accept_payment_basepoint: &PublicKey,
	) -> Self {
		let obscured = ObscuredCommitmentNumber::from_tx_fields(lock_time, sequence);
		let factor = get_commitment_transaction_number_obscure_factor(
			open_payment_basepoint,
			accept_payment_basepoint,
		);
		CommitmentNumber(obscured.0 ^ factor)
	}
}

impl fmt::Display for CommitmentNumber {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A commitment number after masking, as it is spread over a commitment transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObscuredCommitmentNumber(u64);

impl ObscuredCommitmentNumber {
	/// The masked 48-bit value.
	pub fn value(&self) -> u64 {
		self.0
	}

	/// The commitment transaction's `nLockTime`: `0x20` followed by the lower 24 bits.
	pub fn lock_time(&self) -> u32 {
		((0x20 as u32) << 8 * 3) | ((self.0 & 0xffffff) as u32)
	}

	/// The commitment input's `nSequence`: `0x80` followed by the upper 24 bits.
	pub fn sequence(&self) -> u32 {
		((0x80 as u32) << 8 * 3) | ((self.0 >> 3 * 8) as u32)
	}

	/// Reassembles the masked value from the two transaction fields.
	pub fn from_tx_fields(lock_time: u32, sequence: u32) -> Self {
		ObscuredCommitmentNumber(
			(((sequence & 0xffffff) as u64) << 3 * 8) | ((lock_time & 0xffffff) as u64),
		)
	}
}

/// Commitment transaction numbers which appear in the transactions themselves are XOR'd with a
/// shared secret first. This prevents on-chain observers from discovering how many commitment
/// transactions occurred in a channel before it was closed.
///
/// This function gets the shared secret from relevant channel public keys and can be used to
/// "decrypt" the commitment transaction number given a commitment transaction on-chain.
pub fn get_commitment_transaction_number_obscure_factor(
	open_payment_basepoint: &PublicKey, accept_payment_basepoint: &PublicKey,
) -> u64 {
	let mut sha = Sha256::engine();
	sha.input(&open_payment_basepoint.serialize());
	sha.input(&accept_payment_basepoint.serialize());
	let res = Sha256::from_engine(sha).to_byte_array();

	((res[26] as u64) << 5 * 8)
		| ((res[27] as u64) << 4 * 8)
		| ((res[28] as u64) << 3 * 8)
		| ((res[29] as u64) << 2 * 8)
		| ((res[30] as u64) << 1 * 8)
		| ((res[31] as u64) << 0 * 8)
}
