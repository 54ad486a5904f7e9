// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Structs and traits which allow other parts of the crate to interact with the blockchain.

use bitcoin::block::Block;
use bitcoin::transaction::Transaction;

pub mod chaininterface;
pub mod transaction;

/// A block connected to the best chain, as delivered to
/// [`ChannelManager::on_block_connected`].
///
/// Only the transactions and the height matter to channel funding, so the header is not kept.
///
/// [`ChannelManager::on_block_connected`]: crate::ln::channelmanager::ChannelManager::on_block_connected
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectedBlock {
	height: u32,
	txdata: Vec<Transaction>,
}

impl ConnectedBlock {
	/// Builds a block from its height and (possibly filtered) transactions.
	pub fn new(height: u32, txdata: Vec<Transaction>) -> Self {
		ConnectedBlock { height, txdata }
	}

	/// Builds a block from a full [`Block`] at the given height.
	pub fn from_block(block: &Block, height: u32) -> Self {
		ConnectedBlock { height, txdata: block.txdata.clone() }
	}

	/// The height of the block in the best chain.
	pub fn height(&self) -> u32 {
		self.height
	}

	/// The block's transactions, in block order.
	pub fn transactions(&self) -> &[Transaction] {
		&self.txdata
	}
}
