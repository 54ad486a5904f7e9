// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

#![crate_name = "lightning_channel"]

//! The peer-channel lifecycle core of a Lightning node.
//!
//! This crate drives a single-funded channel from `open_channel` through funding confirmation to
//! the point where it is usable, using a hierarchical state machine whose handlers live in
//! [`ln::transitions`]. It also contains the BOLT 3 machinery such channels rely on: per-commitment
//! key derivation, the revocation secret chain, commitment number obscuring and commitment / HTLC
//! transaction construction.
//!
//! Wallet access, block delivery, storage and the peer transport are all provided by the user
//! through the traits in [`util::wallet_utils`], [`chain`], [`util::persist`] and [`ln::peer`].
//! Everything is driven through the [`ln::channelmanager::ChannelManager`], usually via the
//! sequential dispatcher in [`events`].

#![cfg_attr(not(test), deny(missing_docs))]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

extern crate alloc;
extern crate bitcoin;

#[macro_use]
pub mod util;
pub mod chain;
pub mod events;
pub mod ln;
pub mod sign;
