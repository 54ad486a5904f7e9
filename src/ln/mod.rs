// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Implementations of channel opening and the BOLT 3 transaction building it relies on.
//!
//! The [`channelmanager::ChannelManager`] is the entry point. The state tree channels move
//! through is in [`channel_state`], the code run on each transition in [`transitions`], and the
//! pluggable validation and construction steps in [`channel_logic`].

pub mod chan_utils;
pub mod channel;
pub mod channel_logic;
pub mod channel_state;
pub mod channelmanager;
pub mod commitment_number;
pub mod commitment_tx;
pub mod msgs;
pub mod peer;
pub mod transitions;
pub mod types;
