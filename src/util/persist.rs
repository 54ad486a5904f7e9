// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! This module contains the storage trait the channel core persists channels through.

use core::future::Future;
use std::io;

use crate::ln::channel::Channel;

/// Trait that handles persisting [`Channel`]s, returning an error if persistence failed.
///
/// Channels are saved after every state change the [`ChannelManager`] makes, and the returned
/// future is awaited before the next change is made. A channel is saved under its temporary
/// channel id, which never changes.
///
/// [`ChannelManager`]: crate::ln::channelmanager::ChannelManager
pub trait ChannelStore {
	/// Persist the given channel, replacing any earlier copy.
	fn persist_channel<'a>(
		&'a self, channel: &'a Channel,
	) -> impl Future<Output = Result<(), io::Error>> + Send + 'a;

	/// Remove the given channel from storage. Removing a channel that was never stored is not
	/// an error.
	fn remove_channel<'a>(
		&'a self, channel: &'a Channel,
	) -> impl Future<Output = Result<(), io::Error>> + Send + 'a;
}
