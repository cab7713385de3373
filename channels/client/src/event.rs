// Copyright 2019-2021 Aeternity Anstalt.
// This file is part of Aeternity Channels.

// Aeternity Channels is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Aeternity Channels is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Aeternity Channels.  If not, see <http://www.gnu.org/licenses/>.

//! Multi-subscriber channel event bus.

use crate::{error::ChannelError, protocol::ChannelMessage, state::ChannelStatus};

use futures::channel::mpsc;
use std::sync::Arc;

/// Event observable on a channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
	/// Channel status has changed. Fired exactly once per transition,
	/// before any dependent action completion resolves.
	StatusChanged(ChannelStatus),
	/// A new co-signed off-chain state has been accepted.
	StateChanged(String),
	/// Counterparty chat message.
	Message(ChannelMessage),
	/// Error raised while handling node messages; the channel stays
	/// usable unless the status says otherwise.
	Error(Arc<ChannelError>),
	/// The channel has spawned or observed an on-chain transaction.
	OnChainTx {
		/// Serialized signed transaction.
		tx: String,
		/// Node classification of the transaction, when reported.
		info: Option<String>,
	},
	/// Counterparty's session dropped; updates may arrive via backchannel.
	PeerDisconnected,
	/// A round was aborted before completion.
	AbortedUpdate,
	/// Counterparty has posted an outdated state; a slash is possible.
	CanSlash,
}

/// Fan-out of channel events to any number of subscribers.
///
/// Subscribers get an unbounded stream; the ones that went away are pruned
/// on the next emit.
#[derive(Default)]
pub(crate) struct EventBus {
	subscribers: Vec<mpsc::UnboundedSender<ChannelEvent>>,
}

impl EventBus {
	pub(crate) fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ChannelEvent> {
		let (sender, receiver) = mpsc::unbounded();
		self.subscribers.push(sender);
		receiver
	}

	pub(crate) fn emit(&mut self, event: ChannelEvent) {
		self.subscribers
			.retain(|subscriber| subscriber.unbounded_send(event.clone()).is_ok());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::StreamExt;

	#[tokio::test]
	async fn every_subscriber_observes_every_event() {
		let mut bus = EventBus::default();
		let mut first = bus.subscribe();
		let mut second = bus.subscribe();

		bus.emit(ChannelEvent::StatusChanged(ChannelStatus::Open));

		for subscriber in [&mut first, &mut second] {
			match subscriber.next().await {
				Some(ChannelEvent::StatusChanged(ChannelStatus::Open)) => (),
				other => panic!("unexpected event: {:?}", other),
			}
		}
	}

	#[tokio::test]
	async fn dropped_subscribers_are_pruned() {
		let mut bus = EventBus::default();
		let first = bus.subscribe();
		let mut second = bus.subscribe();
		drop(first);

		bus.emit(ChannelEvent::AbortedUpdate);
		assert_eq!(bus.subscribers.len(), 1);
		assert!(matches!(second.next().await, Some(ChannelEvent::AbortedUpdate)));
	}
}
