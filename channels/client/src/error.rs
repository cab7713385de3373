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

//! Channel client errors.

use channel_rpc_client::ErrorObject;
use serde_json::Value;
use thiserror::Error;

/// Result type used by the channel client.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Node error code used when an off-chain action cannot be funded.
pub const ERR_CODE_INSUFFICIENT_BALANCE: i64 = 1001;

/// Errors raised by the channel client.
#[derive(Error, Debug)]
pub enum ChannelError {
	/// Caller supplied invalid parameters (negative amount, malformed
	/// address, missing reestablish ids, ...).
	#[error("Illegal argument: {0}")]
	IllegalArgument(String),
	/// Requested action cannot be funded off-chain.
	#[error("Insufficient off-chain balance: {0}")]
	InsufficientBalance(String),
	/// Transport has been refused or dropped.
	#[error("Channel connection error: {0}")]
	Connection(String),
	/// Node replied with an error frame while a notification was being
	/// handled. Carries the raw message and the classified handler error.
	#[error("Error handling incoming channel message: {handler}")]
	IncomingMessage {
		/// Raw inbound message that triggered the error.
		message: Value,
		/// Classified handler error.
		handler: Box<ChannelError>,
	},
	/// FSM received a message it could not map to a legal transition.
	#[error("State Channels FSM entered unknown state")]
	UnknownChannelState {
		/// What exactly could not be classified.
		detail: String,
	},
	/// Action or request has not completed within the session TTL.
	#[error("Channel action has timed out: {0}")]
	Timeout(String),
	/// Low-level session failure.
	#[error(transparent)]
	Rpc(#[from] channel_rpc_client::Error),
}

impl ChannelError {
	/// Classify a node error object the way the FSM does: known codes map
	/// to their domain error, everything else is kept verbatim.
	pub fn classify_node_error(error: ErrorObject) -> ChannelError {
		match error.code {
			ERR_CODE_INSUFFICIENT_BALANCE =>
				ChannelError::InsufficientBalance(error.message),
			_ => ChannelError::Rpc(channel_rpc_client::Error::Node(error)),
		}
	}
}
