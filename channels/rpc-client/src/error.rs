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

//! RPC session errors.

use crate::frame::ErrorObject;
use thiserror::Error;

/// Result type used by the RPC session.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that may happen on the session with the channel FSM service.
#[derive(Error, Debug)]
pub enum Error {
	/// Websocket connection has been refused or dropped mid-operation.
	#[error("Channel node connection error: {0}")]
	Connection(#[from] tokio_tungstenite::tungstenite::Error),
	/// Failed to serialize an outbound frame or parse an inbound one.
	#[error("Failed to (de)serialize JSON-RPC frame: {0}")]
	Serialization(#[from] serde_json::Error),
	/// Node replied to our request with an error frame.
	#[error("Channel node returned an error: {0}")]
	Node(ErrorObject),
	/// Request has not been answered within the session TTL.
	#[error("Request {0} has timed out")]
	Timeout(String),
	/// Session is torn down. Carries the last error frame received from
	/// the node before the session ended, if any.
	#[error("Connection to channel node is lost")]
	Disconnected {
		/// Last inbound error frame, if the node sent one.
		last_node_error: Option<ErrorObject>,
	},
}

impl Error {
	/// Returns `true` if the error means that the session is unusable and
	/// the caller has to reconnect.
	pub fn is_connection_error(&self) -> bool {
		matches!(self, Error::Connection(_) | Error::Disconnected { .. })
	}
}
