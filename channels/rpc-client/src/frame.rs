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

//! JSON-RPC 2.0 frame types used on the channel FSM session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version carried by every frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound frame. Requests carry an `id`, notifications don't.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame {
	/// Always [`JSONRPC_VERSION`].
	pub jsonrpc: &'static str,
	/// Correlation id. `None` makes this frame a notification.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Method name (e.g. `channels.update.new`).
	pub method: String,
	/// Method parameters.
	pub params: Value,
}

impl OutboundFrame {
	/// Build a request frame with the given correlation id.
	pub fn request(id: String, method: &str, params: Value) -> Self {
		OutboundFrame {
			jsonrpc: JSONRPC_VERSION,
			id: Some(id),
			method: method.into(),
			params,
		}
	}

	/// Build a fire-and-forget notification frame.
	pub fn notification(method: &str, params: Value) -> Self {
		OutboundFrame {
			jsonrpc: JSONRPC_VERSION,
			id: None,
			method: method.into(),
			params,
		}
	}
}

/// Inbound frame. May be a response (`id` + `result`/`error`), an error
/// without correlation, or a server-originated notification (`method`).
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
	/// Correlation id, present on responses to our requests.
	#[serde(default)]
	pub id: Option<String>,
	/// Method name, present on notifications.
	#[serde(default)]
	pub method: Option<String>,
	/// Notification parameters.
	#[serde(default)]
	pub params: Option<Value>,
	/// Successful response payload.
	#[serde(default)]
	pub result: Option<Value>,
	/// Error response payload.
	#[serde(default)]
	pub error: Option<ErrorObject>,
}

/// JSON-RPC error object, carried by the node unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
	/// Numeric error code.
	pub code: i64,
	/// Human-readable error message.
	pub message: String,
	/// Optional structured details.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl std::fmt::Display for ErrorObject {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{} (code {})", self.message, self.code)
	}
}

/// Server-originated notification, routed to the channel FSM.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
	/// Method name, used as the dispatch key.
	pub method: String,
	/// Notification parameters.
	pub params: Value,
}
