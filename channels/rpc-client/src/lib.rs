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

//! Framed JSON-RPC 2.0 session to an aeternity channel FSM service.
//!
//! The node speaks a symmetric dialect: the client sends requests and
//! id-less replies, the node sends responses and server-originated
//! notifications over the same websocket. This crate owns the transport,
//! correlates requests with responses and hands notifications out as a
//! stream, leaving their interpretation to the channel state machine.

#![warn(missing_docs)]

mod client;
mod error;
mod frame;
mod transport;

pub use crate::client::RpcSession;
pub use crate::error::{Error, Result};
pub use crate::frame::{ErrorObject, InboundFrame, Notification, OutboundFrame, JSONRPC_VERSION};
pub use crate::transport::{Transport, WsTransport};

#[cfg(any(feature = "test-helpers", test))]
pub use crate::transport::{PairTransport, RemoteEndpoint};
