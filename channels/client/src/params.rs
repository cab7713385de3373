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

//! Channel initialization parameters.

use crate::amount::Amount;

use std::{fmt, time::Duration};

/// Role of this side of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	/// Party that opens the channel and funds the initiator amount.
	Initiator,
	/// Party that accepts the channel and funds the responder amount.
	Responder,
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Role::Initiator => f.write_str("initiator"),
			Role::Responder => f.write_str("responder"),
		}
	}
}

/// Channel session parameters.
///
/// Immutable for the session lifetime; amounts are decimal strings on the
/// wire. The reestablish fields select the reconnect path described in the
/// channel FSM documentation.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
	/// Explicit channel endpoint URL. When unset, the URL is built from
	/// `host` and `port`.
	pub url: Option<String>,
	/// Channel node websocket hostname.
	pub host: String,
	/// Channel node websocket TCP port.
	pub port: u16,
	/// Our role in the channel.
	pub role: Role,
	/// Initiator account address (`ak_`).
	pub initiator_id: String,
	/// Responder account address (`ak_`).
	pub responder_id: String,
	/// Amount the initiator locks into the channel.
	pub initiator_amount: Amount,
	/// Amount the responder locks into the channel.
	pub responder_amount: Amount,
	/// Amount moved from initiator to responder at open.
	pub push_amount: Amount,
	/// Minimum balance both parties must keep in the channel.
	pub channel_reserve: Amount,
	/// Blocks both parties must wait between a solo close and a settle.
	pub lock_period: u64,
	/// Round-trip budget for requests and caller actions.
	pub ttl: Duration,
	/// Password used by the node to encrypt persisted channel state.
	pub state_password: Option<String>,
	/// Ask the node for verbose FSM reports.
	pub debug: bool,
	/// Channel id of a previously left channel to resume.
	pub existing_channel_id: Option<String>,
	/// FSM session id of a previously left channel to resume.
	pub existing_fsm_id: Option<String>,
	/// Last off-chain transaction of the channel being resumed.
	pub offchain_tx: Option<String>,
}

impl ChannelOptions {
	/// Default round-trip budget.
	pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

	/// Channel options with default connection parameters.
	pub fn new(role: Role, initiator_id: impl Into<String>, responder_id: impl Into<String>) -> Self {
		ChannelOptions {
			url: None,
			host: "localhost".into(),
			port: 3014,
			role,
			initiator_id: initiator_id.into(),
			responder_id: responder_id.into(),
			initiator_amount: Amount::zero(),
			responder_amount: Amount::zero(),
			push_amount: Amount::zero(),
			channel_reserve: Amount::zero(),
			lock_period: 10,
			ttl: Self::DEFAULT_TTL,
			state_password: None,
			debug: false,
			existing_channel_id: None,
			existing_fsm_id: None,
			offchain_tx: None,
		}
	}

	/// Address of our own side of the channel.
	pub fn own_id(&self) -> &str {
		match self.role {
			Role::Initiator => &self.initiator_id,
			Role::Responder => &self.responder_id,
		}
	}

	/// Returns `true` if the session resumes an existing FSM instead of
	/// opening a new channel.
	pub fn is_reestablish(&self) -> bool {
		self.existing_fsm_id.is_some()
	}

	/// Endpoint URL with the channel open (or reestablish) parameters in
	/// the query string, the form the node expects them in.
	pub fn channel_url(&self) -> String {
		let base = match &self.url {
			Some(url) => url.clone(),
			None => format!("ws://{}:{}/channel", self.host, self.port),
		};

		let mut query = vec![
			("role".to_string(), self.role.to_string()),
			("initiator_id".into(), self.initiator_id.clone()),
			("responder_id".into(), self.responder_id.clone()),
			("initiator_amount".into(), self.initiator_amount.to_decimal_string()),
			("responder_amount".into(), self.responder_amount.to_decimal_string()),
			("push_amount".into(), self.push_amount.to_decimal_string()),
			("channel_reserve".into(), self.channel_reserve.to_decimal_string()),
			("lock_period".into(), self.lock_period.to_string()),
		];
		if let Some(existing_channel_id) = &self.existing_channel_id {
			query.push(("existing_channel_id".into(), existing_channel_id.clone()));
		}
		if let Some(existing_fsm_id) = &self.existing_fsm_id {
			query.push(("existing_fsm_id".into(), existing_fsm_id.clone()));
		}
		if let Some(state_password) = &self.state_password {
			query.push(("state_password".into(), state_password.clone()));
		}
		if self.debug {
			query.push(("debug".into(), "true".into()));
		}

		let query = query
			.into_iter()
			.map(|(key, value)| format!("{}={}", key, value))
			.collect::<Vec<_>>()
			.join("&");
		format!("{}?{}", base, query)
	}
}
