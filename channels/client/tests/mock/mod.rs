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

//! Scripted channel node used by the scenario tests.

use channel_client::{Role, SignMeta, SignResponse, SignTag, Signer, Update};
use channel_rpc_client::RemoteEndpoint;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// What the test signer does with incoming requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerBehaviour {
	/// Sign everything.
	Accept,
	/// Refuse without a code.
	Reject,
	/// Abort with a user-defined code.
	Abort(i64),
}

/// One recorded signer invocation.
#[derive(Debug, Clone)]
pub struct SignCall {
	/// Tag of the request; `None` for the untagged surface.
	pub tag: Option<SignTag>,
	pub tx: String,
	pub updates: Vec<Update>,
}

/// Recording signer with a switchable behaviour.
pub struct TestSigner {
	behaviour: Mutex<SignerBehaviour>,
	calls: Mutex<Vec<SignCall>>,
}

impl TestSigner {
	pub fn accepting() -> Arc<Self> {
		Arc::new(TestSigner {
			behaviour: Mutex::new(SignerBehaviour::Accept),
			calls: Mutex::new(Vec::new()),
		})
	}

	pub fn set_behaviour(&self, behaviour: SignerBehaviour) {
		*self.behaviour.lock().unwrap() = behaviour;
	}

	pub fn calls(&self) -> Vec<SignCall> {
		self.calls.lock().unwrap().clone()
	}

	pub fn tagged_calls(&self, tag: SignTag) -> Vec<SignCall> {
		self.calls().into_iter().filter(|call| call.tag == Some(tag)).collect()
	}

	fn respond(&self, tag: Option<SignTag>, tx: &str, meta: &SignMeta) -> SignResponse {
		self.calls.lock().unwrap().push(SignCall {
			tag,
			tx: tx.to_owned(),
			updates: meta.updates.clone(),
		});
		match *self.behaviour.lock().unwrap() {
			SignerBehaviour::Accept => SignResponse::Signed(co_sign(tx)),
			SignerBehaviour::Reject => SignResponse::Rejected,
			SignerBehaviour::Abort(code) => SignResponse::Abort(code),
		}
	}
}

#[async_trait]
impl Signer for TestSigner {
	async fn sign(&self, tx: &str, meta: &SignMeta) -> SignResponse {
		self.respond(None, tx, meta)
	}

	async fn sign_tagged(&self, tag: SignTag, tx: &str, meta: &SignMeta) -> SignResponse {
		self.respond(Some(tag), tx, meta)
	}
}

/// Signed form of a transaction blob, as produced by [`TestSigner`].
pub fn co_sign(tx: &str) -> String {
	format!("{}_co", tx)
}

/// Node side of one client session.
pub struct NodeEndpoint {
	remote: RemoteEndpoint,
}

impl NodeEndpoint {
	pub fn new(remote: RemoteEndpoint) -> Self {
		NodeEndpoint { remote }
	}

	pub fn notify(&self, method: &str, params: Value) {
		self.remote
			.send(json!({ "jsonrpc": "2.0", "method": method, "params": params }).to_string());
	}

	pub fn info(&self, event: &str) {
		self.notify("channels.info", json!({ "event": event }));
	}

	pub fn info_with(&self, event: &str, mut extra: Value) {
		extra["event"] = json!(event);
		self.notify("channels.info", extra);
	}

	pub fn respond(&self, id: &str, result: Value) {
		self.remote
			.send(json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string());
	}

	pub fn error_notification(&self, code: i64, message: &str) {
		self.notify("channels.error", json!({ "code": code, "message": message }));
	}

	pub fn close(&mut self) {
		self.remote.close();
	}

	/// Next frame from the client as `(id, method, params)`.
	pub async fn next(&mut self) -> (Option<String>, String, Value) {
		let raw = self.remote.next_frame().await.expect("client frame");
		let frame: Value = serde_json::from_str(&raw).expect("valid json frame");
		(
			frame["id"].as_str().map(str::to_owned),
			frame["method"].as_str().expect("frame method").to_owned(),
			frame["params"].clone(),
		)
	}

	/// Next frame, asserted to be a notification under `method`.
	pub async fn expect(&mut self, method: &str) -> Value {
		let (id, got, params) = self.next().await;
		assert_eq!(got, method, "unexpected method (params: {})", params);
		assert_eq!(id, None, "expected a notification for {}", method);
		params
	}

	/// Next frame, asserted to be a request under `method`.
	pub async fn expect_request(&mut self, method: &str) -> (String, Value) {
		let (id, got, params) = self.next().await;
		assert_eq!(got, method, "unexpected method (params: {})", params);
		(id.expect("request id"), params)
	}
}

/// Drive one side of the open handshake.
pub async fn drive_open(
	endpoint: &mut NodeEndpoint,
	role: Role,
	fsm_id: &str,
	channel_id: &str,
	create_tx: &str,
) {
	endpoint.info_with("fsm_up", json!({ "fsm_id": fsm_id }));
	endpoint.info("channel_open");

	let tag = match role {
		Role::Initiator => "initiator_sign",
		Role::Responder => "responder_sign",
	};
	endpoint.notify(&format!("channels.sign.{}", tag), json!({ "tx": create_tx }));
	let reply = endpoint.expect(&format!("channels.{}", tag)).await;
	let signed = reply["signed_tx"].as_str().expect("signed create tx").to_owned();

	endpoint.info(match role {
		Role::Initiator => "funding_signed",
		Role::Responder => "funding_created",
	});
	endpoint.notify(
		"channels.on_chain_tx",
		json!({ "tx": signed, "info": "funding", "type": "channel_create_tx" }),
	);
	endpoint.info("own_funding_locked");
	endpoint.info("funding_locked");
	endpoint.info_with("open", json!({ "channel_id": channel_id }));
}

/// How a co-signed round ended, as scripted by the node.
#[derive(Debug, PartialEq)]
pub enum RoundEnd {
	/// Both parties signed; the state advanced to `state` at `round`.
	Accepted { state: String },
	/// A signer refused; `error_code` carries its abort code, if any.
	Rejected { error_code: Option<i64> },
}

/// Drive one co-signed round: read the opening request from `initiator`,
/// collect both signatures and either broadcast the new state or forward
/// the rejection.
pub async fn drive_round(
	initiator: &mut NodeEndpoint,
	responder: &mut NodeEndpoint,
	request_method: &str,
	sign_tag: &str,
	ack_tag: &str,
	updates: impl FnOnce(&Value) -> Value,
	round: u64,
) -> RoundEnd {
	let request = initiator.expect(request_method).await;
	let updates = updates(&request);
	let round_tx = format!("tx_round_{}", round);

	initiator.notify(
		&format!("channels.sign.{}", sign_tag),
		json!({ "tx": round_tx, "updates": updates }),
	);
	let (_, method, params) = initiator.next().await;
	if method == "channels.error" {
		let error_code = params["error"].as_i64();
		initiator.notify("channels.conflict", json!({ "round": round, "error_code": error_code }));
		return RoundEnd::Rejected { error_code }
	}
	assert_eq!(method, format!("channels.{}", sign_tag));
	let half_signed = params["signed_tx"].as_str().expect("half-signed tx").to_owned();

	responder.notify(
		&format!("channels.sign.{}", ack_tag),
		json!({ "tx": half_signed, "updates": updates }),
	);
	let (_, method, params) = responder.next().await;
	if method == "channels.error" {
		let error_code = params["error"].as_i64();
		initiator.notify("channels.conflict", json!({ "round": round, "error_code": error_code }));
		return RoundEnd::Rejected { error_code }
	}
	assert_eq!(method, format!("channels.{}", ack_tag));
	let state = params["signed_tx"].as_str().expect("co-signed tx").to_owned();

	let broadcast = json!({ "state": state, "round": round });
	initiator.notify("channels.update", broadcast.clone());
	responder.notify("channels.update", broadcast);
	RoundEnd::Accepted { state }
}
