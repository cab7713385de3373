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

//! Correlated JSON-RPC session on top of a [`Transport`].
//!
//! Outbound requests get monotonic string ids and a waiter that resolves
//! when the matching response arrives. Frames without an id are
//! server-originated notifications and are forwarded, in arrival order, to
//! the single notification stream handed out at session start.

use crate::{
	error::{Error, Result},
	frame::{ErrorObject, InboundFrame, Notification, OutboundFrame},
	transport::Transport,
};

use futures::{
	channel::{mpsc, oneshot},
	lock::Mutex,
	StreamExt,
};
use serde_json::Value;
use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
	time::Duration,
};

/// Correlated request/response session with the channel FSM service.
///
/// Cloning `RpcSession` is a cheap operation that only clones internal
/// references. All clones share one transport and one id sequence.
#[derive(Clone)]
pub struct RpcSession {
	to_io: mpsc::UnboundedSender<String>,
	pending: Arc<Mutex<PendingRequests>>,
	next_id: Arc<AtomicU64>,
	ttl: Duration,
}

/// Waiters of in-flight requests plus the error memory used on teardown.
#[derive(Default)]
struct PendingRequests {
	waiters: HashMap<String, oneshot::Sender<Result<Value>>>,
	last_node_error: Option<ErrorObject>,
	closed: bool,
}

impl PendingRequests {
	fn disconnected(&self) -> Error {
		Error::Disconnected { last_node_error: self.last_node_error.clone() }
	}
}

impl RpcSession {
	/// Start a session over the given transport.
	///
	/// Spawns the IO task that owns the transport and returns the session
	/// handle together with the inbound notification stream. The stream
	/// ends when the session is torn down.
	pub fn new<T: Transport>(
		transport: T,
		ttl: Duration,
	) -> (Self, mpsc::UnboundedReceiver<Notification>) {
		let (to_io, from_session) = mpsc::unbounded();
		let (notifications_tx, notifications_rx) = mpsc::unbounded();
		let pending = Arc::new(Mutex::new(PendingRequests::default()));
		tokio::spawn(io_loop(transport, from_session, notifications_tx, pending.clone()));

		let session = RpcSession { to_io, pending, next_id: Arc::new(AtomicU64::new(1)), ttl };
		(session, notifications_rx)
	}

	/// Send a request and wait for the matching response.
	///
	/// The wait is bound by the session TTL; an expired request resolves
	/// with [`Error::Timeout`] and its late response, if any, is dropped.
	pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
		let (waiter, response) = oneshot::channel();
		{
			let mut pending = self.pending.lock().await;
			if pending.closed {
				return Err(pending.disconnected())
			}
			pending.waiters.insert(id.clone(), waiter);
		}

		let frame = serde_json::to_string(&OutboundFrame::request(id.clone(), method, params))?;
		if self.to_io.unbounded_send(frame).is_err() {
			let mut pending = self.pending.lock().await;
			pending.waiters.remove(&id);
			return Err(pending.disconnected())
		}
		log::trace!(target: "channel", "Sent request {} ({}) to channel node", id, method);

		match tokio::time::timeout(self.ttl, response).await {
			Ok(Ok(response)) => response,
			// the IO task never drops a waiter without an answer, so a
			// cancellation means the session ended before teardown ran
			Ok(Err(_)) => Err(self.pending.lock().await.disconnected()),
			Err(_) => {
				self.pending.lock().await.waiters.remove(&id);
				Err(Error::Timeout(method.into()))
			},
		}
	}

	/// Send a fire-and-forget notification frame.
	pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
		let frame = serde_json::to_string(&OutboundFrame::notification(method, params))?;
		if self.to_io.unbounded_send(frame).is_err() {
			return Err(self.pending.lock().await.disconnected())
		}
		log::trace!(target: "channel", "Sent notification {} to channel node", method);
		Ok(())
	}

	/// Tear the session down.
	///
	/// The IO task closes the transport and rejects every outstanding
	/// waiter with [`Error::Disconnected`].
	pub fn close(&self) {
		self.to_io.close_channel();
	}
}

enum IoTurn {
	Inbound(Option<Result<String>>),
	Outbound(Option<String>),
}

/// Single owner of the transport: serializes outbound frames, routes
/// inbound ones, and runs session teardown when either side goes away.
async fn io_loop<T: Transport>(
	mut transport: T,
	mut outbound: mpsc::UnboundedReceiver<String>,
	notifications: mpsc::UnboundedSender<Notification>,
	pending: Arc<Mutex<PendingRequests>>,
) {
	loop {
		let turn = tokio::select! {
			inbound = transport.next_frame() => IoTurn::Inbound(inbound),
			frame = outbound.next() => IoTurn::Outbound(frame),
		};
		match turn {
			IoTurn::Inbound(Some(Ok(raw))) => route_inbound(&raw, &notifications, &pending).await,
			IoTurn::Inbound(Some(Err(error))) => {
				log::error!(target: "channel", "Channel node connection error: {:?}", error);
				break
			},
			IoTurn::Inbound(None) => {
				log::debug!(target: "channel", "Channel node has closed the connection");
				break
			},
			IoTurn::Outbound(Some(frame)) => {
				if let Err(error) = transport.send(frame).await {
					log::error!(target: "channel", "Failed to send frame to channel node: {:?}", error);
					break
				}
			},
			IoTurn::Outbound(None) => {
				let _ = transport.close().await;
				break
			},
		}
	}

	let mut pending = pending.lock().await;
	pending.closed = true;
	let last_node_error = pending.last_node_error.clone();
	for (_, waiter) in pending.waiters.drain() {
		let _ = waiter
			.send(Err(Error::Disconnected { last_node_error: last_node_error.clone() }));
	}
	// dropping `notifications` ends the stream on the consumer side
}

async fn route_inbound(
	raw: &str,
	notifications: &mpsc::UnboundedSender<Notification>,
	pending: &Arc<Mutex<PendingRequests>>,
) {
	let frame: InboundFrame = match serde_json::from_str(raw) {
		Ok(frame) => frame,
		Err(error) => {
			log::error!(
				target: "channel",
				"Failed to parse frame from channel node: {:?}: {}",
				error,
				raw,
			);
			return
		},
	};

	match frame {
		InboundFrame { id: Some(id), error, result, .. } => {
			let mut pending = pending.lock().await;
			if let Some(error) = &error {
				pending.last_node_error = Some(error.clone());
			}
			match pending.waiters.remove(&id) {
				Some(waiter) => {
					let response = match error {
						Some(error) => Err(Error::Node(error)),
						None => Ok(result.unwrap_or(Value::Null)),
					};
					let _ = waiter.send(response);
				},
				None => log::trace!(
					target: "channel",
					"Dropping response to unknown request {} from channel node",
					id,
				),
			}
		},
		InboundFrame { id: None, method: Some(method), params, .. } =>
			if notifications
				.unbounded_send(Notification { method, params: params.unwrap_or(Value::Null) })
				.is_err()
			{
				log::trace!(target: "channel", "Notification consumer is gone");
			},
		InboundFrame { id: None, method: None, error: Some(error), .. } => {
			// uncorrelated error frame: remember it for teardown and
			// surface it the same way the node surfaces protocol errors
			pending.lock().await.last_node_error = Some(error.clone());
			let params = serde_json::to_value(&error).unwrap_or(Value::Null);
			let _ = notifications
				.unbounded_send(Notification { method: "channels.error".into(), params });
		},
		_ => log::trace!(target: "channel", "Ignoring malformed frame from channel node: {}", raw),
	}
}
