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

//! The channel state machine worker.
//!
//! One worker task per channel owns the node session and is the only
//! writer of the channel snapshot. It is driven by two merged streams:
//! notifications from the node and commands from the caller. Caller
//! actions are served FIFO, one in flight at a time; notifications are
//! drained as they arrive and may advance the state while an action is
//! pending.

use crate::{
	action::{ActionKind, ActionOutcome, LockedEvent, PendingAction},
	encoding::contract_address,
	error::ChannelError,
	event::{ChannelEvent, EventBus},
	params::ChannelOptions,
	protocol::{methods, InfoEvent, NodeMessage, SignTag},
	sign::{SignBroker, SignMeta, SignResponse},
	state::{ChannelStatus, FsmState},
	update::Update,
};

use channel_rpc_client::{ErrorObject, Notification, RpcSession};
use futures::{channel::mpsc, future, stream, StreamExt};
use serde_json::{json, Value};
use std::{
	collections::VecDeque,
	sync::{Arc, Mutex, MutexGuard},
};

/// Commands the channel handle sends to its worker.
pub(crate) enum Command {
	/// Queue a caller action.
	Submit(PendingAction),
	/// Tear the session down.
	Disconnect,
}

/// Mutable channel state shared with the handle.
///
/// `round`, `channel_id`, `fsm_id` and `last_signed_tx` always describe
/// the same off-chain position; only the worker writes them, and always
/// under one lock acquisition.
#[derive(Debug)]
pub(crate) struct Snapshot {
	pub(crate) status: ChannelStatus,
	pub(crate) round: Option<u64>,
	pub(crate) channel_id: Option<String>,
	pub(crate) fsm_id: Option<String>,
	pub(crate) last_signed_tx: Option<String>,
}

impl Default for Snapshot {
	fn default() -> Self {
		Snapshot {
			status: ChannelStatus::Connecting,
			round: None,
			channel_id: None,
			fsm_id: None,
			last_signed_tx: None,
		}
	}
}

/// Lock a shared structure, surviving a poisoned lock: the worker never
/// leaves the snapshot in a torn state, so the data is usable either way.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Input {
	Node(Notification),
	NodeGone,
	Caller(Command),
	CallersGone,
}

pub(crate) struct FsmWorker {
	session: RpcSession,
	options: ChannelOptions,
	broker: SignBroker,
	snapshot: Arc<Mutex<Snapshot>>,
	bus: Arc<Mutex<EventBus>>,
	state: FsmState,
	queue: VecDeque<PendingAction>,
	current: Option<PendingAction>,
}

impl FsmWorker {
	pub(crate) fn new(
		session: RpcSession,
		options: ChannelOptions,
		broker: SignBroker,
		snapshot: Arc<Mutex<Snapshot>>,
		bus: Arc<Mutex<EventBus>>,
	) -> Self {
		FsmWorker {
			session,
			options,
			broker,
			snapshot,
			bus,
			state: FsmState::Connecting,
			queue: VecDeque::new(),
			current: None,
		}
	}

	/// Drive the channel until the session or the last handle goes away.
	pub(crate) async fn run(
		mut self,
		notifications: mpsc::UnboundedReceiver<Notification>,
		commands: mpsc::UnboundedReceiver<Command>,
	) {
		if self.options.is_reestablish() {
			self.start_reestablish().await;
		}

		let node = notifications
			.map(Input::Node)
			.chain(stream::once(future::ready(Input::NodeGone)));
		let caller = commands
			.map(Input::Caller)
			.chain(stream::once(future::ready(Input::CallersGone)));
		let mut inputs = stream::select(node, caller);

		while let Some(input) = inputs.next().await {
			match input {
				Input::Node(notification) => self.on_notification(notification).await,
				Input::NodeGone => {
					self.on_transport_lost();
					break
				},
				Input::Caller(Command::Submit(action)) => self.on_submit(action),
				Input::Caller(Command::Disconnect) | Input::CallersGone => {
					self.on_caller_disconnect();
					break
				},
			}
			self.maybe_start_action().await;
		}
	}

	async fn start_reestablish(&mut self) {
		// resuming a left channel: the identifiers are known up front and
		// neither signer surface is invoked
		{
			let mut snapshot = lock(&self.snapshot);
			snapshot.fsm_id = self.options.existing_fsm_id.clone();
			snapshot.channel_id = self.options.existing_channel_id.clone();
			snapshot.last_signed_tx = self.options.offchain_tx.clone();
		}
		let params = json!({
			"existing_channel_id": self.options.existing_channel_id,
			"existing_fsm_id": self.options.existing_fsm_id,
			"offchain_tx": self.options.offchain_tx,
		});
		match self.session.notify(methods::REESTABLISH, params).await {
			Ok(()) => self.set_state(FsmState::AwaitingReestablish),
			Err(error) => {
				log::error!(target: "channel", "Failed to request reestablish: {:?}", error);
				self.set_state(FsmState::Disconnected);
			},
		}
	}

	async fn on_notification(&mut self, notification: Notification) {
		match NodeMessage::parse(notification) {
			Ok(message) => self.on_message(message).await,
			Err(error) => {
				log::error!(
					target: "channel",
					"Failed to interpret message from channel node: {:?}",
					error,
				);
				self.emit(ChannelEvent::Error(Arc::new(error)));
			},
		}
	}

	async fn on_message(&mut self, message: NodeMessage) {
		match message {
			NodeMessage::Info { event, data } => self.on_info(event, data),
			NodeMessage::Sign { tag, tx, updates } => self.on_sign_request(tag, tx, updates).await,
			NodeMessage::StateUpdate { state, round } => self.on_state_update(state, round),
			NodeMessage::Conflict { round: _, error_code } => self.on_conflict(error_code),
			NodeMessage::OnChainTx { tx, info, tx_type, tx_hash } =>
				self.on_chain_tx(tx, info, tx_type, tx_hash),
			NodeMessage::LeaveAck { channel_id, state } => self.on_leave_ack(channel_id, state),
			NodeMessage::Message(message) => self.emit(ChannelEvent::Message(message)),
			NodeMessage::NodeError(error) => self.on_node_error(error),
			NodeMessage::Unknown { method, params } => {
				log::warn!(
					target: "channel",
					"Channel FSM received a message it has no transition for: {}",
					method,
				);
				self.emit(ChannelEvent::Error(Arc::new(ChannelError::UnknownChannelState {
					detail: format!("{} {}", method, params),
				})));
			},
		}
	}

	fn on_info(&mut self, event: InfoEvent, data: Value) {
		log::trace!(target: "channel", "Channel FSM reported {:?}", event);
		match event {
			InfoEvent::FsmUp => {
				let fsm_id = data.get("fsm_id").and_then(Value::as_str).map(str::to_owned);
				lock(&self.snapshot).fsm_id = fsm_id;
			},
			// the node announces the handshake; the sign request follows
			InfoEvent::ChannelOpen => (),
			InfoEvent::FundingCreated | InfoEvent::FundingSigned =>
				self.set_state(FsmState::Signed),
			InfoEvent::OwnFundingLocked | InfoEvent::FundingLocked => (),
			InfoEvent::Open => {
				{
					let mut snapshot = lock(&self.snapshot);
					if let Some(channel_id) = data.get("channel_id").and_then(Value::as_str) {
						snapshot.channel_id = Some(channel_id.to_owned());
					}
					snapshot.round = Some(1);
				}
				self.set_state(FsmState::Open);
			},
			InfoEvent::DepositCreated | InfoEvent::WithdrawCreated => (),
			InfoEvent::OwnDepositLocked => self.fire_locked(LockedEvent::OwnDeposit),
			InfoEvent::DepositLocked => self.fire_locked(LockedEvent::Deposit),
			InfoEvent::OwnWithdrawLocked => self.fire_locked(LockedEvent::OwnWithdraw),
			InfoEvent::WithdrawLocked => self.fire_locked(LockedEvent::Withdraw),
			InfoEvent::Leave => (),
			InfoEvent::Closing | InfoEvent::SoloClosing => self.set_state(FsmState::Closing),
			InfoEvent::ClosedConfirmed | InfoEvent::Settled => self.set_state(FsmState::Closed),
			InfoEvent::Died => {
				self.set_state(FsmState::Died);
				self.fail_all(|| ChannelError::Connection("channel FSM died".into()));
			},
			InfoEvent::PeerDisconnected => self.emit(ChannelEvent::PeerDisconnected),
			InfoEvent::ChannelReestablished => {
				if let Some(channel_id) = data.get("channel_id").and_then(Value::as_str) {
					lock(&self.snapshot).channel_id = Some(channel_id.to_owned());
				}
				// round stays unknown until the next co-signed advance,
				// unless the node follows up with a state report
				self.set_state(FsmState::Open);
			},
			InfoEvent::AbortedUpdate => {
				if let Some(action) = self.current.take() {
					self.restore_open();
					action.complete(Ok(ActionOutcome::rejected()));
				} else {
					self.emit(ChannelEvent::AbortedUpdate);
				}
			},
			InfoEvent::CanSlash => self.emit(ChannelEvent::CanSlash),
			InfoEvent::Other(event) => {
				log::warn!(target: "channel", "Unknown channel FSM event: {}", event);
				self.emit(ChannelEvent::Error(Arc::new(ChannelError::UnknownChannelState {
					detail: format!("info event {}", event),
				})));
			},
		}
	}

	async fn on_sign_request(&mut self, tag: SignTag, tx: String, updates: Vec<Update>) {
		let meta = SignMeta { updates };
		let response = if tag.belongs_to_local_action() {
			self.broker.sign(&tx, &meta).await
		} else {
			self.broker.sign_tagged(tag, &tx, &meta).await
		};

		match response {
			SignResponse::Signed(signed_tx) => {
				let reply = self
					.session
					.notify(&tag.reply_method(), json!({ "signed_tx": signed_tx }))
					.await;
				if let Err(error) = reply {
					if tag.belongs_to_local_action() {
						if let Some(action) = self.current.take() {
							action.complete(Err(error.into()));
						}
					} else {
						log::error!(
							target: "channel",
							"Failed to return {} signature to channel node: {:?}",
							tag,
							error,
						);
					}
					return
				}
				if matches!(tag, SignTag::InitiatorSign | SignTag::ResponderSign) {
					self.set_state(FsmState::HalfSigned);
				}
			},
			SignResponse::Abort(code) => {
				let _ = self.session.notify(methods::ERROR, json!({ "error": code })).await;
				self.abort_local_action(tag, ActionOutcome::aborted(code));
			},
			SignResponse::Rejected => {
				let _ = self.session.notify(methods::ERROR, json!({})).await;
				self.abort_local_action(tag, ActionOutcome::rejected());
			},
		}
	}

	/// A signer abort terminates the local action right away, without
	/// touching round or state.
	fn abort_local_action(&mut self, tag: SignTag, outcome: ActionOutcome) {
		if !tag.belongs_to_local_action() {
			// the ack side has nothing pending; the initiator learns about
			// the rejection from the node
			return
		}
		if let Some(action) = self.current.take() {
			self.restore_open();
			action.complete(Ok(outcome));
		}
	}

	fn on_state_update(&mut self, state: String, round: Option<u64>) {
		let new_round = {
			let mut snapshot = lock(&self.snapshot);
			let new_round = round.or_else(|| snapshot.round.map(|round| round + 1));
			snapshot.round = new_round;
			snapshot.last_signed_tx = Some(state.clone());
			new_round
		};
		log::debug!(target: "channel", "Channel advanced to co-signed round {:?}", new_round);
		self.emit(ChannelEvent::StateChanged(state.clone()));

		if matches!(
			self.state,
			FsmState::AwaitingUpdate | FsmState::AwaitingDeposit | FsmState::AwaitingWithdraw,
		) {
			let action = self.current.take();
			self.set_state(FsmState::Open);
			if let Some(action) = action {
				let mut outcome = ActionOutcome::accepted(state);
				if let ActionKind::NewContract(_) = &action.kind {
					outcome.address = new_round
						.and_then(|round| contract_address(self.options.own_id(), round).ok());
				}
				action.complete(Ok(outcome));
			}
		}
	}

	fn on_conflict(&mut self, error_code: Option<i64>) {
		if let Some(action) = self.current.take() {
			self.restore_open();
			let outcome = match error_code {
				Some(code) => ActionOutcome::aborted(code),
				None => ActionOutcome::rejected(),
			};
			action.complete(Ok(outcome));
		} else {
			self.emit(ChannelEvent::AbortedUpdate);
		}
	}

	fn on_chain_tx(
		&mut self,
		tx: String,
		info: Option<String>,
		_tx_type: Option<String>,
		tx_hash: Option<String>,
	) {
		if let Some(action) = self.current.as_mut() {
			if let Some(callback) = action.callbacks.on_on_chain_tx.as_mut() {
				callback(&tx);
			}
		}
		self.emit(ChannelEvent::OnChainTx { tx: tx.clone(), info });

		match self.state {
			FsmState::Signed | FsmState::AwaitingOnChainTx =>
				self.set_state(FsmState::AwaitingOnChainConfirmation),
			FsmState::AwaitingUpdate
				if matches!(
					self.current.as_ref().map(|action| &action.kind),
					Some(ActionKind::ForceProgress(_)),
				) =>
			{
				// the forced transaction is returned to the caller, who is
				// responsible for posting it; the round only advances once
				// the node reports the resulting state
				let action = self.current.take();
				self.set_state(FsmState::Open);
				if let Some(action) = action {
					let mut outcome = ActionOutcome::accepted(tx);
					outcome.tx_hash = tx_hash;
					action.complete(Ok(outcome));
				}
			},
			FsmState::AwaitingShutdownAck => {
				let action = self.current.take();
				self.set_state(FsmState::Closing);
				if let Some(action) = action {
					action.complete(Ok(ActionOutcome::accepted(tx)));
				}
			},
			_ => (),
		}
	}

	fn on_leave_ack(&mut self, channel_id: Option<String>, state: Option<String>) {
		{
			let mut snapshot = lock(&self.snapshot);
			if let Some(channel_id) = &channel_id {
				snapshot.channel_id = Some(channel_id.clone());
			}
			if let Some(state) = &state {
				snapshot.last_signed_tx = Some(state.clone());
			}
		}
		if let Some(action) = self.current.take() {
			let outcome = ActionOutcome {
				accepted: true,
				signed_tx: state,
				channel_id,
				..Default::default()
			};
			action.complete(Ok(outcome));
		}
		// the node drops the session next; transport loss moves the
		// channel to disconnected
	}

	fn on_node_error(&mut self, error: ErrorObject) {
		let raw = serde_json::to_value(&error).unwrap_or(Value::Null);

		if self.state == FsmState::AwaitingReestablish {
			// the node reports no such FSM: nothing to resume
			self.set_state(FsmState::Died);
			let error = ChannelError::UnknownChannelState {
				detail: format!("reestablish rejected: {}", raw),
			};
			self.emit(ChannelEvent::Error(Arc::new(error)));
			self.fail_all(|| ChannelError::Connection("channel FSM died".into()));
			return
		}

		let incoming = |raw: &Value, error: &ErrorObject| ChannelError::IncomingMessage {
			message: raw.clone(),
			handler: Box::new(ChannelError::classify_node_error(error.clone())),
		};
		self.emit(ChannelEvent::Error(Arc::new(incoming(&raw, &error))));
		if let Some(action) = self.current.take() {
			self.restore_open();
			action.complete(Err(incoming(&raw, &error)));
		}
	}

	fn on_submit(&mut self, action: PendingAction) {
		if self.state.is_terminal() || self.state == FsmState::Disconnected {
			action.complete(Err(ChannelError::Connection(format!(
				"channel is {}",
				self.state.status(),
			))));
			return
		}
		log::trace!(target: "channel", "Queued {} action", action.kind.name());
		self.queue.push_back(action);
	}

	async fn maybe_start_action(&mut self) {
		if self.current.is_some() || self.state != FsmState::Open {
			return
		}
		let action = match self.queue.pop_front() {
			Some(action) => action,
			None => return,
		};
		let (method, params) = action.kind.request();
		log::debug!(target: "channel", "Starting {} action", action.kind.name());
		match self.session.notify(method, params).await {
			Ok(()) => {
				self.set_state(action.kind.in_flight_state());
				self.current = Some(action);
			},
			Err(error) => action.complete(Err(error.into())),
		}
	}

	fn on_transport_lost(&mut self) {
		if !self.state.is_terminal() {
			self.set_state(FsmState::Disconnected);
		}
		self.fail_all(|| ChannelError::Connection("connection to channel node is lost".into()));
	}

	fn on_caller_disconnect(&mut self) {
		// an action cancelled mid-flight resolves unaccepted; partial
		// progress is discarded and the round is not incremented
		if let Some(action) = self.current.take() {
			action.complete(Ok(ActionOutcome::rejected()));
		}
		self.fail_all(|| ChannelError::Connection("channel disconnected".into()));
		if !self.state.is_terminal() {
			self.set_state(FsmState::Disconnected);
		}
		self.session.close();
	}

	fn fire_locked(&mut self, event: LockedEvent) {
		if let Some(action) = self.current.as_mut() {
			action.callbacks.fire_locked(event);
		}
	}

	/// Back to `open` after a round that did not commit.
	fn restore_open(&mut self) {
		if matches!(
			self.state,
			FsmState::AwaitingUpdate |
				FsmState::AwaitingDeposit |
				FsmState::AwaitingWithdraw |
				FsmState::AwaitingShutdownAck |
				FsmState::AwaitingLeaveAck,
		) {
			self.set_state(FsmState::Open);
		}
	}

	fn fail_all(&mut self, error: impl Fn() -> ChannelError) {
		if let Some(action) = self.current.take() {
			action.complete(Err(error()));
		}
		for action in self.queue.drain(..) {
			action.complete(Err(error()));
		}
	}

	fn set_state(&mut self, state: FsmState) {
		if self.state == state {
			return
		}
		log::trace!(target: "channel", "Channel FSM: {:?} -> {:?}", self.state, state);
		self.state = state;

		let status = state.status();
		let changed = {
			let mut snapshot = lock(&self.snapshot);
			if snapshot.status != status {
				snapshot.status = status;
				true
			} else {
				false
			}
		};
		if changed {
			log::debug!(target: "channel", "Channel status changed to {}", status);
			self.emit(ChannelEvent::StatusChanged(status));
		}
	}

	fn emit(&self, event: ChannelEvent) {
		lock(&self.bus).emit(event);
	}
}
