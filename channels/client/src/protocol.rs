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

//! Channel FSM wire protocol: method names, sign tags and the typed view
//! of server-originated notifications.

use crate::{
	error::{ChannelError, Result},
	update::Update,
};

use channel_rpc_client::{ErrorObject, Notification};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Method names of the channel FSM dialect.
pub(crate) mod methods {
	/// Start an off-chain transfer round.
	pub const UPDATE_NEW: &str = "channels.update.new";
	/// Start a deposit round.
	pub const DEPOSIT: &str = "channels.deposit";
	/// Start a withdrawal round.
	pub const WITHDRAW: &str = "channels.withdraw";
	/// Start a round instantiating a contract.
	pub const UPDATE_NEW_CONTRACT: &str = "channels.update.new_contract";
	/// Start a round calling a contract.
	pub const UPDATE_CALL_CONTRACT: &str = "channels.update.call_contract";
	/// Request a forced contract-call progress transaction.
	pub const FORCE_PROGRESS: &str = "channels.force_progress";
	/// Start a cooperative mutual close.
	pub const SHUTDOWN: &str = "channels.shutdown";
	/// Release the session, keeping channel state on the node.
	pub const LEAVE: &str = "channels.leave";
	/// Resume a previously left FSM session.
	pub const REESTABLISH: &str = "channels.reestablish";
	/// Generic message to the counterparty; also the inbound broadcast.
	pub const MESSAGE: &str = "channels.message";
	/// Abort code from the signer; also the inbound node error report.
	pub const ERROR: &str = "channels.error";
	/// Query channel account balances.
	pub const GET_BALANCES: &str = "channels.get.balances";
	/// Query the proof of inclusion.
	pub const GET_POI: &str = "channels.get.poi";
	/// Query the latest co-signed off-chain state.
	pub const GET_OFFCHAIN_STATE: &str = "channels.get.offchain_state";
	/// Query the result of a past contract call.
	pub const GET_CONTRACT_CALL: &str = "channels.get.contract_call";
	/// Query the full state of a channel contract.
	pub const GET_CONTRACT: &str = "channels.get.contract";
	/// Execute a contract call against the current state, off-round.
	pub const DRY_RUN_CALL_CONTRACT: &str = "channels.dry_run.call_contract";
	/// Drop stored contract call results.
	pub const CLEAN_CONTRACT_CALLS: &str = "channels.clean_contract_calls";
	/// Prefix of node-originated sign requests.
	pub const SIGN_PREFIX: &str = "channels.sign.";
	/// FSM progress reports.
	pub const INFO: &str = "channels.info";
	/// New co-signed off-chain state broadcast.
	pub const UPDATE: &str = "channels.update";
	/// An on-chain transaction the channel has spawned or observed.
	pub const ON_CHAIN_TX: &str = "channels.on_chain_tx";
	/// Round rejected by the counterparty; state stays as it was.
	pub const CONFLICT: &str = "channels.conflict";
}

/// Reason the node asks for a signature, as carried in the method name of
/// `channels.sign.*` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignTag {
	/// Initiator's signature over the create transaction.
	InitiatorSign,
	/// Responder's signature over the create transaction.
	ResponderSign,
	/// Our own off-chain update, any kind.
	Update,
	/// Counterparty's off-chain update offered for co-signing.
	UpdateAck,
	/// Our own deposit transaction.
	DepositTx,
	/// Counterparty's deposit offered for co-signing.
	DepositAck,
	/// Our own withdrawal transaction.
	WithdrawTx,
	/// Counterparty's withdrawal offered for co-signing.
	WithdrawAck,
	/// Our own mutual-close transaction.
	ShutdownSign,
	/// Counterparty's mutual-close transaction offered for co-signing.
	ShutdownSignAck,
	/// Our own force-progress transaction.
	ForceProgressTx,
}

impl SignTag {
	/// Wire name of the tag.
	pub fn as_str(&self) -> &'static str {
		match self {
			SignTag::InitiatorSign => "initiator_sign",
			SignTag::ResponderSign => "responder_sign",
			SignTag::Update => "update",
			SignTag::UpdateAck => "update_ack",
			SignTag::DepositTx => "deposit_tx",
			SignTag::DepositAck => "deposit_ack",
			SignTag::WithdrawTx => "withdraw_tx",
			SignTag::WithdrawAck => "withdraw_ack",
			SignTag::ShutdownSign => "shutdown_sign",
			SignTag::ShutdownSignAck => "shutdown_sign_ack",
			SignTag::ForceProgressTx => "force_progress_tx",
		}
	}

	pub(crate) fn from_wire(tag: &str) -> Option<SignTag> {
		Some(match tag {
			"initiator_sign" => SignTag::InitiatorSign,
			"responder_sign" => SignTag::ResponderSign,
			"update" => SignTag::Update,
			"update_ack" => SignTag::UpdateAck,
			"deposit_tx" => SignTag::DepositTx,
			"deposit_ack" => SignTag::DepositAck,
			"withdraw_tx" => SignTag::WithdrawTx,
			"withdraw_ack" => SignTag::WithdrawAck,
			"shutdown_sign" => SignTag::ShutdownSign,
			"shutdown_sign_ack" => SignTag::ShutdownSignAck,
			"force_progress_tx" => SignTag::ForceProgressTx,
			_ => return None,
		})
	}

	/// Returns `true` if the request belongs to an action this side has
	/// deliberately initiated, which is answered by the untagged signer.
	/// Everything else is node-initiated and goes to the tagged signer.
	pub(crate) fn belongs_to_local_action(&self) -> bool {
		matches!(
			self,
			SignTag::Update |
				SignTag::DepositTx |
				SignTag::WithdrawTx |
				SignTag::ShutdownSign |
				SignTag::ForceProgressTx,
		)
	}

	/// Method under which the signed transaction is returned to the node.
	pub(crate) fn reply_method(&self) -> String {
		format!("channels.{}", self.as_str())
	}
}

impl fmt::Display for SignTag {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// FSM progress event, the `event` field of `channels.info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InfoEvent {
	FsmUp,
	ChannelOpen,
	FundingCreated,
	FundingSigned,
	OwnFundingLocked,
	FundingLocked,
	Open,
	DepositCreated,
	OwnDepositLocked,
	DepositLocked,
	WithdrawCreated,
	OwnWithdrawLocked,
	WithdrawLocked,
	Leave,
	Closing,
	ClosedConfirmed,
	Died,
	PeerDisconnected,
	ChannelReestablished,
	AbortedUpdate,
	SoloClosing,
	CanSlash,
	Settled,
	/// Event this client has no transition for.
	Other(String),
}

impl InfoEvent {
	fn from_wire(event: &str) -> InfoEvent {
		match event {
			"fsm_up" => InfoEvent::FsmUp,
			"channel_open" => InfoEvent::ChannelOpen,
			"funding_created" => InfoEvent::FundingCreated,
			"funding_signed" => InfoEvent::FundingSigned,
			"own_funding_locked" => InfoEvent::OwnFundingLocked,
			"funding_locked" => InfoEvent::FundingLocked,
			"open" => InfoEvent::Open,
			"deposit_created" => InfoEvent::DepositCreated,
			"own_deposit_locked" => InfoEvent::OwnDepositLocked,
			"deposit_locked" => InfoEvent::DepositLocked,
			"withdraw_created" => InfoEvent::WithdrawCreated,
			"own_withdraw_locked" => InfoEvent::OwnWithdrawLocked,
			"withdraw_locked" => InfoEvent::WithdrawLocked,
			"leave" => InfoEvent::Leave,
			"closing" => InfoEvent::Closing,
			"closed_confirmed" => InfoEvent::ClosedConfirmed,
			"died" => InfoEvent::Died,
			"peer_disconnected" => InfoEvent::PeerDisconnected,
			"channel_reestablished" => InfoEvent::ChannelReestablished,
			"aborted_update" => InfoEvent::AbortedUpdate,
			"solo_closing" => InfoEvent::SoloClosing,
			"can_slash" => InfoEvent::CanSlash,
			"settled" => InfoEvent::Settled,
			other => InfoEvent::Other(other.into()),
		}
	}
}

/// Deserialized chat message, broadcast on the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
	/// Channel the message belongs to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub channel_id: Option<String>,
	/// Sending account.
	pub from: String,
	/// Receiving account.
	pub to: String,
	/// Uninterpreted message payload.
	pub info: String,
}

/// Typed view of one server-originated notification.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeMessage {
	/// `channels.info`: FSM progress report. `data` keeps the raw params
	/// for events that carry extra fields (`fsm_id`, `channel_id`, ...).
	Info { event: InfoEvent, data: Value },
	/// `channels.sign.<tag>`: the node asks for a signature.
	Sign { tag: SignTag, tx: String, updates: Vec<Update> },
	/// `channels.update`: new co-signed off-chain state.
	StateUpdate { state: String, round: Option<u64> },
	/// `channels.conflict`: the counterparty did not co-sign.
	Conflict { round: Option<u64>, error_code: Option<i64> },
	/// `channels.on_chain_tx`: transaction the channel spawned on chain.
	OnChainTx { tx: String, info: Option<String>, tx_type: Option<String>, tx_hash: Option<String> },
	/// `channels.leave`: node released the session and reports the last
	/// off-chain state.
	LeaveAck { channel_id: Option<String>, state: Option<String> },
	/// `channels.message`: counterparty chat message.
	Message(ChannelMessage),
	/// `channels.error`: node error report.
	NodeError(ErrorObject),
	/// Anything this client cannot map to a legal transition.
	Unknown { method: String, params: Value },
}

impl NodeMessage {
	/// Interpret a raw notification.
	///
	/// Unknown methods parse into [`NodeMessage::Unknown`]; a known method
	/// with malformed parameters is an error the FSM reports as an
	/// incoming-message failure.
	pub(crate) fn parse(notification: Notification) -> Result<NodeMessage> {
		let Notification { method, params } = notification;
		match method.as_str() {
			methods::INFO => {
				let event = params
					.get("event")
					.and_then(Value::as_str)
					.ok_or_else(|| malformed(&method, &params))?;
				Ok(NodeMessage::Info { event: InfoEvent::from_wire(event), data: params })
			},
			methods::UPDATE => {
				let state = params
					.get("state")
					.and_then(Value::as_str)
					.ok_or_else(|| malformed(&method, &params))?;
				let round = params.get("round").and_then(Value::as_u64);
				Ok(NodeMessage::StateUpdate { state: state.into(), round })
			},
			methods::CONFLICT => Ok(NodeMessage::Conflict {
				round: params.get("round").and_then(Value::as_u64),
				error_code: params.get("error_code").and_then(Value::as_i64),
			}),
			methods::ON_CHAIN_TX => {
				let tx = params
					.get("tx")
					.and_then(Value::as_str)
					.ok_or_else(|| malformed(&method, &params))?;
				Ok(NodeMessage::OnChainTx {
					tx: tx.into(),
					info: params.get("info").and_then(Value::as_str).map(Into::into),
					tx_type: params.get("type").and_then(Value::as_str).map(Into::into),
					tx_hash: params.get("tx_hash").and_then(Value::as_str).map(Into::into),
				})
			},
			methods::LEAVE => Ok(NodeMessage::LeaveAck {
				channel_id: params.get("channel_id").and_then(Value::as_str).map(Into::into),
				state: params.get("state").and_then(Value::as_str).map(Into::into),
			}),
			methods::MESSAGE => {
				let message = params.get("message").cloned().unwrap_or(params.clone());
				let message: ChannelMessage = serde_json::from_value(message)
					.map_err(|_| malformed(&method, &params))?;
				Ok(NodeMessage::Message(message))
			},
			methods::ERROR => {
				let error: ErrorObject = serde_json::from_value(params.clone())
					.map_err(|_| malformed(&method, &params))?;
				Ok(NodeMessage::NodeError(error))
			},
			_ if method.starts_with(methods::SIGN_PREFIX) => {
				let tag = &method[methods::SIGN_PREFIX.len()..];
				let tag = match SignTag::from_wire(tag) {
					Some(tag) => tag,
					None => return Ok(NodeMessage::Unknown { method, params }),
				};
				let tx = params
					.get("tx")
					.and_then(Value::as_str)
					.ok_or_else(|| malformed(&method, &params))?;
				let updates = match params.get("updates") {
					Some(updates) => serde_json::from_value(updates.clone())
						.map_err(|_| malformed(&method, &params))?,
					None => Vec::new(),
				};
				Ok(NodeMessage::Sign { tag, tx: tx.into(), updates })
			},
			_ => Ok(NodeMessage::Unknown { method, params }),
		}
	}
}

fn malformed(method: &str, params: &Value) -> ChannelError {
	ChannelError::IncomingMessage {
		message: serde_json::json!({ "method": method, "params": params }),
		handler: Box::new(ChannelError::UnknownChannelState {
			detail: format!("malformed {} parameters", method),
		}),
	}
}
