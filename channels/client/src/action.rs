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

//! Caller-driven channel actions.
//!
//! At most one action is in flight per channel; later submissions queue
//! and are served FIFO. An action carries its parameters, an optional
//! bundle of on-chain callbacks (whose lifetime is bounded by the action)
//! and the completion sink the surface awaits.

use crate::{
	amount::Amount,
	error::Result,
	protocol::methods,
	state::FsmState,
};

use futures::channel::oneshot;
use serde_json::{json, Value};

/// `errorMessage` attached to user-defined abort codes.
pub const USER_DEFINED_ERROR: &str = "user-defined";

/// Parameters of a contract instantiated inside the channel.
#[derive(Debug, Clone)]
pub struct NewContractParams {
	/// Compiled contract code.
	pub code: String,
	/// Encoded init call data.
	pub call_data: String,
	/// Initial contract balance, taken from the owner.
	pub deposit: Amount,
	/// Virtual machine version.
	pub vm_version: u16,
	/// Call data encoding version.
	pub abi_version: u16,
}

/// Parameters of a call to a contract living inside the channel.
#[derive(Debug, Clone)]
pub struct CallContractParams {
	/// Called contract address (`ct_`).
	pub contract: String,
	/// Call data encoding version.
	pub abi_version: u16,
	/// Amount attached to the call.
	pub amount: Amount,
	/// Encoded call data.
	pub call_data: String,
}

/// Parameters of a forced contract-call progress.
#[derive(Debug, Clone)]
pub struct ForceProgressParams {
	/// Called contract address (`ct_`).
	pub contract: String,
	/// Call data encoding version.
	pub abi_version: u16,
	/// Amount attached to the call.
	pub amount: Amount,
	/// Encoded call data.
	pub call_data: String,
	/// Gas price the call is metered with.
	pub gas_price: Amount,
	/// Gas limit of the call.
	pub gas_limit: u64,
}

/// What the caller asked the FSM to do.
#[derive(Debug, Clone)]
pub(crate) enum ActionKind {
	Transfer { from: String, to: String, amount: Amount },
	Deposit { amount: Amount },
	Withdraw { amount: Amount },
	NewContract(NewContractParams),
	CallContract(CallContractParams),
	ForceProgress(ForceProgressParams),
	Shutdown,
	Leave,
}

impl ActionKind {
	/// Request opening the round for this action.
	pub(crate) fn request(&self) -> (&'static str, Value) {
		match self {
			ActionKind::Transfer { from, to, amount } =>
				(methods::UPDATE_NEW, json!({ "from": from, "to": to, "amount": amount })),
			ActionKind::Deposit { amount } => (methods::DEPOSIT, json!({ "amount": amount })),
			ActionKind::Withdraw { amount } => (methods::WITHDRAW, json!({ "amount": amount })),
			ActionKind::NewContract(params) => (
				methods::UPDATE_NEW_CONTRACT,
				json!({
					"code": params.code,
					"call_data": params.call_data,
					"deposit": params.deposit,
					"vm_version": params.vm_version,
					"abi_version": params.abi_version,
				}),
			),
			ActionKind::CallContract(params) => (
				methods::UPDATE_CALL_CONTRACT,
				json!({
					"contract": params.contract,
					"abi_version": params.abi_version,
					"amount": params.amount,
					"call_data": params.call_data,
				}),
			),
			ActionKind::ForceProgress(params) => (
				methods::FORCE_PROGRESS,
				json!({
					"contract": params.contract,
					"abi_version": params.abi_version,
					"amount": params.amount,
					"call_data": params.call_data,
					"gas_price": params.gas_price,
					"gas": params.gas_limit,
				}),
			),
			ActionKind::Shutdown => (methods::SHUTDOWN, json!({})),
			ActionKind::Leave => (methods::LEAVE, json!({})),
		}
	}

	/// FSM state the channel sits in while this action is in flight.
	pub(crate) fn in_flight_state(&self) -> FsmState {
		match self {
			ActionKind::Transfer { .. } |
			ActionKind::NewContract(_) |
			ActionKind::CallContract(_) |
			ActionKind::ForceProgress(_) => FsmState::AwaitingUpdate,
			ActionKind::Deposit { .. } => FsmState::AwaitingDeposit,
			ActionKind::Withdraw { .. } => FsmState::AwaitingWithdraw,
			ActionKind::Shutdown => FsmState::AwaitingShutdownAck,
			ActionKind::Leave => FsmState::AwaitingLeaveAck,
		}
	}

	pub(crate) fn name(&self) -> &'static str {
		match self {
			ActionKind::Transfer { .. } => "transfer",
			ActionKind::Deposit { .. } => "deposit",
			ActionKind::Withdraw { .. } => "withdraw",
			ActionKind::NewContract(_) => "newContract",
			ActionKind::CallContract(_) => "callContract",
			ActionKind::ForceProgress(_) => "forceProgress",
			ActionKind::Shutdown => "shutdown",
			ActionKind::Leave => "leave",
		}
	}
}

/// Lock milestone of an on-chain co-signed advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockedEvent {
	OwnDeposit,
	Deposit,
	OwnWithdraw,
	Withdraw,
}

/// Callbacks fired while an on-chain co-signed advance settles.
///
/// Passed at action submission; never outlives the action.
#[derive(Default)]
pub struct OnChainCallbacks {
	/// The co-signed transaction has been observed on chain.
	pub on_on_chain_tx: Option<Box<dyn FnMut(&str) + Send>>,
	/// Our side has enough confirmations of the deposit.
	pub on_own_deposit_locked: Option<Box<dyn FnMut() + Send>>,
	/// Both sides have enough confirmations of the deposit.
	pub on_deposit_locked: Option<Box<dyn FnMut() + Send>>,
	/// Our side has enough confirmations of the withdrawal.
	pub on_own_withdraw_locked: Option<Box<dyn FnMut() + Send>>,
	/// Both sides have enough confirmations of the withdrawal.
	pub on_withdraw_locked: Option<Box<dyn FnMut() + Send>>,
}

impl OnChainCallbacks {
	pub(crate) fn fire_locked(&mut self, event: LockedEvent) {
		let callback = match event {
			LockedEvent::OwnDeposit => &mut self.on_own_deposit_locked,
			LockedEvent::Deposit => &mut self.on_deposit_locked,
			LockedEvent::OwnWithdraw => &mut self.on_own_withdraw_locked,
			LockedEvent::Withdraw => &mut self.on_withdraw_locked,
		};
		if let Some(callback) = callback.as_mut() {
			callback();
		}
	}
}

/// Terminal outcome of a channel action.
///
/// Exactly one of the accepted/rejected shapes holds: an accepted action
/// carries the co-signed transaction, a rejected one optionally carries
/// the counterparty's abort code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
	/// `true` if the round has been co-signed and committed.
	pub accepted: bool,
	/// Co-signed transaction of the new off-chain state.
	pub signed_tx: Option<String>,
	/// User-defined abort code, when the round was aborted with one.
	pub error_code: Option<i64>,
	/// `"user-defined"` for abort codes, absent otherwise.
	pub error_message: Option<String>,
	/// Address of the contract created by this action.
	pub address: Option<String>,
	/// Hash of the force-progress transaction.
	pub tx_hash: Option<String>,
	/// Channel id, reported by `leave`.
	pub channel_id: Option<String>,
}

impl ActionOutcome {
	pub(crate) fn accepted(signed_tx: impl Into<String>) -> Self {
		ActionOutcome { accepted: true, signed_tx: Some(signed_tx.into()), ..Default::default() }
	}

	pub(crate) fn rejected() -> Self {
		ActionOutcome::default()
	}

	pub(crate) fn aborted(error_code: i64) -> Self {
		ActionOutcome {
			error_code: Some(error_code),
			error_message: Some(USER_DEFINED_ERROR.into()),
			..Default::default()
		}
	}
}

/// One queued or in-flight caller action.
pub(crate) struct PendingAction {
	pub(crate) kind: ActionKind,
	pub(crate) callbacks: OnChainCallbacks,
	pub(crate) done: oneshot::Sender<Result<ActionOutcome>>,
}

impl PendingAction {
	/// Resolve the action. The caller may have stopped waiting (e.g. its
	/// own timeout fired), which is fine.
	pub(crate) fn complete(self, result: Result<ActionOutcome>) {
		let _ = self.done.send(result);
	}
}
