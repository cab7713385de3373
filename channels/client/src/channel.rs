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

//! The channel handle: the typed surface exposed to callers.
//!
//! Every action submits one FSM command and awaits its terminal outcome;
//! argument validation fails synchronously, everything else is reported
//! through the outcome or the event bus.

use crate::{
	action::{
		ActionKind, ActionOutcome, CallContractParams, ForceProgressParams, NewContractParams,
		OnChainCallbacks, PendingAction,
	},
	amount::Amount,
	encoding::{self, PREFIX_CONTRACT},
	error::{ChannelError, Result},
	event::{ChannelEvent, EventBus},
	fsm::{lock, Command, FsmWorker, Snapshot},
	params::ChannelOptions,
	protocol::methods,
	sign::{SignBroker, Signer},
	state::ChannelStatus,
};

use channel_rpc_client::{RpcSession, Transport, WsTransport};
use futures::channel::{mpsc, oneshot};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
	collections::BTreeMap,
	sync::{Arc, Mutex},
};

/// Everything an external transaction builder needs to assemble the
/// close-solo / slash / settle transactions of a dispute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputePayload {
	/// Channel being disputed.
	pub channel_id: Option<String>,
	/// Proof of inclusion committing to the disputed balances.
	pub poi: String,
	/// Last co-signed off-chain transaction.
	pub payload: Option<String>,
}

/// One side of a state channel.
///
/// Cloning `Channel` is a cheap operation that only clones internal
/// references; all clones drive the same channel.
#[derive(Clone)]
pub struct Channel {
	commands: mpsc::UnboundedSender<Command>,
	session: RpcSession,
	snapshot: Arc<Mutex<Snapshot>>,
	bus: Arc<Mutex<EventBus>>,
	options: ChannelOptions,
}

impl Channel {
	/// Connect to the channel node and start the channel FSM.
	///
	/// With reestablish options set, the session resumes the existing FSM
	/// instead of opening a new channel. The returned handle is live
	/// before the channel is open; subscribe to [`Channel::events`] to
	/// follow the handshake.
	pub async fn initialize(options: ChannelOptions, signer: Arc<dyn Signer>) -> Result<Channel> {
		Self::validate(&options)?;
		let transport = WsTransport::connect(&options.channel_url()).await?;
		Self::with_transport(transport, options, signer)
	}

	/// Start the channel FSM over an already connected transport.
	pub fn with_transport<T: Transport>(
		transport: T,
		options: ChannelOptions,
		signer: Arc<dyn Signer>,
	) -> Result<Channel> {
		Self::validate(&options)?;
		let (session, notifications) = RpcSession::new(transport, options.ttl);
		let snapshot = Arc::new(Mutex::new(Snapshot::default()));
		let bus = Arc::new(Mutex::new(EventBus::default()));
		let (commands, commands_rx) = mpsc::unbounded();

		let worker = FsmWorker::new(
			session.clone(),
			options.clone(),
			SignBroker::new(signer),
			snapshot.clone(),
			bus.clone(),
		);
		tokio::spawn(worker.run(notifications, commands_rx));

		Ok(Channel { commands, session, snapshot, bus, options })
	}

	fn validate(options: &ChannelOptions) -> Result<()> {
		encoding::ensure_account(&options.initiator_id)?;
		encoding::ensure_account(&options.responder_id)?;
		if options.existing_channel_id.is_some() != options.existing_fsm_id.is_some() {
			return Err(ChannelError::IllegalArgument(
				"existing_channel_id and existing_fsm_id must be given together".into(),
			))
		}
		Ok(())
	}

	/// Current channel status.
	pub fn status(&self) -> ChannelStatus {
		lock(&self.snapshot).status
	}

	/// Current off-chain round. Undefined while connecting and right
	/// after a reestablish, until the first co-signed advance.
	pub fn round(&self) -> Option<u64> {
		lock(&self.snapshot).round
	}

	/// Channel id, assigned by the node once the channel is open.
	pub fn channel_id(&self) -> Option<String> {
		lock(&self.snapshot).channel_id.clone()
	}

	/// FSM session id, usable for a later reestablish.
	pub fn fsm_id(&self) -> Option<String> {
		lock(&self.snapshot).fsm_id.clone()
	}

	/// Last co-signed off-chain transaction.
	pub fn last_signed_tx(&self) -> Option<String> {
		lock(&self.snapshot).last_signed_tx.clone()
	}

	/// Subscribe to channel events.
	pub fn events(&self) -> mpsc::UnboundedReceiver<ChannelEvent> {
		lock(&self.bus).subscribe()
	}

	/// Transfer `amount` between two channel accounts off-chain.
	pub async fn update(&self, from: &str, to: &str, amount: Amount) -> Result<ActionOutcome> {
		encoding::ensure_account(from)?;
		encoding::ensure_account(to)?;
		ensure_positive(&amount)?;
		self.submit(
			ActionKind::Transfer { from: from.into(), to: to.into(), amount },
			OnChainCallbacks::default(),
		)
		.await
	}

	/// Add on-chain funds to our channel account.
	pub async fn deposit(
		&self,
		amount: Amount,
		callbacks: OnChainCallbacks,
	) -> Result<ActionOutcome> {
		ensure_positive(&amount)?;
		self.submit(ActionKind::Deposit { amount }, callbacks).await
	}

	/// Move channel funds of our account back on chain.
	pub async fn withdraw(
		&self,
		amount: Amount,
		callbacks: OnChainCallbacks,
	) -> Result<ActionOutcome> {
		ensure_positive(&amount)?;
		self.submit(ActionKind::Withdraw { amount }, callbacks).await
	}

	/// Instantiate a contract inside the channel.
	///
	/// On acceptance the outcome carries the contract address, derived
	/// from our account and the round the contract was created at.
	pub async fn create_contract(&self, params: NewContractParams) -> Result<ActionOutcome> {
		if params.code.is_empty() || params.call_data.is_empty() {
			return Err(ChannelError::IllegalArgument(
				"contract code and call_data must not be empty".into(),
			))
		}
		self.submit(ActionKind::NewContract(params), OnChainCallbacks::default()).await
	}

	/// Call a contract living inside the channel.
	pub async fn call_contract(&self, params: CallContractParams) -> Result<ActionOutcome> {
		encoding::decode(PREFIX_CONTRACT, &params.contract)?;
		self.submit(ActionKind::CallContract(params), OnChainCallbacks::default()).await
	}

	/// Force the result of a contract call on chain when the counterparty
	/// refuses to co-sign. The outcome carries the serialized transaction
	/// and its hash; posting it on chain is the caller's responsibility.
	pub async fn force_progress(&self, params: ForceProgressParams) -> Result<ActionOutcome> {
		encoding::decode(PREFIX_CONTRACT, &params.contract)?;
		self.submit(ActionKind::ForceProgress(params), OnChainCallbacks::default()).await
	}

	/// Cooperative mutual close. On acceptance the outcome carries the
	/// co-signed close transaction and the channel moves to `closing`.
	pub async fn shutdown(&self) -> Result<ActionOutcome> {
		self.submit(ActionKind::Shutdown, OnChainCallbacks::default()).await
	}

	/// Release the session while the node keeps the channel state. The
	/// outcome carries the channel id and the last off-chain transaction,
	/// both usable for a later reestablish.
	pub async fn leave(&self) -> Result<ActionOutcome> {
		self.submit(ActionKind::Leave, OnChainCallbacks::default()).await
	}

	/// Send a generic message to the counterparty.
	pub async fn send_message(&self, to: &str, info: &str) -> Result<()> {
		encoding::ensure_account(to)?;
		self.session
			.notify(methods::MESSAGE, json!({ "to": to, "info": info }))
			.await
			.map_err(Into::into)
	}

	/// Balances of the given channel accounts.
	pub async fn balances(&self, accounts: &[String]) -> Result<BTreeMap<String, Amount>> {
		for account in accounts {
			encoding::ensure_account(account)?;
		}
		let response =
			self.session.call(methods::GET_BALANCES, json!({ "accounts": accounts })).await?;
		parse_response(response)
	}

	/// Proof of inclusion for the given accounts and contracts, as an
	/// opaque encoded blob.
	pub async fn poi(&self, accounts: &[String], contracts: &[String]) -> Result<String> {
		#[derive(Deserialize)]
		struct PoiResponse {
			poi: String,
		}

		for account in accounts {
			encoding::ensure_account(account)?;
		}
		for contract in contracts {
			encoding::decode(PREFIX_CONTRACT, contract)?;
		}
		let response = self
			.session
			.call(methods::GET_POI, json!({ "accounts": accounts, "contracts": contracts }))
			.await?;
		parse_response::<PoiResponse>(response).map(|response| response.poi)
	}

	/// Latest co-signed off-chain state, as reported by the node.
	pub async fn offchain_state(&self) -> Result<Value> {
		self.session
			.call(methods::GET_OFFCHAIN_STATE, json!({}))
			.await
			.map_err(Into::into)
	}

	/// Result of a past contract call, addressed by caller, contract and
	/// the round it was executed in.
	pub async fn get_contract_call(
		&self,
		caller: &str,
		contract: &str,
		round: u64,
	) -> Result<Value> {
		encoding::ensure_account(caller)?;
		encoding::decode(PREFIX_CONTRACT, contract)?;
		self.session
			.call(
				methods::GET_CONTRACT_CALL,
				json!({ "caller": caller, "contract": contract, "round": round }),
			)
			.await
			.map_err(Into::into)
	}

	/// Execute a contract call against the current off-chain state without
	/// advancing the round.
	pub async fn call_contract_static(&self, params: CallContractParams) -> Result<Value> {
		encoding::decode(PREFIX_CONTRACT, &params.contract)?;
		self.session
			.call(
				methods::DRY_RUN_CALL_CONTRACT,
				json!({
					"contract": params.contract,
					"abi_version": params.abi_version,
					"amount": params.amount,
					"call_data": params.call_data,
				}),
			)
			.await
			.map_err(Into::into)
	}

	/// Drop contract call results stored by the node for this channel.
	pub async fn clean_contract_calls(&self) -> Result<()> {
		self.session.call(methods::CLEAN_CONTRACT_CALLS, json!({})).await?;
		Ok(())
	}

	/// Full state of a channel contract. The `contract` blob inside is
	/// encoded by the node and is kept opaque here.
	pub async fn get_contract_state(&self, contract: &str) -> Result<Value> {
		encoding::decode(PREFIX_CONTRACT, contract)?;
		self.session
			.call(methods::GET_CONTRACT, json!({ "pubkey": contract }))
			.await
			.map_err(Into::into)
	}

	/// Gather the dispute material for the given accounts and contracts.
	pub async fn dispute_payload(
		&self,
		accounts: &[String],
		contracts: &[String],
	) -> Result<DisputePayload> {
		let poi = self.poi(accounts, contracts).await?;
		let snapshot = lock(&self.snapshot);
		Ok(DisputePayload {
			channel_id: snapshot.channel_id.clone(),
			poi,
			payload: snapshot.last_signed_tx.clone(),
		})
	}

	/// Tear the session down. Pending actions fail with a transport
	/// error; the channel may be resumed later via reestablish.
	pub fn disconnect(&self) {
		let _ = self.commands.unbounded_send(Command::Disconnect);
	}

	async fn submit(
		&self,
		kind: ActionKind,
		callbacks: OnChainCallbacks,
	) -> Result<ActionOutcome> {
		let name = kind.name();
		let (done, outcome) = oneshot::channel();
		let action = PendingAction { kind, callbacks, done };
		self.commands
			.unbounded_send(Command::Submit(action))
			.map_err(|_| ChannelError::Connection("channel worker is gone".into()))?;

		match tokio::time::timeout(self.options.ttl, outcome).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(ChannelError::Connection("channel worker is gone".into())),
			Err(_) => Err(ChannelError::Timeout(name.into())),
		}
	}
}

fn ensure_positive(amount: &Amount) -> Result<()> {
	if amount.is_zero() {
		return Err(ChannelError::IllegalArgument("amount must be positive".into()))
	}
	Ok(())
}

fn parse_response<T: serde::de::DeserializeOwned>(response: Value) -> Result<T> {
	serde_json::from_value(response)
		.map_err(|error| ChannelError::Rpc(channel_rpc_client::Error::Serialization(error)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		encoding::{encode, PREFIX_ACCOUNT},
		params::Role,
		sign::{SignMeta, SignResponse},
		protocol::SignTag,
	};
	use async_trait::async_trait;
	use channel_rpc_client::PairTransport;

	struct NeverSigner;

	#[async_trait]
	impl Signer for NeverSigner {
		async fn sign(&self, _tx: &str, _meta: &SignMeta) -> SignResponse {
			SignResponse::Rejected
		}

		async fn sign_tagged(
			&self,
			_tag: SignTag,
			_tx: &str,
			_meta: &SignMeta,
		) -> SignResponse {
			SignResponse::Rejected
		}
	}

	fn account(seed: u8) -> String {
		encode(PREFIX_ACCOUNT, &[seed; 32])
	}

	fn channel() -> Channel {
		let options = ChannelOptions::new(Role::Initiator, account(1), account(2));
		let (transport, _remote) = PairTransport::pair();
		Channel::with_transport(transport, options, Arc::new(NeverSigner)).unwrap()
	}

	#[tokio::test]
	async fn malformed_addresses_fail_synchronously() {
		let options = ChannelOptions::new(Role::Initiator, "alice", account(2));
		let (transport, _remote) = PairTransport::pair();
		match Channel::with_transport(transport, options, Arc::new(NeverSigner)) {
			Err(ChannelError::IllegalArgument(_)) => (),
			other => panic!("unexpected result: {:?}", other.map(|_| ())),
		}
	}

	#[tokio::test]
	async fn reestablish_ids_must_be_given_together() {
		let mut options = ChannelOptions::new(Role::Initiator, account(1), account(2));
		options.existing_fsm_id = Some("ba_1".into());
		let (transport, _remote) = PairTransport::pair();
		match Channel::with_transport(transport, options, Arc::new(NeverSigner)) {
			Err(ChannelError::IllegalArgument(_)) => (),
			other => panic!("unexpected result: {:?}", other.map(|_| ())),
		}
	}

	#[tokio::test]
	async fn zero_amount_update_fails_synchronously() {
		let channel = channel();
		match channel.update(&account(1), &account(2), Amount::zero()).await {
			Err(ChannelError::IllegalArgument(message)) =>
				assert!(message.contains("positive")),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[tokio::test]
	async fn contract_calls_require_a_contract_address() {
		let channel = channel();
		let params = CallContractParams {
			contract: account(3),
			abi_version: 1,
			amount: Amount::from(1u64),
			call_data: "cb_1".into(),
		};
		match channel.call_contract(params).await {
			Err(ChannelError::IllegalArgument(_)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}
}
