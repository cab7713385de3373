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

//! Channel status and the internal FSM state.

use std::fmt;

/// Caller-visible channel status.
///
/// A strict projection of the internal FSM state; `statusChanged` events
/// report transitions of this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
	/// Transport is being established.
	Connecting,
	/// Node session is up, open handshake not finished yet.
	Connected,
	/// Waiting for the co-signed on-chain transaction to be posted.
	AwaitingOnChainTx,
	/// Waiting for enough on-chain confirmations.
	AwaitingOnChainConfirmation,
	/// Waiting for the node to resume an existing FSM session.
	AwaitingReestablish,
	/// Channel is open, no pending on-chain confirmation blocks it.
	Open,
	/// A deposit is being co-signed and confirmed.
	AwaitingDeposit,
	/// A withdrawal is being co-signed and confirmed.
	AwaitingWithdraw,
	/// An off-chain update is being co-signed.
	AwaitingUpdate,
	/// Transport is gone; the session may be resumed via reconnect.
	Disconnected,
	/// Mutual close is being confirmed on chain.
	Closing,
	/// Channel has been closed. Terminal.
	Closed,
	/// Channel FSM is gone for good. Terminal.
	Died,
}

impl ChannelStatus {
	/// Returns `true` for statuses the channel can never leave.
	pub fn is_terminal(&self) -> bool {
		matches!(self, ChannelStatus::Closed | ChannelStatus::Died)
	}
}

impl fmt::Display for ChannelStatus {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let status = match self {
			ChannelStatus::Connecting => "connecting",
			ChannelStatus::Connected => "connected",
			ChannelStatus::AwaitingOnChainTx => "awaitingOnChainTx",
			ChannelStatus::AwaitingOnChainConfirmation => "awaitingOnChainConfirmation",
			ChannelStatus::AwaitingReestablish => "awaitingReestablish",
			ChannelStatus::Open => "open",
			ChannelStatus::AwaitingDeposit => "awaitingDeposit",
			ChannelStatus::AwaitingWithdraw => "awaitingWithdraw",
			ChannelStatus::AwaitingUpdate => "awaitingUpdate",
			ChannelStatus::Disconnected => "disconnected",
			ChannelStatus::Closing => "closing",
			ChannelStatus::Closed => "closed",
			ChannelStatus::Died => "died",
		};
		f.write_str(status)
	}
}

/// Internal FSM state. Every inbound notification and caller action is
/// interpreted against this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FsmState {
	/// Waiting for the node session to come up.
	Connecting,
	/// Reconnect path: reestablish request sent, confirmation pending.
	AwaitingReestablish,
	/// Our side has signed the create transaction, the other side has not.
	HalfSigned,
	/// Both parties have signed the create transaction.
	Signed,
	/// Funding transaction is on its way to the chain.
	AwaitingOnChainTx,
	/// Funding transaction waits for confirmations.
	AwaitingOnChainConfirmation,
	/// Channel is open and idle.
	Open,
	/// Co-signing an off-chain update (transfer or contract operation).
	AwaitingUpdate,
	/// Co-signing and confirming a deposit.
	AwaitingDeposit,
	/// Co-signing and confirming a withdrawal.
	AwaitingWithdraw,
	/// `channels.leave` sent, node acknowledgement pending.
	AwaitingLeaveAck,
	/// `channels.shutdown` sent, counterparty signature pending.
	AwaitingShutdownAck,
	/// Mutual close transaction is being confirmed.
	Closing,
	/// Session is gone, channel may be reestablished.
	Disconnected,
	/// Terminal failure state.
	Died,
	/// Terminal regular end of life.
	Closed,
}

impl FsmState {
	/// Caller-visible status of this state.
	pub(crate) fn status(&self) -> ChannelStatus {
		match self {
			FsmState::Connecting => ChannelStatus::Connecting,
			FsmState::AwaitingReestablish => ChannelStatus::AwaitingReestablish,
			// the handshake signing steps are not distinguished outside
			// of the FSM
			FsmState::HalfSigned => ChannelStatus::Connected,
			FsmState::Signed => ChannelStatus::AwaitingOnChainTx,
			FsmState::AwaitingOnChainTx => ChannelStatus::AwaitingOnChainTx,
			FsmState::AwaitingOnChainConfirmation => ChannelStatus::AwaitingOnChainConfirmation,
			FsmState::Open => ChannelStatus::Open,
			FsmState::AwaitingUpdate => ChannelStatus::AwaitingUpdate,
			FsmState::AwaitingDeposit => ChannelStatus::AwaitingDeposit,
			FsmState::AwaitingWithdraw => ChannelStatus::AwaitingWithdraw,
			FsmState::AwaitingLeaveAck => ChannelStatus::Open,
			FsmState::AwaitingShutdownAck => ChannelStatus::Open,
			FsmState::Closing => ChannelStatus::Closing,
			FsmState::Disconnected => ChannelStatus::Disconnected,
			FsmState::Died => ChannelStatus::Died,
			FsmState::Closed => ChannelStatus::Closed,
		}
	}

	pub(crate) fn is_terminal(&self) -> bool {
		matches!(self, FsmState::Died | FsmState::Closed)
	}
}
