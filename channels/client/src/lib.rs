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

//! Client side of aeternity state channels.
//!
//! A [`Channel`] drives one two-party off-chain channel over a persistent
//! session with a remote channel-FSM service: it establishes the channel,
//! advances it through co-signed rounds, coordinates disputes and resumes
//! sessions after disconnects. Transaction blobs, proofs of inclusion and
//! contract state stay opaque; decoding them is the job of the external
//! transaction library, and posting spawned on-chain transactions is the
//! job of the caller's node client.

#![warn(missing_docs)]

mod action;
mod amount;
mod channel;
mod error;
mod event;
mod fsm;
mod params;
mod protocol;
mod sign;
mod state;
mod update;

pub mod encoding;

pub use crate::action::{
	ActionOutcome, CallContractParams, ForceProgressParams, NewContractParams, OnChainCallbacks,
	USER_DEFINED_ERROR,
};
pub use crate::amount::Amount;
pub use crate::channel::{Channel, DisputePayload};
pub use crate::error::{ChannelError, Result, ERR_CODE_INSUFFICIENT_BALANCE};
pub use crate::event::ChannelEvent;
pub use crate::params::{ChannelOptions, Role};
pub use crate::protocol::{ChannelMessage, SignTag};
pub use crate::sign::{SignMeta, SignResponse, Signer};
pub use crate::state::ChannelStatus;
pub use crate::update::Update;

pub use channel_rpc_client::{ErrorObject, Transport, WsTransport};
