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

//! Caller-supplied signer and the broker wrapping it.

use crate::{protocol::SignTag, update::Update};

use async_trait::async_trait;
use futures::lock::Mutex;
use std::sync::Arc;

/// What the signer decided to do with a transaction.
///
/// The shapes mirror the abort-code convention of the channel protocol: a
/// signed blob authorizes the transaction, a numeric code aborts the round
/// with a user-defined reason (forwarded to the node as `channels.error`),
/// and a plain rejection aborts it without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignResponse {
	/// Signed transaction blob.
	Signed(String),
	/// User-defined abort code.
	Abort(i64),
	/// Generic rejection.
	Rejected,
}

/// Context the signer may inspect before authorizing a transaction.
#[derive(Debug, Clone, Default)]
pub struct SignMeta {
	/// Off-chain update operations of the round being signed, when the
	/// node supplied them.
	pub updates: Vec<Update>,
}

/// Transaction signer, implemented by the caller.
///
/// The two surfaces are distinct on purpose: [`Signer::sign`] runs for
/// actions this side has deliberately initiated, while
/// [`Signer::sign_tagged`] answers node-initiated requests and receives
/// the tag explaining *why* a signature is being asked for.
#[async_trait]
pub trait Signer: Send + Sync {
	/// Sign a transaction belonging to an action this side submitted.
	async fn sign(&self, tx: &str, meta: &SignMeta) -> SignResponse;

	/// Sign a node-initiated transaction (open handshake, acknowledgement
	/// of the counterparty's rounds).
	async fn sign_tagged(&self, tag: SignTag, tx: &str, meta: &SignMeta) -> SignResponse;
}

/// Serializing wrapper around the caller's signer.
///
/// The FSM must not invoke the signer for a new request until the previous
/// invocation has resolved; the broker guarantees that with a per-channel
/// async mutex, for every clone of the handle.
#[derive(Clone)]
pub(crate) struct SignBroker {
	signer: Arc<dyn Signer>,
	guard: Arc<Mutex<()>>,
}

impl SignBroker {
	pub(crate) fn new(signer: Arc<dyn Signer>) -> Self {
		SignBroker { signer, guard: Arc::new(Mutex::new(())) }
	}

	pub(crate) async fn sign(&self, tx: &str, meta: &SignMeta) -> SignResponse {
		let _guard = self.guard.lock().await;
		self.signer.sign(tx, meta).await
	}

	pub(crate) async fn sign_tagged(
		&self,
		tag: SignTag,
		tx: &str,
		meta: &SignMeta,
	) -> SignResponse {
		let _guard = self.guard.lock().await;
		log::debug!(target: "channel", "Forwarding sign request tagged {} to the signer", tag);
		self.signer.sign_tagged(tag, tx, meta).await
	}
}
