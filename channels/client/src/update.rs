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

//! Off-chain update operations.
//!
//! A co-signed round advance carries a list of these; the node includes
//! them in sign requests so the signer can inspect what it is about to
//! authorize.

use crate::amount::Amount;

use serde::{Deserialize, Serialize};

/// One sub-operation of an off-chain update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Update {
	/// Move `amount` from one channel account to another.
	OffChainTransfer {
		/// Paying account.
		from: String,
		/// Receiving account.
		to: String,
		/// Transferred amount.
		amount: Amount,
	},
	/// Add on-chain funds to a channel account.
	OffChainDeposit {
		/// Depositing account.
		from: String,
		/// Deposited amount.
		amount: Amount,
	},
	/// Move channel funds back on chain.
	OffChainWithdrawal {
		/// Receiving account.
		to: String,
		/// Withdrawn amount.
		amount: Amount,
	},
	/// Instantiate a contract inside the channel.
	OffChainNewContract {
		/// Contract owner account.
		owner: String,
		/// Compiled contract code.
		code: String,
		/// Encoded init call data.
		call_data: String,
		/// Initial contract balance.
		deposit: Amount,
		/// Virtual machine version.
		vm_version: u16,
		/// Call data encoding version.
		abi_version: u16,
	},
	/// Call a contract living inside the channel.
	OffChainCallContract {
		/// Calling account.
		caller: String,
		/// Called contract address.
		contract: String,
		/// Call data encoding version.
		abi_version: u16,
		/// Amount attached to the call.
		amount: Amount,
		/// Encoded call data.
		call_data: String,
		/// Contract call nesting, outermost first.
		#[serde(default)]
		call_stack: Vec<String>,
		/// Gas price the call is metered with.
		gas_price: Amount,
		/// Gas limit of the call.
		gas_limit: u64,
	},
	/// Opaque metadata attached to a round.
	OffChainMeta {
		/// Uninterpreted payload.
		data: String,
	},
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn transfer_serializes_with_op_tag_and_decimal_amount() {
		let update = Update::OffChainTransfer {
			from: "ak_alice".into(),
			to: "ak_bob".into(),
			amount: "10000000000000000000".parse().unwrap(),
		};
		assert_eq!(
			serde_json::to_value(&update).unwrap(),
			json!({
				"op": "OffChainTransfer",
				"from": "ak_alice",
				"to": "ak_bob",
				"amount": "10000000000000000000",
			}),
		);
	}

	#[test]
	fn call_contract_defaults_to_an_empty_call_stack() {
		let update: Update = serde_json::from_value(json!({
			"op": "OffChainCallContract",
			"caller": "ak_alice",
			"contract": "ct_1",
			"abi_version": 1,
			"amount": "0",
			"call_data": "cb_1",
			"gas_price": "1000000000",
			"gas_limit": 1000000,
		}))
		.unwrap();
		match update {
			Update::OffChainCallContract { call_stack, .. } => assert!(call_stack.is_empty()),
			other => panic!("unexpected update: {:?}", other),
		}
	}

	#[test]
	fn updates_round_trip_through_the_wire_encoding() {
		let updates = vec![
			Update::OffChainDeposit { from: "ak_alice".into(), amount: Amount::from(10u64) },
			Update::OffChainMeta { data: "preimage".into() },
		];
		let raw = serde_json::to_value(&updates).unwrap();
		let decoded: Vec<Update> = serde_json::from_value(raw).unwrap();
		assert_eq!(decoded, updates);
	}
}
