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

//! Api-encoded identifiers.
//!
//! Aeternity identifiers are `<prefix>_<base58check(payload)>`: `ak_` for
//! accounts, `ct_` for contracts, `ch_` for channels, `tx_`/`pi_` for
//! opaque transaction and proof-of-inclusion blobs (which this client
//! never decodes).

use crate::error::{ChannelError, Result};

use blake2::{digest::consts::U32, Blake2b, Digest};

/// Account address prefix.
pub const PREFIX_ACCOUNT: &str = "ak";
/// Contract address prefix.
pub const PREFIX_CONTRACT: &str = "ct";
/// Channel id prefix.
pub const PREFIX_CHANNEL: &str = "ch";

type Blake2b256 = Blake2b<U32>;

/// Encode a payload under the given identifier prefix.
pub fn encode(prefix: &str, payload: &[u8]) -> String {
	format!("{}_{}", prefix, bs58::encode(payload).with_check().into_string())
}

/// Decode an identifier, checking its prefix and checksum.
pub fn decode(expected_prefix: &str, id: &str) -> Result<Vec<u8>> {
	let (prefix, encoded) = id
		.split_once('_')
		.ok_or_else(|| ChannelError::IllegalArgument(format!("malformed identifier: {}", id)))?;
	if prefix != expected_prefix {
		return Err(ChannelError::IllegalArgument(format!(
			"expected {}_ identifier, got: {}",
			expected_prefix, id,
		)))
	}
	bs58::decode(encoded)
		.with_check(None)
		.into_vec()
		.map_err(|error| {
			ChannelError::IllegalArgument(format!("bad identifier checksum in {}: {}", id, error))
		})
}

/// Validate that `id` is a well-formed `ak_` account address.
pub fn ensure_account(id: &str) -> Result<()> {
	let payload = decode(PREFIX_ACCOUNT, id)?;
	if payload.len() != 32 {
		return Err(ChannelError::IllegalArgument(format!(
			"account key must be 32 bytes, got {} in {}",
			payload.len(),
			id,
		)))
	}
	Ok(())
}

/// Derive the address of a contract created inside the channel.
///
/// The address is a deterministic function of the owner account and the
/// off-chain round at which the contract was created: blake2b-256 of the
/// owner key concatenated with the round as a minimal big-endian integer.
pub fn contract_address(owner: &str, round: u64) -> Result<String> {
	let owner_key = decode(PREFIX_ACCOUNT, owner)?;
	let mut hasher = Blake2b256::new();
	hasher.update(&owner_key);
	hasher.update(minimal_big_endian(round));
	Ok(encode(PREFIX_CONTRACT, hasher.finalize().as_slice()))
}

// minimal big-endian representation, no leading zero bytes; zero is one
// zero byte
fn minimal_big_endian(value: u64) -> Vec<u8> {
	let bytes = value.to_be_bytes();
	let first = bytes.iter().position(|byte| *byte != 0).unwrap_or(bytes.len() - 1);
	bytes[first..].to_vec()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn account() -> String {
		encode(PREFIX_ACCOUNT, &[7u8; 32])
	}

	#[test]
	fn encode_decode_round_trip() {
		let id = account();
		assert!(id.starts_with("ak_"));
		assert_eq!(decode(PREFIX_ACCOUNT, &id).unwrap(), vec![7u8; 32]);
	}

	#[test]
	fn decode_rejects_wrong_prefix_and_checksum() {
		let id = account();
		assert!(decode(PREFIX_CONTRACT, &id).is_err());

		let mut corrupted = id.clone();
		corrupted.truncate(id.len() - 1);
		corrupted.push(if id.ends_with('1') { '2' } else { '1' });
		assert!(decode(PREFIX_ACCOUNT, &corrupted).is_err());
	}

	#[test]
	fn ensure_account_requires_32_byte_key() {
		assert!(ensure_account(&account()).is_ok());
		assert!(ensure_account(&encode(PREFIX_ACCOUNT, &[7u8; 31])).is_err());
		assert!(ensure_account("not an address").is_err());
	}

	#[test]
	fn contract_address_is_deterministic_in_owner_and_round() {
		let owner = account();
		let address = contract_address(&owner, 2).unwrap();
		assert!(address.starts_with("ct_"));
		assert_eq!(contract_address(&owner, 2).unwrap(), address);
		assert_ne!(contract_address(&owner, 3).unwrap(), address);

		let other_owner = encode(PREFIX_ACCOUNT, &[8u8; 32]);
		assert_ne!(contract_address(&other_owner, 2).unwrap(), address);
	}

	#[test]
	fn minimal_big_endian_drops_leading_zeroes() {
		assert_eq!(minimal_big_endian(0), vec![0]);
		assert_eq!(minimal_big_endian(1), vec![1]);
		assert_eq!(minimal_big_endian(0x0102), vec![1, 2]);
	}
}
