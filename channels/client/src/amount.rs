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

//! Arbitrary-precision token amounts.
//!
//! Channel amounts routinely exceed 64 bits (1 AE = 10^18 aettos) and are
//! serialized as decimal strings on the wire.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// Non-negative arbitrary-precision amount, in aettos.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigUint);

impl Amount {
	/// Zero amount.
	pub fn zero() -> Self {
		Amount(BigUint::zero())
	}

	/// Returns `true` if the amount is zero.
	pub fn is_zero(&self) -> bool {
		self.0.is_zero()
	}

	/// Decimal string representation, as sent over the wire.
	pub fn to_decimal_string(&self) -> String {
		self.0.to_str_radix(10)
	}
}

impl From<u64> for Amount {
	fn from(value: u64) -> Self {
		Amount(BigUint::from(value))
	}
}

impl From<u128> for Amount {
	fn from(value: u128) -> Self {
		Amount(BigUint::from(value))
	}
}

impl FromStr for Amount {
	type Err = num_bigint::ParseBigIntError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		BigUint::from_str(value).map(Amount)
	}
}

impl fmt::Display for Amount {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(&self.to_decimal_string())
	}
}

impl Serialize for Amount {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_decimal_string())
	}
}

impl<'de> Deserialize<'de> for Amount {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		deserializer.deserialize_any(AmountVisitor)
	}
}

// the node serializes amounts as decimal strings, but small values may
// arrive as plain JSON integers
struct AmountVisitor;

impl<'de> de::Visitor<'de> for AmountVisitor {
	type Value = Amount;

	fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str("a decimal string or a non-negative integer")
	}

	fn visit_str<E: de::Error>(self, value: &str) -> Result<Amount, E> {
		Amount::from_str(value)
			.map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))
	}

	fn visit_u64<E: de::Error>(self, value: u64) -> Result<Amount, E> {
		Ok(Amount::from(value))
	}

	fn visit_i64<E: de::Error>(self, value: i64) -> Result<Amount, E> {
		u64::try_from(value)
			.map(Amount::from)
			.map_err(|_| E::invalid_value(de::Unexpected::Signed(value), &self))
	}
}
