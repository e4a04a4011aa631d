// Copyright 2016 The Grin Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The 32-byte hash used to identify transactions and outputs throughout
//! the pool.

use std::fmt;

use blake2_rfc::blake2b::blake2b;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A hash uniquely identifying a transaction or output.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash(pub [u8; 32]);

/// The all-zero hash, used as a sentinel for "no parent" style references.
pub const ZERO_HASH: Hash = Hash([0; 32]);

impl Hash {
	/// Builds a hash from a byte slice, panicking if the slice isn't 32 bytes.
	pub fn from_slice(s: &[u8]) -> Hash {
		let mut h = [0u8; 32];
		h.copy_from_slice(s);
		Hash(h)
	}

	/// Byte slice view of the hash.
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl fmt::Display for Hash {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for b in self.0.iter() {
			write!(f, "{:02x}", b)?;
		}
		Ok(())
	}
}

impl Serialize for Hash {
	fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_str(&self.to_string())
	}
}

impl<'de> Deserialize<'de> for Hash {
	fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Hash, D::Error> {
		let s = String::deserialize(d)?;
		let mut bytes = [0u8; 32];
		for (i, byte) in bytes.iter_mut().enumerate() {
			*byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
				.map_err(serde::de::Error::custom)?;
		}
		Ok(Hash(bytes))
	}
}

/// Types that derive their identity from a blake2b hash of their canonical
/// byte encoding.
pub trait Hashed {
	/// The canonical byte encoding this hash is taken over.
	fn bytes(&self) -> Vec<u8>;

	/// The 32-byte blake2b hash of `bytes()`.
	fn hash(&self) -> Hash {
		let data = self.bytes();
		let out = blake2b(32, &[], &data);
		Hash::from_slice(out.as_bytes())
	}
}

impl Hashed for [u8] {
	fn bytes(&self) -> Vec<u8> {
		self.to_owned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hash_is_deterministic() {
		let a = b"hello".hash();
		let b = b"hello".hash();
		assert_eq!(a, b);
	}

	#[test]
	fn display_round_trips_through_serde() {
		let h = b"hello".hash();
		let s = serde_json::to_string(&h).unwrap();
		let back: Hash = serde_json::from_str(&s).unwrap();
		assert_eq!(h, back);
	}
}
