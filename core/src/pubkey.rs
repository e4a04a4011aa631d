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

//! Compressed public keys, as referenced by outputs and by the type-specific
//! payloads that the pool indexes (§3 public-key index entry).

use std::fmt;

use serde_derive::{Deserialize, Serialize};

/// A compressed secp256k1-style public key. Verification of signatures
/// against this key is out of scope for the pool (spec non-goal); the pool
/// only ever compares and indexes these by value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 33]);

impl PublicKey {
	/// The burn address: a key with no known spending key, used by
	/// cross-chain exchange transactions as the destructive sink.
	pub fn burn_address() -> PublicKey {
		PublicKey([0xff; 33])
	}

	/// Whether this key is the hard-coded burn address.
	pub fn is_burn_address(&self) -> bool {
		*self == PublicKey::burn_address()
	}
}

impl fmt::Display for PublicKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for b in self.0.iter() {
			write!(f, "{:02x}", b)?;
		}
		Ok(())
	}
}
