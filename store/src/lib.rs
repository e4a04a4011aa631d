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

//! Embedded key-value persistence, used for the pool's dump/reload rotation
//! (spec §4.H, §6 "Persisted state layout").

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate failure_derive;

pub mod lmdb;

pub use crate::lmdb::{new_env, option_to_not_found, Batch, Error, SerIterator, Store};

use byteorder::{BigEndian, WriteBytesExt};

use txpool_core::hash::Hash;

/// Builds the persistence key for one entry: its admission timestamp
/// (big-endian, for time-ascending iteration) followed by its transaction
/// hash (to keep keys unique under same-millisecond admissions), as
/// described in spec §4.H / §6.
pub fn entry_key(admission_time_ms: i64, hash: &Hash) -> Vec<u8> {
	let mut key = Vec::with_capacity(8 + 32);
	key.write_i64::<BigEndian>(admission_time_ms).unwrap();
	key.extend_from_slice(hash.as_bytes());
	key
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn entry_keys_sort_by_time() {
		let h = Hash::from_slice(&[1u8; 32]);
		let a = entry_key(100, &h);
		let b = entry_key(200, &h);
		assert!(a < b);
	}
}
