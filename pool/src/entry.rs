// Copyright 2018 The Grin Developers
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

//! The admitted-transaction and orphan record types (spec §3 Data Model).

use txpool_core::{Hash, PublicKey, Transaction};

/// Why a public key is indexed against an entry (spec §3 "Public-key index
/// entry"): every distinct way a transaction can name a key besides plain
/// spend/create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexReason {
	/// The entry creates an output paying this key.
	CreatesOutput,
	/// The entry spends an output owned by this key.
	SpendsOutput,
	/// The key is named inside the transaction's type-specific payload
	/// (recipient, followed key, coin creator, identity swap endpoint, burn
	/// sink, mentioned profile, reposted author).
	NamedInPayload,
}

/// The resolved list of `(key, reason)` pairs computed once at admission
/// time (spec §3, §9 "unifying" open question) and reused by the primary
/// index's public-key indexer.
#[derive(Debug, Clone, Default)]
pub struct EntryMetadata {
	/// Every public key this entry should be indexed under, and why.
	pub keys: Vec<(PublicKey, IndexReason)>,
}

impl EntryMetadata {
	/// Computes the full set of public keys a transaction affects: every
	/// output's owner, every resolved input's prior owner (when known), and
	/// every key its type-specific payload names.
	pub fn compute(tx: &Transaction, input_owners: &[PublicKey]) -> EntryMetadata {
		let mut keys = Vec::new();
		for pk in input_owners {
			keys.push((*pk, IndexReason::SpendsOutput));
		}
		for output in &tx.outputs {
			keys.push((output.pubkey, IndexReason::CreatesOutput));
		}
		for pk in tx.kind.named_pubkeys() {
			keys.push((pk, IndexReason::NamedInPayload));
		}
		EntryMetadata { keys }
	}
}

/// An admitted transaction (spec §3 "Entry").
#[derive(Debug, Clone)]
pub struct Entry {
	/// The raw, canonical byte encoding of the transaction.
	pub raw: Vec<u8>,
	/// The parsed transaction.
	pub tx: Transaction,
	/// The 32-byte transaction hash.
	pub hash: Hash,
	/// Serialized size in bytes.
	pub size: u64,
	/// Wall-clock admission time, milliseconds since the Unix epoch.
	pub admitted_at_ms: i64,
	/// Chain height at admission (tip + 1 at the time this entry was
	/// admitted).
	pub height: u64,
	/// Total fee, in the native micro-unit.
	pub fee: u64,
	/// Fee rate: `fee * 1000 / size`, per kilobyte.
	pub fee_per_kb: u64,
	/// Resolved public-key references, computed once at admission.
	pub metadata: Option<EntryMetadata>,
}

impl Entry {
	/// Builds a fresh entry, not yet pushed onto the fee heap.
	pub fn new(
		raw: Vec<u8>,
		tx: Transaction,
		size: u64,
		admitted_at_ms: i64,
		height: u64,
		fee: u64,
		metadata: Option<EntryMetadata>,
	) -> Entry {
		let hash = tx.pool_hash();
		let fee_per_kb = fee_rate_per_kb(fee, size);
		Entry {
			raw,
			tx,
			hash,
			size,
			admitted_at_ms,
			height,
			fee,
			fee_per_kb,
			metadata,
		}
	}
}

/// `fee * 1000 / size`, per kilobyte, as an integer (spec §3, §4.E step 6).
pub fn fee_rate_per_kb(fee: u64, size: u64) -> u64 {
	if size == 0 {
		return 0;
	}
	fee.saturating_mul(1000) / size
}

/// An unconnected transaction (spec §3 "Orphan").
#[derive(Debug, Clone)]
pub struct Orphan {
	/// The transaction itself.
	pub tx: Transaction,
	/// The raw, canonical byte encoding of the transaction.
	pub raw: Vec<u8>,
	/// The peer that delivered this transaction.
	pub peer_id: String,
	/// When this orphan was admitted to the orphan index.
	pub received_at_ms: i64,
	/// `received_at_ms + orphan_expiry_secs * 1000` (spec §3: "admission time
	/// + 5 min" by default).
	pub expires_at_ms: i64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fee_rate_matches_spec_example() {
		// Boundary scenario 1: fee 100, size 100 bytes => fee_per_kb = 1000.
		assert_eq!(fee_rate_per_kb(100, 100), 1000);
	}

	#[test]
	fn fee_rate_of_empty_tx_is_zero() {
		assert_eq!(fee_rate_per_kb(0, 0), 0);
	}
}
