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

//! Component C: the primary index (spec §4.C). Holds every admitted entry,
//! indexed by hash, by spent outpoint and by public key, plus the running
//! size accumulator and the fee heap (component A).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use txpool_core::{Hash, OutPoint, PublicKey};

use crate::entry::{Entry, IndexReason};
use crate::error::{Error, ErrorKind};
use crate::fee_heap::FeeHeap;

/// The four dictionaries of spec §3 plus the size accumulator and the fee
/// heap that orders them (spec invariants 1-3).
pub struct PrimaryIndex {
	by_hash: HashMap<Hash, Arc<Entry>>,
	spender_of: HashMap<OutPoint, Hash>,
	by_pubkey: HashMap<PublicKey, HashSet<Hash>>,
	heap: FeeHeap,
	size_bytes: u64,
	max_size_bytes: u64,
}

impl PrimaryIndex {
	/// An empty index with the given capacity (spec §3 invariant 2; default
	/// 250 MB, spec §4.C).
	pub fn new(max_size_bytes: u64) -> PrimaryIndex {
		PrimaryIndex {
			by_hash: HashMap::new(),
			spender_of: HashMap::new(),
			by_pubkey: HashMap::new(),
			heap: FeeHeap::new(),
			size_bytes: 0,
			max_size_bytes,
		}
	}

	/// Number of admitted entries.
	pub fn len(&self) -> usize {
		self.by_hash.len()
	}

	/// Whether the index holds no entries.
	pub fn is_empty(&self) -> bool {
		self.by_hash.is_empty()
	}

	/// Current size accumulator, in bytes.
	pub fn size_bytes(&self) -> u64 {
		self.size_bytes
	}

	/// Whether `hash` is currently admitted.
	pub fn contains(&self, hash: &Hash) -> bool {
		self.by_hash.contains_key(hash)
	}

	/// Looks up an admitted entry by hash.
	pub fn get(&self, hash: &Hash) -> Option<Arc<Entry>> {
		self.by_hash.get(hash).cloned()
	}

	/// The hash of the entry currently spending `outpoint`, if any.
	pub fn spender_of(&self, outpoint: &OutPoint) -> Option<Hash> {
		self.spender_of.get(outpoint).copied()
	}

	/// Every admitted entry naming `pk` (spec §3 public-key index entry).
	pub fn entries_for_pubkey(&self, pk: &PublicKey) -> Vec<Arc<Entry>> {
		self.by_pubkey
			.get(pk)
			.map(|hashes| hashes.iter().filter_map(|h| self.by_hash.get(h)).cloned().collect())
			.unwrap_or_default()
	}

	/// All admitted entries, in no particular order. Callers that need
	/// admission-time order should use the engine's ordered admission list
	/// instead (spec §5 "Ordering guarantees").
	pub fn all_entries(&self) -> impl Iterator<Item = &Arc<Entry>> {
		self.by_hash.values()
	}

	/// The current minimum fee-rate entry's hash, the eviction oracle (spec
	/// §4.A).
	pub fn min_fee_hash(&self) -> Option<Hash> {
		self.heap.peek_min()
	}

	/// Atomically records `entry`: updates the hash map, the outpoint map,
	/// the public-key index and the heap, and bumps the size accumulator.
	/// Fails without mutating anything if the new total would exceed
	/// `max_size_bytes` (spec §4.C: "reject rather than evict").
	pub fn insert(&mut self, entry: Entry) -> Result<Arc<Entry>, Error> {
		if self.size_bytes.saturating_add(entry.size) > self.max_size_bytes {
			return Err(ErrorKind::InsufficientFeePriorityQueue.into());
		}

		let hash = entry.hash;
		let fee_per_kb = entry.fee_per_kb;
		let size = entry.size;

		for input in &entry.tx.inputs {
			self.spender_of.insert(input.previous_output, hash);
		}
		if let Some(metadata) = &entry.metadata {
			for (pk, _reason) in &metadata.keys {
				self.by_pubkey.entry(*pk).or_insert_with(HashSet::new).insert(hash);
			}
		}

		self.heap.push(hash, fee_per_kb);

		let entry = Arc::new(entry);
		self.by_hash.insert(hash, entry.clone());
		self.size_bytes += size;
		Ok(entry)
	}

	/// Atomically removes `hash`, undoing every map update `insert` made for
	/// it. A no-op if `hash` isn't present.
	pub fn remove(&mut self, hash: &Hash) -> Option<Arc<Entry>> {
		let entry = self.by_hash.remove(hash)?;
		self.size_bytes -= entry.size;
		self.heap.remove(hash);

		for input in &entry.tx.inputs {
			if self.spender_of.get(&input.previous_output) == Some(hash) {
				self.spender_of.remove(&input.previous_output);
			}
		}
		if let Some(metadata) = &entry.metadata {
			for (pk, _reason) in &metadata.keys {
				if let Some(set) = self.by_pubkey.get_mut(pk) {
					set.remove(hash);
					if set.is_empty() {
						self.by_pubkey.remove(pk);
					}
				}
			}
		}
		Some(entry)
	}

	/// Replaces an existing entry's payload in place: same hash, same
	/// admission time, same heap position (spec §4.E.2 cross-chain mined
	/// upgrade). The new `tx`/`raw`/`fee` must keep the same hash as the
	/// entry being replaced; callers are responsible for recomputing
	/// `metadata` since the payload (e.g. burn output total) may differ.
	pub fn replace_payload(&mut self, hash: &Hash, tx: txpool_core::Transaction, raw: Vec<u8>) {
		if let Some(entry) = self.by_hash.get(hash) {
			let mut replaced = (**entry).clone();
			replaced.tx = tx;
			replaced.raw = raw;
			self.by_hash.insert(*hash, Arc::new(replaced));
		}
	}

	/// Reason code matching this hash's highest-priority `IndexReason` for a
	/// key, used only for debugging/inspection. Not required by the spec's
	/// public interface but handy for tests.
	#[cfg(test)]
	pub fn reason_for(&self, hash: &Hash, pk: &PublicKey) -> Option<IndexReason> {
		self.by_hash
			.get(hash)
			.and_then(|e| e.metadata.as_ref())
			.and_then(|m| m.keys.iter().find(|(k, _)| k == pk).map(|(_, r)| *r))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entry::Entry;
	use txpool_core::tx::{Output, OutPoint as Op, Transaction, TxIn, TxKind};

	fn sample_entry(seed: u8, fee: u64, size: u64) -> Entry {
		let tx = Transaction {
			inputs: vec![TxIn {
				previous_output: Op::new(Hash::from_slice(&[seed; 32]), 0),
			}],
			outputs: vec![Output {
				value: 100,
				pubkey: PublicKey([seed; 33]),
			}],
			kind: TxKind::Standard,
			lock_height: 0,
		};
		let metadata = Some(crate::entry::EntryMetadata::compute(&tx, &[]));
		Entry::new(vec![seed], tx, size, seed as i64, 1, fee, metadata)
	}

	#[test]
	fn insert_then_lookup_round_trips() {
		let mut idx = PrimaryIndex::new(1_000_000);
		let e = sample_entry(1, 100, 100);
		let hash = e.hash;
		let outpoint = e.tx.inputs[0].previous_output;
		idx.insert(e).unwrap();
		assert!(idx.contains(&hash));
		assert_eq!(idx.spender_of(&outpoint), Some(hash));
		assert_eq!(idx.size_bytes(), 100);
	}

	#[test]
	fn remove_undoes_all_maps() {
		let mut idx = PrimaryIndex::new(1_000_000);
		let e = sample_entry(2, 100, 100);
		let hash = e.hash;
		let outpoint = e.tx.inputs[0].previous_output;
		idx.insert(e).unwrap();
		idx.remove(&hash);
		assert!(!idx.contains(&hash));
		assert_eq!(idx.spender_of(&outpoint), None);
		assert_eq!(idx.size_bytes(), 0);
	}

	#[test]
	fn insert_rejects_over_capacity() {
		let mut idx = PrimaryIndex::new(150);
		idx.insert(sample_entry(3, 100, 100)).unwrap();
		let err = idx.insert(sample_entry(4, 100, 100)).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::InsufficientFeePriorityQueue);
		assert_eq!(idx.size_bytes(), 100);
	}
}
