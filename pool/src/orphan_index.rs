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

//! Component D: the orphan index (spec §4.D). Tracks transactions with
//! missing parents, keyed by hash and by the outpoints they would satisfy,
//! so the admission engine can try promoting them once a parent lands.

use std::collections::{HashMap, HashSet};

use txpool_core::{Hash, Hashed, OutPoint};

use crate::entry::Orphan;
use crate::error::{Error, ErrorKind};

/// Per spec §4.D: reject a single orphan larger than this.
pub const MAX_ORPHAN_SIZE_BYTES: u64 = 100_000;
/// Per spec §4.D: cap on the number of tracked orphans.
pub const MAX_ORPHAN_COUNT: usize = 10_000;
/// Per spec §3: orphan lifetime, admission time + 5 minutes.
pub const ORPHAN_EXPIRY_MS: i64 = 5 * 60 * 1000;

/// Two maps over unconnected transactions (spec §4.D): hash -> orphan, and
/// the reverse parent index, outpoint -> {hash}.
pub struct OrphanIndex {
	by_hash: HashMap<Hash, Orphan>,
	/// outpoint -> set of orphan hashes that spend it. Only outpoint and
	/// hash values are stored here; the transaction payload itself lives
	/// exactly once, in `by_hash` (spec §9 "cyclic children-of-parent
	/// relations").
	children_of: HashMap<OutPoint, HashSet<Hash>>,
	max_size_bytes: u64,
	max_count: usize,
	expiry_ms: i64,
}

impl OrphanIndex {
	/// An empty index using the spec's default caps.
	pub fn new() -> OrphanIndex {
		OrphanIndex::with_limits(MAX_ORPHAN_SIZE_BYTES, MAX_ORPHAN_COUNT, ORPHAN_EXPIRY_MS)
	}

	/// An empty index with explicit caps (wired from `PoolSettings`).
	pub fn with_limits(max_size_bytes: u64, max_count: usize, expiry_ms: i64) -> OrphanIndex {
		OrphanIndex {
			by_hash: HashMap::new(),
			children_of: HashMap::new(),
			max_size_bytes,
			max_count,
			expiry_ms,
		}
	}

	/// Number of tracked orphans.
	pub fn len(&self) -> usize {
		self.by_hash.len()
	}

	/// Whether the index holds no orphans.
	pub fn is_empty(&self) -> bool {
		self.by_hash.is_empty()
	}

	/// Whether `hash` is currently tracked as an orphan.
	pub fn contains(&self, hash: &Hash) -> bool {
		self.by_hash.contains_key(hash)
	}

	/// Adds `tx` to the index. Rejects it outright if its serialized size
	/// exceeds the per-orphan cap; otherwise, if the index is already at
	/// capacity, evicts an arbitrary existing orphan to make room (spec §4.D
	/// / §9: no ordering guarantee on which one).
	pub fn add(&mut self, tx: txpool_core::Transaction, peer_id: String, size: u64, now_ms: i64) -> Result<(), Error> {
		if size > self.max_size_bytes {
			return Err(ErrorKind::TooLarge.into());
		}
		if self.by_hash.len() >= self.max_count {
			if let Some(&victim) = self.by_hash.keys().next() {
				self.remove(&victim, false);
			}
		}

		let hash = tx.pool_hash();
		for input in &tx.inputs {
			self.children_of
				.entry(input.previous_output)
				.or_insert_with(HashSet::new)
				.insert(hash);
		}
		let raw = txpool_core::ser::ser_vec(&tx).unwrap_or_default();
		self.by_hash.insert(
			hash,
			Orphan {
				tx,
				raw,
				peer_id,
				received_at_ms: now_ms,
				expires_at_ms: now_ms + self.expiry_ms,
			},
		);
		Ok(())
	}

	/// Removes `hash`. If `cascade`, also recursively removes every orphan
	/// that references any of this transaction's own outputs as a parent
	/// (spec §4.D).
	pub fn remove(&mut self, hash: &Hash, cascade: bool) {
		let orphan = match self.by_hash.remove(hash) {
			Some(o) => o,
			None => return,
		};
		for input in &orphan.tx.inputs {
			if let Some(set) = self.children_of.get_mut(&input.previous_output) {
				set.remove(hash);
				if set.is_empty() {
					self.children_of.remove(&input.previous_output);
				}
			}
		}

		if cascade {
			let mut to_remove = Vec::new();
			for i in 0..orphan.tx.outputs.len() {
				let outpoint = OutPoint::new(*hash, i as u32);
				if let Some(children) = self.children_of.get(&outpoint) {
					to_remove.extend(children.iter().copied());
				}
			}
			for child in to_remove {
				self.remove(&child, true);
			}
		}
	}

	/// Every orphan that spends `outpoint`, i.e. that might be promotable
	/// now that `outpoint`'s transaction has landed (spec §4.D
	/// `children_of`).
	pub fn children_of(&self, outpoint: &OutPoint) -> Vec<Hash> {
		self.children_of
			.get(outpoint)
			.map(|set| set.iter().copied().collect())
			.unwrap_or_default()
	}

	/// The orphan record for `hash`, if tracked.
	pub fn get(&self, hash: &Hash) -> Option<&Orphan> {
		self.by_hash.get(hash)
	}

	/// Removes every orphan whose expiration is `<= now_ms` (spec §4.D
	/// `sweep_expired`, cascade = true).
	pub fn sweep_expired(&mut self, now_ms: i64) {
		let expired: Vec<Hash> = self
			.by_hash
			.iter()
			.filter(|(_, o)| o.expires_at_ms <= now_ms)
			.map(|(h, _)| *h)
			.collect();
		for hash in expired {
			self.remove(&hash, true);
		}
	}

	/// All tracked orphans, in no particular order.
	pub fn all(&self) -> impl Iterator<Item = &Orphan> {
		self.by_hash.values()
	}
}
