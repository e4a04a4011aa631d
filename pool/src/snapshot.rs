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

//! Component G: the lock-free read snapshot (spec §4.G). Readers never take
//! the writer lock; they consult a `Snapshot` published by the admission
//! engine's writer side on a cadence of "every N admissions or every T
//! seconds, whichever fires first".

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use arc_swap::ArcSwap;

use txpool_core::view::SpeculativeView;
use txpool_core::{Hash, OutPoint, PublicKey};

use crate::entry::Entry;

/// An immutable, independently-owned copy of the writer state a reader
/// needs: the admission-ordered entry list, a hash lookup table, the
/// outpoint-spender index, and a cloned view (spec §3 invariant 6: "derived
/// from one atomic read").
pub struct Snapshot<V: SpeculativeView> {
	pub sequence: u64,
	pub entries_ordered_by_time: Vec<Arc<Entry>>,
	pub by_hash: HashMap<Hash, Arc<Entry>>,
	pub spender_of: HashMap<OutPoint, Hash>,
	pub view: V,
}

impl<V: SpeculativeView> Snapshot<V> {
	/// `contains`/`get`/`entries_for_pubkey`-style reads, served entirely
	/// from this snapshot (spec §4.G "Readers ... read only the snapshot").
	pub fn contains(&self, hash: &Hash) -> bool {
		self.by_hash.contains_key(hash)
	}

	pub fn get(&self, hash: &Hash) -> Option<Arc<Entry>> {
		self.by_hash.get(hash).cloned()
	}

	/// Spec §6 `spender_of`, served entirely from this snapshot.
	pub fn spender_of(&self, outpoint: &OutPoint) -> Option<Hash> {
		self.spender_of.get(outpoint).copied()
	}

	pub fn count(&self) -> usize {
		self.by_hash.len()
	}

	pub fn entries_for_pubkey(&self, pk: &PublicKey) -> Vec<Arc<Entry>> {
		self.entries_ordered_by_time
			.iter()
			.filter(|e| {
				e.metadata
					.as_ref()
					.map(|m| m.keys.iter().any(|(k, _)| k == pk))
					.unwrap_or(false)
			})
			.cloned()
			.collect()
	}

	/// Per-type counts and byte totals (spec §6 `summary_by_type`).
	pub fn summary_by_type(&self) -> HashMap<&'static str, (usize, u64)> {
		let mut summary: HashMap<&'static str, (usize, u64)> = HashMap::new();
		for entry in &self.entries_ordered_by_time {
			let key = kind_label(&entry.tx.kind);
			let slot = summary.entry(key).or_insert((0, 0));
			slot.0 += 1;
			slot.1 += entry.size;
		}
		summary
	}
}

fn kind_label(kind: &txpool_core::tx::TxKind) -> &'static str {
	use txpool_core::tx::TxKind::*;
	match kind {
		Standard => "standard",
		BlockReward => "block_reward",
		CrossChainExchange(_) => "cross_chain_exchange",
		PrivateMessage { .. } => "private_message",
		FollowKey { .. } => "follow_key",
		CoinTrade { .. } => "coin_trade",
		IdentitySwap { .. } => "identity_swap",
		Post { .. } => "post",
		Repost { .. } => "repost",
	}
}

/// The published handle readers hold: an atomically-swappable pointer to the
/// latest `Snapshot`, plus the monotonically increasing sequence counter
/// `block_until_view_regenerated` polls.
pub struct SnapshotHandle<V: SpeculativeView> {
	current: Arc<ArcSwap<Snapshot<V>>>,
	sequence: Arc<AtomicU64>,
}

impl<V: SpeculativeView> Clone for SnapshotHandle<V> {
	fn clone(&self) -> Self {
		SnapshotHandle {
			current: self.current.clone(),
			sequence: self.sequence.clone(),
		}
	}
}

impl<V: SpeculativeView> SnapshotHandle<V> {
	/// Builds a handle already holding one snapshot (sequence 0).
	pub fn new(initial: Snapshot<V>) -> SnapshotHandle<V> {
		SnapshotHandle {
			current: Arc::new(ArcSwap::new(Arc::new(initial))),
			sequence: Arc::new(AtomicU64::new(0)),
		}
	}

	/// The current sequence number, incremented by every `publish`.
	pub fn sequence(&self) -> u64 {
		self.sequence.load(Ordering::Acquire)
	}

	/// Reader-side access to the latest published snapshot. Genuinely
	/// lock-free: `arc-swap`'s `load_full` never takes the writer lock (spec
	/// §4.G, §5 "Readers never take this lock").
	pub fn load(&self) -> Arc<Snapshot<V>> {
		self.current.load_full()
	}

	/// Writer-side: atomically publishes a new snapshot and bumps the
	/// sequence counter. Called by the snapshot-regeneration worker.
	pub fn publish(&self, mut snapshot: Snapshot<V>) {
		let next_seq = self.sequence.load(Ordering::Acquire) + 1;
		snapshot.sequence = next_seq;
		self.current.store(Arc::new(snapshot));
		self.sequence.store(next_seq, Ordering::Release);
	}

	/// Spec §4.G `block-until-view-regenerated`: polls the sequence number
	/// at 100ms intervals until it advances past `since`.
	pub fn block_until_view_regenerated(&self, since: u64) {
		while self.sequence() <= since {
			thread::sleep(Duration::from_millis(100));
		}
	}
}

/// Decides whether the writer should regenerate the snapshot now: either
/// `txns_since_last >= every_n` or `secs_since_last >= every_secs` (spec
/// §4.G, "whichever fires first").
pub fn should_regenerate(txns_since_last: u64, every_n: u64, secs_since_last: u64, every_secs: u64) -> bool {
	txns_since_last >= every_n || secs_since_last >= every_secs
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap as Map;
	use txpool_core::tx::{OutPoint, Output, TxIn, TxKind};
	use txpool_core::view::{LedgerOverlay, Utxo};
	use txpool_core::Transaction;

	#[derive(Clone, Default)]
	struct MapUtxo(Map<OutPoint, Output>);

	impl Utxo for MapUtxo {
		fn get_output(&self, outpoint: &OutPoint) -> Option<Output> {
			self.0.get(outpoint).cloned()
		}
	}

	fn sample_snapshot() -> Snapshot<LedgerOverlay<MapUtxo>> {
		let view = LedgerOverlay::new(MapUtxo::default());
		Snapshot {
			sequence: 0,
			entries_ordered_by_time: Vec::new(),
			by_hash: HashMap::new(),
			spender_of: HashMap::new(),
			view,
		}
	}

	#[test]
	fn publish_bumps_sequence_and_is_visible() {
		let handle = SnapshotHandle::new(sample_snapshot());
		assert_eq!(handle.sequence(), 0);
		handle.publish(sample_snapshot());
		assert_eq!(handle.sequence(), 1);
		assert_eq!(handle.load().sequence, 1);
	}

	#[test]
	fn regeneration_trigger_fires_on_either_condition() {
		assert!(should_regenerate(1000, 1000, 0, 1));
		assert!(should_regenerate(0, 1000, 1, 1));
		assert!(!should_regenerate(5, 1000, 0, 1));
	}

	#[test]
	fn summary_by_type_counts_and_sums_bytes() {
		let mut snap = sample_snapshot();
		let tx = Transaction {
			inputs: vec![TxIn {
				previous_output: OutPoint::new(Hash::from_slice(&[1u8; 32]), 0),
			}],
			outputs: vec![Output {
				value: 1,
				pubkey: PublicKey([2u8; 33]),
			}],
			kind: TxKind::Standard,
			lock_height: 0,
		};
		let entry = Arc::new(Entry::new(vec![0; 42], tx, 42, 0, 1, 1, None));
		snap.entries_ordered_by_time.push(entry);
		let summary = snap.summary_by_type();
		assert_eq!(summary.get("standard"), Some(&(1, 42)));
	}
}
