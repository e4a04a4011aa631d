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

//! Component F: the reorg reconciler (spec §4.F, §9 "rebuild pool"). Both
//! block connect and block disconnect are handled by materializing a fresh
//! engine and replaying the old one's entries and orphans into it in
//! dependency-safe order, then swapping it in wholesale.

use std::collections::HashSet;
use std::sync::Arc;

use txpool_core::view::SpeculativeView;
use txpool_core::{Hash, Transaction};

use txpool_config::PoolSettings;

use crate::admission::Engine;

/// A confirmed block, as seen by the reorg reconciler. Only the
/// non-coinbase transaction hashes and bodies matter here; everything else
/// about block structure/validation is the chain collaborator's concern
/// (spec §1 non-goals, §6 `Chain`).
pub struct Block {
	pub height: u64,
	/// Every non-coinbase transaction the block confirms.
	pub transactions: Vec<Transaction>,
}

impl Block {
	fn hashes(&self) -> HashSet<Hash> {
		self.transactions.iter().map(|tx| tx.pool_hash()).collect()
	}
}

/// Rebuilds `old` against a new tip height using the teacher's replay
/// pattern: instantiate a fresh engine, feed the surviving entries and
/// orphans back through full admission in dependency order, and let
/// `process` recompute the universal view and promotion cascade from
/// scratch. `exclude` names hashes that must NOT be replayed (block
/// connect: the block's own transactions).
fn rebuild_from<V: SpeculativeView>(
	old: &Engine<V>,
	fresh_view: V,
	settings: PoolSettings,
	clock: Arc<dyn txpool_core::Clock>,
	new_height: u64,
	exclude: &HashSet<Hash>,
	precedence: &[Transaction],
) -> Engine<V> {
	let mut fresh = Engine::new(fresh_view, settings, clock, new_height);

	for tx in precedence {
		let _ = fresh.process(tx.clone(), true, false, "reorg".into(), false);
	}

	for entry in old.entries_ordered_by_time() {
		if exclude.contains(&entry.hash) {
			continue;
		}
		let _ = fresh.process(entry.tx.clone(), true, false, "reorg".into(), false);
	}

	for orphan in old.orphans().all() {
		if exclude.contains(&orphan.tx.pool_hash()) {
			continue;
		}
		let _ = fresh.process(orphan.tx.clone(), true, false, orphan.peer_id.clone(), false);
	}

	fresh
}

/// Result of `on_block_connect`/`on_block_disconnect`: the rebuilt engine to
/// swap in under the writer lock, plus the hashes newly connected as a side
/// effect of replay (spec §4.F "newly-connected" diff, used for rebroadcast).
pub struct ReorgResult<V: SpeculativeView> {
	pub engine: Engine<V>,
	pub newly_connected: Vec<Hash>,
}

/// Spec §4.F "On block connect". The block's own transactions are excluded
/// from replay (they are now confirmed, not pending); any orphan promoted
/// purely because the block supplied its missing parent shows up as a hash
/// present in the new primary index but absent from the old one.
pub fn on_block_connect<V: SpeculativeView>(
	old: &Engine<V>,
	block: &Block,
	fresh_view: V,
	settings: PoolSettings,
	clock: Arc<dyn txpool_core::Clock>,
) -> ReorgResult<V> {
	let exclude = block.hashes();
	let fresh = rebuild_from(old, fresh_view, settings, clock, block.height + 1, &exclude, &[]);

	let newly_connected = fresh
		.entries_ordered_by_time()
		.into_iter()
		.map(|e| e.hash)
		.filter(|h| !old.contains(h))
		.collect();

	ReorgResult {
		engine: fresh,
		newly_connected,
	}
}

/// Spec §4.F "On block disconnect". The disconnected block's transactions
/// are fed back in first so they claim admission precedence ahead of
/// whatever was already pending.
pub fn on_block_disconnect<V: SpeculativeView>(
	old: &Engine<V>,
	block: &Block,
	fresh_view: V,
	settings: PoolSettings,
	clock: Arc<dyn txpool_core::Clock>,
) -> ReorgResult<V> {
	let exclude = HashSet::new();
	let fresh = rebuild_from(
		old,
		fresh_view,
		settings,
		clock,
		block.height,
		&exclude,
		&block.transactions,
	);

	let newly_connected = fresh
		.entries_ordered_by_time()
		.into_iter()
		.map(|e| e.hash)
		.filter(|h| !old.contains(h))
		.collect();

	ReorgResult {
		engine: fresh,
		newly_connected,
	}
}

/// Spec §6 `remove`: drops `hash` and rebuilds so anything that depended on
/// it (a child spending one of its outputs) falls back out to the orphan
/// index rather than being left dangling in the primary index.
pub fn on_remove<V: SpeculativeView>(
	old: &Engine<V>,
	hash: &Hash,
	fresh_view: V,
	settings: PoolSettings,
	clock: Arc<dyn txpool_core::Clock>,
) -> Engine<V> {
	let mut exclude = HashSet::new();
	exclude.insert(*hash);
	rebuild_from(old, fresh_view, settings, clock, old.height(), &exclude, &[])
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use txpool_core::tx::{OutPoint, Output, TxIn, TxKind};
	use txpool_core::view::{LedgerOverlay, Utxo};
	use txpool_core::PublicKey;

	#[derive(Clone, Default)]
	struct MapUtxo(HashMap<OutPoint, Output>);

	impl Utxo for MapUtxo {
		fn get_output(&self, outpoint: &OutPoint) -> Option<Output> {
			self.0.get(outpoint).cloned()
		}
	}

	fn funded(n: u8, value: u64, pk: PublicKey) -> (MapUtxo, OutPoint) {
		let mut base = MapUtxo::default();
		let outpoint = OutPoint::new(Hash::from_slice(&[n; 32]), 0);
		base.0.insert(outpoint, Output { value, pubkey: pk });
		(base, outpoint)
	}

	#[test]
	fn reorg_round_trip_matches_boundary_scenario_5() {
		let a = PublicKey([1u8; 33]);
		let b = PublicKey([2u8; 33]);
		let (base1, out1) = funded(1, 10_000, a);
		let (base2, out2) = funded(2, 10_000, a);
		let mut combined = base1;
		combined.0.extend(base2.0);
		let view = LedgerOverlay::new(combined);
		let clock: Arc<dyn txpool_core::Clock> = Arc::new(txpool_core::clock::TestClock::new(0));
		let settings = PoolSettings::default();
		let mut engine = Engine::new(view.clone(), settings.clone(), clock.clone(), 1);

		let tx1 = Transaction {
			inputs: vec![TxIn { previous_output: out1 }],
			outputs: vec![Output { value: 9_900, pubkey: b }],
			kind: TxKind::Standard,
			lock_height: 0,
		};
		let tx2 = Transaction {
			inputs: vec![TxIn { previous_output: out2 }],
			outputs: vec![Output { value: 9_900, pubkey: b }],
			kind: TxKind::Standard,
			lock_height: 0,
		};
		let tx1_hash = tx1.pool_hash();
		let tx2_hash = tx2.pool_hash();
		engine.process(tx1.clone(), false, false, "p".into(), false).unwrap();
		engine.process(tx2.clone(), false, false, "p".into(), false).unwrap();

		let block = Block {
			height: 1,
			transactions: vec![tx1.clone()],
		};
		let result = on_block_connect(&engine, &block, view.clone_view(), settings.clone(), clock.clone());
		assert!(!result.engine.contains(&tx1_hash));
		assert!(result.engine.contains(&tx2_hash));
		assert!(result.newly_connected.is_empty());

		let result = on_block_disconnect(&result.engine, &block, view.clone_view(), settings, clock);
		assert!(result.engine.contains(&tx1_hash));
		assert!(result.engine.contains(&tx2_hash));
		let order: Vec<Hash> = result
			.engine
			.entries_ordered_by_time()
			.into_iter()
			.map(|e| e.hash)
			.collect();
		let pos1 = order.iter().position(|h| *h == tx1_hash).unwrap();
		let pos2 = order.iter().position(|h| *h == tx2_hash).unwrap();
		assert!(pos1 < pos2);
	}
}
