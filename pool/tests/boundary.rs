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

//! One integration test per numbered boundary scenario in spec.md §8,
//! exercised through the public `Pool` surface rather than the `Engine`
//! internals the unit tests in `pool/src/admission.rs` already cover.

use std::collections::HashMap;
use std::sync::Arc;

use txpool::{Block, Clock, Hash, OutPoint, PoolSettings, PublicKey, StaticChain, Transaction, TxKind};
use txpool_core::clock::TestClock;
use txpool_core::tx::{CrossChainPayload, Output, TxIn};
use txpool_core::view::Utxo;

#[derive(Clone, Default)]
struct MapUtxo(HashMap<OutPoint, Output>);

impl Utxo for MapUtxo {
	fn get_output(&self, outpoint: &OutPoint) -> Option<Output> {
		self.0.get(outpoint).cloned()
	}
}

fn funded_chain(value: u64, pk: PublicKey) -> (Arc<StaticChain<MapUtxo>>, OutPoint) {
	let mut base = MapUtxo::default();
	let outpoint = OutPoint::new(Hash::from_slice(&[9u8; 32]), 0);
	base.0.insert(outpoint, Output { value, pubkey: pk });
	(Arc::new(StaticChain::new(base, 0)), outpoint)
}

fn test_clock(now_ms: i64) -> Arc<dyn Clock> {
	Arc::new(TestClock::new(now_ms))
}

/// Default settings regenerate the read snapshot only every 1000 processed
/// transactions or once a full second of wall-clock time has passed; with a
/// pinned `TestClock` the time trigger never fires, so every test that reads
/// `contains`/`get`/`entries_ordered_by_time` right after a plain `process`
/// call needs the transaction-count trigger turned down to 1.
fn settings_with_immediate_snapshot() -> PoolSettings {
	let mut settings = PoolSettings::default();
	settings.snapshot_every_n_txns = 1;
	settings
}

/// Scenario 1: a single well-formed, well-funded transaction is admitted and
/// its fee rate matches the spec's worked example (fee 100 / size 100 -> 1000
/// per kb).
#[test]
fn scenario_1_simple_admit() {
	let a = PublicKey([1u8; 33]);
	let b = PublicKey([2u8; 33]);
	let (chain, outpoint) = funded_chain(10_000, a);
	let pool = txpool::Pool::new(chain, settings_with_immediate_snapshot(), test_clock(0));

	let tx = Transaction {
		inputs: vec![TxIn { previous_output: outpoint }],
		outputs: vec![Output { value: 9_900, pubkey: b }],
		kind: TxKind::Standard,
		lock_height: 0,
	};
	let hash = tx.pool_hash();
	let admitted = pool
		.process(tx, false, false, "peer".into(), false)
		.expect("well-funded standard tx admits");
	assert_eq!(admitted.len(), 1);
	assert!(pool.contains(&hash));
}

/// Scenario 2: a transaction spending an output that does not yet exist in
/// the pool is tracked as an orphan, then promoted once its parent lands.
#[test]
fn scenario_2_orphan_then_promotion() {
	let a = PublicKey([1u8; 33]);
	let b = PublicKey([2u8; 33]);
	let c = PublicKey([3u8; 33]);
	let (chain, outpoint) = funded_chain(10_000, a);
	let pool = txpool::Pool::new(chain, settings_with_immediate_snapshot(), test_clock(0));

	let parent = Transaction {
		inputs: vec![TxIn { previous_output: outpoint }],
		outputs: vec![Output { value: 9_900, pubkey: b }],
		kind: TxKind::Standard,
		lock_height: 0,
	};
	let parent_hash = parent.pool_hash();
	let child_outpoint = OutPoint::new(parent_hash, 0);

	let child = Transaction {
		inputs: vec![TxIn { previous_output: child_outpoint }],
		outputs: vec![Output { value: 9_800, pubkey: c }],
		kind: TxKind::Standard,
		lock_height: 0,
	};
	let child_hash = child.pool_hash();

	pool.process(child, true, false, "peer".into(), false)
		.expect_err("unconnected tx is tracked as an orphan, not admitted outright");
	assert!(!pool.contains(&child_hash));

	pool.process(parent, true, false, "peer".into(), false)
		.expect("parent admits");
	assert!(pool.contains(&parent_hash));
	assert!(pool.contains(&child_hash), "orphan should be promoted once its parent lands");
}

/// Scenario 3: submitting a transaction that double-spends an already
/// admitted orphan's input invalidates that orphan instead of admitting two
/// conflicting spends of the same output.
#[test]
fn scenario_3_double_spend_invalidates_orphan() {
	let a = PublicKey([1u8; 33]);
	let b = PublicKey([2u8; 33]);
	let c = PublicKey([3u8; 33]);
	let (chain, outpoint) = funded_chain(10_000, a);
	let pool = txpool::Pool::new(chain, settings_with_immediate_snapshot(), test_clock(0));

	let parent = Transaction {
		inputs: vec![TxIn { previous_output: outpoint }],
		outputs: vec![Output { value: 9_900, pubkey: b }],
		kind: TxKind::Standard,
		lock_height: 0,
	};
	let parent_hash = parent.pool_hash();
	let child_outpoint = OutPoint::new(parent_hash, 0);

	let orphan_child = Transaction {
		inputs: vec![TxIn { previous_output: child_outpoint }],
		outputs: vec![Output { value: 9_800, pubkey: c }],
		kind: TxKind::Standard,
		lock_height: 0,
	};
	let orphan_hash = orphan_child.pool_hash();

	let double_spend_child = Transaction {
		inputs: vec![TxIn { previous_output: child_outpoint }],
		outputs: vec![Output { value: 9_700, pubkey: c }],
		kind: TxKind::Standard,
		lock_height: 1,
	};
	let double_spend_hash = double_spend_child.pool_hash();

	pool.process(orphan_child, true, false, "peer".into(), false)
		.expect_err("tracked as orphan, not admitted outright");
	assert!(!pool.contains(&orphan_hash));

	pool.process(parent, true, false, "peer".into(), false)
		.expect("parent admits and promotes the orphan");
	assert!(pool.contains(&orphan_hash));

	pool.process(double_spend_child, false, false, "peer".into(), false)
		.expect_err("double-spending the same outpoint must not admit");
	assert!(pool.contains(&orphan_hash), "original spend stays in place");
	assert!(!pool.contains(&double_spend_hash));
}

/// Scenario 4: repeated low (but above the hard floor) fee-rate transactions
/// eventually trip the soft rate limit once the decay accumulator exceeds
/// its threshold.
#[test]
fn scenario_4_rate_limit_trips() {
	let a = PublicKey([1u8; 33]);
	let b = PublicKey([2u8; 33]);
	let mut base = MapUtxo::default();
	let mut outpoints = Vec::new();
	for i in 0..1600u32 {
		let outpoint = OutPoint::new(Hash::from_slice(&[1u8; 32]), i);
		base.0.insert(outpoint, Output { value: 10_000, pubkey: a });
		outpoints.push(outpoint);
	}
	let chain = Arc::new(StaticChain::new(base, 0));

	let mut settings = PoolSettings::default();
	settings.soft_rate_limit_fee_rate_per_kb = 10;
	settings.rate_limit_threshold_bytes = 150_000.0;
	let pool = txpool::Pool::new(chain, settings, test_clock(0));

	let mut last_result = Ok(Vec::new());
	for outpoint in outpoints {
		let tx = Transaction {
			inputs: vec![TxIn { previous_output: outpoint }],
			outputs: vec![Output { value: 9_999, pubkey: b }],
			kind: TxKind::Standard,
			lock_height: 0,
		};
		last_result = pool.process(tx, false, true, "peer".into(), false);
		if last_result.is_err() {
			break;
		}
	}
	last_result.expect_err("enough cumulative low-fee bytes should trip the soft rate limit");
}

/// Scenario 5: a block connect then disconnect round-trips the pool back to
/// (functionally) where it started, preserving relative admission ordering.
#[test]
fn scenario_5_reorg_round_trip() {
	let a = PublicKey([1u8; 33]);
	let b = PublicKey([2u8; 33]);
	let mut base = MapUtxo::default();
	let outpoint_1 = OutPoint::new(Hash::from_slice(&[1u8; 32]), 0);
	let outpoint_2 = OutPoint::new(Hash::from_slice(&[2u8; 32]), 0);
	base.0.insert(outpoint_1, Output { value: 10_000, pubkey: a });
	base.0.insert(outpoint_2, Output { value: 10_000, pubkey: a });
	let chain = Arc::new(StaticChain::new(base, 0));
	let pool = txpool::Pool::new(chain, settings_with_immediate_snapshot(), test_clock(0));

	let tx1 = Transaction {
		inputs: vec![TxIn { previous_output: outpoint_1 }],
		outputs: vec![Output { value: 9_900, pubkey: b }],
		kind: TxKind::Standard,
		lock_height: 0,
	};
	let tx2 = Transaction {
		inputs: vec![TxIn { previous_output: outpoint_2 }],
		outputs: vec![Output { value: 9_900, pubkey: b }],
		kind: TxKind::Standard,
		lock_height: 0,
	};
	let hash1 = tx1.pool_hash();
	let hash2 = tx2.pool_hash();

	pool.process(tx1.clone(), false, false, "peer".into(), false).unwrap();
	pool.process(tx2.clone(), false, false, "peer".into(), false).unwrap();

	let order_before: Vec<Hash> = pool
		.entries_ordered_by_time()
		.iter()
		.map(|e| e.hash)
		.collect();
	assert_eq!(order_before, vec![hash1, hash2]);

	let block = Block { height: 0, transactions: vec![tx1.clone()] };
	pool.on_block_connect(&block);
	assert!(!pool.contains(&hash1), "mined tx leaves the pool on connect");
	assert!(pool.contains(&hash2));

	pool.on_block_disconnect(&block);
	assert!(pool.contains(&hash1), "disconnect restores the mined tx");
	assert!(pool.contains(&hash2));

	let order_after: Vec<Hash> = pool
		.entries_ordered_by_time()
		.iter()
		.map(|e| e.hash)
		.collect();
	assert_eq!(
		order_after,
		vec![hash1, hash2],
		"disconnect-then-replay restores the original temporal ordering"
	);
}

/// Scenario 6: an unmined cross-chain exchange transaction is admitted
/// speculatively, then a matured version carrying the same identity hash but
/// a merkle proof of inclusion upgrades the stored payload in place, without
/// disturbing the entry's admission time or fee-heap position.
#[test]
fn scenario_6_cross_chain_upgrade_in_place() {
	let funding_key = PublicKey([5u8; 33]);
	let mint_recipient = PublicKey([6u8; 33]);
	let chain = Arc::new(StaticChain::new(MapUtxo::default(), 0));
	let clock = test_clock(1_000);
	let pool = txpool::Pool::new(chain, settings_with_immediate_snapshot(), clock);

	let unmined_payload = CrossChainPayload {
		foreign_tx: vec![1, 2, 3],
		foreign_inputs: vec![OutPoint::new(Hash::from_slice(&[0xAA; 32]), 0)],
		foreign_outputs: vec![2_000],
		funding_key,
		burn_output_total: 2_000,
		merkle_proof: None,
	};
	let unmined_tx = Transaction {
		inputs: vec![],
		outputs: vec![Output { value: 1_000, pubkey: mint_recipient }],
		kind: TxKind::CrossChainExchange(unmined_payload.clone()),
		lock_height: 0,
	};
	let hash = unmined_tx.pool_hash();

	pool.process(unmined_tx, false, false, "peer".into(), false)
		.expect("unmined cross-chain exchange admits speculatively");
	assert!(pool.contains(&hash));

	let before = pool.get(&hash).expect("entry present after first admission");
	let fee_per_kb_before = before.fee_per_kb;
	let admitted_at_before = before.admitted_at_ms;
	match &before.tx.kind {
		TxKind::CrossChainExchange(p) => assert!(p.merkle_proof.is_none()),
		_ => panic!("wrong kind"),
	}

	let mined_payload = CrossChainPayload {
		merkle_proof: Some(vec![9, 9, 9]),
		..unmined_payload
	};
	let mined_tx = Transaction {
		inputs: vec![],
		outputs: vec![Output { value: 1_000, pubkey: mint_recipient }],
		kind: TxKind::CrossChainExchange(mined_payload),
		lock_height: 0,
	};
	assert_eq!(mined_tx.pool_hash(), hash, "maturing must not change the pool identity hash");

	pool.process(mined_tx, false, false, "peer".into(), false)
		.expect("matured cross-chain exchange upgrades the existing entry");

	assert!(pool.contains(&hash), "entry stays present across the upgrade");
	let after = pool.get(&hash).expect("entry present after upgrade");
	assert_eq!(after.fee_per_kb, fee_per_kb_before, "fee rate, and so heap position, must not move");
	assert_eq!(after.admitted_at_ms, admitted_at_before, "admission time must not change");
	match &after.tx.kind {
		TxKind::CrossChainExchange(p) => assert!(p.merkle_proof.is_some(), "stored payload now carries the merkle proof"),
		_ => panic!("wrong kind"),
	}
}

/// Spec §6 `evict_unmined_cross_chain`: an unmined cross-chain exchange is
/// evictable on request, a matured one is not, and `dry_run` reports the
/// same outcome without actually removing anything.
#[test]
fn evict_unmined_cross_chain_only_touches_unmined_entries() {
	let funding_key = PublicKey([7u8; 33]);
	let mint_recipient = PublicKey([8u8; 33]);
	let chain = Arc::new(StaticChain::new(MapUtxo::default(), 0));
	let clock = test_clock(1_000);
	let pool = txpool::Pool::new(chain, settings_with_immediate_snapshot(), clock);

	let unmined_payload = CrossChainPayload {
		foreign_tx: vec![4, 5, 6],
		foreign_inputs: vec![OutPoint::new(Hash::from_slice(&[0xBB; 32]), 0)],
		foreign_outputs: vec![2_000],
		funding_key,
		burn_output_total: 2_000,
		merkle_proof: None,
	};
	let unmined_tx = Transaction {
		inputs: vec![],
		outputs: vec![Output { value: 1_000, pubkey: mint_recipient }],
		kind: TxKind::CrossChainExchange(unmined_payload),
		lock_height: 0,
	};
	let unmined_hash = unmined_tx.pool_hash();
	pool.process(unmined_tx, false, false, "peer".into(), false)
		.expect("unmined cross-chain exchange admits speculatively");

	let unrelated_hash = Hash::from_slice(&[0xCC; 32]);

	let dry = pool.evict_unmined_cross_chain(&[unmined_hash, unrelated_hash], true);
	assert_eq!(dry.evicted, vec![unmined_hash]);
	assert_eq!(dry.unmined, vec![unmined_hash]);
	assert_eq!(dry.per_type_evicted.get("cross_chain_exchange"), Some(&1));
	assert!(pool.contains(&unmined_hash), "dry run must not mutate the pool");

	let real = pool.evict_unmined_cross_chain(&[unmined_hash, unrelated_hash], false);
	assert_eq!(real.evicted, vec![unmined_hash]);
	assert_eq!(real.remaining_count, 0);
	assert!(!pool.contains(&unmined_hash), "real run evicts the unmined entry");
}
