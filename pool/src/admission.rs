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

//! Component E: the admission engine (spec §4.E). Orchestrates validation
//! order, the low-fee decay accumulator, the cross-chain exchange path
//! (§4.E.2) and the promotion cascade.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, warn};

use txpool_core::tx::{CrossChainPayload, TxKind};
use txpool_core::view::SpeculativeView;
use txpool_core::{Hash, Hashed, OutPoint, PublicKey, Transaction};

use txpool_config::PoolSettings;

use crate::entry::{fee_rate_per_kb, Entry, EntryMetadata};
use crate::error::{Error, ErrorKind};
use crate::orphan_index::OrphanIndex;
use crate::primary_index::PrimaryIndex;

/// Outcome of attempting to admit a single transaction, before the
/// promotion cascade runs (spec §4.E steps 1-9).
enum AdmitOutcome {
	Admitted(Arc<Entry>),
	MissingParents(Transaction, Vec<Hash>),
}

/// The writer-side state guarded by `M` in spec §5: primary index, the two
/// speculative views, the orphan index and the low-fee decay accumulator.
/// Generic over the concrete `SpeculativeView` so it can be driven either by
/// the reference `txpool::chain::LedgerOverlay` or by a test double.
pub struct Engine<V: SpeculativeView> {
	universal_view: V,
	backup_view: V,
	primary: PrimaryIndex,
	orphans: OrphanIndex,
	/// Admission-time-ordered hashes (spec §3 invariant 5, §5 "Ordering
	/// guarantees"). Temporal order, not heap order.
	admission_order: Vec<Hash>,
	low_fee_accumulator: f64,
	low_fee_last_update_ms: i64,
	settings: PoolSettings,
	clock: Arc<dyn txpool_core::Clock>,
	/// Chain height at which the next admission is recorded (tip + 1).
	height: u64,
}

impl<V: SpeculativeView> Engine<V> {
	/// Builds an empty engine over `view` (already cloned twice by the
	/// caller is not required; the engine clones its own backup).
	pub fn new(view: V, settings: PoolSettings, clock: Arc<dyn txpool_core::Clock>, height: u64) -> Engine<V> {
		let backup_view = view.clone_view();
		let now = clock.now_ms();
		Engine {
			universal_view: view,
			backup_view,
			primary: PrimaryIndex::new(settings.max_pool_size_bytes),
			orphans: OrphanIndex::with_limits(
				settings.orphan_max_size_bytes,
				settings.orphan_max_count,
				settings.orphan_expiry_secs * 1000,
			),
			admission_order: Vec::new(),
			low_fee_accumulator: 0.0,
			low_fee_last_update_ms: now,
			settings,
			clock,
			height,
		}
	}

	/// Number of admitted entries (spec §6 `count`).
	pub fn count(&self) -> usize {
		self.primary.len()
	}

	/// Whether `hash` is currently admitted (spec §6 `contains`).
	pub fn contains(&self, hash: &Hash) -> bool {
		self.primary.contains(hash)
	}

	/// Looks up an admitted entry by hash (spec §6 `get`).
	pub fn get(&self, hash: &Hash) -> Option<Arc<Entry>> {
		self.primary.get(hash)
	}

	/// The hash of the entry currently spending `outpoint` (spec §6
	/// `spender_of`).
	pub fn spender_of(&self, outpoint: &OutPoint) -> Option<Hash> {
		self.primary.spender_of(outpoint)
	}

	/// Entries in admission order (spec §6 `entries_ordered_by_time`).
	pub fn entries_ordered_by_time(&self) -> Vec<Arc<Entry>> {
		self.admission_order
			.iter()
			.filter_map(|h| self.primary.get(h))
			.collect()
	}

	/// Entries naming `pk` (spec §6 `entries_for_pubkey`).
	pub fn entries_for_pubkey(&self, pk: &PublicKey) -> Vec<Arc<Entry>> {
		self.primary.entries_for_pubkey(pk)
	}

	/// A clone of the current universal view (spec §6 `augmented_view`).
	pub fn augmented_view(&self) -> V {
		self.universal_view.clone_view()
	}

	/// Read-only access to the orphan index, used by the snapshot and
	/// reorg components.
	pub fn orphans(&self) -> &OrphanIndex {
		&self.orphans
	}

	/// Removes every orphan past its expiry deadline (spec §3 Orphan, §4.D).
	/// Called periodically by the snapshot-regeneration worker.
	pub fn sweep_expired_orphans(&mut self, now_ms: i64) {
		self.orphans.sweep_expired(now_ms);
	}

	/// Read-only access to the primary index.
	pub fn primary(&self) -> &PrimaryIndex {
		&self.primary
	}

	/// The chain height this engine currently records admissions at.
	pub fn height(&self) -> u64 {
		self.height
	}

	/// Updates the height recorded against future admissions (called by the
	/// reorg reconciler before replaying transactions at a new tip).
	pub fn set_height(&mut self, height: u64) {
		self.height = height;
	}

	/// The public admission operation (spec §4.E "process-transaction").
	/// Returns the candidate plus every orphan promoted by its admission.
	pub fn process(
		&mut self,
		tx: Transaction,
		allow_orphan: bool,
		rate_limit: bool,
		peer_id: String,
		verify_sigs: bool,
	) -> Result<Vec<Arc<Entry>>, Error> {
		match self.admit_one(tx, rate_limit, verify_sigs, true)? {
			AdmitOutcome::Admitted(entry) => {
				let mut admitted = vec![entry.clone()];
				let promoted = self.cascade(&admitted, rate_limit, verify_sigs);
				admitted.extend(promoted);
				Ok(admitted)
			}
			AdmitOutcome::MissingParents(tx, missing) => {
				if allow_orphan {
					let raw = txpool_core::ser::ser_vec(&tx).unwrap_or_default();
					let size = raw.len() as u64;
					if let Err(e) = self.orphans.add(tx, peer_id, size, self.clock.now_ms()) {
						return Err(e);
					}
				}
				Err(ErrorKind::UnconnectedNotAllowed(missing).into())
			}
		}
	}

	/// Steps 1-9 of spec §4.E: validates and, on success, commits `tx` to
	/// the primary index and the universal view. Does not run the
	/// promotion cascade (step 10); callers that want it use `process`.
	fn admit_one(
		&mut self,
		tx: Transaction,
		rate_limit: bool,
		verify_sigs: bool,
		check_orphan_duplicate: bool,
	) -> Result<AdmitOutcome, Error> {
		// Step 1.
		if tx.kind == TxKind::BlockReward {
			return Err(ErrorKind::IndividualBlockReward.into());
		}
		// Step 2.
		if let TxKind::CrossChainExchange(_) = &tx.kind {
			return self.admit_cross_chain(tx, verify_sigs);
		}

		// Step 3.
		let hash = tx.pool_hash();
		if self.primary.contains(&hash) {
			return Err(ErrorKind::Duplicate.into());
		}
		if check_orphan_duplicate && self.orphans.contains(&hash) {
			return Err(ErrorKind::Duplicate.into());
		}

		// Step 4.
		let mut missing = Vec::new();
		let mut input_owners = Vec::with_capacity(tx.inputs.len());
		for input in &tx.inputs {
			match self.universal_view.get_output(&input.previous_output) {
				Some(out) => input_owners.push(out.pubkey),
				None => missing.push(input.previous_output.hash),
			}
		}
		if !missing.is_empty() {
			let mut seen = HashSet::new();
			missing.retain(|h| seen.insert(*h));
			return Ok(AdmitOutcome::MissingParents(tx, missing));
		}

		// Step 5.
		let outcome = match self
			.backup_view
			.connect(&tx, hash, 0, self.height, verify_sigs, false, false)
		{
			Ok(o) => o,
			Err(e) => {
				self.rebuild_backup();
				return Err(e.into());
			}
		};

		// Step 6.
		let raw = txpool_core::ser::ser_vec(&tx).map_err(|e| ErrorKind::Internal(e.to_string()))?;
		let size = raw.len() as u64;
		let fee = outcome.fee;
		let fee_per_kb = fee_rate_per_kb(fee, size);

		// Step 7.
		if rate_limit && fee_per_kb < self.settings.min_fee_rate_per_kb {
			self.rebuild_backup();
			return Err(ErrorKind::InsufficientFeeMinFee.into());
		}

		// Step 8.
		if rate_limit && fee_per_kb < self.settings.soft_rate_limit_fee_rate_per_kb {
			self.decay_low_fee_accumulator();
			if self.low_fee_accumulator + size as f64 > self.settings.rate_limit_threshold_bytes {
				self.rebuild_backup();
				return Err(ErrorKind::InsufficientFeeRateLimit.into());
			}
			self.low_fee_accumulator += size as f64;
		}

		// Step 9: commit.
		let metadata = Some(EntryMetadata::compute(&tx, &input_owners));
		let entry = Entry::new(raw, tx, size, self.clock.now_ms(), self.height, fee, metadata);
		let committed_hash = entry.hash;
		let entry = self.primary.insert(entry)?;
		self.universal_view
			.connect(&entry.tx, committed_hash, size, self.height, verify_sigs, false, false)
			.map_err(|e| {
				warn!("universal view connect failed after pre-flight succeeded: {}", e);
				ErrorKind::Internal(e.to_string())
			})?;
		self.admission_order.push(committed_hash);

		Ok(AdmitOutcome::Admitted(entry))
	}

	/// The cross-chain exchange sub-path (spec §4.E.2).
	fn admit_cross_chain(&mut self, tx: Transaction, verify_sigs: bool) -> Result<AdmitOutcome, Error> {
		let payload = match &tx.kind {
			TxKind::CrossChainExchange(p) => p.clone(),
			_ => return Err(ErrorKind::Internal("admit_cross_chain called on non-exchange tx".into()).into()),
		};
		self.precheck_cross_chain(&payload)?;

		let hash = tx.pool_hash();

		if payload.is_mined() {
			if let Some(existing) = self.primary.get(&hash) {
				let mut trial = self.universal_view.clone_view();
				trial
					.connect(&tx, hash, 0, self.height, verify_sigs, true, true)
					.map_err(|_| ErrorKind::DuplicateCrossChainExchange)?;
				let raw =
					txpool_core::ser::ser_vec(&tx).map_err(|e| ErrorKind::Internal(e.to_string()))?;
				self.primary.replace_payload(&hash, tx, raw);
				let replaced = self
					.primary
					.get(&hash)
					.unwrap_or(existing);
				return Ok(AdmitOutcome::Admitted(replaced));
			}
			self.admit_cross_chain_fresh(tx, hash, verify_sigs, true)
		} else {
			self.admit_cross_chain_fresh(tx, hash, verify_sigs, false)
		}
	}

	fn admit_cross_chain_fresh(
		&mut self,
		tx: Transaction,
		hash: Hash,
		verify_sigs: bool,
		check_burn_proof: bool,
	) -> Result<AdmitOutcome, Error> {
		let outcome = match self
			.backup_view
			.connect(&tx, hash, 0, self.height, verify_sigs, check_burn_proof, false)
		{
			Ok(o) => o,
			Err(e) => {
				self.rebuild_backup();
				return Err(e.into());
			}
		};
		let raw = txpool_core::ser::ser_vec(&tx).map_err(|e| ErrorKind::Internal(e.to_string()))?;
		let size = raw.len() as u64;
		let metadata = Some(EntryMetadata::compute(&tx, &[]));
		let entry = Entry::new(raw, tx, size, self.clock.now_ms(), self.height, outcome.fee, metadata);
		let entry = self.primary.insert(entry)?;
		self.universal_view
			.connect(&entry.tx, hash, size, self.height, verify_sigs, check_burn_proof, false)
			.map_err(|e| ErrorKind::Internal(e.to_string()))?;
		self.admission_order.push(hash);
		Ok(AdmitOutcome::Admitted(entry))
	}

	fn precheck_cross_chain(&self, payload: &CrossChainPayload) -> Result<(), Error> {
		let foreign_txid = payload.foreign_tx.as_slice().hash();
		if self.settings.nuked_foreign_txids.contains(&foreign_txid) {
			return Err(ErrorKind::CrossChainExchangeNuked.into());
		}
		let mut seen = HashSet::new();
		for input in &payload.foreign_inputs {
			if !seen.insert(*input) {
				return Err(ErrorKind::CrossChainExchangeComputeBurnOutput(
					"duplicate foreign input".into(),
				)
				.into());
			}
		}
		for output in &payload.foreign_outputs {
			if *output < self.settings.burn_dust_threshold {
				return Err(ErrorKind::CrossChainExchangeComputeBurnOutput(
					"foreign output below dust threshold".into(),
				)
				.into());
			}
		}
		if payload.funding_key == PublicKey([0u8; 33]) {
			return Err(ErrorKind::CrossChainExchangeInvalidPublicKey.into());
		}
		if payload.funding_key.is_burn_address() {
			return Err(ErrorKind::BurnAddressCannotBurn.into());
		}
		if payload.burn_output_total == 0 {
			return Err(ErrorKind::CrossChainExchangeTotalOutputNonPositive.into());
		}
		Ok(())
	}

	/// `2^(-Δt / half_life)` decay applied to the low-fee accumulator.
	fn decay_low_fee_accumulator(&mut self) {
		let now = self.clock.now_ms();
		let delta_secs = (now - self.low_fee_last_update_ms).max(0) as f64 / 1000.0;
		let half_life = self.settings.rate_limit_half_life_secs.max(1) as f64;
		self.low_fee_accumulator *= (2f64).powf(-delta_secs / half_life);
		self.low_fee_last_update_ms = now;
	}

	/// Current low-fee decay accumulator value, decayed to now. Exposed for
	/// tests and for the snapshot component's diagnostics.
	pub fn low_fee_accumulator(&mut self) -> f64 {
		self.decay_low_fee_accumulator();
		self.low_fee_accumulator
	}

	fn rebuild_backup(&mut self) {
		self.backup_view = self.universal_view.clone_view();
	}

	/// Step 10: the promotion cascade. `accepted` is the just-admitted
	/// transaction (and, on recursive calls, nothing else — the seed is
	/// always length 1); returns every orphan promoted as a result.
	fn cascade(&mut self, accepted: &[Arc<Entry>], rate_limit: bool, verify_sigs: bool) -> Vec<Arc<Entry>> {
		let mut worklist: Vec<Hash> = accepted.iter().map(|e| e.hash).collect();
		let mut newly_admitted = Vec::new();
		let mut i = 0;
		while i < worklist.len() {
			let item_hash = worklist[i];
			i += 1;
			let n_outputs = match self.primary.get(&item_hash) {
				Some(e) => e.tx.outputs.len(),
				None => continue,
			};
			for out_idx in 0..n_outputs {
				let outpoint = OutPoint::new(item_hash, out_idx as u32);
				for child_hash in self.orphans.children_of(&outpoint) {
					let orphan_tx = match self.orphans.get(&child_hash) {
						Some(o) => o.tx.clone(),
						None => continue,
					};
					match self.admit_one(orphan_tx, rate_limit, verify_sigs, false) {
						Ok(AdmitOutcome::Admitted(entry)) => {
							self.orphans.remove(&child_hash, false);
							worklist.push(entry.hash);
							newly_admitted.push(entry);
						}
						Ok(AdmitOutcome::MissingParents(_, _)) => {
							debug!("orphan {} still missing parents after promotion attempt", child_hash);
						}
						Err(e) => {
							debug!("orphan {} failed promotion validation: {}", child_hash, e);
							self.orphans.remove(&child_hash, true);
						}
					}
				}
			}
		}

		let mut just_accepted: Vec<&Arc<Entry>> = accepted.iter().collect();
		just_accepted.extend(newly_admitted.iter());
		for entry in just_accepted {
			for input in &entry.tx.inputs {
				for orphan_hash in self.orphans.children_of(&input.previous_output) {
					self.orphans.remove(&orphan_hash, true);
				}
			}
		}

		newly_admitted
	}

	/// Removes `hash` from the primary index without rebuilding the rest of
	/// the pool. Used by `evict_unmined_cross_chain`; the general `remove`
	/// operation (spec §6) rebuilds via `rebuild_from` instead (see
	/// `crate::reorg`).
	pub(crate) fn remove_entry(&mut self, hash: &Hash) -> Option<Arc<Entry>> {
		if let Some(pos) = self.admission_order.iter().position(|h| h == hash) {
			self.admission_order.remove(pos);
		}
		self.primary.remove(hash)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use txpool_core::tx::{OutPoint as Op, Output, TxIn};
	use txpool_core::view::{LedgerOverlay, Utxo};

	#[derive(Clone, Default)]
	struct MapUtxo(HashMap<OutPoint, Output>);

	impl Utxo for MapUtxo {
		fn get_output(&self, outpoint: &OutPoint) -> Option<Output> {
			self.0.get(outpoint).cloned()
		}
	}

	fn engine_with_output(value: u64, pk: PublicKey) -> (Engine<LedgerOverlay<MapUtxo>>, OutPoint) {
		let mut base = MapUtxo::default();
		let outpoint = Op::new(Hash::from_slice(&[9u8; 32]), 0);
		base.0.insert(outpoint, Output { value, pubkey: pk });
		let view = LedgerOverlay::new(base);
		let clock = Arc::new(txpool_core::clock::TestClock::new(1000));
		let engine = Engine::new(view, PoolSettings::default(), clock, 1);
		(engine, outpoint)
	}

	fn standard_tx(spend: OutPoint, value: u64, to: PublicKey) -> Transaction {
		Transaction {
			inputs: vec![TxIn { previous_output: spend }],
			outputs: vec![Output { value, pubkey: to }],
			kind: TxKind::Standard,
			lock_height: 0,
		}
	}

	#[test]
	fn simple_admit_matches_boundary_scenario_1() {
		let a = PublicKey([1u8; 33]);
		let b = PublicKey([2u8; 33]);
		let (mut engine, outpoint) = engine_with_output(10_000, a);
		let tx = standard_tx(outpoint, 9_900, b);
		let hash = tx.pool_hash();
		let admitted = engine.process(tx, false, false, "peer".into(), false).unwrap();
		assert_eq!(admitted.len(), 1);
		assert_eq!(admitted[0].fee_per_kb, 1000);
		assert!(engine.contains(&hash));
		assert_eq!(engine.spender_of(&outpoint), Some(hash));
	}

	#[test]
	fn orphan_then_promotion_matches_boundary_scenario_2() {
		let a = PublicKey([1u8; 33]);
		let b = PublicKey([2u8; 33]);
		let c = PublicKey([3u8; 33]);
		let (mut engine, outpoint) = engine_with_output(10_000, a);
		let tx1 = standard_tx(outpoint, 9_900, b);
		let tx1_hash = tx1.pool_hash();
		let tx2 = standard_tx(Op::new(tx1_hash, 0), 9_800, c);

		let err = engine
			.process(tx2.clone(), true, false, "peer".into(), false)
			.unwrap_err();
		match err.kind() {
			ErrorKind::UnconnectedNotAllowed(missing) => assert_eq!(missing, vec![tx1_hash]),
			other => panic!("unexpected error: {:?}", other),
		}
		assert!(engine.orphans().contains(&tx2.pool_hash()));

		let admitted = engine.process(tx1, false, false, "peer".into(), false).unwrap();
		assert_eq!(admitted.len(), 2);
		assert!(engine.orphans().is_empty());
	}

	#[test]
	fn double_spend_invalidates_orphan_matches_boundary_scenario_3() {
		let a = PublicKey([1u8; 33]);
		let b = PublicKey([2u8; 33]);
		let c = PublicKey([3u8; 33]);
		let d = PublicKey([4u8; 33]);
		let (mut engine, outpoint) = engine_with_output(10_000, a);
		let tx1 = standard_tx(outpoint, 9_900, b);
		let tx1_hash = tx1.pool_hash();
		let tx2 = standard_tx(Op::new(tx1_hash, 0), 9_800, c);
		engine.process(tx2.clone(), true, false, "peer".into(), false).unwrap_err();
		assert!(engine.orphans().contains(&tx2.pool_hash()));

		let tx3 = standard_tx(outpoint, 9_000, d);
		engine.process(tx3, false, false, "peer".into(), false).unwrap();
		assert!(!engine.orphans().contains(&tx2.pool_hash()));
	}

	#[test]
	fn rate_limit_trips_matches_boundary_scenario_4() {
		let mut settings = PoolSettings::default();
		settings.soft_rate_limit_fee_rate_per_kb = 10;
		settings.rate_limit_threshold_bytes = 150_000.0;
		let a = PublicKey([1u8; 33]);
		let mut base = MapUtxo::default();
		for i in 0..1600u32 {
			base.0.insert(
				Op::new(Hash::from_slice(&[1u8; 32]), i),
				Output { value: 10_000, pubkey: a },
			);
		}
		let view = LedgerOverlay::new(base);
		let clock = Arc::new(txpool_core::clock::TestClock::new(0));
		let mut engine = Engine::new(view, settings, clock, 1);

		let mut tripped = false;
		for i in 0..1600u32 {
			let tx = Transaction {
				inputs: vec![TxIn {
					previous_output: Op::new(Hash::from_slice(&[1u8; 32]), i),
				}],
				outputs: vec![Output {
					value: 10_000 - 1,
					pubkey: PublicKey([2u8; 33]),
				}],
				kind: TxKind::Standard,
				lock_height: 0,
			};
			match engine.process(tx, false, true, "peer".into(), false) {
				Ok(_) => {}
				Err(e) => {
					assert_eq!(e.kind(), ErrorKind::InsufficientFeeRateLimit);
					tripped = true;
					break;
				}
			}
		}
		assert!(tripped);
	}
}
