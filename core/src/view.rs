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

//! The speculative ledger view contract (spec §3, §4.B): a copy-on-write
//! overlay over the confirmed-chain UTXO set that the admission engine uses
//! to trial-apply candidate transactions.

use std::collections::HashMap;

use crate::error::Error;
use crate::hash::Hash;
use crate::tx::{OutPoint, Output, Transaction};

/// The effect of successfully connecting a transaction to a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOutcome {
	/// Sum of the values of every input's resolved output.
	pub total_input: u64,
	/// Sum of the values of every output the transaction creates.
	pub total_output: u64,
	/// `total_input - total_output`.
	pub fee: u64,
}

/// A read-only snapshot of confirmed-chain outputs. Production code backs
/// this with the confirmed-chain database (an external collaborator, spec
/// §6); tests back it with an in-memory map.
pub trait Utxo: Send + Sync {
	/// Looks up a confirmed-chain output by outpoint.
	fn get_output(&self, outpoint: &OutPoint) -> Option<Output>;
}

/// A copy-on-write overlay over a confirmed-chain snapshot, modeling the
/// spec §3/§4.B "speculative view". `connect` is **not** reversible: on
/// error the overlay is left in an undefined state and must be discarded
/// (spec §4.B "this asymmetry is load-bearing").
pub trait SpeculativeView: Clone + Send + Sync {
	/// Resolves an outpoint against this view: first the overlay's own
	/// pending creations/spends, then the underlying confirmed-chain state.
	fn get_output(&self, outpoint: &OutPoint) -> Option<Output>;

	/// Applies `tx`'s spends and creations to the overlay.
	///
	/// `declared_size` and `height` are informational (carried through for
	/// policy/logging, e.g. coinbase-style maturity checks a concrete
	/// implementation may add); `verify_sigs` and `check_burn_proof` gate
	/// concerns out of scope for the reference implementation but are part
	/// of the trait so a production view can wire in script/signature and
	/// foreign-chain-proof verification without changing the admission
	/// engine's call sites. `ignore_utxos` lets the reorg reconciler request
	/// a connect that only records the effect without resolving inputs
	/// against the overlay (used to replay a transaction that is about to
	/// supersede one already counted).
	fn connect(
		&mut self,
		tx: &Transaction,
		hash: Hash,
		declared_size: u64,
		height: u64,
		verify_sigs: bool,
		check_burn_proof: bool,
		ignore_utxos: bool,
	) -> Result<ConnectOutcome, Error>;

	/// A cheap, independent copy of the current overlay state.
	fn clone_view(&self) -> Self;
}

/// Reference `SpeculativeView` implementation: a `HashMap` overlay on top of
/// an injected read-only `Utxo`. Used by the reference chain wiring
/// (`txpool::chain`) and by every unit/integration test in the workspace.
#[derive(Clone)]
pub struct LedgerOverlay<U: Utxo + Clone> {
	base: U,
	/// Outputs created by transactions already applied to this overlay,
	/// keyed by outpoint. Removed again if a later connect spends them.
	created: HashMap<OutPoint, Output>,
	/// Outpoints spent by transactions already applied to this overlay,
	/// whether the output came from `base` or from `created`.
	spent: std::collections::HashSet<OutPoint>,
	/// Running total of native units purchased through the cross-chain
	/// exchange path (spec §4.B).
	pub native_units_purchased: u64,
	/// Running external-price-per-unit counter maintained by cross-chain
	/// exchange connects (spec §4.B); expressed in base units per native
	/// unit, 0 until the first cross-chain connect sets it.
	pub external_price_per_unit: u64,
}

impl<U: Utxo + Clone> LedgerOverlay<U> {
	/// Builds an overlay with no pending effects over `base`.
	pub fn new(base: U) -> Self {
		LedgerOverlay {
			base,
			created: HashMap::new(),
			spent: std::collections::HashSet::new(),
			native_units_purchased: 0,
			external_price_per_unit: 0,
		}
	}
}

impl<U: Utxo + Clone + Send + Sync> SpeculativeView for LedgerOverlay<U> {
	fn get_output(&self, outpoint: &OutPoint) -> Option<Output> {
		if self.spent.contains(outpoint) {
			return None;
		}
		if let Some(out) = self.created.get(outpoint) {
			return Some(out.clone());
		}
		self.base.get_output(outpoint)
	}

	fn connect(
		&mut self,
		tx: &Transaction,
		hash: Hash,
		_declared_size: u64,
		_height: u64,
		_verify_sigs: bool,
		check_burn_proof: bool,
		ignore_utxos: bool,
	) -> Result<ConnectOutcome, Error> {
		let mut total_input = 0u64;
		if !ignore_utxos {
			for input in &tx.inputs {
				let out = self
					.get_output(&input.previous_output)
					.ok_or(crate::error::ErrorKind::OutputNotFound)?;
				total_input += out.value;
				self.spent.insert(input.previous_output);
				self.created.remove(&input.previous_output);
			}
		}

		let total_output = tx.output_value();

		if let crate::tx::TxKind::CrossChainExchange(payload) = &tx.kind {
			if check_burn_proof && payload.merkle_proof.is_none() {
				return Err(
					crate::error::ErrorKind::ViewConnect("burn proof missing".into()).into(),
				);
			}
			self.native_units_purchased += total_output;
			if payload.burn_output_total > 0 {
				self.external_price_per_unit = payload.burn_output_total / total_output.max(1);
			}
		}

		for (i, output) in tx.outputs.iter().enumerate() {
			self.created
				.insert(OutPoint::new(hash, i as u32), output.clone());
		}

		let fee = total_input.saturating_sub(total_output);
		Ok(ConnectOutcome {
			total_input,
			total_output,
			fee,
		})
	}

	fn clone_view(&self) -> Self {
		self.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pubkey::PublicKey;
	use crate::tx::TxIn;

	#[derive(Clone, Default)]
	struct MapUtxo(HashMap<OutPoint, Output>);

	impl Utxo for MapUtxo {
		fn get_output(&self, outpoint: &OutPoint) -> Option<Output> {
			self.0.get(outpoint).cloned()
		}
	}

	fn funded_view(value: u64) -> (LedgerOverlay<MapUtxo>, OutPoint) {
		let mut base = MapUtxo::default();
		let outpoint = OutPoint::new(Hash::from_slice(&[9u8; 32]), 0);
		base.0.insert(
			outpoint,
			Output {
				value,
				pubkey: PublicKey([1u8; 33]),
			},
		);
		(LedgerOverlay::new(base), outpoint)
	}

	#[test]
	fn connect_spends_input_and_creates_output() {
		let (mut view, outpoint) = funded_view(10_000);
		let tx = Transaction {
			inputs: vec![TxIn {
				previous_output: outpoint,
			}],
			outputs: vec![Output {
				value: 9_900,
				pubkey: PublicKey([2u8; 33]),
			}],
			kind: crate::tx::TxKind::Standard,
			lock_height: 0,
		};
		let hash = Hash::from_slice(&[7u8; 32]);
		let outcome = view.connect(&tx, hash, 0, 1, false, false, false).unwrap();
		assert_eq!(outcome.total_input, 10_000);
		assert_eq!(outcome.total_output, 9_900);
		assert_eq!(outcome.fee, 100);
		assert!(view.get_output(&outpoint).is_none());
		assert!(view.get_output(&OutPoint::new(hash, 0)).is_some());
	}

	#[test]
	fn connect_fails_on_missing_input() {
		let (mut view, _) = funded_view(10_000);
		let tx = Transaction {
			inputs: vec![TxIn {
				previous_output: OutPoint::new(Hash::from_slice(&[0xaa; 32]), 0),
			}],
			outputs: vec![],
			kind: crate::tx::TxKind::Standard,
			lock_height: 0,
		};
		let hash = Hash::from_slice(&[7u8; 32]);
		assert!(view.connect(&tx, hash, 0, 1, false, false, false).is_err());
	}

	#[test]
	fn clone_view_is_independent() {
		let (view, _) = funded_view(10_000);
		let mut cloned = view.clone_view();
		let tx = Transaction {
			inputs: vec![],
			outputs: vec![Output {
				value: 1,
				pubkey: PublicKey([3u8; 33]),
			}],
			kind: crate::tx::TxKind::Standard,
			lock_height: 0,
		};
		let hash = Hash::from_slice(&[5u8; 32]);
		cloned.connect(&tx, hash, 0, 1, false, false, false).unwrap();
		assert!(view.get_output(&OutPoint::new(hash, 0)).is_none());
		assert!(cloned.get_output(&OutPoint::new(hash, 0)).is_some());
	}
}
