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

//! The `Chain` external collaborator contract (spec §6) and a reference
//! wiring of it over `txpool-core::view::LedgerOverlay`. Production callers
//! implement `Chain` against the confirmed-chain database; tests and the
//! boundary scenarios use `StaticChain`.

use txpool_core::view::{LedgerOverlay, SpeculativeView, Utxo};

/// Everything the admission engine needs from the confirmed-chain
/// collaborator: the current tip height and a fresh speculative view
/// seeded from the confirmed UTXO set (spec §6 `Chain`).
pub trait Chain: Send + Sync {
	/// The concrete speculative view this chain produces.
	type View: SpeculativeView;

	/// Height of the last confirmed block.
	fn tip_height(&self) -> u64;

	/// A fresh, effect-free speculative view over the confirmed chain state
	/// (spec §6 `speculative_view_factory`).
	fn speculative_view(&self) -> Self::View;
}

/// A `Chain` over a fixed, in-memory UTXO snapshot and height. Used by
/// integration tests and as the simplest possible production wiring for a
/// chain database that already implements `Utxo`.
pub struct StaticChain<U: Utxo + Clone> {
	utxo: U,
	height: u64,
}

impl<U: Utxo + Clone> StaticChain<U> {
	pub fn new(utxo: U, height: u64) -> StaticChain<U> {
		StaticChain { utxo, height }
	}

	/// Replaces the tracked tip height, e.g. after a reorg reconciliation
	/// has swapped in a new engine at a new height.
	pub fn set_height(&mut self, height: u64) {
		self.height = height;
	}
}

impl<U: Utxo + Clone + Send + Sync> Chain for StaticChain<U> {
	type View = LedgerOverlay<U>;

	fn tip_height(&self) -> u64 {
		self.height
	}

	fn speculative_view(&self) -> LedgerOverlay<U> {
		LedgerOverlay::new(self.utxo.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use txpool_core::tx::{OutPoint, Output};

	#[derive(Clone, Default)]
	struct MapUtxo(HashMap<OutPoint, Output>);

	impl Utxo for MapUtxo {
		fn get_output(&self, outpoint: &OutPoint) -> Option<Output> {
			self.0.get(outpoint).cloned()
		}
	}

	#[test]
	fn static_chain_reports_height_and_fresh_views() {
		let chain = StaticChain::new(MapUtxo::default(), 42);
		assert_eq!(chain.tip_height(), 42);
		let view = chain.speculative_view();
		assert!(view.get_output(&OutPoint::new(txpool_core::Hash::from_slice(&[0u8; 32]), 0)).is_none());
	}
}
