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

//! Component H: persistence (spec §4.H, §6 "Persisted state layout"). Dumps
//! the admission-ordered entry list to a fresh on-disk store in batches,
//! then rotates it into place through the three-slot `temp/previous/latest`
//! scheme so a crash mid-swap never loses the last good snapshot.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use txpool_core::view::SpeculativeView;
use txpool_core::Transaction;
use txpool_store::{new_env, entry_key, Store};

use crate::admission::Engine;
use crate::error::Error;

const TEMP_DIR: &str = "temp_mempool_dump";
const PREVIOUS_DIR: &str = "previous_mempool_dump";
const LATEST_DIR: &str = "latest_mempool_dump";

/// Entries are written in batches of this size (spec §4.H).
const BATCH_SIZE: usize = 1000;

/// Dumps every entry in `engine`, in admission order, to a fresh `temp/`
/// store under `persist_dir`, then rotates it into `latest/` (spec §4.H).
pub fn dump<V: SpeculativeView>(engine: &Engine<V>, persist_dir: &Path) -> Result<(), Error> {
	let temp_path = persist_dir.join(TEMP_DIR);
	if temp_path.exists() {
		fs::remove_dir_all(&temp_path)?;
	}
	fs::create_dir_all(&temp_path)?;

	let env = Arc::new(new_env(temp_path.to_string_lossy().into_owned()));
	let store = Store::open(env, "mempool");

	let entries = engine.entries_ordered_by_time();
	for chunk in entries.chunks(BATCH_SIZE) {
		let batch = store.batch()?;
		for entry in chunk {
			let key = entry_key(entry.admitted_at_ms, &entry.hash);
			batch.put_ser(&key, &entry.tx)?;
		}
		batch.commit()?;
	}
	drop(store);

	rotate(persist_dir, &temp_path)?;
	info!("persisted {} mempool entries", entries.len());
	Ok(())
}

fn rotate(persist_dir: &Path, temp_path: &Path) -> Result<(), Error> {
	let previous_path = persist_dir.join(PREVIOUS_DIR);
	let latest_path = persist_dir.join(LATEST_DIR);

	if latest_path.exists() {
		if previous_path.exists() {
			fs::remove_dir_all(&previous_path)?;
		}
		fs::rename(&latest_path, &previous_path)?;
	}
	fs::rename(temp_path, &latest_path)?;
	Ok(())
}

/// Loads every persisted transaction from `latest/` (or `previous/` if
/// `latest/` is missing), in time-ascending order, for replay through
/// `process` at startup (spec §4.H). Returns an empty list if neither
/// directory exists.
pub fn load(persist_dir: &Path) -> Result<Vec<Transaction>, Error> {
	let latest_path = persist_dir.join(LATEST_DIR);
	let previous_path = persist_dir.join(PREVIOUS_DIR);

	let path = if latest_path.exists() {
		latest_path
	} else if previous_path.exists() {
		previous_path
	} else {
		return Ok(Vec::new());
	};

	let env = Arc::new(new_env(path.to_string_lossy().into_owned()));
	let store = Store::open(env, "mempool");
	let mut txs = Vec::new();
	for tx in store.iter::<Transaction>(&[])? {
		txs.push(tx);
	}
	Ok(txs)
}

/// Loads persisted transactions and submits each via `process` with
/// `allow_orphan = false, rate_limit = false, verify_sigs = false` (spec
/// §4.H). Failures are logged and skipped, never propagated — one corrupt
/// entry must not block startup.
pub fn reload<V: SpeculativeView>(engine: &mut Engine<V>, persist_dir: &Path) -> Result<usize, Error> {
	let txs = load(persist_dir)?;
	let mut loaded = 0;
	for tx in txs {
		match engine.process(tx, false, false, "persisted".into(), false) {
			Ok(entries) => loaded += entries.len(),
			Err(e) => warn!("skipping persisted transaction that failed to reload: {}", e),
		}
	}
	Ok(loaded)
}
