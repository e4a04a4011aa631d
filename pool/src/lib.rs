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

//! A concurrent transaction mempool for a UTXO-based cryptocurrency node.
//!
//! Ingests unconfirmed transactions, validates each against a speculative
//! ledger view built from the confirmed chain tip plus every other accepted
//! mempool transaction, admits or rejects under fee/size/rate-limit/
//! double-spend policy, tracks transactions with unresolved parents and
//! promotes them once those parents land, reconciles the pool across block
//! connect/disconnect, and exposes a lock-free read snapshot plus disk
//! persistence.
//!
//! The pieces, in dependency order: [`fee_heap`] (the fee-ordered min-heap),
//! [`entry`] (the `Entry`/`Orphan` data model), [`primary_index`] (hash,
//! outpoint and public-key dictionaries over admitted entries),
//! [`orphan_index`] (the unconnected-transaction tracker), [`admission`]
//! (the validation engine and promotion cascade), [`reorg`] (block
//! connect/disconnect reconciliation), [`snapshot`] (the lock-free reader
//! view) and [`persistence`] (the on-disk dump/reload rotation). [`chain`]
//! wires the reference speculative view to an external chain collaborator;
//! [`handle`] ties everything together behind `Pool`/`Handle`.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

#[macro_use]
extern crate failure_derive;

pub mod admission;
pub mod chain;
pub mod entry;
pub mod error;
pub mod fee_heap;
pub mod handle;
pub mod orphan_index;
pub mod persistence;
pub mod primary_index;
pub mod reorg;
pub mod snapshot;

pub use crate::admission::Engine;
pub use crate::chain::{Chain, StaticChain};
pub use crate::entry::{Entry, EntryMetadata, IndexReason, Orphan};
pub use crate::error::{Error, ErrorKind};
pub use crate::handle::{EvictUnminedResult, Handle, Pool};
pub use crate::orphan_index::OrphanIndex;
pub use crate::primary_index::PrimaryIndex;
pub use crate::reorg::{Block, ReorgResult};
pub use crate::snapshot::{should_regenerate, Snapshot, SnapshotHandle};

pub use txpool_config::PoolSettings;
pub use txpool_core::view::{LedgerOverlay, SpeculativeView, Utxo};
pub use txpool_core::{Clock, Hash, Hashed, OutPoint, PublicKey, SystemClock, Transaction, TxKind};
