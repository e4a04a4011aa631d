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

//! Transaction, input, output and outpoint types (spec §3 Data Model).
//!
//! Signature and script verification are out of scope (spec §1 Non-goals):
//! a `Transaction` here carries only what the pool needs to track spends,
//! creations and the type-specific public-key references of §3's
//! public-key index entry.

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::hash::{Hash, Hashed};
use crate::pubkey::PublicKey;
use crate::ser::{Readable, Reader, Writeable, Writer};

/// Identifies one prior transaction output: (tx hash, output index).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
	pub hash: Hash,
	pub index: u32,
}

impl OutPoint {
	pub fn new(hash: Hash, index: u32) -> OutPoint {
		OutPoint { hash, index }
	}
}

impl Writeable for OutPoint {
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), Error> {
		w.write_bytes(self.hash.as_bytes())?;
		w.write_u32(self.index)
	}
}

impl Readable for OutPoint {
	fn read<R: Reader>(r: &mut R) -> Result<Self, Error> {
		let hash = Hash::from_slice(&r.read_fixed_bytes(32)?);
		let index = r.read_u32()?;
		Ok(OutPoint { hash, index })
	}
}

/// A transaction input: a reference to the outpoint it spends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
	pub previous_output: OutPoint,
}

impl Writeable for TxIn {
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), Error> {
		self.previous_output.write(w)
	}
}

impl Readable for TxIn {
	fn read<R: Reader>(r: &mut R) -> Result<Self, Error> {
		Ok(TxIn {
			previous_output: OutPoint::read(r)?,
		})
	}
}

/// A transaction output: a value assigned to a public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
	pub value: u64,
	pub pubkey: PublicKey,
}

impl Writeable for Output {
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), Error> {
		w.write_u64(self.value)?;
		w.write_bytes(&self.pubkey.0)
	}
}

impl Readable for Output {
	fn read<R: Reader>(r: &mut R) -> Result<Self, Error> {
		let value = r.read_u64()?;
		let mut key = [0u8; 33];
		key.copy_from_slice(&r.read_fixed_bytes(33)?);
		Ok(Output {
			value,
			pubkey: PublicKey(key),
		})
	}
}

/// The payload carried by a cross-chain exchange transaction (spec §4.E.2).
///
/// `merkle_proof.is_none()` is the "unmined" sub-state: admitted speculatively
/// ahead of proof of inclusion. Once a proof lands, admission replaces this
/// payload in place (same entry, same admission time, same heap slot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossChainPayload {
	/// Raw bytes of the foreign-chain burn transaction.
	pub foreign_tx: Vec<u8>,
	/// Every (foreign tx hash, output index) consumed by the foreign burn tx.
	pub foreign_inputs: Vec<OutPoint>,
	/// Foreign-chain outputs created by the burn tx; `dust_threshold` (policy)
	/// applies to each.
	pub foreign_outputs: Vec<u64>,
	/// The public key the minted native value is funded to, extracted from a
	/// P2PKH-style foreign input.
	pub funding_key: PublicKey,
	/// Total value sent to the foreign burn address; must be strictly
	/// positive.
	pub burn_output_total: u64,
	/// Present once a merkle proof of inclusion on the foreign chain has been
	/// observed. `None` means "unmined".
	pub merkle_proof: Option<Vec<u8>>,
}

impl CrossChainPayload {
	pub fn is_mined(&self) -> bool {
		self.merkle_proof.is_some()
	}
}

/// The type-specific discriminant of a transaction, driving both admission
/// (block-reward rejection, cross-chain diversion) and the public-key
/// indexer (spec §3 public-key index entry / §9 unification note).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
	/// An ordinary value transfer.
	Standard,
	/// Only valid as block position 0; rejected outright by admission step 1.
	BlockReward,
	/// Proves destruction of value on a foreign chain (spec §4.E.2).
	CrossChainExchange(CrossChainPayload),
	/// Names a recipient public key inside an encrypted payload.
	PrivateMessage { recipient: PublicKey },
	/// Names a public key being followed.
	FollowKey { followed: PublicKey },
	/// Trades a coin created by `creator`.
	CoinTrade { creator: PublicKey },
	/// Swaps an identity from one public key to another.
	IdentitySwap { from: PublicKey, to: PublicKey },
	/// A post that mentions zero or more profiles.
	Post { mentions: Vec<PublicKey> },
	/// Reposts content originally authored by `original_author`.
	Repost { original_author: PublicKey },
}

impl TxKind {
	/// Every public key this transaction's type-specific payload names,
	/// beyond the plain spend/create keys already visible on inputs/outputs.
	/// Used by the primary index's public-key indexer (§4.C / §3).
	pub fn named_pubkeys(&self) -> Vec<PublicKey> {
		match self {
			TxKind::Standard | TxKind::BlockReward => vec![],
			TxKind::CrossChainExchange(payload) => {
				vec![payload.funding_key, PublicKey::burn_address()]
			}
			TxKind::PrivateMessage { recipient } => vec![*recipient],
			TxKind::FollowKey { followed } => vec![*followed],
			TxKind::CoinTrade { creator } => vec![*creator],
			TxKind::IdentitySwap { from, to } => vec![*from, *to],
			TxKind::Post { mentions } => mentions.clone(),
			TxKind::Repost { original_author } => vec![*original_author],
		}
	}
}

/// An unconfirmed transaction as the pool sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
	pub inputs: Vec<TxIn>,
	pub outputs: Vec<Output>,
	pub kind: TxKind,
	/// Height below which this transaction must not be included. 0 = no lock.
	pub lock_height: u64,
}

impl Transaction {
	/// Total value of all outputs.
	pub fn output_value(&self) -> u64 {
		self.outputs.iter().map(|o| o.value).sum()
	}

	/// The identity hash used for indexing and admission (spec §3 Entry,
	/// §4.E.2 "same hash" across the unmined→mined transition). For every
	/// kind but `CrossChainExchange` this is just `Hashed::hash`; a
	/// cross-chain exchange transaction's merkle proof is excluded so that
	/// maturing one from unmined to mined does not change its identity.
	pub fn pool_hash(&self) -> Hash {
		match &self.kind {
			TxKind::CrossChainExchange(payload) => {
				let canonical = Transaction {
					inputs: self.inputs.clone(),
					outputs: self.outputs.clone(),
					kind: TxKind::CrossChainExchange(CrossChainPayload {
						merkle_proof: None,
						..payload.clone()
					}),
					lock_height: self.lock_height,
				};
				canonical.hash()
			}
			_ => self.hash(),
		}
	}
}

impl Hashed for Transaction {
	fn bytes(&self) -> Vec<u8> {
		crate::ser::ser_vec(self).expect("transaction serialization is infallible in memory")
	}
}

impl Writeable for Transaction {
	fn write<W: Writer>(&self, w: &mut W) -> Result<(), Error> {
		w.write_u64(self.inputs.len() as u64)?;
		for i in &self.inputs {
			i.write(w)?;
		}
		w.write_u64(self.outputs.len() as u64)?;
		for o in &self.outputs {
			o.write(w)?;
		}
		w.write_u64(self.lock_height)?;
		let encoded = serde_json::to_vec(&self.kind)
			.map_err(|e| crate::error::ErrorKind::Ser(e.to_string()))?;
		w.write_var_bytes(&encoded)
	}
}

impl Readable for Transaction {
	fn read<R: Reader>(r: &mut R) -> Result<Self, Error> {
		let n_in = r.read_u64()?;
		let mut inputs = Vec::with_capacity(n_in as usize);
		for _ in 0..n_in {
			inputs.push(TxIn::read(r)?);
		}
		let n_out = r.read_u64()?;
		let mut outputs = Vec::with_capacity(n_out as usize);
		for _ in 0..n_out {
			outputs.push(Output::read(r)?);
		}
		let lock_height = r.read_u64()?;
		let kind_bytes = r.read_var_bytes()?;
		let kind: TxKind = serde_json::from_slice(&kind_bytes)
			.map_err(|e| crate::error::ErrorKind::Ser(e.to_string()))?;
		Ok(Transaction {
			inputs,
			outputs,
			kind,
			lock_height,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_tx() -> Transaction {
		Transaction {
			inputs: vec![TxIn {
				previous_output: OutPoint::new(Hash::from_slice(&[1u8; 32]), 0),
			}],
			outputs: vec![Output {
				value: 9_900,
				pubkey: PublicKey([2u8; 33]),
			}],
			kind: TxKind::Standard,
			lock_height: 0,
		}
	}

	#[test]
	fn round_trips_through_bytes() {
		let tx = sample_tx();
		let bytes = crate::ser::ser_vec(&tx).unwrap();
		let back: Transaction = crate::ser::deserialize(&bytes).unwrap();
		assert_eq!(tx, back);
	}

	#[test]
	fn hash_is_stable_for_identical_bytes() {
		let a = sample_tx();
		let b = sample_tx();
		assert_eq!(a.hash(), b.hash());
	}

	#[test]
	fn named_pubkeys_covers_each_kind() {
		let pk = PublicKey([3u8; 33]);
		assert_eq!(TxKind::FollowKey { followed: pk }.named_pubkeys(), vec![pk]);
		assert_eq!(
			TxKind::Post {
				mentions: vec![pk, pk]
			}
			.named_pubkeys(),
			vec![pk, pk]
		);
	}
}
