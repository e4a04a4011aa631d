// Copyright 2016 The Grin Developers
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

//! Domain types shared by the transaction pool: hashes, outpoints,
//! transactions and the speculative ledger view contract.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

#[macro_use]
extern crate failure_derive;

pub mod clock;
pub mod error;
pub mod hash;
pub mod pubkey;
pub mod ser;
pub mod tx;
pub mod view;

pub use crate::clock::{Clock, SystemClock};
pub use crate::error::{Error, ErrorKind};
pub use crate::hash::{Hash, Hashed, ZERO_HASH};
pub use crate::pubkey::PublicKey;
pub use crate::tx::{
	CrossChainPayload, Output, OutPoint, Transaction, TxIn, TxKind,
};
pub use crate::view::{SpeculativeView, Utxo};
