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

//! Error kinds surfaced to the boundary (spec §6, §7).

use std::fmt::{self, Display};

use failure::{Context, Fail};

use txpool_core::Hash;

/// Top level error type, wrapping an `ErrorKind` with a captured backtrace.
#[derive(Debug, Fail)]
pub struct Error {
	inner: Context<ErrorKind>,
}

/// Every admission-time failure mode named in spec §6/§7.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
	/// The hash is already admitted, or (when orphan-rejection was
	/// requested) already tracked as an orphan.
	#[fail(display = "transaction already in the pool")]
	Duplicate,
	/// A mined cross-chain exchange failed to validate against the existing
	/// unmined entry it was meant to replace (spec §4.E.2).
	#[fail(display = "duplicate cross-chain exchange transaction")]
	DuplicateCrossChainExchange,
	/// A block-reward transaction was submitted standalone (spec §4.E step
	/// 1): only valid at block position 0.
	#[fail(display = "block reward transaction submitted individually")]
	IndividualBlockReward,
	/// Fee rate fell below the hard floor (spec §4.E step 7).
	#[fail(display = "fee rate below minimum")]
	InsufficientFeeMinFee,
	/// Fee rate fell below the soft floor and the low-fee decay accumulator
	/// tripped (spec §4.E step 8).
	#[fail(display = "fee rate below the rate-limit threshold")]
	InsufficientFeeRateLimit,
	/// The pool is at capacity and the current policy is reject-not-evict
	/// (spec §4.C, §9 open question).
	#[fail(display = "pool is full")]
	InsufficientFeePriorityQueue,
	/// The transaction (or orphan candidate) exceeds a size cap.
	#[fail(display = "transaction too large")]
	TooLarge,
	/// One or more inputs reference outpoints missing from the universal
	/// view, and orphan admission was not requested.
	#[fail(display = "transaction has {} missing parent(s)", "_0.len()")]
	UnconnectedNotAllowed(Vec<Hash>),
	/// A cross-chain exchange transaction attempted to burn into the burn
	/// address from the burn address itself (spec §4.E.2).
	#[fail(display = "burn address cannot itself burn")]
	BurnAddressCannotBurn,
	/// The funding public key could not be extracted from a P2PKH-style
	/// foreign input (spec §4.E.2).
	#[fail(display = "cross-chain exchange: invalid funding public key")]
	CrossChainExchangeInvalidPublicKey,
	/// A foreign output fell below the dust threshold, or a foreign input
	/// was duplicated (spec §4.E.2).
	#[fail(display = "cross-chain exchange: {}", _0)]
	CrossChainExchangeComputeBurnOutput(String),
	/// The total value burned to the burn address was not strictly positive
	/// (spec §4.E.2).
	#[fail(display = "cross-chain exchange: total burn output non-positive")]
	CrossChainExchangeTotalOutputNonPositive,
	/// The foreign transaction is on the nuked denylist (spec §4.E.2).
	#[fail(display = "cross-chain exchange: foreign transaction is denylisted")]
	CrossChainExchangeNuked,
	/// Opaque failure surfaced verbatim from `SpeculativeView::connect`
	/// (spec §4.B, §7 taxonomy (iii)).
	#[fail(display = "view error: {}", _0)]
	View(String),
	/// A view failure occurred after pre-flight checks had already passed;
	/// per spec §7 taxonomy (vi) this is logged as "must never happen" and
	/// is not expected to occur in a correctly operating pool.
	#[fail(display = "internal invariant violated: {}", _0)]
	Internal(String),
}

impl Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		Display::fmt(&self.inner, f)
	}
}

impl Error {
	/// The error kind, independent of the backtrace context.
	pub fn kind(&self) -> ErrorKind {
		self.inner.get_context().clone()
	}
}

impl From<ErrorKind> for Error {
	fn from(kind: ErrorKind) -> Error {
		Error {
			inner: Context::new(kind),
		}
	}
}

impl From<Context<ErrorKind>> for Error {
	fn from(inner: Context<ErrorKind>) -> Error {
		Error { inner }
	}
}

impl From<txpool_core::Error> for Error {
	fn from(e: txpool_core::Error) -> Error {
		ErrorKind::View(e.to_string()).into()
	}
}

impl From<txpool_store::Error> for Error {
	fn from(e: txpool_store::Error) -> Error {
		ErrorKind::Internal(e.to_string()).into()
	}
}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Error {
		ErrorKind::Internal(e.to_string()).into()
	}
}
