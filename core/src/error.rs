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

//! Error types for the domain crate: serialization and speculative-view
//! failures.

use std::fmt::{self, Display};

use failure::{Context, Fail};

/// Top level error type, wrapping an `ErrorKind` with a captured backtrace.
#[derive(Debug, Fail)]
pub struct Error {
	inner: Context<ErrorKind>,
}

/// Error variants produced by the domain crate.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
	/// Error serializing or deserializing a `Writeable`/`Readable`.
	#[fail(display = "serialization error: {}", _0)]
	Ser(String),
	/// `connect` failed while applying a candidate transaction to a view.
	/// Per §4.B this leaves the overlay in an undefined state; the caller
	/// must discard and re-clone rather than inspect it further.
	#[fail(display = "view connect error: {}", _0)]
	ViewConnect(String),
	/// An outpoint referenced by an input does not resolve in this view.
	#[fail(display = "output not found")]
	OutputNotFound,
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
