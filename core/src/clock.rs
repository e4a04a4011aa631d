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

//! An injectable wall-clock so admission-time ordering, orphan expiry and
//! the low-fee decay accumulator (spec §4.E) can be tested without real
//! sleeps. `SystemClock` defers to `faketime`, which lets integration tests
//! pin or fast-forward the clock process-wide; `SystemClock::now_ms` is the
//! only place production code should read the time.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
	/// Current time, in milliseconds since the Unix epoch.
	fn now_ms(&self) -> i64;
}

/// The production clock: wall-clock time, overridable via `faketime` for
/// deterministic integration tests.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_ms(&self) -> i64 {
		faketime::unix_time_as_millis() as i64
	}
}

/// A manually-advanced clock for unit tests that don't want the process-wide
/// side effects of `faketime`.
#[derive(Clone)]
pub struct TestClock(Arc<AtomicI64>);

impl TestClock {
	/// Creates a test clock pinned at `now_ms`.
	pub fn new(now_ms: i64) -> TestClock {
		TestClock(Arc::new(AtomicI64::new(now_ms)))
	}

	/// Advances the clock by `delta_ms` (may be negative).
	pub fn advance(&self, delta_ms: i64) {
		self.0.fetch_add(delta_ms, Ordering::SeqCst);
	}

	/// Pins the clock to an absolute value.
	pub fn set(&self, now_ms: i64) {
		self.0.store(now_ms, Ordering::SeqCst);
	}
}

impl Clock for TestClock {
	fn now_ms(&self) -> i64 {
		self.0.load(Ordering::SeqCst)
	}
}
