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

//! Cooperative shutdown flag shared by background workers (spec §5, §9
//! "explicitly owned object ... background workers hold a shared handle
//! with explicit shutdown").

use std::sync::atomic::{AtomicBool, Ordering};

/// A cooperative stop/pause flag. Background loops (snapshot regeneration,
/// persistence, the deferred double-spend worker) poll this between ticks
/// instead of being forcibly killed.
pub struct StopState {
	stopped: AtomicBool,
	paused: AtomicBool,
}

impl Default for StopState {
	fn default() -> Self {
		StopState::new()
	}
}

impl StopState {
	/// A fresh, running state.
	pub fn new() -> StopState {
		StopState {
			stopped: AtomicBool::new(false),
			paused: AtomicBool::new(false),
		}
	}

	/// Whether a shutdown has been requested.
	pub fn is_stopped(&self) -> bool {
		self.stopped.load(Ordering::SeqCst)
	}

	/// Whether background work is currently paused.
	pub fn is_paused(&self) -> bool {
		self.paused.load(Ordering::SeqCst)
	}

	/// Requests shutdown. Idempotent.
	pub fn stop(&self) {
		self.stopped.store(true, Ordering::SeqCst);
	}

	/// Pauses background workers without requesting shutdown.
	pub fn pause(&self) {
		self.paused.store(true, Ordering::SeqCst);
	}

	/// Resumes background workers after a pause.
	pub fn resume(&self) {
		self.paused.store(false, Ordering::SeqCst);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn starts_running() {
		let s = StopState::new();
		assert!(!s.is_stopped());
		assert!(!s.is_paused());
	}

	#[test]
	fn stop_is_observed() {
		let s = StopState::new();
		s.stop();
		assert!(s.is_stopped());
	}

	#[test]
	fn pause_resume_round_trips() {
		let s = StopState::new();
		s.pause();
		assert!(s.is_paused());
		s.resume();
		assert!(!s.is_paused());
	}
}
