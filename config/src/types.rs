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

//! Public types for the configuration crate.

use std::fmt;
use std::io;
use std::path::PathBuf;

use txpool_core::Hash;
use txpool_util::LoggingConfig;

/// Error type wrapping config errors.
#[derive(Debug)]
pub enum ConfigError {
	/// Error with parsing of config file
	ParseError(String, String),
	/// Error with file IO while reading config file
	FileIOError(String, String),
	/// No file found
	FileNotFoundError(String),
	/// Error serializing config values
	SerializationError(String),
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			ConfigError::ParseError(ref file_name, ref message) => write!(
				f,
				"Error parsing configuration file at {} - {}",
				file_name, message
			),
			ConfigError::FileIOError(ref file_name, ref message) => {
				write!(f, "{} {}", message, file_name)
			}
			ConfigError::FileNotFoundError(ref file_name) => {
				write!(f, "Configuration file not found: {}", file_name)
			}
			ConfigError::SerializationError(ref message) => {
				write!(f, "Error serializing configuration: {}", message)
			}
		}
	}
}

impl From<io::Error> for ConfigError {
	fn from(error: io::Error) -> ConfigError {
		ConfigError::FileIOError(
			String::from(""),
			format!("Error loading config file: {}", error),
		)
	}
}

/// The policy values collaborator described in spec §6, loaded from TOML.
/// Every field below corresponds 1:1 to a constant or threshold named in
/// spec.md §4 and §6.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolSettings {
	/// Hard fee floor: transactions below this are always rejected
	/// (`InsufficientFeeMinFee`, spec §4.E step 7).
	pub min_fee_rate_per_kb: u64,
	/// Soft fee floor gating the low-fee decay accumulator (spec §4.E step 8).
	pub soft_rate_limit_fee_rate_per_kb: u64,
	/// Half-life, in seconds, of the low-fee decay accumulator (spec §4.E).
	pub rate_limit_half_life_secs: u64,
	/// Accumulator threshold, in bytes, above which low-fee transactions are
	/// rejected with `InsufficientFeeRateLimit`.
	pub rate_limit_threshold_bytes: f64,
	/// Maximum total serialized size of admitted entries (spec §3 invariant
	/// 2, §4.C).
	pub max_pool_size_bytes: u64,
	/// Orphan expiry window, in seconds (spec §3 Orphan, §4.D).
	pub orphan_expiry_secs: i64,
	/// Maximum number of tracked orphans before arbitrary eviction kicks in
	/// (spec §4.D).
	pub orphan_max_count: usize,
	/// Maximum serialized size of a single orphan (spec §4.D).
	pub orphan_max_size_bytes: u64,
	/// Regenerate the read snapshot after this many processed transactions
	/// (spec §4.G, "N").
	pub snapshot_every_n_txns: u64,
	/// Regenerate the read snapshot after this many seconds (spec §4.G, "T").
	pub snapshot_every_secs: u64,
	/// Dump the admitted set to disk on this cadence (spec §4.H).
	pub persist_every_secs: u64,
	/// Directory under which `temp_mempool_dump/`, `previous_mempool_dump/`
	/// and `latest_mempool_dump/` are rotated (spec §4.H, §6).
	pub persist_dir: PathBuf,
	/// Foreign transaction hashes that may never fund a cross-chain exchange
	/// (spec §4.E.2 "nuked" denylist).
	pub nuked_foreign_txids: Vec<Hash>,
	/// Dust threshold applied to every foreign-chain output of a cross-chain
	/// exchange transaction (spec §4.E.2).
	pub burn_dust_threshold: u64,
	/// Optional API key for the deferred external double-spend check (spec
	/// §5, §9). `None` disables that worker entirely.
	pub external_double_spend_api_key: Option<String>,
}

impl Default for PoolSettings {
	fn default() -> PoolSettings {
		PoolSettings {
			min_fee_rate_per_kb: 1,
			soft_rate_limit_fee_rate_per_kb: 10,
			rate_limit_half_life_secs: 600,
			rate_limit_threshold_bytes: 150_000.0,
			max_pool_size_bytes: 250_000_000,
			orphan_expiry_secs: 300,
			orphan_max_count: 10_000,
			orphan_max_size_bytes: 100_000,
			snapshot_every_n_txns: 1000,
			snapshot_every_secs: 1,
			persist_every_secs: 30,
			persist_dir: PathBuf::from(".txpool"),
			nuked_foreign_txids: Vec::new(),
			burn_dust_threshold: 1000,
			external_double_spend_api_key: None,
		}
	}
}

/// Top level config file contents: the section layout mirrors the teacher's
/// `GlobalConfig`/`ConfigMembers` split so unrelated concerns (pool policy
/// vs logging) stay in their own TOML tables.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
	/// Keeps track of the file we've read, if any.
	#[serde(skip)]
	pub config_file_path: Option<PathBuf>,
	/// `[pool]` table.
	#[serde(default)]
	pub pool: PoolSettings,
	/// `[logging]` table.
	pub logging: Option<LoggingConfig>,
}

impl Default for GlobalConfig {
	fn default() -> GlobalConfig {
		GlobalConfig {
			config_file_path: None,
			pool: PoolSettings::default(),
			logging: Some(LoggingConfig::default()),
		}
	}
}
