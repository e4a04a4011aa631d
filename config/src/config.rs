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

//! Configuration file management: locating, reading and writing the pool's
//! TOML settings file.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::comments::insert_comments;
use crate::types::{ConfigError, GlobalConfig};

/// Name of the config file the binary looks for.
pub const CONFIG_FILE_NAME: &str = "txpool-server.toml";
const CONFIG_DIR_NAME: &str = ".txpool";

/// Looks for a config file in the working directory first, then in
/// `$HOME/.txpool/`, mirroring the teacher's two-location search order.
pub fn config_file_path() -> Result<Option<PathBuf>, ConfigError> {
	let cwd = PathBuf::from(CONFIG_FILE_NAME);
	if cwd.exists() {
		return Ok(Some(cwd));
	}
	if let Some(mut home) = dirs::home_dir() {
		home.push(CONFIG_DIR_NAME);
		home.push(CONFIG_FILE_NAME);
		if home.exists() {
			return Ok(Some(home));
		}
	}
	Ok(None)
}

/// Reads and parses the config file at `path`, or a default, empty
/// `GlobalConfig` if no file is found.
pub fn initial_setup() -> Result<GlobalConfig, ConfigError> {
	match config_file_path()? {
		Some(path) => read_config(&path),
		None => Ok(GlobalConfig::default()),
	}
}

/// Parses the TOML file at `path` into a `GlobalConfig`.
pub fn read_config(path: &Path) -> Result<GlobalConfig, ConfigError> {
	let mut file = File::open(path)
		.map_err(|e| ConfigError::FileIOError(path.display().to_string(), e.to_string()))?;
	let mut contents = String::new();
	file.read_to_string(&mut contents)
		.map_err(|e| ConfigError::FileIOError(path.display().to_string(), e.to_string()))?;
	let mut decoded: GlobalConfig = toml::from_str(&contents)
		.map_err(|e| ConfigError::ParseError(path.display().to_string(), e.to_string()))?;
	decoded.config_file_path = Some(path.to_path_buf());
	Ok(decoded)
}

/// Serializes `config` to TOML, with explanatory comments injected above
/// each section, and writes it to `path`.
pub fn write_config(config: &GlobalConfig, path: &Path) -> Result<(), ConfigError> {
	let toml_str =
		toml::to_string(config).map_err(|e| ConfigError::SerializationError(e.to_string()))?;
	let commented = insert_comments(&toml_str);
	let mut file = File::create(path)
		.map_err(|e| ConfigError::FileIOError(path.display().to_string(), e.to_string()))?;
	file.write_all(commented.as_bytes())
		.map_err(|e| ConfigError::FileIOError(path.display().to_string(), e.to_string()))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::PoolSettings;

	#[test]
	fn round_trips_through_toml() {
		let toml_str = r#"
			[pool]
			min_fee_rate_per_kb = 5
			soft_rate_limit_fee_rate_per_kb = 10
			rate_limit_half_life_secs = 600
			rate_limit_threshold_bytes = 150000.0
			max_pool_size_bytes = 250000000
			orphan_expiry_secs = 300
			orphan_max_count = 10000
			orphan_max_size_bytes = 100000
			snapshot_every_n_txns = 1000
			snapshot_every_secs = 1
			persist_every_secs = 30
			persist_dir = ".txpool"
			nuked_foreign_txids = []
			burn_dust_threshold = 1000
		"#;
		let decoded: GlobalConfig = toml::from_str(toml_str).unwrap();
		assert_eq!(decoded.pool.min_fee_rate_per_kb, 5);
		assert_eq!(decoded.pool, PoolSettings {
			min_fee_rate_per_kb: 5,
			..PoolSettings::default()
		});
	}

	#[test]
	fn missing_file_yields_defaults() {
		let found = config_file_path();
		assert!(found.is_ok());
	}
}
