#[macro_use]
extern crate pretty_assertions;

use std::io::Write;

use txpool_config::{read_config, GlobalConfig};

#[test]
fn file_config_equal_to_defaults() {
	let without_file = GlobalConfig::default();

	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("txpool-server.toml");
	let toml_str = toml::to_string(&without_file).unwrap();
	std::fs::File::create(&path)
		.unwrap()
		.write_all(toml_str.as_bytes())
		.unwrap();

	let with_file = read_config(&path).unwrap_or_else(|e| {
		panic!("Error parsing config file: {}", e);
	});

	assert_eq!(without_file.pool, with_file.pool);
	assert_eq!(without_file.logging, with_file.logging);
}
