use camino::Utf8Path;
use claims::{assert_err, assert_ok};
use tableraft_primitives::{ServerId, ShardConfig, StoreKey};
use tempdir::TempDir;

use super::*;

fn config() -> ConfigFile {
    let servers: Vec<ServerId> = ["alpha", "beta", "gamma"]
        .into_iter()
        .map(ServerId::named)
        .collect();

    ConfigFile::new(
        TableConfig {
            split_keys: vec![StoreKey::from("m")],
            shards: vec![
                ShardConfig::new(servers.clone(), servers[0]),
                ShardConfig::new(servers.clone(), servers[1]),
            ],
        },
        PumpOptions::default(),
    )
}

fn home() -> TempDir {
    TempDir::new("_tableraft_config").expect("tempdir should be created")
}

fn path(dir: &TempDir) -> &Utf8Path {
    Utf8Path::from_path(dir.path()).expect("tempdir should be UTF-8")
}

#[test]
fn saved_config_loads_back() {
    let dir = home();
    let config = config();

    assert!(!ConfigFile::exists(path(&dir)));
    assert_ok!(config.save(path(&dir)));
    assert!(ConfigFile::exists(path(&dir)));

    assert_eq!(ConfigFile::load(path(&dir)).unwrap(), config);
}

#[test]
fn pump_section_is_optional() {
    let dir = home();
    let mut content = toml::to_string_pretty(&config()).unwrap();
    let pump = content.find("[pump]").unwrap();
    content.truncate(pump);
    std::fs::write(path(&dir).join(CONFIG_FILE), content).unwrap();

    let loaded = ConfigFile::load(path(&dir)).unwrap();

    assert!(loaded.pump.coalesce_branches);
}

#[test]
fn invalid_table_is_rejected_on_load() {
    let dir = home();
    let mut config = config();
    config.table.split_keys.clear();
    assert_ok!(config.save(path(&dir)));

    let _err = assert_err!(ConfigFile::load(path(&dir)));
}

#[test]
fn missing_file_is_an_error() {
    let dir = home();

    let _err = assert_err!(ConfigFile::load(path(&dir)));
}
