//! Leader state persisted next to the configuration.

use std::fs::{read_to_string, write};

use camino::Utf8Path;
use eyre::{Result as EyreResult, WrapErr};
use tableraft_pump::LeaderState;

pub const STATE_FILE: &str = "state.json";

pub fn exists(dir: &Utf8Path) -> bool {
    dir.join(STATE_FILE).is_file()
}

pub fn load(dir: &Utf8Path) -> EyreResult<LeaderState> {
    let path = dir.join(STATE_FILE);
    let content =
        read_to_string(&path).wrap_err_with(|| format!("failed to read leader state from {path:?}"))?;

    serde_json::from_str(&content).wrap_err_with(|| format!("failed to parse leader state at {path:?}"))
}

pub fn save(dir: &Utf8Path, state: &LeaderState) -> EyreResult<()> {
    let path = dir.join(STATE_FILE);
    let content = serde_json::to_string_pretty(state)?;

    write(&path, content).wrap_err_with(|| format!("failed to write leader state to {path:?}"))
}
