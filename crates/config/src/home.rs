//! Default location of the tableraft home directory.

use camino::Utf8PathBuf;
use eyre::{eyre, Result as EyreResult};

pub const DEFAULT_HOME_DIR: &str = ".tableraft";

/// `~/.tableraft`, where the configuration and leader state live unless
/// `--home` says otherwise.
pub fn default_home() -> EyreResult<Utf8PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| eyre!("cannot determine home directory"))?;

    let home = Utf8PathBuf::from_path_buf(home)
        .map_err(|path| eyre!("home directory {} is not valid UTF-8", path.display()))?;

    Ok(home.join(DEFAULT_HOME_DIR))
}
