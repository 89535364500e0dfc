use camino::Utf8PathBuf;
use tableraft_config::default_home;

pub fn default_home_dir() -> Utf8PathBuf {
    default_home().unwrap_or_default()
}
