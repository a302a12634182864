use std::path::PathBuf;

/// Host the session relay listens on.
pub const RELAY_HOST: &str = "localhost";

/// Well-known port satellites connect to.
pub const RELAY_PORT: u16 = 18861;

/// First port tried when opening a command channel.
pub const CHANNEL_START_PORT: u16 = 10000;

/// Returns the config directory for hostcon.
pub fn dirs_path() -> PathBuf {
    if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(config_dir).join("hostcon")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("hostcon")
    } else {
        PathBuf::from("/tmp/hostcon")
    }
}

/// Returns the default config file path.
pub fn config_path() -> PathBuf {
    dirs_path().join("config.toml")
}
