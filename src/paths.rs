//! Filesystem locations used by rollcall.
//!
//! | Purpose | Linux | Override |
//! |---------|-------|----------|
//! | Data (response store) | `~/.local/share/rollcall/` | `ROLLCALL_DATA_DIR` |
//! | Config | `~/.config/rollcall/` | `ROLLCALL_CONFIG_DIR` |

use std::path::PathBuf;

/// Data root directory. Resolves to `dirs::data_dir()/rollcall/`.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("ROLLCALL_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("rollcall"))
        .unwrap_or_else(|| PathBuf::from("/tmp/rollcall-data"))
}

/// Config directory. Resolves to `dirs::config_dir()/rollcall/`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("ROLLCALL_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("rollcall"))
        .unwrap_or_else(|| PathBuf::from("/tmp/rollcall-config"))
}

/// Default config file (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default response store (`data_dir()/responses.json`).
#[must_use]
pub fn responses_file() -> PathBuf {
    data_dir().join("responses.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_under_their_directories() {
        assert!(config_file().starts_with(config_dir()));
        assert!(config_file().ends_with("config.toml"));
        assert!(responses_file().starts_with(data_dir()));
        assert!(responses_file().ends_with("responses.json"));
    }
}
