use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base vimbuild config directory (%APPDATA%\vimbuild on Windows, ~/.config/vimbuild elsewhere)
pub fn vimbuild() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("vimbuild"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("vimbuild"))
    }
}

/// User-level vimbuild.json path
pub fn config_file() -> Result<PathBuf> {
    Ok(vimbuild()?.join(crate::defaults::CONFIG_FILE))
}
