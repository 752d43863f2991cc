// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Discovery of running peers. Terminal editors advertise themselves in a JSON file that we only
//! ever read.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const REGISTRY_DIR: &str = "shareedit";
pub const REGISTRY_FILE: &str = "sessions.json";

/// One advertised peer endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub port: u16,
    pub directory: String,
    /// Registration time, in milliseconds since the epoch.
    pub timestamp: i64,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("could not read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(windows)]
pub fn registry_path() -> Result<PathBuf, RegistryError> {
    let app_data = std::env::var("APPDATA").map_err(|_| RegistryError::MissingEnv("APPDATA"))?;
    Ok(Path::new(&app_data).join(REGISTRY_DIR).join(REGISTRY_FILE))
}

#[cfg(not(windows))]
pub fn registry_path() -> Result<PathBuf, RegistryError> {
    let home = std::env::var("HOME").map_err(|_| RegistryError::MissingEnv("HOME"))?;
    Ok(Path::new(&home)
        .join(".config")
        .join(REGISTRY_DIR)
        .join(REGISTRY_FILE))
}

pub fn read_sessions(path: &Path) -> Result<Vec<SessionInfo>, RegistryError> {
    let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Lists the sessions in the platform's registry file. Not finding any is a normal state, so
/// every failure collapses into an empty list.
#[must_use]
pub fn list_sessions() -> Vec<SessionInfo> {
    match registry_path() {
        Ok(path) => list_sessions_from(&path),
        Err(err) => {
            debug!("No session registry: {err}");
            vec![]
        }
    }
}

#[must_use]
pub fn list_sessions_from(path: &Path) -> Vec<SessionInfo> {
    read_sessions(path).unwrap_or_else(|err| {
        debug!("No sessions available: {err:#}");
        vec![]
    })
}
