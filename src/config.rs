// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Data structures and helper methods around influencing the configuration of the application.
use crate::debounce::DEFAULT_WINDOW;
use crate::registry;
use crate::session::SessionConfig;
use crate::types::Origin;
use anyhow::{Context, Result};
use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config";

const DEFAULT_ORIGIN: Origin = Origin::Vscode;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct AppConfig {
    /// Which kind of editor we announce ourselves as.
    pub sender: Option<Origin>,
    pub debounce_ms: Option<u64>,
    /// Overrides the platform's session registry file.
    pub registry: Option<PathBuf>,
}

impl AppConfig {
    /// Reads the ini file at `config_file`. A missing file is not an error, an unreadable or
    /// invalid one is.
    pub fn from_config_file(config_file: &Path) -> Result<Option<Self>> {
        if !config_file.exists() {
            return Ok(None);
        }
        let conf = Ini::load_from_file(config_file)
            .with_context(|| format!("Could not read config file {}", config_file.display()))?;
        let general_section = conf.general_section();

        let sender = general_section
            .get("sender")
            .map(str::parse)
            .transpose()
            .context("Failed to parse config parameter `sender`")?;
        let debounce_ms = general_section
            .get("debounce_ms")
            .map(str::parse)
            .transpose()
            .context("Failed to parse config parameter `debounce_ms` as an integer")?;
        let registry = general_section.get("registry").map(PathBuf::from);

        Ok(Some(Self {
            sender,
            debounce_ms,
            registry,
        }))
    }

    /// Where we look for the config file by default: next to the session registry.
    #[must_use]
    pub fn default_config_file() -> Option<PathBuf> {
        registry::registry_path()
            .ok()
            .and_then(|path| path.parent().map(|dir| dir.join(CONFIG_FILE)))
    }

    /// Merges two configurations. Values that are set on the caller take precedence.
    pub fn merge(self, other: Option<Self>) -> Self {
        match other {
            None => self,
            Some(other) => Self {
                sender: self.sender.or(other.sender),
                debounce_ms: self.debounce_ms.or(other.debounce_ms),
                registry: self.registry.or(other.registry),
            },
        }
    }

    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            origin: self.sender.unwrap_or(DEFAULT_ORIGIN),
            debounce: self
                .debounce_ms
                .map_or(DEFAULT_WINDOW, Duration::from_millis),
            registry: self.registry.clone(),
        }
    }
}
