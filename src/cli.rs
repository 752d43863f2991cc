// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use shareedit::types::Origin;

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// Print debug logs, with timestamps and thread ids.
    #[arg(long, global = true)]
    pub debug: bool,
    /// Path of the config file. Defaults to `config` next to the session registry.
    #[arg(long, global = true, env = "SHAREEDIT_CONFIG")]
    pub config: Option<PathBuf>,
    /// Session registry to read instead of the platform default.
    #[arg(long, global = true, env = "SHAREEDIT_REGISTRY")]
    pub registry: Option<PathBuf>,
}

#[derive(Args)]
pub struct FileFlag {
    /// The file you are editing. Sessions containing it are listed first.
    #[arg(long)]
    pub file: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the sessions announced by running editors, best match first.
    Sessions {
        #[command(flatten)]
        file: FileFlag,
    },
    /// Connect to a session and keep a buffer in sync with it. Reads commands from stdin.
    Connect {
        #[command(flatten)]
        file: FileFlag,
        /// Connect to this port instead of choosing from the registry.
        #[arg(long)]
        port: Option<u16>,
        /// Which editor to announce ourselves as.
        #[arg(long)]
        sender: Option<Origin>,
        /// Quiet time before cursor and selection changes are sent.
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
}

#[test]
fn verify() {
    use clap::CommandFactory as _;
    Cli::command().debug_assert();
}
