// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Log output goes to stderr, so that stdout stays free for the session prompt and `show`.
use anyhow::{Context, Result};
use time::macros::format_description;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt::time::UtcTime, EnvFilter, FmtSubscriber};

const PLAIN_DIRECTIVE: &str = "shareedit=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Our own info messages as bare lines.
    Plain,
    /// Everything `RUST_LOG` asks for (debug by default), with timestamps and thread ids.
    Detailed,
}

impl Verbosity {
    #[must_use]
    pub const fn choose(debug_flag: bool, rust_log_set: bool) -> Self {
        if debug_flag || rust_log_set {
            Self::Detailed
        } else {
            Self::Plain
        }
    }
}

pub fn initialize(debug: bool) -> Result<()> {
    let verbosity = Verbosity::choose(debug, std::env::var_os("RUST_LOG").is_some());
    let builder = FmtSubscriber::builder().with_writer(std::io::stderr);

    let installed = match verbosity {
        Verbosity::Plain => tracing::subscriber::set_global_default(
            builder
                .with_env_filter(EnvFilter::new(PLAIN_DIRECTIVE))
                .without_time()
                .with_level(false)
                .with_target(false)
                .finish(),
        ),
        Verbosity::Detailed => {
            let filter = EnvFilter::builder()
                .with_default_directive(LevelFilter::DEBUG.into())
                .from_env()
                .context("Invalid RUST_LOG directive")?;
            tracing::subscriber::set_global_default(
                builder
                    .with_env_filter(filter)
                    .with_thread_ids(true)
                    .with_timer(UtcTime::new(format_description!(
                        "[hour]:[minute]:[second].[subsecond digits:3]Z"
                    )))
                    .finish(),
            )
        }
    };
    installed.context("Setting default log subscriber failed")
}
