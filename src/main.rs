// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use shareedit::config::AppConfig;
use shareedit::editor::MemoryEditor;
use shareedit::selector::{abbreviate_directory, rank_sessions};
use shareedit::session::SessionHandle;
use shareedit::{logging, registry};
use tokio::signal;
use tracing::{debug, info};

mod cli;
mod console;

fn load_config(cli_config: AppConfig, config_file: Option<&std::path::Path>) -> Result<AppConfig> {
    let config_file = config_file
        .map(std::path::Path::to_path_buf)
        .or_else(AppConfig::default_config_file);
    let file_config = match config_file {
        Some(path) => AppConfig::from_config_file(&path)?,
        None => None,
    };
    if file_config.is_none() {
        debug!("No config file found, using defaults and CLI options");
    }
    Ok(cli_config.merge(file_config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    let cli = Cli::parse();

    logging::initialize(cli.debug)?;

    match cli.command {
        Commands::Sessions { file } => {
            let config = load_config(
                AppConfig {
                    registry: cli.registry,
                    ..AppConfig::default()
                },
                cli.config.as_deref(),
            )?;
            let sessions = match &config.registry {
                Some(path) => registry::list_sessions_from(path),
                None => registry::list_sessions(),
            };
            if sessions.is_empty() {
                info!("No active ShareEdit sessions found");
            }
            for session in rank_sessions(sessions, file.file.as_deref()) {
                println!(
                    "{}\t{}",
                    session.port,
                    abbreviate_directory(&session.directory)
                );
            }
        }
        Commands::Connect {
            file,
            port,
            sender,
            debounce_ms,
        } => {
            let config = load_config(
                AppConfig {
                    sender,
                    debounce_ms,
                    registry: cli.registry,
                },
                cli.config.as_deref(),
            )?;

            let mut editor = MemoryEditor::new().focused(true);
            if let Some(path) = &file.file {
                let text = match tokio::fs::read_to_string(path).await {
                    Ok(text) => text,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
                    Err(err) => {
                        return Err(err).with_context(|| format!("Failed to read '{path}'"));
                    }
                };
                editor.open_buffer(path, &text);
            }

            let (picker, answers) = console::prompt();
            let session = SessionHandle::spawn(
                config.session_config(),
                editor,
                console::LogNotifier,
                picker,
            );
            let console = console::Console::new(session, answers, port);
            console.connect().await;

            let result = tokio::select! {
                result = console.run() => result,
                signal = signal::ctrl_c() => {
                    if let Err(err) = signal {
                        eprintln!("Unable to listen for shutdown signal: {err}");
                        // still shut down.
                    }
                    Ok(())
                }
            };
            console.shutdown().await;
            result?;
        }
    }
    Ok(())
}
