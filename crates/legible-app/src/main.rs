// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Legible — notebook sync into searchable PDFs
//
// Entry point. Initialises logging, loads configuration, and dispatches the
// maintenance subcommands.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use legible_core::config::LegibleConfig;
use legible_core::error::Result;
use legible_sync::ConversionStatus;

#[derive(Parser)]
#[command(name = "legible", version, about = "Sync handwritten notebooks into searchable PDFs")]
struct Cli {
    /// JSON configuration file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect stored credentials.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Embed an OCR JSON result into a PDF as an invisible text layer.
    Enhance {
        input: PathBuf,
        /// OCR result as written by the sync pipeline.
        ocr: PathBuf,
        output: PathBuf,
    },
    /// Inspect or reset the sync ledger.
    State {
        #[command(subcommand)]
        action: StateAction,
    },
    /// Load and validate the configuration.
    CheckConfig,
}

#[derive(Subcommand)]
enum TokenAction {
    /// Show expiry and device details (claims are read unverified).
    Info {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Ledger location, size and status counts.
    Show,
    /// One line per tracked document.
    List {
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,
    },
    /// Forget every tracked document.
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusFilter {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl From<StatusFilter> for ConversionStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Pending => ConversionStatus::Pending,
            StatusFilter::InProgress => ConversionStatus::InProgress,
            StatusFilter::Completed => ConversionStatus::Completed,
            StatusFilter::Failed => ConversionStatus::Failed,
            StatusFilter::Skipped => ConversionStatus::Skipped,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String> {
    let config = match &cli.config {
        Some(path) => LegibleConfig::from_json_file(path)?,
        None => LegibleConfig::default(),
    };

    match cli.command {
        Command::Token {
            action: TokenAction::Info { json },
        } => commands::token_info(&config, json),
        Command::Enhance { input, ocr, output } => commands::enhance(&input, &ocr, &output),
        Command::State { action } => match action {
            StateAction::Show => commands::state_show(&config),
            StateAction::List { status } => commands::state_list(&config, status.map(Into::into)),
            StateAction::Reset => commands::state_reset(&config),
        },
        Command::CheckConfig => commands::check_config(&config),
    }
}
