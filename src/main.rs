mod cli;

use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use boardlog::boards::{BoardRegistry, Credentials, Secret};
use boardlog::config::{Config, ConfigError};
use boardlog::error::{BoardError, ErrorKind};
use boardlog::grades::GradeTables;
use boardlog::http::{HttpClient, RetryPolicy};
use boardlog::logbook::Aggregator;
use boardlog::observability::init_tracing;
use boardlog::sink::{SinkError, SinkOptions, write_logbook};
use cli::{Cli, Commands, LogbookArgs};

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RunError {
    fn board_error(&self) -> Option<&BoardError> {
        match self {
            RunError::Board(e) | RunError::Sink(SinkError::Board(e)) => Some(e),
            _ => None,
        }
    }

    fn exit_code(&self) -> ExitCode {
        match self.board_error().map(BoardError::kind) {
            Some(ErrorKind::UnknownBoard) => ExitCode::from(2),
            Some(ErrorKind::Authentication) => ExitCode::from(3),
            Some(ErrorKind::Transport) => ExitCode::from(4),
            Some(ErrorKind::UnrecognizedGrade) => ExitCode::from(5),
            Some(ErrorKind::MalformedRecord) => ExitCode::from(6),
            None => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.board_error().map(BoardError::code).unwrap_or("ERROR");
            error!(code, error = %e, "boardlog failed");
            e.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<(), RunError> {
    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Boards => list_boards(&config),
        Commands::Logbook(args) => export_logbook(config, args).await,
    }
}

fn build_registry(config: &Config) -> Result<BoardRegistry, RunError> {
    let http = HttpClient::new(&config.http, RetryPolicy::from(&config.retry))?;
    Ok(BoardRegistry::with_defaults(config, http))
}

fn list_boards(config: &Config) -> Result<(), RunError> {
    let registry = build_registry(config)?;

    let mut out = io::stdout().lock();
    for board in registry.identifiers() {
        writeln!(out, "{}", board)?;
    }
    Ok(())
}

async fn export_logbook(mut config: Config, args: LogbookArgs) -> Result<(), RunError> {
    if let Some(scale) = args.grade_scale {
        config.output.grade_scale = scale;
    }
    if args.no_headers {
        config.output.headers = false;
    }
    if let Some(delimiter) = args.delimiter {
        config.output.delimiter = delimiter;
        config.validate()?;
    }

    let registry = Arc::new(build_registry(&config)?);

    // unknown boards fail before the password prompt
    registry.resolve(&args.board)?;

    let secret = match config.password.take() {
        Some(secret) => secret,
        None => Secret::new(rpassword::prompt_password(format!(
            "Password for {} on {}: ",
            args.username, args.board
        ))?),
    };
    let credentials = Credentials::new(args.username, secret);

    let aggregator = Aggregator::new(registry, Arc::new(GradeTables::standard()))
        .with_record_policy(config.output.on_invalid_record);

    let mut logbook = aggregator
        .aggregate(&args.board, credentials, config.output.grade_scale)
        .await?;

    let options = SinkOptions::try_from(&config.output)?;
    let rows = match &args.output {
        Some(path) => {
            let file = File::create(path)?;
            write_logbook(&mut logbook, BufWriter::new(file), options).await?
        }
        None => write_logbook(&mut logbook, io::stdout(), options).await?,
    };

    let stats = logbook.stats();
    info!(
        board = %args.board,
        scale = %logbook.scale(),
        rows,
        unrecognized_grades = stats.grades_skipped,
        malformed = stats.malformed_skipped,
        output = args
            .output
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string()),
        "Logbook exported"
    );

    Ok(())
}
