use clap::{Parser, Subcommand};
use std::path::PathBuf;

use boardlog::grades::GradeScale;

#[derive(Parser, Debug)]
#[command(name = "boardlog")]
#[command(about = "Export climbing-board logbooks as delimited text", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to $BOARDLOG_CONFIG or config/boardlog.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a user's logbook for one board
    Logbook(LogbookArgs),
    /// List the known board identifiers
    Boards,
}

#[derive(clap::Args, Debug)]
pub struct LogbookArgs {
    /// Board identifier, e.g. kilter or moonboard2016
    pub board: String,

    /// Account username
    #[arg(short, long)]
    pub username: String,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Omit the header row
    #[arg(long)]
    pub no_headers: bool,

    /// Grade scale of the output
    #[arg(short, long, value_enum)]
    pub grade_scale: Option<GradeScale>,

    /// Field delimiter
    #[arg(long)]
    pub delimiter: Option<char>,
}
