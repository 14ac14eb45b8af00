use crate::infra::{print_queries, send_digests};
use agent_digest::error::AppError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "agent-digest",
    about = "Send subscribers a digest of listings published since yesterday",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send notifications about new listings (default command)
    Send(SendArgs),
    /// Print the compiled search request for every subscriber in the snapshot
    Query(QueryArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct SendArgs {
    /// Run even if the current environment is not production
    #[arg(short, long)]
    pub(crate) force: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct QueryArgs {
    /// Subscriber snapshot to read instead of SUBSCRIBERS_PATH
    #[arg(long)]
    pub(crate) subscribers: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Send(SendArgs::default()));

    match command {
        Command::Send(args) => send_digests(args).await,
        Command::Query(args) => print_queries(args).await,
    }
}
