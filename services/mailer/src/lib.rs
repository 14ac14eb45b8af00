mod cli;
mod infra;

use agent_digest::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
