mod cli;
mod infra;
mod inspect;
mod watch;

use ceac_tracker::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
