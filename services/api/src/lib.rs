mod cli;
mod infra;
mod render;
mod routes;
mod server;

use kinerja::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
