pub mod applications;
pub mod config;
pub mod error;
pub mod export;
pub mod infra;
pub mod program;
pub mod routes;
pub mod telemetry;

mod cli;
mod server;

use error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
