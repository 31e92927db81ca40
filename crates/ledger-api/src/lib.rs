pub mod config;
pub mod routes;
pub mod server;

pub use config::ApiConfig;
pub use routes::AppContext;
pub use server::ApiServer;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;
