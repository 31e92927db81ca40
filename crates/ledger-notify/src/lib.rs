pub mod channels;
pub mod config;
pub mod connection;
pub mod messages;
pub mod publisher;

pub use config::RedisConfig;
pub use connection::RedisConnection;
pub use publisher::{RedisNotifier, RedisPublisher};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for NotifyError {
    fn from(err: redis::RedisError) -> Self {
        NotifyError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for NotifyError {
    fn from(err: serde_json::Error) -> Self {
        NotifyError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
