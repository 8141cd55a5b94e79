use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Subscription closed: {0}")]
    Subscription(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ProcessorError {
    fn from(err: reqwest::Error) -> Self {
        ProcessorError::Rpc(err.to_string())
    }
}
