use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis connection error: {0}")]
    ConnectionError(String),

    #[error("redis command failed: {0}")]
    CommandError(String),

    #[error("cache serialization error: {0}")]
    SerializationError(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_timeout() {
            CacheError::ConnectionError(err.to_string())
        } else {
            CacheError::CommandError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}

impl From<bb8::RunError<redis::RedisError>> for CacheError {
    fn from(err: bb8::RunError<redis::RedisError>) -> Self {
        match err {
            bb8::RunError::User(e) => e.into(),
            bb8::RunError::TimedOut => {
                CacheError::ConnectionError("timed out waiting for a pooled connection".to_string())
            }
        }
    }
}
