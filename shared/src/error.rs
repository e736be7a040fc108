use thiserror::Error;

/// Failures talking to the backend-as-a-service (tables and object storage).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("backend unreachable: {0}")]
    Network(String),
    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("unexpected backend payload: {0}")]
    Decode(String),
    #[error("not found")]
    NotFound,
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AppError::Decode(e.to_string())
        } else {
            AppError::Network(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
