mod client;

pub use client::HomeAssistantClient;

#[derive(thiserror::Error, Debug)]
pub enum HaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("configuration error: {0}")]
    Config(String),
}

pub type HaResult<T> = Result<T, HaError>;
