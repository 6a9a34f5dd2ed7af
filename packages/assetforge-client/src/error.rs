use assetforge_sdk::SdkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Backend request failed: {0}")]
    Backend(#[from] SdkError),

    #[error("Local storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Preferences encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type HubResult<T> = Result<T, HubError>;
