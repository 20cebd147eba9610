use siphon_api::TransferError;

#[derive(Debug, thiserror::Error)]
pub enum SiphonError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Transfer(#[from] TransferError),
}
