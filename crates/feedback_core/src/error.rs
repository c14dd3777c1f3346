use thiserror::Error;

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("feedback system is no longer running")]
    Closed,
    #[error("feedback system task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
