use crate::host::HostApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForkbombError {
    #[error("host api error: {0}")]
    Host(#[from] HostApiError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("invalid fork handle {0:?}: expected owner/repo")]
    InvalidHandle(String),

    #[error("unknown fork: {0}")]
    UnknownFork(String),
}

impl ForkbombError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ForkbombError::Host(e) if e.is_transient())
    }
}

impl From<toml::de::Error> for ForkbombError {
    fn from(e: toml::de::Error) -> Self {
        ForkbombError::Store(e.to_string())
    }
}

impl From<toml::ser::Error> for ForkbombError {
    fn from(e: toml::ser::Error) -> Self {
        ForkbombError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForkbombError>;
