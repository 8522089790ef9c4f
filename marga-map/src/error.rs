//! Error types for marga-map

use thiserror::Error;

/// Map construction error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    #[error("Invalid grid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid facility layout: {0}")]
    InvalidLayout(String),
}

pub type Result<T> = std::result::Result<T, MapError>;
