//! Error types for MargaNav

use marga_map::{MapError, PathError};
use thiserror::Error;

/// MargaNav error type
#[derive(Error, Debug)]
pub enum NavError {
    #[error("Connection failed: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid waypoints: {0}")]
    InvalidWaypoints(String),

    #[error("Map error: {0}")]
    Map(#[from] MapError),

    #[error("Path planning failed: {0}")]
    Path(#[from] PathError),

    #[error("Vehicle position is not known yet")]
    NoPosition,

    #[error("Vehicle at ({x:.0}, {y:.0}) is not inside a parking bay")]
    NotInBay { x: f32, y: f32 },
}

impl From<serde_json::Error> for NavError {
    fn from(e: serde_json::Error) -> Self {
        NavError::Protocol(e.to_string())
    }
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
