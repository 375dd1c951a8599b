//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// The persistence backend rejected or failed the request
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// An owner-scoped operation was attempted with no signed-in user
    #[error("No authenticated user")]
    Unauthenticated,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Translation error: {0}")]
    Translation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
