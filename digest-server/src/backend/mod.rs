//! Typed client for the digest backend REST API

pub mod client;
pub mod fixtures;
pub mod models;

pub use client::BackendClient;

use thiserror::Error;

/// Errors returned by [`BackendClient`]
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection, TLS or protocol failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-2xx status
    #[error("Backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Decoded body; JSON when the backend sent JSON, a string otherwise
        body: serde_json::Value,
    },

    /// Body could not be decoded into the expected type
    #[error("Decode error: {0}")]
    Decode(String),

    /// Base URL or endpoint could not be built
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

/// Result type for backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;
