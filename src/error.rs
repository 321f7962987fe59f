use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::Error as JSON_ERROR;
use sqlx::error::Error as SQL_ERROR;
use std::{
    io::Error as IO_ERROR, num::ParseFloatError, num::ParseIntError,
};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::subscriber::SetGlobalDefaultError as TRACING_GLOBAL_DEFAULT_ERROR;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] IO_ERROR),

    #[error("{0}")]
    INT(#[from] ParseIntError),

    #[error("{0}")]
    FLOAT(#[from] ParseFloatError),

    #[error("{0}")]
    JsonError(#[from] JSON_ERROR),

    #[error("Tracing error: {0}")]
    SetGlobalDefaultError(#[from] TRACING_GLOBAL_DEFAULT_ERROR),

    #[error("{0}")]
    TokioJoinError(#[from] JoinError),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Server end with error: {0}")]
    ServerError(String),

    /// Source unavailable or a query against it failed.
    #[error("Source query error: {0}")]
    SourceQuery(#[from] SQL_ERROR),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing params: {0}")]
    MissingParams(String),

    #[error("Metric domain not found: {0}")]
    DomainNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A chain's refresh transaction failed and was rolled back.
    #[error("Refresh of chain {chain} failed: {source}")]
    Orchestration {
        chain: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn orchestration(chain: &str, source: Error) -> Self {
        Error::Orchestration {
            chain: chain.to_owned(),
            source: Box::new(source),
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request - client sent invalid input
            Error::Validation(_)
            | Error::MissingParams(_)
            | Error::DomainNotFound(_) => StatusCode::BAD_REQUEST,

            // 404 Not Found - nothing cached or stored for the request
            Error::NotFound(_) => StatusCode::NOT_FOUND,

            // 500 Internal Server Error - everything else
            Error::Io(_)
            | Error::INT(_)
            | Error::FLOAT(_)
            | Error::JsonError(_)
            | Error::SetGlobalDefaultError(_)
            | Error::TokioJoinError(_)
            | Error::ConfigurationError(_)
            | Error::ServerError(_)
            | Error::SourceQuery(_)
            | Error::CacheUnavailable(_)
            | Error::Orchestration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Server side failures never echo query details back to the client.
        let message = if status.is_server_error() {
            String::from("Internal error")
        } else {
            self.to_string()
        };
        let body = serde_json::json!({
            "error": status.canonical_reason().unwrap_or("Unknown"),
            "message": message,
            "status": status.as_u16(),
        });
        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        let err = Error::Validation(String::from("unknown chain 'foo'"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = Error::MissingParams(String::from("key"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = Error::NotFound(String::from("tvl"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_source_failures_hide_details() {
        let err = Error::orchestration(
            "base_mainnet",
            Error::SourceQuery(SQL_ERROR::Protocol(String::from(
                "relation \"secret_table\" does not exist",
            ))),
        );
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("base_mainnet"));

        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
