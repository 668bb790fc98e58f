//! HTTP mapping for every failure a handler can return.
//!
//! | Error                                                     | Status |
//! |-----------------------------------------------------------|--------|
//! | validation, not found, funds, shares, card, duplicate name | 400    |
//! | authentication, missing or bad bearer token                 | 401    |
//! | quote service unavailable                                   | 503    |
//! | storage / internal                                          | 500    |

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fin_engine::TradeError;
use tracing::error;

use crate::api_types::ErrorBody;

#[derive(Debug)]
pub enum ApiError {
    Trade(TradeError),
    /// Missing, malformed or expired bearer token.
    Unauthorized(String),
    /// Body was not the JSON we expect.
    BadRequest(String),
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Trade(e) => match e {
                TradeError::Validation(_)
                | TradeError::NotFound(_)
                | TradeError::InsufficientFunds { .. }
                | TradeError::InsufficientShares { .. }
                | TradeError::InvalidCard(_)
                | TradeError::DuplicateUsername(_) => StatusCode::BAD_REQUEST,
                TradeError::Authentication => StatusCode::UNAUTHORIZED,
                TradeError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                TradeError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, kind) = match self {
            ApiError::Trade(TradeError::Storage(_)) | ApiError::Internal(_) => {
                ("internal error".to_string(), "INTERNAL")
            }
            ApiError::Trade(e) => (e.to_string(), e.kind()),
            ApiError::Unauthorized(msg) => (msg.clone(), "AUTHENTICATION"),
            ApiError::BadRequest(msg) => (msg.clone(), "VALIDATION"),
        };
        ErrorBody {
            error,
            kind: kind.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Trade(TradeError::Storage(e)) | ApiError::Internal(e) => {
                error!(error = %format!("{e:#}"), "request failed");
            }
            _ => {}
        }
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<TradeError> for ApiError {
    fn from(e: TradeError) -> Self {
        ApiError::Trade(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::BadRequest(r.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
