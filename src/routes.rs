mod problems;
mod submissions;
mod users;

pub use problems::*;
pub use submissions::*;
pub use users::*;

use actix_web::error::{InternalError, JsonPayloadError, PathError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

use crate::judge::EvalError;
use crate::submission::SubmitError;

#[derive(Serialize)]
struct ErrorResponse {
    reason: &'static str,
    code: u32,
}

#[derive(Serialize)]
struct ErrorResponseWithMessage {
    reason: &'static str,
    code: u32,
    message: String,
}

/// Every failure a handler can answer with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("{0}")]
    External(String),
    #[error("{0}")]
    Internal(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
}

impl ApiError {
    fn reason_and_code(&self) -> (&'static str, u32) {
        match self {
            Self::InvalidArgument(_) => ("ERR_INVALID_ARGUMENT", 1),
            Self::InvalidState(_) => ("ERR_INVALID_STATE", 2),
            Self::NotFound(_) => ("ERR_NOT_FOUND", 3),
            Self::RateLimited(_) => ("ERR_RATE_LIMIT", 4),
            Self::External(_) => ("ERR_EXTERNAL", 5),
            Self::Internal(_) => ("ERR_INTERNAL", 6),
            Self::Unauthorized(_) => ("ERR_UNAUTHORIZED", 7),
            Self::Forbidden(_) => ("ERR_FORBIDDEN", 8),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) | Self::InvalidState(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::External(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (reason, code) = self.reason_and_code();
        HttpResponse::build(self.status_code()).json(ErrorResponseWithMessage {
            reason,
            code,
            message: self.to_string(),
        })
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        log::error!("Database operation failed: {e}");
        Self::Internal("Database operation failed".to_string())
    }
}

impl From<EvalError> for ApiError {
    fn from(e: EvalError) -> Self {
        log::error!("Evaluation failed: {e}");
        match e {
            EvalError::Resolution(_) | EvalError::Cancelled => Self::Internal(e.to_string()),
            EvalError::Dispatch(_)
            | EvalError::Poll(_)
            | EvalError::MalformedResponse(_)
            | EvalError::PollTimeout { .. } => Self::External(e.to_string()),
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Evaluation(e) => e.into(),
            SubmitError::Database(e) => e.into(),
        }
    }
}

/// Maps `RowNotFound` to a 404 naming `what`.
pub(crate) fn not_found_or(e: sqlx::Error, what: impl FnOnce() -> String) -> ApiError {
    match e {
        sqlx::Error::RowNotFound => {
            let what = what();
            log::info!("Got nothing for {what} from database");
            ApiError::NotFound(format!("{what} not found."))
        }
        e => e.into(),
    }
}

fn invalid_argument(err: impl Into<actix_web::Error>) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorResponse {
        reason: "ERR_INVALID_ARGUMENT",
        code: 1,
    });
    InternalError::from_response(err.into(), response).into()
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    invalid_argument(err)
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    invalid_argument(err)
}

pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    invalid_argument(err)
}
