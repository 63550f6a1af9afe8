//! Request-level error taxonomy.
//!
//! Every variant maps to a stable machine-readable code and an HTTP status.
//! Uniqueness races are not errors: the engines absorb them as no-ops.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("login required")]
    AuthRequired,

    #[error("invalid input: {0}")]
    InvalidInput(InvalidInput),

    #[error("not found")]
    NotFound,

    #[error("forbidden: {0}")]
    Forbidden(Forbidden),

    #[error("submitting again is allowed in {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("kind must be like or dislike")]
    BadKind,
    #[error("missing or malformed tip id")]
    BadTipId,
    #[error("title is required")]
    MissingTitle,
    #[error("title is too long")]
    TitleTooLong,
    #[error("a link, image or attachment is required")]
    MissingEvidence,
    #[error("handle and password are required")]
    BadLoginInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Forbidden {
    #[error("cannot vote on your own tip")]
    SelfVote,
    #[error("only the author can delete a tip")]
    NotAuthor,
    #[error("wrong handle or password")]
    BadCredentials,
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::AuthRequired => "LOGIN_REQUIRED",
            Error::InvalidInput(InvalidInput::BadKind) => "BAD_KIND",
            Error::InvalidInput(InvalidInput::BadTipId) => "BAD_TIP_ID",
            Error::InvalidInput(InvalidInput::MissingTitle) => "MISSING_TITLE",
            Error::InvalidInput(InvalidInput::TitleTooLong) => "TITLE_TOO_LONG",
            Error::InvalidInput(InvalidInput::MissingEvidence) => "MISSING_EVIDENCE",
            Error::InvalidInput(InvalidInput::BadLoginInput) => "BAD_LOGIN_INPUT",
            Error::NotFound => "NOT_FOUND",
            Error::Forbidden(Forbidden::SelfVote) => "SELF_VOTE",
            Error::Forbidden(Forbidden::NotAuthor) => "NOT_AUTHOR",
            Error::Forbidden(Forbidden::BadCredentials) => "BAD_LOGIN",
            Error::RateLimited { .. } => "RATE_LIMITED",
            Error::Store(_) | Error::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::AuthRequired => StatusCode::UNAUTHORIZED,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            // Self-votes are reported as a bad request on the wire.
            Error::Forbidden(Forbidden::SelfVote) => StatusCode::BAD_REQUEST,
            Error::Forbidden(Forbidden::BadCredentials) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(Forbidden::NotAuthor) => StatusCode::FORBIDDEN,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Store(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<InvalidInput> for Error {
    fn from(e: InvalidInput) -> Self {
        Error::InvalidInput(e)
    }
}

impl From<Forbidden> for Error {
    fn from(e: Forbidden) -> Self {
        Error::Forbidden(e)
    }
}

impl From<tower_sessions::session::Error> for Error {
    fn from(e: tower_sessions::session::Error) -> Self {
        Error::Internal(format!("session: {e}"))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = json!({ "ok": false, "code": self.code() });
        if let Error::RateLimited { retry_after_secs } = self {
            body["retry_after_secs"] = json!(retry_after_secs);
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        assert_eq!(Error::AuthRequired.code(), "LOGIN_REQUIRED");
        assert_eq!(Error::AuthRequired.status(), StatusCode::UNAUTHORIZED);

        let bad_kind: Error = InvalidInput::BadKind.into();
        assert_eq!(bad_kind.code(), "BAD_KIND");
        assert_eq!(bad_kind.status(), StatusCode::BAD_REQUEST);

        let self_vote: Error = Forbidden::SelfVote.into();
        assert_eq!(self_vote.code(), "SELF_VOTE");
        assert_eq!(self_vote.status(), StatusCode::BAD_REQUEST);

        let not_author: Error = Forbidden::NotAuthor.into();
        assert_eq!(not_author.status(), StatusCode::FORBIDDEN);

        let store: Error = StoreError::backend("boom").into();
        assert_eq!(store.code(), "INTERNAL");
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
