use reqwest::{header::InvalidHeaderValue, StatusCode};

use crate::{auth::store, config, envelope};

pub const GENERIC_MESSAGE: &str = "Something went wrong, please try again.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired, please sign in again.";
pub const ACCESS_DENIED_MESSAGE: &str = "You do not have access to this resource.";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("session expired")]
    AuthExpired,
    #[error("access denied: {}", message.as_deref().unwrap_or("forbidden"))]
    AuthForbidden { message: Option<String> },
    #[error("server: {status} status code")]
    Status {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("rejected: {}", message.as_deref().unwrap_or("no message"))]
    Envelope { message: Option<String> },
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("login: {0}")]
    Login(#[source] envelope::Error),
    #[error("store: {0}")]
    Store(#[from] store::Error),
    #[error("invalid header: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("config: {0}")]
    Config(#[from] config::Error),
}

impl From<envelope::Error> for Error {
    fn from(err: envelope::Error) -> Self {
        match err {
            envelope::Error::Reqwest(err) => Error::Transport(err),
            envelope::Error::Server { status, message } => Error::Status { status, message },
            envelope::Error::Rejected { message } => Error::Envelope { message },
            envelope::Error::Decode(err) => Error::Json(err),
        }
    }
}

impl Error {
    /// HTTP status behind the failure, when there was a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::AuthExpired => Some(StatusCode::UNAUTHORIZED),
            Error::AuthForbidden { .. } => Some(StatusCode::FORBIDDEN),
            Error::Status { status, .. } => Some(*status),
            Error::Login(envelope::Error::Server { status, .. }) => Some(*status),
            Error::Transport(err) => err.status(),
            _ => None,
        }
    }

    /// Text fit to show the user: the server's message when it sent one.
    pub fn user_message(&self) -> String {
        let message = match self {
            Error::AuthExpired => Some(SESSION_EXPIRED_MESSAGE),
            Error::AuthForbidden { message } => {
                Some(message.as_deref().unwrap_or(ACCESS_DENIED_MESSAGE))
            }
            Error::Status { message, .. } | Error::Envelope { message } => message.as_deref(),
            Error::Login(err) => err.message(),
            _ => None,
        };
        message.unwrap_or(GENERIC_MESSAGE).to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_server_text() {
        let err = Error::Status {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: Some("Invoice already paid".to_owned()),
        };
        assert_eq!(err.user_message(), "Invoice already paid");

        let err = Error::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: None,
        };
        assert_eq!(err.user_message(), GENERIC_MESSAGE);
    }

    #[test]
    fn auth_failures_have_fixed_fallbacks() {
        assert_eq!(Error::AuthExpired.user_message(), SESSION_EXPIRED_MESSAGE);
        assert_eq!(
            Error::AuthForbidden { message: None }.user_message(),
            ACCESS_DENIED_MESSAGE
        );
        assert_eq!(
            Error::AuthForbidden {
                message: Some("Payroll is restricted".to_owned())
            }
            .user_message(),
            "Payroll is restricted"
        );
    }

    #[test]
    fn envelope_errors_map_onto_kinds() {
        let err = Error::from(envelope::Error::Server {
            status: StatusCode::NOT_FOUND,
            message: Some("No such student".to_owned()),
        });
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.user_message(), "No such student");

        let err = Error::from(envelope::Error::Rejected { message: None });
        assert!(matches!(err, Error::Envelope { message: None }));
        assert_eq!(err.status(), None);
    }
}
