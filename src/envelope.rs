//! The `{ success, data, message }` wrapper the back-office API puts around
//! every response body.

use reqwest::{Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("server: {status} status code")]
    Server {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("rejected: {}", message.as_deref().unwrap_or("no message"))]
    Rejected { message: Option<String> },
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// The message the server attached to the failure, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Error::Server { message, .. } | Error::Rejected { message } => message.as_deref(),
            Error::Reqwest(_) | Error::Decode(_) => None,
        }
    }
}

impl<T> Envelope<T> {
    /// Unwraps `data`, treating `success: false` or a missing payload as a rejection.
    pub fn into_data(self) -> Result<T, Error> {
        match self {
            Envelope {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            Envelope { message, .. } => Err(Error::Rejected { message }),
        }
    }

    pub fn ensure_success(self) -> Result<(), Error> {
        if self.success {
            Ok(())
        } else {
            Err(Error::Rejected {
                message: self.message,
            })
        }
    }
}

/// Reads `res` as an envelope. Non-success statuses become [`Error::Server`]
/// carrying the payload's message when there is one.
pub async fn read<T>(res: Response) -> Result<Envelope<T>, Error>
where
    T: DeserializeOwned,
{
    let status = res.status();
    let body = res.bytes().await?;
    if !status.is_success() {
        return Err(Error::Server {
            status,
            message: message_of(&body),
        });
    }
    let envelope = serde_json::from_slice(&body)?;
    Ok(envelope)
}

/// Best-effort read of the `message` field of a response body.
pub async fn read_message(res: Response) -> Option<String> {
    let body = res.bytes().await.ok()?;
    message_of(&body)
}

pub fn message_of(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct MessageOnly {
        message: Option<String>,
    }

    serde_json::from_slice::<MessageOnly>(body)
        .ok()?
        .message
        .filter(|message| !message.trim().is_empty())
}
