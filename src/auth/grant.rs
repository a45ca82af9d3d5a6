//! Calls to the auth endpoints: password login and refresh-token exchange.

use std::sync::Arc;

use reqwest::{header, Method, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::store::CredentialPair;
use crate::{
    envelope::{self, Error},
    transport::Transport,
};

pub const LOGIN_PATH: &str = "auth/login";
pub const REFRESH_PATH: &str = "auth/refresh";

pub struct AuthEndpoints {
    pub transport: Arc<dyn Transport>,
    pub login_url: Url,
    pub refresh_url: Url,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenData {
    access_token: String,
    refresh_token: String,
    token_type: Option<String>,
}

impl From<TokenData> for CredentialPair {
    fn from(data: TokenData) -> Self {
        let TokenData {
            access_token,
            refresh_token,
            token_type,
        } = data;
        let mut pair = CredentialPair::new(access_token, refresh_token);
        if let Some(token_type) = token_type {
            pair.token_type = token_type;
        }
        pair
    }
}

impl AuthEndpoints {
    pub fn new(transport: Arc<dyn Transport>, base_url: &Url) -> Result<Self, crate::Error> {
        Ok(Self {
            transport,
            login_url: crate::client::endpoint(base_url, LOGIN_PATH)?,
            refresh_url: crate::client::endpoint(base_url, REFRESH_PATH)?,
        })
    }

    /// Exchanges username and password for a credential pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<CredentialPair, Error> {
        debug!(message = "Logging in", username);
        self.perform(
            self.login_url.clone(),
            &LoginRequest { username, password },
        )
        .await
    }

    /// Posts `body` as JSON without any credentials attached and reads the
    /// token envelope.
    async fn perform<B: Serialize>(&self, url: Url, body: &B) -> Result<CredentialPair, Error> {
        let mut req = reqwest::Request::new(Method::POST, url);
        req.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        *req.body_mut() = Some(serde_json::to_vec(body)?.into());

        let res = self.transport.execute(req).await?;
        let data: TokenData = envelope::read(res).await?.into_data()?;
        Ok(data.into())
    }
}

#[async_trait::async_trait]
impl super::TokenRefresher for AuthEndpoints {
    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, Error> {
        self.perform(self.refresh_url.clone(), &RefreshRequest { refresh_token })
            .await
    }
}
