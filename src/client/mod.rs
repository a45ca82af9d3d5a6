//! Back-office API client.
//!
//! [`ApiClient::execute`] is the request pipeline. Before a request is sent
//! the current access token is attached, refreshed first if it is about to
//! expire; a request whose proactive refresh fails is never sent. After the
//! response arrives a `401` triggers one refresh and one replay of the same
//! request, and a `403` sends the user to the access-denied page while still
//! failing the call.

use std::{sync::Arc, time::Duration};

use reqwest::{
    header::{self, HeaderValue},
    Method, Request, Response, StatusCode, Url,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::{
    auth::{
        grant::AuthEndpoints,
        inspect,
        session::{Redirect, SessionManager, SessionTerminator},
        store::TokenStore,
        Navigator,
    },
    config::Config,
    envelope,
    error::Error,
    transport::Transport,
};

pub const DEFAULT_REFRESH_LEAD_TIME: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: Url,
    session: Arc<SessionManager>,
    endpoints: Arc<AuthEndpoints>,
    lead_time: Duration,
}

/// Where a logical request is in its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    Retried,
}

impl ApiClient {
    /// Builds the whole stack: reqwest transport, auth endpoints and session.
    pub fn from_config(
        config: &Config,
        store: TokenStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, Error> {
        let base_url = config.base_url()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let transport: Arc<dyn Transport> = Arc::new(client);
        let endpoints = Arc::new(AuthEndpoints::new(Arc::clone(&transport), &base_url)?);
        let terminator = SessionTerminator::new(navigator)
            .with_paths(&config.login_path, &config.access_denied_path);
        let session = Arc::new(SessionManager::new(store, endpoints.clone(), terminator));

        Ok(Self {
            transport,
            base_url,
            session,
            endpoints,
            lead_time: config.refresh_lead_time(),
        })
    }

    /// Uses an existing session, e.g. one shared with another client.
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: Url,
        session: Arc<SessionManager>,
    ) -> Result<Self, Error> {
        let endpoints = Arc::new(AuthEndpoints::new(Arc::clone(&transport), &base_url)?);
        Ok(Self {
            transport,
            base_url,
            session,
            endpoints,
            lead_time: DEFAULT_REFRESH_LEAD_TIME,
        })
    }

    pub fn with_refresh_lead_time(mut self, lead_time: Duration) -> Self {
        self.lead_time = lead_time;
        self
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), Error> {
        let pair = self
            .endpoints
            .login(username, password)
            .await
            .map_err(Error::Login)?;
        self.session.login(pair)?;
        Ok(())
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    pub fn request(&self, method: Method, path: &str) -> Result<Request, Error> {
        Ok(Request::new(method, endpoint(&self.base_url, path)?))
    }

    pub fn json_request<B>(&self, method: Method, path: &str, body: &B) -> Result<Request, Error>
    where
        B: Serialize + ?Sized,
    {
        let mut req = self.request(method, path)?;
        req.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        *req.body_mut() = Some(serde_json::to_vec(body)?.into());
        Ok(req)
    }

    /// Sends `request` through the auth pipeline.
    ///
    /// Responses other than `401` and `403` come back untouched, whatever
    /// their status.
    pub async fn execute(&self, mut request: Request) -> Result<Response, Error> {
        self.authorize(&mut request).await?;

        let mut attempt = Attempt::Initial;
        loop {
            let replay = match attempt {
                Attempt::Initial => request.try_clone(),
                Attempt::Retried => None,
            };
            let method = request.method().clone();
            let url = request.url().clone();

            let res = self.transport.execute(request).await?;

            match (res.status(), attempt) {
                (StatusCode::UNAUTHORIZED, Attempt::Initial) => {
                    debug!(message = "Unauthorized, refreshing", %method, %url);
                    let Some(token) = self.session.refresh_access_token().await else {
                        return Err(Error::AuthExpired);
                    };
                    let Some(mut retry) = replay else {
                        warn!(message = "Request body cannot be replayed", %method, %url);
                        return Err(Error::AuthExpired);
                    };
                    set_bearer(&mut retry, &token)?;
                    info!(message = "Retrying after refresh", %method, %url);
                    request = retry;
                    attempt = Attempt::Retried;
                }
                (StatusCode::UNAUTHORIZED, Attempt::Retried) => {
                    warn!(message = "Unauthorized after refresh, giving up", %method, %url);
                    return Err(Error::AuthExpired);
                }
                (StatusCode::FORBIDDEN, _) => {
                    self.session.redirect(Redirect::AccessDenied);
                    let message = envelope::read_message(res).await;
                    return Err(Error::AuthForbidden { message });
                }
                _ => return Ok(res),
            }
        }
    }

    async fn authorize(&self, request: &mut Request) -> Result<(), Error> {
        let Some(token) = self.session.access_token() else {
            return Ok(());
        };

        let token = if inspect::is_expiring_soon(&token, self.lead_time) {
            debug!(message = "Access token expiring, refreshing before send", url = %request.url());
            // A failed refresh has already ended the session.
            self.session
                .refresh_access_token()
                .await
                .ok_or(Error::AuthExpired)?
        } else {
            token
        };

        set_bearer(request, &token)
    }

    pub async fn get_json<T>(&self, path: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let res = self.execute(self.request(Method::GET, path)?).await?;
        Self::parse_data(res).await
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let res = self
            .execute(self.json_request(Method::POST, path, body)?)
            .await?;
        Self::parse_data(res).await
    }

    pub async fn put_json<T, B>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let res = self
            .execute(self.json_request(Method::PUT, path, body)?)
            .await?;
        Self::parse_data(res).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        let res = self.execute(self.request(Method::DELETE, path)?).await?;
        envelope::read::<serde_json::Value>(res)
            .await?
            .ensure_success()?;
        Ok(())
    }

    async fn parse_data<T>(res: Response) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let data = envelope::read(res).await?.into_data()?;
        Ok(data)
    }
}

/// Resolves `path` below `base_url`, keeping every segment of the base.
pub fn endpoint(base_url: &Url, path: &str) -> Result<Url, Error> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|err| Error::InvalidPath {
            path: path.to_owned(),
            reason: err.to_string(),
        })
}

fn set_bearer(request: &mut Request, token: &str) -> Result<(), Error> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
    value.set_sensitive(true);
    request.headers_mut().insert(header::AUTHORIZATION, value);
    Ok(())
}
