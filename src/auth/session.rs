use std::sync::Arc;

use tracing::info;

use super::{
    refresh::RefreshCoordinator,
    store::{self, CredentialPair, TokenStore},
    Navigator, TokenRefresher,
};

pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_ACCESS_DENIED_PATH: &str = "/access-denied";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    /// The session is gone and the user has to sign in again.
    Login,
    /// The server refused the current user.
    AccessDenied,
}

/// Sends the user elsewhere when a request cannot succeed as is.
pub struct SessionTerminator {
    navigator: Arc<dyn Navigator>,
    login_path: String,
    access_denied_path: String,
}

impl SessionTerminator {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            access_denied_path: DEFAULT_ACCESS_DENIED_PATH.to_owned(),
        }
    }

    pub fn with_paths(
        mut self,
        login_path: impl Into<String>,
        access_denied_path: impl Into<String>,
    ) -> Self {
        self.login_path = login_path.into();
        self.access_denied_path = access_denied_path.into();
        self
    }

    pub fn path(&self, redirect: Redirect) -> &str {
        match redirect {
            Redirect::Login => &self.login_path,
            Redirect::AccessDenied => &self.access_denied_path,
        }
    }

    pub fn redirect(&self, redirect: Redirect) {
        let path = self.path(redirect);
        info!(message = "Redirecting", ?redirect, path);
        self.navigator.navigate(path);
    }
}

/// Owns everything the request pipeline shares: the token store, the
/// single-flight refresh and the redirect target.
///
/// Build one per application and share it behind an `Arc`.
pub struct SessionManager {
    store: Arc<TokenStore>,
    terminator: Arc<SessionTerminator>,
    refresh: RefreshCoordinator,
}

impl SessionManager {
    pub fn new(
        store: TokenStore,
        refresher: Arc<dyn TokenRefresher>,
        terminator: SessionTerminator,
    ) -> Self {
        let store = Arc::new(store);
        let terminator = Arc::new(terminator);
        let refresh =
            RefreshCoordinator::new(Arc::clone(&store), refresher, Arc::clone(&terminator));
        Self {
            store,
            terminator,
            refresh,
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.access_token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.get().is_some()
    }

    /// Starts a session with a pair obtained outside the refresh flow.
    pub fn login(&self, pair: CredentialPair) -> Result<(), store::Error> {
        self.store.set(pair)?;
        info!("Session started");
        Ok(())
    }

    pub fn logout(&self) {
        self.store.clear();
        info!("Session ended by logout");
    }

    /// Single-flight refresh; see [`RefreshCoordinator::refresh_access_token`].
    pub async fn refresh_access_token(&self) -> Option<String> {
        self.refresh.refresh_access_token().await
    }

    pub fn redirect(&self, redirect: Redirect) {
        self.terminator.redirect(redirect);
    }
}
