//! Authorization logic.

pub mod grant;
pub mod inspect;
pub mod refresh;
pub mod session;
pub mod store;

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use self::store::CredentialPair;

/// Exchanges a refresh token for a new credential pair.
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, crate::envelope::Error>;
}

/// Synchronous key-value surface the token store persists into.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Receives navigation requests when the session cannot continue as is.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

impl Navigator for tokio::sync::mpsc::UnboundedSender<String> {
    fn navigate(&self, path: &str) {
        if self.send(path.to_owned()).is_err() {
            debug!(message = "Navigation receiver is gone", path);
        }
    }
}

/// Locks `mutex`, carrying on with the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
