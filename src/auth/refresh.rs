//! Single-flight refresh of the access token.
//!
//! The first caller that needs a refresh creates the in-flight handle under
//! the slot lock, so any caller arriving while it runs joins the same outcome
//! instead of spending the refresh token a second time. The refresh body runs
//! on its own task: it finishes and releases the slot even if every waiter
//! has gone away.
//!
//! A session is ended at most once. Callers that miss the in-flight refresh
//! and fail again against the same stored session (the store's epoch has not
//! moved) clear nothing new and issue no second login redirect.

use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use super::{
    lock,
    session::{Redirect, SessionTerminator},
    store::{self, TokenStore},
    TokenRefresher,
};
use crate::envelope;

/// `Some(access_token)` after a successful refresh, `None` once the session
/// has been ended.
pub type RefreshOutcome = Option<String>;

type InFlightOutcome = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no refresh token stored")]
    MissingRefreshToken,
    #[error("refresh call: {0}")]
    Grant(#[from] envelope::Error),
    #[error("store: {0}")]
    Store(#[from] store::Error),
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    terminator: Arc<SessionTerminator>,
    slot: Mutex<Slot>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    in_flight: Option<InFlight>,
    /// Store epoch of the last session ended here.
    ended: Option<u64>,
}

struct InFlight {
    generation: u64,
    outcome: InFlightOutcome,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        terminator: Arc<SessionTerminator>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                refresher,
                terminator,
                slot: Mutex::new(Slot::default()),
            }),
        }
    }

    /// Refreshes the access token, joining a refresh already in flight.
    ///
    /// On failure the store has been cleared and a login redirect issued
    /// before `None` is returned, exactly once per refresh no matter how many
    /// callers joined it.
    pub async fn refresh_access_token(&self) -> RefreshOutcome {
        let outcome = self.join_or_start();
        outcome.await
    }

    #[cfg(test)]
    fn is_refreshing(&self) -> bool {
        lock(&self.inner.slot).in_flight.is_some()
    }

    fn join_or_start(&self) -> InFlightOutcome {
        let mut slot = lock(&self.inner.slot);

        if let Some(in_flight) = &slot.in_flight {
            debug!(
                message = "Joining in-flight refresh",
                generation = in_flight.generation
            );
            return in_flight.outcome.clone();
        }

        slot.generation += 1;
        let generation = slot.generation;
        debug!(message = "Starting refresh", generation);

        let task = tokio::spawn({
            let inner = Arc::clone(&self.inner);
            async move {
                let outcome = inner.perform_refresh().await;
                inner.settle(generation);
                outcome
            }
        });

        let inner = Arc::clone(&self.inner);
        let outcome = async move {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(message = "Refresh task did not complete", error = %err);
                    inner.end_session();
                    None
                }
            };
            inner.settle(generation);
            outcome
        }
        .boxed()
        .shared();

        slot.in_flight = Some(InFlight {
            generation,
            outcome: outcome.clone(),
        });
        outcome
    }
}

impl Inner {
    async fn perform_refresh(&self) -> RefreshOutcome {
        match self.try_refresh().await {
            Ok(access_token) => {
                info!("Access token refreshed");
                Some(access_token)
            }
            Err(err) => {
                warn!(message = "Refresh failed, ending session", error = %err);
                self.end_session();
                None
            }
        }
    }

    async fn try_refresh(&self) -> Result<String, Error> {
        let refresh_token = self
            .store
            .refresh_token()
            .ok_or(Error::MissingRefreshToken)?;
        let pair = self.refresher.refresh(&refresh_token).await?;
        let access_token = pair.access_token.clone();
        self.store.set(pair)?;
        Ok(access_token)
    }

    fn end_session(&self) {
        {
            let mut slot = lock(&self.slot);
            let epoch = self.store.epoch();
            self.store.clear();
            if slot.ended == Some(epoch) {
                debug!(message = "Session already ended", epoch);
                return;
            }
            slot.ended = Some(epoch);
        }
        self.terminator.redirect(Redirect::Login);
    }

    /// Releases the slot if it still belongs to `generation`.
    fn settle(&self, generation: u64) {
        let mut slot = lock(&self.slot);
        if matches!(&slot.in_flight, Some(in_flight) if in_flight.generation == generation) {
            slot.in_flight = None;
            debug!(message = "Refresh settled", generation);
        }
    }
}
