//! Authenticated HTTP client for the back-office API.
//!
//! Every request goes through [`ApiClient`], which attaches the current bearer
//! token, refreshes it ahead of expiry, and retries once after a `401` when a
//! refresh succeeds. Refreshes are single-flight per [`auth::SessionManager`].

pub mod auth;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod transport;

pub use auth::{
    session::{Redirect, SessionManager, SessionTerminator},
    store::{CredentialPair, FileStore, MemoryStore, TokenStore},
    KeyValueStore, Navigator,
};
pub use client::ApiClient;
pub use config::Config;
pub use error::Error;
pub use transport::Transport;
