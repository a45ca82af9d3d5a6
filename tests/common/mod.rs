//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::{
    net::TcpListener,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use backoffice_client::{ApiClient, Config, CredentialPair, TokenStore};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use mockito::{Server, ServerGuard};
use serde::Deserialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing_subscriber::EnvFilter;

pub struct Harness {
    pub server: ServerGuard,
    pub client: ApiClient,
    redirects: UnboundedReceiver<String>,
}

impl Harness {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let (client, redirects) = client_for(&server.url());

        Self {
            server,
            client,
            redirects,
        }
    }

    pub async fn logged_in(access_token: &str, refresh_token: &str) -> Self {
        let harness = Self::new().await;
        harness
            .client
            .session()
            .login(CredentialPair::new(access_token, refresh_token))
            .expect("Failed to store credentials");
        harness
    }

    /// Redirects issued so far.
    pub fn redirects(&mut self) -> Vec<String> {
        drain(&mut self.redirects)
    }
}

/// Client with an in-memory store, reporting redirects on the returned channel.
pub fn client_for(base_url: &str) -> (ApiClient, UnboundedReceiver<String>) {
    init_tracing();

    let (tx, redirects) = unbounded_channel();
    let client = ApiClient::from_config(
        &Config::new(base_url),
        TokenStore::in_memory(),
        Arc::new(tx),
    )
    .expect("Failed to build client");
    (client, redirects)
}

pub fn drain(redirects: &mut UnboundedReceiver<String>) -> Vec<String> {
    let mut paths = Vec::new();
    while let Ok(path) = redirects.try_recv() {
        paths.push(path);
    }
    paths
}

/// Base URL of a local port nobody listens on.
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    drop(listener);
    format!("http://{addr}")
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Student {
    pub id: u32,
    pub name: String,
}

pub const STUDENTS_BODY: &str =
    r#"{"success":true,"data":[{"id":1,"name":"Ada"},{"id":2,"name":"Grace"}]}"#;

pub fn students() -> Vec<Student> {
    vec![
        Student {
            id: 1,
            name: "Ada".to_owned(),
        },
        Student {
            id: 2,
            name: "Grace".to_owned(),
        },
    ]
}

/// Unsigned JWT expiring `offset_secs` from now.
pub fn jwt(offset_secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as i64;
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"7","exp":{}}}"#, now + offset_secs));
    format!("{header}.{payload}.signature")
}

pub fn token_body(access_token: &str, refresh_token: &str) -> String {
    serde_json::json!({
        "success": true,
        "data": {
            "access_token": access_token,
            "refresh_token": refresh_token,
            "token_type": "bearer",
        },
    })
    .to_string()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
