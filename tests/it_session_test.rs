//! Integration tests for login, logout and persisted sessions

mod common;

use std::sync::Arc;

use backoffice_client::{ApiClient, Config, CredentialPair, Error, FileStore, TokenStore};
use common::{jwt, token_body, Harness, Student, STUDENTS_BODY};
use mockito::{Matcher, Server};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn login_stores_the_returned_pair() {
    //* Given
    let access = jwt(3600);
    let mut h = Harness::new().await;

    let login_mock = h
        .server
        .mock("POST", "/auth/login")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Json(
            json!({ "username": "registrar", "password": "hunter2" }),
        ))
        .with_status(200)
        .with_body(token_body(&access, "refresh-1"))
        .expect(1)
        .create_async()
        .await;

    //* When
    h.client
        .login("registrar", "hunter2")
        .await
        .expect("Login should succeed");

    //* Then
    login_mock.assert_async().await;
    assert_eq!(
        h.client.session().store().get(),
        Some(CredentialPair::new(access, "refresh-1"))
    );
    assert!(h.redirects().is_empty());
}

#[tokio::test]
async fn rejected_login_leaves_session_empty() {
    //* Given
    let mut h = Harness::new().await;

    let login_mock = h
        .server
        .mock("POST", "/auth/login")
        .with_status(401)
        .with_body(r#"{"success":false,"message":"Invalid username or password"}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh_mock = h
        .server
        .mock("POST", "/auth/refresh")
        .expect(0)
        .create_async()
        .await;

    //* When
    let err = h
        .client
        .login("registrar", "wrong")
        .await
        .expect_err("Login should fail");

    //* Then
    login_mock.assert_async().await;
    refresh_mock.assert_async().await;
    assert!(matches!(err, Error::Login(_)));
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(err.user_message(), "Invalid username or password");
    assert!(!h.client.session().is_authenticated());
    assert!(h.redirects().is_empty());
}

#[tokio::test]
async fn login_envelope_without_data_is_rejected() {
    //* Given
    let mut h = Harness::new().await;

    let login_mock = h
        .server
        .mock("POST", "/auth/login")
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create_async()
        .await;

    //* When
    let err = h
        .client
        .login("registrar", "hunter2")
        .await
        .expect_err("Login should fail");

    //* Then
    login_mock.assert_async().await;
    assert!(matches!(err, Error::Login(_)));
    assert!(!h.client.session().is_authenticated());
}

#[tokio::test]
async fn logout_stops_sending_credentials() {
    //* Given
    let mut h = Harness::logged_in(&jwt(3600), "refresh-1").await;

    let mock = h
        .server
        .mock("GET", "/students")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(STUDENTS_BODY)
        .expect(1)
        .create_async()
        .await;

    //* When
    h.client.logout();
    let result = h.client.get_json::<Vec<Student>>("students").await;

    //* Then
    mock.assert_async().await;
    assert!(result.is_ok());
    assert!(!h.client.session().is_authenticated());
    assert!(h.redirects().is_empty());
}

#[tokio::test]
async fn session_survives_a_restart_with_file_store() {
    //* Given
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("tokens.json");
    let access = jwt(3600);
    let mut server = Server::new_async().await;
    let config = Config::new(server.url());

    let login_mock = server
        .mock("POST", "/auth/login")
        .with_status(200)
        .with_body(token_body(&access, "refresh-1"))
        .expect(1)
        .create_async()
        .await;
    let students_mock = server
        .mock("GET", "/students")
        .match_header("authorization", format!("Bearer {access}").as_str())
        .with_status(200)
        .with_body(STUDENTS_BODY)
        .expect(1)
        .create_async()
        .await;

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let navigator = Arc::new(tx);

    let first = ApiClient::from_config(
        &config,
        TokenStore::new(FileStore::open(&path).expect("Failed to open store")),
        navigator.clone(),
    )
    .expect("Failed to build client");
    first
        .login("registrar", "hunter2")
        .await
        .expect("Login should succeed");
    drop(first);

    //* When
    let second = ApiClient::from_config(
        &config,
        TokenStore::new(FileStore::open(&path).expect("Failed to reopen store")),
        navigator,
    )
    .expect("Failed to build client");
    let result = second.get_json::<Vec<Student>>("students").await;

    //* Then
    login_mock.assert_async().await;
    students_mock.assert_async().await;
    assert!(result.is_ok());
    assert!(second.session().is_authenticated());
}
