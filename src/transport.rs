//! The request/response function underneath the auth pipeline.

use reqwest::{Request, Response};

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response, reqwest::Error>;
}

#[async_trait::async_trait]
impl Transport for reqwest::Client {
    async fn execute(&self, request: Request) -> Result<Response, reqwest::Error> {
        reqwest::Client::execute(self, request).await
    }
}
