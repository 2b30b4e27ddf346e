//! Thin HTTP client for the endpoint under load

use anyhow::Result;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

/// Header carrying the caller's identity on the write path
const CLIENT_ID_HEADER: &str = "Client-ID";

/// Shared handle to the Turnstile endpoint
#[derive(Clone)]
pub struct Endpoint {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: String,
}

impl Endpoint {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POST one synthetic request tagged with the given client identity.
    /// Returns the response status; the body is the outcome's reason text
    /// and carries no extra information.
    pub async fn submit(&self, client_id: &str) -> Result<StatusCode> {
        let req = Request::builder()
            .method(Method::POST)
            .uri(format!("{}/", self.base_url))
            .header(CLIENT_ID_HEADER, client_id)
            .body(Full::new(Bytes::new()))?;

        let response = self.client.request(req).await?;
        Ok(response.status())
    }

    /// GET current statistics. `None` or an empty identity asks for the
    /// all-clients view.
    pub async fn fetch_stats(&self, client_id: Option<&str>) -> Result<(StatusCode, Bytes)> {
        let uri = match client_id {
            Some(id) if !id.is_empty() => format!("{}/?client_id={}", self.base_url, id),
            _ => format!("{}/", self.base_url),
        };

        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Full::new(Bytes::new()))?;

        let response = self.client.request(req).await?;
        let status = response.status();
        let body = response.collect().await?.to_bytes();
        Ok((status, body))
    }
}
