//! Blocking reqwest transport for the HTTP engine.

use hubindex_engine::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use std::time::Duration;

/// Basic auth credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: Option<String>,
}

/// [`HttpClient`] backed by a blocking reqwest client.
pub struct ReqwestClient {
    client: Client,
    credentials: Option<Credentials>,
}

impl ReqwestClient {
    /// Creates a client with a per-request timeout.
    pub fn new(timeout: Duration, credentials: Option<Credentials>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            credentials,
        })
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Post => Method::POST,
        HttpMethod::Delete => Method::DELETE,
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let mut builder = self.client.request(method(request.method), &request.url);
        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.username, credentials.password.as_ref());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = builder
            .send()
            .map_err(|e| format!("{} {}: {}", request.method, request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| format!("reading response of {}: {}", request.url, e))?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
