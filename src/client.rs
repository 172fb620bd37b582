use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::config::Settings;
use crate::error::MgsError;

/// JSON-over-HTTP access to a MetaGenScope server.
pub trait MgsClient: Send + Sync {
    fn post(&self, endpoint: &str, payload: &Value) -> Result<Value, MgsError>;
    fn get(&self, endpoint: &str) -> Result<Value, MgsError>;
}

impl<C: MgsClient + ?Sized> MgsClient for &C {
    fn post(&self, endpoint: &str, payload: &Value) -> Result<Value, MgsError> {
        (**self).post(endpoint, payload)
    }

    fn get(&self, endpoint: &str) -> Result<Value, MgsError> {
        (**self).get(endpoint)
    }
}

#[derive(Clone)]
pub struct MgsHttpClient {
    client: Client,
    host: String,
    token: Option<String>,
}

impl MgsHttpClient {
    /// Client for endpoints that require a bearer token.
    pub fn authenticated(settings: &Settings) -> Result<Self, MgsError> {
        let token = settings
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(MgsError::MissingAuthentication)?;
        Self::build(&settings.host, Some(token.to_string()))
    }

    /// Client for registration and login.
    pub fn anonymous(host: &str) -> Result<Self, MgsError> {
        Self::build(host, None)
    }

    fn build(host: &str, token: Option<String>) -> Result<Self, MgsError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("metagenscope/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MgsError::Http(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| MgsError::Http(err.to_string()))?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.host, endpoint)
    }

    fn send(&self, request: RequestBuilder) -> Result<Value, MgsError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .map_err(|err| MgsError::Http(err.to_string()))?;
        Self::handle_response(response)
    }

    fn handle_response(response: Response) -> Result<Value, MgsError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "MetaGenScope request failed".to_string());
            return Err(MgsError::Status {
                status: status.as_u16(),
                message,
            });
        }
        let body = response
            .text()
            .map_err(|err| MgsError::Http(err.to_string()))?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|err| MgsError::UnexpectedResponse(err.to_string()))
    }
}

impl MgsClient for MgsHttpClient {
    fn post(&self, endpoint: &str, payload: &Value) -> Result<Value, MgsError> {
        debug!(endpoint, "POST");
        self.send(self.client.post(self.url(endpoint)).json(payload))
    }

    fn get(&self, endpoint: &str) -> Result<Value, MgsError> {
        debug!(endpoint, "GET");
        self.send(self.client.get(self.url(endpoint)))
    }
}

/// Reads a string at a JSON pointer such as `/data/sample/uuid`.
pub fn response_str(response: &Value, pointer: &str) -> Result<String, MgsError> {
    response
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| MgsError::UnexpectedResponse(format!("missing {pointer} in {response}")))
}
