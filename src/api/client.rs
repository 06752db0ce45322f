use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use tracing::debug;

use crate::error::CallError;

/// Applied when the caller does not choose a timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// One authenticated request.
#[derive(Clone)]
pub struct CallRequest {
    pub url: String,
    pub method: String,
    pub api_key: String,
    pub api_secret: String,
    pub body: Vec<u8>,
    /// Skip server certificate verification for this call only.
    pub insecure_tls: bool,
    /// Deadline for the whole exchange. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for CallRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallRequest")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("body_len", &self.body.len())
            .field("insecure_tls", &self.insecure_tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CallRequest {
    pub fn new(
        url: impl Into<String>,
        method: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            body: Vec::new(),
            insecure_tls: false,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn insecure_tls(mut self, insecure: bool) -> Self {
        self.insecure_tls = insecure;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Status and raw body of a completed exchange. Non-2xx statuses land here too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    pub status: u16,
    pub body: Vec<u8>,
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issue a single request with basic auth and a JSON content type.
/// No retries; the response is read to completion and released before returning.
pub fn execute(request: &CallRequest) -> Result<CallResult, CallError> {
    let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| CallError::InvalidMethod(request.method.clone()))?;

    let client = Client::builder()
        .danger_accept_invalid_certs(request.insecure_tls)
        .timeout(request.timeout)
        .build()
        .map_err(CallError::Client)?;

    let transport_err = |source: reqwest::Error| CallError::Transport {
        url: request.url.clone(),
        source,
    };

    debug!(
        method = %method,
        url = %request.url,
        insecure_tls = request.insecure_tls,
        "sending request"
    );

    let response = client
        .request(method, &request.url)
        .header(CONTENT_TYPE, "application/json")
        .basic_auth(&request.api_key, Some(&request.api_secret))
        .body(request.body.clone())
        .send()
        .map_err(transport_err)?;

    let status = response.status().as_u16();
    // `bytes` consumes the response, so the connection is released on every path.
    let body = response.bytes().map_err(transport_err)?.to_vec();

    debug!(status, body_len = body.len(), "received response");

    Ok(CallResult { status, body })
}

/// Six-argument form of [`execute`] using the default timeout.
pub fn call(
    url: &str,
    method: &str,
    api_key: &str,
    api_secret: &str,
    body: &[u8],
    insecure_tls: bool,
) -> Result<CallResult, CallError> {
    let request = CallRequest::new(url, method, api_key, api_secret)
        .body(body)
        .insecure_tls(insecure_tls);
    execute(&request)
}
