//! CADPREV API client for the DAIR_CARTEIRA (investment portfolio) endpoint.
//!
//! One GET per run, no retries. Every outcome is logged exactly once and the
//! caller decides whether to abort.

use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::domain::QueryParameters;

pub const DEFAULT_ENDPOINT: &str = "https://apicadprev.trabalho.gov.br/DAIR_CARTEIRA";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timeout: no response from the API within {0:?}")]
    Timeout(Duration),

    #[error("Connection failure: {0}")]
    Connection(String),

    #[error("HTTP error: status {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected error while fetching: {0}")]
    Unexpected(String),
}

impl FetchError {
    /// True for failures where no response was obtained at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Timeout(_) | FetchError::Connection(_))
    }
}

/// Raw successful response.
#[derive(Debug, Clone)]
pub struct Payload {
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    pub body: String,
}

impl Payload {
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

pub struct CadprevClient {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl CadprevClient {
    /// Client for `endpoint` with the standard 60 s timeout.
    pub fn new(endpoint: &str) -> Result<Self, FetchError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| FetchError::Unexpected(format!("invalid endpoint '{endpoint}': {e}")))?;
        // rustls verifies certificates unless told otherwise; we never tell it otherwise.
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Unexpected(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch the portfolio rows for `params`.
    pub fn fetch(&self, params: &QueryParameters) -> Result<Payload, FetchError> {
        let result = self.fetch_inner(params);
        match &result {
            Ok(payload) => {
                info!("Request succeeded: status {}", payload.status);
            }
            Err(FetchError::Timeout(_)) => error!("Timeout on API request to {}", self.endpoint),
            Err(err) => error!("{err}"),
        }
        result
    }

    fn fetch_inner(&self, params: &QueryParameters) -> Result<Payload, FetchError> {
        let resp = self
            .client
            .get(self.endpoint.clone())
            .query(&params.as_query())
            .send()
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        let url = resp.url().clone();

        if !status.is_success() {
            // The status alone classifies the failure; an unreadable body is reported in its place.
            let body = resp
                .text()
                .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp
            .text()
            .map_err(|e| FetchError::Unexpected(format!("failed to read response body: {e}")))?;

        if !same_host(&self.endpoint, &url) {
            warn!("Unexpected URL in API response: {url}");
        }

        Ok(Payload {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if err.is_connect() || err.is_request() {
            FetchError::Connection(err.to_string())
        } else {
            FetchError::Unexpected(err.to_string())
        }
    }
}

/// Convenience wrapper: build a client for `endpoint` and fetch once.
pub fn fetch(endpoint: &str, params: &QueryParameters, timeout: Duration) -> Result<Payload, FetchError> {
    let client = CadprevClient::with_timeout(endpoint, timeout).inspect_err(|err| error!("{err}"))?;
    client.fetch(params)
}

fn same_host(expected: &Url, actual: &Url) -> bool {
    match (expected.host_str(), actual.host_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}
