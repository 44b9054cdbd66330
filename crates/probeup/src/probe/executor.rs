use std::time::Duration;

use reqwest::Method;
use tracing::debug;

use super::types::ProbeResult;
use crate::Error;

/// Performs one probe and reports the outcome.
///
/// Implementations must not fail: every fault is folded into the returned
/// [`ProbeResult`] so that one bad endpoint never aborts a batch.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str, path: &str, method: &str) -> ProbeResult;
}

/// Prober issuing real HTTP requests
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("firey/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    pub fn with_timeout_seconds(timeout_seconds: u64) -> Result<Self, Error> {
        Self::new(Duration::from_secs(timeout_seconds))
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str, path: &str, method: &str) -> ProbeResult {
        let result = ProbeResult::new(url, path, method);

        let http_method = match Method::from_bytes(method.as_bytes()) {
            Ok(m) => m,
            Err(e) => return result.failure(format!("Invalid HTTP method '{method}': {e}")),
        };

        let response = match self.client.request(http_method, url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url, method, "probe transport failure: {e}");
                return result.failure(describe_error(&e));
            }
        };

        let status_code = response.status().as_u16();

        match response.bytes().await {
            Ok(body) => result.completed(status_code, &body),
            Err(e) => {
                debug!(url, method, status_code, "failed to read response body: {e}");
                result.unreadable_body(status_code)
            }
        }
    }
}

/// Flatten an error and its sources into a single diagnostic line
fn describe_error(error: &reqwest::Error) -> String {
    let mut message = if error.is_timeout() {
        format!("Request timed out: {error}")
    } else {
        error.to_string()
    };

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}
