//! Bounded retry with exponential backoff.
//!
//! Connection failures, timeouts, HTTP 429 and 5xx are retried up to
//! [`RetryPolicy::max_retries`] times. Any other 4xx is returned straight
//! away so the caller can apply its own status policy.

use reqwest::{Method, Request, Response, StatusCode, Url};
use tracing::warn;

use super::client::HttpClient;
use crate::config::RetryPolicy;

/// Sends a GET for `url`, retrying transient failures.
///
/// The last response is returned as-is once retries run out, even if its
/// status is still a server error.
pub async fn send_get<C: HttpClient + ?Sized>(
    client: &C,
    url: &Url,
    policy: RetryPolicy,
) -> reqwest::Result<Response> {
    let mut attempt = 0;
    loop {
        let result = client
            .execute(Request::new(Method::GET, url.clone()))
            .await;

        let retryable = match &result {
            Err(e) => is_transient(e),
            Ok(resp) => is_retryable_status(resp.status()),
        };
        if !retryable || attempt >= policy.max_retries {
            return result;
        }

        attempt += 1;
        let delay = policy.delay_for(attempt);
        match &result {
            Err(e) => warn!(%url, attempt, ?delay, error = %e, "Transient error, retrying"),
            Ok(resp) => warn!(
                %url,
                attempt,
                ?delay,
                status = resp.status().as_u16(),
                "Retryable status, retrying"
            ),
        }
        tokio::time::sleep(delay).await;
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body()
}
