mod basic;
mod client;
mod header;
mod retry;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use header::WithHeader;
pub use retry::send_get;

use bytes::Bytes;
use reqwest::{StatusCode, Url};

use crate::config::{RetryPolicy, Settings};
use crate::error::TfrError;

/// Status and full body of a completed request.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub fn parse_url(url: &str) -> Result<Url, TfrError> {
    Url::parse(url).map_err(|e| TfrError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// GETs `url` with retries and reads the whole body, whatever the status.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &Url,
    policy: RetryPolicy,
) -> reqwest::Result<Fetched> {
    let resp = send_get(client, url, policy).await?;
    let status = resp.status();
    let body = resp.bytes().await?;
    Ok(Fetched { status, body })
}

/// Builds the production client: timeouts from `settings`, User-Agent injected.
pub fn client_from_settings(settings: &Settings) -> Result<WithHeader<BasicClient>, TfrError> {
    let basic = BasicClient::new(settings.request_timeout, settings.connect_timeout)?;
    WithHeader::user_agent(basic, &settings.user_agent)
}
