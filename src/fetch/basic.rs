use std::time::Duration;

use super::client::HttpClient;
use async_trait::async_trait;

/// Plain reqwest client with request and connect timeouts applied.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
