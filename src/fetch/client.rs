use async_trait::async_trait;
use reqwest::{Request, Response};

/// The seam every outbound request goes through.
///
/// Production code uses [`BasicClient`](super::BasicClient), optionally
/// wrapped in [`WithHeader`](super::WithHeader); tests plug in canned responses.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
