use crate::error::TfrError;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, USER_AGENT};

/// An [`HttpClient`] wrapper that sets one header on every request.
///
/// The listing and detail endpoints reject clients without a browser-like
/// `User-Agent`, so the pipeline always runs behind [`WithHeader::user_agent`].
pub struct WithHeader<C> {
    inner: C,
    name: HeaderName,
    value: HeaderValue,
}

impl<C> WithHeader<C> {
    pub fn new(inner: C, name: &str, value: &str) -> Result<Self, TfrError> {
        let invalid = |message: String| TfrError::InvalidHeader {
            name: name.to_string(),
            message,
        };
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            inner,
            name: header_name,
            value: header_value,
        })
    }

    pub fn user_agent(inner: C, agent: &str) -> Result<Self, TfrError> {
        Self::new(inner, USER_AGENT.as_str(), agent)
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for WithHeader<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut().insert(self.name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}
