use async_trait::async_trait;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use std::time::Duration;
use tracing::{debug, instrument};

use super::ShellError;

/// Performs one HTTP request for the core. Any status code is a response;
/// only failures to get one are errors.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> HttpResult;
}

pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    /// `timeout` bounds each request end to end.
    pub fn new(timeout: Duration) -> Result<Self, ShellError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ShellError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }

    fn map_error(e: &reqwest::Error) -> crux_http::Error {
        if e.is_timeout() {
            crux_http::Error::Timeout
        } else {
            crux_http::Error::Io(e.to_string())
        }
    }

    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, crux_http::Error> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| crux_http::Error::Url(e.to_string()))?;
        let mut builder = self.client.request(method, request.url.as_str());
        for header in &request.headers {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| Self::map_error(&e))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| Self::map_error(&e))?;

        debug!(status, bytes = body.len(), "response received");
        Ok(HttpResponse::status(status).body(body.to_vec()).build())
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    #[instrument(
        name = "shell_http_execute",
        skip(self, request),
        fields(method = %request.method, url = %request.url)
    )]
    async fn execute(&self, request: &HttpRequest) -> HttpResult {
        match self.send(request).await {
            Ok(response) => HttpResult::Ok(response),
            Err(e) => HttpResult::Err(e),
        }
    }
}
