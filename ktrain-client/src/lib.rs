//! ktrain HTTP Client
//!
//! A small, typed HTTP client for the ktrain dispatcher API, used by the CLI
//! and by anything else that submits training runs.
//!
//! # Example
//!
//! ```no_run
//! use ktrain_client::DispatcherClient;
//! use ktrain_core::dto::training::SubmitTraining;
//!
//! #[tokio::main]
//! async fn main() -> ktrain_client::Result<()> {
//!     let client = DispatcherClient::new("http://localhost:8080");
//!
//!     let dispatch = client
//!         .submit_training(&SubmitTraining {
//!             project_id: "p1".to_string(),
//!             script: "print(1)".to_string(),
//!             data_reference: "s3://datasets/p1/v1".to_string(),
//!             resources: None,
//!             credentials: None,
//!             force: false,
//!             use_cache: true,
//!             extra_args: vec!["--epochs".to_string(), "10".to_string()],
//!         })
//!         .await?;
//!
//!     println!("Workload: {} ({:?})", dispatch.workload_id, dispatch.disposition);
//!     Ok(())
//! }
//! ```

pub mod error;
mod training;
mod workloads;

pub use error::{ClientError, Result};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// HTTP client for the dispatcher API
#[derive(Debug, Clone)]
pub struct DispatcherClient {
    /// Base URL of the dispatcher (e.g., "http://localhost:8080")
    base_url: String,
    /// Bearer token sent with every request, if set
    token: Option<String>,
    client: Client,
}

impl DispatcherClient {
    /// Create a new dispatcher client
    ///
    /// # Example
    /// ```
    /// use ktrain_client::DispatcherClient;
    ///
    /// let client = DispatcherClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new dispatcher client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            client,
        }
    }

    /// Authenticate every request with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the base URL of the dispatcher
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code and return the body as text
    async fn handle_text_response(&self, response: reqwest::Response) -> Result<String> {
        let response = Self::check_status(response).await?;
        Ok(response.text().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::from_response(status.as_u16(), &error_text));
        }

        Ok(response)
    }
}
