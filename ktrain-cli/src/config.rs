//! Configuration module
//!
//! Handles CLI configuration including the dispatcher URL and credentials.

use ktrain_client::DispatcherClient;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the dispatcher service
    pub dispatcher_url: String,
    /// Bearer token, when the dispatcher requires one
    pub token: Option<String>,
}

impl Config {
    /// Build an API client for the configured dispatcher
    pub fn client(&self) -> DispatcherClient {
        let client = DispatcherClient::new(&self.dispatcher_url);
        match &self.token {
            Some(token) => client.with_token(token),
            None => client,
        }
    }
}
