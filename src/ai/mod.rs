pub mod local;
pub mod openai;

pub use local::LocalAI;
pub use openai::OpenAIClient;

use std::time::Duration;

use crate::config::Config;

/// Client settings taken from the configuration: the per-request timeout.
pub fn http_client_builder(config: &Config) -> reqwest::ClientBuilder {
    reqwest::Client::builder().timeout(Duration::from_secs(config.openai_timeout_secs))
}

/// Builds the HTTP client shared by every remote call for the life of the process.
pub fn build_http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    let client = http_client_builder(config)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
    Ok(client)
}
