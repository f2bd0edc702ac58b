//! Assistant service implementations

pub mod mock;
mod openai;

pub use mock::MockAssistantApi;
pub use openai::{OPENAI_BASE_URL, OpenAiClient};

use crate::config::Config;

/// Create a client for `api_key`, honouring a custom base URL from config
pub fn get_api(config: &Config, api_key: &str) -> OpenAiClient {
    match config.base_url.as_deref() {
        Some(base_url) => OpenAiClient::with_base_url(api_key, base_url),
        None => OpenAiClient::new(api_key),
    }
}
