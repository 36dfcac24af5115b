//! Maps a configured profile onto the transport for its backend family.

use std::sync::Arc;

use parley_config::{BackendFamily, ProfileConfig};
use parley_core::error::ProviderError;
use parley_core::provider::Provider;
use tracing::debug;

use crate::anthropic::{ANTHROPIC_BASE_URL, AnthropicProvider};
use crate::gemini::{GEMINI_BASE_URL, GeminiProvider};
use crate::openai_compat::{OPENAI_BASE_URL, OpenAiCompatProvider};

/// Default endpoint for each backend family.
pub fn default_base_url(family: BackendFamily) -> &'static str {
    match family {
        BackendFamily::OpenAi => OPENAI_BASE_URL,
        BackendFamily::Anthropic => ANTHROPIC_BASE_URL,
        BackendFamily::Google => GEMINI_BASE_URL,
    }
}

/// Build the transport a profile describes.
///
/// OpenAI-compatible profiles pointed at a custom `base_url` may omit the key
/// (local servers such as Ollama). Every other profile needs one.
pub fn build_provider(profile: &ProfileConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let family = profile.family();
    let base = profile.base();
    let base_url = base
        .base_url
        .as_deref()
        .filter(|u| !u.is_empty())
        .unwrap_or(default_base_url(family));
    let api_key = base.api_key.clone().filter(|k| !k.is_empty());

    debug!(%family, model = %base.model, base_url, "Building provider");

    let missing_key = || {
        ProviderError::NotConfigured(format!(
            "no API key for {family} profile (set api_key or {})",
            family.api_key_env()
        ))
    };

    let provider: Arc<dyn Provider> = match family {
        BackendFamily::OpenAi => {
            if api_key.is_none() && base_url == OPENAI_BASE_URL {
                return Err(missing_key());
            }
            Arc::new(OpenAiCompatProvider::new("openai", base_url, api_key)?)
        }
        BackendFamily::Anthropic => {
            let key = api_key.ok_or_else(missing_key)?;
            Arc::new(AnthropicProvider::new(key)?.with_base_url(base_url))
        }
        BackendFamily::Google => {
            let key = api_key.ok_or_else(missing_key)?;
            Arc::new(GeminiProvider::new(key)?.with_base_url(base_url))
        }
    };

    Ok(provider)
}
