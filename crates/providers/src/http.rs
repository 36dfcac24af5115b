//! HTTP plumbing shared by every transport.

use std::time::Duration;

use parley_core::error::ProviderError;
use tracing::warn;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("failed to create HTTP client: {e}")))
}

/// Turn a non-success response into a [`ProviderError`].
///
/// A 400 on a request that carried tool definitions is reported as
/// [`ProviderError::ToolsRejected`] so the orchestrator can retry without them.
pub(crate) async fn error_for_status(
    provider: &str,
    response: reqwest::Response,
    tools_attached: bool,
) -> ProviderError {
    let status = response.status().as_u16();

    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => ProviderError::AuthenticationFailed(format!(
            "{provider}: invalid API key or insufficient permissions"
        )),
        _ => {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider, status, body = %error_body, "Provider returned error");
            if status == 400 && tools_attached {
                ProviderError::ToolsRejected(error_body)
            } else {
                ProviderError::ApiError {
                    status_code: status,
                    message: error_body,
                }
            }
        }
    }
}

pub(crate) fn network_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Network(format!("request timed out: {e}"))
    } else {
        ProviderError::Network(e.to_string())
    }
}
