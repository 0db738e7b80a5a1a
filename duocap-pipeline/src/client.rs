//! Shared HTTP client construction

use duocap_core::{DuocapError, TransferPolicy};

/// Check that a server base URL is plausible before building a client
pub(crate) fn validate_base_url(base_url: &str) -> Result<(), DuocapError> {
    if base_url.is_empty() {
        return Err(DuocapError::MissingConfiguration {
            field: "server base URL".to_string(),
        });
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(DuocapError::InvalidData {
            reason: format!(
                "server base URL must start with http:// or https://, got: {}",
                base_url
            ),
        });
    }
    Ok(())
}

/// Build a reqwest client with the transfer policy's generous timeouts.
/// Recordings and meshes are large, so connect/read/write all get the same
/// long budget.
pub(crate) fn build_http(policy: &TransferPolicy) -> Result<reqwest::Client, DuocapError> {
    reqwest::Client::builder()
        .connect_timeout(policy.connect_timeout)
        .timeout(policy.request_timeout)
        .build()
        .map_err(|err| DuocapError::Transport {
            operation: "client construction".to_string(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_validation() {
        assert!(validate_base_url("http://172.21.1.123:7777").is_ok());
        assert!(validate_base_url("https://example.com").is_ok());
        assert!(validate_base_url("").is_err());
        assert!(validate_base_url("ws://example.com").is_err());
    }
}
