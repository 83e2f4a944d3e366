//! Webhook URL validation with SSRF prevention. Validated once at
//! registration time and re-validated immediately before each delivery
//! attempt (TOCTOU defense: DNS can change between registration and send).

use url::Url;

use crate::verification::is_public_ip;

const BLOCKED_HOSTNAMES: &[&str] = &[
    "metadata.google.internal",
    "metadata.amazonaws.com",
    "169.254.169.254",
];

pub async fn validate_webhook_url(url: &str) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|_| "malformed URL".to_string())?;

    if parsed.scheme() != "https" {
        return Err("webhook URL must use HTTPS".to_string());
    }

    let Some(hostname) = parsed.host_str() else {
        return Err("webhook URL has no hostname".to_string());
    };

    if BLOCKED_HOSTNAMES.contains(&hostname) {
        return Err(format!("blocked hostname: {hostname}"));
    }

    if !is_public_ip(hostname).await {
        return Err("webhook URL resolves to a private or non-routable IP address".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_https_scheme() {
        let err = validate_webhook_url("http://example.com/hook").await.unwrap_err();
        assert!(err.contains("HTTPS"));
    }

    #[tokio::test]
    async fn rejects_known_metadata_hostname() {
        let err = validate_webhook_url("https://169.254.169.254/hook").await.unwrap_err();
        assert!(err.contains("blocked hostname"));
    }

    #[tokio::test]
    async fn rejects_malformed_url() {
        assert!(validate_webhook_url("not a url").await.is_err());
    }
}
