//! npm registry client.

use super::error::PkgError;
use super::resolver::VersionResolver;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default npm registry URL.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Registry client for fetching package metadata.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
    http: Client,
}

impl RegistryClient {
    /// Create a new registry client with the given base URL.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(base_url: &str) -> Result<Self, PkgError> {
        Self::with_timeout(base_url, Duration::from_secs(15))
    }

    /// Create a client whose requests give up after `timeout`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, PkgError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| PkgError::registry(format!("Invalid registry URL '{base_url}': {e}")))?;

        // `Url::join` drops the last path segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .timeout(timeout)
            .user_agent(concat!("blink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PkgError::registry(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { base_url, http })
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the HTTP client (for reuse in tarball downloads).
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Fetch the packument (package metadata) for a package.
    ///
    /// # Errors
    /// Returns an error if the request fails or the package is not found.
    pub async fn fetch_packument(&self, name: &str) -> Result<serde_json::Value, PkgError> {
        // URL-encode the name for scoped packages
        let encoded_name = if name.starts_with('@') {
            name.replace('/', "%2F")
        } else {
            name.to_string()
        };

        let url = self
            .base_url
            .join(&encoded_name)
            .map_err(|e| PkgError::registry(format!("Failed to build URL for '{name}': {e}")))?;

        debug!(%url, "Fetching packument");
        let response = self.http.get(url.as_str()).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PkgError::not_found(name));
        }

        if !response.status().is_success() {
            return Err(PkgError::registry(format!(
                "Registry returned status {} for '{name}'",
                response.status()
            )));
        }

        let json: serde_json::Value = response.json().await?;
        Ok(json)
    }
}

#[async_trait]
impl VersionResolver for RegistryClient {
    async fn latest_version(&self, name: &str) -> Result<String, PkgError> {
        let packument = self.fetch_packument(name).await?;
        let latest = get_latest_version(&packument).ok_or_else(|| {
            PkgError::registry(format!("Packument for '{name}' has no latest dist-tag"))
        })?;
        debug!(name, latest, "Resolved latest version");
        Ok(latest.to_string())
    }
}

/// Extract the latest version from a packument.
#[must_use]
pub fn get_latest_version(packument: &serde_json::Value) -> Option<&str> {
    packument.get("dist-tags")?.get("latest")?.as_str()
}

/// Extract the tarball URL for a specific version.
#[must_use]
pub fn get_tarball_url<'a>(packument: &'a serde_json::Value, version: &str) -> Option<&'a str> {
    packument
        .get("versions")?
        .get(version)?
        .get("dist")?
        .get("tarball")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_latest_version() {
        let packument = serde_json::json!({
            "name": "@blink-cli/template-admin",
            "dist-tags": {
                "latest": "1.2.0",
                "next": "2.0.0-rc.0"
            }
        });

        assert_eq!(get_latest_version(&packument), Some("1.2.0"));
        assert_eq!(get_latest_version(&serde_json::json!({})), None);
    }

    #[test]
    fn test_get_tarball_url() {
        let packument = serde_json::json!({
            "name": "demo-template",
            "versions": {
                "1.2.0": {
                    "dist": {
                        "tarball": "https://registry.npmjs.org/demo-template/-/demo-template-1.2.0.tgz"
                    }
                }
            }
        });

        assert_eq!(
            get_tarball_url(&packument, "1.2.0"),
            Some("https://registry.npmjs.org/demo-template/-/demo-template-1.2.0.tgz")
        );
        assert_eq!(get_tarball_url(&packument, "1.1.0"), None);
    }

    #[test]
    fn test_client_creation() {
        assert!(RegistryClient::new(DEFAULT_REGISTRY).is_ok());
    }

    #[test]
    fn test_client_invalid_url() {
        assert!(RegistryClient::new("not-a-url").is_err());
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = RegistryClient::new("https://registry.npmmirror.com/npm").unwrap();
        assert_eq!(client.base_url().as_str(), "https://registry.npmmirror.com/npm/");
        assert_eq!(
            client.base_url().join("demo").unwrap().as_str(),
            "https://registry.npmmirror.com/npm/demo"
        );
    }
}
