//! GitHub release metadata.
//!
//! The publish time of the upstream release becomes the timestamp of the
//! synthesized recipe revision.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Public GitHub REST API.
pub const GITHUB_API: &str = "https://api.github.com";

/// A GitHub release.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Git tag the release points at.
    pub tag_name: String,
    /// Publish time; absent for drafts.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Uploaded assets.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A file attached to a release.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    /// File name.
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// Release lookup failures.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Transport error or undecodable body.
    #[error("release request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No release with that tag.
    #[error("no release {tag} for {path}")]
    NotFound {
        /// Repository path.
        path: String,
        /// Requested tag.
        tag: String,
    },

    /// Any other non-success status.
    #[error("release API returned {0}")]
    Status(StatusCode),
}

/// API URL of release `tag` of `path`; an empty tag or `latest` selects the
/// latest release.
pub fn release_url(api: &str, path: &str, tag: &str) -> String {
    let api = api.trim_end_matches('/');
    if tag.is_empty() || tag == "latest" {
        format!("{api}/repos/{path}/releases/latest")
    } else {
        format!("{api}/repos/{path}/releases/tags/{tag}")
    }
}

/// Fetch one release.
///
/// Sends `GITHUB_TOKEN` as a bearer token when set.
///
/// # Errors
///
/// Returns [`ReleaseError::NotFound`] on 404, [`ReleaseError::Status`] on
/// any other failure status, and [`ReleaseError::Http`] on transport or
/// decoding errors.
pub async fn fetch(
    client: &reqwest::Client,
    api: &str,
    path: &str,
    tag: &str,
) -> Result<Release, ReleaseError> {
    let url = release_url(api, path, tag);
    debug!(%url, "fetching release metadata");

    let mut request = client
        .get(&url)
        .header("User-Agent", crate::USER_AGENT)
        .header("Accept", "application/vnd.github+json");
    let token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
    if !token.is_empty() {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    match response.status() {
        s if s.is_success() => Ok(response.json().await?),
        StatusCode::NOT_FOUND => Err(ReleaseError::NotFound {
            path: path.to_string(),
            tag: tag.to_string(),
        }),
        s => Err(ReleaseError::Status(s)),
    }
}

/// Fetch the release of `version`, trying tag `v<version>` then `<version>`.
///
/// # Errors
///
/// Returns the error of the last attempt.
pub async fn fetch_for_version(
    client: &reqwest::Client,
    api: &str,
    path: &str,
    version: &str,
) -> Result<Release, ReleaseError> {
    match fetch(client, api, path, &format!("v{version}")).await {
        Err(ReleaseError::NotFound { .. }) => fetch(client, api, path, version).await,
        other => other,
    }
}

/// Version of the latest release, with any leading `v` stripped.
///
/// # Errors
///
/// Propagates lookup errors.
pub async fn latest_version(
    client: &reqwest::Client,
    api: &str,
    path: &str,
) -> Result<String, ReleaseError> {
    let release = fetch(client, api, path, "latest").await?;
    Ok(release
        .tag_name
        .strip_prefix('v')
        .unwrap_or(&release.tag_name)
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const RELEASE: &str = r#"{
        "tag_name": "v1.2.0",
        "name": "Widget 1.2.0",
        "published_at": "2024-03-01T12:00:00Z",
        "prerelease": false,
        "assets": [
            {
                "name": "widget-1.2.0.tar.gz",
                "browser_download_url": "https://github.com/acme/widget/releases/download/v1.2.0/widget-1.2.0.tar.gz",
                "size": 1024
            }
        ]
    }"#;

    #[test]
    fn test_release_url() {
        assert_eq!(
            release_url("https://api.github.com/", "acme/widget", ""),
            "https://api.github.com/repos/acme/widget/releases/latest"
        );
        assert_eq!(
            release_url("https://api.github.com", "acme/widget", "latest"),
            "https://api.github.com/repos/acme/widget/releases/latest"
        );
        assert_eq!(
            release_url("https://api.github.com", "acme/widget", "v1.2.0"),
            "https://api.github.com/repos/acme/widget/releases/tags/v1.2.0"
        );
    }

    #[tokio::test]
    async fn test_fetch_tagged_release() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/repos/acme/widget/releases/tags/v1.2.0")
            .match_header("user-agent", crate::USER_AGENT)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(RELEASE)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let release = fetch(&client, &server.url(), "acme/widget", "v1.2.0")
            .await
            .unwrap();

        assert_eq!(release.tag_name, "v1.2.0");
        assert_eq!(
            release.published_at.unwrap().to_rfc3339(),
            "2024-03-01T12:00:00+00:00"
        );
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].size, 1024);
    }

    #[tokio::test]
    async fn test_fetch_for_version_falls_back_to_bare_tag() {
        let mut server = Server::new_async().await;
        let _v = server
            .mock("GET", "/repos/acme/widget/releases/tags/v1.2.0")
            .with_status(404)
            .create_async()
            .await;
        let _bare = server
            .mock("GET", "/repos/acme/widget/releases/tags/1.2.0")
            .with_status(200)
            .with_body(RELEASE.replace("v1.2.0", "1.2.0"))
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let release = fetch_for_version(&client, &server.url(), "acme/widget", "1.2.0")
            .await
            .unwrap();
        assert_eq!(release.tag_name, "1.2.0");
    }

    #[tokio::test]
    async fn test_missing_release() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let err = fetch_for_version(&client, &server.url(), "acme/widget", "9.9.9")
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::NotFound { ref tag, .. } if tag == "9.9.9"));
    }

    #[tokio::test]
    async fn test_server_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/repos/acme/widget/releases/latest")
            .with_status(503)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let err = latest_version(&client, &server.url(), "acme/widget")
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Status(s) if s.as_u16() == 503));
    }

    #[tokio::test]
    async fn test_latest_version_strips_prefix() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/repos/acme/widget/releases/latest")
            .with_status(200)
            .with_body(RELEASE)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let version = latest_version(&client, &server.url(), "acme/widget")
            .await
            .unwrap();
        assert_eq!(version, "1.2.0");
    }
}
