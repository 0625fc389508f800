//! Asset download into a workflow workspace.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, Url};
use tracing::debug;

use crate::error::FetchError;

/// Downloads entry scripts and components. `http(s)://` goes through a
/// shared client with a timeout; `file://` is a local copy.
#[derive(Clone)]
pub struct AssetFetcher {
    client: Client,
}

impl AssetFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Fetch `url` into `dir`, named after the last path segment.
    /// Returns the path written.
    pub async fn fetch_into(&self, url: &str, dir: &Path) -> Result<PathBuf, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::BadUrl(url.to_string()))?;
        let file_name = asset_name(&parsed).ok_or_else(|| FetchError::BadUrl(url.to_string()))?;
        let target = dir.join(file_name);

        let io = |source| FetchError::Io {
            url: url.to_string(),
            source,
        };

        match parsed.scheme() {
            "file" => {
                let source = parsed
                    .to_file_path()
                    .map_err(|_| FetchError::BadUrl(url.to_string()))?;
                tokio::fs::copy(&source, &target).await.map_err(io)?;
            }
            "http" | "https" => {
                let transient = |source| FetchError::Transient {
                    url: url.to_string(),
                    source,
                };
                let resp = self.client.get(parsed.clone()).send().await.map_err(transient)?;
                let status = resp.status();
                if status.is_server_error() {
                    return Err(FetchError::Unavailable {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                if !status.is_success() {
                    return Err(FetchError::Rejected {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                let body = resp.bytes().await.map_err(transient)?;
                tokio::fs::write(&target, &body).await.map_err(io)?;
            }
            _ => return Err(FetchError::BadUrl(url.to_string())),
        }

        debug!(%url, path = %target.display(), "asset fetched");
        Ok(target)
    }
}

/// Last non-empty path segment of a URL.
pub fn asset_name(url: &Url) -> Option<String> {
    url.path_segments()?
        .rfind(|segment| !segment.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_name_is_last_segment() {
        let url = Url::parse("http://assets/stacks/k8s/deploy.py?rev=2").unwrap();
        assert_eq!(asset_name(&url).as_deref(), Some("deploy.py"));
        let url = Url::parse("http://assets/").unwrap();
        assert_eq!(asset_name(&url), None);
    }

    #[tokio::test]
    async fn copies_file_urls() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let asset = src.path().join("deploy.sh");
        std::fs::write(&asset, "echo deploy\n").unwrap();

        let fetcher = AssetFetcher::new(Duration::from_secs(5)).unwrap();
        let url = Url::from_file_path(&asset).unwrap();
        let written = fetcher.fetch_into(url.as_str(), dst.path()).await.unwrap();

        assert_eq!(written, dst.path().join("deploy.sh"));
        assert_eq!(std::fs::read_to_string(written).unwrap(), "echo deploy\n");
    }

    #[tokio::test]
    async fn rejects_unknown_schemes_and_missing_files() {
        let dst = tempfile::tempdir().unwrap();
        let fetcher = AssetFetcher::new(Duration::from_secs(5)).unwrap();

        let err = fetcher.fetch_into("ftp://host/a.py", dst.path()).await.unwrap_err();
        assert!(matches!(err, FetchError::BadUrl(_)));

        let err = fetcher
            .fetch_into("file:///nonexistent/edgeplane/a.py", dst.path())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
        assert!(!err.is_transient());
    }
}
