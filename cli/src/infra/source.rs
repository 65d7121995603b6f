//! Release source - implements `SourceProvider` over HTTP or a local directory.
//!
//! Both kinds share one layout:
//!
//! ```text
//! {location}/LATEST                       latest version, one line
//! {location}/{version}/{asset}            gzip tarball of the bundle tree
//! {location}/{version}/{asset}.sha256     "<hex digest>  <file name>"
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::application::ports::{FetchedBundle, SourceProvider};
use crate::domain::config::SourceConfig;
use crate::domain::{ConfigError, DeployError, VersionSelector};

/// Upper bound on a downloaded bundle.
const MAX_BUNDLE_BYTES: u64 = 512 * 1024 * 1024;

const LATEST_FILE: &str = "LATEST";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Http(String),
    Local(PathBuf),
}

/// Fetches agent release bundles.
#[derive(Debug, Clone)]
pub struct ReleaseProvider {
    location: Location,
    asset: String,
}

impl ReleaseProvider {
    /// Build a provider from the `source` section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown kind or an unsupported platform
    /// when no asset name is configured.
    pub fn from_config(source: &SourceConfig) -> Result<Self, ConfigError> {
        let asset = match &source.asset {
            Some(asset) => asset.clone(),
            None => get_asset_name()?,
        };
        match source.kind.as_str() {
            "http" => Ok(Self::http(&source.location, asset)),
            "local" => Ok(Self::local(PathBuf::from(&source.location), asset)),
            other => Err(ConfigError::InvalidValue {
                key: "source.kind",
                value: other.to_string(),
                valid: crate::domain::config::VALID_SOURCE_KINDS.join(", "),
            }),
        }
    }

    #[must_use]
    pub fn http(base_url: &str, asset: String) -> Self {
        Self {
            location: Location::Http(base_url.trim_end_matches('/').to_string()),
            asset,
        }
    }

    #[must_use]
    pub fn local(dir: PathBuf, asset: String) -> Self {
        Self {
            location: Location::Local(dir),
            asset,
        }
    }

    async fn read_text(&self, relative: String) -> Result<String, DeployError> {
        let location = self.location.clone();
        tokio::task::spawn_blocking(move || match location {
            Location::Http(base) => http_get_text(&format!("{base}/{relative}")),
            Location::Local(dir) => {
                let path = dir.join(&relative);
                std::fs::read_to_string(&path)
                    .with_context(|| format!("cannot read {}", path.display()))
            }
        })
        .await
        .context("source read task panicked")
        .and_then(|r| r)
        .map_err(DeployError::Fetch)
    }

    async fn download(&self, relative: String, dest: &Path) -> Result<u64, DeployError> {
        let location = self.location.clone();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || match location {
            Location::Http(base) => http_download(&format!("{base}/{relative}"), &dest),
            Location::Local(dir) => {
                let path = dir.join(&relative);
                std::fs::copy(&path, &dest)
                    .with_context(|| format!("cannot copy {}", path.display()))
            }
        })
        .await
        .context("source download task panicked")
        .and_then(|r| r)
        .map_err(DeployError::Fetch)
    }
}

impl SourceProvider for ReleaseProvider {
    async fn resolve_version(&self, selector: &VersionSelector) -> Result<String, DeployError> {
        match selector {
            VersionSelector::Exact(version) => Ok(version.clone()),
            VersionSelector::Latest => {
                let text = self.read_text(LATEST_FILE.to_string()).await?;
                let version = text.trim();
                if version.is_empty() {
                    return Err(DeployError::Fetch(anyhow::anyhow!(
                        "{LATEST_FILE} is empty"
                    )));
                }
                Ok(version.to_string())
            }
        }
    }

    async fn fetch(&self, version: &str, dest: &Path) -> Result<FetchedBundle, DeployError> {
        let asset_path = format!("{version}/{}", self.asset);
        let checksum_text = self.read_text(format!("{asset_path}.sha256")).await?;
        let expected_checksum = parse_checksum(&checksum_text).map_err(DeployError::Fetch)?;
        let bytes = self.download(asset_path, dest).await?;
        debug!(%version, bytes, "bundle downloaded");
        Ok(FetchedBundle {
            version: version.to_string(),
            expected_checksum,
        })
    }
}

fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(30))
        .timeout_read(Duration::from_secs(60))
        .build()
}

fn http_get_text(url: &str) -> Result<String> {
    agent()
        .get(url)
        .call()
        .with_context(|| format!("GET {url}"))?
        .into_string()
        .with_context(|| format!("reading {url}"))
}

fn http_download(url: &str, dest: &Path) -> Result<u64> {
    let response = agent().get(url).call().with_context(|| format!("GET {url}"))?;
    let mut file = std::fs::File::create(dest)
        .with_context(|| format!("cannot create {}", dest.display()))?;
    let written = std::io::copy(
        &mut response.into_reader().take(MAX_BUNDLE_BYTES + 1),
        &mut file,
    )
    .with_context(|| format!("downloading {url}"))?;
    anyhow::ensure!(
        written <= MAX_BUNDLE_BYTES,
        "bundle exceeds {} MiB",
        MAX_BUNDLE_BYTES / (1024 * 1024)
    );
    file.sync_all().context("flushing bundle")?;
    Ok(written)
}

/// First whitespace-separated token of a `.sha256` file, validated as hex.
pub(crate) fn parse_checksum(content: &str) -> Result<String> {
    let digest = content
        .split_whitespace()
        .next()
        .ok_or_else(|| anyhow::anyhow!("invalid checksum file format"))?;
    anyhow::ensure!(
        digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit()),
        "invalid checksum file format: expected a SHA-256 hex digest"
    );
    Ok(digest.to_ascii_lowercase())
}

/// Bundle file name for the host platform.
pub(crate) fn get_asset_name() -> Result<String, ConfigError> {
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    let name = match (os, arch) {
        ("linux", "x86_64") => "tynkerbase-agent-linux-amd64.tar.gz",
        ("linux", "aarch64") => "tynkerbase-agent-linux-arm64.tar.gz",
        ("macos", "x86_64") => "tynkerbase-agent-darwin-amd64.tar.gz",
        ("macos", "aarch64") => "tynkerbase-agent-darwin-arm64.tar.gz",
        _ => {
            return Err(ConfigError::InvalidValue {
                key: "source.asset",
                value: format!("<unset> on {os}-{arch}"),
                valid: "an explicit bundle file name for this platform".to_string(),
            });
        }
    };
    Ok(name.to_string())
}
