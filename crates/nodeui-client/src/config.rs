//! Node endpoint discovery.
//!
//! A node is reached either through an explicit URL and token, or through
//! its data directory, which holds `algod.net`, `algod.token` and
//! `algod.admin.token`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ClientError;

/// Base URL where the latest catchpoint label for each network is published.
pub const CATCHPOINT_BASE_URL: &str = "https://algorand-catchpoints.s3.us-east-2.amazonaws.com/channel";

/// Everything needed to talk to one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEndpoint {
    pub url: String,
    pub token: String,
    /// Required only for catchup toggles.
    pub admin_token: Option<String>,
    pub data_dir: Option<PathBuf>,
}

impl NodeEndpoint {
    /// Resolve from explicit settings or a data directory, never both.
    pub fn resolve(
        url: Option<&str>,
        token: Option<&str>,
        data_dir: Option<&Path>,
    ) -> Result<Self, ClientError> {
        match (url, token, data_dir) {
            (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => Err(ClientError::Config(
                "use either an algod URL and token or a data directory, not both".to_string(),
            )),
            (_, _, Some(dir)) => Self::from_data_dir(dir),
            (Some(url), token, None) => Ok(Self {
                url: normalize_url(url),
                token: token.unwrap_or_default().trim().to_string(),
                admin_token: None,
                data_dir: None,
            }),
            (None, _, None) => Err(ClientError::Config(
                "provide an algod URL and token, or a data directory".to_string(),
            )),
        }
    }

    /// Read endpoint and tokens from a node data directory.
    pub fn from_data_dir(dir: &Path) -> Result<Self, ClientError> {
        let net = read_trimmed(&dir.join("algod.net"))?;
        let token = read_trimmed(&dir.join("algod.token"))?;
        let admin_token = match read_trimmed(&dir.join("algod.admin.token")) {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::debug!("No admin token in {}: {}", dir.display(), e);
                None
            }
        };
        tracing::info!("Using node at {} from {}", net, dir.display());
        Ok(Self {
            url: normalize_url(&net),
            token,
            admin_token,
            data_dir: Some(dir.to_path_buf()),
        })
    }

    /// Admin token, or a configuration error naming what is missing.
    pub fn require_admin_token(&self) -> Result<&str, ClientError> {
        self.admin_token.as_deref().ok_or_else(|| {
            ClientError::Config("catchup needs algod.admin.token from a data directory".to_string())
        })
    }

    /// The node's own `config.json`, if the data directory has one.
    pub fn node_config(&self) -> Option<String> {
        let path = self.data_dir.as_ref()?.join("config.json");
        fs::read_to_string(path).ok()
    }
}

fn read_trimmed(path: &Path) -> Result<String, ClientError> {
    let content = fs::read_to_string(path).map_err(|e| {
        ClientError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(content.trim().to_string())
}

/// Prefix `http://` when no scheme is given and drop trailing slashes.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// Where the latest catchpoint for `network` is published.
pub fn catchpoint_url(network: &str) -> String {
    format!("{}/{}/latest.catchpoint", CATCHPOINT_BASE_URL, network)
}

/// Catchpoint labels contain `#`, which must be escaped in a path segment.
pub fn escape_catchpoint(label: &str) -> String {
    label.trim().replace('#', "%23")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_dir(admin: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("algod.net"), "127.0.0.1:8080\n").unwrap();
        fs::write(dir.path().join("algod.token"), "abc123\n").unwrap();
        if admin {
            fs::write(dir.path().join("algod.admin.token"), "admin456").unwrap();
        }
        dir
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("localhost:4001"), "http://localhost:4001");
        assert_eq!(normalize_url("https://node.example/"), "https://node.example");
    }

    #[test]
    fn test_from_data_dir() {
        let dir = data_dir(true);
        let endpoint = NodeEndpoint::from_data_dir(dir.path()).unwrap();
        assert_eq!(endpoint.url, "http://127.0.0.1:8080");
        assert_eq!(endpoint.token, "abc123");
        assert_eq!(endpoint.require_admin_token().unwrap(), "admin456");
        assert!(endpoint.node_config().is_none());

        fs::write(dir.path().join("config.json"), "{\"Archival\": true}").unwrap();
        assert_eq!(
            endpoint.node_config().as_deref(),
            Some("{\"Archival\": true}")
        );
    }

    #[test]
    fn test_missing_admin_token_only_blocks_catchup() {
        let dir = data_dir(false);
        let endpoint = NodeEndpoint::from_data_dir(dir.path()).unwrap();
        assert!(endpoint.admin_token.is_none());
        assert!(matches!(
            endpoint.require_admin_token(),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn test_missing_net_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(NodeEndpoint::from_data_dir(dir.path()).is_err());
    }

    #[test]
    fn test_resolve_rejects_mixed_sources() {
        let dir = data_dir(true);
        assert!(NodeEndpoint::resolve(Some("localhost:8080"), None, Some(dir.path())).is_err());
        assert!(NodeEndpoint::resolve(None, Some("t"), Some(dir.path())).is_err());
        assert!(NodeEndpoint::resolve(None, None, None).is_err());
    }

    #[test]
    fn test_resolve_explicit() {
        let endpoint = NodeEndpoint::resolve(Some("localhost:8080"), Some(" tok "), None).unwrap();
        assert_eq!(endpoint.url, "http://localhost:8080");
        assert_eq!(endpoint.token, "tok");
        assert!(endpoint.admin_token.is_none());
    }

    #[test]
    fn test_catchpoint_helpers() {
        assert_eq!(
            catchpoint_url("testnet"),
            "https://algorand-catchpoints.s3.us-east-2.amazonaws.com/channel/testnet/latest.catchpoint"
        );
        assert_eq!(escape_catchpoint("2000#ABC\n"), "2000%23ABC");
    }
}
