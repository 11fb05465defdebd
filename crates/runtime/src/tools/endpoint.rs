//! Tool provider endpoint validation.

use crate::{Error, Result};
use url::Url;

/// A validated MCP server address.
///
/// Only `http` and `https` URLs are accepted; the Streamable HTTP transport
/// cannot reach anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpEndpoint(Url);

impl McpEndpoint {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim())
            .map_err(|e| Error::Config(format!("MCP URL {raw:?} is not a valid URL: {e}")))?;

        match url.scheme() {
            "http" | "https" if url.host().is_some() => Ok(Self(url)),
            "http" | "https" => Err(Error::Config(format!("MCP URL {raw:?} has no host"))),
            scheme => Err(Error::Config(format!(
                "MCP URL must be an HTTP/HTTPS URL (got scheme {scheme:?} in {raw:?})"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for McpEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}
