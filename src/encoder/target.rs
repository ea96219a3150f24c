//! RTMP destination with a masked stream key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Secret stream key. `Debug` and `Display` only show the last 4 characters.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamKey(String);

impl StreamKey {
    /// Wraps a raw key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key. Only the encoder argument builder and the store should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Key with everything but the last 4 characters replaced by `*`.
    pub fn masked(&self) -> String {
        mask(&self.0)
    }
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamKey({})", self.masked())
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Push destination: ingest base URL plus stream key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtmpTarget {
    /// Ingest URL, e.g. `rtmp://a.rtmp.youtube.com/live2`.
    pub url: String,
    /// Secret key appended to the URL.
    pub key: StreamKey,
}

impl RtmpTarget {
    /// Builds a target from a base URL and a raw key.
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: StreamKey::new(key),
        }
    }

    /// Full publish URL including the secret key.
    pub fn publish_url(&self) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), self.key.expose())
    }
}

impl fmt::Display for RtmpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.url.trim_end_matches('/'), self.key.masked())
    }
}

/// Replaces all but the last 4 characters of `secret` with `*`.
pub fn mask(secret: &str) -> String {
    let n = secret.chars().count();
    if n <= 4 {
        return "*".repeat(n);
    }
    let tail: String = secret.chars().skip(n - 4).collect();
    format!("{}{}", "*".repeat(n - 4), tail)
}
