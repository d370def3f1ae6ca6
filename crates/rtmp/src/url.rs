//! RTMP URL parsing and validation.

use std::fmt;

/// The URL schemes an RTMP connection can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtmpScheme {
    /// Plain TCP, default port 1935.
    Rtmp,
    /// TLS over TCP, default port 443.
    Rtmps,
    /// HTTP tunneling, default port 80.
    Rtmpt,
    /// HTTP tunneling over TLS, default port 443.
    Rtmpts,
}

impl RtmpScheme {
    /// The scheme string as it appears in a URL.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rtmp => "rtmp",
            Self::Rtmps => "rtmps",
            Self::Rtmpt => "rtmpt",
            Self::Rtmpts => "rtmpts",
        }
    }

    /// The default port for this scheme.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Rtmp => 1935,
            Self::Rtmps | Self::Rtmpts => 443,
            Self::Rtmpt => 80,
        }
    }
}

/// URL validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    /// The scheme is not one of rtmp, rtmps, rtmpt, rtmpts.
    #[error("invalid scheme in {0}")]
    InvalidScheme(String),
    /// The host part is empty.
    #[error("empty host in {0}")]
    EmptyHost(String),
    /// The port is not numeric.
    #[error("invalid port in {0}")]
    InvalidPort(String),
    /// There is no app path segment or no stream key.
    #[error("missing app or stream key in {0}")]
    MissingPath(String),
    /// The URL ends with a slash.
    #[error("trailing slash in {0}")]
    TrailingSlash(String),
}

/// A validated RTMP URL:
/// `rtmp[t|s|ts]://host[:port]/app[/app2...]/streamKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpUrl {
    /// The scheme.
    pub scheme: RtmpScheme,
    /// The host name or address.
    pub host: String,
    /// The port, explicit or the scheme default.
    pub port: u16,
    /// The application path: one or more segments joined by `/`.
    pub app: String,
    /// The stream key, the last path segment.
    pub stream_key: String,
}

impl RtmpUrl {
    /// Parses and validates an RTMP URL.
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        let (scheme, rest) = url.split_once("://").ok_or_else(|| UrlError::InvalidScheme(url.to_string()))?;

        let scheme = match scheme {
            "rtmp" => RtmpScheme::Rtmp,
            "rtmps" => RtmpScheme::Rtmps,
            "rtmpt" => RtmpScheme::Rtmpt,
            "rtmpts" => RtmpScheme::Rtmpts,
            _ => return Err(UrlError::InvalidScheme(url.to_string())),
        };

        if rest.ends_with('/') {
            return Err(UrlError::TrailingSlash(url.to_string()));
        }

        let (authority, path) = rest.split_once('/').ok_or_else(|| UrlError::MissingPath(url.to_string()))?;

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| UrlError::InvalidPort(url.to_string()))?;
                (host, port)
            }
            None => (authority, scheme.default_port()),
        };

        if host.is_empty() {
            return Err(UrlError::EmptyHost(url.to_string()));
        }

        // At least one app segment plus the stream key.
        let (app, stream_key) = path.rsplit_once('/').ok_or_else(|| UrlError::MissingPath(url.to_string()))?;

        if app.is_empty() || stream_key.is_empty() || app.split('/').any(str::is_empty) {
            return Err(UrlError::MissingPath(url.to_string()));
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            app: app.to_string(),
            stream_key: stream_key.to_string(),
        })
    }

    /// The `tcUrl` sent in the connect command: scheme, authority and app
    /// without the stream key.
    pub fn tc_url(&self) -> String {
        if self.port == self.scheme.default_port() {
            format!("{}://{}/{}", self.scheme.as_str(), self.host, self.app)
        } else {
            format!("{}://{}:{}/{}", self.scheme.as_str(), self.host, self.port, self.app)
        }
    }
}

impl fmt::Display for RtmpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tc_url(), self.stream_key)
    }
}
