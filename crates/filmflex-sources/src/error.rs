use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("malformed payload for '{slug}': {reason}")]
    Malformed { slug: String, reason: String },
}

impl SourceError {
    pub fn transport(url: &str, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("timed out ({})", err)
        } else {
            err.to_string()
        };
        SourceError::Transport { url: url.to_string(), message }
    }

    pub fn malformed(slug: &str, reason: impl Into<String>) -> Self {
        SourceError::Malformed { slug: slug.to_string(), reason: reason.into() }
    }

    /// Worth another attempt: network trouble, throttling, or a server-side failure
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Transport { .. } => true,
            SourceError::Status { status, .. } => *status >= 500 || *status == 429,
            SourceError::Decode { .. } | SourceError::Malformed { .. } => false,
        }
    }

    /// Short label used to group failures in summaries
    pub fn category(&self) -> &'static str {
        match self {
            SourceError::Transport { .. } => "transport",
            SourceError::Status { .. } => "http_status",
            SourceError::Decode { .. } => "decode",
            SourceError::Malformed { .. } => "malformed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let status = |status| SourceError::Status { url: "u".into(), status, body: String::new() };
        assert!(status(502).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(SourceError::Transport { url: "u".into(), message: "reset".into() }.is_transient());
        assert!(!SourceError::malformed("x", "missing movie").is_transient());
        assert_eq!(SourceError::malformed("x", "missing movie").category(), "malformed");
    }
}
