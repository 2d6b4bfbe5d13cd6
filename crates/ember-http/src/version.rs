//! The `version` grammar rule: `HTTP/1.0` or `HTTP/1.1` only — anything
//! else (a bare `HTTP/2`, a typo, an absent version token) fails with
//! `HTTP_VERSION_NOT_SUPPORTED` rather than `BAD_REQUEST`, since the
//! request line otherwise parsed fine.

use crate::error::HttpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }

    pub fn parse(token: &str) -> Result<Self, HttpError> {
        match token {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            other => Err(HttpError::VersionNotSupported(other.to_string())),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_supported_versions() {
        assert_eq!(Version::parse("HTTP/1.0").unwrap(), Version::Http10);
        assert_eq!(Version::parse("HTTP/1.1").unwrap(), Version::Http11);
    }

    #[test]
    fn rejects_http2() {
        assert!(matches!(Version::parse("HTTP/2"), Err(HttpError::VersionNotSupported(_))));
    }
}
