use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::error::{Result, UpstreamError};

/// Characters escaped inside a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encodes `segment` so it stays one path segment.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Extract filename from URL path
pub fn filename_from_url(url: &str) -> Option<String> {
    Url::parse(url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut s| s.next_back())
            .filter(|s| !s.is_empty())
            .and_then(|s| {
                percent_decode_str(s)
                    .decode_utf8()
                    .ok()
                    .map(|cow| cow.into_owned())
            })
    })
}

/// Parses `url` and requires an `http`/`https` scheme and a host.
pub fn parse_http_url(url: &str) -> Result<Url> {
    let invalid = |reason: &str| {
        UpstreamError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    };

    if url.trim().is_empty() {
        return Err(invalid("URL is empty"));
    }
    let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if !parsed.host_str().is_some_and(|h| !h.is_empty()) {
        return Err(invalid("URL has no host"));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("hashicorp"), "hashicorp");
        assert_eq!(encode_segment("1.2.3-rc.1+build"), "1.2.3-rc.1+build");
        assert_eq!(encode_segment("a/b"), "a%2Fb");
        assert_eq!(encode_segment("a b?c"), "a%20b%3Fc");
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://example.com/path/terraform_1.5.0_linux_amd64.zip"),
            Some("terraform_1.5.0_linux_amd64.zip".to_string())
        );
        assert_eq!(
            filename_from_url("https://example.com/my%20file.zip"),
            Some("my file.zip".to_string())
        );
        assert_eq!(filename_from_url("https://example.com/"), None);
        assert_eq!(filename_from_url("not a url"), None);
    }

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("https://registry.terraform.io").is_ok());
        assert!(parse_http_url("http://localhost:8080/v1").is_ok());
        assert!(parse_http_url("").is_err());
        assert!(parse_http_url("   ").is_err());
        assert!(parse_http_url("ftp://example.com").is_err());
        assert!(parse_http_url("not-a-url").is_err());
        assert!(matches!(
            parse_http_url("file:///etc/passwd"),
            Err(UpstreamError::InvalidUrl { .. })
        ));
    }
}
