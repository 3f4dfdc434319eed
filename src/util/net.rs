//! URL helpers shared by the RPC client, capture rules and monitor

use std::net::IpAddr;
use url::Url;

/// Extract the lowercase hostname of a URL, if it has one
pub fn hostname(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_matches(['[', ']']).to_lowercase()))
}

/// True when the URL points at the local machine
pub fn is_loopback_url(url: &str) -> bool {
    let Some(host) = hostname(url) else {
        return false;
    };
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }
    host.parse::<IpAddr>()
        .map(|ip| ip.is_loopback() || ip.is_unspecified())
        .unwrap_or(false)
}

/// Rewrite http(s) to the socket scheme; ws(s) URLs pass through
pub fn to_socket_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}

/// Rewrite ws(s) to the request/response scheme; http(s) URLs pass through
pub fn to_http_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        url.to_string()
    }
}

/// True for schemes that carry secrets in clear text
pub fn is_plaintext_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("ws://")
}

/// Last path segment of a URL, percent-decoded, without query or fragment
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    // Invalid UTF-8 after decoding is replaced, not rejected
    let decoded = String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes())).into_owned();
    if decoded.is_empty() { None } else { Some(decoded) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname() {
        assert_eq!(hostname("https://Example.COM/a"), Some("example.com".to_string()));
        assert_eq!(hostname("http://[::1]:6800/jsonrpc"), Some("::1".to_string()));
        assert_eq!(hostname("not a url"), None);
    }

    #[test]
    fn test_is_loopback_url() {
        assert!(is_loopback_url("http://localhost:6800/jsonrpc"));
        assert!(is_loopback_url("ws://127.0.0.1:6800/jsonrpc"));
        assert!(is_loopback_url("http://127.8.9.10:6800/jsonrpc"));
        assert!(is_loopback_url("http://[::1]:6800/jsonrpc"));
        assert!(!is_loopback_url("http://192.168.1.2:6800/jsonrpc"));
        assert!(!is_loopback_url("https://aria2.example.com/jsonrpc"));
    }

    #[test]
    fn test_scheme_rewrites() {
        assert_eq!(to_socket_url("http://h:1/jsonrpc"), "ws://h:1/jsonrpc");
        assert_eq!(to_socket_url("https://h/jsonrpc"), "wss://h/jsonrpc");
        assert_eq!(to_socket_url("ws://h/jsonrpc"), "ws://h/jsonrpc");
        assert_eq!(to_http_url("ws://h:1/jsonrpc"), "http://h:1/jsonrpc");
        assert_eq!(to_http_url("wss://h/jsonrpc"), "https://h/jsonrpc");
        assert_eq!(to_http_url("http://h/jsonrpc"), "http://h/jsonrpc");
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("http://example.com/dir/file.iso?x=1#y"),
            Some("file.iso".to_string())
        );
        assert_eq!(
            filename_from_url("http://example.com/My%20File.zip"),
            Some("My File.zip".to_string())
        );
        assert_eq!(filename_from_url("http://example.com/"), None);
    }

    #[test]
    fn test_filename_from_url_decodes_utf8() {
        assert_eq!(
            filename_from_url("http://example.com/%E6%97%A5%E6%9C%AC.txt"),
            Some("日本.txt".to_string())
        );
        assert_eq!(
            filename_from_url("http://example.com/bad%FF.bin"),
            Some("bad\u{FFFD}.bin".to_string())
        );
        assert_eq!(
            filename_from_url("http://example.com/100%25"),
            Some("100%".to_string())
        );
    }
}
