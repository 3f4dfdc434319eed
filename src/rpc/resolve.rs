//! Choosing which configured Aria2 server receives a download

use crate::app::config::RpcServerConfig;
use crate::util::pattern::matches_any;

/// Index of the server a URL should be sent to
///
/// Servers from index 1 onward are checked in order. A server whose pattern
/// is exactly `*` is remembered as the fallback; any other pattern list is
/// tested against `url` and the first match wins. Without a match the
/// remembered fallback is used, or index 0 when none was marked.
pub fn resolve_server_index(servers: &[RpcServerConfig], url: &str) -> usize {
    let mut fallback = 0;
    let mut fallback_marked = false;

    for (index, server) in servers.iter().enumerate().skip(1) {
        let pattern = server.pattern.trim();
        if pattern == "*" {
            if !fallback_marked {
                fallback = index;
                fallback_marked = true;
            }
            continue;
        }
        if !pattern.is_empty() && matches_any(url, pattern) {
            tracing::debug!("URL {} routed to RPC server '{}'", url, server.name);
            return index;
        }
    }

    fallback
}

/// Server a URL should be sent to, `None` only when nothing is configured
pub fn resolve_server<'a>(servers: &'a [RpcServerConfig], url: &str) -> Option<&'a RpcServerConfig> {
    if servers.is_empty() {
        return None;
    }
    servers.get(resolve_server_index(servers, url))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(name: &str, pattern: &str) -> RpcServerConfig {
        let mut s = RpcServerConfig::new(name, format!("http://{}.lan:6800/jsonrpc", name));
        s.pattern = pattern.to_string();
        s
    }

    #[test]
    fn test_no_patterns_uses_first_server() {
        let servers = vec![server("local", ""), server("nas", "")];
        assert_eq!(resolve_server_index(&servers, "http://example.com/file.iso"), 0);
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let servers = vec![
            server("local", ""),
            server("video", "*.mkv,*.mp4"),
            server("iso", "*.iso"),
            server("also-iso", "*.iso"),
        ];
        assert_eq!(resolve_server_index(&servers, "http://h/a.mp4"), 1);
        assert_eq!(resolve_server_index(&servers, "http://h/a.iso"), 2);
        assert_eq!(resolve_server_index(&servers, "http://h/a.zip"), 0);
    }

    #[test]
    fn test_wildcard_server_is_fallback_not_match() {
        let servers = vec![server("local", ""), server("catch-all", "*"), server("iso", "*.iso")];
        // The later specific pattern still wins over the earlier wildcard
        assert_eq!(resolve_server_index(&servers, "http://h/a.iso"), 2);
        assert_eq!(resolve_server_index(&servers, "http://h/a.zip"), 1);
    }

    #[test]
    fn test_index_zero_pattern_is_ignored() {
        let servers = vec![server("local", "*.zip"), server("nas", "*.iso")];
        assert_eq!(resolve_server_index(&servers, "http://h/a.zip"), 0);
        assert_eq!(resolve_server_index(&servers, "http://h/a.iso"), 1);
    }

    #[test]
    fn test_resolve_server_empty() {
        assert!(resolve_server(&[], "http://h/a").is_none());
    }
}
