use std::net::IpAddr;

use axum::http::HeaderMap;
use ipnet::IpNet;

/// Resolve the client IP for rate limiting. X-Forwarded-For is honored only
/// when the direct peer is inside a trusted proxy range.
pub fn resolve(
    headers: &HeaderMap,
    peer_addr: Option<IpAddr>,
    trusted_proxies: &[IpNet],
) -> IpAddr {
    let peer = peer_addr.unwrap_or(IpAddr::from([127, 0, 0, 1]));

    if !trusted_proxies.is_empty() && trusted_proxies.iter().any(|net| net.contains(&peer)) {
        if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            // Take the first (leftmost) IP that isn't a trusted proxy
            for ip_str in xff.split(',').map(|s| s.trim()) {
                if let Ok(ip) = ip_str.parse::<IpAddr>() {
                    if !trusted_proxies.iter().any(|net| net.contains(&ip)) {
                        return ip;
                    }
                }
            }
        }
    }

    peer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_xff(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", value.parse().unwrap());
        headers
    }

    #[test]
    fn peer_wins_without_trusted_proxies() {
        let headers = headers_with_xff("198.51.100.9");
        let peer = "10.0.0.1".parse().unwrap();
        assert_eq!(resolve(&headers, Some(peer), &[]), peer);
    }

    #[test]
    fn forwarded_for_honored_behind_trusted_proxy() {
        let headers = headers_with_xff("198.51.100.9, 10.0.0.1");
        let proxies = vec!["10.0.0.0/8".parse().unwrap()];
        let peer = "10.0.0.1".parse().unwrap();
        let expected: IpAddr = "198.51.100.9".parse().unwrap();
        assert_eq!(resolve(&headers, Some(peer), &proxies), expected);
    }

    #[test]
    fn forwarded_for_ignored_from_untrusted_peer() {
        let headers = headers_with_xff("198.51.100.9");
        let proxies = vec!["10.0.0.0/8".parse().unwrap()];
        let peer: IpAddr = "203.0.113.4".parse().unwrap();
        assert_eq!(resolve(&headers, Some(peer), &proxies), peer);
    }

    #[test]
    fn missing_peer_falls_back_to_loopback() {
        let headers = HeaderMap::new();
        assert_eq!(
            resolve(&headers, None, &[]),
            IpAddr::from([127, 0, 0, 1])
        );
    }
}
