use reqwest::Url;

use vigil_core::config::PeerConfig;
use vigil_core::error::PeerError;
use vigil_core::fleet::PeerUri;

/// Build the sync endpoint URL for a candidate peer.
///
/// Scheme and host come from the peer URI. The port is `default_port`
/// unless `keep_peer_port` is set and the URI names one. Any path, query or
/// fragment on the URI is replaced by the sync path.
pub fn build_peer_url(uri: &PeerUri, config: &PeerConfig) -> Result<Url, PeerError> {
    let raw = uri.as_str().trim();
    let invalid = || PeerError::InvalidUri(uri.to_string());

    let mut url = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("http://{}", raw))
    }
    .map_err(|_| invalid())?;

    if url.host_str().is_none() {
        return Err(invalid());
    }

    let port = match url.port() {
        Some(port) if config.keep_peer_port => port,
        _ => config.default_port,
    };
    url.set_port(Some(port)).map_err(|_| invalid())?;
    url.set_path(&config.sync_path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PeerConfig {
        PeerConfig {
            default_port: 8080,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_port_replaces_peer_port() {
        let url = build_peer_url(&PeerUri::from("http://eu-1.example:9999"), &config()).unwrap();
        assert_eq!(
            url.as_str(),
            "http://eu-1.example:8080/storefront/api/app-instances/sync"
        );
    }

    #[test]
    fn test_keep_peer_port() {
        let mut config = config();
        config.keep_peer_port = true;

        let url = build_peer_url(&PeerUri::from("https://eu-1.example:9443"), &config).unwrap();
        assert_eq!(
            url.as_str(),
            "https://eu-1.example:9443/storefront/api/app-instances/sync"
        );

        // No explicit port falls back to the configured one.
        let url = build_peer_url(&PeerUri::from("https://eu-2.example"), &config).unwrap();
        assert_eq!(url.port(), Some(8080));
    }

    #[test]
    fn test_bare_host_gets_http_scheme() {
        let url = build_peer_url(&PeerUri::from("10.0.3.17"), &config()).unwrap();
        assert_eq!(
            url.as_str(),
            "http://10.0.3.17:8080/storefront/api/app-instances/sync"
        );
    }

    #[test]
    fn test_existing_path_is_replaced() {
        let url =
            build_peer_url(&PeerUri::from("http://ap-1.example/console?x=1#top"), &config())
                .unwrap();
        assert_eq!(url.path(), "/storefront/api/app-instances/sync");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_invalid_uri() {
        let err = build_peer_url(&PeerUri::from("http://"), &config()).unwrap_err();
        assert_eq!(err, PeerError::InvalidUri("http://".to_string()));
    }
}
