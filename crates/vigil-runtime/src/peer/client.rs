use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Url;

use vigil_core::config::PeerConfig;
use vigil_core::error::{PeerError, Result, VigilError};
use vigil_core::fleet::{DbConnInfo, PeerClient};

/// Peer client over reqwest with bounded connect and request timeouts.
#[derive(Clone)]
pub struct ReqwestPeerClient {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl ReqwestPeerClient {
    /// Build a client from peer configuration.
    pub fn from_config(config: &PeerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| VigilError::Http(format!("Failed to build peer client: {}", e)))?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout(),
        })
    }
}

impl PeerClient for ReqwestPeerClient {
    fn put_conn_info<'a>(
        &'a self,
        peer_url: &'a Url,
        info: &'a DbConnInfo,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<(), PeerError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .put(peer_url.clone())
                .json(info)
                .send()
                .await
                .map_err(|e| PeerError::from_reqwest(&e, self.request_timeout))?;

            response
                .error_for_status()
                .map_err(|e| PeerError::from_reqwest(&e, self.request_timeout))?;

            Ok(())
        })
    }
}
