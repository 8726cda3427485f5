use std::future::Future;
use std::pin::Pin;

use vigil_core::config::FleetConfig;
use vigil_core::error::{Result, VigilError};
use vigil_core::fleet::{FleetDirectory, RegionStats};

/// Fleet directory backed by the database control plane REST API.
pub struct HttpFleetDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFleetDirectory {
    /// Create a directory for the given control plane base URL.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a directory from configuration with its own client.
    pub fn from_config(config: &FleetConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| VigilError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::new(client, &config.control_plane_url))
    }

    fn regions_url(&self) -> String {
        format!("{}/regions", self.base_url)
    }
}

impl FleetDirectory for HttpFleetDirectory {
    fn region_stats(&self) -> Pin<Box<dyn Future<Output = Result<Vec<RegionStats>>> + Send + '_>> {
        Box::pin(async move {
            let url = self.regions_url();
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| VigilError::Directory(format!("GET {} failed: {}", url, e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(VigilError::Directory(format!(
                    "GET {} returned {}",
                    url, status
                )));
            }

            let regions: Vec<RegionStats> = response
                .json()
                .await
                .map_err(|e| VigilError::Directory(format!("Invalid region stats: {}", e)))?;

            tracing::debug!(regions = regions.len(), "Fetched region stats");
            Ok(regions)
        })
    }
}
