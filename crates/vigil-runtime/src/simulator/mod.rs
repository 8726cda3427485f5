use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;

use vigil_core::error::{Result, VigilError};
use vigil_core::fleet::SimulatorGateway;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkerStats {
    active_worker_limit: u32,
}

/// Simulator reached over its admin HTTP API.
pub struct HttpSimulatorGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSimulatorGateway {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a gateway with its own client.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VigilError::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::new(client, base_url))
    }
}

impl SimulatorGateway for HttpSimulatorGateway {
    fn active_worker_limit(&self) -> Pin<Box<dyn Future<Output = Result<u32>> + Send + '_>> {
        Box::pin(async move {
            let url = format!("{}/workers", self.base_url);
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| VigilError::Simulator(format!("GET {} failed: {}", url, e)))?;

            let stats: WorkerStats = response
                .json()
                .await
                .map_err(|e| VigilError::Simulator(format!("Invalid worker stats: {}", e)))?;

            Ok(stats.active_worker_limit)
        })
    }

    fn stop_all(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let url = format!("{}/stop", self.base_url);
            self.client
                .post(&url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| VigilError::Simulator(format!("POST {} failed: {}", url, e)))?;

            Ok(())
        })
    }
}

/// Stand-in when no simulator is configured: never has workers to stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSimulator;

impl SimulatorGateway for DisabledSimulator {
    fn active_worker_limit(&self) -> Pin<Box<dyn Future<Output = Result<u32>> + Send + '_>> {
        Box::pin(async { Ok(0) })
    }

    fn stop_all(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}
