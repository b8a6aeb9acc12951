//! Post-deployment liveness probing

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::errors::OrchestratorError;
use crate::models::target::Target;

/// The service did not answer the liveness probe
#[derive(Debug, Error)]
#[error("no response from {url}: {detail}")]
pub struct HealthCheckError {
    pub url: String,
    pub detail: String,
}

/// Liveness probe against a deployed service
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, target: &Target) -> Result<(), HealthCheckError>;
}

/// HTTP GET probe; any response counts as alive
pub struct HttpHealthChecker {
    client: reqwest::Client,
}

impl HttpHealthChecker {
    pub fn new(timeout: Duration) -> Result<Self, OrchestratorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthChecker {
    async fn probe(&self, target: &Target) -> Result<(), HealthCheckError> {
        let url = Url::parse(&format!("http://{}:{}/", target.host, target.service_port))
            .map_err(|e| HealthCheckError {
                url: format!("http://{}:{}/", target.host, target.service_port),
                detail: e.to_string(),
            })?;
        debug!("Probing {}", url);

        // Liveness, not correctness: a 5xx still proves the process answers
        match self.client.get(url.clone()).send().await {
            Ok(response) => {
                debug!("Probe of {} answered with {}", url, response.status());
                Ok(())
            }
            Err(e) => Err(HealthCheckError {
                url: url.to_string(),
                detail: e.to_string(),
            }),
        }
    }
}
