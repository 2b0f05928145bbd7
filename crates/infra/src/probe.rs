//! HTTP health-check connectivity probe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use fieldops_offline::{ConnectivityProbe, Reachability};

/// Default timeout for a single health check.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probes `GET {base}/health`. Any HTTP answer means the host is reachable.
#[derive(Debug, Clone)]
pub struct HttpReachabilityProbe {
    client: Client,
    health_url: Url,
    timeout: Duration,
}

impl HttpReachabilityProbe {
    pub fn new(base_url: &Url) -> Self {
        let mut health_url = base_url.clone();
        if let Ok(mut segments) = health_url.path_segments_mut() {
            segments.pop_if_empty().push("health");
        }
        Self {
            client: Client::new(),
            health_url,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn health_url(&self) -> &Url {
        &self.health_url
    }
}

#[async_trait]
impl ConnectivityProbe for HttpReachabilityProbe {
    async fn reachability(&self) -> Reachability {
        match self
            .client
            .get(self.health_url.clone())
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) => {
                tracing::trace!(status = resp.status().as_u16(), "health check answered");
                Reachability::Reachable
            }
            Err(e) => {
                tracing::debug!(error = %e, url = %self.health_url, "health check failed");
                Reachability::Unreachable
            }
        }
    }
}
