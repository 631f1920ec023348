//! HTTP health probe implementation.
//!
//! Probes a service's health endpoint with a GET request and classifies
//! the outcome: a success status within the latency threshold is
//! healthy, a slow success is degraded, and a non-success status or a
//! transport error is unhealthy with the reason recorded. All failures
//! are absorbed into the outcome -- the sampler never sees an error.

use async_trait::async_trait;
use foundry_health::{ProbeOutcome, ServiceProbe};

/// A probe that GETs one health endpoint.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    degraded_threshold_ms: u64,
}

impl HttpProbe {
    /// Create a probe for one endpoint.
    ///
    /// Responses slower than `degraded_threshold_ms` are classified as
    /// degraded even when the status code is a success.
    pub const fn new(client: reqwest::Client, url: String, degraded_threshold_ms: u64) -> Self {
        Self {
            client,
            url,
            degraded_threshold_ms,
        }
    }
}

#[async_trait]
impl ServiceProbe for HttpProbe {
    async fn probe(&self) -> ProbeOutcome {
        let started = std::time::Instant::now();
        let response = self.client.get(&self.url).send().await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match response {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    if elapsed_ms > self.degraded_threshold_ms {
                        ProbeOutcome::degraded(
                            elapsed_ms,
                            format!("responded in {elapsed_ms}ms"),
                        )
                    } else {
                        ProbeOutcome::healthy(elapsed_ms)
                    }
                } else {
                    ProbeOutcome::failure(elapsed_ms, format!("HTTP {status}"))
                }
            }
            Err(err) => ProbeOutcome::failure(elapsed_ms, format!("request failed: {err}")),
        }
    }
}
