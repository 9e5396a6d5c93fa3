//! Pool-wide health probing over `GET /health`.

use futures_util::future::join_all;
use serde::Serialize;

use super::transport::HttpNodeTransport;

#[derive(Debug, Clone, Serialize)]
pub struct NodeHealth {
    pub index: usize,
    pub url: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Probes nodes `1..=pool_size` concurrently, in index order.
pub async fn probe_pool(transport: &HttpNodeTransport, pool_size: usize) -> Vec<NodeHealth> {
    let probes = (1..=pool_size).map(|index| async move {
        let url = transport.addressing().url_for(index);
        match transport.health(index).await {
            Ok(health) => NodeHealth {
                index,
                url,
                healthy: health.status == "healthy",
                executor_id: Some(health.executor_id),
                error: None,
            },
            Err(e) => {
                log::warn!("executor-{} failed health check: {}", index, e);
                NodeHealth {
                    index,
                    url,
                    healthy: false,
                    executor_id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    });

    join_all(probes).await
}
