//! HTTP surface of the exporter: the scrape endpoint and a liveness probe.

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::collector::SharedCollector;

/// Content type of the OpenMetrics text format.
pub const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

fn scrape_router(collector: SharedCollector, metrics_path: &str) -> Router {
    Router::new()
        .route(metrics_path, get(scrape))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(collector)
}

/// Every request polls the printer; nothing is cached between scrapes.
async fn scrape(State(collector): State<SharedCollector>) -> Response {
    match collector.render().await {
        Ok(body) => ([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics\n").into_response()
        }
    }
}

/// Liveness of the exporter itself. Does not contact the printer.
async fn health(State(collector): State<SharedCollector>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "printer": collector.printer_url(),
    }))
}

/// Resolves once `true` is published on the shutdown channel or the sender is gone.
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
    info!("HTTP server shutting down");
}

/// Exporter HTTP server.
pub struct HttpServer {
    collector: SharedCollector,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    pub fn new(collector: SharedCollector, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            collector,
            listen_addr,
            metrics_path,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr().unwrap_or(self.listen_addr);
        info!(
            addr = %addr,
            path = %self.metrics_path,
            printer = %self.collector.printer_url(),
            "Serving metrics"
        );

        let router = scrape_router(self.collector, &self.metrics_path);
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_requested(shutdown))
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::client::TelemetryClient;
    use crate::collector::PrinterCollector;

    /// Collector polling a port nothing listens on.
    async fn offline_printer() -> SharedCollector {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        Arc::new(PrinterCollector::new(
            TelemetryClient::new(&addr.to_string()).unwrap(),
            "prusa",
        ))
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_scrape_with_printer_offline() {
        let router = scrape_router(offline_printer().await, "/metrics");

        let (status, content_type, body) = get(router, "/metrics").await;

        // An unreachable printer is still a successful scrape.
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(OPENMETRICS_CONTENT_TYPE));
        assert!(body.contains("prusa_printer_available 0"));
        assert!(body.ends_with("# EOF\n"));
    }

    #[tokio::test]
    async fn test_health_reports_printer_url() {
        let collector = offline_printer().await;
        let url = collector.printer_url().to_string();
        let router = scrape_router(collector.clone(), "/metrics");

        let (status, _, body) = get(router, "/health").await;
        assert_eq!(status, StatusCode::OK);

        let health: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["printer"], url.as_str());

        // Health checks are not scrapes.
        assert_eq!(collector.stats().scrapes, 0);
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let router = scrape_router(offline_printer().await, "/prometheus/metrics");

        let (status, _, _) = get(router.clone(), "/prometheus/metrics").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = get(router, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
