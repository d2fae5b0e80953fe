//! # gate-observability
//!
//! Observability-Crate fuer gate:
//! - Gepuffertes Logfile mit periodischem Schreib-Task
//! - tracing-Layer, der alle Events in diesen Puffer leitet
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)

pub mod health;
pub mod logging;
pub mod metrics;
pub mod sink;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus};
pub use logging::{logging_initialisieren, PufferLayer};
pub use metrics::{metrics_router, GateMetrics};
pub use sink::{protokoll_oeffnen, Protokollpuffer, Protokollschreiber, Stufe};

use anyhow::Result;
use std::net::SocketAddr;

/// Startet den Observability-HTTP-Server (Metriken + Health)
///
/// Endpunkte:
/// - `GET /metrics` – Prometheus scrape format
/// - `GET /health`  – Health-Check JSON
pub async fn observability_server_starten(
    bind_addr: SocketAddr,
    metriken: GateMetrics,
    health: HealthState,
) -> Result<()> {
    use axum::Router;

    let app = Router::new()
        .merge(metrics_router(metriken))
        .merge(health_router(health));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Observability-Server gestartet");

    axum::serve(listener, app).await?;
    Ok(())
}
