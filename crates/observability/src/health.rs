//! Health-Check-Endpunkt fuer gate
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Anzahl aktiver Verbindungen

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::GateMetrics;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub aktive_verbindungen: i64,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    metriken: GateMetrics,
    faehrt_herunter: Arc<AtomicBool>,
}

impl HealthState {
    pub fn neu(metriken: GateMetrics) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            metriken,
            faehrt_herunter: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn aktive_verbindungen(&self) -> i64 {
        self.metriken.aktive_verbindungen.get()
    }

    /// Markiert den Prozess als herunterfahrend (Status `degraded`)
    pub fn herunterfahren_melden(&self) {
        self.faehrt_herunter.store(true, Ordering::Relaxed);
    }

    pub fn faehrt_herunter(&self) -> bool {
        self.faehrt_herunter.load(Ordering::Relaxed)
    }

    /// Baut die aktuelle Antwort
    pub fn antwort(&self) -> HealthResponse {
        let status = if self.faehrt_herunter() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            aktive_verbindungen: self.aktive_verbindungen(),
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Gateway-Status zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let response = state.antwort();

    (StatusCode::OK, Json(response))
}
