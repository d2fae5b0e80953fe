//! Prometheus-kompatible Metriken fuer gate
//!
//! Registrierte Metriken:
//! - `gate_active_connections` – Gauge: Aktuell registrierte Verbindungen
//! - `gate_connections_total` – Counter: Aufgebaute Verbindungen (richtung)
//! - `gate_messages_total` – Counter: Gelesene Nachrichten (ergebnis)
//! - `gate_status_events_total` – Counter: Statusmeldungen (ereignis)

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Label-Wert fuer angenommene Verbindungen
pub const RICHTUNG_EINGEHEND: &str = "eingehend";
/// Label-Wert fuer selbst aufgebaute Verbindungen
pub const RICHTUNG_AUSGEHEND: &str = "ausgehend";
/// Label-Wert fuer Nachrichten mit registriertem Handler
pub const ERGEBNIS_ZUGESTELLT: &str = "zugestellt";
/// Label-Wert fuer Nachrichten ohne Handler
pub const ERGEBNIS_VERWORFEN: &str = "verworfen";

/// Alle gate-Prometheus-Metriken
///
/// Jede Instanz hat ihre eigene Registry; Clone teilt die Zaehler.
#[derive(Clone)]
pub struct GateMetrics {
    pub registry: Arc<Registry>,

    pub aktive_verbindungen: IntGauge,
    pub verbindungen_total: IntCounterVec,
    pub nachrichten_total: IntCounterVec,
    pub statusmeldungen_total: IntCounterVec,
}

impl GateMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let aktive_verbindungen = IntGauge::with_opts(Opts::new(
            "gate_active_connections",
            "Anzahl aktuell registrierter Verbindungen",
        ))?;
        registry.register(Box::new(aktive_verbindungen.clone()))?;

        let verbindungen_total = IntCounterVec::new(
            Opts::new(
                "gate_connections_total",
                "Gesamtanzahl aufgebauter Verbindungen",
            ),
            &["richtung"],
        )?;
        registry.register(Box::new(verbindungen_total.clone()))?;

        let nachrichten_total = IntCounterVec::new(
            Opts::new("gate_messages_total", "Gesamtanzahl gelesener Nachrichten"),
            &["ergebnis"],
        )?;
        registry.register(Box::new(nachrichten_total.clone()))?;

        let statusmeldungen_total = IntCounterVec::new(
            Opts::new(
                "gate_status_events_total",
                "Gesamtanzahl gemeldeter Lebenszyklus-Ereignisse",
            ),
            &["ereignis"],
        )?;
        registry.register(Box::new(statusmeldungen_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            aktive_verbindungen,
            verbindungen_total,
            nachrichten_total,
            statusmeldungen_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: GateMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<GateMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
