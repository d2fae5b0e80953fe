//! gate – Einstiegspunkt
//!
//! Laedt die Konfiguration, baut die Runtime und startet das Gateway.
//! Ctrl-C beendet die Listener; der Prozess endet, sobald alle
//! Verbindungen geschlossen sind.

use anyhow::Result;
use gate_server::{config::GateConfig, melder::StandardMelder, Anwendung};
use std::sync::Arc;

fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = GateConfig::pfad_aus_umgebung();

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let geladen = GateConfig::laden(&config_pfad)?;
    let standardwerte = geladen.is_none();
    let config = geladen.unwrap_or_default();

    let mut builder = if config.laufzeit.einzel_thread {
        tokio::runtime::Builder::new_current_thread()
    } else {
        tokio::runtime::Builder::new_multi_thread()
    };
    let runtime = builder.enable_all().build()?;

    runtime.block_on(ausfuehren(config, standardwerte.then_some(config_pfad)))
}

async fn ausfuehren(config: GateConfig, fehlende_datei: Option<String>) -> Result<()> {
    let anwendung = Anwendung::starten(config).await?;
    if let Some(pfad) = fehlende_datei {
        GateConfig::standardwerte_melden(&pfad);
    }
    anwendung.logik_starten(Arc::new(StandardMelder));

    let gateway = Arc::clone(anwendung.gateway());
    let health = anwendung.health().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown-Signal empfangen, Listener werden beendet");
            health.herunterfahren_melden();
            gateway.herunterfahren();
        }
    });

    anwendung.warten_auf_ende().await;
    Ok(())
}
