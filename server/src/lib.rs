//! gate-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den Anwendungs-Lebenszyklus
//! fuer `main` und Integrationstests bereit.

pub mod config;
pub mod melder;

use anyhow::Result;
use config::GateConfig;
use gate_core::StatusMelder;
use gate_gateway::{Gateway, Ruhewaechter, TaskZaehler, Verbindungsregister};
use gate_observability::{
    logging_initialisieren, observability_server_starten, protokoll_oeffnen, GateMetrics,
    HealthState, Protokollpuffer, Protokollschreiber,
};
use std::path::Path;
use std::sync::Arc;

/// Haelt den laufenden Gateway-Prozess zusammen
pub struct Anwendung {
    config: GateConfig,
    puffer: Arc<Protokollpuffer>,
    schreiber: Protokollschreiber,
    gateway: Arc<Gateway>,
    ruhewaechter: Ruhewaechter,
    health: HealthState,
}

impl Anwendung {
    /// Bereitet den Prozess vor
    ///
    /// Reihenfolge:
    /// 1. Logdatei oeffnen (Verzeichnis anlegen), Schreib-Task starten
    /// 2. tracing an den Log-Puffer haengen
    /// 3. Register, Gateway und Task-Zaehler anlegen
    /// 4. Basis der Ruheerkennung festhalten
    /// 5. Optional den Observability-Server starten
    ///
    /// Eine nicht oeffenbare Logdatei ist fatal.
    pub async fn starten(config: GateConfig) -> Result<Self> {
        let (puffer, schreiber) = protokoll_oeffnen(
            Path::new(&config.logging.datei),
            config.logging.konsole_ab,
            config.logging.flush_intervall(),
        )
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Logdatei '{}' kann nicht geoeffnet werden: {e}",
                config.logging.datei
            )
        })?;

        if let Err(e) = logging_initialisieren(&config.logging.level, Arc::clone(&puffer)) {
            puffer.warn(&format!("Logging war bereits initialisiert: {e}"));
        }

        tracing::debug!("\n          gate {} gestartet\n", env!("CARGO_PKG_VERSION"));

        let metriken = GateMetrics::neu()?;
        let register = Arc::new(Verbindungsregister::mit_frame_groesse(
            metriken.clone(),
            config.gateway.max_frame_size,
        ));
        let aufgaben = TaskZaehler::neu();
        let gateway = Arc::new(Gateway::neu(register, aufgaben.clone()));
        let ruhewaechter = Ruhewaechter::neu(aufgaben, config.laufzeit.ruhe_intervall());
        let health = HealthState::neu(metriken.clone());

        if config.observability.aktiviert {
            let bind_addr = config.observability.bind_adresse;
            let health = health.clone();
            // Nicht gezaehlt: laeuft bis zum Prozessende
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(bind_addr, metriken, health).await {
                    tracing::error!(adresse = %bind_addr, "Observability-Server fehlgeschlagen: {e}");
                }
            });
        }

        tracing::info!(
            lauscher = config.lauscher.len(),
            gegenstellen = config.gegenstellen.len(),
            "gate bereit"
        );

        Ok(Self {
            config,
            puffer,
            schreiber,
            gateway,
            ruhewaechter,
            health,
        })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn register(&self) -> &Arc<Verbindungsregister> {
        self.gateway.register()
    }

    pub fn puffer(&self) -> &Arc<Protokollpuffer> {
        &self.puffer
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    /// Startet alle konfigurierten Listener und Gegenstellen im Hintergrund
    pub fn logik_starten(&self, melder: Arc<dyn StatusMelder>) {
        for lauscher in self.config.lauscher.iter() {
            self.gateway.lauschen_im_hintergrund(
                lauscher.name.as_str(),
                lauscher.transport.as_str(),
                lauscher.adresse.as_str(),
                Arc::clone(&melder),
            );
        }
        for gegenstelle in &self.config.gegenstellen {
            self.gateway.verbinden_im_hintergrund(
                gegenstelle.name.as_str(),
                gegenstelle.transport.as_str(),
                gegenstelle.adresse.as_str(),
                Arc::clone(&melder),
            );
        }
    }

    /// Beendet alle Listener; offene Verbindungen laufen aus
    pub fn herunterfahren(&self) {
        self.health.herunterfahren_melden();
        self.gateway.herunterfahren();
    }

    /// Wartet, bis alle Gateway-Tasks beendet sind, und schreibt das Log weg
    pub async fn warten_auf_ende(self) {
        self.ruhewaechter.warten().await;
        self.schreiber.beenden().await;
    }
}
