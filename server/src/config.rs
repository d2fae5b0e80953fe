//! Gateway-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass das Gateway ohne Konfigurationsdatei
//! lauffaehig ist (ein Listener `main_listen` auf `:8001`).

use gate_gateway::shutdown::STANDARD_RUHE_INTERVALL;
use gate_observability::sink::STANDARD_FLUSH_INTERVALL;
use gate_observability::Stufe;
use gate_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Umgebungsvariable mit dem Pfad der Konfigurationsdatei
pub const CONFIG_ENV: &str = "GATE_CONFIG";

/// Vollstaendige Gateway-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Allgemeine Gateway-Einstellungen
    pub gateway: GatewayEinstellungen,
    /// Lokale Listener (`[[lauscher]]`)
    pub lauscher: Lauscherliste,
    /// Ausgehende Verbindungen (`[[gegenstellen]]`)
    pub gegenstellen: Vec<Endpunkt>,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Laufzeit-Einstellungen
    pub laufzeit: LaufzeitEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Gateway-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayEinstellungen {
    /// Maximale Frame-Groesse in Bytes (ohne Laengenfeld)
    pub max_frame_size: usize,
}

impl Default for GatewayEinstellungen {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Ein Listener oder eine Gegenstelle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpunkt {
    /// Logischer Name
    pub name: String,
    /// `tcp`, `tcp4` oder `tcp6`
    #[serde(default = "standard_transport")]
    pub transport: String,
    /// `host:port` oder `:port`
    pub adresse: String,
}

fn standard_transport() -> String {
    "tcp".into()
}

/// Liste der Listener, standardmaessig `main_listen` auf `:8001`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lauscherliste(pub Vec<Endpunkt>);

impl Default for Lauscherliste {
    fn default() -> Self {
        Self(vec![Endpunkt {
            name: "main_listen".into(),
            transport: standard_transport(),
            adresse: ":8001".into(),
        }])
    }
}

impl std::ops::Deref for Lauscherliste {
    type Target = [Endpunkt];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Filter fuer tracing: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Pfad der Logdatei, das Verzeichnis wird bei Bedarf angelegt
    pub datei: String,
    /// Ab dieser Stufe zusaetzlich auf stdout
    pub konsole_ab: Stufe,
    /// Abstand zwischen zwei Schreibvorgaengen in ms
    pub flush_intervall_ms: u64,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "debug".into(),
            datei: "log/gate.log".into(),
            konsole_ab: Stufe::Info,
            flush_intervall_ms: STANDARD_FLUSH_INTERVALL.as_millis() as u64,
        }
    }
}

impl LoggingEinstellungen {
    pub fn flush_intervall(&self) -> Duration {
        Duration::from_millis(self.flush_intervall_ms.max(1))
    }
}

/// Laufzeit-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaufzeitEinstellungen {
    /// Alle Tasks auf einem einzigen Thread ausfuehren
    pub einzel_thread: bool,
    /// Pollintervall der Ruheerkennung in ms
    pub ruhe_intervall_ms: u64,
}

impl Default for LaufzeitEinstellungen {
    fn default() -> Self {
        Self {
            einzel_thread: true,
            ruhe_intervall_ms: STANDARD_RUHE_INTERVALL.as_millis() as u64,
        }
    }
}

impl LaufzeitEinstellungen {
    pub fn ruhe_intervall(&self) -> Duration {
        Duration::from_millis(self.ruhe_intervall_ms.max(1))
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Bind-Adresse fuer Metriken und Health
    pub bind_adresse: SocketAddr,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: false,
            bind_adresse: SocketAddr::from(([127, 0, 0, 1], 9300)),
        }
    }
}

impl GateConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt `None` zurueck wenn die Datei nicht existiert.
    ///
    /// Laeuft vor dem Logging-Setup und loggt deshalb nichts selbst; der
    /// Aufrufer meldet den Rueckfall per `standardwerte_melden`.
    pub fn laden(pfad: &str) -> anyhow::Result<Option<Self>> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Warnung fuer den Rueckfall auf Standardwerte (nach dem Logging-Setup)
    pub fn standardwerte_melden(pfad: &str) {
        tracing::warn!(
            pfad = pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }

    /// Pfad aus `GATE_CONFIG`, sonst `config.toml`
    pub fn pfad_aus_umgebung() -> String {
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.toml".into())
    }
}
