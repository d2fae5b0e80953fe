//! Fehlertypen fuer gate
//!
//! Fehler werden im Gateway nie nach oben geworfen, sondern genau einmal als
//! Detailtext einer Statusmeldung ausgegeben. Der `Display`-Text ist deshalb
//! fuer Menschen formuliert.

use thiserror::Error;

/// Result-Alias fuer gate
pub type GateResult<T> = std::result::Result<T, GateError>;

/// Alle Fehler des Gateway-Kerns
#[derive(Debug, Error)]
pub enum GateError {
    // --- Konfiguration ---
    #[error("Pflichtangabe fehlt: {0}")]
    LeereAngabe(&'static str),

    #[error("Unbekannter Transport '{0}' (erlaubt: tcp, tcp4, tcp6)")]
    UnbekannterTransport(String),

    // --- Netzwerk ---
    #[error("Adresse '{adresse}' nicht aufloesbar: {quelle}")]
    Aufloesung {
        adresse: String,
        #[source]
        quelle: std::io::Error,
    },

    #[error("Adresse '{adresse}' liefert keine {transport}-Adresse")]
    KeineAdresse { adresse: String, transport: String },

    #[error("Bind auf '{adresse}' fehlgeschlagen: {quelle}")]
    Bind {
        adresse: String,
        #[source]
        quelle: std::io::Error,
    },

    #[error("Verbindung zu '{adresse}' fehlgeschlagen: {quelle}")]
    Verbinden {
        adresse: String,
        #[source]
        quelle: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = GateError::LeereAngabe("adresse");
        assert_eq!(e.to_string(), "Pflichtangabe fehlt: adresse");
    }

    #[test]
    fn aufloesungsfehler_enthaelt_adresse() {
        let e = GateError::Aufloesung {
            adresse: "nirgendwo:1".into(),
            quelle: std::io::Error::new(std::io::ErrorKind::NotFound, "kein Host"),
        };
        let text = e.to_string();
        assert!(text.contains("nirgendwo:1"));
        assert!(text.contains("kein Host"));
    }
}
