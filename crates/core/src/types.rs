//! Identifikationstypen fuer gate
//!
//! Verbindungs-IDs verwenden das Newtype-Pattern, damit sie nicht mit
//! Nachrichten-Codes oder Zaehlern verwechselt werden koennen.

use serde::{Deserialize, Serialize};

/// Nachrichten-Code im Kopf jedes Frames (waehlt den Handler aus)
pub type NachrichtenCode = u16;

/// Eindeutige Verbindungs-ID
///
/// Wird vom Verbindungsregister fortlaufend ab 1 vergeben und waehrend der
/// Prozesslaufzeit nie wiederverwendet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VerbindungsId(pub u64);

impl VerbindungsId {
    /// Platzhalter fuer Statusmeldungen ohne zugehoerige Verbindung
    pub const KEINE: VerbindungsId = VerbindungsId(0);
}

impl std::fmt::Display for VerbindungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Conn[{}]", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbindungs_id_display() {
        assert_eq!(VerbindungsId(7).to_string(), "Conn[7]");
    }

    #[test]
    fn keine_id_ist_null() {
        assert_eq!(VerbindungsId::KEINE, VerbindungsId(0));
    }

    #[test]
    fn ids_sind_geordnet() {
        assert!(VerbindungsId(1) < VerbindungsId(2));
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let id = VerbindungsId(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let id2: VerbindungsId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, id2);
    }
}
