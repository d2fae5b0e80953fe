//! Status-Vokabular des Gateways
//!
//! Listener, Dialer und Leseschleifen melden jeden Lebenszyklus-Schritt einer
//! Verbindung ueber einen vom Aufrufer gelieferten `StatusMelder`. Der
//! Rueckgabewert wird nur bei `AcceptFehlgeschlagen` ausgewertet und
//! entscheidet, ob die Accept-Loop weiterlaeuft.

use crate::types::VerbindungsId;

/// Alle Lebenszyklus-Ereignisse (abschliessende Liste)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusEreignis {
    /// Listener konnte nicht geoeffnet werden
    ListenFehlgeschlagen,
    /// Listener ist bereit
    ListenOk,
    /// `accept` lieferte einen Fehler
    AcceptFehlgeschlagen,
    /// Eingehende Verbindung angenommen
    AcceptOk,
    /// Ausgehende Verbindung fehlgeschlagen
    ConnectFehlgeschlagen,
    /// Ausgehende Verbindung aufgebaut
    ConnectOk,
    /// Lesefehler, die Leseschleife endet
    LesenFehlgeschlagen,
    /// Verbindung wird gleich geschlossen
    VorSchliessen,
    /// Schliessen des Sockets fehlgeschlagen
    SchliessenFehlgeschlagen,
    /// Socket geschlossen
    SchliessenOk,
}

impl StatusEreignis {
    /// Alle Ereignisse in Lebenszyklus-Reihenfolge
    pub const ALLE: [StatusEreignis; 10] = [
        Self::ListenFehlgeschlagen,
        Self::ListenOk,
        Self::AcceptFehlgeschlagen,
        Self::AcceptOk,
        Self::ConnectFehlgeschlagen,
        Self::ConnectOk,
        Self::LesenFehlgeschlagen,
        Self::VorSchliessen,
        Self::SchliessenFehlgeschlagen,
        Self::SchliessenOk,
    ];

    /// Textform des Ereignisses, wie sie in Logs und an Melder erscheint
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::ListenFehlgeschlagen => "listen failed",
            Self::ListenOk => "listen ok",
            Self::AcceptFehlgeschlagen => "accept failed",
            Self::AcceptOk => "accept ok",
            Self::ConnectFehlgeschlagen => "connect failed",
            Self::ConnectOk => "connect ok",
            Self::LesenFehlgeschlagen => "read failed",
            Self::VorSchliessen => "pre close",
            Self::SchliessenFehlgeschlagen => "close failed",
            Self::SchliessenOk => "close ok",
        }
    }
}

impl std::fmt::Display for StatusEreignis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

/// Eine einzelne Statusmeldung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statusmeldung {
    pub ereignis: StatusEreignis,
    /// Logischer Name (Listener- oder Gegenstellen-Name, sonst leer)
    pub name: String,
    /// Betroffene Verbindung, `VerbindungsId::KEINE` wenn es keine gibt
    pub id: VerbindungsId,
    /// Menschenlesbares Detail (Fehlertext), sonst leer
    pub detail: String,
}

impl Statusmeldung {
    pub fn neu(
        ereignis: StatusEreignis,
        name: impl Into<String>,
        id: VerbindungsId,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            ereignis,
            name: name.into(),
            id,
            detail: detail.into(),
        }
    }

    /// Anzeigename: der logische Name, ersatzweise `Conn[<id>]`
    pub fn anzeigename(&self) -> String {
        if self.name.is_empty() {
            self.id.to_string()
        } else {
            self.name.clone()
        }
    }
}

/// Entscheidung des Melders nach einem `AcceptFehlgeschlagen`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fortsetzung {
    /// Weiter annehmen
    #[default]
    Weiter,
    /// Listener beenden
    Stopp,
}

impl From<bool> for Fortsetzung {
    fn from(weiter: bool) -> Self {
        if weiter {
            Self::Weiter
        } else {
            Self::Stopp
        }
    }
}

/// Empfaenger fuer Statusmeldungen
///
/// Wird synchron aus den Gateway-Tasks aufgerufen und darf daher nicht
/// blockieren.
pub trait StatusMelder: Send + Sync + 'static {
    fn melden(&self, meldung: &Statusmeldung) -> Fortsetzung;
}

impl<F> StatusMelder for F
where
    F: Fn(&Statusmeldung) -> Fortsetzung + Send + Sync + 'static,
{
    fn melden(&self, meldung: &Statusmeldung) -> Fortsetzung {
        self(meldung)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vokabular_ist_vollstaendig_und_eindeutig() {
        let texte: std::collections::HashSet<_> =
            StatusEreignis::ALLE.iter().map(|e| e.als_str()).collect();
        assert_eq!(texte.len(), 10);
        assert!(texte.contains("listen failed"));
        assert!(texte.contains("close ok"));
    }

    #[test]
    fn anzeigename_faellt_auf_id_zurueck() {
        let m = Statusmeldung::neu(StatusEreignis::AcceptOk, "", VerbindungsId(3), "");
        assert_eq!(m.anzeigename(), "Conn[3]");

        let m = Statusmeldung::neu(StatusEreignis::ConnectOk, "peer1", VerbindungsId(4), "");
        assert_eq!(m.anzeigename(), "peer1");
    }

    #[test]
    fn closure_ist_melder() {
        let melder = |m: &Statusmeldung| Fortsetzung::from(m.ereignis != StatusEreignis::AcceptFehlgeschlagen);
        let stopp = Statusmeldung::neu(StatusEreignis::AcceptFehlgeschlagen, "x", VerbindungsId::KEINE, "boom");
        assert_eq!(melder.melden(&stopp), Fortsetzung::Stopp);
    }

    #[test]
    fn fortsetzung_aus_bool() {
        assert_eq!(Fortsetzung::from(true), Fortsetzung::Weiter);
        assert_eq!(Fortsetzung::from(false), Fortsetzung::Stopp);
    }
}
