//! Standard-Statusmelder
//!
//! Schreibt jede Statusmeldung ins Log. `accept failed` gilt als fatal und
//! beendet den betroffenen Listener, alle anderen Meldungen lassen den
//! Ablauf unveraendert.

use gate_core::{Fortsetzung, StatusEreignis, StatusMelder, Statusmeldung};

/// Loggt Statusmeldungen ueber `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardMelder;

impl StatusMelder for StandardMelder {
    fn melden(&self, meldung: &Statusmeldung) -> Fortsetzung {
        let name = meldung.anzeigename();
        let detail = &meldung.detail;

        match meldung.ereignis {
            StatusEreignis::ListenFehlgeschlagen => {
                tracing::error!(fatal = true, "{name} : Listen fehlgeschlagen [{detail}]");
            }
            StatusEreignis::ListenOk => {
                tracing::info!("{name} : Listen ok.");
            }
            StatusEreignis::AcceptFehlgeschlagen => {
                tracing::error!(fatal = true, "{name} : Accept fehlgeschlagen [{detail}]");
                return Fortsetzung::Stopp;
            }
            StatusEreignis::AcceptOk => {
                tracing::debug!("{name} : Accept ok");
            }
            StatusEreignis::ConnectFehlgeschlagen => {
                tracing::error!("{name} : Connect fehlgeschlagen [{detail}]");
            }
            StatusEreignis::ConnectOk => {
                tracing::debug!("{name} : Connect ok");
            }
            StatusEreignis::LesenFehlgeschlagen => {
                tracing::error!("{name} : Lesen fehlgeschlagen [{detail}]");
            }
            StatusEreignis::VorSchliessen => {
                tracing::debug!("{name} : Verbindung wird geschlossen");
            }
            StatusEreignis::SchliessenFehlgeschlagen => {
                tracing::error!("{name} : Schliessen fehlgeschlagen [{detail}]");
            }
            StatusEreignis::SchliessenOk => {
                tracing::debug!("{name} : Verbindung geschlossen.");
            }
        }

        Fortsetzung::Weiter
    }
}
