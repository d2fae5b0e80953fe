//! gate-core – Gemeinsame Typen, Status-Vokabular und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Gateway, Protokoll und
//! Server gemeinsam nutzen.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{GateError, GateResult};
pub use event::{Fortsetzung, StatusEreignis, StatusMelder, Statusmeldung};
pub use types::{NachrichtenCode, VerbindungsId};
