//! gate-gateway – Verbindungs-Lebenszyklus und Nachrichten-Dispatch
//!
//! Architektur:
//! - `registry`: Verbindungsregister (ID- und Namens-Index, Listener, Handler-Tabelle)
//! - `connection`: Verbindungs-Datensatz mit Schreibhaelfte
//! - `tcp`: Listen/Connect-Engine mit Statusmeldungen
//! - `dispatch`: Leseschleife pro Verbindung
//! - `shutdown`: Task-Zaehlung und Ruheerkennung

pub mod connection;
pub mod dispatch;
pub mod registry;
pub mod shutdown;
pub mod tcp;

pub use connection::Verbindung;
pub use registry::{LauscherInfo, NachrichtenHandler, Verbindungsregister};
pub use shutdown::{Ruhewaechter, TaskZaehler};
pub use tcp::Gateway;
