//! Logging-Setup via tracing-subscriber
//!
//! Alle Crates loggen ueber `tracing`. Der `PufferLayer` formatiert jedes
//! Event und reicht es an den [`Protokollpuffer`] weiter, der es ins Logfile
//! (und ab der Konsolen-Stufe auf stdout) bringt.
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `GATE_LOG_LEVEL`: Filter im `EnvFilter`-Format, ueberschreibt die Konfiguration
//!
//! tracing kennt keine Fatal-Stufe. Ein `error!`-Event mit dem Feld
//! `fatal = true` wird als Fatal aufgezeichnet.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

use crate::sink::{Protokollpuffer, Stufe};

/// Umgebungsvariable fuer den Log-Filter
pub const LOG_LEVEL_ENV: &str = "GATE_LOG_LEVEL";

/// Feldname, der ein `error!`-Event zur Fatal-Meldung macht
pub const FATAL_FELD: &str = "fatal";

/// tracing-Layer, der Events in den Protokollpuffer schreibt
pub struct PufferLayer {
    puffer: Arc<Protokollpuffer>,
}

impl PufferLayer {
    pub fn neu(puffer: Arc<Protokollpuffer>) -> Self {
        Self { puffer }
    }
}

impl<S> Layer<S> for PufferLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut felder = FeldSammler::default();
        event.record(&mut felder);

        let stufe = stufe_fuer(event.metadata().level(), felder.fatal);
        self.puffer.protokollieren(stufe, &felder.text());
    }
}

/// Bildet tracing-Level auf Log-Stufen ab
pub fn stufe_fuer(level: &Level, fatal: bool) -> Stufe {
    match *level {
        Level::TRACE | Level::DEBUG => Stufe::Debug,
        Level::INFO => Stufe::Info,
        Level::WARN => Stufe::Warn,
        _ if fatal => Stufe::Fatal,
        _ => Stufe::Error,
    }
}

/// Sammelt Nachricht und Felder eines Events als Text
#[derive(Default)]
struct FeldSammler {
    nachricht: String,
    felder: String,
    fatal: bool,
}

impl FeldSammler {
    /// `nachricht key=value key=value`
    fn text(&self) -> String {
        let mut text = self.nachricht.clone();
        text.push_str(&self.felder);
        text
    }
}

impl Visit for FeldSammler {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == FATAL_FELD {
            self.fatal = value;
        } else {
            let _ = write!(self.felder, " {}={}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.nachricht.push_str(value);
        } else {
            let _ = write!(self.felder, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.nachricht, "{value:?}");
        } else {
            let _ = write!(self.felder, " {}={:?}", field.name(), value);
        }
    }
}

/// Initialisiert das Logging-System.
///
/// `GATE_LOG_LEVEL` hat Vorrang vor `level`; ist beides ungueltig, wird
/// `debug` verwendet. Schlaegt fehl, wenn bereits ein globaler Subscriber
/// gesetzt ist.
pub fn logging_initialisieren(
    level: &str,
    puffer: Arc<Protokollpuffer>,
) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(PufferLayer::neu(puffer))
        .try_init()
}
