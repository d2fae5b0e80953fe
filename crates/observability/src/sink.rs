//! Gepuffertes Logfile
//!
//! Alle Log-Zeilen landen zuerst in einem gemeinsamen Textpuffer. Ein
//! eigener Schreib-Task leert den Puffer in festen Abstaenden (Standard:
//! 5 Sekunden) in die Logdatei und ist der einzige Schreiber dieser Datei.
//!
//! ## Zeilenformat
//!
//! ```text
//! 16:33:00 [I] Erste Zeile
//! 16:33:00 [I] Zweite Zeile derselben Meldung
//! ```
//!
//! Jede physische Zeile traegt den Kopf ihrer Meldung. Die Uhrzeit wird pro
//! Meldung neu bestimmt.

use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::{self, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Standard-Intervall des Schreib-Tasks
pub const STANDARD_FLUSH_INTERVALL: Duration = Duration::from_secs(5);

/// Zeitformat im Zeilenkopf
const ZEITFORMAT: &str = "%H:%M:%S";

// ---------------------------------------------------------------------------
// Stufe
// ---------------------------------------------------------------------------

/// Log-Stufe, aufsteigend geordnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stufe {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Fatal = 4,
}

impl Stufe {
    /// Stufe aus ihrem Zahlenwert, `None` ausserhalb von `0..=4`
    pub fn aus_zahl(wert: i64) -> Option<Self> {
        match wert {
            0 => Some(Self::Debug),
            1 => Some(Self::Info),
            2 => Some(Self::Warn),
            3 => Some(Self::Error),
            4 => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Kennung im Zeilenkopf
    pub fn kuerzel(&self) -> &'static str {
        match self {
            Self::Debug => "[D]",
            Self::Info => "[I]",
            Self::Warn => "[W]",
            Self::Error => "[E]",
            Self::Fatal => "[F]",
        }
    }
}

/// Baut den Kopf einer Zeile, z.B. `16:33:00 [W] `
pub fn zeilenkopf(stufe: Stufe, uhrzeit: &str) -> String {
    format!("{uhrzeit} {} ", stufe.kuerzel())
}

/// Formatiert eine Meldung: Kopf vor jeder Zeile, Zeilenumbruch am Ende
pub fn meldung_formatieren(stufe: Stufe, text: &str, uhrzeit: &str) -> String {
    let kopf = zeilenkopf(stufe, uhrzeit);
    let mut zeilen = String::with_capacity(kopf.len() + text.len() + 1);
    zeilen.push_str(&kopf);
    zeilen.push_str(&text.replace('\n', &format!("\n{kopf}")));
    zeilen.push('\n');
    zeilen
}

// ---------------------------------------------------------------------------
// Protokollpuffer
// ---------------------------------------------------------------------------

/// Prozessweiter Log-Puffer
///
/// Beliebig viele Tasks haengen Zeilen an, der `Protokollschreiber` leert.
pub struct Protokollpuffer {
    puffer: Mutex<String>,
    /// Ab dieser Stufe wird zusaetzlich auf stdout geschrieben
    konsole_ab: Stufe,
}

impl Protokollpuffer {
    pub fn neu(konsole_ab: Stufe) -> Self {
        Self {
            puffer: Mutex::new(String::new()),
            konsole_ab,
        }
    }

    pub fn konsole_ab(&self) -> Stufe {
        self.konsole_ab
    }

    /// Haengt eine Meldung an den Puffer an
    pub fn protokollieren(&self, stufe: Stufe, text: &str) {
        let uhrzeit = Local::now().format(ZEITFORMAT).to_string();
        let zeilen = meldung_formatieren(stufe, text, &uhrzeit);

        self.puffer.lock().push_str(&zeilen);

        if stufe >= self.konsole_ab {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(zeilen.as_bytes());
            let _ = stdout.flush();
        }
    }

    /// Wie `protokollieren`, aber mit rohem Zahlenwert fuer die Stufe
    ///
    /// Ungueltige Stufen werden nicht aufgezeichnet, sondern nur auf stderr
    /// gemeldet. Gibt zurueck, ob die Meldung aufgenommen wurde.
    pub fn protokollieren_roh(&self, stufe: i64, text: &str) -> bool {
        match Stufe::aus_zahl(stufe) {
            Some(stufe) => {
                self.protokollieren(stufe, text);
                true
            }
            None => {
                eprintln!("protokollieren: ungueltige Stufe {stufe}");
                false
            }
        }
    }

    pub fn debug(&self, text: &str) {
        self.protokollieren(Stufe::Debug, text);
    }

    pub fn info(&self, text: &str) {
        self.protokollieren(Stufe::Info, text);
    }

    pub fn warn(&self, text: &str) {
        self.protokollieren(Stufe::Warn, text);
    }

    pub fn error(&self, text: &str) {
        self.protokollieren(Stufe::Error, text);
    }

    pub fn fatal(&self, text: &str) {
        self.protokollieren(Stufe::Fatal, text);
    }

    /// Nimmt den gesamten Pufferinhalt heraus und leert den Puffer
    pub fn entnehmen(&self) -> String {
        std::mem::take(&mut *self.puffer.lock())
    }

    /// Stellt nicht geschriebenen Text wieder vor den aktuellen Inhalt
    fn zurueckstellen(&self, mut text: String) {
        let mut puffer = self.puffer.lock();
        text.push_str(&puffer);
        *puffer = text;
    }

    pub fn ist_leer(&self) -> bool {
        self.puffer.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Logdatei + Schreib-Task
// ---------------------------------------------------------------------------

/// Oeffnet (oder erzeugt) die Logdatei und positioniert ans Dateiende
///
/// Das Elternverzeichnis wird bei Bedarf angelegt.
pub async fn logdatei_oeffnen(pfad: &Path) -> io::Result<File> {
    if let Some(verzeichnis) = pfad.parent() {
        if !verzeichnis.as_os_str().is_empty() {
            tokio::fs::create_dir_all(verzeichnis).await?;
        }
    }

    let mut datei = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(pfad)
        .await?;
    datei.seek(SeekFrom::End(0)).await?;
    Ok(datei)
}

/// Handle auf den laufenden Schreib-Task
pub struct Protokollschreiber {
    stopp_tx: watch::Sender<bool>,
    aufgabe: JoinHandle<()>,
}

impl Protokollschreiber {
    /// Startet den Schreib-Task fuer `puffer`
    pub fn starten(puffer: Arc<Protokollpuffer>, datei: File, intervall: Duration) -> Self {
        let (stopp_tx, stopp_rx) = watch::channel(false);
        let aufgabe = tokio::spawn(schreibschleife(puffer, datei, intervall, stopp_rx));
        Self { stopp_tx, aufgabe }
    }

    /// Schreibt den Rest des Puffers und schliesst die Logdatei
    pub async fn beenden(self) {
        let _ = self.stopp_tx.send(true);
        if let Err(e) = self.aufgabe.await {
            eprintln!("Protokollschreiber: Task abgebrochen: {e}");
        }
    }
}

/// Oeffnet die Logdatei und startet den Schreib-Task
///
/// Schlaegt fehl, wenn die Datei nicht geoeffnet werden kann. Ohne Logfile
/// kann der Prozess nicht sinnvoll weiterlaufen.
pub async fn protokoll_oeffnen(
    pfad: &Path,
    konsole_ab: Stufe,
    intervall: Duration,
) -> io::Result<(Arc<Protokollpuffer>, Protokollschreiber)> {
    let datei = logdatei_oeffnen(pfad).await?;
    let puffer = Arc::new(Protokollpuffer::neu(konsole_ab));
    let schreiber = Protokollschreiber::starten(Arc::clone(&puffer), datei, intervall);
    Ok((puffer, schreiber))
}

async fn schreibschleife(
    puffer: Arc<Protokollpuffer>,
    mut datei: File,
    intervall: Duration,
    mut stopp_rx: watch::Receiver<bool>,
) {
    let mut takt = tokio::time::interval(intervall);
    takt.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = takt.tick() => {
                puffer_schreiben(&puffer, &mut datei).await;
            }
            ergebnis = stopp_rx.changed() => {
                if ergebnis.is_err() || *stopp_rx.borrow() {
                    break;
                }
            }
        }
    }

    puffer_schreiben(&puffer, &mut datei).await;
    if let Err(e) = datei.sync_all().await {
        eprintln!("Protokollschreiber: sync fehlgeschlagen: {e}");
    }
}

async fn puffer_schreiben(puffer: &Protokollpuffer, datei: &mut File) {
    let inhalt = puffer.entnehmen();
    if inhalt.is_empty() {
        return;
    }

    let ergebnis = async {
        datei.write_all(inhalt.as_bytes()).await?;
        datei.flush().await
    }
    .await;

    if let Err(e) = ergebnis {
        // Text geht nicht verloren, naechster Takt versucht es erneut
        eprintln!("Protokollschreiber: Schreiben fehlgeschlagen: {e}");
        puffer.zurueckstellen(inhalt);
    }
}
