//! Verbindungsregister
//!
//! Haelt alle lebenden Verbindungen (nach ID und, fuer ausgehende
//! Verbindungen, nach Name), die offenen Listener und die Handler-Tabelle.
//!
//! Das Register wird einmal explizit erzeugt und per `Arc` an alle
//! Komponenten weitergegeben. Alle Maps liegen hinter Locks; kein Lock wird
//! ueber einen `.await` hinweg gehalten.

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use gate_core::{Fortsetzung, NachrichtenCode, StatusMelder, Statusmeldung, VerbindungsId};
use gate_observability::metrics::{ERGEBNIS_VERWORFEN, ERGEBNIS_ZUGESTELLT};
use gate_observability::GateMetrics;
use gate_protocol::wire::{Nachricht, DEFAULT_MAX_FRAME_SIZE};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::connection::{Schreiber, Verbindung};

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Verarbeitet Nachrichten eines bestimmten Codes
///
/// Die Leseschleife wartet auf das Ende des Futures, bevor sie die naechste
/// Nachricht derselben Verbindung liest.
pub trait NachrichtenHandler: Send + Sync + 'static {
    fn behandeln(&self, verbindung: Arc<Verbindung>, nachricht: Nachricht) -> BoxFuture<'static, ()>;
}

impl<F, Fut> NachrichtenHandler for F
where
    F: Fn(Arc<Verbindung>, Nachricht) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn behandeln(&self, verbindung: Arc<Verbindung>, nachricht: Nachricht) -> BoxFuture<'static, ()> {
        Box::pin(self(verbindung, nachricht))
    }
}

/// Direkt ueber den Code indizierte Handler-Tabelle
#[derive(Default)]
struct Handlertabelle {
    eintraege: Vec<Option<Arc<dyn NachrichtenHandler>>>,
    /// Hoechster je registrierter Code
    max_code: Option<NachrichtenCode>,
}

impl Handlertabelle {
    fn setzen(&mut self, code: NachrichtenCode, handler: Arc<dyn NachrichtenHandler>) {
        let index = usize::from(code);
        if self.eintraege.len() <= index {
            self.eintraege.resize_with(index + 1, || None);
        }
        self.eintraege[index] = Some(handler);
        if self.max_code.map_or(true, |max| code > max) {
            self.max_code = Some(code);
        }
    }

    fn holen(&self, code: NachrichtenCode) -> Option<Arc<dyn NachrichtenHandler>> {
        match self.max_code {
            Some(max) if code <= max => self
                .eintraege
                .get(usize::from(code))
                .and_then(|h| h.clone()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Beschreibung eines offenen Listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauscherInfo {
    pub transport: String,
    /// Angefragte Adresse, wie vom Aufrufer uebergeben
    pub adresse: String,
    /// Tatsaechlich gebundene Adresse
    pub lokale_adresse: SocketAddr,
}

// ---------------------------------------------------------------------------
// Register
// ---------------------------------------------------------------------------

struct RegisterInner {
    naechste_id: u64,
    verbindungen: HashMap<VerbindungsId, Arc<Verbindung>>,
    gegenstellen: HashMap<String, Arc<Verbindung>>,
}

/// Prozessweites Verbindungsregister
pub struct Verbindungsregister {
    inner: RwLock<RegisterInner>,
    lauscher: DashMap<String, LauscherInfo>,
    handler: RwLock<Handlertabelle>,
    max_frame_size: usize,
    metriken: GateMetrics,
}

impl Verbindungsregister {
    pub fn neu(metriken: GateMetrics) -> Self {
        Self::mit_frame_groesse(metriken, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Register mit eigener maximaler Frame-Groesse fuer alle Verbindungen
    pub fn mit_frame_groesse(metriken: GateMetrics, max_frame_size: usize) -> Self {
        Self {
            inner: RwLock::new(RegisterInner {
                naechste_id: 1,
                verbindungen: HashMap::new(),
                gegenstellen: HashMap::new(),
            }),
            lauscher: DashMap::new(),
            handler: RwLock::new(Handlertabelle::default()),
            max_frame_size,
            metriken,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    pub fn metriken(&self) -> &GateMetrics {
        &self.metriken
    }

    // --- Verbindungen ---

    /// Legt eine neue Verbindung an und traegt sie ein
    ///
    /// Vergibt die naechste ID. Ein nicht-leerer `name` macht die Verbindung
    /// zusaetzlich per `nach_name` auffindbar; ein bereits vergebener Name
    /// wird ueberschrieben (letzter Schreiber gewinnt).
    pub fn registrieren(
        &self,
        name: impl Into<String>,
        peer_addr: SocketAddr,
        schreiber: Schreiber,
    ) -> Arc<Verbindung> {
        let name = name.into();
        let mut inner = self.inner.write();

        let id = VerbindungsId(inner.naechste_id);
        inner.naechste_id += 1;

        let verbindung = Arc::new(Verbindung::neu(
            id,
            name,
            peer_addr,
            schreiber,
            self.max_frame_size,
        ));

        if verbindung.ist_benannt() {
            if let Some(alt) = inner
                .gegenstellen
                .insert(verbindung.name().to_string(), Arc::clone(&verbindung))
            {
                tracing::warn!(
                    name = %verbindung.name(),
                    alt = %alt.id(),
                    neu = %id,
                    "Gegenstellen-Name neu vergeben"
                );
            }
        }
        inner.verbindungen.insert(id, Arc::clone(&verbindung));
        self.metriken.aktive_verbindungen.set(inner.verbindungen.len() as i64);

        verbindung
    }

    /// Entfernt eine Verbindung aus allen Indizes
    ///
    /// Ohne Wirkung, wenn die ID unbekannt ist. Der Name wird nur entfernt,
    /// solange er noch auf diese Verbindung zeigt.
    pub fn entfernen(&self, id: VerbindungsId) -> Option<Arc<Verbindung>> {
        let mut inner = self.inner.write();
        let verbindung = inner.verbindungen.remove(&id)?;

        if verbindung.ist_benannt()
            && inner
                .gegenstellen
                .get(verbindung.name())
                .is_some_and(|v| v.id() == id)
        {
            inner.gegenstellen.remove(verbindung.name());
        }
        self.metriken.aktive_verbindungen.set(inner.verbindungen.len() as i64);

        Some(verbindung)
    }

    pub fn nach_id(&self, id: VerbindungsId) -> Option<Arc<Verbindung>> {
        self.inner.read().verbindungen.get(&id).cloned()
    }

    pub fn nach_name(&self, name: &str) -> Option<Arc<Verbindung>> {
        self.inner.read().gegenstellen.get(name).cloned()
    }

    pub fn anzahl_verbindungen(&self) -> usize {
        self.inner.read().verbindungen.len()
    }

    /// IDs aller lebenden Verbindungen, aufsteigend
    pub fn verbindungs_ids(&self) -> Vec<VerbindungsId> {
        let mut ids: Vec<_> = self.inner.read().verbindungen.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    // --- Listener ---

    pub(crate) fn lauscher_eintragen(&self, name: &str, info: LauscherInfo) {
        self.lauscher.insert(name.to_string(), info);
    }

    /// Entfernt den Listener, sofern der Name noch auf diese Adresse zeigt
    pub(crate) fn lauscher_austragen(&self, name: &str, lokale_adresse: SocketAddr) {
        self.lauscher
            .remove_if(name, |_, info| info.lokale_adresse == lokale_adresse);
    }

    pub fn lauscher(&self, name: &str) -> Option<LauscherInfo> {
        self.lauscher.get(name).map(|e| e.value().clone())
    }

    pub fn anzahl_lauscher(&self) -> usize {
        self.lauscher.len()
    }

    // --- Handler ---

    /// Registriert `handler` fuer `code`
    ///
    /// Ein vorhandener Handler fuer denselben Code wird ersetzt.
    pub fn handler_registrieren<H>(&self, code: NachrichtenCode, handler: H)
    where
        H: NachrichtenHandler,
    {
        self.handler.write().setzen(code, Arc::new(handler));
    }

    /// Hoechster registrierter Code, `None` solange kein Handler existiert
    pub fn handler_max_code(&self) -> Option<NachrichtenCode> {
        self.handler.read().max_code
    }

    pub fn hat_handler(&self, code: NachrichtenCode) -> bool {
        self.handler.read().holen(code).is_some()
    }

    /// Ruft den Handler fuer den Code der Nachricht auf
    ///
    /// Nachrichten ohne Handler werden stillschweigend verworfen. Gibt
    /// zurueck, ob ein Handler lief.
    pub async fn dispatch(&self, verbindung: &Arc<Verbindung>, nachricht: Nachricht) -> bool {
        // Lock vor dem await freigeben
        let handler = self.handler.read().holen(nachricht.code());

        match handler {
            Some(handler) => {
                self.metriken
                    .nachrichten_total
                    .with_label_values(&[ERGEBNIS_ZUGESTELLT])
                    .inc();
                handler.behandeln(Arc::clone(verbindung), nachricht).await;
                true
            }
            None => {
                self.metriken
                    .nachrichten_total
                    .with_label_values(&[ERGEBNIS_VERWORFEN])
                    .inc();
                false
            }
        }
    }

    // --- Status ---

    /// Reicht eine Statusmeldung an den Melder weiter und zaehlt sie
    pub(crate) fn melden(&self, melder: &dyn StatusMelder, meldung: Statusmeldung) -> Fortsetzung {
        self.metriken
            .statusmeldungen_total
            .with_label_values(&[meldung.ereignis.als_str()])
            .inc();
        melder.melden(&meldung)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn register() -> Verbindungsregister {
        Verbindungsregister::neu(GateMetrics::neu().unwrap())
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:5000".parse().unwrap()
    }

    fn anlegen(reg: &Verbindungsregister, name: &str) -> Arc<Verbindung> {
        reg.registrieren(name, peer(), Box::new(tokio::io::sink()))
    }

    #[test]
    fn ids_beginnen_bei_eins_und_steigen() {
        let reg = register();
        let a = anlegen(&reg, "");
        let b = anlegen(&reg, "");
        reg.entfernen(b.id());
        let c = anlegen(&reg, "");

        assert_eq!(a.id(), VerbindungsId(1));
        assert_eq!(b.id(), VerbindungsId(2));
        assert_eq!(c.id(), VerbindungsId(3));
        assert_eq!(reg.verbindungs_ids(), vec![VerbindungsId(1), VerbindungsId(3)]);
    }

    #[test]
    fn benannte_verbindung_per_name_auffindbar() {
        let reg = register();
        let v = anlegen(&reg, "peer1");
        let anonym = anlegen(&reg, "");

        assert_eq!(reg.nach_name("peer1").unwrap().id(), v.id());
        assert!(reg.nach_name("").is_none());
        assert_eq!(reg.nach_id(anonym.id()).unwrap().id(), anonym.id());
    }

    #[test]
    fn entfernen_ist_idempotent() {
        let reg = register();
        let v = anlegen(&reg, "peer1");

        assert!(reg.entfernen(v.id()).is_some());
        assert!(reg.entfernen(v.id()).is_none());
        assert!(reg.entfernen(v.id()).is_none());
        assert!(reg.nach_id(v.id()).is_none());
        assert!(reg.nach_name("peer1").is_none());
        assert_eq!(reg.anzahl_verbindungen(), 0);
    }

    #[test]
    fn doppelter_name_letzter_gewinnt() {
        let reg = register();
        let alt = anlegen(&reg, "peer1");
        let neu = anlegen(&reg, "peer1");

        assert_eq!(reg.nach_name("peer1").unwrap().id(), neu.id());

        // Entfernen der alten Verbindung laesst den neuen Namenseintrag stehen
        reg.entfernen(alt.id());
        assert_eq!(reg.nach_name("peer1").unwrap().id(), neu.id());
    }

    #[test]
    fn metrik_folgt_verbindungsanzahl() {
        let reg = register();
        let a = anlegen(&reg, "");
        anlegen(&reg, "");
        assert_eq!(reg.metriken().aktive_verbindungen.get(), 2);
        reg.entfernen(a.id());
        assert_eq!(reg.metriken().aktive_verbindungen.get(), 1);
    }

    #[test]
    fn lauscher_austragen_nur_bei_passender_adresse() {
        let reg = register();
        let info = LauscherInfo {
            transport: "tcp".into(),
            adresse: ":8001".into(),
            lokale_adresse: "0.0.0.0:8001".parse().unwrap(),
        };
        reg.lauscher_eintragen("main", info.clone());

        reg.lauscher_austragen("main", "0.0.0.0:9999".parse().unwrap());
        assert_eq!(reg.lauscher("main"), Some(info.clone()));

        reg.lauscher_austragen("main", info.lokale_adresse);
        assert!(reg.lauscher("main").is_none());
    }

    #[test]
    fn handler_max_code_waechst() {
        let reg = register();
        assert_eq!(reg.handler_max_code(), None);

        reg.handler_registrieren(5, |_v: Arc<Verbindung>, _n: Nachricht| async {});
        reg.handler_registrieren(2, |_v: Arc<Verbindung>, _n: Nachricht| async {});
        assert_eq!(reg.handler_max_code(), Some(5));
        assert!(reg.hat_handler(2));
        assert!(!reg.hat_handler(3));
        assert!(!reg.hat_handler(6));
    }

    #[tokio::test]
    async fn dispatch_unbekannter_code_wird_verworfen() {
        let reg = register();
        let v = anlegen(&reg, "");
        let zaehler = Arc::new(AtomicUsize::new(0));

        let z = Arc::clone(&zaehler);
        reg.handler_registrieren(1, move |_v: Arc<Verbindung>, _n: Nachricht| {
            let z = Arc::clone(&z);
            async move {
                z.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(!reg.dispatch(&v, Nachricht::neu(0, &b""[..])).await);
        assert!(!reg.dispatch(&v, Nachricht::neu(7, &b""[..])).await);
        assert!(!reg.dispatch(&v, Nachricht::neu(u16::MAX, &b""[..])).await);
        assert!(reg.dispatch(&v, Nachricht::neu(1, &b""[..])).await);
        assert_eq!(zaehler.load(Ordering::SeqCst), 1);

        let verworfen = reg
            .metriken()
            .nachrichten_total
            .with_label_values(&[ERGEBNIS_VERWORFEN])
            .get();
        assert_eq!(verworfen, 3);
    }

    #[tokio::test]
    async fn zweite_registrierung_ersetzt_handler() {
        let reg = register();
        let v = anlegen(&reg, "");
        let erster = Arc::new(AtomicUsize::new(0));
        let zweiter = Arc::new(AtomicUsize::new(0));

        let e = Arc::clone(&erster);
        reg.handler_registrieren(3, move |_v: Arc<Verbindung>, _n: Nachricht| {
            let e = Arc::clone(&e);
            async move {
                e.fetch_add(1, Ordering::SeqCst);
            }
        });
        let z = Arc::clone(&zweiter);
        reg.handler_registrieren(3, move |_v: Arc<Verbindung>, _n: Nachricht| {
            let z = Arc::clone(&z);
            async move {
                z.fetch_add(1, Ordering::SeqCst);
            }
        });

        reg.dispatch(&v, Nachricht::neu(3, &b"x"[..])).await;
        reg.dispatch(&v, Nachricht::neu(3, &b"y"[..])).await;

        assert_eq!(erster.load(Ordering::SeqCst), 0);
        assert_eq!(zweiter.load(Ordering::SeqCst), 2);
    }
}
