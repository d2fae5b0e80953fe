//! TCP-Engine – Listen und Connect
//!
//! Das `Gateway` oeffnet Listener und ausgehende Verbindungen, meldet jeden
//! Schritt ueber den `StatusMelder` des Aufrufers und startet fuer jede
//! aufgebaute Verbindung eine Leseschleife als gezaehlten Task.
//!
//! ## Adressen
//! Transport ist `tcp`, `tcp4` oder `tcp6`. Eine Adresse ohne Host
//! (`:8001`) bedeutet beim Lauschen "alle Interfaces" und beim Verbinden
//! "localhost" der jeweiligen Adressfamilie. Mit `tcp` wird zuerst `[::]`
//! versucht (Dual-Stack, sofern das System IPv4-mapped erlaubt), danach
//! `0.0.0.0`.

use gate_core::{
    Fortsetzung, GateError, GateResult, StatusEreignis, StatusMelder, Statusmeldung, VerbindungsId,
};
use futures_util::future::BoxFuture;
use gate_observability::metrics::{RICHTUNG_AUSGEHEND, RICHTUNG_EINGEHEND};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::dispatch::leseschleife;
use crate::registry::{LauscherInfo, Verbindungsregister};
use crate::shutdown::TaskZaehler;

/// Pause nach einem Accept-Fehler, bevor erneut angenommen wird
const ACCEPT_FEHLER_PAUSE: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Adressaufloesung
// ---------------------------------------------------------------------------

/// Adressfamilie laut Transport-Angabe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Familie {
    Beliebig,
    V4,
    V6,
}

impl Familie {
    pub fn aus_transport(transport: &str) -> GateResult<Self> {
        match transport {
            "tcp" => Ok(Self::Beliebig),
            "tcp4" => Ok(Self::V4),
            "tcp6" => Ok(Self::V6),
            andere => Err(GateError::UnbekannterTransport(andere.to_string())),
        }
    }

    fn passt(&self, adresse: &SocketAddr) -> bool {
        match self {
            Self::Beliebig => true,
            Self::V4 => adresse.is_ipv4(),
            Self::V6 => adresse.is_ipv6(),
        }
    }
}

/// Ergaenzt einen fehlenden Host (`:port`), in Bind-Reihenfolge
fn host_ergaenzen(adresse: &str, familie: Familie, lauschen: bool) -> Vec<String> {
    if !adresse.starts_with(':') {
        return vec![adresse.to_string()];
    }
    let hosts: &[&str] = match (familie, lauschen) {
        (Familie::Beliebig, true) => &["[::]", "0.0.0.0"],
        (Familie::V6, true) => &["[::]"],
        (Familie::V6, false) => &["[::1]"],
        (Familie::V4, true) => &["0.0.0.0"],
        (_, false) => &["127.0.0.1"],
    };
    hosts.iter().map(|host| format!("{host}{adresse}")).collect()
}

/// Loest `adresse` fuer den gegebenen Transport auf
pub async fn adresse_aufloesen(
    transport: &str,
    adresse: &str,
    lauschen: bool,
) -> GateResult<Vec<SocketAddr>> {
    let familie = Familie::aus_transport(transport)?;

    let mut adressen: Vec<SocketAddr> = Vec::new();
    for ziel in host_ergaenzen(adresse, familie, lauschen) {
        let gefunden = tokio::net::lookup_host(ziel.as_str())
            .await
            .map_err(|quelle| GateError::Aufloesung {
                adresse: adresse.to_string(),
                quelle,
            })?;
        adressen.extend(gefunden.filter(|a| familie.passt(a)));
    }

    if adressen.is_empty() {
        return Err(GateError::KeineAdresse {
            adresse: adresse.to_string(),
            transport: transport.to_string(),
        });
    }
    Ok(adressen)
}

fn pflicht(wert: &str, feld: &'static str) -> GateResult<()> {
    if wert.is_empty() {
        Err(GateError::LeereAngabe(feld))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Annahme
// ---------------------------------------------------------------------------

/// Quelle eingehender Verbindungen fuer die Accept-Schleife
pub(crate) trait Annahmequelle: Send + Sync {
    fn annehmen(&self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>>;
}

impl Annahmequelle for TcpListener {
    fn annehmen(&self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>> {
        Box::pin(self.accept())
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Listen/Connect-Engine ueber einem gemeinsamen Verbindungsregister
pub struct Gateway {
    register: Arc<Verbindungsregister>,
    aufgaben: TaskZaehler,
    shutdown_tx: watch::Sender<bool>,
}

impl Gateway {
    pub fn neu(register: Arc<Verbindungsregister>, aufgaben: TaskZaehler) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            register,
            aufgaben,
            shutdown_tx,
        }
    }

    pub fn register(&self) -> &Arc<Verbindungsregister> {
        &self.register
    }

    pub fn aufgaben(&self) -> &TaskZaehler {
        &self.aufgaben
    }

    /// Beendet alle Accept-Loops; bestehende Verbindungen bleiben offen
    pub fn herunterfahren(&self) {
        if !self.shutdown_tx.send_replace(true) {
            tracing::info!("Gateway: Listener werden beendet");
        }
    }

    pub fn faehrt_herunter(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    // --- Listen ---

    /// Oeffnet einen Listener und nimmt Verbindungen an
    ///
    /// Kehrt erst zurueck, wenn der Listener endet: nach `listen failed`,
    /// wenn der Melder nach `accept failed` `Stopp` liefert, oder nach
    /// `herunterfahren`.
    pub async fn lauschen(
        &self,
        name: &str,
        transport: &str,
        adresse: &str,
        melder: Arc<dyn StatusMelder>,
    ) {
        let listener = match Self::lauscher_oeffnen(transport, adresse).await {
            Ok(l) => l,
            Err(e) => {
                self.register.melden(
                    &*melder,
                    Statusmeldung::neu(
                        StatusEreignis::ListenFehlgeschlagen,
                        name,
                        VerbindungsId::KEINE,
                        e.to_string(),
                    ),
                );
                return;
            }
        };
        let lokale_adresse = match listener.local_addr() {
            Ok(a) => a,
            Err(e) => {
                self.register.melden(
                    &*melder,
                    Statusmeldung::neu(
                        StatusEreignis::ListenFehlgeschlagen,
                        name,
                        VerbindungsId::KEINE,
                        e.to_string(),
                    ),
                );
                return;
            }
        };

        let info = LauscherInfo {
            transport: transport.to_string(),
            adresse: adresse.to_string(),
            lokale_adresse,
        };
        self.annahme_betreiben(name, info, &listener, melder).await;
    }

    /// Traegt den Listener ein, meldet `listen ok` und nimmt an, bis der
    /// Melder `Stopp` liefert oder heruntergefahren wird
    pub(crate) async fn annahme_betreiben(
        &self,
        name: &str,
        info: LauscherInfo,
        quelle: &impl Annahmequelle,
        melder: Arc<dyn StatusMelder>,
    ) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let lokale_adresse = info.lokale_adresse;

        self.register.lauscher_eintragen(name, info);
        self.register.melden(
            &*melder,
            Statusmeldung::neu(StatusEreignis::ListenOk, name, VerbindungsId::KEINE, ""),
        );
        tracing::debug!(lauscher = name, adresse = %lokale_adresse, "Listener gestartet");

        while !*shutdown_rx.borrow() {
            tokio::select! {
                ergebnis = quelle.annehmen() => {
                    match ergebnis {
                        Ok((stream, peer_addr)) => {
                            self.verbindung_starten(
                                stream,
                                peer_addr,
                                "",
                                StatusEreignis::AcceptOk,
                                Arc::clone(&melder),
                            );
                        }
                        Err(e) => {
                            let weiter = self.register.melden(
                                &*melder,
                                Statusmeldung::neu(
                                    StatusEreignis::AcceptFehlgeschlagen,
                                    name,
                                    VerbindungsId::KEINE,
                                    e.to_string(),
                                ),
                            );
                            if weiter == Fortsetzung::Stopp {
                                break;
                            }
                            tokio::time::sleep(ACCEPT_FEHLER_PAUSE).await;
                        }
                    }
                }

                // Shutdown-Signal, Pruefung in der Schleifenbedingung
                Ok(()) = shutdown_rx.changed() => {}
            }
        }

        self.register.lauscher_austragen(name, lokale_adresse);
        tracing::debug!(lauscher = name, adresse = %lokale_adresse, "Listener gestoppt");
    }

    async fn lauscher_oeffnen(transport: &str, adresse: &str) -> GateResult<TcpListener> {
        pflicht(adresse, "adresse")?;
        pflicht(transport, "transport")?;

        let adressen = adresse_aufloesen(transport, adresse, true).await?;
        TcpListener::bind(&adressen[..])
            .await
            .map_err(|quelle| GateError::Bind {
                adresse: adresse.to_string(),
                quelle,
            })
    }

    // --- Connect ---

    /// Baut eine benannte ausgehende Verbindung auf (ein Versuch, kein Retry)
    ///
    /// Kehrt nach `connect ok` bzw. `connect failed` zurueck; die
    /// Leseschleife laeuft als eigener Task weiter.
    pub async fn verbinden(
        &self,
        name: &str,
        transport: &str,
        adresse: &str,
        melder: Arc<dyn StatusMelder>,
    ) {
        match Self::verbindung_oeffnen(name, transport, adresse).await {
            Ok(stream) => match stream.peer_addr() {
                Ok(peer_addr) => {
                    self.verbindung_starten(
                        stream,
                        peer_addr,
                        name,
                        StatusEreignis::ConnectOk,
                        melder,
                    );
                }
                Err(e) => {
                    self.register.melden(
                        &*melder,
                        Statusmeldung::neu(
                            StatusEreignis::ConnectFehlgeschlagen,
                            name,
                            VerbindungsId::KEINE,
                            e.to_string(),
                        ),
                    );
                }
            },
            Err(e) => {
                self.register.melden(
                    &*melder,
                    Statusmeldung::neu(
                        StatusEreignis::ConnectFehlgeschlagen,
                        name,
                        VerbindungsId::KEINE,
                        e.to_string(),
                    ),
                );
            }
        }
    }

    async fn verbindung_oeffnen(name: &str, transport: &str, adresse: &str) -> GateResult<TcpStream> {
        pflicht(adresse, "adresse")?;
        pflicht(transport, "transport")?;
        pflicht(name, "name")?;

        let adressen = adresse_aufloesen(transport, adresse, false).await?;
        TcpStream::connect(&adressen[..])
            .await
            .map_err(|quelle| GateError::Verbinden {
                adresse: adresse.to_string(),
                quelle,
            })
    }

    // --- Hintergrund ---

    /// `lauschen` als gezaehlter Hintergrund-Task
    pub fn lauschen_im_hintergrund(
        self: &Arc<Self>,
        name: impl Into<String>,
        transport: impl Into<String>,
        adresse: impl Into<String>,
        melder: Arc<dyn StatusMelder>,
    ) -> JoinHandle<()> {
        let gateway = Arc::clone(self);
        let (name, transport, adresse) = (name.into(), transport.into(), adresse.into());
        self.aufgaben.spawn(async move {
            gateway.lauschen(&name, &transport, &adresse, melder).await;
        })
    }

    /// `verbinden` als gezaehlter Hintergrund-Task
    pub fn verbinden_im_hintergrund(
        self: &Arc<Self>,
        name: impl Into<String>,
        transport: impl Into<String>,
        adresse: impl Into<String>,
        melder: Arc<dyn StatusMelder>,
    ) -> JoinHandle<()> {
        let gateway = Arc::clone(self);
        let (name, transport, adresse) = (name.into(), transport.into(), adresse.into());
        self.aufgaben.spawn(async move {
            gateway.verbinden(&name, &transport, &adresse, melder).await;
        })
    }

    // --- Intern ---

    /// Registriert den Socket, meldet `ereignis` und startet die Leseschleife
    fn verbindung_starten(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        name: &str,
        ereignis: StatusEreignis,
        melder: Arc<dyn StatusMelder>,
    ) {
        let (leser, schreiber) = stream.into_split();
        let verbindung = self
            .register
            .registrieren(name, peer_addr, Box::new(schreiber));

        let richtung = if ereignis == StatusEreignis::AcceptOk {
            RICHTUNG_EINGEHEND
        } else {
            RICHTUNG_AUSGEHEND
        };
        self.register
            .metriken()
            .verbindungen_total
            .with_label_values(&[richtung])
            .inc();

        self.register.melden(
            &*melder,
            Statusmeldung::neu(ereignis, name, verbindung.id(), ""),
        );
        tracing::trace!(verbindung = %verbindung.id(), peer = %peer_addr, "Leseschleife startet");

        self.aufgaben.spawn(leseschleife(
            Arc::clone(&self.register),
            verbindung,
            leser,
            melder,
        ));
    }
}
