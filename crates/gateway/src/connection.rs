//! Verbindungs-Datensatz
//!
//! Eine `Verbindung` existiert genau einmal pro offenem Socket. Sie haelt die
//! Identitaet (ID, optionaler Name) und die Schreibhaelfte des Sockets. Die
//! Lesehaelfte gehoert exklusiv der Leseschleife der Verbindung.

use bytes::Bytes;
use gate_core::{NachrichtenCode, VerbindungsId};
use gate_protocol::wire::{write_frame, Nachricht};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Schreibhaelfte eines Sockets (oder ein beliebiger Writer in Tests)
pub type Schreiber = Box<dyn AsyncWrite + Send + Unpin>;

/// Eine registrierte Verbindung (eingehend oder ausgehend)
pub struct Verbindung {
    id: VerbindungsId,
    /// Leer ausser bei benannten ausgehenden Verbindungen
    name: String,
    peer_addr: SocketAddr,
    max_frame_size: usize,
    /// `None` nach dem Schliessen
    schreiber: Mutex<Option<Schreiber>>,
}

impl Verbindung {
    pub(crate) fn neu(
        id: VerbindungsId,
        name: String,
        peer_addr: SocketAddr,
        schreiber: Schreiber,
        max_frame_size: usize,
    ) -> Self {
        Self {
            id,
            name,
            peer_addr,
            max_frame_size,
            schreiber: Mutex::new(Some(schreiber)),
        }
    }

    pub fn id(&self) -> VerbindungsId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// true fuer benannte (ausgehende) Verbindungen
    pub fn ist_benannt(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Name oder `Conn[<id>]`
    pub fn anzeigename(&self) -> String {
        if self.ist_benannt() {
            self.name.clone()
        } else {
            self.id.to_string()
        }
    }

    /// Sendet eine Nachricht an die Gegenstelle
    ///
    /// Gleichzeitige Aufrufe werden serialisiert, Frames vermischen sich nie.
    /// Nach `schliessen` schlaegt jeder Aufruf mit `NotConnected` fehl.
    pub async fn senden(
        &self,
        code: NachrichtenCode,
        nutzdaten: impl Into<Bytes>,
    ) -> io::Result<()> {
        let nachricht = Nachricht::neu(code, nutzdaten);
        let mut schreiber = self.schreiber.lock().await;
        match schreiber.as_mut() {
            Some(w) => write_frame(w, &nachricht, self.max_frame_size).await,
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} ist geschlossen", self.anzeigename()),
            )),
        }
    }

    /// Schliesst die Schreibhaelfte
    ///
    /// Ein zweiter Aufruf ist wirkungslos und liefert `Ok(())`.
    pub async fn schliessen(&self) -> io::Result<()> {
        let schreiber = self.schreiber.lock().await.take();
        match schreiber {
            Some(mut w) => w.shutdown().await,
            None => Ok(()),
        }
    }

    /// true solange die Schreibhaelfte offen ist
    pub async fn ist_offen(&self) -> bool {
        self.schreiber.lock().await.is_some()
    }
}

impl std::fmt::Debug for Verbindung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verbindung")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use gate_protocol::wire::{read_frame, DEFAULT_MAX_FRAME_SIZE};

    fn peer() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[tokio::test]
    async fn senden_schreibt_frame() {
        let (client, mut server) = tokio::io::duplex(256);
        let v = Verbindung::neu(
            VerbindungsId(1),
            String::new(),
            peer(),
            Box::new(client),
            DEFAULT_MAX_FRAME_SIZE,
        );

        v.senden(42, &b"hallo"[..]).await.unwrap();

        let mut puffer = BytesMut::new();
        let n = read_frame(&mut server, &mut puffer, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap();
        assert_eq!(n.code(), 42);
        assert_eq!(&n.nutzdaten()[..], b"hallo");
    }

    #[tokio::test]
    async fn senden_nach_schliessen_schlaegt_fehl() {
        let v = Verbindung::neu(
            VerbindungsId(2),
            "peer1".into(),
            peer(),
            Box::new(tokio::io::sink()),
            DEFAULT_MAX_FRAME_SIZE,
        );
        assert!(v.ist_offen().await);

        v.schliessen().await.unwrap();
        assert!(!v.ist_offen().await);

        let err = v.senden(1, Bytes::new()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(err.to_string().contains("peer1"));

        // Zweites Schliessen ist wirkungslos
        v.schliessen().await.unwrap();
    }

    #[test]
    fn anzeigename_ohne_namen() {
        let v = Verbindung::neu(
            VerbindungsId(9),
            String::new(),
            peer(),
            Box::new(tokio::io::sink()),
            DEFAULT_MAX_FRAME_SIZE,
        );
        assert!(!v.ist_benannt());
        assert_eq!(v.anzeigename(), "Conn[9]");
    }
}
