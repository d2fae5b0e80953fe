//! Leseschleife pro Verbindung
//!
//! Liest Frame fuer Frame und ruft den passenden Handler auf. Eine Nachricht
//! wird erst gelesen, wenn der Handler der vorherigen fertig ist. Der einzige
//! Ausstieg ist ein Lesefehler; danach folgen `pre close`, das Schliessen
//! des Sockets und das Austragen aus dem Register.

use bytes::BytesMut;
use gate_core::{StatusEreignis, StatusMelder, Statusmeldung};
use gate_protocol::wire::read_frame;
use std::sync::Arc;
use tokio::io::AsyncRead;

use crate::connection::Verbindung;
use crate::registry::Verbindungsregister;

/// Startkapazitaet des Lesepuffers
const LESEPUFFER_START: usize = 4 * 1024;

/// Treibt eine Verbindung bis zu ihrem Ende
///
/// `leser` ist die Lesehaelfte des Sockets; sie wird vor dem Schliessen der
/// Schreibhaelfte freigegeben.
pub async fn leseschleife<R>(
    register: Arc<Verbindungsregister>,
    verbindung: Arc<Verbindung>,
    leser: R,
    melder: Arc<dyn StatusMelder>,
) where
    R: AsyncRead + Unpin + Send,
{
    let id = verbindung.id();
    let name = verbindung.name().to_string();
    let mut leser = leser;
    let mut puffer = BytesMut::with_capacity(LESEPUFFER_START);

    loop {
        match read_frame(&mut leser, &mut puffer, register.max_frame_size()).await {
            Ok(nachricht) => {
                register.dispatch(&verbindung, nachricht).await;
            }
            Err(e) => {
                register.melden(
                    &*melder,
                    Statusmeldung::neu(StatusEreignis::LesenFehlgeschlagen, &name, id, e.to_string()),
                );
                break;
            }
        }
    }

    register.melden(
        &*melder,
        Statusmeldung::neu(StatusEreignis::VorSchliessen, &name, id, ""),
    );

    drop(leser);
    let meldung = match verbindung.schliessen().await {
        Ok(()) => Statusmeldung::neu(StatusEreignis::SchliessenOk, &name, id, ""),
        Err(e) => Statusmeldung::neu(
            StatusEreignis::SchliessenFehlgeschlagen,
            &name,
            id,
            e.to_string(),
        ),
    };
    register.melden(&*melder, meldung);

    register.entfernen(id);
    tracing::trace!(verbindung = %id, "Leseschleife beendet");
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_core::Fortsetzung;
    use gate_observability::GateMetrics;
    use gate_protocol::wire::{write_frame, Nachricht, DEFAULT_MAX_FRAME_SIZE};
    use parking_lot::Mutex;
    use tokio::io::AsyncWriteExt;

    /// Melder, der alle Ereignisse mitschreibt
    #[derive(Default)]
    struct Mitschrift {
        ereignisse: Mutex<Vec<StatusEreignis>>,
    }

    impl StatusMelder for Mitschrift {
        fn melden(&self, meldung: &Statusmeldung) -> Fortsetzung {
            self.ereignisse.lock().push(meldung.ereignis);
            Fortsetzung::Weiter
        }
    }

    #[tokio::test]
    async fn reihenfolge_und_ende_bei_eof() {
        let register = Arc::new(Verbindungsregister::neu(GateMetrics::neu().unwrap()));
        let empfangen = Arc::new(Mutex::new(Vec::new()));

        let e = Arc::clone(&empfangen);
        register.handler_registrieren(1, move |_v: Arc<Verbindung>, n: Nachricht| {
            let e = Arc::clone(&e);
            async move {
                // Laengerer Handler darf die Reihenfolge nicht aendern
                tokio::task::yield_now().await;
                e.lock().push(n.nutzdaten().clone());
            }
        });

        let verbindung = register.registrieren(
            "",
            "127.0.0.1:1".parse().unwrap(),
            Box::new(tokio::io::sink()),
        );
        let (mut gegenstelle, leser) = tokio::io::duplex(1024);
        let mitschrift = Arc::new(Mitschrift::default());

        let schleife = tokio::spawn(leseschleife(
            Arc::clone(&register),
            Arc::clone(&verbindung),
            leser,
            mitschrift.clone(),
        ));

        for text in [&b"a"[..], &b"b"[..], &b"c"[..]] {
            write_frame(&mut gegenstelle, &Nachricht::neu(1, text), DEFAULT_MAX_FRAME_SIZE)
                .await
                .unwrap();
        }
        // Unbekannter Code beendet die Schleife nicht
        write_frame(&mut gegenstelle, &Nachricht::neu(99, &b"?"[..]), DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap();
        gegenstelle.shutdown().await.unwrap();
        drop(gegenstelle);

        schleife.await.unwrap();

        let texte: Vec<_> = empfangen.lock().iter().map(|b| b.to_vec()).collect();
        assert_eq!(texte, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

        assert_eq!(
            *mitschrift.ereignisse.lock(),
            vec![
                StatusEreignis::LesenFehlgeschlagen,
                StatusEreignis::VorSchliessen,
                StatusEreignis::SchliessenOk,
            ]
        );
        assert!(register.nach_id(verbindung.id()).is_none());
        assert!(!verbindung.ist_offen().await);
    }

    #[tokio::test]
    async fn ungueltiger_frame_beendet_verbindung() {
        let register = Arc::new(Verbindungsregister::neu(GateMetrics::neu().unwrap()));
        let verbindung = register.registrieren(
            "peer1",
            "127.0.0.1:1".parse().unwrap(),
            Box::new(tokio::io::sink()),
        );
        let (mut gegenstelle, leser) = tokio::io::duplex(64);
        let mitschrift = Arc::new(Mitschrift::default());

        // Laenge 1 ist kleiner als das Code-Feld
        gegenstelle.write_all(&[0, 0, 0, 1, 0]).await.unwrap();

        leseschleife(Arc::clone(&register), verbindung, leser, mitschrift.clone()).await;

        assert_eq!(mitschrift.ereignisse.lock()[0], StatusEreignis::LesenFehlgeschlagen);
        assert!(register.nach_name("peer1").is_none());
    }
}
