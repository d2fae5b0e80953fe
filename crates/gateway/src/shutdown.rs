//! Task-Zaehlung und Ruheerkennung
//!
//! Jeder Task, den das Gateway startet (Accept-Loops, Dial-Tasks,
//! Leseschleifen), laeuft ueber einen [`TaskZaehler`]. Ein Waechter im Task
//! zaehlt beim Start hoch und beim Ende (auch bei Abbruch) wieder herunter.
//!
//! Der [`Ruhewaechter`] merkt sich beim Erzeugen den aktuellen Stand als
//! Basis und pollt, bis der Zaehler wieder dort angekommen ist.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Standard-Pollintervall des Ruhewaechters
pub const STANDARD_RUHE_INTERVALL: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// TaskZaehler
// ---------------------------------------------------------------------------

/// Zaehlt laufende Gateway-Tasks
#[derive(Clone, Default)]
pub struct TaskZaehler {
    aktiv: Arc<AtomicUsize>,
}

impl TaskZaehler {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Anzahl gerade laufender Tasks
    pub fn aktiv(&self) -> usize {
        self.aktiv.load(Ordering::SeqCst)
    }

    /// Startet `future` als gezaehlten Task
    ///
    /// Der Zaehler steigt sofort, nicht erst beim ersten Poll.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let waechter = self.waechter();
        tokio::spawn(async move {
            let _waechter = waechter;
            future.await
        })
    }

    fn waechter(&self) -> TaskWaechter {
        self.aktiv.fetch_add(1, Ordering::SeqCst);
        TaskWaechter {
            aktiv: Arc::clone(&self.aktiv),
        }
    }
}

/// Zaehlt beim Drop herunter
struct TaskWaechter {
    aktiv: Arc<AtomicUsize>,
}

impl Drop for TaskWaechter {
    fn drop(&mut self) {
        self.aktiv.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Ruhewaechter
// ---------------------------------------------------------------------------

/// Erkennt, wann alle seit dem Erzeugen gestarteten Tasks beendet sind
pub struct Ruhewaechter {
    zaehler: TaskZaehler,
    basis: usize,
    intervall: Duration,
}

impl Ruhewaechter {
    /// Nimmt den aktuellen Zaehlerstand als Basis
    pub fn neu(zaehler: TaskZaehler, intervall: Duration) -> Self {
        let basis = zaehler.aktiv();
        Self {
            zaehler,
            basis,
            intervall,
        }
    }

    pub fn basis(&self) -> usize {
        self.basis
    }

    pub fn intervall(&self) -> Duration {
        self.intervall
    }

    /// true, wenn der Zaehler (wieder) auf der Basis steht
    pub fn ist_ruhig(&self) -> bool {
        self.zaehler.aktiv() <= self.basis
    }

    /// Wartet, bis der Prozess ruhig ist
    ///
    /// Geprueft wird jeweils nach Ablauf eines Intervalls, daher kehrt die
    /// Methode spaetestens ein Intervall nach dem Ende des letzten Tasks
    /// zurueck. Es gibt kein Timeout.
    pub async fn warten(&self) {
        let start = Instant::now() + self.intervall;
        let mut takt = interval_at(start, self.intervall);
        takt.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            takt.tick().await;
            let aktiv = self.zaehler.aktiv();
            if aktiv <= self.basis {
                break;
            }
            tracing::trace!(aktiv, basis = self.basis, "Noch nicht ruhig");
        }

        tracing::info!("bye bye.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zaehler_steigt_und_faellt() {
        let zaehler = TaskZaehler::neu();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = zaehler.spawn(async move {
            let _ = rx.await;
        });
        assert_eq!(zaehler.aktiv(), 1);

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(zaehler.aktiv(), 0);
    }

    #[tokio::test]
    async fn abgebrochener_task_zaehlt_herunter() {
        let zaehler = TaskZaehler::neu();
        let handle = zaehler.spawn(std::future::pending::<()>());
        assert_eq!(zaehler.aktiv(), 1);

        handle.abort();
        let _ = handle.await;
        assert_eq!(zaehler.aktiv(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ruhe_innerhalb_eines_intervalls() {
        let zaehler = TaskZaehler::neu();
        let waechter = Ruhewaechter::neu(zaehler.clone(), Duration::from_secs(2));
        assert_eq!(waechter.basis(), 0);

        zaehler.spawn(tokio::time::sleep(Duration::from_secs(3)));
        assert!(!waechter.ist_ruhig());

        let start = Instant::now();
        waechter.warten().await;
        let dauer = start.elapsed();

        assert!(dauer >= Duration::from_secs(3));
        assert!(dauer <= Duration::from_secs(5));
        assert!(waechter.ist_ruhig());
    }

    #[tokio::test(start_paused = true)]
    async fn basis_ignoriert_fruehere_tasks() {
        let zaehler = TaskZaehler::neu();
        let (_tx, rx) = tokio::sync::oneshot::channel::<()>();
        zaehler.spawn(async move {
            let _ = rx.await;
        });

        let waechter = Ruhewaechter::neu(zaehler.clone(), Duration::from_secs(2));
        assert_eq!(waechter.basis(), 1);

        let start = Instant::now();
        waechter.warten().await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }
}
