use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant};

/// Exit status used when the liveness timeout expires, distinct from a crash
/// so the supervisor can tell the two apart.
pub const WATCHDOG_EXIT_CODE: i32 = 3;

const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Handle to the liveness watchdog task. Without a [`Watchdog::ping`] within
/// the configured timeout the process exits. `ping` and `stop` never block
/// the caller.
#[derive(Clone)]
pub struct Watchdog {
    ping_tx: mpsc::Sender<()>,
    stop_tx: mpsc::Sender<()>,
}

impl Watchdog {
    pub fn spawn(timeout: Duration) -> Self {
        Self::spawn_with(timeout, POLL_INTERVAL, move |elapsed| {
            log::error!(
                "Last ping ({}s ago) is older than the allowed timeout ({}s). Exit!",
                elapsed.as_secs(),
                timeout.as_secs()
            );
            std::process::exit(WATCHDOG_EXIT_CODE);
        })
    }

    fn spawn_with(
        timeout: Duration,
        poll: Duration,
        on_expiry: impl FnMut(Duration) + Send + 'static,
    ) -> Self {
        let (ping_tx, ping_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = mpsc::channel(1);
        tokio::spawn(run_loop(timeout, poll, ping_rx, stop_rx, on_expiry));
        Self { ping_tx, stop_tx }
    }

    /// Resets the liveness deadline. A ping already in flight counts.
    pub fn ping(&self) {
        let _ = self.ping_tx.try_send(());
    }

    /// Transitions the watchdog to its terminal state and halts the timer.
    pub fn stop(&self) {
        log::info!("Stopping watchdog");
        let _ = self.stop_tx.try_send(());
    }
}

async fn run_loop(
    timeout: Duration,
    poll: Duration,
    mut ping_rx: mpsc::Receiver<()>,
    mut stop_rx: mpsc::Receiver<()>,
    mut on_expiry: impl FnMut(Duration),
) {
    let mut timer = interval(poll);
    let mut last_ping = Instant::now();

    loop {
        tokio::select! {
            _ = timer.tick() => {
                let elapsed = last_ping.elapsed();
                if elapsed > timeout {
                    on_expiry(elapsed);
                }
            }
            Some(_) = ping_rx.recv() => {
                last_ping = Instant::now();
            }
            Some(_) = stop_rx.recv() => {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn spawn_counting(timeout: Duration, poll: Duration) -> (Watchdog, Arc<AtomicUsize>) {
        let expiries = Arc::new(AtomicUsize::new(0));
        let counter = expiries.clone();
        let watchdog =
            Watchdog::spawn_with(timeout, poll, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        (watchdog, expiries)
    }

    #[tokio::test(start_paused = true)]
    async fn expires_without_pings() {
        let (_watchdog, expiries) = spawn_counting(Duration::from_secs(5), Duration::from_secs(1));
        sleep(Duration::from_secs(8)).await;
        assert!(expiries.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pings_stave_off_expiry() {
        let (watchdog, expiries) = spawn_counting(Duration::from_secs(5), Duration::from_secs(1));
        for _ in 0..10 {
            sleep(Duration::from_secs(3)).await;
            watchdog.ping();
        }
        assert_eq!(expiries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_terminal() {
        let (watchdog, expiries) = spawn_counting(Duration::from_secs(5), Duration::from_secs(1));
        watchdog.stop();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(expiries.load(Ordering::SeqCst), 0);
        // stopping twice must not block or panic
        watchdog.stop();
    }
}
