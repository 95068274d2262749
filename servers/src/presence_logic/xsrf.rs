use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant};
use uuid::Uuid;

/// A token older than this is rejected and eventually swept.
const TOKEN_LIFETIME: Duration = Duration::from_secs(20 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(20 * 60);

struct TokenEntry {
    value: String,
    created: Instant,
}

/// Anti-forgery tokens keyed by requester address: issued on the overview
/// request, consumed (match or not) by the change request. The sweep task
/// has an explicit lifecycle; the owner calls [`XsrfStore::stop`] on
/// shutdown rather than relying on drop timing.
pub struct XsrfStore {
    tokens: Arc<Mutex<HashMap<String, TokenEntry>>>,
    stop_tx: mpsc::Sender<()>,
}

impl XsrfStore {
    pub fn new() -> Self {
        let tokens: Arc<Mutex<HashMap<String, TokenEntry>>> = Arc::new(Mutex::new(HashMap::new()));
        let (stop_tx, mut stop_rx) = mpsc::channel(1);

        let sweep_tokens = Arc::clone(&tokens);
        tokio::spawn(async move {
            let mut timer = interval(SWEEP_INTERVAL);
            timer.tick().await; // the first tick completes immediately
            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    _ = timer.tick() => {
                        let mut tokens = sweep_tokens.lock().expect("token store lock poisoned");
                        tokens.retain(|_, entry| entry.created.elapsed() < TOKEN_LIFETIME);
                    }
                }
            }
        });

        Self { tokens, stop_tx }
    }

    /// Issues a fresh token for the address, replacing any previous one.
    pub fn new_token(&self, address: &str) -> String {
        let value = Uuid::new_v4().simple().to_string();
        let mut tokens = self.tokens.lock().expect("token store lock poisoned");
        tokens.insert(
            address.to_string(),
            TokenEntry { value: value.clone(), created: Instant::now() },
        );
        value
    }

    /// True if the given token matches the one stored for the address and is
    /// still within its lifetime. The stored entry is removed either way:
    /// checking always consumes.
    pub fn check_and_clear(&self, address: &str, token: &str) -> bool {
        let mut tokens = self.tokens.lock().expect("token store lock poisoned");
        match tokens.remove(address) {
            Some(entry) => entry.created.elapsed() < TOKEN_LIFETIME && entry.value == token,
            None => false,
        }
    }

    /// Halts the sweep task. Never blocks the caller.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn tokens_are_single_use() {
        let store = XsrfStore::new();
        let token = store.new_token("10.1.1.1");
        assert!(store.check_and_clear("10.1.1.1", &token));
        // consumed: the same token never matches twice
        assert!(!store.check_and_clear("10.1.1.1", &token));
    }

    #[tokio::test]
    async fn a_mismatch_also_consumes_the_token() {
        let store = XsrfStore::new();
        let token = store.new_token("10.1.1.1");
        assert!(!store.check_and_clear("10.1.1.1", "wrong"));
        assert!(!store.check_and_clear("10.1.1.1", &token));
    }

    #[tokio::test]
    async fn tokens_are_bound_to_the_requester_address() {
        let store = XsrfStore::new();
        let token = store.new_token("10.1.1.1");
        assert!(!store.check_and_clear("10.1.1.2", &token));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_tokens_never_match() {
        let store = XsrfStore::new();
        let token = store.new_token("10.1.1.1");
        sleep(TOKEN_LIFETIME + Duration::from_secs(1)).await;
        assert!(!store.check_and_clear("10.1.1.1", &token));
        store.stop();
    }
}
