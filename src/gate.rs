use std::sync::{Arc, OnceLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fair counting semaphore bounding the number of concurrent compressions.
/// `tokio::sync::Semaphore` is itself FIFO across waiters, so that
/// guarantee comes for free.
#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyGate {
    pub fn new(permits: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// `clamp(num_cpus - 1, 1, 3)` — the cap of 3 reflects the memory cost
    /// of concurrent full decodes.
    pub fn with_default_permits() -> Self {
        let permits = num_cpus::get().saturating_sub(1).clamp(1, 3);
        Self::new(permits)
    }

    /// The process-global instance, lazily initialized on first use and
    /// never torn down.
    pub fn shared() -> &'static ConcurrencyGate {
        static GATE: OnceLock<ConcurrencyGate> = OnceLock::new();
        GATE.get_or_init(ConcurrencyGate::with_default_permits)
    }

    /// Acquire one permit. Held until the returned guard is dropped, which
    /// happens on every exit path — success, error, or the future being
    /// cancelled mid-await.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("ConcurrencyGate semaphore is never closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn caps_concurrent_holders_at_permit_count() {
        let gate = ConcurrencyGate::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let running = running.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire().await;
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn releases_permit_when_guard_dropped() {
        let gate = ConcurrencyGate::new(1);
        {
            let _permit = gate.acquire().await;
        }
        let _permit = tokio::time::timeout(Duration::from_millis(50), gate.acquire())
            .await
            .expect("permit should be available again after first guard dropped");
    }

    #[test]
    fn default_permits_are_clamped_between_1_and_3() {
        let gate = ConcurrencyGate::with_default_permits();
        assert!(gate.semaphore.available_permits() >= 1);
        assert!(gate.semaphore.available_permits() <= 3);
    }
}
