use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative shutdown signal shared by every worker in the pool.
///
/// Workers check the token once per update cycle, at the cycle boundary, so a
/// request never interrupts an in-flight pass over an object table: each
/// worker always finishes its current cycle before exiting. Acquire/release
/// ordering is enough because a one-cycle observation lag is acceptable.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Callable from any thread, including from inside a
    /// script entry point via the host API.
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear_and_latches() {
        let token = StopToken::new();
        assert!(!token.is_requested());
        token.request();
        assert!(token.is_requested());
        token.request();
        assert!(token.is_requested(), "request is idempotent");
    }

    #[test]
    fn clones_share_the_flag() {
        let token = StopToken::new();
        let observer = token.clone();
        token.request();
        assert!(observer.is_requested());
    }
}
