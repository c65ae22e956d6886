//! User notification surface
//!
//! A single active alert at a time. Raising a new alert replaces the current
//! one; each alert hides itself after the configured duration unless it was
//! replaced or dismissed first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::types::{AlertState, Severity};

#[derive(Clone)]
pub struct AlertChannel {
    state: Arc<watch::Sender<AlertState>>,
    generation: Arc<AtomicU64>,
    auto_hide: Duration,
}

impl AlertChannel {
    pub fn new(auto_hide: Duration) -> Self {
        let (state, _) = watch::channel(AlertState::hidden());
        Self {
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            auto_hide,
        }
    }

    pub fn current(&self) -> AlertState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AlertState> {
        self.state.subscribe()
    }

    /// Show an alert and schedule its auto-dismissal
    pub fn raise(&self, message: impl Into<String>, severity: Severity) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(AlertState::shown(message, severity));

        let state = Arc::clone(&self.state);
        let current = Arc::clone(&self.generation);
        let auto_hide = self.auto_hide;
        tokio::spawn(async move {
            tokio::time::sleep(auto_hide).await;
            if current.load(Ordering::SeqCst) == generation {
                state.send_modify(|alert| alert.visible = false);
            }
        });
    }

    /// Hide the active alert, keeping its text
    pub fn dismiss(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_if_modified(|alert| {
            let was_visible = alert.visible;
            alert.visible = false;
            was_visible
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_alert_auto_hides() {
        let alerts = AlertChannel::new(Duration::from_millis(6_000));
        alerts.raise("SOLD OUT!", Severity::Error);
        assert!(alerts.current().visible);

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert!(alerts.current().visible);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let alert = alerts.current();
        assert!(!alert.visible);
        assert_eq!(alert.message, "SOLD OUT!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_alert_keeps_its_own_timer() {
        let alerts = AlertChannel::new(Duration::from_millis(1_000));
        alerts.raise("first", Severity::Info);
        tokio::time::sleep(Duration::from_millis(600)).await;
        alerts.raise("second", Severity::Success);

        // first timer fires here but must not hide the second alert
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(alerts.current().visible);
        assert_eq!(alerts.current().message, "second");

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!alerts.current().visible);
    }

    #[tokio::test]
    async fn test_dismiss() {
        let alerts = AlertChannel::new(Duration::from_secs(60));
        alerts.raise("hello", Severity::Warning);
        alerts.dismiss();
        assert!(!alerts.current().visible);
    }
}
