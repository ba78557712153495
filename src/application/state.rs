//! Session state shared by every flow

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Connected wallet and its router sub-account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<String>,
    pub transfer_account: Option<String>,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Subscribable session context; clones share the same state
#[derive(Debug, Clone)]
pub struct AppState {
    session: Arc<watch::Sender<Session>>,
}

impl AppState {
    pub fn new() -> Self {
        let (session, _) = watch::channel(Session::default());
        Self {
            session: Arc::new(session),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    pub fn connect(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        info!("Wallet connected: {}", user_id);
        self.session.send_modify(|s| s.user_id = Some(user_id));
    }

    /// Forget the user and their sub-account
    pub fn disconnect(&self) {
        info!("Wallet disconnected");
        self.session.send_replace(Session::default());
    }

    pub fn set_transfer_account(&self, account: impl Into<String>) {
        let account = account.into();
        self.session.send_modify(|s| s.transfer_account = Some(account));
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_session_changes() {
        let state = AppState::new();
        let mut rx = state.subscribe();
        assert!(!rx.borrow().is_connected());

        state.connect("aaaaa-aa");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().user_id.as_deref(), Some("aaaaa-aa"));

        state.set_transfer_account("sub-1");
        assert_eq!(state.snapshot().transfer_account.as_deref(), Some("sub-1"));

        state.disconnect();
        assert_eq!(state.snapshot(), Session::default());
    }

    #[test]
    fn test_clones_share_state() {
        let state = AppState::new();
        let other = state.clone();
        other.connect("user");
        assert!(state.snapshot().is_connected());
    }
}
