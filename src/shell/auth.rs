//! Authenticated-user identity

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub signed_in_at: DateTime<Utc>,
}

/// Current user or none, observable through a watch channel.
///
/// A watch channel only keeps the latest value, so a sign-out followed by a
/// sign-in can look like nothing happened. [`AuthState::sign_out_count`]
/// counts every time a user stopped being the signed-in user.
#[derive(Debug)]
pub struct AuthState {
    user_tx: watch::Sender<Option<User>>,
    sign_outs: AtomicU64,
}

impl AuthState {
    pub fn new() -> Self {
        let (user_tx, _) = watch::channel(None);
        Self {
            user_tx,
            sign_outs: AtomicU64::new(0),
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.user_tx.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_tx.borrow().is_some()
    }

    pub fn sign_in(&self, user_id: &str) -> User {
        let user = User {
            id: user_id.to_string(),
            signed_in_at: Utc::now(),
        };
        self.user_tx.send_modify(|current| {
            if let Some(previous) = current.replace(user.clone()) {
                if previous.id != user.id {
                    info!("User switched from {} without signing out", previous.id);
                    self.sign_outs.fetch_add(1, Ordering::SeqCst);
                }
            }
        });
        info!("User signed in: {}", user.id);
        user
    }

    pub fn sign_out(&self) {
        self.user_tx.send_if_modified(|current| match current.take() {
            Some(user) => {
                info!("User signed out: {}", user.id);
                self.sign_outs.fetch_add(1, Ordering::SeqCst);
                true
            }
            None => false,
        });
    }

    /// How many times a signed-in user has gone away (sign-out or switch)
    pub fn sign_out_count(&self) -> u64 {
        self.sign_outs.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user_tx.subscribe()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}
