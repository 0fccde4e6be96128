//! Page-shell collaborators
//!
//! Minimal stand-ins for the pieces around the timer views: who is signed in,
//! and which route is showing.

pub mod auth;
pub mod router;

pub use auth::{AuthState, User};
pub use router::{NavigationState, Route, RouterState, AUTH_PATH, TIMER_PATH};
