//! Chronicle: Event-sourced user accounts.
//!
//! Users are never written directly: every change is a `UserCreated`,
//! `NameUpdated`, `EmailUpdated` or `UserDestroyed` event, and a user's state
//! is whatever replaying those events produces.

pub mod application;
pub mod domain;
