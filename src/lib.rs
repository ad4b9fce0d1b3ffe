//! Browser Sync Store - sync-aware bookmark, history and account stores.
//!
//! The stores sit on top of an account manager and a places storage and
//! fan every change out to listeners on a single delivery context.

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
